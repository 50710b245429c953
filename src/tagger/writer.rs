use tracing::{debug, info, warn};

use super::transform;
use crate::config::TaggerConfig;
use crate::container::{CommitStatus, TagContainer};
use crate::errors::{FrameWriteError, OperationOutcome, TagError};
use crate::mapping::resolver::{plan_writes, WriteStep};
use crate::mapping::{Dialect, DialectFieldSpec, FrameId, FrameTarget, TagMapTable};
use crate::record::{MetadataRecord, MetadataValue};

/// Applies `record` to `container` and commits it.
///
/// Keys absent from the record are not touched. Every target is attempted;
/// if any of them is rejected nothing is committed.
pub fn write<C: TagContainer + ?Sized>(
    record: &MetadataRecord,
    container: &mut C,
    table: &TagMapTable,
    config: &TaggerConfig,
) -> OperationOutcome {
    let mut failures = Vec::new();

    for (key, value) in record.iter() {
        let Some(spec) = table.field(key) else {
            debug!("{} is not mapped, leaving it to the caller", key);
            continue;
        };

        for step in plan_writes(table, spec) {
            match step {
                WriteStep::Write(target) => {
                    if let Err(e) = write_target(container, target, value, config) {
                        warn!("{}: {}", key, e);
                        failures.push(e);
                    }
                }
                WriteStep::Remove(target) => {
                    debug!("{}: dropping stale {}", key, target.frame);
                    container.remove_frame(&target.frame);
                }
            }
        }

        if config.sync_legacy_tag {
            mirror_legacy(container, table, spec, value, config);
        }
    }

    if !failures.is_empty() {
        return OperationOutcome::Failed(TagError::FrameWrite { failures });
    }

    match container.commit() {
        Ok(CommitStatus::Written) => {
            info!("Wrote {} field(s)", record.len());
            OperationOutcome::Success
        }
        Ok(CommitStatus::Unchanged) => OperationOutcome::Success,
        Err(e) => {
            warn!("Commit failed: {}", e);
            OperationOutcome::Failed(e)
        }
    }
}

fn write_target<C: TagContainer + ?Sized>(
    container: &mut C,
    target: &FrameTarget,
    value: &MetadataValue,
    config: &TaggerConfig,
) -> Result<(), FrameWriteError> {
    if !container.accepts(target.dialect()) {
        debug!("Skipping {}: no {:?} tag in the file", target.frame, target.dialect());
        return Ok(());
    }
    let raw = transform::encode(target, value, config)?;
    container.set_frame_value(&target.frame, raw)
}

/// Best-effort copy into the ID3v1 targets the write policy left alone.
fn mirror_legacy<C: TagContainer + ?Sized>(
    container: &mut C,
    table: &TagMapTable,
    spec: &DialectFieldSpec,
    value: &MetadataValue,
    config: &TaggerConfig,
) {
    let planned: Vec<FrameId> = plan_writes(table, spec)
        .into_iter()
        .filter_map(|step| match step {
            WriteStep::Write(t) => Some(t.frame),
            WriteStep::Remove(_) => None,
        })
        .collect();

    for target in spec.targets.iter().filter(|t| t.dialect() == Dialect::Id3v1) {
        if planned.contains(&target.frame) {
            continue;
        }
        if let Err(e) = write_target(container, target, value, config) {
            debug!("Not mirroring {} to ID3v1: {}", spec.key, e);
        }
    }
}

pub mod reader;
pub mod transform;
pub mod writer;

use std::path::Path;
use tracing::{debug, info, warn};
use crate::config::TaggerConfig;
use crate::container::Mp3Container;
use crate::errors::{OperationOutcome, TagError};
use crate::mapping::describe_dialects;
use crate::record::MetadataRecord;

/// Reads the canonical record of one file.
///
/// The record is empty whenever the outcome is a failure. A file without
/// any tag is a success with an empty record.
pub fn read_metadata_with(path: &Path, config: &TaggerConfig) -> (MetadataRecord, OperationOutcome) {
    debug!("Reading tags: {}", path.display());

    let container = match Mp3Container::open(path, config) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            return (MetadataRecord::new(), OperationOutcome::Failed(e));
        }
    };

    let record = reader::read(&container, describe_dialects(), config);
    debug!("Read {} field(s) from {}", record.len(), path.display());
    (record, OperationOutcome::Success)
}

/// Writes `record` into one file. Keys the record does not carry keep
/// their current frames.
pub fn write_metadata_with(record: &MetadataRecord, path: &Path, config: &TaggerConfig) -> OperationOutcome {
    info!("Writing tags: {}", path.display());

    // A read-only file fails before any mapping work
    match std::fs::metadata(path) {
        Ok(meta) if meta.permissions().readonly() => {
            let e = TagError::Permission { path: path.to_path_buf() };
            warn!("{}", e);
            return OperationOutcome::Failed(e);
        }
        Ok(_) => {}
        Err(e) => return OperationOutcome::Failed(TagError::from_io(path, e)),
    }

    let mut container = match Mp3Container::open(path, config) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            return OperationOutcome::Failed(e);
        }
    };

    writer::write(record, &mut container, describe_dialects(), config)
}

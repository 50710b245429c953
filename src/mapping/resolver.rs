//! Precedence between several frames that carry the same key.
//!
//! Ordering is lowest priority rank first, then the table's dialect order,
//! then the position of the target inside its field spec. Iteration order of
//! the container never matters.

use super::{DialectFieldSpec, FrameTarget, StaleVariants, TagMapTable, WritePolicy};

/// A target found in the container together with whatever was read from it.
#[derive(Debug, Clone)]
pub struct Candidate<'t, V> {
    pub target: &'t FrameTarget,
    /// Index of the target in its field spec.
    pub position: usize,
    pub value: V,
}

fn rank(table: &TagMapTable, target: &FrameTarget, position: usize) -> (u8, usize, usize) {
    (target.priority, table.dialect_rank(target.dialect()), position)
}

/// Picks the winning candidate. `None` only when `candidates` is empty.
pub fn resolve<'c, 't, V>(
    table: &TagMapTable,
    candidates: &'c [Candidate<'t, V>],
) -> Option<&'c Candidate<'t, V>> {
    candidates
        .iter()
        .min_by_key(|c| rank(table, c.target, c.position))
}

/// The target that is authoritative for writes.
pub fn primary_target<'t>(table: &TagMapTable, spec: &'t DialectFieldSpec) -> Option<&'t FrameTarget> {
    spec.targets
        .iter()
        .enumerate()
        .min_by_key(|(i, t)| rank(table, t, *i))
        .map(|(_, t)| t)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStep<'t> {
    Write(&'t FrameTarget),
    Remove(&'t FrameTarget),
}

/// Expands a field's write policy into the concrete per-target steps.
pub fn plan_writes<'t>(table: &TagMapTable, spec: &'t DialectFieldSpec) -> Vec<WriteStep<'t>> {
    match spec.policy {
        WritePolicy::WriteAll => spec.targets.iter().map(WriteStep::Write).collect(),
        WritePolicy::PrimaryOnly { stale } => {
            let Some(primary) = primary_target(table, spec) else {
                return Vec::new();
            };

            let mut steps = vec![WriteStep::Write(primary)];
            if stale == StaleVariants::Remove {
                steps.extend(
                    spec.targets
                        .iter()
                        .filter(|t| !std::ptr::eq(*t, primary))
                        .map(WriteStep::Remove),
                );
            }
            steps
        }
    }
}

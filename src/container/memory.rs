use std::collections::{BTreeMap, BTreeSet};

use super::{CommitStatus, RawValue, TagContainer};
use crate::errors::{FieldDecodeError, FrameWriteError, TagError};
use crate::mapping::{Dialect, FrameId};

/// Frame store for exercising the engine without files.
#[derive(Debug, Default)]
pub struct MemoryContainer {
    pub frames: BTreeMap<FrameId, RawValue>,
    /// Frames that are present but fail to decode.
    pub broken: BTreeSet<FrameId>,
    /// Frames that refuse every write.
    pub read_only: BTreeSet<FrameId>,
    pub legacy: bool,
    pub dirty: bool,
    pub commits: usize,
    pub fail_commit: bool,
}

impl MemoryContainer {
    pub fn with_frames(frames: impl IntoIterator<Item = (FrameId, &'static str)>) -> Self {
        Self {
            frames: frames
                .into_iter()
                .map(|(id, text)| (id, RawValue::Text(text.to_string())))
                .collect(),
            legacy: true,
            ..Self::default()
        }
    }

    pub fn text(&self, frame: FrameId) -> Option<&str> {
        match self.frames.get(&frame)? {
            RawValue::Text(text) => Some(text),
            RawValue::Binary { .. } => None,
        }
    }
}

impl TagContainer for MemoryContainer {
    fn accepts(&self, dialect: Dialect) -> bool {
        dialect == Dialect::Id3v2 || self.legacy
    }

    fn frame_value(&self, frame: &FrameId) -> Option<Result<RawValue, FieldDecodeError>> {
        if self.broken.contains(frame) {
            return Some(Err(FieldDecodeError::new(*frame, "garbled frame")));
        }
        self.frames.get(frame).cloned().map(Ok)
    }

    fn set_frame_value(&mut self, frame: &FrameId, value: RawValue) -> Result<(), FrameWriteError> {
        if self.read_only.contains(frame) {
            return Err(FrameWriteError::new(*frame, "rejected"));
        }
        self.broken.remove(frame);
        if self.frames.insert(*frame, value.clone()) != Some(value) {
            self.dirty = true;
        }
        Ok(())
    }

    fn remove_frame(&mut self, frame: &FrameId) {
        if self.frames.remove(frame).is_some() {
            self.dirty = true;
        }
    }

    fn commit(&mut self) -> Result<CommitStatus, TagError> {
        if self.fail_commit {
            return Err(TagError::Commit { path: "memory".into(), reason: "device full".to_string() });
        }
        if !self.dirty {
            return Ok(CommitStatus::Unchanged);
        }
        self.dirty = false;
        self.commits += 1;
        Ok(CommitStatus::Written)
    }
}

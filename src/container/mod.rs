//! The seam between the mapping engine and the tag parser.
//!
//! The engine only talks to [`TagContainer`]. [`Mp3Container`] is the concrete
//! handle for MP3 files: an `id3::Tag` for the ID3v2 region plus the legacy
//! ID3v1 block at the end of the stream.

pub mod legacy;
pub mod mp3;

#[cfg(test)]
pub(crate) mod memory;

use crate::errors::{FieldDecodeError, FrameWriteError, TagError};
use crate::mapping::{Dialect, FrameId};

pub use mp3::Mp3Container;

/// A frame's value as the parser sees it, before any canonical transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Text(String),
    Binary {
        mime_type: String,
        description: String,
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStatus {
    Written,
    /// Nothing changed since parsing; storage was not touched.
    Unchanged,
}

pub trait TagContainer {
    /// Whether frames of `dialect` may be written to this container.
    fn accepts(&self, dialect: Dialect) -> bool;

    /// `None` when the frame is absent, `Some(Err(..))` when it is present but unreadable.
    fn frame_value(&self, frame: &FrameId) -> Option<Result<RawValue, FieldDecodeError>>;

    /// Adds or replaces the frame.
    fn set_frame_value(&mut self, frame: &FrameId, value: RawValue) -> Result<(), FrameWriteError>;

    fn remove_frame(&mut self, frame: &FrameId);

    /// Persists every pending change in one step, or none of them.
    fn commit(&mut self) -> Result<CommitStatus, TagError>;
}

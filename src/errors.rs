use std::fmt::Display;
use std::path::PathBuf;

use thiserror::Error;

use crate::mapping::FrameId;

/// Where in an operation a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parse,
    Map,
    Commit,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Parse => write!(f, "parse"),
            Stage::Map => write!(f, "map"),
            Stage::Commit => write!(f, "commit"),
        }
    }
}

/// One mapped frame could not be decoded. Recovered locally: the key stays absent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not decode {frame}: {reason}")]
pub struct FieldDecodeError {
    pub frame: FrameId,
    pub reason: String,
}

impl FieldDecodeError {
    pub fn new(frame: FrameId, reason: impl Into<String>) -> Self {
        Self { frame, reason: reason.into() }
    }
}

/// A mapped target refused a value. Other targets are still attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not write {frame}: {reason}")]
pub struct FrameWriteError {
    pub frame: FrameId,
    pub reason: String,
}

impl FrameWriteError {
    pub fn new(frame: FrameId, reason: impl Into<String>) -> Self {
        Self { frame, reason: reason.into() }
    }
}

/// File-level failures. Each one aborts its operation.
#[derive(Debug, Error)]
pub enum TagError {
    #[error("could not parse tags of {}: {reason}", .path.display())]
    ContainerParse { path: PathBuf, reason: String },

    #[error("{} is not writable", .path.display())]
    Permission { path: PathBuf },

    #[error("{} frame(s) rejected{}", .failures.len(), first_failure(.failures))]
    FrameWrite { failures: Vec<FrameWriteError> },

    #[error("could not commit tags to {}: {reason}", .path.display())]
    Commit { path: PathBuf, reason: String },

    #[error("could not access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn first_failure(failures: &[FrameWriteError]) -> String {
    failures.first().map(|f| format!(", first: {}", f)).unwrap_or_default()
}

impl TagError {
    pub fn stage(&self) -> Stage {
        match self {
            TagError::ContainerParse { .. } | TagError::Io { .. } => Stage::Parse,
            TagError::FrameWrite { .. } => Stage::Map,
            TagError::Permission { .. } | TagError::Commit { .. } => Stage::Commit,
        }
    }

    /// Nonzero status for C-style callers.
    pub fn status_code(&self) -> i32 {
        match self {
            TagError::ContainerParse { .. } => 1,
            TagError::Permission { .. } => 2,
            TagError::FrameWrite { .. } => 3,
            TagError::Commit { .. } => 4,
            TagError::Io { .. } => 5,
        }
    }

    /// Maps an I/O error on `path`, singling out permission problems.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => TagError::Permission { path },
            _ => TagError::Io { path, source },
        }
    }
}

/// Result of a whole read or write. There is no partial success.
#[derive(Debug)]
pub enum OperationOutcome {
    Success,
    Failed(TagError),
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationOutcome::Success)
    }

    pub fn error(&self) -> Option<&TagError> {
        match self {
            OperationOutcome::Success => None,
            OperationOutcome::Failed(e) => Some(e),
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        self.error().map(TagError::stage)
    }

    /// `0` on success, the error's category code otherwise.
    pub fn status_code(&self) -> i32 {
        self.error().map_or(0, TagError::status_code)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("HOME environment variable not set")]
    NoHome,

    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to write config {}: {reason}", .path.display())]
    Write { path: PathBuf, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::LegacyField;

    #[test]
    fn test_status_codes_are_distinct() {
        let errors = [
            TagError::ContainerParse { path: "a.mp3".into(), reason: "bad".into() },
            TagError::Permission { path: "a.mp3".into() },
            TagError::FrameWrite {
                failures: vec![FrameWriteError::new(FrameId::V1(LegacyField::Title), "too long")],
            },
            TagError::Commit { path: "a.mp3".into(), reason: "disk full".into() },
            TagError::Io {
                path: "a.mp3".into(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            },
        ];

        let mut codes: Vec<i32> = errors.iter().map(TagError::status_code).collect();
        assert!(codes.iter().all(|c| *c != 0));
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_outcome_codes() {
        assert_eq!(OperationOutcome::Success.status_code(), 0);
        assert!(OperationOutcome::Success.stage().is_none());

        let failed = OperationOutcome::Failed(TagError::Permission { path: "a.mp3".into() });
        assert_eq!(failed.status_code(), 2);
        assert_eq!(failed.stage(), Some(Stage::Commit));
        assert!(!failed.is_success());
    }

    #[test]
    fn test_permission_denied_is_categorized() {
        let err = TagError::from_io(
            "a.mp3",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, TagError::Permission { .. }));

        let err = TagError::from_io("a.mp3", std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(matches!(err, TagError::Io { .. }));
        assert_eq!(err.stage(), Stage::Parse);
    }

    #[test]
    fn test_frame_write_message() {
        let err = TagError::FrameWrite {
            failures: vec![FrameWriteError::new(FrameId::V2("APIC"), "frame too large")],
        };
        assert_eq!(err.to_string(), "1 frame(s) rejected, first: could not write APIC: frame too large");

        let err = TagError::FrameWrite { failures: Vec::new() };
        assert_eq!(err.to_string(), "0 frame(s) rejected");
    }
}

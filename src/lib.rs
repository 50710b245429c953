//! Lossless mapping between a canonical metadata record and the ID3v2 /
//! ID3v1 tags of MP3 files.
//!
//! ```no_run
//! use tagsync::{read_metadata, write_metadata, CanonicalKey, MetadataValue};
//!
//! let path = std::path::Path::new("track.mp3");
//! let (mut record, outcome) = read_metadata(path);
//! assert!(outcome.is_success());
//!
//! record.set(CanonicalKey::Title, MetadataValue::Text("Around the World".to_string()));
//! let status = write_metadata(&record, path).status_code();
//! assert_eq!(status, 0);
//! ```

pub mod config;
pub mod container;
pub mod errors;
pub mod mapping;
pub mod record;
pub mod tagger;

use std::path::Path;

pub use config::{Config, TaggerConfig};
pub use errors::{OperationOutcome, Stage, TagError};
pub use mapping::{describe_dialects, CanonicalKey};
pub use record::{Artwork, MetadataRecord, MetadataValue, PartialDate};
pub use tagger::{read_metadata_with, write_metadata_with};

/// Keys the engine round-trips, in table order.
pub fn supported_keys() -> Vec<CanonicalKey> {
    mapping::supported_keys(describe_dialects())
}

/// Reads `path` with the default configuration.
pub fn read_metadata(path: &Path) -> (MetadataRecord, OperationOutcome) {
    read_metadata_with(path, &TaggerConfig::default())
}

/// Writes `record` to `path` with the default configuration.
pub fn write_metadata(record: &MetadataRecord, path: &Path) -> OperationOutcome {
    write_metadata_with(record, path, &TaggerConfig::default())
}

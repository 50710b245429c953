//! Canonical keys, dialects and the declarative table that ties them together.
//!
//! The table is pure data: adding a field is one entry in [`descriptor`],
//! the reader and writer never grow new control flow for it.

pub mod descriptor;
pub mod registry;
pub mod resolver;

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use descriptor::describe_dialects;
pub use registry::supported_keys;

/// Format-agnostic name of a metadata field.
///
/// Declaration order is the order the registry reports keys in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalKey {
    Title,
    Artist,
    Album,
    AlbumArtist,
    Composer,
    Genre,
    Date,
    Comment,
    #[serde(rename = "track")]
    TrackPosition,
    #[serde(rename = "disc")]
    DiscPosition,
    Bpm,
    InitialKey,
    Compilation,
    Grouping,
    Publisher,
    Copyright,
    EncodedBy,
    Lyrics,
    Artwork,
}

impl CanonicalKey {
    pub const ALL: [CanonicalKey; 19] = [
        CanonicalKey::Title,
        CanonicalKey::Artist,
        CanonicalKey::Album,
        CanonicalKey::AlbumArtist,
        CanonicalKey::Composer,
        CanonicalKey::Genre,
        CanonicalKey::Date,
        CanonicalKey::Comment,
        CanonicalKey::TrackPosition,
        CanonicalKey::DiscPosition,
        CanonicalKey::Bpm,
        CanonicalKey::InitialKey,
        CanonicalKey::Compilation,
        CanonicalKey::Grouping,
        CanonicalKey::Publisher,
        CanonicalKey::Copyright,
        CanonicalKey::EncodedBy,
        CanonicalKey::Lyrics,
        CanonicalKey::Artwork,
    ];

    /// Stable lowercase name, shared with the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalKey::Title => "title",
            CanonicalKey::Artist => "artist",
            CanonicalKey::Album => "album",
            CanonicalKey::AlbumArtist => "album_artist",
            CanonicalKey::Composer => "composer",
            CanonicalKey::Genre => "genre",
            CanonicalKey::Date => "date",
            CanonicalKey::Comment => "comment",
            CanonicalKey::TrackPosition => "track",
            CanonicalKey::DiscPosition => "disc",
            CanonicalKey::Bpm => "bpm",
            CanonicalKey::InitialKey => "initial_key",
            CanonicalKey::Compilation => "compilation",
            CanonicalKey::Grouping => "grouping",
            CanonicalKey::Publisher => "publisher",
            CanonicalKey::Copyright => "copyright",
            CanonicalKey::EncodedBy => "encoded_by",
            CanonicalKey::Lyrics => "lyrics",
            CanonicalKey::Artwork => "artwork",
        }
    }
}

impl Display for CanonicalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CanonicalKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        CanonicalKey::ALL
            .into_iter()
            .find(|key| key.as_str() == wanted)
            .ok_or_else(|| format!("unknown metadata key: {s}"))
    }
}

/// A tag standard coexisting inside the MP3 container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dialect {
    Id3v2,
    Id3v1,
}

impl Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::Id3v2 => write!(f, "ID3v2"),
            Dialect::Id3v1 => write!(f, "ID3v1"),
        }
    }
}

/// Shape of a value, both on the canonical side and inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Integer,
    Date,
    Binary,
    MultiValue,
    /// "number/total" pairs such as `TRCK` and `TPOS`.
    Position,
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Text => write!(f, "text"),
            ValueKind::Integer => write!(f, "integer"),
            ValueKind::Date => write!(f, "date"),
            ValueKind::Binary => write!(f, "binary"),
            ValueKind::MultiValue => write!(f, "multi-value"),
            ValueKind::Position => write!(f, "position"),
        }
    }
}

/// Fixed fields of the 128-byte legacy block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LegacyField {
    Title,
    Artist,
    Album,
    Year,
    Comment,
    Track,
    Genre,
}

impl LegacyField {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegacyField::Title => "title",
            LegacyField::Artist => "artist",
            LegacyField::Album => "album",
            LegacyField::Year => "year",
            LegacyField::Comment => "comment",
            LegacyField::Track => "track",
            LegacyField::Genre => "genre",
        }
    }
}

/// Dialect-specific label of one value inside the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FrameId {
    /// Plain four-character ID3v2 frame such as `TIT2`.
    V2(&'static str),
    /// Description-keyed ID3v2 frame, e.g. `TXXX` with description `ALBUM ARTIST`.
    V2Described(&'static str, &'static str),
    V1(LegacyField),
}

impl FrameId {
    pub fn dialect(&self) -> Dialect {
        match self {
            FrameId::V2(_) | FrameId::V2Described(..) => Dialect::Id3v2,
            FrameId::V1(_) => Dialect::Id3v1,
        }
    }
}

impl Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameId::V2(id) => write!(f, "{id}"),
            FrameId::V2Described(id, description) => write!(f, "{id}:{description}"),
            FrameId::V1(field) => write!(f, "ID3v1:{}", field.as_str()),
        }
    }
}

/// What happens to the non-primary targets of a key on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleVariants {
    Keep,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Every target of the key is written.
    WriteAll,
    /// Only the primary target is written.
    PrimaryOnly { stale: StaleVariants },
}

/// One place a canonical key can live inside the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTarget {
    pub frame: FrameId,
    pub kind: ValueKind,
    /// Lower wins.
    pub priority: u8,
}

impl FrameTarget {
    pub fn dialect(&self) -> Dialect {
        self.frame.dialect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectFieldSpec {
    pub key: CanonicalKey,
    pub kind: ValueKind,
    pub policy: WritePolicy,
    pub targets: Vec<FrameTarget>,
}

/// The complete mapping between canonical keys and dialect frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMapTable {
    fields: Vec<DialectFieldSpec>,
    dialect_order: Vec<Dialect>,
}

impl TagMapTable {
    pub fn new(fields: Vec<DialectFieldSpec>, dialect_order: Vec<Dialect>) -> Self {
        Self { fields, dialect_order }
    }

    pub fn fields(&self) -> &[DialectFieldSpec] {
        &self.fields
    }

    pub fn field(&self, key: CanonicalKey) -> Option<&DialectFieldSpec> {
        self.fields.iter().find(|spec| spec.key == key)
    }

    /// Position of a dialect in the tie-break order. Undeclared dialects sort last.
    pub fn dialect_rank(&self, dialect: Dialect) -> usize {
        self.dialect_order
            .iter()
            .position(|d| *d == dialect)
            .unwrap_or(self.dialect_order.len())
    }

    /// Checks the structural invariants the reader and writer rely on.
    pub fn validate(&self) -> Result<(), TableError> {
        let mut seen_keys = Vec::new();
        let mut seen_frames: Vec<(FrameId, CanonicalKey)> = Vec::new();

        for spec in &self.fields {
            if seen_keys.contains(&spec.key) {
                return Err(TableError::DuplicateKey(spec.key));
            }
            seen_keys.push(spec.key);

            if spec.targets.is_empty() {
                return Err(TableError::NoTargets(spec.key));
            }

            for (i, target) in spec.targets.iter().enumerate() {
                if let Some((_, owner)) = seen_frames.iter().find(|(f, _)| *f == target.frame) {
                    return Err(TableError::AmbiguousFrame {
                        frame: target.frame,
                        first: *owner,
                        second: spec.key,
                    });
                }
                seen_frames.push((target.frame, spec.key));

                let tied = spec.targets[..i].iter().any(|other| {
                    other.dialect() == target.dialect() && other.priority == target.priority
                });
                if tied {
                    return Err(TableError::PriorityTie { key: spec.key, frame: target.frame });
                }

                if !self.dialect_order.contains(&target.dialect()) {
                    return Err(TableError::UndeclaredDialect(target.dialect()));
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("key {0} is declared twice")]
    DuplicateKey(CanonicalKey),

    #[error("key {0} has no frame targets")]
    NoTargets(CanonicalKey),

    #[error("frame {frame} maps to both {first} and {second}")]
    AmbiguousFrame {
        frame: FrameId,
        first: CanonicalKey,
        second: CanonicalKey,
    },

    #[error("key {key} has two {frame} variants with the same priority")]
    PriorityTie { key: CanonicalKey, frame: FrameId },

    #[error("dialect {0} is missing from the dialect order")]
    UndeclaredDialect(Dialect),
}

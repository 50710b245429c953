use tracing::{debug, warn};

use super::transform;
use crate::config::TaggerConfig;
use crate::container::TagContainer;
use crate::mapping::resolver::{resolve, Candidate};
use crate::mapping::TagMapTable;
use crate::record::MetadataRecord;

/// Builds the canonical record of `container`.
///
/// Field-level problems never fail the read: an unreadable winning frame
/// leaves its key absent and is logged.
pub fn read<C: TagContainer + ?Sized>(
    container: &C,
    table: &TagMapTable,
    config: &TaggerConfig,
) -> MetadataRecord {
    let mut record = MetadataRecord::new();

    for spec in table.fields() {
        let candidates: Vec<Candidate<'_, _>> = spec
            .targets
            .iter()
            .enumerate()
            .filter_map(|(position, target)| {
                container
                    .frame_value(&target.frame)
                    .map(|value| Candidate { target, position, value })
            })
            .collect();

        let Some(winner) = resolve(table, &candidates) else {
            continue;
        };

        if candidates.len() > 1 {
            debug!(
                "{}: {} candidate frames, using {}",
                spec.key,
                candidates.len(),
                winner.target.frame
            );
        }

        let raw = match &winner.value {
            Ok(raw) => raw.clone(),
            Err(e) => {
                warn!("Skipping {}: {}", spec.key, e);
                continue;
            }
        };

        match transform::decode(winner.target, spec.kind, raw, config) {
            Ok(value) => {
                record.set(spec.key, value);
            }
            Err(e) => warn!("Skipping {}: {}", spec.key, e),
        }
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::memory::MemoryContainer;
    use crate::mapping::{describe_dialects, CanonicalKey, FrameId, LegacyField};
    use crate::record::{MetadataValue, PartialDate};

    #[test]
    fn test_absent_frames_stay_absent() {
        let container = MemoryContainer::with_frames([(FrameId::V2("TIT2"), "Aerodynamic")]);
        let record = read(&container, describe_dialects(), &TaggerConfig::default());

        assert_eq!(record.len(), 1);
        assert_eq!(record.text(CanonicalKey::Title), Some("Aerodynamic"));
        assert!(!record.contains(CanonicalKey::Artist));
    }

    #[test]
    fn test_modern_frame_beats_legacy() {
        let container = MemoryContainer::with_frames([
            (FrameId::V2("TALB"), "Discovery (Remaster)"),
            (FrameId::V1(LegacyField::Album), "Discovery"),
        ]);
        let record = read(&container, describe_dialects(), &TaggerConfig::default());
        assert_eq!(record.text(CanonicalKey::Album), Some("Discovery (Remaster)"));
    }

    #[test]
    fn test_legacy_only_value_is_read() {
        let container = MemoryContainer::with_frames([
            (FrameId::V1(LegacyField::Album), "Discovery"),
            (FrameId::V1(LegacyField::Track), "4"),
        ]);
        let record = read(&container, describe_dialects(), &TaggerConfig::default());

        assert_eq!(record.text(CanonicalKey::Album), Some("Discovery"));
        assert_eq!(
            record.get(CanonicalKey::TrackPosition),
            Some(&MetadataValue::Position { number: 4, total: None })
        );
    }

    #[test]
    fn test_date_precedence() {
        let container = MemoryContainer::with_frames([
            (FrameId::V1(LegacyField::Year), "1999"),
            (FrameId::V2("TYER"), "2001"),
            (FrameId::V2("TDRC"), "2001-03-12"),
        ]);
        let record = read(&container, describe_dialects(), &TaggerConfig::default());

        assert_eq!(
            record.get(CanonicalKey::Date),
            Some(&MetadataValue::Date(PartialDate { year: 2001, month: Some(3), day: Some(12) }))
        );
    }

    #[test]
    fn test_malformed_frame_is_isolated() {
        let mut container = MemoryContainer::with_frames([
            (FrameId::V2("TIT2"), "Digital Love"),
            (FrameId::V2("TPE1"), "Daft Punk"),
            (FrameId::V2("TRCK"), "three"),
        ]);
        container.broken.insert(FrameId::V2("TPE1"));

        let record = read(&container, describe_dialects(), &TaggerConfig::default());
        assert_eq!(record.text(CanonicalKey::Title), Some("Digital Love"));
        assert!(!record.contains(CanonicalKey::Artist));
        assert!(!record.contains(CanonicalKey::TrackPosition));
    }

    #[test]
    fn test_broken_winner_does_not_fall_back() {
        let mut container = MemoryContainer::with_frames([
            (FrameId::V2("TALB"), "Discovery (Remaster)"),
            (FrameId::V1(LegacyField::Album), "Discovery"),
        ]);
        container.broken.insert(FrameId::V2("TALB"));

        let record = read(&container, describe_dialects(), &TaggerConfig::default());
        assert!(!record.contains(CanonicalKey::Album));
    }

    #[test]
    fn test_read_is_deterministic() {
        let container = MemoryContainer::with_frames([
            (FrameId::V2("TPE2"), "Various Artists"),
            (FrameId::V2Described("TXXX", "ALBUM ARTIST"), "VA"),
            (FrameId::V2("TCON"), "House\0Electronic"),
            (FrameId::V1(LegacyField::Genre), "Dance"),
        ]);

        let first = read(&container, describe_dialects(), &TaggerConfig::default());
        for _ in 0..5 {
            assert_eq!(read(&container, describe_dialects(), &TaggerConfig::default()), first);
        }
        assert_eq!(first.text(CanonicalKey::AlbumArtist), Some("Various Artists"));
        assert_eq!(
            first.get(CanonicalKey::Genre),
            Some(&MetadataValue::List(vec!["House".to_string(), "Electronic".to_string()]))
        );
    }
}

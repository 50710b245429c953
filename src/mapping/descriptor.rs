use std::sync::OnceLock;

use super::{
    CanonicalKey, Dialect, DialectFieldSpec, FrameId, FrameTarget, LegacyField, StaleVariants,
    TagMapTable, ValueKind, WritePolicy,
};

const PRIMARY: u8 = 0;
const ALTERNATE: u8 = 5;
const LEGACY: u8 = 10;

const KEEP_STALE: WritePolicy = WritePolicy::PrimaryOnly { stale: StaleVariants::Keep };
const REMOVE_STALE: WritePolicy = WritePolicy::PrimaryOnly { stale: StaleVariants::Remove };

/// Returns the process-wide mapping table for the ID3v2 / ID3v1 dialects.
///
/// Built on first use and shared read-only afterwards.
pub fn describe_dialects() -> &'static TagMapTable {
    static TABLE: OnceLock<TagMapTable> = OnceLock::new();
    TABLE.get_or_init(build_table)
}

fn v2(id: &'static str, kind: ValueKind, priority: u8) -> FrameTarget {
    FrameTarget { frame: FrameId::V2(id), kind, priority }
}

fn txxx(description: &'static str, kind: ValueKind, priority: u8) -> FrameTarget {
    FrameTarget { frame: FrameId::V2Described("TXXX", description), kind, priority }
}

fn v1(field: LegacyField, kind: ValueKind) -> FrameTarget {
    FrameTarget { frame: FrameId::V1(field), kind, priority: LEGACY }
}

fn field(
    key: CanonicalKey,
    kind: ValueKind,
    policy: WritePolicy,
    targets: Vec<FrameTarget>,
) -> DialectFieldSpec {
    DialectFieldSpec { key, kind, policy, targets }
}

fn build_table() -> TagMapTable {
    use CanonicalKey as K;
    use ValueKind::*;

    let fields = vec![
        field(K::Title, Text, KEEP_STALE, vec![
            v2("TIT2", Text, PRIMARY),
            v1(LegacyField::Title, Text),
        ]),
        field(K::Artist, Text, KEEP_STALE, vec![
            v2("TPE1", Text, PRIMARY),
            v1(LegacyField::Artist, Text),
        ]),
        field(K::Album, Text, KEEP_STALE, vec![
            v2("TALB", Text, PRIMARY),
            v1(LegacyField::Album, Text),
        ]),
        field(K::AlbumArtist, Text, REMOVE_STALE, vec![
            v2("TPE2", Text, PRIMARY),
            txxx("ALBUM ARTIST", Text, ALTERNATE),
        ]),
        field(K::Composer, Text, KEEP_STALE, vec![v2("TCOM", Text, PRIMARY)]),
        field(K::Genre, MultiValue, KEEP_STALE, vec![
            v2("TCON", MultiValue, PRIMARY),
            v1(LegacyField::Genre, Text),
        ]),
        field(K::Date, Date, KEEP_STALE, vec![
            v2("TDRC", Date, PRIMARY),
            v2("TYER", Integer, ALTERNATE),
            v1(LegacyField::Year, Integer),
        ]),
        field(K::Comment, Text, KEEP_STALE, vec![
            v2("COMM", Text, PRIMARY),
            v1(LegacyField::Comment, Text),
        ]),
        field(K::TrackPosition, Position, KEEP_STALE, vec![
            v2("TRCK", Position, PRIMARY),
            v1(LegacyField::Track, Integer),
        ]),
        field(K::DiscPosition, Position, KEEP_STALE, vec![v2("TPOS", Position, PRIMARY)]),
        field(K::Bpm, Integer, KEEP_STALE, vec![v2("TBPM", Integer, PRIMARY)]),
        field(K::InitialKey, Text, KEEP_STALE, vec![v2("TKEY", Text, PRIMARY)]),
        field(K::Compilation, Integer, WritePolicy::WriteAll, vec![
            v2("TCMP", Integer, PRIMARY),
            txxx("COMPILATION", Integer, ALTERNATE),
        ]),
        field(K::Grouping, Text, KEEP_STALE, vec![v2("TIT1", Text, PRIMARY)]),
        field(K::Publisher, Text, KEEP_STALE, vec![v2("TPUB", Text, PRIMARY)]),
        field(K::Copyright, Text, KEEP_STALE, vec![v2("TCOP", Text, PRIMARY)]),
        field(K::EncodedBy, Text, KEEP_STALE, vec![v2("TENC", Text, PRIMARY)]),
        field(K::Lyrics, Text, KEEP_STALE, vec![v2("USLT", Text, PRIMARY)]),
        field(K::Artwork, Binary, KEEP_STALE, vec![v2("APIC", Binary, PRIMARY)]),
    ];

    TagMapTable::new(fields, vec![Dialect::Id3v2, Dialect::Id3v1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_valid() {
        assert_eq!(describe_dialects().validate(), Ok(()));
    }

    #[test]
    fn test_table_is_shared() {
        assert!(std::ptr::eq(describe_dialects(), describe_dialects()));
    }

    #[test]
    fn test_every_key_is_described() {
        let table = describe_dialects();
        for key in CanonicalKey::ALL {
            assert!(table.field(key).is_some(), "{key} missing from table");
        }
    }

    #[test]
    fn test_artist_writes_primary_only() {
        let spec = describe_dialects().field(CanonicalKey::Artist).unwrap();
        assert_eq!(spec.policy, KEEP_STALE);
    }
}

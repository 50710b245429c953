//! The ordered set of keys the engine round-trips.
//!
//! Anything outside this list is not written back by the engine. Callers that
//! need such fields must carry them through their own passthrough path.

use super::{CanonicalKey, TagMapTable};

/// Keys in table declaration order. Same table, same order, every call.
pub fn supported_keys(table: &TagMapTable) -> Vec<CanonicalKey> {
    table.fields().iter().map(|spec| spec.key).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{
        describe_dialects, Dialect, DialectFieldSpec, FrameId, FrameTarget, ValueKind, WritePolicy,
    };

    #[test]
    fn test_order_is_stable() {
        let table = describe_dialects();
        let first = supported_keys(table);
        let second = supported_keys(table);
        assert_eq!(first, second);
        assert_eq!(first.first(), Some(&CanonicalKey::Title));
        assert_eq!(first.last(), Some(&CanonicalKey::Artwork));
        assert_eq!(first.len(), CanonicalKey::ALL.len());
    }

    #[test]
    fn test_order_follows_declaration_not_key_order() {
        let spec = |key| DialectFieldSpec {
            key,
            kind: ValueKind::Text,
            policy: WritePolicy::WriteAll,
            targets: vec![FrameTarget { frame: FrameId::V2("TIT2"), kind: ValueKind::Text, priority: 0 }],
        };
        let table = TagMapTable::new(
            vec![spec(CanonicalKey::Lyrics), spec(CanonicalKey::Title)],
            vec![Dialect::Id3v2],
        );

        assert_eq!(supported_keys(&table), vec![CanonicalKey::Lyrics, CanonicalKey::Title]);
    }
}

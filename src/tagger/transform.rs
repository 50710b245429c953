//! Conversions between raw frame values and canonical values.
//!
//! The pair (target kind, canonical kind) decides the conversion, so the
//! legacy integer year and the ID3v2.4 timestamp both land in a `Date`.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::TaggerConfig;
use crate::container::legacy::GENRES;
use crate::container::RawValue;
use crate::errors::{FieldDecodeError, FrameWriteError};
use crate::mapping::{FrameTarget, ValueKind};
use crate::record::{Artwork, MetadataValue, PartialDate};

/// Decodes the raw value of `target` into a value of the field's canonical kind.
pub fn decode(
    target: &FrameTarget,
    canonical: ValueKind,
    raw: RawValue,
    config: &TaggerConfig,
) -> Result<MetadataValue, FieldDecodeError> {
    let fail = |reason: String| FieldDecodeError::new(target.frame, reason);

    let text = match raw {
        RawValue::Binary { mime_type, description, data } => {
            return match (target.kind, canonical) {
                (ValueKind::Binary, ValueKind::Binary) => {
                    Ok(MetadataValue::Binary(Artwork { mime_type, description, data }))
                }
                _ => Err(fail(format!("binary frame cannot be read as {}", canonical))),
            };
        }
        RawValue::Text(text) => text,
    };

    match (target.kind, canonical) {
        (ValueKind::Text, ValueKind::Text) => Ok(MetadataValue::Text(text)),
        (ValueKind::Text, ValueKind::MultiValue) => Ok(MetadataValue::List(vec![text])),
        (ValueKind::MultiValue, ValueKind::MultiValue) => {
            Ok(MetadataValue::List(split_values(&text, config)))
        }
        (ValueKind::Integer, ValueKind::Integer) => parse_integer(&text).map(MetadataValue::Integer).map_err(fail),
        (ValueKind::Integer, ValueKind::Date) => {
            let year = parse_integer(&text).map_err(&fail)?;
            u16::try_from(year)
                .ok()
                .filter(|y| *y <= 9999)
                .map(|y| MetadataValue::Date(PartialDate::year(y)))
                .ok_or_else(|| fail(format!("{} is not a year", year)))
        }
        (ValueKind::Date, ValueKind::Date) => text.parse::<PartialDate>().map(MetadataValue::Date).map_err(fail),
        (ValueKind::Position, ValueKind::Position) => {
            let (number, total) = parse_position(&text).map_err(&fail)?;
            Ok(MetadataValue::Position { number, total })
        }
        (ValueKind::Integer, ValueKind::Position) => {
            let number = parse_integer(&text).map_err(&fail)?;
            Ok(MetadataValue::Position { number, total: None })
        }
        (kind, canonical) => Err(fail(format!("{} frame cannot be read as {}", kind, canonical))),
    }
}

/// Encodes `value` in the representation `target` stores.
pub fn encode(
    target: &FrameTarget,
    value: &MetadataValue,
    config: &TaggerConfig,
) -> Result<RawValue, FrameWriteError> {
    if let MetadataValue::Date(date) = value {
        date.validate().map_err(|reason| FrameWriteError::new(target.frame, reason))?;
    }

    let text = match (value, target.kind) {
        (MetadataValue::Text(s), ValueKind::Text) => s.clone(),
        (MetadataValue::List(values), ValueKind::MultiValue) => values.join(&config.get_separator()),
        // Single-valued targets keep the first entry
        (MetadataValue::List(values), ValueKind::Text) => values.first().cloned().unwrap_or_default(),
        (MetadataValue::Integer(n), ValueKind::Integer) => n.to_string(),
        (MetadataValue::Date(date), ValueKind::Date) => date.to_string(),
        (MetadataValue::Date(date), ValueKind::Integer) => format!("{:04}", date.year),
        (MetadataValue::Position { number, total }, ValueKind::Position) => match total {
            Some(total) => format!("{}/{}", number, total),
            None => number.to_string(),
        },
        (MetadataValue::Position { number, .. }, ValueKind::Integer) => number.to_string(),
        (MetadataValue::Binary(art), ValueKind::Binary) => {
            return Ok(RawValue::Binary {
                mime_type: art.mime_type.clone(),
                description: art.description.clone(),
                data: art.data.clone(),
            });
        }
        (value, kind) => {
            return Err(FrameWriteError::new(
                target.frame,
                format!("a {} value cannot be stored in a {} frame", value.kind(), kind),
            ));
        }
    };

    Ok(RawValue::Text(text))
}

fn parse_integer(text: &str) -> Result<u32, String> {
    text.trim()
        .parse::<u32>()
        .map_err(|_| format!("{:?} is not a number", text))
}

/// Parses `n` or `n/total`.
fn parse_position(text: &str) -> Result<(u32, Option<u32>), String> {
    match text.split_once('/') {
        Some((number, total)) => {
            let total = if total.trim().is_empty() { None } else { Some(parse_integer(total)?) };
            Ok((parse_integer(number)?, total))
        }
        None => Ok((parse_integer(text)?, None)),
    }
}

/// Splits a multi-value frame. Numeric genre references such as `(17)`
/// become the genre name.
fn split_values(text: &str, config: &TaggerConfig) -> Vec<String> {
    let mut parts = vec![text.to_string()];
    for separator in config.read_separators() {
        parts = parts
            .iter()
            .flat_map(|p| p.split(separator.as_str()))
            .map(str::to_string)
            .collect();
    }

    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .map(|p| genre_name(&p).unwrap_or(p))
        .collect()
}

/// Name of an ID3v1 genre reference. Bare numbers are genre text ("2 Step",
/// "80"), only the parenthesised form is a reference.
fn genre_name(part: &str) -> Option<String> {
    static GENRE_REF: OnceLock<Option<Regex>> = OnceLock::new();
    let genre_ref = GENRE_REF.get_or_init(|| Regex::new(r"^\((\d{1,3})\)$").ok()).as_ref()?;
    let index = genre_ref.captures(part)?[1].parse::<usize>().ok()?;
    GENRES.get(index).map(|g| g.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{FrameId, LegacyField};

    fn target(frame: FrameId, kind: ValueKind) -> FrameTarget {
        FrameTarget { frame, kind, priority: 0 }
    }

    fn text(s: &str) -> RawValue {
        RawValue::Text(s.to_string())
    }

    #[test]
    fn test_decode_dates() {
        let config = TaggerConfig::default();
        let tdrc = target(FrameId::V2("TDRC"), ValueKind::Date);
        let year = target(FrameId::V1(LegacyField::Year), ValueKind::Integer);

        assert_eq!(
            decode(&tdrc, ValueKind::Date, text("2001-03-12"), &config),
            Ok(MetadataValue::Date(PartialDate { year: 2001, month: Some(3), day: Some(12) }))
        );
        assert_eq!(
            decode(&year, ValueKind::Date, text("1999"), &config),
            Ok(MetadataValue::Date(PartialDate::year(1999)))
        );
        assert!(decode(&tdrc, ValueKind::Date, text("last spring"), &config).is_err());
        assert!(decode(&year, ValueKind::Date, text("19x9"), &config).is_err());
    }

    #[test]
    fn test_decode_positions() {
        let config = TaggerConfig::default();
        let trck = target(FrameId::V2("TRCK"), ValueKind::Position);
        let legacy = target(FrameId::V1(LegacyField::Track), ValueKind::Integer);

        assert_eq!(
            decode(&trck, ValueKind::Position, text("3/12"), &config),
            Ok(MetadataValue::Position { number: 3, total: Some(12) })
        );
        assert_eq!(
            decode(&trck, ValueKind::Position, text("7"), &config),
            Ok(MetadataValue::Position { number: 7, total: None })
        );
        assert_eq!(
            decode(&legacy, ValueKind::Position, text("4"), &config),
            Ok(MetadataValue::Position { number: 4, total: None })
        );
        assert!(decode(&trck, ValueKind::Position, text("three"), &config).is_err());
    }

    #[test]
    fn test_decode_genres() {
        let tcon = target(FrameId::V2("TCON"), ValueKind::MultiValue);
        let config = TaggerConfig::default();

        assert_eq!(
            decode(&tcon, ValueKind::MultiValue, text("House\0Electronic"), &config),
            Ok(MetadataValue::List(vec!["House".to_string(), "Electronic".to_string()]))
        );
        assert_eq!(
            decode(&tcon, ValueKind::MultiValue, text("(17)"), &config),
            Ok(MetadataValue::List(vec!["Rock".to_string()]))
        );
        assert_eq!(
            decode(&tcon, ValueKind::MultiValue, text("80\0(80)"), &config),
            Ok(MetadataValue::List(vec!["80".to_string(), "Folk".to_string()]))
        );
        assert_eq!(
            decode(&tcon, ValueKind::MultiValue, text(""), &config),
            Ok(MetadataValue::List(Vec::new()))
        );

        let config = TaggerConfig { use_null_separator: false, ..TaggerConfig::default() };
        assert_eq!(
            decode(&tcon, ValueKind::MultiValue, text("House; Electronic"), &config),
            Ok(MetadataValue::List(vec!["House".to_string(), "Electronic".to_string()]))
        );
    }

    #[test]
    fn test_integer_is_strict() {
        let config = TaggerConfig::default();
        let tbpm = target(FrameId::V2("TBPM"), ValueKind::Integer);

        assert_eq!(decode(&tbpm, ValueKind::Integer, text(" 128 "), &config), Ok(MetadataValue::Integer(128)));
        assert!(decode(&tbpm, ValueKind::Integer, text("fast"), &config).is_err());
    }

    #[test]
    fn test_binary_mismatch() {
        let config = TaggerConfig::default();
        let tit2 = target(FrameId::V2("TIT2"), ValueKind::Text);
        let raw = RawValue::Binary { mime_type: "image/png".to_string(), description: String::new(), data: vec![0] };
        assert!(decode(&tit2, ValueKind::Text, raw, &config).is_err());
    }

    #[test]
    fn test_encode_targets() {
        let config = TaggerConfig::default();
        let date = MetadataValue::Date(PartialDate { year: 2001, month: Some(3), day: None });

        assert_eq!(
            encode(&target(FrameId::V2("TDRC"), ValueKind::Date), &date, &config),
            Ok(text("2001-03"))
        );
        assert_eq!(
            encode(&target(FrameId::V2("TYER"), ValueKind::Integer), &date, &config),
            Ok(text("2001"))
        );

        let genres = MetadataValue::List(vec!["House".to_string(), "Electronic".to_string()]);
        assert_eq!(
            encode(&target(FrameId::V2("TCON"), ValueKind::MultiValue), &genres, &config),
            Ok(text("House\0Electronic"))
        );
        assert_eq!(
            encode(&target(FrameId::V1(LegacyField::Genre), ValueKind::Text), &genres, &config),
            Ok(text("House"))
        );

        let track = MetadataValue::Position { number: 3, total: Some(12) };
        assert_eq!(
            encode(&target(FrameId::V1(LegacyField::Track), ValueKind::Integer), &track, &config),
            Ok(text("3"))
        );
    }

    #[test]
    fn test_encode_rejects_impossible_dates() {
        let config = TaggerConfig::default();
        let tdrc = target(FrameId::V2("TDRC"), ValueKind::Date);

        let five_digits = MetadataValue::Date(PartialDate { year: 12345, month: None, day: None });
        assert_eq!(encode(&tdrc, &five_digits, &config).unwrap_err().frame, FrameId::V2("TDRC"));

        let no_month = MetadataValue::Date(PartialDate { year: 2001, month: None, day: Some(12) });
        assert!(encode(&tdrc, &no_month, &config).is_err());
    }

    #[test]
    fn test_encode_kind_mismatch() {
        let config = TaggerConfig::default();
        let result = encode(
            &target(FrameId::V2("TIT2"), ValueKind::Text),
            &MetadataValue::Integer(5),
            &config,
        );
        assert_eq!(result.unwrap_err().frame, FrameId::V2("TIT2"));
    }
}

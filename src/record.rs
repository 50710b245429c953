use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::mapping::{CanonicalKey, ValueKind};

/// A date that keeps the precision it was written with ("2001", "2001-03", "2001-03-12").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartialDate {
    pub year: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u8>,
}

impl PartialDate {
    pub fn year(year: u16) -> Self {
        Self { year, month: None, day: None }
    }

    /// Checks what the type cannot: a four-digit year, calendar ranges, and
    /// no day without a month.
    pub fn validate(&self) -> Result<(), String> {
        if self.year > 9999 {
            return Err(format!("year {} has more than four digits", self.year));
        }
        if self.month.is_some_and(|m| !(1..=12).contains(&m)) {
            return Err(format!("month out of range in {}", self));
        }
        match (self.month, self.day) {
            (None, Some(day)) => Err(format!("day {} given without a month", day)),
            (_, Some(day)) if !(1..=31).contains(&day) => Err(format!("day out of range in {}", self)),
            _ => Ok(()),
        }
    }
}

fn date_pattern() -> Result<&'static Regex, String> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\d{4})(?:-(\d{2})(?:-(\d{2}))?)?(?:[T ].*)?$"))
        .as_ref()
        .map_err(|e| e.to_string())
}

impl Display for PartialDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}", self.year)?;
        if let Some(month) = self.month {
            write!(f, "-{month:02}")?;
            if let Some(day) = self.day {
                write!(f, "-{day:02}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for PartialDate {
    type Err = String;

    /// Accepts `YYYY`, `YYYY-MM` and `YYYY-MM-DD`; a trailing time part
    /// (`T13:45`, ` 13:45`) is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = date_pattern()?
            .captures(s.trim())
            .ok_or_else(|| format!("not a date: {s:?}"))?;

        let year = caps[1].parse::<u16>().map_err(|e| e.to_string())?;
        let month = match caps.get(2) {
            Some(m) => Some(m.as_str().parse::<u8>().map_err(|e| e.to_string())?),
            None => None,
        };
        let day = match caps.get(3) {
            Some(d) => Some(d.as_str().parse::<u8>().map_err(|e| e.to_string())?),
            None => None,
        };

        let date = Self { year, month, day };
        date.validate().map_err(|e| format!("{e}: {s:?}"))?;
        Ok(date)
    }
}

/// An embedded picture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artwork {
    pub mime_type: String,
    #[serde(default)]
    pub description: String,
    pub data: Vec<u8>,
}

/// Typed value of one canonical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataValue {
    Text(String),
    Integer(u32),
    Date(PartialDate),
    Binary(Artwork),
    List(Vec<String>),
    Position { number: u32, total: Option<u32> },
}

impl MetadataValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            MetadataValue::Text(_) => ValueKind::Text,
            MetadataValue::Integer(_) => ValueKind::Integer,
            MetadataValue::Date(_) => ValueKind::Date,
            MetadataValue::Binary(_) => ValueKind::Binary,
            MetadataValue::List(_) => ValueKind::MultiValue,
            MetadataValue::Position { .. } => ValueKind::Position,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl Display for MetadataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataValue::Text(s) => write!(f, "{s}"),
            MetadataValue::Integer(n) => write!(f, "{n}"),
            MetadataValue::Date(d) => write!(f, "{d}"),
            MetadataValue::Binary(art) => {
                write!(f, "<{}, {} bytes>", art.mime_type, art.data.len())
            }
            MetadataValue::List(values) => write!(f, "{}", values.join("; ")),
            MetadataValue::Position { number, total: Some(total) } => write!(f, "{number}/{total}"),
            MetadataValue::Position { number, total: None } => write!(f, "{number}"),
        }
    }
}

/// Canonical, format-agnostic metadata of one file.
///
/// A missing key means "not present in the file", which is not the same as
/// an empty text value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataRecord {
    fields: BTreeMap<CanonicalKey, MetadataValue>,
}

impl MetadataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: CanonicalKey) -> Option<&MetadataValue> {
        self.fields.get(&key)
    }

    pub fn set(&mut self, key: CanonicalKey, value: MetadataValue) -> Option<MetadataValue> {
        self.fields.insert(key, value)
    }

    pub fn contains(&self, key: CanonicalKey) -> bool {
        self.fields.contains_key(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalKey, &MetadataValue)> {
        self.fields.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn text(&self, key: CanonicalKey) -> Option<&str> {
        self.get(key).and_then(MetadataValue::as_text)
    }
}

impl FromIterator<(CanonicalKey, MetadataValue)> for MetadataRecord {
    fn from_iter<T: IntoIterator<Item = (CanonicalKey, MetadataValue)>>(iter: T) -> Self {
        Self { fields: iter.into_iter().collect() }
    }
}

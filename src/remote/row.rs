//! Name-keyed result rows with typed accessors.

use crate::error::{CacheError, CacheResult};
use chrono::{NaiveDate, NaiveDateTime};

/// A single decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteValue {
    Null,
    Int(i64),
    Double(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

/// Formats accepted when a timestamp arrives as text.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse a textual timestamp. Bare dates resolve to midnight.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    let text = text.strip_suffix('Z').unwrap_or(text);
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// A result row. Field lookup ignores case, since dictionaries differ in how they
/// fold unquoted identifiers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteRow {
    fields: Vec<(String, RemoteValue)>,
}

impl RemoteRow {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: RemoteValue) {
        self.fields.push((name.into(), value));
    }

    /// Builder-style push, handy for fixtures.
    pub fn with(mut self, name: impl Into<String>, value: RemoteValue) -> Self {
        self.push(name, value);
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&RemoteValue> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn is_null(&self, name: &str) -> bool {
        matches!(self.get(name), None | Some(RemoteValue::Null))
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            RemoteValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Text value, with numbers and timestamps rendered as text.
    pub fn string(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            RemoteValue::Null => None,
            RemoteValue::Text(s) => Some(s.clone()),
            RemoteValue::Int(v) => Some(v.to_string()),
            RemoteValue::Double(v) => Some(v.to_string()),
            RemoteValue::Timestamp(v) => Some(v.to_string()),
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            RemoteValue::Int(v) => Some(*v),
            RemoteValue::Double(v) if v.is_finite() => Some(v.round() as i64),
            RemoteValue::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|v| v.round() as i64))
            }
            _ => None,
        }
    }

    pub fn double(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            RemoteValue::Double(v) => Some(*v),
            RemoteValue::Int(v) => Some(*v as f64),
            RemoteValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn date(&self, name: &str) -> Option<NaiveDateTime> {
        match self.get(name)? {
            RemoteValue::Timestamp(v) => Some(*v),
            RemoteValue::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }

    /// Dictionary yes/no flag: `Y`, `YES`, `TRUE` or a non-zero number.
    pub fn flag(&self, name: &str) -> bool {
        match self.get(name) {
            Some(RemoteValue::Text(s)) => matches!(
                s.trim().to_ascii_uppercase().as_str(),
                "Y" | "YES" | "TRUE"
            ),
            Some(RemoteValue::Int(v)) => *v != 0,
            _ => false,
        }
    }

    /// Text value that must be present.
    pub fn required_str(&self, name: &str) -> CacheResult<&str> {
        self.str(name).ok_or_else(|| {
            CacheError::remote_query(format!("Missing or non-text column: {name}"), None)
        })
    }
}

//! # Object Identifiers
//!
//! Schema-like names for task reactor instances. Unquoted identifiers are
//! case-insensitive, quoted identifiers are compared verbatim. Equality and
//! hashing go through the canonical form so `kartofelek`, `KARTOFELEK` and
//! `"KARTOFELEK"` all name the same instance.

use crate::error::{Result, TaskReactorError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

const MAX_IDENTIFIER_LENGTH: usize = 255;

#[derive(Debug, Clone)]
pub struct Identifier {
    raw: String,
    quoted: bool,
    canonical: String,
}

impl Identifier {
    /// Strict constructor, accepts only a valid unquoted or quoted identifier
    pub fn new(raw: impl AsRef<str>) -> Result<Self> {
        let raw = raw.as_ref();

        if is_valid_unquoted(raw) {
            return Ok(Self::unquoted(raw));
        }
        if is_valid_quoted(raw) {
            return Ok(Self::quoted(raw));
        }

        Err(TaskReactorError::Validation(format!(
            "'{raw}' is not a valid identifier"
        )))
    }

    /// Builds an identifier from any non-empty input, quoting it when it is
    /// not already a valid identifier
    pub fn from_with_auto_quoting(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref();

        if is_valid_unquoted(raw) {
            Self::unquoted(raw)
        } else if is_valid_quoted(raw) {
            Self::quoted(raw)
        } else {
            Self::quoted(&format!("\"{}\"", raw.replace('"', "\"\"")))
        }
    }

    fn unquoted(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            quoted: false,
            canonical: raw.to_uppercase(),
        }
    }

    fn quoted(raw: &str) -> Self {
        let inner = &raw[1..raw.len() - 1];
        Self {
            raw: raw.to_string(),
            quoted: true,
            canonical: inner.replace("\"\"", "\""),
        }
    }

    /// The identifier as written in SQL
    pub fn to_sql_string(&self) -> &str {
        &self.raw
    }

    /// Case-resolved name used for comparisons
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn is_quoted(&self) -> bool {
        self.quoted
    }
}

fn is_valid_unquoted(raw: &str) -> bool {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    raw.len() <= MAX_IDENTIFIER_LENGTH
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn is_valid_quoted(raw: &str) -> bool {
    if raw.len() < 3 || !raw.starts_with('"') || !raw.ends_with('"') {
        return false;
    }
    let inner = &raw[1..raw.len() - 1];
    if inner.len() > MAX_IDENTIFIER_LENGTH {
        return false;
    }

    // every inner quote must be doubled
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '"' && chars.next() != Some('"') {
            return false;
        }
    }
    true
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for Identifier {}

impl Hash for Identifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl std::str::FromStr for Identifier {
    type Err = TaskReactorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Identifier::new(&raw).map_err(serde::de::Error::custom)
    }
}

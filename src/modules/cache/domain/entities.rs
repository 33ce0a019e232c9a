/// Domain types of the persistent cache
///
/// A stored row is either a payload or an explicit "nothing there" marker;
/// both are distinct from the row being absent or expired.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Result of one cache read
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<T> {
    /// Fresh entry with a value
    Hit(T),
    /// Fresh entry recording that the provider has nothing for this key
    NegativeHit,
    /// Absent or older than the TTL
    Miss,
}

impl<T> CacheLookup<T> {
    /// Collapse a fresh entry into `Some(value | None)`, a miss into `None`.
    pub fn into_found(self) -> Option<Option<T>> {
        match self {
            CacheLookup::Hit(value) => Some(Some(value)),
            CacheLookup::NegativeHit => Some(None),
            CacheLookup::Miss => None,
        }
    }
}

/// Payload group stored in the detail table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailKind {
    Movie,
    Credits,
    Keywords,
}

impl DetailKind {
    pub const EXTENDED: [DetailKind; 2] = [DetailKind::Credits, DetailKind::Keywords];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetailKind::Movie => "movie",
            DetailKind::Credits => "credits",
            DetailKind::Keywords => "keywords",
        }
    }
}

impl std::fmt::Display for DetailKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DetailKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(DetailKind::Movie),
            "credits" => Ok(DetailKind::Credits),
            "keywords" => Ok(DetailKind::Keywords),
            _ => Err(format!("Invalid detail kind: {}", s)),
        }
    }
}

/// Trim and case-fold a title for use as a lookup key.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Lookup key: normalized title plus year, `0` when the year is unknown
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    pub title: String,
    pub year: i32,
}

impl SearchKey {
    pub fn new(title: &str, year: Option<i32>) -> Self {
        Self {
            title: normalize_title(title),
            year: year.unwrap_or(0),
        }
    }

    /// Year as sent to the provider (`0` means "don't filter")
    pub fn year_filter(&self) -> Option<i32> {
        (self.year != 0).then_some(self.year)
    }
}

/// A write waiting in the writer queue. Not visible to readers until flushed.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWrite {
    Search {
        key: SearchKey,
        tmdb_id: Option<i64>,
    },
    Detail {
        kind: DetailKind,
        tmdb_id: i64,
        payload_json: Option<String>,
    },
}

/// Format used for `updated_at` columns
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339()
}

/// An entry is fresh while younger than the TTL. Unreadable timestamps count as expired.
pub fn is_fresh(updated_at: &str, ttl: Duration, now: DateTime<Utc>) -> bool {
    match DateTime::parse_from_rfc3339(updated_at) {
        Ok(ts) => now.signed_duration_since(ts.with_timezone(&Utc)) < ttl,
        Err(_) => false,
    }
}

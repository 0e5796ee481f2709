//! Identity and timestamp fields shared by every entity.
//!
//! # Invariants
//! - `id` is a UUID v4 string assigned once at construction.
//! - Timestamps are UTC with microsecond precision so they survive a text
//!   round trip through either backend unchanged.

use chrono::{NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Textual timestamp layout used by the JSON document and the SQL columns.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Fields every persisted object carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseFields {
    pub id: String,
    #[serde(with = "timestamp")]
    pub created_at: NaiveDateTime,
    #[serde(with = "timestamp")]
    pub updated_at: NaiveDateTime,
}

impl BaseFields {
    /// Fresh identity: new UUID, both timestamps set to now.
    pub fn new() -> Self {
        let now = now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Refreshes `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = now();
    }
}

impl Default for BaseFields {
    fn default() -> Self {
        Self::new()
    }
}

/// Current UTC time truncated to the precision persisted on disk.
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(6)
}

/// Formats a timestamp with [`TIMESTAMP_FORMAT`].
pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a timestamp written by [`format_timestamp`].
///
/// Accepts any number of fractional digits, including none.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
}

pub(crate) mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_timestamp(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::{format_timestamp, parse_timestamp, BaseFields};

    #[test]
    fn new_fields_have_distinct_ids_and_equal_timestamps() {
        let first = BaseFields::new();
        let second = BaseFields::new();
        assert_ne!(first.id, second.id);
        assert_eq!(first.created_at, first.updated_at);
    }

    #[test]
    fn formatted_timestamp_parses_back_exactly() {
        let fields = BaseFields::new();
        let text = format_timestamp(&fields.created_at);
        assert_eq!(parse_timestamp(&text).unwrap(), fields.created_at);
    }

    #[test]
    fn parse_accepts_timestamps_without_fraction() {
        let parsed = parse_timestamp("2017-09-28T21:03:54").unwrap();
        assert_eq!(format_timestamp(&parsed), "2017-09-28T21:03:54.000000");
    }

    #[test]
    fn touch_moves_updated_at_forward() {
        let mut fields = BaseFields::new();
        let before = fields.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        fields.touch();
        assert!(fields.updated_at > before);
        assert_eq!(fields.created_at, before);
    }
}

//! Output records of an aggregation run.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// One concrete appearance of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub id: String,
    pub title: String,
    #[serde(serialize_with = "serialize_instant")]
    pub start: DateTime<Utc>,
    #[serde(serialize_with = "serialize_instant")]
    pub end: DateTime<Utc>,
    pub description: String,
    pub location: String,
    pub calendar_name: String,
    pub color: String,
    pub is_recurring: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total: usize,
    pub single: usize,
    pub recurring: usize,
}

impl Stats {
    pub fn count(events: &[Occurrence]) -> Self {
        let recurring = events.iter().filter(|e| e.is_recurring).count();
        Stats {
            total: events.len(),
            single: events.len() - recurring,
            recurring,
        }
    }
}

/// The merged, sorted result of one run across all feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedResult {
    pub events: Vec<Occurrence>,
    #[serde(serialize_with = "serialize_instant")]
    pub last_updated: DateTime<Utc>,
    pub calendars_processed: usize,
    pub stats: Stats,
    /// Skipped feeds and truncations; logged, not sent to clients
    #[serde(skip)]
    pub warnings: Vec<String>,
}

/// ISO-8601 in UTC with millisecond precision, e.g. `2024-01-01T10:00:00.000Z`
fn serialize_instant<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

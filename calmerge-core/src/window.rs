//! The time window occurrences are materialized in.

use chrono::{DateTime, Duration, Utc};

use crate::constants::{FUTURE_WINDOW_DAYS, PAST_WINDOW_DAYS};

/// Inclusive bounds around a fixed "now".
///
/// Captured once per aggregation run so every feed sees the same window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub now: DateTime<Utc>,
    pub past_limit: DateTime<Utc>,
    pub future_limit: DateTime<Utc>,
}

impl Window {
    /// Default window: `PAST_WINDOW_DAYS` back, `FUTURE_WINDOW_DAYS` ahead.
    pub fn around(now: DateTime<Utc>) -> Self {
        Window {
            now,
            past_limit: now - Duration::days(PAST_WINDOW_DAYS),
            future_limit: now + Duration::days(FUTURE_WINDOW_DAYS),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.past_limit && instant <= self.future_limit
    }

    /// True once `instant` is past the window; no later instant can fall in it.
    pub fn is_beyond(&self, instant: DateTime<Utc>) -> bool {
        instant > self.future_limit
    }
}

use std::time::Duration;

/// How far back from "now" occurrences are still materialized.
pub const PAST_WINDOW_DAYS: i64 = 30;

/// How far ahead of "now" occurrences are materialized.
pub const FUTURE_WINDOW_DAYS: i64 = 90;

/// Upper bound on occurrences a single feed may contribute to one run.
pub const MAX_OCCURRENCES_PER_FEED: usize = 10_000;

/// Default timeout for fetching one feed.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default feed list location, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "calendar-locations.json";

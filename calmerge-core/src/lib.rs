//! Core of calmerge: merges remote iCalendar feeds into one event list.
//!
//! - `ics` parses feed text into `EventComponent`s
//! - `exceptions` and `expand` turn recurring masters, EXDATEs and modified
//!   instances into concrete occurrences inside a `Window`
//! - `aggregate` runs all of it per feed and merges the results

pub mod aggregate;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod exceptions;
pub mod expand;
pub mod feed;
pub mod ics;
pub mod occurrence;
pub mod recurrence;
pub mod window;

pub use aggregate::{Aggregator, FeedOutcome};
pub use config::{CalendarFeed, FeedConfig};
pub use error::{CalMergeError, CalMergeResult};
pub use feed::{FeedSource, HttpFeedSource};
pub use occurrence::{AggregatedResult, Occurrence, Stats};
pub use window::Window;

//! ICS feed parsing.
//!
//! Turns raw iCalendar text into `EventComponent`s according to RFC 5545.

mod parse;

pub use parse::parse_components;

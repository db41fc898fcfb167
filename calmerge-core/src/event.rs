//! Parsed event model consumed by the expansion engine.
//!
//! These types are the narrow view of a `VEVENT` that the rest of the crate
//! works with. The ICS parser produces them; the exception index, expander and
//! aggregator never look at parser types directly.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use icu::time::zone::WindowsParser;
use icu::time::zone::iana::IanaParserExtended;

/// A DTSTART/DTEND style value, preserving how the feed expressed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTime {
    /// All-day value (`VALUE=DATE`)
    Date(NaiveDate),
    /// Absolute instant (`...Z`)
    DateTimeUtc(DateTime<Utc>),
    /// Wall-clock time without a zone
    DateTimeFloating(NaiveDateTime),
    /// Wall-clock time in a named zone (`TZID=...`)
    DateTimeZoned { datetime: NaiveDateTime, tzid: String },
}

impl EventTime {
    /// Resolve to a UTC instant.
    ///
    /// Dates become midnight UTC and floating times are read as UTC. A zoned
    /// value whose TZID is not in the tz database falls back to floating
    /// semantics, so every value the parser produced is comparable.
    pub fn to_utc(&self) -> DateTime<Utc> {
        match self {
            EventTime::Date(d) => d.and_time(NaiveTime::MIN).and_utc(),
            EventTime::DateTimeUtc(dt) => *dt,
            EventTime::DateTimeFloating(dt) => dt.and_utc(),
            EventTime::DateTimeZoned { datetime, tzid } => match parse_tzid(tzid) {
                Some(tz) => local_to_utc(&tz, datetime),
                None => datetime.and_utc(),
            },
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }

    /// The resolvable time zone of a zoned value.
    pub fn zone(&self) -> Option<Tz> {
        match self {
            EventTime::DateTimeZoned { tzid, .. } => parse_tzid(tzid),
            _ => None,
        }
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EventTime::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            EventTime::DateTimeUtc(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%SZ")),
            EventTime::DateTimeFloating(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            EventTime::DateTimeZoned { datetime, tzid } => {
                write!(f, "{} ({})", datetime.format("%Y-%m-%dT%H:%M:%S"), tzid)
            }
        }
    }
}

/// Resolve a TZID against the tz database. Exchange/Outlook feeds name zones
/// the Windows way (`W. Europe Standard Time`), Mozilla-style clients prefix
/// them (`/mozilla.org/...`); both are mapped to their IANA zone.
pub(crate) fn parse_tzid(tzid: &str) -> Option<Tz> {
    let tzid = tzid.trim_matches('"');
    if let Ok(tz) = tzid.parse::<Tz>() {
        return Some(tz);
    }

    let stripped = tzid
        .strip_prefix("/mozilla.org/")
        .or_else(|| tzid.strip_prefix("/softwarestudio.org/"))
        .unwrap_or(tzid);
    if let Ok(tz) = stripped.parse::<Tz>() {
        return Some(tz);
    }

    let zone = WindowsParser::new().parse(stripped, None)?;
    IanaParserExtended::new()
        .iter()
        .find(|entry| entry.time_zone == zone)
        .and_then(|entry| entry.canonical.parse::<Tz>().ok())
}

/// Map a wall-clock time in `tz` to UTC. Ambiguous times take the earlier
/// instant; times inside a DST gap are pushed forward by the gap.
pub(crate) fn local_to_utc(tz: &Tz, datetime: &NaiveDateTime) -> DateTime<Utc> {
    tz.from_local_datetime(datetime)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(*datetime + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| datetime.and_utc())
}

/// A RECURRENCE-ID or EXDATE value as found in the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateValue {
    Parsed(EventTime),
    /// The property was present but its value could not be read as a date.
    Invalid(String),
}

impl DateValue {
    pub fn resolve(&self) -> Option<DateTime<Utc>> {
        match self {
            DateValue::Parsed(time) => Some(time.to_utc()),
            DateValue::Invalid(_) => None,
        }
    }
}

impl From<EventTime> for DateValue {
    fn from(time: EventTime) -> Self {
        DateValue::Parsed(time)
    }
}

/// RRULE and RDATE lines of a master event.
///
/// EXDATEs are kept on the component instead: exclusion is applied by the
/// expander, not by the rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recurrence {
    pub rrule: String,
    pub rdates: Vec<EventTime>,
}

impl Recurrence {
    pub fn new(rrule: impl Into<String>) -> Self {
        Recurrence {
            rrule: rrule.into(),
            rdates: Vec::new(),
        }
    }
}

/// One parsed `VEVENT`.
#[derive(Debug, Clone, Default)]
pub struct EventComponent {
    pub uid: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<EventTime>,
    pub end: Option<EventTime>,
    /// DURATION property, used when DTEND is absent
    pub duration: Option<Duration>,
    /// Set on modified instances of a recurring series
    pub recurrence_id: Option<DateValue>,
    pub exdates: Vec<DateValue>,
    pub recurrence: Option<Recurrence>,
}

impl EventComponent {
    pub fn new(uid: impl Into<String>, start: EventTime) -> Self {
        EventComponent {
            uid: uid.into(),
            start: Some(start),
            ..Default::default()
        }
    }

    /// True for modified instances; these are only reached through the
    /// exception index, never expanded on their own.
    pub fn is_override(&self) -> bool {
        self.recurrence_id.is_some()
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    pub fn start_utc(&self) -> Option<DateTime<Utc>> {
        self.start.as_ref().map(EventTime::to_utc)
    }

    /// DTEND if present, else DTSTART + DURATION, else one day for all-day
    /// events and zero length otherwise.
    pub fn end_utc(&self) -> Option<DateTime<Utc>> {
        let start = self.start.as_ref()?;
        if let Some(end) = &self.end {
            return Some(end.to_utc());
        }
        let start_utc = start.to_utc();
        Some(match self.duration {
            Some(duration) => start_utc + duration,
            None if start.is_date() => start_utc + Duration::days(1),
            None => start_utc,
        })
    }

    /// Length of the event as defined by its own start and end.
    pub fn length(&self) -> Option<Duration> {
        Some(self.end_utc()? - self.start_utc()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    #[test]
    fn windows_zone_names_resolve() {
        assert_eq!(parse_tzid("W. Europe Standard Time"), Some(Tz::Europe__Berlin));
        assert_eq!(parse_tzid("Eastern Standard Time"), Some(Tz::America__New_York));
        assert_eq!(parse_tzid("/mozilla.org/Europe/Paris"), Some(Tz::Europe__Paris));
        assert_eq!(parse_tzid("Mars/Olympus_Mons"), None);

        let time = EventTime::DateTimeZoned {
            datetime: naive("2024-07-01T10:00:00"),
            tzid: "W. Europe Standard Time".to_string(),
        };
        assert_eq!(time.to_utc().to_rfc3339(), "2024-07-01T08:00:00+00:00");
    }

    #[test]
    fn zoned_time_resolves_through_tz_database() {
        let time = EventTime::DateTimeZoned {
            datetime: naive("2024-07-01T10:00:00"),
            tzid: "Europe/Berlin".to_string(),
        };
        assert_eq!(time.to_utc().to_rfc3339(), "2024-07-01T08:00:00+00:00");
    }

    #[test]
    fn unknown_tzid_falls_back_to_floating() {
        let time = EventTime::DateTimeZoned {
            datetime: naive("2024-07-01T10:00:00"),
            tzid: "Custom/Nowhere".to_string(),
        };
        assert_eq!(time.to_utc().to_rfc3339(), "2024-07-01T10:00:00+00:00");
        assert!(time.zone().is_none());
    }

    #[test]
    fn time_in_dst_gap_moves_forward() {
        // 02:30 does not exist in Berlin on 2024-03-31
        let utc = local_to_utc(&Tz::Europe__Berlin, &naive("2024-03-31T02:30:00"));
        assert_eq!(utc.to_rfc3339(), "2024-03-31T01:30:00+00:00");
    }

    #[test]
    fn end_falls_back_to_duration_then_day_length() {
        let start = EventTime::DateTimeUtc(naive("2024-01-01T10:00:00").and_utc());
        let mut event = EventComponent::new("a", start.clone());
        assert_eq!(event.length(), Some(Duration::zero()));

        event.duration = Some(Duration::minutes(45));
        assert_eq!(event.length(), Some(Duration::minutes(45)));

        event.end = Some(EventTime::DateTimeUtc(naive("2024-01-01T12:00:00").and_utc()));
        assert_eq!(event.length(), Some(Duration::hours(2)));

        let all_day = EventComponent::new(
            "b",
            EventTime::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
        );
        assert_eq!(all_day.length(), Some(Duration::days(1)));
    }

    #[test]
    fn invalid_date_value_does_not_resolve() {
        assert!(DateValue::Invalid("garbage".into()).resolve().is_none());
    }
}

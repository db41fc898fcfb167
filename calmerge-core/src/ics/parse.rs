//! Feed parsing using the icalendar crate's parser.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{Component, Property, read_calendar, unfold},
};

use crate::error::{CalMergeError, CalMergeResult};
use crate::event::{DateValue, EventComponent, EventTime, Recurrence, parse_tzid};

/// Parse a whole feed into its `VEVENT`s, in document order.
///
/// Only a document that is not iCalendar at all is an error; individual
/// events with unreadable values are kept and left for the expander to judge.
pub fn parse_components(content: &str) -> CalMergeResult<Vec<EventComponent>> {
    let unfolded = unfold(content);
    if !unfolded.to_ascii_uppercase().contains("BEGIN:VCALENDAR") {
        return Err(CalMergeError::IcsParse(
            "document has no VCALENDAR".to_string(),
        ));
    }

    let calendar = read_calendar(&unfolded).map_err(|e| CalMergeError::IcsParse(e.to_string()))?;

    let mut vevents = Vec::new();
    collect_vevents(&calendar.components, &mut vevents);

    Ok(vevents
        .into_iter()
        .enumerate()
        .map(|(index, vevent)| parse_vevent(vevent, index))
        .collect())
}

fn collect_vevents<'a>(components: &'a [Component<'a>], out: &mut Vec<&'a Component<'a>>) {
    for component in components {
        if component.name.as_ref().eq_ignore_ascii_case("VEVENT") {
            out.push(component);
        } else {
            collect_vevents(&component.components, out);
        }
    }
}

fn parse_vevent(vevent: &Component, index: usize) -> EventComponent {
    let uid = find_prop(vevent, "UID")
        .map(|p| p.val.to_string())
        .filter(|uid| !uid.trim().is_empty())
        .unwrap_or_else(|| format!("event-{index}"));

    let text = |name: &str| find_prop(vevent, name).map(|p| unescape_text(p.val.as_ref()));

    let start = find_prop(vevent, "DTSTART").and_then(parse_single_time);
    let end = find_prop(vevent, "DTEND").and_then(parse_single_time);
    let duration = find_prop(vevent, "DURATION")
        .and_then(|p| parse_duration(p.val.as_ref()));

    // RECURRENCE-ID for modified instances; keep unreadable values so the
    // component is still recognized as an override
    let recurrence_id = find_prop(vevent, "RECURRENCE-ID").map(|p| {
        parse_single_time(p)
            .map(DateValue::Parsed)
            .unwrap_or_else(|| DateValue::Invalid(p.val.to_string()))
    });

    let exdates: Vec<DateValue> = vevent
        .properties
        .iter()
        .filter(|p| is_named(p, "EXDATE"))
        .flat_map(parse_time_list)
        .collect();

    let recurrence = find_prop(vevent, "RRULE").map(|p| Recurrence {
        rrule: p.val.to_string(),
        rdates: vevent
            .properties
            .iter()
            .filter(|p| is_named(p, "RDATE"))
            .flat_map(parse_time_list)
            .filter_map(|value| match value {
                DateValue::Parsed(time) => Some(time),
                DateValue::Invalid(_) => None,
            })
            .collect(),
    });

    EventComponent {
        uid,
        summary: text("SUMMARY"),
        description: text("DESCRIPTION"),
        location: text("LOCATION"),
        start,
        end,
        duration,
        recurrence_id,
        exdates,
        recurrence,
    }
}

/// Property and parameter names are case-insensitive; the parser keeps them
/// as written.
fn is_named(prop: &Property, name: &str) -> bool {
    prop.name.as_ref().eq_ignore_ascii_case(name)
}

fn find_prop<'a>(vevent: &'a Component<'a>, name: &str) -> Option<&'a Property<'a>> {
    vevent.properties.iter().find(|p| is_named(p, name))
}

fn param<'a>(prop: &'a Property, key: &str) -> Option<&'a str> {
    prop.params
        .iter()
        .find(|p| p.key.as_ref().eq_ignore_ascii_case(key))
        .and_then(|p| p.val.as_ref().map(|v| v.as_ref()))
}

/// Read a DTSTART/DTEND/RECURRENCE-ID property, preserving timezone info.
fn parse_single_time(prop: &Property) -> Option<EventTime> {
    // DatePerhapsTime only sees an upper-case TZID
    let canonical = prop
        .params
        .iter()
        .all(|p| !p.key.as_ref().bytes().any(|b| b.is_ascii_lowercase()));

    match DatePerhapsTime::try_from(prop) {
        Ok(dpt) if canonical => Some(to_event_time(dpt)),
        _ => match parse_time_list(prop).into_iter().next()? {
            DateValue::Parsed(time) => Some(time),
            DateValue::Invalid(_) => None,
        },
    }
}

/// Convert icalendar's DatePerhapsTime to our EventTime, preserving timezone info
fn to_event_time(dpt: DatePerhapsTime) -> EventTime {
    match dpt {
        DatePerhapsTime::Date(d) => EventTime::Date(d),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            CalendarDateTime::Utc(dt) => EventTime::DateTimeUtc(dt),
            CalendarDateTime::Floating(naive) => EventTime::DateTimeFloating(naive),
            CalendarDateTime::WithTimezone { date_time, tzid } => zoned(date_time, tzid),
        },
    }
}

/// Parse an EXDATE/RDATE property into its values.
///
/// Handles:
/// - TZID parameter: `EXDATE;TZID=America/New_York:20240108T100000`
/// - VALUE=DATE: `EXDATE;VALUE=DATE:20240108`
/// - UTC: `EXDATE:20240108T100000Z`
/// - Floating: `EXDATE:20240108T100000`
/// - Comma-separated values: `EXDATE;TZID=...:20240108T100000,20240115T100000`
fn parse_time_list(prop: &Property) -> Vec<DateValue> {
    let tzid = param(prop, "TZID");
    let is_date = param(prop, "VALUE").is_some_and(|v| v.eq_ignore_ascii_case("DATE"));

    prop.val
        .as_ref()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            parse_time_value(s, is_date, tzid)
                .map(DateValue::Parsed)
                .unwrap_or_else(|| DateValue::Invalid(s.to_string()))
        })
        .collect()
}

fn parse_time_value(s: &str, is_date: bool, tzid: Option<&str>) -> Option<EventTime> {
    if is_date || s.len() == 8 {
        return NaiveDate::parse_from_str(s, "%Y%m%d").ok().map(EventTime::Date);
    }
    if let Some(utc) = s.strip_suffix('Z') {
        return NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
            .ok()
            .map(|dt| EventTime::DateTimeUtc(dt.and_utc()));
    }
    let datetime = NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S").ok()?;
    Some(match tzid {
        Some(tz) => zoned(datetime, tz.to_string()),
        None => EventTime::DateTimeFloating(datetime),
    })
}

fn zoned(datetime: NaiveDateTime, tzid: String) -> EventTime {
    if parse_tzid(&tzid).is_none() {
        tracing::debug!(%tzid, "Unknown TZID, reading local time as UTC");
    }
    EventTime::DateTimeZoned { datetime, tzid }
}

/// Parse a DURATION value (`PT1H30M`, `P1D`, `-PT15M`)
fn parse_duration(value: &str) -> Option<Duration> {
    let is_negative = value.starts_with('-');
    let duration_str = value.trim_start_matches(['-', '+']);

    let duration = iso8601::duration(duration_str).ok()?;
    let std_duration: std::time::Duration = duration.into();
    let duration = Duration::from_std(std_duration).ok()?;

    Some(if is_negative { -duration } else { duration })
}

/// Undo RFC 5545 TEXT escaping.
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

//! RRULE handling for recurring master events.
//!
//! Builds an `rrule::RRuleSet` from a master's DTSTART, RRULE and RDATE lines
//! and exposes its occurrences as a forward-only stream of UTC instants.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rrule::RRuleSet;

use crate::error::{CalMergeError, CalMergeResult};
use crate::event::{EventTime, Recurrence, local_to_utc};

const ICS_UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const ICS_LOCAL_FORMAT: &str = "%Y%m%dT%H%M%S";

/// A validated recurrence rule anchored at its master's start.
#[derive(Debug, Clone)]
pub struct RecurrenceRule {
    set: RRuleSet,
}

impl RecurrenceRule {
    /// The master's start is always the first instance of the series and
    /// counts toward COUNT, even when the rule itself would not produce it
    /// (a Tuesday start with `BYDAY=MO`).
    pub fn build(start: &EventTime, recurrence: &Recurrence) -> CalMergeResult<Self> {
        let rule = normalize_until(&recurrence.rrule, start);
        let dtstart = dtstart_line(start);

        let rule_only = parse_set(&[dtstart.clone(), format!("RRULE:{rule}")], recurrence)?;
        let anchor = *rule_only.get_dt_start();
        let rule_yields_start = (&rule_only).into_iter().next() == Some(anchor);

        let mut lines = vec![dtstart];
        if rule_yields_start {
            lines.push(format!("RRULE:{rule}"));
        } else {
            if let Some(rule) = count_without_start(&rule) {
                lines.push(format!("RRULE:{rule}"));
            }
            lines.push(format!(
                "RDATE:{}",
                anchor.with_timezone(&Utc).format(ICS_UTC_FORMAT)
            ));
        }
        for rdate in &recurrence.rdates {
            lines.push(format!("RDATE:{}", rdate.to_utc().format(ICS_UTC_FORMAT)));
        }

        let set = parse_set(&lines, recurrence)?;
        Ok(RecurrenceRule { set })
    }

    /// Candidate start instants, strictly in increasing order.
    pub fn candidates(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        // An RDATE that repeats a rule instance comes out of the set twice
        let mut last = None;
        (&self.set)
            .into_iter()
            .map(|dt| dt.with_timezone(&Utc))
            .filter(move |dt| last.replace(*dt) != Some(*dt))
    }
}

fn parse_set(lines: &[String], recurrence: &Recurrence) -> CalMergeResult<RRuleSet> {
    lines
        .join("\n")
        .parse()
        .map_err(|e| CalMergeError::Recurrence(format!("{}: {}", recurrence.rrule, e)))
}

/// The rule with one instance taken off COUNT, to make room for a start the
/// rule does not generate. `None` when that leaves no rule instances at all.
fn count_without_start(rule: &str) -> Option<String> {
    let mut parts = Vec::new();
    for part in rule.split(';') {
        match part.split_once('=') {
            Some((key, value)) if key.eq_ignore_ascii_case("COUNT") => {
                let count: u32 = value.trim().parse().ok()?;
                if count <= 1 {
                    return None;
                }
                parts.push(format!("COUNT={}", count - 1));
            }
            _ => parts.push(part.to_string()),
        }
    }
    Some(parts.join(";"))
}

/// DTSTART line for the rrule parser. Zoned starts keep their TZID so the
/// rule steps in local wall-clock time; everything else is pinned to UTC the
/// same way `EventTime::to_utc` resolves it.
fn dtstart_line(start: &EventTime) -> String {
    match (start, start.zone()) {
        (EventTime::DateTimeZoned { datetime, .. }, Some(tz)) => format!(
            "DTSTART;TZID={}:{}",
            tz.name(),
            datetime.format(ICS_LOCAL_FORMAT)
        ),
        (other, _) => format!("DTSTART:{}", other.to_utc().format(ICS_UTC_FORMAT)),
    }
}

/// Rewrite a non-UTC `UNTIL` as a UTC instant, interpreted in the master's
/// zone. The rrule parser rejects a local UNTIL next to a zoned or UTC start.
fn normalize_until(rrule: &str, start: &EventTime) -> String {
    rrule
        .trim()
        .split(';')
        .map(|part| match part.split_once('=') {
            Some((key, value)) if key.eq_ignore_ascii_case("UNTIL") => {
                match until_to_utc(value, start) {
                    Some(until) => format!("UNTIL={}", until.format(ICS_UTC_FORMAT)),
                    None => part.to_string(),
                }
            }
            _ => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn until_to_utc(value: &str, start: &EventTime) -> Option<DateTime<Utc>> {
    if value.ends_with('Z') {
        return None;
    }

    let local = if let Ok(date) = NaiveDate::parse_from_str(value, "%Y%m%d") {
        // A date UNTIL includes every occurrence on that day
        if start.is_date() {
            date.and_hms_opt(0, 0, 0)?
        } else {
            date.and_hms_opt(23, 59, 59)?
        }
    } else {
        NaiveDateTime::parse_from_str(value, ICS_LOCAL_FORMAT).ok()?
    };

    Some(match start.zone() {
        Some(tz) => local_to_utc(&tz, &local),
        None => local.and_utc(),
    })
}

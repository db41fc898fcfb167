//! Expansion of parsed event components into concrete occurrences.
//!
//! Single events pass straight through the window check. Recurring masters
//! walk their rule's candidates in order, drop EXDATEs, swap in modified
//! instances from the exception index and keep what lands in the window.

use chrono::{DateTime, Duration, Utc};

use crate::config::CalendarFeed;
use crate::error::{CalMergeError, CalMergeResult};
use crate::event::{EventComponent, EventTime, Recurrence};
use crate::exceptions::{ExceptionIndex, ExclusionSet};
use crate::occurrence::Occurrence;
use crate::recurrence::RecurrenceRule;
use crate::window::Window;

/// How many more occurrences a feed may emit in this run.
///
/// Each feed gets its own budget so a huge feed cannot crowd out the ones
/// after it and results don't depend on which fetch finished first. See
/// "Occurrence cap" in DESIGN.md before turning this into a shared limit.
#[derive(Debug, Clone)]
pub struct OccurrenceBudget {
    remaining: usize,
    truncated: bool,
}

impl OccurrenceBudget {
    pub fn new(limit: usize) -> Self {
        OccurrenceBudget {
            remaining: limit,
            truncated: false,
        }
    }

    /// Claim one occurrence. Returns false, and marks the budget truncated,
    /// once the limit has been reached.
    fn take(&mut self) -> bool {
        if self.remaining == 0 {
            self.truncated = true;
            return false;
        }
        self.remaining -= 1;
        true
    }

    /// True once an occurrence had to be dropped because of the limit.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// Occurrences of one feed.
#[derive(Debug, Default)]
pub struct FeedExpansion {
    pub occurrences: Vec<Occurrence>,
    /// Masters skipped because of unusable data, with the reason
    pub skipped: Vec<String>,
    pub truncated: bool,
}

/// Expand every top-level component of a feed, in document order.
pub fn expand_feed(
    feed: &CalendarFeed,
    components: &[EventComponent],
    window: &Window,
    budget: &mut OccurrenceBudget,
) -> FeedExpansion {
    let index = ExceptionIndex::build(components);
    let expander = Expander {
        feed,
        window,
        index: &index,
    };

    let mut expansion = FeedExpansion::default();
    for component in components.iter().filter(|c| !c.is_override()) {
        if budget.is_truncated() {
            break;
        }
        if let Err(reason) = expander.expand(component, budget, &mut expansion.occurrences) {
            tracing::warn!(
                calendar = %feed.name,
                uid = %component.uid,
                "Skipping event: {}",
                reason
            );
            expansion.skipped.push(format!("{}: {}", component.uid, reason));
        }
    }
    expansion.truncated = budget.is_truncated();

    expansion
}

struct Expander<'a> {
    feed: &'a CalendarFeed,
    window: &'a Window,
    index: &'a ExceptionIndex<'a>,
}

impl Expander<'_> {
    fn expand(
        &self,
        component: &EventComponent,
        budget: &mut OccurrenceBudget,
        out: &mut Vec<Occurrence>,
    ) -> CalMergeResult<()> {
        let Some(start) = &component.start else {
            return Err(CalMergeError::IcsParse(
                "missing or unreadable DTSTART".to_string(),
            ));
        };

        match &component.recurrence {
            None => {
                self.expand_single(component, start, budget, out);
                Ok(())
            }
            Some(recurrence) => self.expand_series(component, start, recurrence, budget, out),
        }
    }

    fn expand_single(
        &self,
        event: &EventComponent,
        start: &EventTime,
        budget: &mut OccurrenceBudget,
        out: &mut Vec<Occurrence>,
    ) {
        let start = start.to_utc();
        if !self.window.contains(start) || !budget.take() {
            return;
        }
        let end = event.end_utc().unwrap_or(start);

        out.push(self.occurrence(
            format!("{}-{}", self.feed.name, event.uid),
            event,
            start,
            end,
            false,
        ));
    }

    fn expand_series(
        &self,
        master: &EventComponent,
        start: &EventTime,
        recurrence: &Recurrence,
        budget: &mut OccurrenceBudget,
        out: &mut Vec<Occurrence>,
    ) -> CalMergeResult<()> {
        let rule = RecurrenceRule::build(start, recurrence)?;
        let exclusions = ExclusionSet::for_master(master);
        let master_length = master.length().unwrap_or_else(Duration::zero);

        for slot in rule.candidates() {
            if self.window.is_beyond(slot) {
                break;
            }
            // Exclusion is checked before overrides: an excluded slot stays
            // excluded even if a modified instance exists for it.
            if exclusions.contains(slot) || !self.window.contains(slot) {
                continue;
            }

            let (source, length) = match self.index.get(&master.uid, slot) {
                Some(modified) => (modified, override_length(modified).unwrap_or(master_length)),
                None => (master, master_length),
            };

            if !budget.take() {
                break;
            }
            out.push(self.occurrence(
                format!("{}-{}-{}", self.feed.name, master.uid, slot.timestamp_millis()),
                source,
                slot,
                slot + length,
                true,
            ));
        }

        Ok(())
    }

    fn occurrence(
        &self,
        id: String,
        source: &EventComponent,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        is_recurring: bool,
    ) -> Occurrence {
        Occurrence {
            id,
            title: source.summary.clone().unwrap_or_default(),
            start,
            end,
            description: source.description.clone().unwrap_or_default(),
            location: source.location.clone().unwrap_or_default(),
            calendar_name: self.feed.name.clone(),
            color: self.feed.color.clone(),
            is_recurring,
        }
    }
}

/// Length of a modified instance from its own start and end, if it has both.
fn override_length(modified: &EventComponent) -> Option<Duration> {
    if modified.end.is_none() && modified.duration.is_none() {
        return None;
    }
    modified.length()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_OCCURRENCES_PER_FEED;
    use crate::event::DateValue;
    use chrono::TimeZone;

    fn feed() -> CalendarFeed {
        CalendarFeed {
            name: "Team".to_string(),
            url: "https://example.com/team.ics".to_string(),
            color: "#123456".to_string(),
        }
    }

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap() + Duration::days(n)
    }

    fn utc(dt: DateTime<Utc>) -> EventTime {
        EventTime::DateTimeUtc(dt)
    }

    fn daily_master(uid: &str, count: u32) -> EventComponent {
        EventComponent {
            summary: Some("Standup".to_string()),
            description: Some("Daily sync".to_string()),
            location: Some("Room 1".to_string()),
            end: Some(utc(day(0) + Duration::minutes(30))),
            recurrence: Some(Recurrence::new(format!("FREQ=DAILY;COUNT={count}"))),
            ..EventComponent::new(uid, utc(day(0)))
        }
    }

    fn expand(components: &[EventComponent], now: DateTime<Utc>) -> FeedExpansion {
        let mut budget = OccurrenceBudget::new(MAX_OCCURRENCES_PER_FEED);
        expand_feed(&feed(), components, &Window::around(now), &mut budget)
    }

    #[test]
    fn single_event_inside_window_is_copied_verbatim() {
        let event = EventComponent {
            summary: Some("Launch".to_string()),
            description: Some("Ship it".to_string()),
            location: Some("HQ".to_string()),
            end: Some(utc(day(5) + Duration::hours(2))),
            ..EventComponent::new("launch-1", utc(day(5)))
        };

        let expansion = expand(&[event], day(0));
        assert_eq!(expansion.occurrences.len(), 1);

        let occ = &expansion.occurrences[0];
        assert_eq!(occ.id, "Team-launch-1");
        assert_eq!(occ.title, "Launch");
        assert_eq!(occ.description, "Ship it");
        assert_eq!(occ.location, "HQ");
        assert_eq!(occ.start, day(5));
        assert_eq!(occ.end, day(5) + Duration::hours(2));
        assert_eq!(occ.calendar_name, "Team");
        assert_eq!(occ.color, "#123456");
        assert!(!occ.is_recurring);
    }

    #[test]
    fn single_event_outside_window_is_dropped() {
        let events = vec![
            EventComponent::new("old", utc(day(-31))),
            EventComponent::new("far", utc(day(91))),
        ];
        assert!(expand(&events, day(0)).occurrences.is_empty());
    }

    #[test]
    fn series_with_exdate_and_override() {
        let mut master = daily_master("series", 200);
        master.exdates = vec![utc(day(110)).into()];

        let moved = EventComponent {
            summary: Some("Rescheduled".to_string()),
            recurrence_id: Some(utc(day(120)).into()),
            end: Some(utc(day(120) + Duration::hours(5))),
            ..EventComponent::new("series", utc(day(120) + Duration::hours(4)))
        };

        let expansion = expand(&[master, moved], day(100));
        let occurrences = &expansion.occurrences;

        // Days 70..=190 inclusive, minus the excluded day 110
        assert_eq!(occurrences.len(), 120);
        assert_eq!(occurrences.first().unwrap().start, day(70));
        assert_eq!(occurrences.last().unwrap().start, day(190));
        assert!(occurrences.iter().all(|o| o.start != day(110)));
        assert!(occurrences.iter().all(|o| o.is_recurring));

        let rescheduled = occurrences.iter().find(|o| o.start == day(120)).unwrap();
        assert_eq!(rescheduled.title, "Rescheduled");
        // Override keeps the slot but brings its own one-hour length
        assert_eq!(rescheduled.end, day(120) + Duration::hours(1));
        assert_eq!(rescheduled.description, "");
        assert_eq!(
            rescheduled.id,
            format!("Team-series-{}", day(120).timestamp_millis())
        );

        let regular = occurrences.iter().find(|o| o.start == day(121)).unwrap();
        assert_eq!(regular.title, "Standup");
        assert_eq!(regular.end, day(121) + Duration::minutes(30));
    }

    #[test]
    fn exclusion_wins_over_override_for_same_slot() {
        let mut master = daily_master("series", 10);
        master.exdates = vec![utc(day(3)).into()];
        let moved = EventComponent {
            summary: Some("Moved".to_string()),
            recurrence_id: Some(utc(day(3)).into()),
            ..EventComponent::new("series", utc(day(3)))
        };

        let expansion = expand(&[master, moved], day(0));
        assert_eq!(expansion.occurrences.len(), 9);
        assert!(expansion.occurrences.iter().all(|o| o.start != day(3)));
        assert!(expansion.occurrences.iter().all(|o| o.title == "Standup"));
    }

    #[test]
    fn override_without_end_uses_master_length() {
        let master = daily_master("series", 5);
        // No DTSTART/DTEND of its own
        let moved = EventComponent {
            uid: "series".to_string(),
            summary: Some("Longer title".to_string()),
            recurrence_id: Some(utc(day(2)).into()),
            ..Default::default()
        };

        let expansion = expand(&[master, moved], day(0));
        let occ = expansion
            .occurrences
            .iter()
            .find(|o| o.start == day(2))
            .unwrap();
        assert_eq!(occ.title, "Longer title");
        assert_eq!(occ.end, day(2) + Duration::minutes(30));
    }

    #[test]
    fn override_with_unreadable_recurrence_id_is_neither_applied_nor_emitted() {
        let master = daily_master("series", 3);
        let broken = EventComponent {
            summary: Some("Ghost".to_string()),
            recurrence_id: Some(DateValue::Invalid("???".into())),
            ..EventComponent::new("series", utc(day(1)))
        };

        let expansion = expand(&[master, broken], day(0));
        assert_eq!(expansion.occurrences.len(), 3);
        assert!(expansion.occurrences.iter().all(|o| o.title == "Standup"));
    }

    #[test]
    fn expansion_stops_past_future_limit_for_endless_rules() {
        let mut master = daily_master("forever", 1);
        master.recurrence = Some(Recurrence::new("FREQ=DAILY"));

        let expansion = expand(&[master], day(0));
        // day 0 ..= day 90
        assert_eq!(expansion.occurrences.len(), 91);
        assert!(!expansion.truncated);
    }

    #[test]
    fn budget_truncates_feed_at_limit() {
        let mut master = daily_master("minutely", 1);
        master.recurrence = Some(Recurrence::new("FREQ=MINUTELY;INTERVAL=5"));
        let late_single = EventComponent::new("late", utc(day(1)));

        let mut budget = OccurrenceBudget::new(MAX_OCCURRENCES_PER_FEED);
        let expansion = expand_feed(
            &feed(),
            &[master, late_single],
            &Window::around(day(0)),
            &mut budget,
        );

        assert_eq!(expansion.occurrences.len(), MAX_OCCURRENCES_PER_FEED);
        assert!(expansion.truncated);
        assert!(expansion.occurrences.iter().all(|o| o.is_recurring));
    }

    #[test]
    fn exactly_filling_the_budget_is_not_truncation() {
        let master = daily_master("series", 5);
        let mut budget = OccurrenceBudget::new(5);
        let expansion = expand_feed(&feed(), &[master], &Window::around(day(0)), &mut budget);

        assert_eq!(expansion.occurrences.len(), 5);
        assert!(!expansion.truncated);
    }

    #[test]
    fn invalid_rule_skips_only_that_master() {
        let mut broken = daily_master("broken", 1);
        broken.recurrence = Some(Recurrence::new("FREQ=NEVER"));
        let fine = EventComponent::new("fine", utc(day(1)));

        let expansion = expand(&[broken, fine], day(0));
        assert_eq!(expansion.occurrences.len(), 1);
        assert_eq!(expansion.occurrences[0].id, "Team-fine");
        assert_eq!(expansion.skipped.len(), 1);
        assert!(expansion.skipped[0].starts_with("broken:"));
    }

    #[test]
    fn master_without_start_is_skipped() {
        let headless = EventComponent {
            uid: "headless".to_string(),
            ..Default::default()
        };
        let expansion = expand(&[headless], day(0));
        assert!(expansion.occurrences.is_empty());
        assert_eq!(expansion.skipped.len(), 1);
    }
}

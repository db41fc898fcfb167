//! Modified instances and exclusion dates of recurring series.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::event::EventComponent;

/// Overrides of one feed, keyed by master uid and the epoch-millis of the
/// slot they replace (the RECURRENCE-ID, not the override's own DTSTART).
#[derive(Debug, Default)]
pub struct ExceptionIndex<'a> {
    by_uid: HashMap<&'a str, HashMap<i64, &'a EventComponent>>,
}

impl<'a> ExceptionIndex<'a> {
    pub fn build(components: &'a [EventComponent]) -> Self {
        let mut by_uid: HashMap<&'a str, HashMap<i64, &'a EventComponent>> = HashMap::new();

        for component in components {
            let Some(recurrence_id) = &component.recurrence_id else {
                continue;
            };
            let Some(slot) = recurrence_id.resolve() else {
                tracing::debug!(
                    uid = %component.uid,
                    value = ?recurrence_id,
                    "Skipping override with unreadable RECURRENCE-ID"
                );
                continue;
            };
            by_uid
                .entry(component.uid.as_str())
                .or_default()
                .insert(slot.timestamp_millis(), component);
        }

        ExceptionIndex { by_uid }
    }

    pub fn get(&self, uid: &str, slot: DateTime<Utc>) -> Option<&'a EventComponent> {
        self.by_uid
            .get(uid)
            .and_then(|slots| slots.get(&slot.timestamp_millis()))
            .copied()
    }

    /// Number of indexed overrides across all series.
    pub fn len(&self) -> usize {
        self.by_uid.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// EXDATE instants of one master, as epoch-millis.
#[derive(Debug, Default, Clone)]
pub struct ExclusionSet(HashSet<i64>);

impl ExclusionSet {
    pub fn for_master(master: &EventComponent) -> Self {
        let excluded = master
            .exdates
            .iter()
            .filter_map(|exdate| {
                let resolved = exdate.resolve();
                if resolved.is_none() {
                    tracing::debug!(uid = %master.uid, value = ?exdate, "Skipping unreadable EXDATE");
                }
                resolved
            })
            .map(|dt| dt.timestamp_millis())
            .collect();
        ExclusionSet(excluded)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.0.contains(&instant.timestamp_millis())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

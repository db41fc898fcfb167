//! Aggregation of all configured feeds into one sorted event list.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::config::CalendarFeed;
use crate::constants::MAX_OCCURRENCES_PER_FEED;
use crate::expand::{FeedExpansion, OccurrenceBudget, expand_feed};
use crate::feed::FeedSource;
use crate::ics::parse_components;
use crate::occurrence::{AggregatedResult, Occurrence, Stats};
use crate::window::Window;

/// What became of one feed in a run.
#[derive(Debug)]
pub enum FeedOutcome {
    Loaded(FeedExpansion),
    /// Fetch or parse failed; the feed contributes nothing
    Skipped { reason: String },
}

pub struct Aggregator<S> {
    source: S,
    max_per_feed: usize,
}

impl<S: FeedSource> Aggregator<S> {
    pub fn new(source: S) -> Self {
        Aggregator {
            source,
            max_per_feed: MAX_OCCURRENCES_PER_FEED,
        }
    }

    /// Override the per-feed occurrence cap.
    pub fn with_limit(mut self, max_per_feed: usize) -> Self {
        self.max_per_feed = max_per_feed;
        self
    }

    /// Aggregate `feeds` around the current time.
    pub async fn run(&self, feeds: &[CalendarFeed]) -> AggregatedResult {
        let mut result = self.run_at(feeds, Utc::now()).await;
        result.last_updated = Utc::now();
        result
    }

    /// Aggregate `feeds` with a fixed clock: `now` anchors the window and
    /// stamps `last_updated`, so identical inputs give identical output.
    pub async fn run_at(&self, feeds: &[CalendarFeed], now: DateTime<Utc>) -> AggregatedResult {
        let window = Window::around(now);

        // join_all yields in input order, whichever fetch finishes first
        let outcomes = join_all(feeds.iter().map(|feed| self.process_feed(feed, &window))).await;

        let mut events = Vec::new();
        let mut warnings = Vec::new();
        let mut calendars_processed = 0;

        for (feed, outcome) in feeds.iter().zip(outcomes) {
            match outcome {
                FeedOutcome::Loaded(expansion) => {
                    calendars_processed += 1;
                    if expansion.truncated {
                        warnings.push(format!(
                            "{}: stopped after {} occurrences",
                            feed.name, self.max_per_feed
                        ));
                    }
                    warnings.extend(
                        expansion
                            .skipped
                            .into_iter()
                            .map(|reason| format!("{}: skipped event {}", feed.name, reason)),
                    );
                    events.extend(expansion.occurrences);
                }
                FeedOutcome::Skipped { reason } => {
                    warnings.push(format!("{}: {}", feed.name, reason));
                }
            }
        }

        make_ids_unique(&mut events);
        // Stable: ties keep feed order, then emission order
        events.sort_by_key(|event| event.start);

        let stats = Stats::count(&events);
        tracing::info!(
            feeds = feeds.len(),
            processed = calendars_processed,
            total = stats.total,
            recurring = stats.recurring,
            warnings = warnings.len(),
            "Aggregated calendar feeds"
        );

        AggregatedResult {
            events,
            last_updated: now,
            calendars_processed,
            stats,
            warnings,
        }
    }

    async fn process_feed(&self, feed: &CalendarFeed, window: &Window) -> FeedOutcome {
        let text = match self.source.fetch(&feed.url).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(calendar = %feed.name, error = %e, "Failed to fetch calendar");
                return FeedOutcome::Skipped {
                    reason: e.to_string(),
                };
            }
        };

        let components = match parse_components(&text) {
            Ok(components) => components,
            Err(e) => {
                tracing::warn!(calendar = %feed.name, error = %e, "Failed to parse calendar");
                return FeedOutcome::Skipped {
                    reason: e.to_string(),
                };
            }
        };

        let mut budget = OccurrenceBudget::new(self.max_per_feed);
        let expansion = expand_feed(feed, &components, window, &mut budget);

        if expansion.truncated {
            tracing::warn!(
                calendar = %feed.name,
                limit = self.max_per_feed,
                "Too many occurrences generated, stopping expansion"
            );
        }
        tracing::debug!(
            calendar = %feed.name,
            components = components.len(),
            occurrences = expansion.occurrences.len(),
            "Expanded calendar"
        );

        FeedOutcome::Loaded(expansion)
    }
}

/// Suffix repeated ids with `-2`, `-3`, ... in the order they appear.
fn make_ids_unique(events: &mut [Occurrence]) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for event in events.iter_mut() {
        let count = seen.entry(event.id.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            let mut n = *count;
            let mut candidate = format!("{}-{}", event.id, n);
            while seen.contains_key(&candidate) {
                n += 1;
                candidate = format!("{}-{}", event.id, n);
            }
            seen.insert(candidate.clone(), 1);
            event.id = candidate;
        }
    }
}

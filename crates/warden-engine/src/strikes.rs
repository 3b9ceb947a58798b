//! Strike tracking
//!
//! Trusted actors get a bounded number of offenses per sliding window before
//! they are sanctioned. Everyone else is sanctioned on the first offense.

use crate::config::GuardConfig;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;
use warden_types::UserId;

/// Offense count for one trusted actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrikeRecord {
    pub actor_id: UserId,
    pub count: u32,
    pub window_start: DateTime<Utc>,
}

impl StrikeRecord {
    pub fn new(actor_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            actor_id,
            count: 1,
            window_start: now,
        }
    }

    /// Count one more offense at `now`, starting a fresh window once the
    /// current one has elapsed. Returns the new count.
    pub fn register(&mut self, now: DateTime<Utc>, window: Duration) -> u32 {
        if now - self.window_start > window {
            self.count = 1;
            self.window_start = now;
        } else {
            self.count = self.count.saturating_add(1);
        }
        self.count
    }
}

/// What to do about an offense
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrikeDecision {
    /// Sanction the actor now
    Punish { count: u32 },
    /// Offense recorded, tolerance not yet exhausted
    Counted { count: u32 },
}

impl StrikeDecision {
    pub fn should_punish(&self) -> bool {
        matches!(self, StrikeDecision::Punish { .. })
    }
}

/// Per-actor offense counters
#[derive(Debug)]
pub struct StrikeTracker {
    records: DashMap<UserId, StrikeRecord>,
    trusted: HashSet<UserId>,
    threshold: u32,
    window: Duration,
}

impl StrikeTracker {
    pub fn new(trusted: HashSet<UserId>, threshold: u32, window: Duration) -> Self {
        Self {
            records: DashMap::new(),
            trusted,
            threshold,
            window,
        }
    }

    pub fn from_config(config: &GuardConfig) -> Self {
        Self::new(
            config.trusted_actors.clone(),
            config.strike_threshold,
            config.strike_window(),
        )
    }

    pub fn is_trusted(&self, actor: UserId) -> bool {
        self.trusted.contains(&actor)
    }

    /// Register an offense by `actor`.
    ///
    /// `eligible` is false while the actor holds an immune role; their count
    /// keeps growing but never turns into a sanction.
    pub fn check_limit(
        &self,
        actor: UserId,
        reason: &str,
        eligible: bool,
        now: DateTime<Utc>,
    ) -> StrikeDecision {
        if !self.is_trusted(actor) {
            return StrikeDecision::Punish { count: 1 };
        }

        let decision = match self.records.entry(actor) {
            Entry::Occupied(mut occupied) => {
                let count = occupied.get_mut().register(now, self.window);
                if eligible && count >= self.threshold {
                    occupied.remove();
                    StrikeDecision::Punish { count }
                } else {
                    StrikeDecision::Counted { count }
                }
            }
            Entry::Vacant(vacant) => {
                if eligible && self.threshold <= 1 {
                    StrikeDecision::Punish { count: 1 }
                } else {
                    vacant.insert(StrikeRecord::new(actor, now));
                    StrikeDecision::Counted { count: 1 }
                }
            }
        };

        debug!(%actor, reason, ?decision, "Strike registered");
        decision
    }

    pub fn record(&self, actor: UserId) -> Option<StrikeRecord> {
        self.records.get(&actor).map(|r| r.clone())
    }

    /// Number of actors with an open record
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TRUSTED: UserId = UserId::new(7);
    const STRANGER: UserId = UserId::new(8);

    fn tracker() -> StrikeTracker {
        StrikeTracker::new(HashSet::from([TRUSTED]), 3, Duration::seconds(30))
    }

    #[test]
    fn test_third_offense_punishes_and_clears() {
        let tracker = tracker();
        let start = Utc::now();

        let first = tracker.check_limit(TRUSTED, "Updating a role", true, start);
        let second =
            tracker.check_limit(TRUSTED, "Updating a role", true, start + Duration::seconds(5));
        assert_eq!(first, StrikeDecision::Counted { count: 1 });
        assert_eq!(second, StrikeDecision::Counted { count: 2 });

        let third =
            tracker.check_limit(TRUSTED, "Updating a role", true, start + Duration::seconds(10));
        assert_eq!(third, StrikeDecision::Punish { count: 3 });
        assert!(tracker.record(TRUSTED).is_none());

        let fourth =
            tracker.check_limit(TRUSTED, "Updating a role", true, start + Duration::seconds(11));
        assert_eq!(fourth, StrikeDecision::Counted { count: 1 });
    }

    #[test]
    fn test_window_expiry_resets_count() {
        let tracker = tracker();
        let start = Utc::now();

        tracker.check_limit(TRUSTED, "Deleting a channel", true, start);
        let later = start + Duration::seconds(31);
        let decision = tracker.check_limit(TRUSTED, "Deleting a channel", true, later);

        assert_eq!(decision, StrikeDecision::Counted { count: 1 });
        assert_eq!(tracker.record(TRUSTED).map(|r| r.window_start), Some(later));
    }

    #[test]
    fn test_untrusted_always_punished() {
        let tracker = tracker();
        for _ in 0..3 {
            let decision = tracker.check_limit(STRANGER, "Creating a role", true, Utc::now());
            assert!(decision.should_punish());
        }
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_ineligible_actor_keeps_counting() {
        let tracker = tracker();
        let now = Utc::now();
        for expected in 1..=4 {
            let decision = tracker.check_limit(TRUSTED, "Editing the guild", false, now);
            assert_eq!(decision, StrikeDecision::Counted { count: expected });
        }
        let decision = tracker.check_limit(TRUSTED, "Editing the guild", true, now);
        assert_eq!(decision, StrikeDecision::Punish { count: 5 });
    }

    #[test]
    fn test_threshold_of_one_punishes_first_offense() {
        let tracker = StrikeTracker::new(HashSet::from([TRUSTED]), 1, Duration::seconds(30));
        let decision = tracker.check_limit(TRUSTED, "Creating a webhook", true, Utc::now());
        assert_eq!(decision, StrikeDecision::Punish { count: 1 });
        assert!(tracker.is_empty());
    }

    proptest! {
        #[test]
        fn prop_matches_sliding_window_model(gaps in prop::collection::vec(0i64..45, 1..40)) {
            let tracker = tracker();
            let window = Duration::seconds(30);
            let mut now = Utc::now();

            let mut model: Option<(u32, DateTime<Utc>)> = None;
            for gap in gaps {
                now += Duration::seconds(gap);
                let decision = tracker.check_limit(TRUSTED, "Updating a channel", true, now);

                let count = match model {
                    Some((count, start)) if now - start <= window => count + 1,
                    _ => {
                        model = Some((1, now));
                        1
                    }
                };
                if let Some((_, start)) = model {
                    model = Some((count, start));
                }

                if count >= 3 {
                    prop_assert_eq!(decision, StrikeDecision::Punish { count });
                    model = None;
                } else {
                    prop_assert_eq!(decision, StrikeDecision::Counted { count });
                }
                prop_assert!(tracker.record(TRUSTED).map_or(0, |r| r.count) < 3);
            }
        }
    }
}

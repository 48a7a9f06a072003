// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::Serialize;

use crate::error::Fallible;
use crate::store::CardStore;
use crate::types::card::Card;
use crate::types::card::CardState;
use crate::types::card_id::CardId;
use crate::types::timestamp::DayBoundary;
use crate::types::timestamp::Timestamp;

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct SchedulerSettings {
    /// The maximum number of new cards introduced per day.
    pub new_cards_per_day: u32,
    /// When the daily allowance resets.
    pub boundary: DayBoundary,
}

/// Tracks how many new cards have been introduced since the last reset.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DailyCounter {
    pub new_added_count: u32,
    pub next_day_reset: Timestamp,
}

impl DailyCounter {
    pub fn starting_at(now: Timestamp, boundary: &DayBoundary) -> Fallible<Self> {
        Ok(Self {
            new_added_count: 0,
            next_day_reset: boundary.next_after(now)?,
        })
    }

    /// Reset the count if `now` is past the reset boundary.
    pub fn roll_over(self, now: Timestamp, boundary: &DayBoundary) -> Fallible<Self> {
        if now > self.next_day_reset {
            log::debug!("Daily allowance reset at {now}.");
            Self::starting_at(now, boundary)
        } else {
            Ok(self)
        }
    }
}

/// The review queue, split into lanes.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct Schedule {
    /// New cards, in store order, truncated to the remaining daily allowance.
    pub new: Vec<CardId>,
    /// Learning and relearning cards, by due date.
    pub learning: Vec<CardId>,
    /// Review cards past their due date, by due date.
    pub review: Vec<CardId>,
}

impl Schedule {
    /// The queue in lane priority order.
    pub fn queue(&self) -> impl Iterator<Item = &CardId> {
        self.new
            .iter()
            .chain(self.learning.iter())
            .chain(self.review.iter())
    }

    pub fn head(&self) -> Option<&CardId> {
        self.queue().next()
    }

    pub fn contains(&self, id: &CardId) -> bool {
        self.queue().any(|queued| queued == id)
    }

    pub fn counts(&self) -> ScheduleCounts {
        ScheduleCounts {
            new: self.new.len(),
            learning: self.learning.len(),
            review: self.review.len(),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub struct ScheduleCounts {
    pub new: usize,
    pub learning: usize,
    pub review: usize,
}

impl ScheduleCounts {
    pub fn total(&self) -> usize {
        self.new + self.learning + self.review
    }

    /// True when nothing is left to study right now.
    pub fn is_done(&self) -> bool {
        self.total() == 0
    }
}

/// Compute the review queue from the card store and the daily counter.
pub fn recompute(
    store: &CardStore,
    counter: DailyCounter,
    now: Timestamp,
    settings: &SchedulerSettings,
) -> Fallible<(Schedule, DailyCounter)> {
    let counter = counter.roll_over(now, &settings.boundary)?;
    let allowance = settings
        .new_cards_per_day
        .saturating_sub(counter.new_added_count) as usize;

    let new: Vec<CardId> = store
        .iter()
        .filter(|card| card.state() == CardState::New)
        .take(allowance)
        .map(|card| card.id().clone())
        .collect();

    let learning = by_due(store.iter().filter(|card| {
        matches!(card.state(), CardState::Learning | CardState::Relearning)
    }));

    let review = by_due(
        store
            .iter()
            .filter(|card| card.state() == CardState::Review && card.due() < now),
    );

    let schedule = Schedule {
        new,
        learning,
        review,
    };
    Ok((schedule, counter))
}

fn by_due<'a>(cards: impl Iterator<Item = &'a Card>) -> Vec<CardId> {
    let mut cards: Vec<&Card> = cards.collect();
    cards.sort_by(|a, b| a.due().cmp(&b.due()).then_with(|| a.id().cmp(b.id())));
    cards.into_iter().map(|card| card.id().clone()).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::FixedOffset;

    use super::*;
    use crate::types::card::MemoryState;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn now() -> Timestamp {
        ts("2024-05-01T10:00:00Z")
    }

    fn settings(new_cards_per_day: u32) -> SchedulerSettings {
        SchedulerSettings {
            new_cards_per_day,
            boundary: DayBoundary::fixed(4, FixedOffset::east_opt(0).unwrap()).unwrap(),
        }
    }

    fn counter(new_added_count: u32) -> DailyCounter {
        DailyCounter {
            new_added_count,
            next_day_reset: ts("2024-05-02T04:00:00Z"),
        }
    }

    fn record(id: &str, state: CardState, due: Timestamp) -> (CardId, MemoryState) {
        let mut memory = MemoryState::empty(due);
        memory.state = state;
        (CardId::new(id), memory)
    }

    fn mixed_store() -> CardStore {
        CardStore::from_records(vec![
            record("n1", CardState::New, now()),
            record("r-late", CardState::Review, now().plus_days(-1)),
            record("l2", CardState::Learning, now().plus_minutes(10)),
            record("n2", CardState::New, now()),
            record("r-future", CardState::Review, now().plus_days(3)),
            record("rl", CardState::Relearning, now().plus_minutes(5)),
            record("r-early", CardState::Review, now().plus_days(-5)),
            record("n3", CardState::New, now()),
            record("r-now", CardState::Review, now()),
            record("l1", CardState::Learning, now().plus_minutes(10)),
        ])
    }

    fn ids(lane: &[CardId]) -> Vec<&str> {
        lane.iter().map(|id| id.as_str()).collect()
    }

    #[test]
    fn test_lanes() -> Fallible<()> {
        let (schedule, _) = recompute(&mixed_store(), counter(0), now(), &settings(5))?;
        assert_eq!(ids(&schedule.new), vec!["n1", "n2", "n3"]);
        // Ties on due date are broken by id.
        assert_eq!(ids(&schedule.learning), vec!["rl", "l1", "l2"]);
        // Review cards due at or after `now` are excluded.
        assert_eq!(ids(&schedule.review), vec!["r-early", "r-late"]);
        assert_eq!(schedule.head(), Some(&CardId::new("n1")));
        Ok(())
    }

    #[test]
    fn test_lanes_are_disjoint_and_consistent() -> Fallible<()> {
        let store = mixed_store();
        let (schedule, _) = recompute(&store, counter(0), now(), &settings(5))?;
        let mut seen = HashSet::new();
        for id in schedule.queue() {
            assert!(seen.insert(id.clone()), "{id} appears twice");
        }
        for id in &schedule.new {
            assert_eq!(store.get(id).unwrap().state(), CardState::New);
        }
        for id in &schedule.learning {
            let state = store.get(id).unwrap().state();
            assert!(state == CardState::Learning || state == CardState::Relearning);
        }
        for id in &schedule.review {
            assert_eq!(store.get(id).unwrap().state(), CardState::Review);
        }
        for lane in [&schedule.learning, &schedule.review] {
            let dues: Vec<Timestamp> = lane.iter().map(|id| store.get(id).unwrap().due()).collect();
            assert!(dues.windows(2).all(|w| w[0] <= w[1]));
        }
        Ok(())
    }

    #[test]
    fn test_daily_cap() -> Fallible<()> {
        let store = mixed_store();
        let (schedule, _) = recompute(&store, counter(3), now(), &settings(5))?;
        assert_eq!(ids(&schedule.new), vec!["n1", "n2"]);
        let (schedule, _) = recompute(&store, counter(5), now(), &settings(5))?;
        assert!(schedule.new.is_empty());
        // A count above the cap does not underflow.
        let (schedule, _) = recompute(&store, counter(9), now(), &settings(5))?;
        assert!(schedule.new.is_empty());
        Ok(())
    }

    #[test]
    fn test_recompute_is_pure() -> Fallible<()> {
        let store = mixed_store();
        let a = recompute(&store, counter(1), now(), &settings(2))?;
        let b = recompute(&store, counter(1), now(), &settings(2))?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn test_reset_boundary() -> Fallible<()> {
        let store = CardStore::new();
        let reset = ts("2024-05-02T04:00:00Z");

        let before = reset.plus(chrono::Duration::seconds(-1));
        let (_, out) = recompute(&store, counter(4), before, &settings(5))?;
        assert_eq!(out, counter(4));

        let (_, out) = recompute(&store, counter(4), reset, &settings(5))?;
        assert_eq!(out, counter(4));

        let after = reset.plus(chrono::Duration::seconds(1));
        let (_, out) = recompute(&store, counter(4), after, &settings(5))?;
        assert_eq!(out.new_added_count, 0);
        assert_eq!(out.next_day_reset, reset.plus_days(1));
        Ok(())
    }

    #[test]
    fn test_reset_frees_allowance() -> Fallible<()> {
        let store = mixed_store();
        let tomorrow = ts("2024-05-02T09:00:00Z");
        let (schedule, out) = recompute(&store, counter(5), tomorrow, &settings(5))?;
        assert_eq!(out.new_added_count, 0);
        assert_eq!(schedule.new.len(), 3);
        Ok(())
    }

    #[test]
    fn test_counts() {
        let schedule = Schedule {
            new: vec![CardId::new("a")],
            learning: vec![],
            review: vec![CardId::new("b"), CardId::new("c")],
        };
        let counts = schedule.counts();
        assert_eq!(counts.new, 1);
        assert_eq!(counts.review, 2);
        assert_eq!(counts.total(), 3);
        assert!(!counts.is_done());
        assert!(Schedule::default().counts().is_done());
    }
}

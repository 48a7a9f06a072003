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

//! The persisted form of the engine state.
//!
//! A snapshot holds the memory fields of every card, in store order, the
//! cached schedule lanes, and the daily counter. Display content is never
//! persisted. Decoding is strict: the version is checked first, then the
//! structure, then the cross-field invariants, and the first violation
//! rejects the whole snapshot.

use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::ErrorKind;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::schedule::DailyCounter;
use crate::schedule::Schedule;
use crate::store::CardStore;
use crate::types::card::CardState;
use crate::types::card::MemoryState;
use crate::types::card_id::CardId;
use crate::types::timestamp::Timestamp;

pub const SNAPSHOT_VERSION: u64 = 1;

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Snapshot {
    version: u64,
    cards: Vec<CardRecord>,
    schedule: ScheduleRecord,
    counter: CounterRecord,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CardRecord {
    id: CardId,
    due: Timestamp,
    stability: f64,
    difficulty: f64,
    elapsed_days: u32,
    scheduled_days: u32,
    reps: u32,
    lapses: u32,
    state: CardState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_review: Option<Timestamp>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScheduleRecord {
    new: Vec<CardId>,
    learning: Vec<CardId>,
    review: Vec<CardId>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct CounterRecord {
    new_added_count: u32,
    next_day_reset: Timestamp,
}

fn invalid(message: impl Into<String>) -> ErrorReport {
    ErrorReport::with_kind(ErrorKind::SchemaInvalid, message)
}

impl Snapshot {
    /// Capture the persistable part of the engine state.
    pub fn capture(store: &CardStore, schedule: &Schedule, counter: &DailyCounter) -> Self {
        let cards = store
            .iter()
            .map(|card| {
                let m = card.memory();
                CardRecord {
                    id: card.id().clone(),
                    due: m.due,
                    stability: m.stability,
                    difficulty: m.difficulty,
                    elapsed_days: m.elapsed_days,
                    scheduled_days: m.scheduled_days,
                    reps: m.reps,
                    lapses: m.lapses,
                    state: m.state,
                    last_review: m.last_review,
                }
            })
            .collect();
        Self {
            version: SNAPSHOT_VERSION,
            cards,
            schedule: ScheduleRecord {
                new: schedule.new.clone(),
                learning: schedule.learning.clone(),
                review: schedule.review.clone(),
            },
            counter: CounterRecord {
                new_added_count: counter.new_added_count,
                next_day_reset: counter.next_day_reset,
            },
        }
    }

    pub fn to_json(&self) -> Fallible<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode and validate a raw snapshot. Every failure has kind
    /// `SchemaInvalid`.
    pub fn parse(raw: &str) -> Fallible<Self> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| invalid(format!("malformed snapshot: {e}")))?;
        let version = match value.get("version") {
            Some(version) => version,
            None => return Err(invalid("snapshot has no version")),
        };
        match version.as_u64() {
            Some(SNAPSHOT_VERSION) => {}
            _ => return Err(invalid(format!("unsupported snapshot version: {version}"))),
        }
        let snapshot: Snapshot = serde_json::from_value(value)
            .map_err(|e| invalid(format!("invalid snapshot: {e}")))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    fn validate(&self) -> Fallible<()> {
        let mut ids: HashSet<&CardId> = HashSet::new();
        for card in &self.cards {
            if card.id.is_empty() {
                return Err(invalid("card with an empty id"));
            }
            if !ids.insert(&card.id) {
                return Err(invalid(format!("duplicate card id: {}", card.id)));
            }
            for (name, value) in [("stability", card.stability), ("difficulty", card.difficulty)] {
                if !value.is_finite() || value < 0.0 {
                    return Err(invalid(format!("card {}: {name} out of range", card.id)));
                }
            }
        }
        let mut queued: HashSet<&CardId> = HashSet::new();
        let lanes = [
            &self.schedule.new,
            &self.schedule.learning,
            &self.schedule.review,
        ];
        for id in lanes.into_iter().flatten() {
            if !ids.contains(id) {
                return Err(invalid(format!("scheduled card {id} does not exist")));
            }
            if !queued.insert(id) {
                return Err(invalid(format!("card {id} is scheduled twice")));
            }
        }
        Ok(())
    }

    pub fn card_count(&self) -> usize {
        self.cards.len()
    }

    /// Rebuild the card store, cached schedule, and daily counter.
    pub fn into_parts(self) -> (CardStore, Schedule, DailyCounter) {
        let records = self
            .cards
            .into_iter()
            .map(|r| {
                let memory = MemoryState {
                    due: r.due,
                    stability: r.stability,
                    difficulty: r.difficulty,
                    elapsed_days: r.elapsed_days,
                    scheduled_days: r.scheduled_days,
                    reps: r.reps,
                    lapses: r.lapses,
                    state: r.state,
                    last_review: r.last_review,
                };
                (r.id, memory)
            })
            .collect();
        let schedule = Schedule {
            new: self.schedule.new,
            learning: self.schedule.learning,
            review: self.schedule.review,
        };
        let counter = DailyCounter {
            new_added_count: self.counter.new_added_count,
            next_day_reset: self.counter.next_day_reset,
        };
        (CardStore::from_records(records), schedule, counter)
    }
}

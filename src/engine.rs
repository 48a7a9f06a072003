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

//! The scheduling engine: owns the card store, the schedule, and the daily
//! counter, and keeps the persisted snapshot in step with them.
//!
//! Every mutating operation takes `&mut self`, so mutations are serialized by
//! ownership. Each one writes the snapshot before its effects become visible:
//! if the write fails, the in-memory state is left as it was.

use std::time::Instant;

use crate::clock::Clock;
use crate::content::ContentProvider;
use crate::error::ErrorKind;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::fsrs::Grade;
use crate::model::GradeDues;
use crate::model::MemoryModel;
use crate::schedule::DailyCounter;
use crate::schedule::Schedule;
use crate::schedule::ScheduleCounts;
use crate::schedule::SchedulerSettings;
use crate::schedule::recompute;
use crate::snapshot::Snapshot;
use crate::storage::SnapshotStorage;
use crate::store::CardStore;
use crate::types::card::Card;
use crate::types::card::CardState;
use crate::types::card_id::CardId;
use crate::types::timestamp::Timestamp;

#[derive(Clone, PartialEq, Debug)]
pub enum LoadState {
    Loading,
    Loaded,
    Error(LoadFailure),
}

/// Why a load failed.
#[derive(Clone, PartialEq, Debug)]
pub struct LoadFailure {
    /// Either `SchemaInvalid` or `Unknown`.
    pub kind: ErrorKind,
    /// A message suitable for the user.
    pub message: String,
    /// The underlying error.
    pub detail: String,
}

impl LoadFailure {
    fn from_error(err: ErrorReport) -> Self {
        let (kind, message) = match err.kind() {
            ErrorKind::SchemaInvalid => {
                (ErrorKind::SchemaInvalid, "Invalid format in local storage")
            }
            _ => (ErrorKind::Unknown, "Unknown error"),
        };
        Self {
            kind,
            message: message.to_string(),
            detail: err.message().to_string(),
        }
    }

    pub fn to_report(&self) -> ErrorReport {
        ErrorReport::with_kind(self.kind, format!("{}: {}", self.message, self.detail))
    }
}

pub struct Engine<S: SnapshotStorage, M: MemoryModel> {
    storage: S,
    model: M,
    clock: Box<dyn Clock>,
    settings: SchedulerSettings,
    load_state: LoadState,
    store: CardStore,
    schedule: Schedule,
    counter: DailyCounter,
    current: Option<CardId>,
}

impl<S: SnapshotStorage, M: MemoryModel> Engine<S, M> {
    /// Create an engine in the `Loading` state. Call [`Engine::load`] next.
    pub fn new(
        storage: S,
        model: M,
        clock: Box<dyn Clock>,
        settings: SchedulerSettings,
    ) -> Fallible<Self> {
        let counter = DailyCounter::starting_at(clock.now(), &settings.boundary)?;
        Ok(Self {
            storage,
            model,
            clock,
            settings,
            load_state: LoadState::Loading,
            store: CardStore::new(),
            schedule: Schedule::default(),
            counter,
            current: None,
        })
    }

    /// Load the persisted snapshot and merge in the provider's content.
    ///
    /// The content is fetched before anything is mutated, so a failed fetch
    /// leaves the engine empty. A snapshot that fails validation puts the
    /// engine in the `Error` state and leaves storage untouched.
    pub fn load(&mut self, provider: &dyn ContentProvider) -> &LoadState {
        self.load_state = LoadState::Loading;
        match self.try_load(provider) {
            Ok(()) => {
                self.load_state = LoadState::Loaded;
            }
            Err(err) => {
                log::error!("Failed to load saved state: {err}");
                self.store = CardStore::new();
                self.schedule = Schedule::default();
                self.current = None;
                self.load_state = LoadState::Error(LoadFailure::from_error(err));
            }
        }
        &self.load_state
    }

    fn try_load(&mut self, provider: &dyn ContentProvider) -> Fallible<()> {
        let now = self.clock.now();
        let raw = self.storage.read().map_err(unknown)?;
        let (mut store, counter) = match raw {
            None => {
                log::debug!("No saved state. Starting empty.");
                let counter = DailyCounter::starting_at(now, &self.settings.boundary)?;
                (CardStore::new(), counter)
            }
            Some(raw) => {
                log::debug!("Loading saved state...");
                let snapshot = Snapshot::parse(&raw)?;
                log::debug!("Saved state has {} cards.", snapshot.card_count());
                // The cached lanes are recomputed below.
                let (store, _, counter) = snapshot.into_parts();
                (store, counter)
            }
        };

        let start = Instant::now();
        let items = provider.fetch().map_err(unknown)?;
        let duration = start.elapsed().as_millis();
        log::debug!("Fetched {} content items in {duration}ms.", items.len());

        store.merge(items, now);
        let (schedule, counter) = recompute(&store, counter, now, &self.settings)?;
        let current = schedule.head().cloned();
        write_snapshot(&mut self.storage, &store, &schedule, &counter).map_err(unknown)?;

        self.store = store;
        self.schedule = schedule;
        self.counter = counter;
        self.current = current;
        Ok(())
    }

    /// Discard the persisted state and load again from an empty snapshot.
    /// Safe to call in any state, and repeatedly.
    pub fn reset(&mut self, provider: &dyn ContentProvider) -> &LoadState {
        log::info!("Resetting saved state.");
        self.load_state = LoadState::Loading;
        self.store = CardStore::new();
        self.schedule = Schedule::default();
        self.current = None;
        if let Err(err) = self.storage.clear() {
            log::error!("Failed to clear saved state: {err}");
            self.load_state = LoadState::Error(LoadFailure::from_error(unknown(err)));
            return &self.load_state;
        }
        self.load(provider)
    }

    /// Grade a card, reschedule, and return the next card to study, or `None`
    /// if nothing is left for now. An unknown id is a no-op.
    pub fn rate_and_advance(&mut self, id: &CardId, grade: Grade) -> Fallible<Option<CardId>> {
        self.ensure_loaded()?;
        let now = self.clock.now();
        let card = match self.store.get(id) {
            Some(card) => card,
            None => {
                log::warn!("Rating unknown card {id}.");
                return Ok(None);
            }
        };
        let outcomes = self.model.outcomes(card, now).map_err(adapter_failure)?;
        let was_new = card.state() == CardState::New;
        let previous = card.memory().clone();
        let memory = outcomes.into_state(grade);
        log::debug!(
            "{id} {} S={:.2}d D={:.2} state={} due={}",
            grade.as_str(),
            memory.stability,
            memory.difficulty,
            memory.state,
            memory.due
        );

        // Roll the day over first so a card rated just after the boundary
        // counts toward the new day.
        let mut counter = self.counter.roll_over(now, &self.settings.boundary)?;
        if was_new {
            counter.new_added_count += 1;
        }

        self.store.mutate_after_review(id, memory);
        match self.reschedule(counter, false) {
            Ok(next) => Ok(next),
            Err(err) => {
                self.store.mutate_after_review(id, previous);
                Err(err)
            }
        }
    }

    /// Recompute the schedule at the current time, keeping the current card
    /// if it is still queued.
    pub fn refresh(&mut self) -> Fallible<Option<CardId>> {
        self.ensure_loaded()?;
        self.reschedule(self.counter, true)
    }

    fn reschedule(
        &mut self,
        counter: DailyCounter,
        keep_current: bool,
    ) -> Fallible<Option<CardId>> {
        let now = self.clock.now();
        let (schedule, counter) = recompute(&self.store, counter, now, &self.settings)?;
        let next = match &self.current {
            Some(id) if keep_current && schedule.contains(id) => Some(id.clone()),
            _ => schedule.head().cloned(),
        };
        write_snapshot(&mut self.storage, &self.store, &schedule, &counter)?;
        self.schedule = schedule;
        self.counter = counter;
        self.current = next.clone();
        Ok(next)
    }

    /// Preview the due timestamp each grade would produce, without applying
    /// any of them.
    pub fn due_timestamps_for_each_grade(&self, id: &CardId) -> Fallible<Option<GradeDues>> {
        self.ensure_loaded()?;
        let card = match self.store.get(id) {
            Some(card) => card,
            None => return Ok(None),
        };
        let outcomes = self
            .model
            .outcomes(card, self.clock.now())
            .map_err(adapter_failure)?;
        Ok(Some(outcomes.dues()))
    }

    /// Persist the current state.
    pub fn save(&mut self) -> Fallible<()> {
        self.ensure_loaded()?;
        write_snapshot(&mut self.storage, &self.store, &self.schedule, &self.counter)
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn current_card(&self) -> Option<&Card> {
        self.current.as_ref().and_then(|id| self.store.get(id))
    }

    pub fn schedule_counts(&self) -> ScheduleCounts {
        self.schedule.counts()
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn daily_counter(&self) -> &DailyCounter {
        &self.counter
    }

    pub fn store(&self) -> &CardStore {
        &self.store
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn ensure_loaded(&self) -> Fallible<()> {
        match &self.load_state {
            LoadState::Loaded => Ok(()),
            LoadState::Loading => Err(ErrorReport::with_kind(
                ErrorKind::NotLoaded,
                "the collection has not been loaded",
            )),
            LoadState::Error(failure) => Err(ErrorReport::with_kind(
                ErrorKind::NotLoaded,
                format!("the collection failed to load: {}", failure.message),
            )),
        }
    }
}

fn write_snapshot<S: SnapshotStorage>(
    storage: &mut S,
    store: &CardStore,
    schedule: &Schedule,
    counter: &DailyCounter,
) -> Fallible<()> {
    let raw = Snapshot::capture(store, schedule, counter).to_json()?;
    storage.write(&raw)
}

fn unknown(err: ErrorReport) -> ErrorReport {
    match err.kind() {
        ErrorKind::SchemaInvalid => err,
        _ => ErrorReport::with_kind(ErrorKind::Unknown, err.message()),
    }
}

fn adapter_failure(err: ErrorReport) -> ErrorReport {
    ErrorReport::with_kind(
        ErrorKind::AdapterFailure,
        format!("memory model failed: {}", err.message()),
    )
}

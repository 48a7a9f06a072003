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

use std::env::current_dir;
use std::path::PathBuf;

use crate::clock::Clock;
use crate::clock::SystemClock;
use crate::config::Config;
use crate::content::JsonFileProvider;
use crate::engine::Engine;
use crate::engine::LoadState;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail;
use crate::model::FsrsModel;
use crate::storage::SqliteStorage;

pub const CARDS_FILENAME: &str = "cards.json";
pub const DB_FILENAME: &str = "recall.db";

/// A collection directory: content, saved state, and config.
pub struct Collection {
    pub directory: PathBuf,
    pub config: Config,
    pub provider: JsonFileProvider,
    pub engine: Engine<SqliteStorage, FsrsModel>,
}

impl Collection {
    /// Open the collection in the given directory, or the current directory.
    /// The engine is not loaded yet.
    pub fn new(directory: Option<String>) -> Fallible<Self> {
        Self::with_clock(directory, Box::new(SystemClock))
    }

    pub fn with_clock(directory: Option<String>, clock: Box<dyn Clock>) -> Fallible<Self> {
        let directory = resolve_directory(directory)?;
        let config = Config::load(&directory)?;
        log::debug!("Config: {config:?}");

        let db_path: PathBuf = directory.join(DB_FILENAME);
        let db_path: &str = db_path
            .to_str()
            .ok_or_else(|| ErrorReport::new("invalid path"))?;
        let storage = SqliteStorage::new(db_path)?;

        let model = FsrsModel::new(config.fsrs_parameters());
        let engine = Engine::new(storage, model, clock, config.scheduler_settings()?)?;
        let provider = JsonFileProvider::new(directory.join(CARDS_FILENAME));

        Ok(Self {
            directory,
            config,
            provider,
            engine,
        })
    }

    /// Open and load the collection, failing if the saved state is unusable.
    pub fn open_loaded(directory: Option<String>) -> Fallible<Self> {
        let mut collection = Self::new(directory)?;
        collection.load_or_fail()?;
        Ok(collection)
    }

    pub fn load_or_fail(&mut self) -> Fallible<()> {
        match self.load() {
            LoadState::Loaded => Ok(()),
            LoadState::Error(failure) => Err(failure.to_report()),
            LoadState::Loading => fail("the collection is still loading."),
        }
    }

    pub fn load(&mut self) -> &LoadState {
        self.engine.load(&self.provider)
    }

    pub fn reset(&mut self) -> &LoadState {
        self.engine.reset(&self.provider)
    }

    pub fn reset_or_fail(&mut self) -> Fallible<()> {
        match self.reset() {
            LoadState::Loaded => Ok(()),
            LoadState::Error(failure) => Err(failure.to_report()),
            LoadState::Loading => fail("the collection is still loading."),
        }
    }
}

/// The given directory, or the current directory, canonicalized.
pub fn resolve_directory(directory: Option<String>) -> Fallible<PathBuf> {
    let directory: PathBuf = match directory {
        Some(dir) => PathBuf::from(dir),
        None => current_dir()?,
    };
    if directory.exists() {
        Ok(directory.canonicalize()?)
    } else {
        fail("directory does not exist.")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::fs::write;
    use std::path::Path;

    use tempfile::tempdir;

    use super::*;
    use crate::clock::ManualClock;
    use crate::fsrs::Grade;
    use crate::types::card::CardState;
    use crate::types::card_id::CardId;
    use crate::types::timestamp::Timestamp;

    /// Write a collection with `count` cards and the given config.
    pub(crate) fn write_collection(dir: &Path, count: usize, config: &str) -> Fallible<()> {
        let items: Vec<String> = (0..count)
            .map(|i| format!(r#"{{"id": "card-{i}", "front": "Q{i}", "back": "A{i}"}}"#))
            .collect();
        write(dir.join(CARDS_FILENAME), format!("[{}]", items.join(",")))?;
        write(dir.join(crate::config::CONFIG_FILENAME), config)?;
        Ok(())
    }

    fn clock() -> ManualClock {
        ManualClock::new(Timestamp::parse("2024-05-01T10:00:00Z").unwrap())
    }

    #[test]
    fn test_non_existent_directory() {
        assert!(Collection::new(Some("./derpherp".to_string())).is_err());
    }

    #[test]
    fn test_open_and_load() -> Fallible<()> {
        let dir = tempdir()?;
        write_collection(dir.path(), 4, "new_cards_per_day = 3\nutc_offset_minutes = 0\n")?;
        let path = dir.path().display().to_string();
        let mut collection = Collection::with_clock(Some(path), Box::new(clock()))?;
        assert_eq!(collection.load(), &LoadState::Loaded);
        assert_eq!(collection.engine.store().len(), 4);
        assert_eq!(collection.engine.schedule_counts().new, 3);
        assert!(dir.path().join(DB_FILENAME).exists());
        Ok(())
    }

    #[test]
    fn test_reviews_persist_across_opens() -> Fallible<()> {
        let dir = tempdir()?;
        write_collection(dir.path(), 2, "enable_fuzz = false\n")?;
        let path = dir.path().display().to_string();
        let clock = clock();
        {
            let mut collection =
                Collection::with_clock(Some(path.clone()), Box::new(clock.clone()))?;
            collection.load();
            collection
                .engine
                .rate_and_advance(&CardId::new("card-0"), Grade::Easy)?;
        }
        let mut collection = Collection::with_clock(Some(path), Box::new(clock))?;
        assert_eq!(collection.load(), &LoadState::Loaded);
        let card = collection.engine.store().get(&CardId::new("card-0")).unwrap();
        assert_eq!(card.state(), CardState::Review);
        assert_eq!(collection.engine.daily_counter().new_added_count, 1);
        Ok(())
    }

    #[test]
    fn test_invalid_config_fails_to_open() -> Fallible<()> {
        let dir = tempdir()?;
        write_collection(dir.path(), 1, "reset_hour = 30\n")?;
        let path = dir.path().display().to_string();
        assert!(Collection::new(Some(path)).is_err());
        Ok(())
    }
}

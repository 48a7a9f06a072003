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

use std::fmt::Display;
use std::fmt::Formatter;

use clap::ValueEnum;
use serde::Serialize;

use crate::collection::Collection;
use crate::engine::Engine;
use crate::error::Fallible;
use crate::model::MemoryModel;
use crate::storage::SnapshotStorage;
use crate::types::card::CardState;

#[derive(ValueEnum, Clone)]
pub enum StatsFormat {
    /// Plain text output.
    Text,
    /// JSON output.
    Json,
}

impl Display for StatsFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StatsFormat::Text => write!(f, "text"),
            StatsFormat::Json => write!(f, "json"),
        }
    }
}

pub fn print_collection_stats(directory: Option<String>, format: StatsFormat) -> Fallible<()> {
    let collection = Collection::open_loaded(directory)?;
    let stats = Stats::collect(&collection.engine);
    match format {
        StatsFormat::Text => {
            print!("{}", stats.to_text());
        }
        StatsFormat::Json => {
            let stats_json = serde_json::to_string_pretty(&stats)?;
            println!("{}", stats_json);
        }
    }
    Ok(())
}

#[derive(Serialize, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    new_count: usize,
    learning_count: usize,
    review_count: usize,
    total_card_count: usize,
    unseen_card_count: usize,
    new_added_today: u32,
    next_reset: String,
}

impl Stats {
    pub fn collect<S: SnapshotStorage, M: MemoryModel>(engine: &Engine<S, M>) -> Self {
        let counts = engine.schedule_counts();
        let store = engine.store();
        let counter = engine.daily_counter();
        Self {
            new_count: counts.new,
            learning_count: counts.learning,
            review_count: counts.review,
            total_card_count: store.len(),
            unseen_card_count: store
                .iter()
                .filter(|card| card.state() == CardState::New)
                .count(),
            new_added_today: counter.new_added_count,
            next_reset: counter.next_day_reset.to_rfc3339(),
        }
    }

    fn to_text(&self) -> String {
        format!(
            "New: {}\nLearning: {}\nReview: {}\nCards: {} ({} unseen)\nNew cards today: {}\nNext reset: {}\n",
            self.new_count,
            self.learning_count,
            self.review_count,
            self.total_card_count,
            self.unseen_card_count,
            self.new_added_today,
            self.next_reset
        )
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::collection::tests::write_collection;
    use crate::fsrs::Grade;
    use crate::types::card_id::CardId;

    #[test]
    fn test_stats() -> Fallible<()> {
        let dir = tempdir()?;
        write_collection(dir.path(), 7, "new_cards_per_day = 5\n")?;
        let path = dir.path().display().to_string();
        let mut collection = Collection::open_loaded(Some(path))?;
        collection
            .engine
            .rate_and_advance(&CardId::new("card-0"), Grade::Forgot)?;

        let stats = Stats::collect(&collection.engine);
        assert_eq!(stats.new_count, 4);
        assert_eq!(stats.learning_count, 1);
        assert_eq!(stats.review_count, 0);
        assert_eq!(stats.total_card_count, 7);
        assert_eq!(stats.unseen_card_count, 6);
        assert_eq!(stats.new_added_today, 1);

        let json = serde_json::to_value(&stats)?;
        assert_eq!(json["newAddedToday"], 1);
        assert!(stats.to_text().starts_with("New: 4\nLearning: 1\n"));
        Ok(())
    }

    #[test]
    fn test_non_existent_directory() {
        assert!(print_collection_stats(Some("./derpherp".to_string()), StatsFormat::Json).is_err());
    }
}

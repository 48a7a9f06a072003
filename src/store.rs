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

use std::collections::HashMap;

use crate::content::ContentItem;
use crate::types::card::Card;
use crate::types::card::MemoryState;
use crate::types::card_id::CardId;
use crate::types::timestamp::Timestamp;

/// The set of cards, in creation order. Cards are never removed: a card that
/// disappears from the content provider keeps its memory state.
#[derive(Clone, Default, Debug)]
pub struct CardStore {
    cards: Vec<Card>,
    /// Position of each card in `cards`.
    index: HashMap<CardId, usize>,
}

impl CardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted memory records, preserving their order.
    /// Later duplicates are ignored.
    pub fn from_records(records: Vec<(CardId, MemoryState)>) -> Self {
        let mut store = Self::new();
        for (id, memory) in records {
            if store.index.contains_key(&id) {
                log::warn!("Ignoring duplicate card record: {id}");
                continue;
            }
            store.push(Card::from_memory(id, memory));
        }
        store
    }

    /// Attach content to existing cards and create `New` cards for unknown
    /// ids. Memory fields of existing cards are never touched.
    pub fn merge(&mut self, items: Vec<ContentItem>, now: Timestamp) {
        let mut created = 0;
        for ContentItem { id, content } in items {
            match self.index.get(&id) {
                Some(&position) => {
                    self.cards[position].set_content(content);
                }
                None => {
                    self.push(Card::new(id, Some(content), now));
                    created += 1;
                }
            }
        }
        log::debug!(
            "Merged content: {created} new cards, {} total.",
            self.cards.len()
        );
    }

    pub fn get(&self, id: &CardId) -> Option<&Card> {
        self.index.get(id).map(|&position| &self.cards[position])
    }

    pub fn contains(&self, id: &CardId) -> bool {
        self.index.contains_key(id)
    }

    /// Replace a card's memory fields with a memory model outcome.
    pub fn mutate_after_review(&mut self, id: &CardId, memory: MemoryState) {
        match self.index.get(id) {
            Some(&position) => {
                self.cards[position].set_memory(memory);
            }
            None => {
                debug_assert!(false, "mutate_after_review on unknown card {id}");
                log::warn!("Review for unknown card {id} ignored.");
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    fn push(&mut self, card: Card) {
        self.index.insert(card.id().clone(), self.cards.len());
        self.cards.push(card);
    }
}

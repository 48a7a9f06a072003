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

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::error::ErrorKind;
use crate::error::ErrorReport;
use crate::types::card_id::CardId;
use crate::types::timestamp::Timestamp;

/// Where a card is in its lifecycle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum CardState {
    New,
    Learning,
    Review,
    Relearning,
}

impl CardState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardState::New => "new",
            CardState::Learning => "learning",
            CardState::Review => "review",
            CardState::Relearning => "relearning",
        }
    }
}

impl From<CardState> for u8 {
    fn from(value: CardState) -> Self {
        match value {
            CardState::New => 0,
            CardState::Learning => 1,
            CardState::Review => 2,
            CardState::Relearning => 3,
        }
    }
}

impl TryFrom<u8> for CardState {
    type Error = ErrorReport;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CardState::New),
            1 => Ok(CardState::Learning),
            2 => Ok(CardState::Review),
            3 => Ok(CardState::Relearning),
            _ => Err(ErrorReport::with_kind(
                ErrorKind::SchemaInvalid,
                format!("invalid card state: {value}"),
            )),
        }
    }
}

impl Display for CardState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The scheduling fields of a card. Only the memory model produces new values
/// for these.
#[derive(Clone, PartialEq, Debug)]
pub struct MemoryState {
    /// When the card next becomes eligible for review.
    pub due: Timestamp,
    /// The card's stability (an FSRS parameter).
    pub stability: f64,
    /// The card's difficulty (an FSRS parameter).
    pub difficulty: f64,
    /// Days between the previous two reviews.
    pub elapsed_days: u32,
    /// Days between the last review and `due`.
    pub scheduled_days: u32,
    pub reps: u32,
    pub lapses: u32,
    pub state: CardState,
    pub last_review: Option<Timestamp>,
}

impl MemoryState {
    /// The memory state of a card that has never been reviewed.
    pub fn empty(now: Timestamp) -> Self {
        Self {
            due: now,
            stability: 0.0,
            difficulty: 0.0,
            elapsed_days: 0,
            scheduled_days: 0,
            reps: 0,
            lapses: 0,
            state: CardState::New,
            last_review: None,
        }
    }
}

/// The display payload attached by the content provider. Opaque to the
/// scheduler.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Content(Map<String, Value>);

impl Content {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Card {
    id: CardId,
    memory: MemoryState,
    /// Absent until the content provider has been merged.
    content: Option<Content>,
}

impl Card {
    pub fn new(id: CardId, content: Option<Content>, now: Timestamp) -> Self {
        Self {
            id,
            memory: MemoryState::empty(now),
            content,
        }
    }

    pub fn from_memory(id: CardId, memory: MemoryState) -> Self {
        Self {
            id,
            memory,
            content: None,
        }
    }

    pub fn id(&self) -> &CardId {
        &self.id
    }

    pub fn memory(&self) -> &MemoryState {
        &self.memory
    }

    pub fn state(&self) -> CardState {
        self.memory.state
    }

    pub fn due(&self) -> Timestamp {
        self.memory.due
    }

    pub fn content(&self) -> Option<&Content> {
        self.content.as_ref()
    }

    pub(crate) fn set_memory(&mut self, memory: MemoryState) {
        self.memory = memory;
    }

    pub(crate) fn set_content(&mut self, content: Content) {
        self.content = Some(content);
    }
}

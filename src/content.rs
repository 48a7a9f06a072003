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

use std::fs::read_to_string;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;

use crate::error::Fallible;
use crate::error::fail;
use crate::types::card::Content;
use crate::types::card_id::CardId;

/// A card id together with its display payload.
#[derive(Clone, PartialEq, Debug)]
pub struct ContentItem {
    pub id: CardId,
    pub content: Content,
}

/// Supplies the display payload of every card, as one finite batch.
pub trait ContentProvider {
    fn fetch(&self) -> Fallible<Vec<ContentItem>>;
}

/// A fixed list of items.
#[derive(Clone, Default)]
pub struct StaticProvider {
    items: Vec<ContentItem>,
}

impl StaticProvider {
    pub fn new(items: Vec<ContentItem>) -> Self {
        Self { items }
    }
}

impl ContentProvider for StaticProvider {
    fn fetch(&self) -> Fallible<Vec<ContentItem>> {
        Ok(self.items.clone())
    }
}

/// Reads a JSON array of objects, each with an `id` field, from a file.
pub struct JsonFileProvider {
    path: PathBuf,
}

impl JsonFileProvider {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[derive(Deserialize)]
struct RawItem {
    id: CardId,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl ContentProvider for JsonFileProvider {
    fn fetch(&self) -> Fallible<Vec<ContentItem>> {
        if !self.path.exists() {
            log::warn!("No content file at {}.", self.path.display());
            return Ok(Vec::new());
        }
        let text = read_to_string(&self.path)?;
        parse_items(&text)
    }
}

pub fn parse_items(text: &str) -> Fallible<Vec<ContentItem>> {
    let raw: Vec<RawItem> = serde_json::from_str(text)?;
    let mut items = Vec::with_capacity(raw.len());
    for RawItem { id, fields } in raw {
        if id.is_empty() {
            return fail("content item with an empty id.");
        }
        items.push(ContentItem {
            id,
            content: Content::new(fields),
        });
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use std::fs::write;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_parse_items() -> Fallible<()> {
        let items = parse_items(
            r#"[{"id": "0", "kanji": "傾向", "reading": "けいこう"}, {"id": "1", "front": "a"}]"#,
        )?;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, CardId::new("0"));
        let fields = items[0].content.fields();
        assert_eq!(fields["kanji"], "傾向");
        assert!(!fields.contains_key("id"));
        Ok(())
    }

    #[test]
    fn test_parse_items_rejects_missing_id() {
        assert!(parse_items(r#"[{"front": "a"}]"#).is_err());
        assert!(parse_items(r#"[{"id": ""}]"#).is_err());
        assert!(parse_items(r#"{"id": "a"}"#).is_err());
    }

    #[test]
    fn test_file_provider() -> Fallible<()> {
        let dir = tempdir()?;
        let path = dir.path().join("cards.json");
        let provider = JsonFileProvider::new(path.clone());
        assert!(provider.fetch()?.is_empty());
        write(&path, r#"[{"id": "x", "front": "X"}]"#)?;
        let items = provider.fetch()?;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, CardId::new("x"));
        Ok(())
    }
}

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

use std::path::Path;

use crate::collection::CARDS_FILENAME;
use crate::collection::DB_FILENAME;
use crate::collection::resolve_directory;
use crate::config::Config;
use crate::content::ContentProvider;
use crate::content::JsonFileProvider;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::snapshot::Snapshot;
use crate::storage::SnapshotStorage;
use crate::storage::SqliteStorage;

/// Validate the config, the content file, and the saved state. Nothing is
/// created or written: a missing database is reported as empty.
pub fn check_collection(directory: Option<String>) -> Fallible<()> {
    let directory = resolve_directory(directory)?;
    let cards = check(&directory)?;
    println!("ok ({cards} saved cards)");
    Ok(())
}

fn check(directory: &Path) -> Fallible<usize> {
    Config::load(directory)?.scheduler_settings()?;
    let items = JsonFileProvider::new(directory.join(CARDS_FILENAME)).fetch()?;
    log::debug!("Content file has {} items.", items.len());

    let db_path = directory.join(DB_FILENAME);
    if !db_path.exists() {
        return Ok(0);
    }
    let db_path: &str = db_path
        .to_str()
        .ok_or_else(|| ErrorReport::new("invalid path"))?;
    let storage = SqliteStorage::open_read_only(db_path)?;
    let raw = match storage.read()? {
        Some(raw) => raw,
        None => return Ok(0),
    };
    let snapshot = Snapshot::parse(&raw).map_err(|err| {
        ErrorReport::with_kind(err.kind(), format!("{}: {}", err.kind().as_str(), err.message()))
    })?;
    Ok(snapshot.card_count())
}

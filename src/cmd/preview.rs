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

use crate::collection::Collection;
use crate::engine::Engine;
use crate::error::Fallible;
use crate::error::fail;
use crate::fsrs::Grade;
use crate::model::MemoryModel;
use crate::relative::format_relative;
use crate::storage::SnapshotStorage;
use crate::types::card_id::CardId;

pub fn preview_card(directory: Option<String>, id: String) -> Fallible<()> {
    let collection = Collection::open_loaded(directory)?;
    for line in preview_lines(&collection.engine, &CardId::new(id))? {
        println!("{line}");
    }
    Ok(())
}

/// One line per grade: the grade, the due timestamp, and how far away it is.
fn preview_lines<S: SnapshotStorage, M: MemoryModel>(
    engine: &Engine<S, M>,
    id: &CardId,
) -> Fallible<Vec<String>> {
    let dues = match engine.due_timestamps_for_each_grade(id)? {
        Some(dues) => dues,
        None => return fail(format!("no card with id {id}.")),
    };
    let now = engine.now();
    Ok(Grade::ALL
        .iter()
        .map(|grade| {
            let due = dues.get(*grade);
            format!("{}\t{due}\t{}", grade.as_str(), format_relative(now, due))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::collection::tests::write_collection;

    #[test]
    fn test_preview() -> Fallible<()> {
        let dir = tempdir()?;
        write_collection(dir.path(), 2, "enable_fuzz = false\n")?;
        let path = dir.path().display().to_string();
        let collection = Collection::open_loaded(Some(path))?;
        let lines = preview_lines(&collection.engine, &CardId::new("card-1"))?;
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("forgot\t"));
        assert!(lines[0].ends_with("in 1 minute"));
        assert!(lines[2].ends_with("in 10 minutes"));
        assert!(lines[3].starts_with("easy\t"));
        assert!(preview_lines(&collection.engine, &CardId::new("nope")).is_err());
        Ok(())
    }
}

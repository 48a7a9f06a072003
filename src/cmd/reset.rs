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
use crate::error::Fallible;
use crate::error::fail;

pub fn reset_collection(directory: Option<String>, yes: bool) -> Fallible<()> {
    if !yes {
        return fail("resetting discards all review history. Pass --yes to confirm.");
    }
    let mut collection = Collection::new(directory)?;
    collection.reset_or_fail()?;
    println!(
        "Reset complete. {} cards, all new.",
        collection.engine.store().len()
    );
    Ok(())
}

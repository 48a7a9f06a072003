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

use std::time::Duration;

use timeago::Formatter;
use timeago::TimeUnit;

use crate::types::timestamp::Timestamp;

const MINUTE: i64 = 60;
const DAY: u64 = 86_400;

/// Describe when `to` happens, seen from `from`: "in 10 minutes", "tomorrow",
/// "in 3 days". Past instants read "5 minutes ago".
pub fn format_relative(from: Timestamp, to: Timestamp) -> String {
    // Round to the nearest minute, so a due date a few microseconds short of
    // ten minutes away still reads "in 10 minutes".
    let seconds = from.seconds_until(to);
    let minutes = (seconds.abs() + MINUTE / 2) / MINUTE;
    if minutes == 0 {
        return "now".to_string();
    }
    let duration = Duration::from_secs(minutes.unsigned_abs() * MINUTE as u64);
    let days = duration.as_secs() / DAY;
    match (seconds > 0, days) {
        (true, 1) => return "tomorrow".to_string(),
        (false, 1) => return "yesterday".to_string(),
        _ => {}
    }
    let mut formatter = Formatter::new();
    formatter.min_unit(TimeUnit::Minutes).ago("");
    let text = formatter.convert(duration);
    let text = text.trim();
    if seconds > 0 {
        format!("in {text}")
    } else {
        format!("{text} ago")
    }
}

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

use std::io::BufRead;
use std::io::Write;
use std::io::stdin;
use std::io::stdout;

use serde_json::Value;

use crate::collection::Collection;
use crate::engine::Engine;
use crate::engine::LoadState;
use crate::error::Fallible;
use crate::fsrs::Grade;
use crate::model::MemoryModel;
use crate::relative::format_relative;
use crate::storage::SnapshotStorage;
use crate::types::card::Card;

pub fn drill_collection(directory: Option<String>) -> Fallible<()> {
    let mut collection = Collection::new(directory)?;
    let stdin = stdin();
    let mut input = stdin.lock();
    let mut output = stdout();

    let state = collection.load().clone();
    if let LoadState::Error(failure) = state {
        writeln!(output, "Failed to load saved state: {}.", failure.message)?;
        writeln!(output, "Reset saved state? This discards all review history. [y/N]")?;
        if !confirm(&mut input)? {
            return Err(failure.to_report());
        }
        collection.reset_or_fail()?;
    }

    let summary = run_session(&mut collection.engine, &mut input, &mut output)?;
    log::debug!("Session ended after {} reviews.", summary.reviewed);
    Ok(())
}

#[derive(Debug, PartialEq)]
pub struct SessionSummary {
    pub reviewed: usize,
    pub finished: bool,
}

/// Drill cards until the queue is empty or the user quits. The schedule is
/// recomputed first, so a day boundary crossed since loading takes effect.
pub fn run_session<S, M, R, W>(
    engine: &mut Engine<S, M>,
    input: &mut R,
    output: &mut W,
) -> Fallible<SessionSummary>
where
    S: SnapshotStorage,
    M: MemoryModel,
    R: BufRead,
    W: Write,
{
    engine.refresh()?;
    let mut reviewed = 0;
    loop {
        let card: Card = match engine.current_card() {
            Some(card) => card.clone(),
            None => {
                writeln!(output, "You have finished all cards for today!")?;
                log::debug!("Session completed");
                return Ok(SessionSummary {
                    reviewed,
                    finished: true,
                });
            }
        };
        let counts = engine.schedule_counts();
        writeln!(
            output,
            "\nNew: {}  Learning: {}  Review: {}",
            counts.new, counts.learning, counts.review
        )?;

        let (front, back) = split_fields(&card);
        writeln!(output, "{front}")?;
        writeln!(output, "[press Enter to reveal, q to quit]")?;
        match read_line(input)? {
            Some(line) if line != "q" => {}
            _ => return Ok(quit(reviewed)),
        }
        for line in back {
            writeln!(output, "{line}")?;
        }

        let now = engine.now();
        if let Some(dues) = engine.due_timestamps_for_each_grade(card.id())? {
            let options: Vec<String> = Grade::ALL
                .iter()
                .map(|grade| {
                    let when = format_relative(now, dues.get(*grade));
                    format!("{} = {} ({when})", grade.ordinal(), grade.as_str())
                })
                .collect();
            writeln!(output, "{}", options.join("  "))?;
        }

        let grade = match read_grade(input, output)? {
            Some(grade) => grade,
            None => return Ok(quit(reviewed)),
        };
        engine.rate_and_advance(card.id(), grade)?;
        reviewed += 1;
    }
}

fn quit(reviewed: usize) -> SessionSummary {
    SessionSummary {
        reviewed,
        finished: false,
    }
}

/// The first content field is the prompt, the rest are the answer.
fn split_fields(card: &Card) -> (String, Vec<String>) {
    let fields = match card.content() {
        Some(content) => content.fields(),
        None => return (format!("({} has no content)", card.id()), Vec::new()),
    };
    let mut lines = fields.iter().map(|(key, value)| match value {
        Value::String(s) => format!("{key}: {s}"),
        other => format!("{key}: {other}"),
    });
    let front = lines.next().unwrap_or_else(|| format!("({})", card.id()));
    (front, lines.collect())
}

/// Read a trimmed line, or `None` at end of input.
fn read_line<R: BufRead>(input: &mut R) -> Fallible<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn read_grade<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Fallible<Option<Grade>> {
    loop {
        let line = match read_line(input)? {
            Some(line) => line,
            None => return Ok(None),
        };
        if line == "q" {
            return Ok(None);
        }
        match line.parse::<u8>().ok().and_then(|n| Grade::try_from(n).ok()) {
            Some(grade) => return Ok(Some(grade)),
            None => writeln!(output, "Invalid input. Please enter a number between 1 and 4.")?,
        }
    }
}

fn confirm<R: BufRead>(input: &mut R) -> Fallible<bool> {
    Ok(matches!(read_line(input)?.as_deref(), Some("y") | Some("Y") | Some("yes")))
}

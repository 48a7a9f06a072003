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

use crate::error::ErrorKind;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::fsrs::Difficulty;
use crate::fsrs::Grade;
use crate::fsrs::Stability;
use crate::fsrs::initial_difficulty;
use crate::fsrs::initial_stability;
use crate::fsrs::interval;
use crate::fsrs::new_difficulty;
use crate::fsrs::new_stability;
use crate::fsrs::retrievability;
use crate::fsrs::short_term_stability;
use crate::types::card::Card;
use crate::types::card::CardState;
use crate::types::card::MemoryState;
use crate::types::timestamp::Timestamp;

/// Computes, for every grade, the memory state a card would have after being
/// reviewed at `now`. Implementations must not depend on anything but their
/// arguments and their own parameters.
pub trait MemoryModel {
    fn outcomes(&self, card: &Card, now: Timestamp) -> Fallible<Outcomes>;
}

/// The result of reviewing a card with each possible grade.
#[derive(Clone, PartialEq, Debug)]
pub struct Outcomes {
    pub forgot: MemoryState,
    pub hard: MemoryState,
    pub good: MemoryState,
    pub easy: MemoryState,
}

impl Outcomes {
    pub fn get(&self, grade: Grade) -> &MemoryState {
        match grade {
            Grade::Forgot => &self.forgot,
            Grade::Hard => &self.hard,
            Grade::Good => &self.good,
            Grade::Easy => &self.easy,
        }
    }

    pub fn into_state(self, grade: Grade) -> MemoryState {
        match grade {
            Grade::Forgot => self.forgot,
            Grade::Hard => self.hard,
            Grade::Good => self.good,
            Grade::Easy => self.easy,
        }
    }

    pub fn dues(&self) -> GradeDues {
        GradeDues {
            forgot: self.forgot.due,
            hard: self.hard.due,
            good: self.good.due,
            easy: self.easy.due,
        }
    }
}

/// The next due timestamp for each grade.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GradeDues {
    pub forgot: Timestamp,
    pub hard: Timestamp,
    pub good: Timestamp,
    pub easy: Timestamp,
}

impl GradeDues {
    pub fn get(&self, grade: Grade) -> Timestamp {
        match grade {
            Grade::Forgot => self.forgot,
            Grade::Hard => self.hard,
            Grade::Good => self.good,
            Grade::Easy => self.easy,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct FsrsParameters {
    /// The desired recall probability.
    pub request_retention: f64,
    /// The maximum review interval in days.
    pub maximum_interval: u32,
    /// Whether to spread review intervals of three days or more.
    pub enable_fuzz: bool,
}

impl Default for FsrsParameters {
    fn default() -> Self {
        Self {
            request_retention: 0.9,
            maximum_interval: 1000,
            enable_fuzz: true,
        }
    }
}

/// Learning steps, in minutes, for cards that are not yet in review.
const NEW_STEPS: [i64; 3] = [1, 5, 10];
const LEARNING_STEPS: [i64; 2] = [5, 10];
const RELEARNING_STEP: i64 = 5;

/// The minimum review interval in days.
const MIN_INTERVAL: f64 = 1.0;

/// FSRS with short-term learning steps.
pub struct FsrsModel {
    params: FsrsParameters,
}

impl FsrsModel {
    pub fn new(params: FsrsParameters) -> Self {
        Self { params }
    }

    fn review_interval(&self, s: Stability, fuzz: Option<f64>) -> u32 {
        let max = self.params.maximum_interval as f64;
        let raw = interval(self.params.request_retention, s)
            .round()
            .clamp(MIN_INTERVAL, max.max(MIN_INTERVAL));
        match fuzz {
            Some(factor) => fuzz_interval(raw, factor, max),
            None => raw as u32,
        }
    }

    /// Ordering adjustments may not push an interval past the maximum. At the
    /// cap, neighbouring grades tie.
    fn capped(&self, days: u32) -> u32 {
        days.min(self.params.maximum_interval.max(MIN_INTERVAL as u32))
    }

    fn fuzz_factor(&self, card: &Card, now: Timestamp) -> Option<f64> {
        if !self.params.enable_fuzz {
            return None;
        }
        let mut hasher = blake3::Hasher::new();
        hasher.update(card.id().as_str().as_bytes());
        hasher.update(&card.memory().reps.to_le_bytes());
        hasher.update(now.to_rfc3339().as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        Some((u64::from_le_bytes(bytes) >> 11) as f64 / (1u64 << 53) as f64)
    }
}

impl MemoryModel for FsrsModel {
    fn outcomes(&self, card: &Card, now: Timestamp) -> Fallible<Outcomes> {
        let prev = card.memory();
        let elapsed = match prev.last_review {
            Some(last) => now.days_since(last),
            None => 0,
        };
        let fuzz = self.fuzz_factor(card, now);

        // Per-grade stability and difficulty.
        let params = Grade::ALL.map(|grade| next_parameters(prev, elapsed, grade));

        let base = MemoryState {
            reps: prev.reps.saturating_add(1),
            elapsed_days: u32::try_from(elapsed).unwrap_or(u32::MAX),
            last_review: Some(now),
            ..prev.clone()
        };
        let step = |(s, d): (Stability, Difficulty), state: CardState, minutes: i64| MemoryState {
            stability: s,
            difficulty: d,
            state,
            due: now.plus_minutes(minutes),
            scheduled_days: 0,
            ..base.clone()
        };
        let review = |(s, d): (Stability, Difficulty), days: u32| MemoryState {
            stability: s,
            difficulty: d,
            state: CardState::Review,
            due: now.plus_days(days as i64),
            scheduled_days: days,
            ..base.clone()
        };

        let [forgot, hard, good, easy] = params;
        let outcomes = match prev.state {
            CardState::New => {
                let easy_days = self.review_interval(easy.0, fuzz);
                Outcomes {
                    forgot: step(forgot, CardState::Learning, NEW_STEPS[0]),
                    hard: step(hard, CardState::Learning, NEW_STEPS[1]),
                    good: step(good, CardState::Learning, NEW_STEPS[2]),
                    easy: review(easy, easy_days),
                }
            }
            CardState::Learning | CardState::Relearning => {
                let good_days = self.review_interval(good.0, fuzz);
                let easy_days = self.capped(self.review_interval(easy.0, fuzz).max(good_days + 1));
                Outcomes {
                    forgot: step(forgot, prev.state, LEARNING_STEPS[0]),
                    hard: step(hard, prev.state, LEARNING_STEPS[1]),
                    good: review(good, good_days),
                    easy: review(easy, easy_days),
                }
            }
            CardState::Review => {
                let hard_days = self.review_interval(hard.0, fuzz);
                let good_days = self.review_interval(good.0, fuzz);
                let hard_days = hard_days.min(good_days);
                let good_days = self.capped(good_days.max(hard_days + 1));
                let easy_days = self.capped(self.review_interval(easy.0, fuzz).max(good_days + 1));
                let mut forgot = step(forgot, CardState::Relearning, RELEARNING_STEP);
                forgot.lapses = prev.lapses.saturating_add(1);
                Outcomes {
                    forgot,
                    hard: review(hard, hard_days),
                    good: review(good, good_days),
                    easy: review(easy, easy_days),
                }
            }
        };
        check_outcomes(&outcomes)?;
        Ok(outcomes)
    }
}

fn next_parameters(prev: &MemoryState, elapsed: i64, grade: Grade) -> (Stability, Difficulty) {
    if prev.state == CardState::New || prev.stability <= 0.0 {
        return (initial_stability(grade), initial_difficulty(grade));
    }
    let d = new_difficulty(prev.difficulty, grade);
    let s = if elapsed == 0 {
        short_term_stability(prev.stability, grade)
    } else {
        let r = retrievability(elapsed as f64, prev.stability);
        new_stability(prev.difficulty, prev.stability, r, grade)
    };
    (s, d)
}

/// Spread an interval over a window that widens with its length, so cards
/// learned together do not stay clumped together.
fn fuzz_interval(days: f64, factor: f64, max: f64) -> u32 {
    if days < 2.5 {
        return days as u32;
    }
    const RANGES: [(f64, f64, f64); 3] = [
        (2.5, 7.0, 0.15),
        (7.0, 20.0, 0.1),
        (20.0, f64::INFINITY, 0.05),
    ];
    let mut delta = 1.0;
    for (start, end, factor) in RANGES {
        delta += factor * (days.min(end) - start).max(0.0);
    }
    let max_days = (days + delta).round().min(max);
    let min_days = (days - delta).round().max(2.0).min(max_days);
    (factor * (max_days - min_days + 1.0) + min_days).floor().min(max_days) as u32
}

fn check_outcomes(outcomes: &Outcomes) -> Fallible<()> {
    for grade in Grade::ALL {
        let state = outcomes.get(grade);
        if !state.stability.is_finite() || !state.difficulty.is_finite() {
            return Err(ErrorReport::with_kind(
                ErrorKind::AdapterFailure,
                format!("memory model produced non-finite parameters for grade {grade}"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::card_id::CardId;

    fn now() -> Timestamp {
        Timestamp::parse("2024-05-01T10:00:00Z").unwrap()
    }

    fn model() -> FsrsModel {
        FsrsModel::new(FsrsParameters {
            enable_fuzz: false,
            ..FsrsParameters::default()
        })
    }

    fn new_card() -> Card {
        Card::new(CardId::new("1"), None, now())
    }

    #[test]
    fn test_new_card_transitions() -> Fallible<()> {
        let out = model().outcomes(&new_card(), now())?;
        assert_eq!(out.forgot.state, CardState::Learning);
        assert_eq!(out.hard.state, CardState::Learning);
        assert_eq!(out.good.state, CardState::Learning);
        assert_eq!(out.easy.state, CardState::Review);
        assert_eq!(out.forgot.due, now().plus_minutes(1));
        assert_eq!(out.good.due, now().plus_minutes(10));
        assert!(out.easy.scheduled_days >= 1);
        for grade in Grade::ALL {
            let state = out.get(grade);
            assert_eq!(state.reps, 1);
            assert_eq!(state.last_review, Some(now()));
        }
        Ok(())
    }

    #[test]
    fn test_does_not_mutate_input() -> Fallible<()> {
        let card = new_card();
        let before = card.clone();
        let _ = model().outcomes(&card, now())?;
        assert_eq!(card, before);
        Ok(())
    }

    #[test]
    fn test_learning_graduates_on_good() -> Fallible<()> {
        let mut card = new_card();
        let out = model().outcomes(&card, now())?;
        card.set_memory(out.into_state(Grade::Good));
        let later = now().plus_minutes(10);
        let out = model().outcomes(&card, later)?;
        assert_eq!(out.forgot.state, CardState::Learning);
        assert_eq!(out.good.state, CardState::Review);
        assert!(out.easy.scheduled_days > out.good.scheduled_days);
        Ok(())
    }

    #[test]
    fn test_review_intervals_are_ordered() -> Fallible<()> {
        let mut card = new_card();
        card.set_memory(model().outcomes(&card, now())?.into_state(Grade::Easy));
        let later = card.due().plus_days(1);
        let out = model().outcomes(&card, later)?;
        assert_eq!(out.forgot.state, CardState::Relearning);
        assert_eq!(out.forgot.lapses, 1);
        assert!(out.hard.scheduled_days <= out.good.scheduled_days);
        assert!(out.good.scheduled_days < out.easy.scheduled_days);
        assert!(out.hard.due <= out.good.due);
        assert_eq!(out.good.elapsed_days as i64, later.days_since(now()));
        Ok(())
    }

    #[test]
    fn test_maximum_interval_is_respected() -> Fallible<()> {
        let model = FsrsModel::new(FsrsParameters {
            maximum_interval: 3,
            enable_fuzz: false,
            ..FsrsParameters::default()
        });
        let out = model.outcomes(&new_card(), now())?;
        assert_eq!(out.easy.scheduled_days, 3);
        Ok(())
    }

    #[test]
    fn test_maximum_interval_holds_after_ordering() -> Fallible<()> {
        let model = FsrsModel::new(FsrsParameters {
            maximum_interval: 3,
            enable_fuzz: false,
            ..FsrsParameters::default()
        });
        let id = CardId::new("1");

        let learning = model.outcomes(&new_card(), now())?.good;
        assert_eq!(learning.state, CardState::Learning);
        let at = now().plus_minutes(10);
        let out = model.outcomes(&Card::from_memory(id.clone(), learning), at)?;
        for grade in [Grade::Good, Grade::Easy] {
            assert!(out.get(grade).scheduled_days <= 3, "{grade} past the cap");
        }
        assert!(out.good.scheduled_days <= out.easy.scheduled_days);

        let review = out.easy;
        assert_eq!(review.state, CardState::Review);
        let at = review.due.plus_days(1);
        let out = model.outcomes(&Card::from_memory(id, review), at)?;
        for grade in [Grade::Hard, Grade::Good, Grade::Easy] {
            let state = out.get(grade);
            assert!(state.scheduled_days <= 3, "{grade} past the cap");
            assert_eq!(state.due, at.plus_days(state.scheduled_days as i64));
        }
        assert!(out.hard.scheduled_days <= out.good.scheduled_days);
        assert!(out.good.scheduled_days <= out.easy.scheduled_days);
        assert_eq!(out.easy.scheduled_days, 3);
        Ok(())
    }

    #[test]
    fn test_fuzz_is_deterministic() -> Fallible<()> {
        let model = FsrsModel::new(FsrsParameters::default());
        let card = new_card();
        let a = model.outcomes(&card, now())?;
        let b = model.outcomes(&card, now())?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn test_fuzz_interval_window() {
        assert_eq!(fuzz_interval(2.0, 0.99, 1000.0), 2);
        for factor in [0.0, 0.25, 0.5, 0.75, 0.999] {
            let days = fuzz_interval(30.0, factor, 1000.0);
            assert!((26..=34).contains(&days), "{days}");
        }
        assert!(fuzz_interval(30.0, 0.999, 31.0) <= 31);
    }
}

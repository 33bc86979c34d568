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

//! The SM-2 scheduling algorithm.
//!
//! Every function here is pure: the current instant is always passed in.

use std::fmt::Display;
use std::fmt::Formatter;

use serde::Serialize;

use crate::types::timestamp::Timestamp;

/// The easiness factor a new card starts with.
pub const INITIAL_EASINESS: f64 = 2.5;

/// The easiness factor never drops below this.
pub const MIN_EASINESS: f64 = 1.3;

/// The interval after the first successful recall.
const FIRST_INTERVAL: u32 = 1;

/// The interval after the second consecutive successful recall.
const SECOND_INTERVAL: u32 = 6;

/// The interval after a failed recall.
const FAILED_INTERVAL: u32 = 1;

/// The longest interval a card can be given: about a hundred years.
pub const MAX_INTERVAL: u32 = 36_500;

/// The lowest quality that counts as a successful recall.
const PASSING_QUALITY: u8 = 3;

/// The highest quality rating.
const MAX_QUALITY: u8 = 5;

/// A quality rating outside of `0..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidQuality(pub i64);

impl Display for InvalidQuality {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "quality must be between 0 and {MAX_QUALITY}, got {}", self.0)
    }
}

impl std::error::Error for InvalidQuality {}

/// The learner's self-rated recall for a single review. 0 to 2 are failed
/// recalls, 3 to 5 successful recalls of increasing confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(u8);

impl Quality {
    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_successful(self) -> bool {
        self.0 >= PASSING_QUALITY
    }

    /// Every valid quality, lowest first.
    pub fn all() -> impl Iterator<Item = Quality> {
        (0..=MAX_QUALITY).map(Quality)
    }
}

impl TryFrom<i64> for Quality {
    type Error = InvalidQuality;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match u8::try_from(value) {
            Ok(q) if q <= MAX_QUALITY => Ok(Quality(q)),
            _ => Err(InvalidQuality(value)),
        }
    }
}

/// A card's scheduling state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardScheduleState {
    /// Higher means easier to recall. Never below [`MIN_EASINESS`] once the
    /// card has been reviewed.
    pub easiness_factor: f64,
    /// Consecutive successful recalls since the last failure.
    pub repetition_number: u32,
    /// The interval, in days, computed by the last review. Zero for a card
    /// that has never been reviewed.
    pub interval_days: u32,
    /// When the card is next due.
    pub next_review_at: Timestamp,
}

impl CardScheduleState {
    /// The state of a card that was just created.
    pub fn new(created_at: Timestamp) -> Self {
        Self {
            easiness_factor: INITIAL_EASINESS,
            repetition_number: 0,
            interval_days: 0,
            next_review_at: created_at,
        }
    }
}

/// Compute a card's next state from a raw quality rating.
pub fn compute(
    state: &CardScheduleState,
    quality: i64,
    now: Timestamp,
) -> Result<CardScheduleState, InvalidQuality> {
    let quality = Quality::try_from(quality)?;
    Ok(schedule(state, quality, now))
}

/// Compute a card's next state.
pub fn schedule(state: &CardScheduleState, quality: Quality, now: Timestamp) -> CardScheduleState {
    let easiness_factor = new_easiness(state.easiness_factor, quality);
    let (repetition_number, interval_days) = if quality.is_successful() {
        let n = state.repetition_number.saturating_add(1);
        let interval = match n {
            1 => FIRST_INTERVAL,
            2 => SECOND_INTERVAL,
            _ => scaled_interval(state.interval_days, easiness_factor),
        };
        (n, interval)
    } else {
        (0, FAILED_INTERVAL)
    };
    CardScheduleState {
        easiness_factor,
        repetition_number,
        interval_days,
        next_review_at: now.plus_days(interval_days),
    }
}

/// The interval the card would get for each quality, indexed by quality.
pub fn preview_intervals(state: &CardScheduleState, now: Timestamp) -> [u32; 6] {
    let mut intervals = [0; 6];
    for quality in Quality::all() {
        intervals[quality.value() as usize] = schedule(state, quality, now).interval_days;
    }
    intervals
}

fn new_easiness(easiness_factor: f64, quality: Quality) -> f64 {
    let miss = f64::from(MAX_QUALITY - quality.value());
    let ef = easiness_factor + (0.1 - miss * (0.08 + miss * 0.02));
    // `max` discards a NaN operand.
    ef.max(MIN_EASINESS)
}

fn scaled_interval(previous: u32, easiness_factor: f64) -> u32 {
    // Float to int casts saturate.
    let interval = (f64::from(previous) * easiness_factor).round() as u32;
    interval.clamp(1, MAX_INTERVAL)
}

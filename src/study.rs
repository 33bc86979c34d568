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

use crate::error::ErrorReport;
use crate::sm2::CardScheduleState;
use crate::sm2::InvalidQuality;
use crate::sm2::compute;
use crate::store::CardStore;
use crate::store::SaveOutcome;
use crate::types::CardId;
use crate::types::UserId;
use crate::types::timestamp::Timestamp;

#[derive(Debug)]
pub enum StudyError {
    InvalidQuality(InvalidQuality),
    NotFound(CardId),
    /// The card belongs to someone else.
    Forbidden(CardId),
    /// The card was updated concurrently.
    Conflict(CardId),
    Store(ErrorReport),
}

impl Display for StudyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StudyError::InvalidQuality(e) => write!(f, "{e}"),
            StudyError::NotFound(card_id) => write!(f, "card {card_id} not found"),
            StudyError::Forbidden(card_id) => {
                write!(f, "user does not have permission to study card {card_id}")
            }
            StudyError::Conflict(card_id) => {
                write!(f, "card {card_id} was updated concurrently, try again")
            }
            StudyError::Store(e) => write!(f, "{}", e.message()),
        }
    }
}

impl std::error::Error for StudyError {}

impl From<InvalidQuality> for StudyError {
    fn from(value: InvalidQuality) -> Self {
        StudyError::InvalidQuality(value)
    }
}

impl From<ErrorReport> for StudyError {
    fn from(value: ErrorReport) -> Self {
        StudyError::Store(value)
    }
}

/// Record a study response: load the card, schedule it, and save the new
/// state.
pub fn study_card<S: CardStore>(
    store: &S,
    caller: UserId,
    card_id: CardId,
    quality: i64,
    now: Timestamp,
) -> Result<CardScheduleState, StudyError> {
    let stored = store.load(card_id)?.ok_or(StudyError::NotFound(card_id))?;
    if stored.owner != caller {
        return Err(StudyError::Forbidden(card_id));
    }
    let next = compute(&stored.state, quality, now)?;
    log::debug!(
        "card {card_id} q={quality} EF={:.2} n={} I={}d due={}",
        next.easiness_factor,
        next.repetition_number,
        next.interval_days,
        next.next_review_at.to_rfc3339()
    );
    match store.save(card_id, stored.version, &next)? {
        SaveOutcome::Saved => Ok(next),
        SaveOutcome::Conflict => Err(StudyError::Conflict(card_id)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::TimeZone;
    use chrono::Utc;

    use super::*;
    use crate::error::Fallible;
    use crate::store::StoredSchedule;

    fn t() -> Timestamp {
        Timestamp::new(Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap())
    }

    /// A card store backed by a map.
    #[derive(Default)]
    struct MemoryStore {
        cards: Mutex<HashMap<CardId, StoredSchedule>>,
        saves: Mutex<usize>,
    }

    impl MemoryStore {
        fn with_card(card_id: CardId, owner: UserId) -> Self {
            let store = MemoryStore::default();
            store.cards.lock().unwrap().insert(
                card_id,
                StoredSchedule {
                    owner,
                    state: CardScheduleState::new(t()),
                    version: 0,
                },
            );
            store
        }

        fn saves(&self) -> usize {
            *self.saves.lock().unwrap()
        }
    }

    impl CardStore for MemoryStore {
        fn load(&self, card_id: CardId) -> Fallible<Option<StoredSchedule>> {
            Ok(self.cards.lock().unwrap().get(&card_id).copied())
        }

        fn save(
            &self,
            card_id: CardId,
            version: i64,
            state: &CardScheduleState,
        ) -> Fallible<SaveOutcome> {
            let mut cards = self.cards.lock().unwrap();
            let Some(stored) = cards.get_mut(&card_id) else {
                return Ok(SaveOutcome::Conflict);
            };
            if stored.version != version {
                return Ok(SaveOutcome::Conflict);
            }
            stored.state = *state;
            stored.version += 1;
            *self.saves.lock().unwrap() += 1;
            Ok(SaveOutcome::Saved)
        }
    }

    /// A store whose saves always lose the race.
    struct RacingStore(MemoryStore);

    impl CardStore for RacingStore {
        fn load(&self, card_id: CardId) -> Fallible<Option<StoredSchedule>> {
            self.0.load(card_id)
        }

        fn save(&self, _: CardId, _: i64, _: &CardScheduleState) -> Fallible<SaveOutcome> {
            Ok(SaveOutcome::Conflict)
        }
    }

    #[test]
    fn test_schedule_progression() {
        let store = MemoryStore::with_card(1, 7);
        let first = study_card(&store, 7, 1, 5, t()).unwrap();
        assert_eq!(first.repetition_number, 1);
        assert_eq!(first.interval_days, 1);

        let now = first.next_review_at;
        let second = study_card(&store, 7, 1, 5, now).unwrap();
        assert_eq!(second.repetition_number, 2);
        assert_eq!(second.interval_days, 6);
        assert_eq!(second.next_review_at, now.plus_days(6));

        // The stored interval feeds the third review: round(6 * 2.8) = 17.
        let now = second.next_review_at;
        let third = study_card(&store, 7, 1, 5, now).unwrap();
        assert_eq!(third.repetition_number, 3);
        assert_eq!(third.interval_days, 17);

        let fail = study_card(&store, 7, 1, 0, third.next_review_at).unwrap();
        assert_eq!(fail.repetition_number, 0);
        assert_eq!(fail.interval_days, 1);
        assert_eq!(store.saves(), 4);
        assert_eq!(store.load(1).unwrap().unwrap().version, 4);
    }

    #[test]
    fn test_unknown_card() {
        let store = MemoryStore::default();
        let result = study_card(&store, 7, 1, 5, t());
        assert!(matches!(result, Err(StudyError::NotFound(1))));
    }

    #[test]
    fn test_other_users_card() {
        let store = MemoryStore::with_card(1, 7);
        let result = study_card(&store, 8, 1, 5, t());
        assert!(matches!(result, Err(StudyError::Forbidden(1))));
        assert_eq!(store.saves(), 0);
    }

    #[test]
    fn test_invalid_quality_saves_nothing() {
        let store = MemoryStore::with_card(1, 7);
        for quality in [-1, 6] {
            let result = study_card(&store, 7, 1, quality, t());
            assert!(matches!(
                result,
                Err(StudyError::InvalidQuality(InvalidQuality(q))) if q == quality
            ));
        }
        assert_eq!(store.saves(), 0);
        assert_eq!(
            store.load(1).unwrap().unwrap().state,
            CardScheduleState::new(t())
        );
    }

    #[test]
    fn test_conflict() {
        let store = RacingStore(MemoryStore::with_card(1, 7));
        let result = study_card(&store, 7, 1, 4, t());
        assert!(matches!(result, Err(StudyError::Conflict(1))));
    }

    #[test]
    fn test_display() {
        assert_eq!(StudyError::NotFound(3).to_string(), "card 3 not found");
        assert_eq!(
            StudyError::Forbidden(4).to_string(),
            "user does not have permission to study card 4"
        );
        assert_eq!(
            StudyError::Conflict(5).to_string(),
            "card 5 was updated concurrently, try again"
        );
        assert_eq!(
            StudyError::InvalidQuality(InvalidQuality(6)).to_string(),
            "quality must be between 0 and 5, got 6"
        );
        assert_eq!(
            StudyError::Store(ErrorReport::new("disk full")).to_string(),
            "disk full"
        );
    }
}

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

use crate::error::Fallible;
use crate::sm2::CardScheduleState;
use crate::types::CardId;
use crate::types::UserId;

/// A card's scheduling state as loaded from storage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoredSchedule {
    /// The user who owns the card.
    pub owner: UserId,
    pub state: CardScheduleState,
    /// Incremented on every save. Used to detect concurrent updates.
    pub version: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The stored version no longer matches: someone else saved first.
    Conflict,
}

/// Where card scheduling state lives.
pub trait CardStore {
    /// Load a card's scheduling state. Returns `None` if there is no such
    /// card.
    fn load(&self, card_id: CardId) -> Fallible<Option<StoredSchedule>>;

    /// Replace a card's scheduling state, provided its stored version is
    /// still `version`.
    fn save(
        &self,
        card_id: CardId,
        version: i64,
        state: &CardScheduleState,
    ) -> Fallible<SaveOutcome>;
}

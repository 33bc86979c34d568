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
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::Transaction;
use rusqlite::config::DbConfig;

use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::sm2::CardScheduleState;
use crate::store::CardStore;
use crate::store::SaveOutcome;
use crate::store::StoredSchedule;
use crate::types::CardId;
use crate::types::DeckId;
use crate::types::UserId;
use crate::types::timestamp::Timestamp;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRow {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeckRow {
    pub deck_id: DeckId,
    pub user_id: UserId,
    pub name: String,
    pub description: String,
    /// The number of cards in the deck.
    pub total_cards: i64,
    /// The number of cards due at the time of the query.
    pub cards_left: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardRow {
    pub card_id: CardId,
    pub deck_id: DeckId,
    pub user_id: UserId,
    pub front: String,
    pub back: String,
    pub schedule: CardScheduleState,
}

/// Filters for [`Database::list_cards`]. `None` matches everything.
#[derive(Debug, Default)]
pub struct CardQuery {
    pub user_id: UserId,
    pub card_id: Option<CardId>,
    pub deck_id: Option<DeckId>,
    /// Substring of the card's front.
    pub front: Option<String>,
    /// Substring of the card's back.
    pub back: Option<String>,
    /// Only return cards due at or before this instant.
    pub due_at: Option<Timestamp>,
}

impl Database {
    pub fn open(path: &Path) -> Fallible<Self> {
        let path: &str = path
            .to_str()
            .ok_or_else(|| ErrorReport::new("invalid path"))?;
        Self::new(path)
    }

    pub fn new(database_path: &str) -> Fallible<Self> {
        let mut conn = Connection::open(database_path)?;
        conn.set_db_config(DbConfig::SQLITE_DBCONFIG_ENABLE_FKEY, true)?;
        {
            let tx = conn.transaction()?;
            if !probe_schema_exists(&tx)? {
                log::info!("Creating schema in {database_path}");
                tx.execute_batch(include_str!("schema.sql"))?;
                tx.commit()?;
            }
        }
        let conn = Arc::new(Mutex::new(conn));
        Ok(Self { conn })
    }

    /// Register a user. Returns `None` if the email is already taken.
    pub fn insert_user(&self, name: &str, email: &str, now: Timestamp) -> Fallible<Option<UserId>> {
        let conn = self.acquire()?;
        let sql = "insert into users (name, email, created_at) values (?, ?, ?) returning user_id;";
        match conn.query_row(sql, (name, email, now), |row| row.get(0)) {
            Ok(user_id) => Ok(Some(user_id)),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_user(&self, user_id: UserId) -> Fallible<Option<UserRow>> {
        let conn = self.acquire()?;
        let sql = "select user_id, name, email, created_at from users where user_id = ?;";
        let user = conn
            .query_row(sql, [user_id], |row| {
                Ok(UserRow {
                    user_id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })
            .optional()?;
        Ok(user)
    }

    pub fn insert_deck(
        &self,
        user_id: UserId,
        name: &str,
        description: &str,
        now: Timestamp,
    ) -> Fallible<DeckId> {
        let conn = self.acquire()?;
        let sql = "insert into decks (user_id, name, description, created_at, updated_at) values (?, ?, ?, ?, ?) returning deck_id;";
        let deck_id = conn.query_row(sql, (user_id, name, description, now, now), |row| {
            row.get(0)
        })?;
        Ok(deck_id)
    }

    /// Fetch a deck along with its card counts as of `now`.
    pub fn get_deck(&self, deck_id: DeckId, now: Timestamp) -> Fallible<Option<DeckRow>> {
        let conn = self.acquire()?;
        let sql = format!("{DECK_SELECT} where d.deck_id = ?2 group by d.deck_id;");
        let deck = conn
            .query_row(&sql, (now, deck_id), read_deck)
            .optional()?;
        Ok(deck)
    }

    /// List a user's decks, optionally only those whose name contains
    /// `name`.
    pub fn list_decks(
        &self,
        user_id: UserId,
        name: Option<&str>,
        now: Timestamp,
    ) -> Fallible<Vec<DeckRow>> {
        let conn = self.acquire()?;
        let sql = format!(
            "{DECK_SELECT} where d.user_id = ?2 and (?3 is null or d.name like '%' || ?3 || '%') group by d.deck_id order by d.deck_id;"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map((now, user_id, name), read_deck)?;
        let mut decks = Vec::new();
        for deck in rows {
            decks.push(deck?);
        }
        Ok(decks)
    }

    /// Update a deck's fields. `None` leaves a field unchanged.
    pub fn update_deck(
        &self,
        deck_id: DeckId,
        name: Option<&str>,
        description: Option<&str>,
        now: Timestamp,
    ) -> Fallible<()> {
        let conn = self.acquire()?;
        let sql = "update decks set name = coalesce(?, name), description = coalesce(?, description), updated_at = ? where deck_id = ?;";
        conn.execute(sql, (name, description, now, deck_id))?;
        Ok(())
    }

    /// Add a card to a deck, with the default schedule: due immediately.
    pub fn insert_card(
        &self,
        deck_id: DeckId,
        user_id: UserId,
        front: &str,
        back: &str,
        now: Timestamp,
    ) -> Fallible<CardId> {
        let schedule = CardScheduleState::new(now);
        let mut conn = self.acquire()?;
        let tx = conn.transaction()?;
        let sql = "insert into cards (deck_id, user_id, front, back, easiness_factor, repetition_number, interval_days, next_review_at, version, created_at, updated_at) values (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?) returning card_id;";
        let card_id: CardId = tx.query_row(
            sql,
            (
                deck_id,
                user_id,
                front,
                back,
                schedule.easiness_factor,
                schedule.repetition_number,
                schedule.interval_days,
                schedule.next_review_at,
                now,
                now,
            ),
            |row| row.get(0),
        )?;
        tx.commit()?;
        log::debug!("Added card {card_id} to deck {deck_id}");
        Ok(card_id)
    }

    pub fn get_card(&self, card_id: CardId) -> Fallible<Option<CardRow>> {
        let conn = self.acquire()?;
        let sql = format!("{CARD_SELECT} where card_id = ?;");
        let card = conn.query_row(&sql, [card_id], read_card).optional()?;
        Ok(card)
    }

    pub fn list_cards(&self, query: &CardQuery) -> Fallible<Vec<CardRow>> {
        let conn = self.acquire()?;
        let sql = format!(
            "{CARD_SELECT} where user_id = ?1 and (?2 is null or card_id = ?2) and (?3 is null or deck_id = ?3) and (?4 is null or front like '%' || ?4 || '%') and (?5 is null or back like '%' || ?5 || '%') and (?6 is null or next_review_at <= ?6) order by card_id;"
        );
        let mut stmt = conn.prepare(&sql)?;
        let params = (
            query.user_id,
            query.card_id,
            query.deck_id,
            query.front.as_deref(),
            query.back.as_deref(),
            query.due_at,
        );
        let rows = stmt.query_map(params, read_card)?;
        let mut cards = Vec::new();
        for card in rows {
            cards.push(card?);
        }
        Ok(cards)
    }

    /// Update a card's text. `None` leaves a field unchanged. Scheduling
    /// state is not touched.
    pub fn update_card(
        &self,
        card_id: CardId,
        front: Option<&str>,
        back: Option<&str>,
        now: Timestamp,
    ) -> Fallible<()> {
        let conn = self.acquire()?;
        let sql = "update cards set front = coalesce(?, front), back = coalesce(?, back), updated_at = ? where card_id = ?;";
        conn.execute(sql, (front, back, now, card_id))?;
        Ok(())
    }

    fn acquire(&self) -> Fallible<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ErrorReport::new("database connection lock poisoned"))
    }
}

impl CardStore for Database {
    fn load(&self, card_id: CardId) -> Fallible<Option<StoredSchedule>> {
        let conn = self.acquire()?;
        let sql = "select user_id, easiness_factor, repetition_number, interval_days, next_review_at, version from cards where card_id = ?;";
        let stored = conn
            .query_row(sql, [card_id], |row| {
                Ok(StoredSchedule {
                    owner: row.get(0)?,
                    state: CardScheduleState {
                        easiness_factor: row.get(1)?,
                        repetition_number: row.get(2)?,
                        interval_days: row.get(3)?,
                        next_review_at: row.get(4)?,
                    },
                    version: row.get(5)?,
                })
            })
            .optional()?;
        Ok(stored)
    }

    fn save(
        &self,
        card_id: CardId,
        version: i64,
        state: &CardScheduleState,
    ) -> Fallible<SaveOutcome> {
        let conn = self.acquire()?;
        let sql = "update cards set easiness_factor = ?, repetition_number = ?, interval_days = ?, next_review_at = ?, version = version + 1, updated_at = ? where card_id = ? and version = ?;";
        let changed = conn.execute(
            sql,
            (
                state.easiness_factor,
                state.repetition_number,
                state.interval_days,
                state.next_review_at,
                Timestamp::now(),
                card_id,
                version,
            ),
        )?;
        if changed == 0 {
            Ok(SaveOutcome::Conflict)
        } else {
            Ok(SaveOutcome::Saved)
        }
    }
}

const DECK_SELECT: &str = "select d.deck_id, d.user_id, d.name, d.description, count(c.card_id), coalesce(sum(c.next_review_at <= ?1), 0) from decks d left outer join cards c on c.deck_id = d.deck_id";

fn read_deck(row: &Row) -> rusqlite::Result<DeckRow> {
    Ok(DeckRow {
        deck_id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        total_cards: row.get(4)?,
        cards_left: row.get(5)?,
    })
}

const CARD_SELECT: &str = "select card_id, deck_id, user_id, front, back, easiness_factor, repetition_number, interval_days, next_review_at from cards";

fn read_card(row: &Row) -> rusqlite::Result<CardRow> {
    Ok(CardRow {
        card_id: row.get(0)?,
        deck_id: row.get(1)?,
        user_id: row.get(2)?,
        front: row.get(3)?,
        back: row.get(4)?,
        schedule: CardScheduleState {
            easiness_factor: row.get(5)?,
            repetition_number: row.get(6)?,
            interval_days: row.get(7)?,
            next_review_at: row.get(8)?,
        },
    })
}

fn probe_schema_exists(tx: &Transaction) -> Fallible<bool> {
    let sql = "select count(*) from sqlite_master where type='table' AND name=?;";
    let count: i64 = tx.query_row(sql, ["cards"], |row| row.get(0))?;
    Ok(count > 0)
}

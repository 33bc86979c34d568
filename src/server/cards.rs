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

use axum::Json;
use axum::extract::Query;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;

use crate::db::CardQuery;
use crate::db::CardRow;
use crate::server::auth::Caller;
use crate::server::decks::owned_deck;
use crate::server::response::ApiError;
use crate::server::response::ApiResult;
use crate::server::response::Created;
use crate::server::response::non_empty;
use crate::server::response::required;
use crate::server::response::respond;
use crate::server::state::ServerState;
use crate::sm2::CardScheduleState;
use crate::sm2::preview_intervals;
use crate::study::study_card;
use crate::types::CardId;
use crate::types::DeckId;
use crate::types::timestamp::Timestamp;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCardsQuery {
    id: Option<CardId>,
    deck_id: Option<DeckId>,
    front: Option<String>,
    back: Option<String>,
    /// Only list cards that are due now.
    #[serde(default)]
    due: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCardRequest {
    deck_id: Option<DeckId>,
    front: Option<String>,
    back: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateCardRequest {
    id: Option<CardId>,
    front: Option<String>,
    back: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyCardRequest {
    card_id: Option<CardId>,
    quality_of_response: Option<i64>,
}

#[derive(Serialize)]
struct ListCardsResponse {
    cards: Vec<CardItem>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CardItem {
    id: CardId,
    front: String,
    back: String,
    deck_id: DeckId,
    #[serde(flatten)]
    schedule: CardScheduleState,
    /// The interval in days each quality rating would produce, indexed by
    /// quality.
    estimated_time: [u32; 6],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StudyCardResponse {
    card_id: CardId,
    #[serde(flatten)]
    schedule: CardScheduleState,
}

impl CardItem {
    fn new(row: CardRow, now: Timestamp) -> Self {
        Self {
            id: row.card_id,
            front: row.front,
            back: row.back,
            deck_id: row.deck_id,
            estimated_time: preview_intervals(&row.schedule, now),
            schedule: row.schedule,
        }
    }
}

pub async fn list_cards(
    State(state): State<ServerState>,
    Caller(caller): Caller,
    query: Result<Query<ListCardsQuery>, QueryRejection>,
) -> ApiResult {
    let Query(query) = query?;
    let now = Timestamp::now();
    let rows = state.db.list_cards(&CardQuery {
        user_id: caller,
        card_id: query.id,
        deck_id: query.deck_id,
        front: non_empty(query.front),
        back: non_empty(query.back),
        due_at: query.due.then_some(now),
    })?;
    let cards = rows.into_iter().map(|row| CardItem::new(row, now)).collect();
    respond(StatusCode::OK, ListCardsResponse { cards })
}

pub async fn create_card(
    State(state): State<ServerState>,
    Caller(caller): Caller,
    payload: Result<Json<CreateCardRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let deck_id = req
        .deck_id
        .ok_or_else(|| ApiError::BadRequest("deckId is required".to_string()))?;
    let front = required(req.front, "front")?;
    let back = required(req.back, "back")?;
    owned_deck(&state, caller, deck_id, "add cards to")?;
    let id = state
        .db
        .insert_card(deck_id, caller, &front, &back, Timestamp::now())?;
    respond(StatusCode::CREATED, Created { id })
}

pub async fn update_card(
    State(state): State<ServerState>,
    Caller(caller): Caller,
    payload: Result<Json<UpdateCardRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let card_id = req
        .id
        .ok_or_else(|| ApiError::BadRequest("id is required".to_string()))?;
    let card = state
        .db
        .get_card(card_id)?
        .ok_or_else(|| ApiError::NotFound("card not found".to_string()))?;
    if card.user_id != caller {
        log::warn!("User {caller} may not update card {card_id}");
        return Err(ApiError::Forbidden(
            "user does not have permission to update this card".to_string(),
        ));
    }
    let front = non_empty(req.front);
    let back = non_empty(req.back);
    state
        .db
        .update_card(card_id, front.as_deref(), back.as_deref(), Timestamp::now())?;
    respond(StatusCode::OK, ())
}

pub async fn study_handler(
    State(state): State<ServerState>,
    Caller(caller): Caller,
    payload: Result<Json<StudyCardRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let card_id = req
        .card_id
        .ok_or_else(|| ApiError::BadRequest("cardId is required".to_string()))?;
    let quality = req
        .quality_of_response
        .ok_or_else(|| ApiError::BadRequest("qualityOfResponse is required".to_string()))?;
    let schedule = study_card(&state.db, caller, card_id, quality, Timestamp::now())?;
    respond(StatusCode::OK, StudyCardResponse { card_id, schedule })
}

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
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::extract::rejection::PathRejection;
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;

use crate::db::DeckRow;
use crate::server::auth::Caller;
use crate::server::response::ApiError;
use crate::server::response::ApiResult;
use crate::server::response::Created;
use crate::server::response::non_empty;
use crate::server::response::required;
use crate::server::response::respond;
use crate::server::state::ServerState;
use crate::types::DeckId;
use crate::types::UserId;
use crate::types::timestamp::Timestamp;

#[derive(Deserialize)]
pub struct ListDecksQuery {
    name: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateDeckRequest {
    name: Option<String>,
    description: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateDeckRequest {
    id: Option<DeckId>,
    name: Option<String>,
    description: Option<String>,
}

#[derive(Serialize)]
struct ListDecksResponse {
    decks: Vec<DeckItem>,
}

#[derive(Serialize)]
struct GetDeckResponse {
    deck: DeckItem,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeckItem {
    id: DeckId,
    name: String,
    description: String,
    total_cards: i64,
    cards_left: i64,
}

impl From<DeckRow> for DeckItem {
    fn from(row: DeckRow) -> Self {
        Self {
            id: row.deck_id,
            name: row.name,
            description: row.description,
            total_cards: row.total_cards,
            cards_left: row.cards_left,
        }
    }
}

pub async fn list_decks(
    State(state): State<ServerState>,
    Caller(caller): Caller,
    query: Result<Query<ListDecksQuery>, QueryRejection>,
) -> ApiResult {
    let Query(query) = query?;
    let name = non_empty(query.name);
    let decks = state
        .db
        .list_decks(caller, name.as_deref(), Timestamp::now())?;
    let decks = decks.into_iter().map(DeckItem::from).collect();
    respond(StatusCode::OK, ListDecksResponse { decks })
}

pub async fn get_deck(
    State(state): State<ServerState>,
    Caller(caller): Caller,
    path: Result<Path<DeckId>, PathRejection>,
) -> ApiResult {
    let Path(deck_id) = path?;
    let deck = owned_deck(&state, caller, deck_id, "view")?;
    respond(
        StatusCode::OK,
        GetDeckResponse {
            deck: DeckItem::from(deck),
        },
    )
}

pub async fn create_deck(
    State(state): State<ServerState>,
    Caller(caller): Caller,
    payload: Result<Json<CreateDeckRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let name = required(req.name, "name")?;
    let description = req.description.unwrap_or_default();
    let id = state
        .db
        .insert_deck(caller, &name, &description, Timestamp::now())?;
    log::debug!("User {caller} created deck {id}");
    respond(StatusCode::CREATED, Created { id })
}

pub async fn update_deck(
    State(state): State<ServerState>,
    Caller(caller): Caller,
    payload: Result<Json<UpdateDeckRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let deck_id = req
        .id
        .ok_or_else(|| ApiError::BadRequest("id is required".to_string()))?;
    owned_deck(&state, caller, deck_id, "update")?;
    let name = non_empty(req.name);
    let description = non_empty(req.description);
    state.db.update_deck(
        deck_id,
        name.as_deref(),
        description.as_deref(),
        Timestamp::now(),
    )?;
    respond(StatusCode::OK, ())
}

/// Fetch a deck, checking it belongs to `caller`.
pub fn owned_deck(
    state: &ServerState,
    caller: UserId,
    deck_id: DeckId,
    verb: &str,
) -> Result<DeckRow, ApiError> {
    let deck = state
        .db
        .get_deck(deck_id, Timestamp::now())?
        .ok_or_else(|| ApiError::NotFound("deck not found".to_string()))?;
    if deck.user_id != caller {
        log::warn!("User {caller} may not {verb} deck {deck_id}");
        return Err(ApiError::Forbidden(format!(
            "user does not have permission to {verb} this deck"
        )));
    }
    Ok(deck)
}

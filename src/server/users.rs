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
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::extract::rejection::PathRejection;
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;

use crate::db::UserRow;
use crate::server::auth::Caller;
use crate::server::response::ApiError;
use crate::server::response::ApiResult;
use crate::server::response::Created;
use crate::server::response::required;
use crate::server::response::respond;
use crate::server::state::ServerState;
use crate::types::UserId;
use crate::types::timestamp::Timestamp;

#[derive(Deserialize)]
pub struct CreateUserRequest {
    name: Option<String>,
    email: Option<String>,
}

#[derive(Serialize)]
struct GetUserResponse {
    user: UserItem,
}

#[derive(Serialize)]
struct UserItem {
    id: UserId,
    name: String,
    email: String,
    #[serde(rename = "createdAt")]
    created_at: Timestamp,
}

impl From<UserRow> for UserItem {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.user_id,
            name: row.name,
            email: row.email,
            created_at: row.created_at,
        }
    }
}

pub async fn create_user(
    State(state): State<ServerState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let name = required(req.name, "name")?;
    let email = required(req.email, "email")?;
    match state.db.insert_user(&name, &email, Timestamp::now())? {
        Some(id) => {
            log::info!("Registered user {id}");
            respond(StatusCode::CREATED, Created { id })
        }
        None => Err(ApiError::Conflict("email is already registered".to_string())),
    }
}

pub async fn get_user(
    State(state): State<ServerState>,
    Caller(caller): Caller,
    path: Result<Path<UserId>, PathRejection>,
) -> ApiResult {
    let Path(user_id) = path?;
    if user_id != caller {
        return Err(ApiError::Forbidden(
            "user does not have permission to view this user".to_string(),
        ));
    }
    let user = state
        .db
        .get_user(user_id)?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;
    respond(
        StatusCode::OK,
        GetUserResponse {
            user: UserItem::from(user),
        },
    )
}

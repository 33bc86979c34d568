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

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::server::response::ApiError;
use crate::server::state::ServerState;
use crate::types::UserId;

/// Set by the gateway in front of the server once it has authenticated the
/// request.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated user making the request.
pub struct Caller(pub UserId);

impl FromRequestParts<ServerState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("missing X-User-Id header".to_string()))?;
        let user_id: UserId = header
            .to_str()
            .ok()
            .and_then(|value| value.trim().parse().ok())
            .ok_or_else(|| ApiError::Unauthorized("malformed X-User-Id header".to_string()))?;
        if state.db.get_user(user_id)?.is_none() {
            log::warn!("Request from unknown user {user_id}");
            return Err(ApiError::Unauthorized("unknown user".to_string()));
        }
        Ok(Caller(user_id))
    }
}

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
use axum::extract::rejection::JsonRejection;
use axum::extract::rejection::PathRejection;
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Serialize;

use crate::error::ErrorReport;
use crate::study::StudyError;

/// The envelope every response body is wrapped in.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    code: u16,
    message: String,
    data: T,
}

pub type ApiResult = Result<Response, ApiError>;

pub fn respond<T: Serialize>(status: StatusCode, data: T) -> ApiResult {
    let body = ApiResponse {
        code: status.as_u16(),
        message: "Success".to_string(),
        data,
    };
    Ok((status, Json(body)).into_response())
}

#[derive(Serialize)]
pub struct Created {
    pub id: i64,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(ErrorReport),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(m)
            | ApiError::Unauthorized(m)
            | ApiError::Forbidden(m)
            | ApiError::NotFound(m)
            | ApiError::Conflict(m) => m,
            ApiError::Internal(e) => {
                log::error!("{e}");
                "internal server error".to_string()
            }
        };
        let body = ApiResponse {
            code: status.as_u16(),
            message,
            data: (),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ErrorReport> for ApiError {
    fn from(value: ErrorReport) -> Self {
        ApiError::Internal(value)
    }
}

impl From<StudyError> for ApiError {
    fn from(value: StudyError) -> Self {
        let message = value.to_string();
        match value {
            StudyError::InvalidQuality(_) => ApiError::BadRequest(message),
            StudyError::NotFound(_) => ApiError::NotFound(message),
            StudyError::Forbidden(_) => ApiError::Forbidden(message),
            StudyError::Conflict(_) => ApiError::Conflict(message),
            StudyError::Store(e) => ApiError::Internal(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        ApiError::BadRequest(value.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(value: QueryRejection) -> Self {
        ApiError::BadRequest(value.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(value: PathRejection) -> Self {
        ApiError::BadRequest(value.body_text())
    }
}

/// Reject a missing or empty string field.
pub fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ApiError::BadRequest(format!("{field} is required"))),
    }
}

/// Treat an empty string as absent.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

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

mod auth;
mod cards;
mod decks;
mod response;
mod state;
mod users;

use std::time::Duration;

use axum::Router;
use axum::http::HeaderName;
use axum::http::Method;
use axum::http::header::ACCEPT;
use axum::http::header::AUTHORIZATION;
use axum::http::header::CONTENT_TYPE;
use axum::http::header::LINK;
use axum::routing::get;
use axum::routing::post;
use axum::routing::put;
use tokio::net::TcpListener;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::db::Database;
use crate::error::Fallible;
use crate::server::auth::USER_ID_HEADER;
use crate::server::cards::create_card;
use crate::server::cards::list_cards;
use crate::server::cards::study_handler;
use crate::server::cards::update_card;
use crate::server::decks::create_deck;
use crate::server::decks::get_deck;
use crate::server::decks::list_decks;
use crate::server::decks::update_deck;
use crate::server::response::ApiError;
use crate::server::state::ServerState;
use crate::server::users::create_user;
use crate::server::users::get_user;

pub async fn start_server(config: Config) -> Fallible<()> {
    let db = Database::open(&config.database)?;
    let app = router(ServerState { db });
    let bind = config.address();
    log::debug!("Starting server on {bind}");
    let listener = TcpListener::bind(&bind).await?;
    log::info!("Listening on http://{bind}/v1");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("Server stopped.");
    Ok(())
}

fn router(state: ServerState) -> Router {
    let v1 = Router::new()
        .route("/users", post(create_user))
        .route("/users/{id}", get(get_user))
        .route("/decks", get(list_decks).post(create_deck).put(update_deck))
        .route("/decks/{id}", get(get_deck))
        .route("/cards", get(list_cards).post(create_card).put(update_card))
        .route("/cards/study", put(study_handler));
    Router::new()
        .nest("/v1", v1)
        .fallback(not_found_handler)
        .layer(cors())
        .with_state(state)
}

/// Browser clients may call the API from any origin.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([
            ACCEPT,
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static(USER_ID_HEADER),
        ])
        .expose_headers([LINK])
        .max_age(Duration::from_secs(300))
}

async fn not_found_handler() -> ApiError {
    ApiError::NotFound("not found".to_string())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("Shutting down..."),
        Err(e) => {
            log::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    }
}

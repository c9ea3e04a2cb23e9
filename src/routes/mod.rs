//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The relay exposes the websocket upgrade at `/ws`, the current roster at
//! `/api/users`, and a JSON health probe at `/healthz`. Static client assets
//! are served elsewhere; CORS is configured from the same allow-list that
//! gates the websocket handshake.

pub mod ws;

use axum::extract::State;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AllowedOrigins;
use crate::state::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/ws", get(ws::handle_ws))
        .route("/api/users", get(users))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let allow_origin = match origins {
        AllowedOrigins::Any => AllowOrigin::any(),
        AllowedOrigins::List(list) => AllowOrigin::list(list.iter().filter_map(|o| HeaderValue::from_str(o).ok())),
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
}

/// Current roster in the same `[[id, name], ...]` shape as `userList`.
async fn users(State(state): State<AppState>) -> Json<Vec<(uuid::Uuid, String)>> {
    Json(state.registry.snapshot().await)
}

async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (connections, named) = state.registry.counts().await;
    Json(serde_json::json!({
        "status": "ok",
        "connections": connections,
        "named": named,
    }))
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

//! HTTP API module - REST endpoints and WebSocket

mod websocket;

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::room::RoomRegistry;
pub use websocket::{ClientMessage, ConnectionManager, ServerMessage};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RoomRegistry>,
    pub connections: Arc<ConnectionManager>,
}

/// Build the API router
pub fn router(rooms: Arc<RoomRegistry>) -> Router {
    let state = AppState {
        rooms,
        connections: Arc::new(ConnectionManager::new()),
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .route("/ws", get(websocket::ws_handler))
        .route("/rooms/{room_id}", get(room_snapshot))
        .route("/rooms/{room_id}/advice", get(room_advice))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Root endpoint
async fn root() -> impl IntoResponse {
    Json(RootResponse {
        name: "skirmish",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        rooms: state.rooms.len(),
        connections: state.connections.count().await,
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    rooms: usize,
    connections: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
}

fn error_response(
    status: StatusCode,
    code: &'static str,
    message: String,
) -> axum::response::Response {
    (status, Json(ErrorResponse { code, message })).into_response()
}

/// Current encounter of a room; also nudges its NPC driver
async fn room_snapshot(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> axum::response::Response {
    let Some(room) = state.rooms.get(&room_id) else {
        return error_response(
            StatusCode::NOT_FOUND,
            "room_not_found",
            format!("no room named {}", room_id),
        );
    };
    match room.snapshot().await {
        Ok(Some(encounter)) => Json(encounter).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            "no_active_encounter",
            format!("room {} has no encounter", room_id),
        ),
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, e.code(), e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct AdviceParams {
    #[serde(default = "default_advice_max")]
    max: usize,
}

fn default_advice_max() -> usize {
    4
}

/// Proposed actions for upcoming monster turns
async fn room_advice(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(params): Query<AdviceParams>,
) -> axum::response::Response {
    let Some(room) = state.rooms.get(&room_id) else {
        return error_response(
            StatusCode::NOT_FOUND,
            "room_not_found",
            format!("no room named {}", room_id),
        );
    };
    match room.advise(params.max).await {
        Ok(decisions) => Json(decisions).into_response(),
        Err(e) => error_response(StatusCode::CONFLICT, e.code(), e.to_string()),
    }
}

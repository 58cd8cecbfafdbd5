//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Read-only surface over a running board: the current snapshot as JSON, a
//! per-box drill-down, and a websocket that pushes every new snapshot.

pub mod board;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/board", get(board::get_board))
        .route("/api/board/boxes/{identifier}", get(board::get_box))
        .route("/api/board/ws", get(ws::handle_ws))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

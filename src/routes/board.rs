//! Board REST handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;
use tracing::warn;

use crate::drilldown::OrderDrilldown;
use crate::layout::BoardSnapshot;
use crate::realtime::BoardError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

pub async fn get_board(State(state): State<AppState>) -> Json<BoardSnapshot> {
    Json(state.board.snapshot())
}

pub async fn get_box(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<OrderDrilldown>, (StatusCode, Json<ErrorBody>)> {
    match state.board.drill_down(&identifier, state.details.as_ref()).await {
        Ok(drilldown) => Ok(Json(drilldown)),
        Err(e) => {
            let status = board_error_to_status(&e);
            if status.is_server_error() {
                warn!(%identifier, error = %e, "board: drill-down failed");
            }
            Err((status, Json(ErrorBody { code: e.error_code(), message: e.to_string() })))
        }
    }
}

pub(crate) fn board_error_to_status(err: &BoardError) -> StatusCode {
    match err {
        BoardError::UnknownBox(_) | BoardError::NoActiveOrder(_) => StatusCode::NOT_FOUND,
        BoardError::DetailFetch(_) => StatusCode::BAD_GATEWAY,
        BoardError::Stopped | BoardError::Stale => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[cfg(test)]
#[path = "board_test.rs"]
mod tests;

//! Shared application state for the HTTP surface.
//!
//! DESIGN
//! ======
//! The board is started once in `main` and shared by every handler. Handlers
//! only read snapshots or request drill-downs; all mutation stays on the
//! board's own task.

use std::sync::Arc;

use crate::api::OrderDetailsSource;
use crate::realtime::RealtimeBoard;

#[derive(Clone)]
pub struct AppState {
    pub board: Arc<RealtimeBoard>,
    /// Backs `GET /api/board/boxes/{identifier}`.
    pub details: Arc<dyn OrderDetailsSource>,
}

impl AppState {
    #[must_use]
    pub fn new(board: Arc<RealtimeBoard>, details: Arc<dyn OrderDetailsSource>) -> Self {
        Self { board, details }
    }
}

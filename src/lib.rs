//! Realtime occupancy board for a vehicle-repair workshop.
//!
//! ARCHITECTURE
//! ============
//! ```text
//! frames (STOMP codec)
//!   └─ transport::{StompTransport, MemoryTransport}
//!        └─ session::BoardSession   merge map + subscription registry
//!             └─ realtime::RealtimeBoard   owned task, watch<BoardSnapshot>
//!                  └─ CLI renderer / HTTP + websocket routes
//! ```
//! Bootstrap lists come from the backend REST API ([`api`]); live updates
//! arrive over the transport and replace the stored event for their box.

pub mod api;
pub mod config;
pub mod drilldown;
pub mod layout;
pub mod merge;
pub mod model;
pub mod realtime;
pub mod registry;
pub mod render;
pub mod routes;
pub mod session;
pub mod state;
pub mod transport;

//! Publish/subscribe transport seam.
//!
//! ARCHITECTURE
//! ============
//! The board never talks to a socket directly. It drives a [`Transport`]
//! (connect, subscribe, unsubscribe, disconnect) and consumes a single
//! channel of [`TransportEvent`]s that the transport feeds. Reconnect policy
//! belongs to the transport: after `connect` returns, the transport keeps
//! trying on its own and reports each `Connected` / `Disconnected` edge.
//!
//! Implementations:
//! - [`stomp::StompTransport`]: STOMP 1.2 over WebSocket, the backend's push channel.
//! - [`memory::MemoryTransport`]: in-process broker for embedding and tests.

pub mod memory;
pub mod stomp;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::model::RecordId;

/// Topic carrying every occupancy update.
pub const BROADCAST_TOPIC: &str = "/topic/dashboard";

// =============================================================================
// TYPES
// =============================================================================

/// Topic naming for the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub broadcast: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self { broadcast: BROADCAST_TOPIC.to_owned() }
    }
}

impl Topics {
    /// Per-order topic, `{broadcast}/{order_service_id}`.
    #[must_use]
    pub fn order(&self, order_service_id: &RecordId) -> String {
        format!("{}/{order_service_id}", self.broadcast.trim_end_matches('/'))
    }

    #[must_use]
    pub fn is_broadcast(&self, topic: &str) -> bool {
        topic == self.broadcast
    }
}

/// Live subscription returned by [`Transport::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    /// Transport-assigned subscription id.
    pub id: String,
    pub topic: String,
    /// Connection the subscription was made on. Starts at 1 and grows by one
    /// per established session.
    pub session: u64,
}

/// Everything a transport reports to its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A session is up; earlier subscriptions are gone and must be re-made.
    Connected,
    /// The session dropped. The transport is retrying in the background.
    Disconnected,
    /// A message arrived on `topic`.
    Message { topic: String, body: String },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,
    #[error("transport already started")]
    AlreadyStarted,
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),
    #[error("websocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("stomp codec error: {0}")]
    Codec(#[from] frames::CodecError),
    #[error("broker error: {0}")]
    Broker(String),
    #[error("timed out waiting for the broker")]
    Timeout,
    #[error("connection closed")]
    Closed,
}

impl TransportError {
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotConnected => "E_TRANSPORT_NOT_CONNECTED",
            Self::AlreadyStarted => "E_TRANSPORT_STARTED",
            Self::InvalidUrl(_) => "E_TRANSPORT_URL",
            Self::WebSocket(_) => "E_TRANSPORT_WEBSOCKET",
            Self::Codec(e) => e.error_code(),
            Self::Broker(_) => "E_TRANSPORT_BROKER",
            Self::Timeout => "E_TRANSPORT_TIMEOUT",
            Self::Closed => "E_TRANSPORT_CLOSED",
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(error))
    }
}

// =============================================================================
// TRAIT
// =============================================================================

/// Message-oriented publish/subscribe client.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start the connection lifecycle. Events, including the first
    /// `Connected`, are delivered on `events`.
    ///
    /// Returning `Ok` does not mean a session is up: an unreachable broker is
    /// retried in the background.
    ///
    /// # Errors
    ///
    /// Fails only when the transport cannot start at all (bad endpoint,
    /// already started).
    async fn connect(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), TransportError>;

    /// Whether a session is currently established.
    fn is_connected(&self) -> bool;

    /// Subscribe to `topic`. Messages arrive as [`TransportEvent::Message`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotConnected`] without a live session.
    async fn subscribe(&self, topic: &str) -> Result<SubscriptionHandle, TransportError>;

    /// Cancel a subscription. A handle from an earlier session, or any handle
    /// while disconnected, is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be sent on a live session.
    async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<(), TransportError>;

    /// Close the session and stop reconnecting. Safe to call repeatedly and
    /// before any session was established.
    ///
    /// # Errors
    ///
    /// Returns an error if the background task failed while shutting down.
    async fn disconnect(&self) -> Result<(), TransportError>;
}

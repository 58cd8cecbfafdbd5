//! In-process transport.
//!
//! Behaves like a broker that lives in the same process: subscriptions are
//! recorded, `publish` delivers to matching subscribers, and the connection
//! can be brought up or dropped on demand. Every call is logged so callers
//! can assert on exactly what the board asked for.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{SubscriptionHandle, Transport, TransportError, TransportEvent};

/// A call made against the transport, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect,
    Subscribe(String),
    Unsubscribe(String),
    Disconnect,
}

#[derive(Default)]
struct MemoryState {
    sink: Option<mpsc::Sender<TransportEvent>>,
    connected: bool,
    /// When false, `connect` only records the sink; `go_online` brings the
    /// session up later.
    reachable: bool,
    /// Number of sessions established so far.
    session: u64,
    next_id: u64,
    /// Subscription id -> topic.
    subscriptions: BTreeMap<String, String>,
    calls: Vec<TransportCall>,
}

pub struct MemoryTransport {
    state: Mutex<MemoryState>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Transport whose `connect` succeeds immediately.
    #[must_use]
    pub fn new() -> Self {
        Self { state: Mutex::new(MemoryState { reachable: true, ..MemoryState::default() }) }
    }

    /// Transport whose broker is unreachable until [`Self::go_online`].
    #[must_use]
    pub fn offline() -> Self {
        Self { state: Mutex::new(MemoryState::default()) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bring the session up and announce it.
    pub async fn go_online(&self) {
        let sink = {
            let mut state = self.lock();
            state.reachable = true;
            if state.connected {
                return;
            }
            let Some(sink) = state.sink.clone() else {
                return;
            };
            state.connected = true;
            state.session += 1;
            sink
        };
        let _ = sink.send(TransportEvent::Connected).await;
    }

    /// Drop the session. Subscriptions die with it, as they would on a broker.
    pub async fn drop_connection(&self) {
        let sink = {
            let mut state = self.lock();
            if !state.connected {
                return;
            }
            state.connected = false;
            state.subscriptions.clear();
            state.sink.clone()
        };
        if let Some(sink) = sink {
            let _ = sink.send(TransportEvent::Disconnected).await;
        }
    }

    /// Deliver `body` to every live subscription on `topic`. Returns the
    /// number of deliveries.
    pub async fn publish(&self, topic: &str, body: impl Into<String>) -> usize {
        let (sink, matches) = {
            let state = self.lock();
            if !state.connected {
                return 0;
            }
            let matches = state.subscriptions.values().filter(|t| *t == topic).count();
            (state.sink.clone(), matches)
        };
        let Some(sink) = sink else {
            return 0;
        };

        let body = body.into();
        let mut delivered = 0;
        for _ in 0..matches {
            let event = TransportEvent::Message { topic: topic.to_owned(), body: body.clone() };
            if sink.send(event).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Topics with a live subscription, sorted by subscription id.
    #[must_use]
    pub fn active_topics(&self) -> Vec<String> {
        self.lock().subscriptions.values().cloned().collect()
    }

    /// Number of live subscriptions on `topic`.
    #[must_use]
    pub fn subscriptions_on(&self, topic: &str) -> usize {
        self.lock().subscriptions.values().filter(|t| *t == topic).count()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<TransportCall> {
        self.lock().calls.clone()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), TransportError> {
        let announce = {
            let mut state = self.lock();
            if state.sink.is_some() {
                return Err(TransportError::AlreadyStarted);
            }
            state.calls.push(TransportCall::Connect);
            state.sink = Some(events.clone());
            state.connected = state.reachable;
            if state.connected {
                state.session += 1;
            }
            state.connected
        };
        if announce {
            let _ = events.send(TransportEvent::Connected).await;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    async fn subscribe(&self, topic: &str) -> Result<SubscriptionHandle, TransportError> {
        let mut state = self.lock();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        let id = format!("sub-{}", state.next_id);
        state.next_id += 1;
        state.subscriptions.insert(id.clone(), topic.to_owned());
        state.calls.push(TransportCall::Subscribe(topic.to_owned()));
        Ok(SubscriptionHandle { id, topic: topic.to_owned(), session: state.session })
    }

    async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.calls.push(TransportCall::Unsubscribe(handle.topic.clone()));
        if state.connected && handle.session == state.session {
            state.subscriptions.remove(&handle.id);
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.calls.push(TransportCall::Disconnect);
        state.connected = false;
        state.subscriptions.clear();
        state.sink = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;

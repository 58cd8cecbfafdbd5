//! Board session: the merge map, the subscription registry, and the rules that
//! tie them to a transport.
//!
//! DESIGN
//! ======
//! A session is owned by exactly one task and mutated only through `&mut self`,
//! so applying an event and deriving the next snapshot can never interleave.
//! Every method that talks to the transport is `async` but holds no lock.
//!
//! SUBSCRIPTIONS
//! =============
//! On each `Connected` the session subscribes the broadcast topic, then every
//! order id it knows of: the bootstrap orders first, then whatever the merge
//! map has picked up since.
//!
//! Both connection edges cancel every handle the session holds instead of
//! forgetting it. Events are queued, so by the time a `Disconnected` is handled
//! the transport may already be on its next session, and a message from the
//! old one may have subscribed there. Handles carry the session they were made
//! on; cancelling one from a dead session is a no-op at the transport.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::Bootstrap;
use crate::layout::{BoardSnapshot, LayoutConfig, derive_display};
use crate::merge::{MergeMap, MergeOutcome};
use crate::model::{BoxRecord, OrderEvent, RecordId};
use crate::registry::SubscriptionRegistry;
use crate::transport::{SubscriptionHandle, Topics, Transport, TransportEvent};

pub struct BoardSession {
    transport: Arc<dyn Transport>,
    topics: Topics,
    layout: LayoutConfig,
    boxes: Vec<BoxRecord>,
    initial_orders: Vec<OrderEvent>,
    merge: MergeMap,
    registry: SubscriptionRegistry,
    broadcast: Option<SubscriptionHandle>,
    connected: bool,
}

impl BoardSession {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, topics: Topics, layout: LayoutConfig, bootstrap: Bootstrap) -> Self {
        let merge = MergeMap::from_orders(&bootstrap.orders);
        Self {
            transport,
            topics,
            layout,
            boxes: bootstrap.boxes,
            initial_orders: bootstrap.orders,
            merge,
            registry: SubscriptionRegistry::new(),
            broadcast: None,
            connected: false,
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    #[must_use]
    pub fn merge(&self) -> &MergeMap {
        &self.merge
    }

    #[must_use]
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    #[must_use]
    pub fn snapshot(&self) -> BoardSnapshot {
        derive_display(&self.boxes, &self.merge, self.layout, self.connected)
    }

    pub fn apply_event(&mut self, event: OrderEvent) -> MergeOutcome {
        let outcome = self.merge.apply(event);
        if outcome == MergeOutcome::Ignored {
            debug!("board: event without box key ignored");
        }
        outcome
    }

    /// Subscribe the per-order topic for `order_service_id` unless the id is
    /// blank, already subscribed, or there is no live session on either side.
    /// Returns whether a new subscription was made.
    pub async fn ensure_subscribed(&mut self, order_service_id: Option<&RecordId>) -> bool {
        let Some(id) = order_service_id.filter(|id| !id.is_blank()) else {
            return false;
        };
        if self.registry.contains(id) || !self.connected || !self.transport.is_connected() {
            return false;
        }

        let topic = self.topics.order(id);
        match self.transport.subscribe(&topic).await {
            Ok(handle) => {
                info!(%topic, "board: subscribed");
                self.registry.insert(id, handle);
                true
            }
            Err(e) => {
                warn!(%topic, error = %e, "board: subscribe failed");
                false
            }
        }
    }

    /// Route one transport event. Returns whether the snapshot may have changed.
    pub async fn handle_event(&mut self, event: TransportEvent) -> bool {
        match event {
            TransportEvent::Connected => {
                self.on_connected().await;
                true
            }
            TransportEvent::Disconnected => {
                self.on_disconnected().await;
                true
            }
            TransportEvent::Message { topic, body } => self.handle_message(&topic, &body).await,
        }
    }

    /// Decode and apply a pushed message. Broadcast messages also pull in the
    /// order's own topic. Undecodable payloads are dropped before any change.
    pub async fn handle_message(&mut self, topic: &str, body: &str) -> bool {
        let event = match OrderEvent::decode(body) {
            Ok(event) => event,
            Err(e) => {
                warn!(%topic, error = %e, "board: dropping undecodable message");
                return false;
            }
        };

        let order_service_id = event.subscribable_order_id().cloned();
        let outcome = self.apply_event(event);
        if self.topics.is_broadcast(topic) {
            self.ensure_subscribed(order_service_id.as_ref()).await;
        }
        outcome != MergeOutcome::Ignored
    }

    pub async fn on_connected(&mut self) {
        self.unsubscribe_all().await;
        self.connected = true;
        info!("board: live");
        self.subscribe_all().await;
    }

    pub async fn on_disconnected(&mut self) {
        self.connected = false;
        self.unsubscribe_all().await;
        info!("board: connection lost, serving last known state");
    }

    /// Unsubscribe everything and close the transport. Safe to repeat.
    pub async fn teardown(&mut self) {
        self.unsubscribe_all().await;
        if let Err(e) = self.transport.disconnect().await {
            warn!(error = %e, "board: transport disconnect failed");
        }
        self.connected = false;
    }

    /// Swap in new bootstrap lists. Subscriptions are rebuilt from scratch when
    /// a session is live.
    pub async fn reset(&mut self, bootstrap: Bootstrap) {
        self.unsubscribe_all().await;
        self.merge = MergeMap::from_orders(&bootstrap.orders);
        self.boxes = bootstrap.boxes;
        self.initial_orders = bootstrap.orders;
        info!(boxes = self.boxes.len(), orders = self.initial_orders.len(), "board: reset");
        if self.connected && self.transport.is_connected() {
            self.subscribe_all().await;
        }
    }

    async fn subscribe_all(&mut self) {
        if self.broadcast.is_none() && self.transport.is_connected() {
            match self.transport.subscribe(&self.topics.broadcast).await {
                Ok(handle) => {
                    info!(topic = %handle.topic, "board: subscribed");
                    self.broadcast = Some(handle);
                }
                Err(e) => warn!(topic = %self.topics.broadcast, error = %e, "board: subscribe failed"),
            }
        }

        let ids: Vec<RecordId> = self
            .initial_orders
            .iter()
            .chain(self.merge.values())
            .filter_map(OrderEvent::subscribable_order_id)
            .cloned()
            .collect();
        for id in ids {
            self.ensure_subscribed(Some(&id)).await;
        }
    }

    async fn unsubscribe_all(&mut self) {
        let handles = self.broadcast.take().into_iter().chain(self.registry.drain());
        for handle in handles {
            if let Err(e) = self.transport.unsubscribe(&handle).await {
                warn!(topic = %handle.topic, error = %e, "board: unsubscribe failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

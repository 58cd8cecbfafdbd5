//! Order-service id -> live per-order subscription.
//!
//! At most one handle per id. Ids are compared by their wire text, so a
//! numeric `17` and a string `"17"` share a slot, the same way they share a
//! topic.

use std::collections::HashMap;

use crate::model::RecordId;
use crate::transport::SubscriptionHandle;

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    handles: HashMap<String, SubscriptionHandle>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, order_service_id: &RecordId) -> bool {
        self.handles.contains_key(&order_service_id.to_string())
    }

    /// Store `handle` for `order_service_id`, returning any handle it displaced.
    pub fn insert(&mut self, order_service_id: &RecordId, handle: SubscriptionHandle) -> Option<SubscriptionHandle> {
        self.handles.insert(order_service_id.to_string(), handle)
    }

    #[must_use]
    pub fn get(&self, order_service_id: &RecordId) -> Option<&SubscriptionHandle> {
        self.handles.get(&order_service_id.to_string())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Registered ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.handles.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Remove and return every handle.
    pub fn drain(&mut self) -> Vec<SubscriptionHandle> {
        self.handles.drain().map(|(_, handle)| handle).collect()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;

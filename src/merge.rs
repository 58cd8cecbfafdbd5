//! Latest-event-per-box store.
//!
//! DESIGN
//! ======
//! Keyed by the event's box identifier. An incoming event replaces the stored
//! one wholesale: a field the producer leaves out is gone afterwards. This is
//! what stops a pause reason or alert flag from one occupancy surviving into
//! the next state of the same box.

use std::collections::HashMap;

use crate::model::OrderEvent;

/// What [`MergeMap::apply`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Replaced,
    /// The event had no usable box key and was dropped.
    Ignored,
}

#[derive(Debug, Clone, Default)]
pub struct MergeMap {
    entries: HashMap<String, OrderEvent>,
}

impl MergeMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from bootstrap orders, applied in list order.
    #[must_use]
    pub fn from_orders(orders: &[OrderEvent]) -> Self {
        let mut map = Self::new();
        for order in orders {
            map.apply(order.clone());
        }
        map
    }

    /// Insert or fully replace the entry for the event's box.
    pub fn apply(&mut self, event: OrderEvent) -> MergeOutcome {
        let Some(key) = event.merge_key().map(str::to_owned) else {
            return MergeOutcome::Ignored;
        };
        match self.entries.insert(key, event) {
            Some(_) => MergeOutcome::Replaced,
            None => MergeOutcome::Inserted,
        }
    }

    #[must_use]
    pub fn get(&self, box_identifier: &str) -> Option<&OrderEvent> {
        self.entries.get(box_identifier)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &OrderEvent> {
        self.entries.values()
    }
}

#[cfg(test)]
#[path = "merge_test.rs"]
mod tests;

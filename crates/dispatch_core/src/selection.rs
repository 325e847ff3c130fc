use std::collections::{BTreeSet, HashSet};

use shared::domain::{Order, OrderId, Trip, TripId};

/// Pending orders picked for dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderSelection {
    ids: BTreeSet<OrderId>,
}

impl OrderSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&mut self, order_id: OrderId) {
        if !self.ids.remove(&order_id) {
            self.ids.insert(order_id);
        }
    }

    pub fn select_all(&mut self, order_ids: impl IntoIterator<Item = OrderId>) {
        self.ids = order_ids.into_iter().collect();
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn is_selected(&self, order_id: OrderId) -> bool {
        self.ids.contains(&order_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Selected IDs in ascending order.
    pub fn ids(&self) -> Vec<OrderId> {
        self.ids.iter().copied().collect()
    }

    /// Drops every ID that is no longer a displayed pending order.
    pub fn retain_pending(&mut self, orders: &[Order]) {
        let pending: HashSet<OrderId> = orders
            .iter()
            .filter(|order| order.is_pending())
            .map(|order| order.id)
            .collect();
        self.ids.retain(|id| pending.contains(id));
    }
}

/// Proposed trips chosen for confirmation. Always a subset of the proposal
/// it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripSelection {
    proposed: Vec<TripId>,
    selected: HashSet<TripId>,
}

impl TripSelection {
    /// Every proposed trip starts selected.
    pub fn all_of(trips: &[Trip]) -> Self {
        let mut proposed = Vec::with_capacity(trips.len());
        for trip in trips {
            if !proposed.contains(&trip.id) {
                proposed.push(trip.id);
            }
        }
        let selected = proposed.iter().copied().collect();
        Self { proposed, selected }
    }

    /// Returns false when `trip_id` is not part of the proposal.
    pub fn toggle(&mut self, trip_id: TripId) -> bool {
        if !self.proposed.contains(&trip_id) {
            return false;
        }
        if !self.selected.remove(&trip_id) {
            self.selected.insert(trip_id);
        }
        true
    }

    pub fn set_all(&mut self, selected: bool) {
        self.selected = if selected {
            self.proposed.iter().copied().collect()
        } else {
            HashSet::new()
        };
    }

    pub fn is_selected(&self, trip_id: TripId) -> bool {
        self.selected.contains(&trip_id)
    }

    /// State of the "select all" checkbox.
    pub fn all_selected(&self) -> bool {
        self.selected.len() == self.proposed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn proposed_count(&self) -> usize {
        self.proposed.len()
    }

    /// Selected IDs in proposal order.
    pub fn selected_ids(&self) -> Vec<TripId> {
        self.proposed
            .iter()
            .copied()
            .filter(|id| self.selected.contains(id))
            .collect()
    }
}

//! Dispatch session state machine.
//!
//! `Idle -> Proposing -> Reviewing -> Confirming -> Confirmed`, with
//! `Proposing -> Idle` on failure or an empty proposal, `Reviewing -> Idle`
//! on reject and `Confirming -> Reviewing` on a failed confirmation.
//!
//! Network calls are split into a `begin_*` step that validates and returns a
//! ticket, and a `finish_*` step that applies the response. A ticket issued
//! before [`DispatchState::reset`] is stale and its response is dropped.

use shared::domain::{Order, OrderId, Trip, TripId};
use tracing::{debug, info, warn};

use crate::{
    error::{ActionRefused, ClientError},
    selection::{OrderSelection, TripSelection},
};

pub const NO_TRIPS_MESSAGE: &str = "No trips could be proposed for the selected orders.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPhase {
    Idle,
    Proposing,
    Reviewing,
    Confirming,
    Confirmed,
}

impl DispatchPhase {
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Proposing | Self::Confirming)
    }
}

#[derive(Debug, Clone)]
pub struct Proposal {
    trips: Vec<Trip>,
    selection: TripSelection,
}

impl Proposal {
    fn new(trips: Vec<Trip>) -> Self {
        let selection = TripSelection::all_of(&trips);
        Self { trips, selection }
    }

    pub fn trips(&self) -> &[Trip] {
        &self.trips
    }

    pub fn selection(&self) -> &TripSelection {
        &self.selection
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalTicket {
    epoch: u64,
    pub order_ids: Vec<OrderId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmTicket {
    epoch: u64,
    pub trip_ids: Vec<TripId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    epoch: u64,
    seq: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProposalOutcome {
    Reviewing { trip_count: usize },
    NoTrips,
    Failed(String),
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    Confirmed { trips: Vec<Trip> },
    Failed(String),
    Stale,
}

#[derive(Debug, Clone)]
pub struct DispatchState {
    phase: DispatchPhase,
    orders: Vec<Order>,
    selection: OrderSelection,
    proposal: Option<Proposal>,
    confirmed: Vec<Trip>,
    error: Option<String>,
    epoch: u64,
    refresh_issued: u64,
    /// Highest refresh sequence that was applied or superseded.
    refresh_applied: u64,
}

impl Default for DispatchState {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchState {
    pub fn new() -> Self {
        Self {
            phase: DispatchPhase::Idle,
            orders: Vec::new(),
            selection: OrderSelection::new(),
            proposal: None,
            confirmed: Vec::new(),
            error: None,
            epoch: 0,
            refresh_issued: 0,
            refresh_applied: 0,
        }
    }

    pub fn phase(&self) -> DispatchPhase {
        self.phase
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn selection(&self) -> &OrderSelection {
        &self.selection
    }

    pub fn proposal(&self) -> Option<&Proposal> {
        self.proposal.as_ref()
    }

    pub fn confirmed_trips(&self) -> &[Trip] {
        &self.confirmed
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn can_propose(&self) -> bool {
        !self.phase.is_in_flight() && !self.selection.is_empty()
    }

    pub fn can_confirm(&self) -> bool {
        self.phase == DispatchPhase::Reviewing
            && self
                .proposal
                .as_ref()
                .is_some_and(|proposal| !proposal.selection.is_empty())
    }

    /// Replaces the displayed orders and prunes the selection to what is
    /// still pending.
    pub fn set_orders(&mut self, orders: Vec<Order>) {
        self.orders = orders;
        self.selection.retain_pending(&self.orders);
    }

    fn is_displayed_pending(&self, order_id: OrderId) -> bool {
        self.orders
            .iter()
            .any(|order| order.id == order_id && order.is_pending())
    }

    /// Returns false when the order is not a displayed pending order or a
    /// proposal/confirmation is in flight.
    pub fn toggle_order(&mut self, order_id: OrderId) -> bool {
        if self.phase.is_in_flight() || !self.is_displayed_pending(order_id) {
            return false;
        }
        self.selection.toggle(order_id);
        true
    }

    /// Returns false while a proposal/confirmation is in flight.
    pub fn select_all_orders(&mut self) -> bool {
        if self.phase.is_in_flight() {
            return false;
        }
        let pending = self
            .orders
            .iter()
            .filter(|order| order.is_pending())
            .map(|order| order.id);
        self.selection.select_all(pending);
        true
    }

    /// Returns false while a proposal/confirmation is in flight.
    pub fn clear_selection(&mut self) -> bool {
        if self.phase.is_in_flight() {
            return false;
        }
        self.selection.clear();
        true
    }

    pub fn begin_refresh(&mut self) -> RefreshTicket {
        self.refresh_issued += 1;
        RefreshTicket {
            epoch: self.epoch,
            seq: self.refresh_issued,
        }
    }

    /// Applies a refetched order list. A failure keeps the current list and
    /// records the message.
    pub fn finish_refresh(
        &mut self,
        ticket: RefreshTicket,
        result: Result<Vec<Order>, ClientError>,
    ) -> Option<Result<usize, String>> {
        if ticket.epoch != self.epoch || ticket.seq <= self.refresh_applied {
            debug!(
                ticket_epoch = ticket.epoch,
                epoch = self.epoch,
                ticket_seq = ticket.seq,
                applied_seq = self.refresh_applied,
                "dispatch: stale order list dropped"
            );
            return None;
        }

        match result {
            Ok(orders) => {
                let count = orders.len();
                self.refresh_applied = ticket.seq;
                self.set_orders(orders);
                Some(Ok(count))
            }
            Err(err) => {
                warn!(error = %err, "dispatch: order refresh failed");
                let message = err.user_message();
                self.error = Some(message.clone());
                Some(Err(message))
            }
        }
    }

    pub fn begin_proposal(&mut self) -> Result<ProposalTicket, ActionRefused> {
        if self.phase.is_in_flight() {
            return Err(ActionRefused::RequestInFlight);
        }
        if self.selection.is_empty() {
            return Err(ActionRefused::EmptySelection);
        }

        self.proposal = None;
        self.confirmed.clear();
        self.error = None;
        self.phase = DispatchPhase::Proposing;

        Ok(ProposalTicket {
            epoch: self.epoch,
            order_ids: self.selection.ids(),
        })
    }

    pub fn finish_proposal(
        &mut self,
        ticket: ProposalTicket,
        result: Result<Vec<Trip>, ClientError>,
    ) -> ProposalOutcome {
        if ticket.epoch != self.epoch || self.phase != DispatchPhase::Proposing {
            debug!(
                ticket_epoch = ticket.epoch,
                epoch = self.epoch,
                "dispatch: stale proposal dropped"
            );
            return ProposalOutcome::Stale;
        }

        match result {
            Ok(trips) if trips.is_empty() => {
                info!(
                    orders = ticket.order_ids.len(),
                    "dispatch: proposal returned no trips"
                );
                self.phase = DispatchPhase::Idle;
                self.error = Some(NO_TRIPS_MESSAGE.to_string());
                ProposalOutcome::NoTrips
            }
            Ok(trips) => {
                let trip_count = trips.len();
                info!(
                    orders = ticket.order_ids.len(),
                    trip_count,
                    "dispatch: proposal received"
                );
                self.proposal = Some(Proposal::new(trips));
                self.phase = DispatchPhase::Reviewing;
                ProposalOutcome::Reviewing { trip_count }
            }
            Err(err) => {
                warn!(error = %err, "dispatch: proposal failed");
                let message = err.user_message();
                self.phase = DispatchPhase::Idle;
                self.error = Some(message.clone());
                ProposalOutcome::Failed(message)
            }
        }
    }

    fn reviewing_mut(&mut self) -> Result<&mut Proposal, ActionRefused> {
        match (self.phase, self.proposal.as_mut()) {
            (DispatchPhase::Reviewing, Some(proposal)) => Ok(proposal),
            (DispatchPhase::Confirming, _) => Err(ActionRefused::RequestInFlight),
            _ => Err(ActionRefused::NotReviewing),
        }
    }

    /// Returns `Ok(false)` when the trip is not part of the proposal.
    pub fn toggle_trip(&mut self, trip_id: TripId) -> Result<bool, ActionRefused> {
        Ok(self.reviewing_mut()?.selection.toggle(trip_id))
    }

    pub fn set_all_trips(&mut self, selected: bool) -> Result<(), ActionRefused> {
        self.reviewing_mut()?.selection.set_all(selected);
        Ok(())
    }

    /// Discards the proposal without contacting the backend. The order
    /// selection is kept so the user can adjust it and propose again.
    pub fn reject(&mut self) -> Result<(), ActionRefused> {
        self.reviewing_mut()?;
        self.proposal = None;
        self.error = None;
        self.phase = DispatchPhase::Idle;
        info!("dispatch: proposal rejected");
        Ok(())
    }

    pub fn begin_confirm(&mut self) -> Result<ConfirmTicket, ActionRefused> {
        let trip_ids = self.reviewing_mut()?.selection.selected_ids();
        if trip_ids.is_empty() {
            return Err(ActionRefused::NothingToConfirm);
        }

        self.error = None;
        self.phase = DispatchPhase::Confirming;
        Ok(ConfirmTicket {
            epoch: self.epoch,
            trip_ids,
        })
    }

    pub fn finish_confirm(
        &mut self,
        ticket: ConfirmTicket,
        result: Result<Vec<Trip>, ClientError>,
    ) -> ConfirmOutcome {
        if ticket.epoch != self.epoch || self.phase != DispatchPhase::Confirming {
            debug!(
                ticket_epoch = ticket.epoch,
                epoch = self.epoch,
                "dispatch: stale confirmation dropped"
            );
            return ConfirmOutcome::Stale;
        }

        match result {
            Ok(trips) => {
                info!(
                    requested = ticket.trip_ids.len(),
                    confirmed = trips.len(),
                    "dispatch: trips confirmed"
                );
                self.confirmed = trips.clone();
                // Lists fetched before the confirmation still show its orders as pending.
                self.refresh_applied = self.refresh_issued;
                self.proposal = None;
                self.selection.clear();
                self.phase = DispatchPhase::Confirmed;
                ConfirmOutcome::Confirmed { trips }
            }
            Err(err) => {
                warn!(error = %err, "dispatch: confirmation failed");
                let message = err.user_message();
                self.phase = DispatchPhase::Reviewing;
                self.error = Some(message.clone());
                ConfirmOutcome::Failed(message)
            }
        }
    }

    /// Leaves the thank-you state and returns to the order list.
    pub fn dismiss(&mut self) -> Result<(), ActionRefused> {
        if self.phase != DispatchPhase::Confirmed {
            return Err(ActionRefused::NotConfirmed);
        }
        self.confirmed.clear();
        self.error = None;
        self.phase = DispatchPhase::Idle;
        Ok(())
    }

    /// Ends the session, as when the user navigates away. Responses to
    /// requests issued before the reset are dropped.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.phase = DispatchPhase::Idle;
        self.orders.clear();
        self.selection.clear();
        self.proposal = None;
        self.confirmed.clear();
        self.error = None;
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;

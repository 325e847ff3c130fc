use shared::domain::{Order, Trip};

use crate::state::{DispatchPhase, DispatchState};

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRow {
    pub order: Order,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TripRow {
    pub trip: Trip,
    pub checked: bool,
}

/// Everything the dispatch screens render, taken in one consistent read.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchView {
    pub phase: DispatchPhase,
    pub orders: Vec<OrderRow>,
    pub can_propose: bool,
    pub proposal: Vec<TripRow>,
    pub select_all_checked: bool,
    pub can_confirm: bool,
    pub confirmed: Vec<Trip>,
    pub error: Option<String>,
}

impl DispatchView {
    pub fn from_state(state: &DispatchState) -> Self {
        let selection = state.selection();
        let orders = state
            .orders()
            .iter()
            .map(|order| OrderRow {
                order: order.clone(),
                selected: selection.is_selected(order.id),
            })
            .collect();

        let (proposal, select_all_checked) = match state.proposal() {
            Some(proposal) => {
                let rows = proposal
                    .trips()
                    .iter()
                    .map(|trip| TripRow {
                        trip: trip.clone(),
                        checked: proposal.selection().is_selected(trip.id),
                    })
                    .collect();
                (rows, proposal.selection().all_selected())
            }
            None => (Vec::new(), false),
        };

        Self {
            phase: state.phase(),
            orders,
            can_propose: state.can_propose(),
            proposal,
            select_all_checked,
            can_confirm: state.can_confirm(),
            confirmed: state.confirmed_trips().to_vec(),
            error: state.error().map(str::to_string),
        }
    }

    pub fn selected_order_count(&self) -> usize {
        self.orders.iter().filter(|row| row.selected).count()
    }
}

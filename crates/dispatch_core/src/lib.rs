//! Client-side core of the dispatch workflow: REST access to the logistics
//! backend, order/trip selection bookkeeping and the proposal/confirmation
//! state machine that drives the dispatch screens.

use async_trait::async_trait;
use shared::domain::{Order, OrderId, Trip, TripId};

pub mod controller;
pub mod error;
pub mod rest;
pub mod selection;
pub mod state;
pub mod view;

pub use controller::{DispatchController, DispatchEvent, RefreshOutcome};
pub use error::{ActionRefused, ClientError};
pub use rest::{Directory, RestClient};
pub use selection::{OrderSelection, TripSelection};
pub use state::{ConfirmOutcome, DispatchPhase, DispatchState, ProposalOutcome};
pub use view::DispatchView;

/// The three backend calls the dispatch workflow depends on.
#[async_trait]
pub trait DispatchBackend: Send + Sync {
    async fn pending_orders(&self) -> Result<Vec<Order>, ClientError>;
    async fn propose_trips(&self, order_ids: &[OrderId]) -> Result<Vec<Trip>, ClientError>;
    async fn confirm_trips(&self, trip_ids: &[TripId]) -> Result<Vec<Trip>, ClientError>;
}

pub struct MissingDispatchBackend;

#[async_trait]
impl DispatchBackend for MissingDispatchBackend {
    async fn pending_orders(&self) -> Result<Vec<Order>, ClientError> {
        Err(ClientError::Transport("dispatch backend is unavailable".into()))
    }

    async fn propose_trips(&self, _order_ids: &[OrderId]) -> Result<Vec<Trip>, ClientError> {
        Err(ClientError::Transport("dispatch backend is unavailable".into()))
    }

    async fn confirm_trips(&self, _trip_ids: &[TripId]) -> Result<Vec<Trip>, ClientError> {
        Err(ClientError::Transport("dispatch backend is unavailable".into()))
    }
}

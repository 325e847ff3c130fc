use std::{future::Future, sync::Arc, time::Duration};

use shared::domain::{OrderId, Trip, TripId};
use tokio::sync::{broadcast, Mutex};
use tracing::warn;

use crate::{
    error::{ActionRefused, ClientError},
    rest::DEFAULT_REQUEST_TIMEOUT,
    state::{ConfirmOutcome, DispatchPhase, DispatchState, ProposalOutcome},
    view::DispatchView,
    DispatchBackend,
};

#[derive(Debug, Clone)]
pub enum DispatchEvent {
    PhaseChanged(DispatchPhase),
    OrdersRefreshed { count: usize },
    ProposalReceived { trip_count: usize },
    TripsConfirmed { trips: Vec<Trip> },
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed { count: usize },
    Failed(String),
    Stale,
}

/// Drives one dispatch session against a backend. The state lock is never
/// held while a request is awaited, so the session stays responsive to
/// selection changes during a proposal or confirmation.
pub struct DispatchController {
    backend: Arc<dyn DispatchBackend>,
    state: Mutex<DispatchState>,
    request_timeout: Duration,
    events: broadcast::Sender<DispatchEvent>,
}

impl DispatchController {
    pub fn new(backend: Arc<dyn DispatchBackend>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            backend,
            state: Mutex::new(DispatchState::new()),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            events,
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> DispatchView {
        DispatchView::from_state(&*self.state.lock().await)
    }

    fn emit(&self, event: DispatchEvent) {
        let _ = self.events.send(event);
    }

    async fn call<T>(
        &self,
        request: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, ClientError> {
        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "dispatch: request timed out"
                );
                Err(ClientError::Timeout)
            }
        }
    }

    pub async fn refresh_orders(&self) -> RefreshOutcome {
        let ticket = self.state.lock().await.begin_refresh();
        let result = self.call(self.backend.pending_orders()).await;

        let applied = self.state.lock().await.finish_refresh(ticket, result);
        match applied {
            Some(Ok(count)) => {
                self.emit(DispatchEvent::OrdersRefreshed { count });
                RefreshOutcome::Refreshed { count }
            }
            Some(Err(message)) => {
                self.emit(DispatchEvent::Error(message.clone()));
                RefreshOutcome::Failed(message)
            }
            None => RefreshOutcome::Stale,
        }
    }

    pub async fn toggle_order(&self, order_id: OrderId) -> bool {
        self.state.lock().await.toggle_order(order_id)
    }

    pub async fn select_all_orders(&self) -> bool {
        self.state.lock().await.select_all_orders()
    }

    pub async fn clear_selection(&self) -> bool {
        self.state.lock().await.clear_selection()
    }

    pub async fn propose(&self) -> Result<ProposalOutcome, ActionRefused> {
        let ticket = self.state.lock().await.begin_proposal()?;
        self.emit(DispatchEvent::PhaseChanged(DispatchPhase::Proposing));

        let result = self.call(self.backend.propose_trips(&ticket.order_ids)).await;

        let (outcome, phase) = {
            let mut state = self.state.lock().await;
            let outcome = state.finish_proposal(ticket, result);
            (outcome, state.phase())
        };

        match &outcome {
            ProposalOutcome::Reviewing { trip_count } => {
                self.emit(DispatchEvent::ProposalReceived {
                    trip_count: *trip_count,
                });
                self.emit(DispatchEvent::PhaseChanged(phase));
            }
            ProposalOutcome::NoTrips => {
                self.emit(DispatchEvent::Error(
                    crate::state::NO_TRIPS_MESSAGE.to_string(),
                ));
                self.emit(DispatchEvent::PhaseChanged(phase));
            }
            ProposalOutcome::Failed(message) => {
                self.emit(DispatchEvent::Error(message.clone()));
                self.emit(DispatchEvent::PhaseChanged(phase));
            }
            ProposalOutcome::Stale => {}
        }

        Ok(outcome)
    }

    pub async fn toggle_trip(&self, trip_id: TripId) -> Result<bool, ActionRefused> {
        self.state.lock().await.toggle_trip(trip_id)
    }

    pub async fn set_all_trips(&self, selected: bool) -> Result<(), ActionRefused> {
        self.state.lock().await.set_all_trips(selected)
    }

    pub async fn reject(&self) -> Result<(), ActionRefused> {
        self.state.lock().await.reject()?;
        self.emit(DispatchEvent::PhaseChanged(DispatchPhase::Idle));
        Ok(())
    }

    /// Confirms the selected trips. On success the order list is refetched
    /// so dispatched orders drop out of the pending grid.
    pub async fn confirm(&self) -> Result<ConfirmOutcome, ActionRefused> {
        let ticket = self.state.lock().await.begin_confirm()?;
        self.emit(DispatchEvent::PhaseChanged(DispatchPhase::Confirming));

        let result = self.call(self.backend.confirm_trips(&ticket.trip_ids)).await;

        let outcome = self.state.lock().await.finish_confirm(ticket, result);
        match &outcome {
            ConfirmOutcome::Confirmed { trips } => {
                self.emit(DispatchEvent::TripsConfirmed {
                    trips: trips.clone(),
                });
                self.emit(DispatchEvent::PhaseChanged(DispatchPhase::Confirmed));
                self.refresh_orders().await;
            }
            ConfirmOutcome::Failed(message) => {
                self.emit(DispatchEvent::Error(message.clone()));
                self.emit(DispatchEvent::PhaseChanged(DispatchPhase::Reviewing));
            }
            ConfirmOutcome::Stale => {}
        }

        Ok(outcome)
    }

    pub async fn dismiss(&self) -> Result<(), ActionRefused> {
        self.state.lock().await.dismiss()?;
        self.emit(DispatchEvent::PhaseChanged(DispatchPhase::Idle));
        Ok(())
    }

    pub async fn reset(&self) {
        self.state.lock().await.reset();
        self.emit(DispatchEvent::PhaseChanged(DispatchPhase::Idle));
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;

use super::*;
use async_trait::async_trait;
use shared::domain::{Order, OrderStatus, TripOrder};
use tokio::sync::Notify;

use crate::MissingDispatchBackend;

fn order(id: i64) -> Order {
    Order {
        id: OrderId(id),
        status: OrderStatus::Pending,
        customer_id: None,
        pickup_location_id: None,
        delivery_location_id: None,
        weight: 5.0,
        items: Vec::new(),
        created_at: None,
    }
}

fn trip(id: i64, orders: &[i64]) -> Trip {
    Trip {
        id: TripId(id),
        vehicle: None,
        orders: orders
            .iter()
            .map(|order_id| TripOrder {
                id: OrderId(*order_id),
                status: None,
                weight: None,
            })
            .collect(),
        total_distance: None,
        estimated_duration: None,
        status: None,
    }
}

/// In-process backend: serves a pending list, answers proposals from a
/// script and flips confirmed orders out of the pending list.
struct ScriptedBackend {
    orders: Mutex<Vec<Order>>,
    proposal: Vec<Trip>,
    propose_error: Option<ClientError>,
    confirm_error: Option<ClientError>,
    propose_gate: Option<Arc<Notify>>,
    propose_delay: Option<Duration>,
    /// Holds the n-th `pending_orders` call (1-based) until notified. The
    /// list is read before waiting, like a response already on the wire.
    orders_gate: Option<(usize, Arc<Notify>)>,
    /// Fails every `pending_orders` call from the n-th on.
    orders_fail_from: Option<usize>,
    orders_calls: Mutex<usize>,
    propose_calls: Mutex<Vec<Vec<OrderId>>>,
    confirm_calls: Mutex<Vec<Vec<TripId>>>,
}

impl ScriptedBackend {
    fn new(orders: Vec<Order>, proposal: Vec<Trip>) -> Self {
        Self {
            orders: Mutex::new(orders),
            proposal,
            propose_error: None,
            confirm_error: None,
            propose_gate: None,
            propose_delay: None,
            orders_gate: None,
            orders_fail_from: None,
            orders_calls: Mutex::new(0),
            propose_calls: Mutex::new(Vec::new()),
            confirm_calls: Mutex::new(Vec::new()),
        }
    }

    fn with_propose_gate(mut self, gate: Arc<Notify>) -> Self {
        self.propose_gate = Some(gate);
        self
    }

    fn with_propose_delay(mut self, delay: Duration) -> Self {
        self.propose_delay = Some(delay);
        self
    }

    fn with_confirm_error(mut self, err: ClientError) -> Self {
        self.confirm_error = Some(err);
        self
    }

    fn with_orders_gate(mut self, call: usize, gate: Arc<Notify>) -> Self {
        self.orders_gate = Some((call, gate));
        self
    }

    fn with_orders_failing_from(mut self, call: usize) -> Self {
        self.orders_fail_from = Some(call);
        self
    }
}

#[async_trait]
impl DispatchBackend for ScriptedBackend {
    async fn pending_orders(&self) -> Result<Vec<Order>, ClientError> {
        let call = {
            let mut calls = self.orders_calls.lock().await;
            *calls += 1;
            *calls
        };
        if self.orders_fail_from.is_some_and(|from| call >= from) {
            return Err(ClientError::Transport("connection reset".into()));
        }

        let orders = self.orders.lock().await.clone();
        if let Some((held, gate)) = &self.orders_gate {
            if *held == call {
                gate.notified().await;
            }
        }
        Ok(orders)
    }

    async fn propose_trips(&self, order_ids: &[OrderId]) -> Result<Vec<Trip>, ClientError> {
        self.propose_calls.lock().await.push(order_ids.to_vec());
        if let Some(gate) = &self.propose_gate {
            gate.notified().await;
        }
        if let Some(delay) = self.propose_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.propose_error {
            return Err(err.clone());
        }
        Ok(self.proposal.clone())
    }

    async fn confirm_trips(&self, trip_ids: &[TripId]) -> Result<Vec<Trip>, ClientError> {
        self.confirm_calls.lock().await.push(trip_ids.to_vec());
        if let Some(err) = &self.confirm_error {
            return Err(err.clone());
        }

        let confirmed: Vec<Trip> = self
            .proposal
            .iter()
            .filter(|trip| trip_ids.contains(&trip.id))
            .cloned()
            .collect();
        let dispatched: Vec<OrderId> = confirmed.iter().flat_map(|trip| trip.order_ids()).collect();
        self.orders
            .lock()
            .await
            .retain(|order| !dispatched.contains(&order.id));
        Ok(confirmed)
    }
}

async fn controller_with(
    backend: Arc<ScriptedBackend>,
    selected: &[i64],
) -> Arc<DispatchController> {
    let controller = Arc::new(DispatchController::new(backend));
    assert_eq!(
        controller.refresh_orders().await,
        RefreshOutcome::Refreshed { count: 3 }
    );
    for id in selected {
        assert!(controller.toggle_order(OrderId(*id)).await);
    }
    controller
}

async fn wait_for_orders_call(backend: &ScriptedBackend, call: usize) {
    for _ in 0..200 {
        if *backend.orders_calls.lock().await >= call {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("pending_orders call {call} never started");
}

async fn wait_for_phase(controller: &DispatchController, phase: DispatchPhase) {
    for _ in 0..200 {
        if controller.snapshot().await.phase == phase {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("controller never reached {phase:?}");
}

#[tokio::test]
async fn scenario_a_confirmed_orders_leave_pending_list() {
    let backend = Arc::new(ScriptedBackend::new(
        vec![order(7), order(9), order(11)],
        vec![trip(101, &[7, 9])],
    ));
    let controller = controller_with(backend.clone(), &[7, 9]).await;
    let mut events = controller.subscribe_events();

    let outcome = controller.propose().await.expect("propose");
    assert_eq!(outcome, ProposalOutcome::Reviewing { trip_count: 1 });

    let view = controller.snapshot().await;
    assert_eq!(view.phase, DispatchPhase::Reviewing);
    assert_eq!(view.proposal.len(), 1);
    assert!(view.proposal[0].checked);
    assert!(view.select_all_checked);
    assert!(view.can_confirm);

    let outcome = controller.confirm().await.expect("confirm");
    assert!(matches!(outcome, ConfirmOutcome::Confirmed { ref trips } if trips[0].id == TripId(101)));

    let view = controller.snapshot().await;
    assert_eq!(view.phase, DispatchPhase::Confirmed);
    assert_eq!(view.confirmed.len(), 1);
    assert_eq!(view.selected_order_count(), 0);
    let remaining: Vec<OrderId> = view.orders.iter().map(|row| row.order.id).collect();
    assert_eq!(remaining, vec![OrderId(11)]);

    let mut saw_confirmed = false;
    let mut saw_refresh = false;
    while let Ok(event) = events.try_recv() {
        match event {
            DispatchEvent::TripsConfirmed { trips } => saw_confirmed = trips.len() == 1,
            DispatchEvent::OrdersRefreshed { count } => saw_refresh = count == 1,
            _ => {}
        }
    }
    assert!(saw_confirmed);
    assert!(saw_refresh);
}

#[tokio::test]
async fn scenario_b_empty_proposal_keeps_selection() {
    let backend = Arc::new(ScriptedBackend::new(
        vec![order(7), order(9), order(11)],
        Vec::new(),
    ));
    let controller = controller_with(backend, &[7]).await;

    let outcome = controller.propose().await.expect("propose");
    assert_eq!(outcome, ProposalOutcome::NoTrips);

    let view = controller.snapshot().await;
    assert_eq!(view.phase, DispatchPhase::Idle);
    assert_eq!(
        view.error.as_deref(),
        Some("No trips could be proposed for the selected orders.")
    );
    let selected: Vec<OrderId> = view
        .orders
        .iter()
        .filter(|row| row.selected)
        .map(|row| row.order.id)
        .collect();
    assert_eq!(selected, vec![OrderId(7)]);
    assert!(view.can_propose);
}

#[tokio::test]
async fn scenario_c_only_checked_trips_are_sent() {
    let backend = Arc::new(ScriptedBackend::new(
        vec![order(7), order(9), order(11)],
        vec![trip(101, &[7]), trip(102, &[9])],
    ));
    let controller = controller_with(backend.clone(), &[7, 9]).await;

    controller.propose().await.expect("propose");
    assert!(controller.toggle_trip(TripId(102)).await.expect("toggle"));
    assert!(!controller.snapshot().await.select_all_checked);

    controller.confirm().await.expect("confirm");
    assert_eq!(*backend.confirm_calls.lock().await, vec![vec![TripId(101)]]);
}

#[tokio::test]
async fn scenario_d_reject_makes_no_network_call() {
    let backend = Arc::new(ScriptedBackend::new(
        vec![order(7), order(9), order(11)],
        vec![trip(101, &[7, 9])],
    ));
    let controller = controller_with(backend.clone(), &[7, 9]).await;

    controller.propose().await.expect("propose");
    controller.reject().await.expect("reject");

    let view = controller.snapshot().await;
    assert_eq!(view.phase, DispatchPhase::Idle);
    assert!(view.proposal.is_empty());
    assert_eq!(view.selected_order_count(), 2);
    assert_eq!(backend.propose_calls.lock().await.len(), 1);
    assert!(backend.confirm_calls.lock().await.is_empty());
}

#[tokio::test]
async fn propose_is_refused_without_selection() {
    let backend = Arc::new(ScriptedBackend::new(
        vec![order(7), order(9), order(11)],
        vec![trip(101, &[7])],
    ));
    let controller = controller_with(backend.clone(), &[]).await;

    assert!(!controller.snapshot().await.can_propose);
    assert_eq!(controller.propose().await, Err(ActionRefused::EmptySelection));
    assert!(backend.propose_calls.lock().await.is_empty());
}

#[tokio::test]
async fn second_propose_is_refused_while_first_is_in_flight() {
    let gate = Arc::new(Notify::new());
    let backend = Arc::new(
        ScriptedBackend::new(vec![order(7), order(9), order(11)], vec![trip(101, &[7])])
            .with_propose_gate(gate.clone()),
    );
    let controller = controller_with(backend.clone(), &[7]).await;

    let first = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.propose().await })
    };
    wait_for_phase(&controller, DispatchPhase::Proposing).await;

    assert!(!controller.snapshot().await.can_propose);
    assert_eq!(controller.propose().await, Err(ActionRefused::RequestInFlight));

    gate.notify_one();
    let outcome = first.await.expect("join").expect("propose");
    assert_eq!(outcome, ProposalOutcome::Reviewing { trip_count: 1 });
    assert_eq!(backend.propose_calls.lock().await.len(), 1);
}

#[tokio::test]
async fn slow_proposal_times_out_and_keeps_selection() {
    let backend = Arc::new(
        ScriptedBackend::new(vec![order(7), order(9), order(11)], vec![trip(101, &[7])])
            .with_propose_delay(Duration::from_secs(5)),
    );
    let controller = Arc::new(
        DispatchController::new(backend).with_request_timeout(Duration::from_millis(50)),
    );
    controller.refresh_orders().await;
    controller.toggle_order(OrderId(9)).await;

    let outcome = controller.propose().await.expect("propose");
    assert_eq!(
        outcome,
        ProposalOutcome::Failed(ClientError::Timeout.user_message())
    );

    let view = controller.snapshot().await;
    assert_eq!(view.phase, DispatchPhase::Idle);
    assert_eq!(view.selected_order_count(), 1);
}

#[tokio::test]
async fn response_arriving_after_reset_is_discarded() {
    let gate = Arc::new(Notify::new());
    let backend = Arc::new(
        ScriptedBackend::new(vec![order(7), order(9), order(11)], vec![trip(101, &[7])])
            .with_propose_gate(gate.clone()),
    );
    let controller = controller_with(backend, &[7]).await;

    let pending = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.propose().await })
    };
    wait_for_phase(&controller, DispatchPhase::Proposing).await;

    controller.reset().await;
    gate.notify_one();

    let outcome = pending.await.expect("join").expect("propose");
    assert_eq!(outcome, ProposalOutcome::Stale);
    let view = controller.snapshot().await;
    assert_eq!(view.phase, DispatchPhase::Idle);
    assert!(view.proposal.is_empty());
    assert!(view.orders.is_empty());
}

#[tokio::test]
async fn failed_confirm_stays_in_review() {
    let backend = Arc::new(
        ScriptedBackend::new(vec![order(7), order(9), order(11)], vec![trip(101, &[7, 9])])
            .with_confirm_error(ClientError::Transport("connection reset".into())),
    );
    let controller = controller_with(backend, &[7, 9]).await;
    let mut events = controller.subscribe_events();

    controller.propose().await.expect("propose");
    let outcome = controller.confirm().await.expect("confirm");
    assert!(matches!(outcome, ConfirmOutcome::Failed(_)));

    let view = controller.snapshot().await;
    assert_eq!(view.phase, DispatchPhase::Reviewing);
    assert!(view.error.is_some());
    assert!(view.can_confirm);
    assert_eq!(view.selected_order_count(), 2);

    let mut saw_error = false;
    while let Ok(event) = events.try_recv() {
        if let DispatchEvent::Error(message) = event {
            saw_error = message.contains("Could not reach");
        }
    }
    assert!(saw_error);
}

#[tokio::test]
async fn unavailable_backend_surfaces_refresh_failure() {
    let controller = DispatchController::new(Arc::new(MissingDispatchBackend));

    let outcome = controller.refresh_orders().await;
    assert!(matches!(outcome, RefreshOutcome::Failed(_)));
    let view = controller.snapshot().await;
    assert!(view.orders.is_empty());
    assert!(view.error.is_some());
}

#[tokio::test]
async fn dismiss_leaves_thank_you_screen() {
    let backend = Arc::new(ScriptedBackend::new(
        vec![order(7), order(9), order(11)],
        vec![trip(101, &[7])],
    ));
    let controller = controller_with(backend, &[7]).await;

    assert_eq!(controller.dismiss().await, Err(ActionRefused::NotConfirmed));
    controller.propose().await.expect("propose");
    controller.confirm().await.expect("confirm");
    controller.dismiss().await.expect("dismiss");

    let view = controller.snapshot().await;
    assert_eq!(view.phase, DispatchPhase::Idle);
    assert!(view.confirmed.is_empty());
}

#[tokio::test]
async fn reload_answered_after_confirm_cannot_restore_dispatched_orders() {
    let gate = Arc::new(Notify::new());
    let backend = Arc::new(
        ScriptedBackend::new(vec![order(7), order(9), order(11)], vec![trip(101, &[7, 9])])
            .with_orders_gate(2, gate.clone()),
    );
    let controller = controller_with(backend.clone(), &[7, 9]).await;
    controller.propose().await.expect("propose");

    let reload = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.refresh_orders().await })
    };
    wait_for_orders_call(&backend, 2).await;

    controller.confirm().await.expect("confirm");
    let remaining: Vec<OrderId> = controller
        .snapshot()
        .await
        .orders
        .iter()
        .map(|row| row.order.id)
        .collect();
    assert_eq!(remaining, vec![OrderId(11)]);

    gate.notify_one();
    assert_eq!(reload.await.expect("join"), RefreshOutcome::Stale);

    let view = controller.snapshot().await;
    assert_eq!(view.phase, DispatchPhase::Confirmed);
    let remaining: Vec<OrderId> = view.orders.iter().map(|row| row.order.id).collect();
    assert_eq!(remaining, vec![OrderId(11)]);
}

#[tokio::test]
async fn older_reload_is_dropped_once_a_newer_one_applied() {
    let gate = Arc::new(Notify::new());
    let backend = Arc::new(
        ScriptedBackend::new(vec![order(7), order(9), order(11)], Vec::new())
            .with_orders_gate(2, gate.clone()),
    );
    let controller = controller_with(backend.clone(), &[]).await;

    let older = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.refresh_orders().await })
    };
    wait_for_orders_call(&backend, 2).await;

    backend.orders.lock().await.retain(|order| order.id != OrderId(7));
    assert_eq!(
        controller.refresh_orders().await,
        RefreshOutcome::Refreshed { count: 2 }
    );

    gate.notify_one();
    assert_eq!(older.await.expect("join"), RefreshOutcome::Stale);
    assert_eq!(controller.snapshot().await.orders.len(), 2);
}

#[tokio::test]
async fn failed_refetch_after_confirm_keeps_thank_you_screen() {
    let backend = Arc::new(
        ScriptedBackend::new(vec![order(7), order(9), order(11)], vec![trip(101, &[7, 9])])
            .with_orders_failing_from(2),
    );
    let controller = controller_with(backend.clone(), &[7, 9]).await;

    controller.propose().await.expect("propose");
    let outcome = controller.confirm().await.expect("confirm");
    assert!(matches!(outcome, ConfirmOutcome::Confirmed { ref trips } if trips.len() == 1));
    assert_eq!(*backend.orders_calls.lock().await, 2);

    let view = controller.snapshot().await;
    assert_eq!(view.phase, DispatchPhase::Confirmed);
    assert_eq!(view.confirmed.len(), 1);
    assert_eq!(view.confirmed[0].id, TripId(101));
    assert!(view.error.as_deref().is_some_and(|message| message.contains("Could not reach")));
    let shown: Vec<OrderId> = view.orders.iter().map(|row| row.order.id).collect();
    assert_eq!(shown, vec![OrderId(7), OrderId(9), OrderId(11)]);
}

#[tokio::test]
async fn order_selection_is_frozen_while_proposing() {
    let gate = Arc::new(Notify::new());
    let backend = Arc::new(
        ScriptedBackend::new(vec![order(7), order(9), order(11)], vec![trip(101, &[7])])
            .with_propose_gate(gate.clone()),
    );
    let controller = controller_with(backend, &[7]).await;

    let pending = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.propose().await })
    };
    wait_for_phase(&controller, DispatchPhase::Proposing).await;

    assert!(!controller.toggle_order(OrderId(9)).await);
    assert!(!controller.select_all_orders().await);
    assert!(!controller.clear_selection().await);
    assert_eq!(controller.snapshot().await.selected_order_count(), 1);

    gate.notify_one();
    pending.await.expect("join").expect("propose");
    assert_eq!(controller.snapshot().await.phase, DispatchPhase::Reviewing);
}

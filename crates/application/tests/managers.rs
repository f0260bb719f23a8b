//! Integration tests for the saga manager, process manager and
//! materialized view.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use application::{ActionPublished, Error, MaterializedView, ProcessManager, SagaManager};
use async_trait::async_trait;
use common::{AggregateId, Identifier, StateIdentifier, Sum};
use domain::{IProcess, Process, Saga, View};
use repository::{
    ActionPublisher, InMemoryActionPublisher, InMemoryStateRepository,
    InMemoryViewStateRepository, RepositoryError, Result as RepoResult,
};

#[derive(Debug, Clone, PartialEq)]
enum OrderEvent {
    Placed { order_id: AggregateId, sku: String },
    PaymentReceived { order_id: AggregateId },
    Delivered { order_id: AggregateId },
}

impl Identifier for OrderEvent {
    fn identifier(&self) -> AggregateId {
        match self {
            OrderEvent::Placed { order_id, .. }
            | OrderEvent::PaymentReceived { order_id }
            | OrderEvent::Delivered { order_id } => *order_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FulfillmentCommand {
    ReserveInventory { order_id: AggregateId, sku: String },
    NotifyWarehouse { order_id: AggregateId },
    RequestPayment { order_id: AggregateId },
    ShipOrder { order_id: AggregateId },
}

/// Publisher that fails while `down` is set.
#[derive(Clone, Default)]
struct FlakyPublisher {
    inner: InMemoryActionPublisher<FulfillmentCommand>,
    down: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
}

impl FlakyPublisher {
    fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActionPublisher<FulfillmentCommand> for FlakyPublisher {
    async fn publish(&self, actions: &[FulfillmentCommand]) -> RepoResult<Vec<FulfillmentCommand>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("broker down".to_string()));
        }
        self.inner.publish(actions).await
    }
}

impl FulfillmentCommand {
    fn order_id(&self) -> AggregateId {
        match self {
            FulfillmentCommand::ReserveInventory { order_id, .. }
            | FulfillmentCommand::NotifyWarehouse { order_id }
            | FulfillmentCommand::RequestPayment { order_id }
            | FulfillmentCommand::ShipOrder { order_id } => *order_id,
        }
    }
}

/// Publisher that panics when asked to publish for one order.
#[derive(Clone)]
struct CrashingPublisher {
    inner: InMemoryActionPublisher<FulfillmentCommand>,
    crash_on: AggregateId,
}

#[async_trait]
impl ActionPublisher<FulfillmentCommand> for CrashingPublisher {
    async fn publish(&self, actions: &[FulfillmentCommand]) -> RepoResult<Vec<FulfillmentCommand>> {
        if actions.iter().any(|action| action.order_id() == self.crash_on) {
            panic!("broker client crashed");
        }
        self.inner.publish(actions).await
    }
}

fn placed(order_id: AggregateId) -> OrderEvent {
    OrderEvent::Placed {
        order_id,
        sku: "SKU-001".to_string(),
    }
}

// -- saga manager --

fn fulfillment_saga<'a>() -> Saga<'a, OrderEvent, FulfillmentCommand> {
    let inventory = Saga::new(|event: &OrderEvent| match event {
        OrderEvent::Placed { order_id, sku } => vec![FulfillmentCommand::ReserveInventory {
            order_id: *order_id,
            sku: sku.clone(),
        }],
        _ => vec![],
    });
    let warehouse = Saga::new(|event: &OrderEvent| match event {
        OrderEvent::Placed { order_id, .. } => vec![FulfillmentCommand::NotifyWarehouse {
            order_id: *order_id,
        }],
        _ => vec![],
    });

    inventory
        .merge(warehouse)
        .map_action(|action: &Sum<FulfillmentCommand, FulfillmentCommand>| match action {
            Sum::First(command) | Sum::Second(command) => command.clone(),
        })
}

#[tokio::test]
async fn test_saga_manager_publishes_reactions_in_order() {
    let publisher = FlakyPublisher::default();
    let manager = SagaManager::new(fulfillment_saga(), publisher.clone());
    let order_id = AggregateId::new();

    let published = manager.handle(&placed(order_id)).await.unwrap();

    let expected = vec![
        FulfillmentCommand::ReserveInventory {
            order_id,
            sku: "SKU-001".to_string(),
        },
        FulfillmentCommand::NotifyWarehouse { order_id },
    ];
    assert_eq!(
        published,
        expected
            .iter()
            .cloned()
            .map(ActionPublished::from)
            .collect::<Vec<_>>()
    );
    assert_eq!(publisher.inner.published().await, expected);
}

#[tokio::test]
async fn test_saga_manager_skips_publisher_when_nothing_to_do() {
    let publisher = FlakyPublisher::default();
    let manager = SagaManager::new(fulfillment_saga(), publisher.clone());

    let published = manager
        .handle(&OrderEvent::Delivered {
            order_id: AggregateId::new(),
        })
        .await
        .unwrap();
    assert!(published.is_empty());
    assert_eq!(publisher.attempts(), 0);
}

#[tokio::test]
async fn test_saga_manager_publish_failure_is_classified() {
    let publisher = FlakyPublisher::default();
    publisher.set_down(true);
    let manager = SagaManager::new(fulfillment_saga(), publisher.clone());

    let results = manager
        .handle_all(vec![placed(AggregateId::new()), placed(AggregateId::new())])
        .await;
    assert_eq!(results.len(), 2);
    for result in results {
        assert!(matches!(
            result,
            Err(Error::ActionResultPublishingFailed { .. })
        ));
    }
    assert_eq!(publisher.attempts(), 2);
}

#[tokio::test]
async fn test_saga_manager_publisher_panic_is_classified_and_stream_continues() {
    let first = AggregateId::new();
    let crashing = AggregateId::new();
    let last = AggregateId::new();
    let publisher = CrashingPublisher {
        inner: InMemoryActionPublisher::new(),
        crash_on: crashing,
    };
    let manager = SagaManager::new(fulfillment_saga(), publisher.clone());

    let results = manager
        .handle_all(vec![placed(first), placed(crashing), placed(last)])
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().len(), 2);
    match &results[1] {
        Err(err @ Error::ActionResultPublishingFailed { .. }) => {
            assert_eq!(err.input(), &placed(crashing));
            assert!(matches!(
                err.repository_error(),
                Some(RepositoryError::Panicked(message)) if message == "broker client crashed"
            ));
        }
        other => panic!("expected a publishing failure, got {other:?}"),
    }
    assert_eq!(results[2].as_ref().unwrap().len(), 2);

    let published = publisher.inner.published().await;
    assert_eq!(published.len(), 4);
    assert!(published.iter().all(|action| action.order_id() != crashing));
}

// -- process manager --

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    New,
    AwaitingPayment,
    ReadyToShip,
    Delivered,
}

#[derive(Debug, Clone, PartialEq)]
struct Fulfillment {
    order_id: Option<AggregateId>,
    stage: Stage,
}

impl StateIdentifier for Fulfillment {
    fn state_identifier(&self) -> Option<AggregateId> {
        self.order_id
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FulfillmentEvent {
    Started { order_id: AggregateId },
    Paid { order_id: AggregateId },
    Completed { order_id: AggregateId },
}

fn fulfillment_process<'a>()
-> IProcess<'a, OrderEvent, Fulfillment, FulfillmentEvent, FulfillmentCommand> {
    Process::new(
        |ar: &OrderEvent, state: &Fulfillment| match (ar, state.stage) {
            (OrderEvent::Placed { order_id, .. }, Stage::New) => {
                vec![FulfillmentEvent::Started {
                    order_id: *order_id,
                }]
            }
            (OrderEvent::PaymentReceived { order_id }, Stage::AwaitingPayment) => {
                vec![FulfillmentEvent::Paid {
                    order_id: *order_id,
                }]
            }
            (OrderEvent::Delivered { order_id }, Stage::ReadyToShip) => {
                vec![FulfillmentEvent::Completed {
                    order_id: *order_id,
                }]
            }
            _ => vec![],
        },
        |state: &Fulfillment, event: &FulfillmentEvent| match event {
            FulfillmentEvent::Started { order_id } => Fulfillment {
                order_id: Some(*order_id),
                stage: Stage::AwaitingPayment,
            },
            FulfillmentEvent::Paid { .. } => Fulfillment {
                stage: Stage::ReadyToShip,
                ..state.clone()
            },
            FulfillmentEvent::Completed { .. } => Fulfillment {
                stage: Stage::Delivered,
                ..state.clone()
            },
        },
        |_: &Fulfillment, event: &FulfillmentEvent| match event {
            FulfillmentEvent::Started { order_id } => vec![FulfillmentCommand::RequestPayment {
                order_id: *order_id,
            }],
            FulfillmentEvent::Paid { order_id } => vec![FulfillmentCommand::ShipOrder {
                order_id: *order_id,
            }],
            FulfillmentEvent::Completed { .. } => vec![],
        },
        |state: &Fulfillment| match (state.order_id, state.stage) {
            (Some(order_id), Stage::AwaitingPayment) => {
                vec![FulfillmentCommand::RequestPayment { order_id }]
            }
            (Some(order_id), Stage::ReadyToShip) => vec![FulfillmentCommand::ShipOrder { order_id }],
            _ => vec![],
        },
        || Fulfillment {
            order_id: None,
            stage: Stage::New,
        },
    )
    .with_terminal(|state: &Fulfillment| state.stage == Stage::Delivered)
}

struct TestHarness {
    manager: ProcessManager<
        'static,
        OrderEvent,
        Fulfillment,
        FulfillmentEvent,
        FulfillmentCommand,
        FlakyPublisher,
        InMemoryStateRepository<Fulfillment>,
    >,
    publisher: FlakyPublisher,
    repository: InMemoryStateRepository<Fulfillment>,
}

impl TestHarness {
    fn new() -> Self {
        let publisher = FlakyPublisher::default();
        let repository = InMemoryStateRepository::new();
        Self {
            manager: ProcessManager::new(
                fulfillment_process(),
                publisher.clone(),
                repository.clone(),
            ),
            publisher,
            repository,
        }
    }
}

#[tokio::test]
async fn test_process_manager_happy_path() {
    let h = TestHarness::new();
    let order_id = AggregateId::new();

    let step = h.manager.handle(&placed(order_id)).await.unwrap();
    assert_eq!(step.state.stage, Stage::AwaitingPayment);
    assert_eq!(step.events, vec![FulfillmentEvent::Started { order_id }]);
    assert_eq!(
        step.published,
        vec![ActionPublished::from(FulfillmentCommand::RequestPayment {
            order_id
        })]
    );

    let step = h
        .manager
        .handle(&OrderEvent::PaymentReceived { order_id })
        .await
        .unwrap();
    assert_eq!(step.state.stage, Stage::ReadyToShip);
    assert_eq!(
        h.publisher.inner.published().await,
        vec![
            FulfillmentCommand::RequestPayment { order_id },
            FulfillmentCommand::ShipOrder { order_id },
        ]
    );
}

#[tokio::test]
async fn test_process_manager_recovers_after_publish_crash() {
    let h = TestHarness::new();
    let order_id = AggregateId::new();

    h.publisher.set_down(true);
    let err = h.manager.handle(&placed(order_id)).await.unwrap_err();
    assert!(matches!(err, Error::CommandPublishingFailed { .. }));
    assert!(h.publisher.inner.published().await.is_empty());

    // The state is durable even though nothing went out.
    let saved = h.repository.get(order_id).await.unwrap();
    assert_eq!(saved.stage, Stage::AwaitingPayment);

    let owed = h.manager.pending_for(&placed(order_id)).await.unwrap();
    assert_eq!(owed, vec![FulfillmentCommand::RequestPayment { order_id }]);

    // Redelivering the same action result does not ingest it twice.
    h.publisher.set_down(false);
    let redelivered = h.manager.handle(&placed(order_id)).await.unwrap();
    assert!(redelivered.events.is_empty());
    assert!(redelivered.published.is_empty());

    let recovered = h.manager.recover(&placed(order_id)).await.unwrap();
    assert_eq!(
        recovered,
        vec![ActionPublished::from(FulfillmentCommand::RequestPayment {
            order_id
        })]
    );
    assert_eq!(h.publisher.inner.published().await, owed);
}

#[tokio::test]
async fn test_process_manager_recover_publish_failure_is_classified() {
    let h = TestHarness::new();
    let order_id = AggregateId::new();

    h.publisher.set_down(true);
    h.manager.handle(&placed(order_id)).await.unwrap_err();

    let err = h.manager.recover(&placed(order_id)).await.unwrap_err();
    assert!(matches!(err, Error::ActionResultPublishingFailed { .. }));
    assert_eq!(h.publisher.attempts(), 2);
}

#[tokio::test]
async fn test_process_manager_publisher_panic_keeps_state_recoverable() {
    let order_id = AggregateId::new();
    let repository = InMemoryStateRepository::new();
    let manager = ProcessManager::new(
        fulfillment_process(),
        CrashingPublisher {
            inner: InMemoryActionPublisher::new(),
            crash_on: order_id,
        },
        repository.clone(),
    );

    let err = manager.handle(&placed(order_id)).await.unwrap_err();
    assert!(matches!(err, Error::CommandPublishingFailed { .. }));
    assert_eq!(err.kind(), "command_publishing_failed");

    assert_eq!(
        repository.get(order_id).await.map(|state| state.stage),
        Some(Stage::AwaitingPayment)
    );
    assert_eq!(
        manager.pending_for(&placed(order_id)).await.unwrap(),
        vec![FulfillmentCommand::RequestPayment { order_id }]
    );

    // Other processes keep going through the same manager.
    let other = AggregateId::new();
    assert!(manager.handle(&placed(other)).await.is_ok());
}

#[tokio::test]
async fn test_process_manager_rejects_in_terminal_state() {
    let h = TestHarness::new();
    let order_id = AggregateId::new();

    let results = h
        .manager
        .handle_all(vec![
            placed(order_id),
            OrderEvent::PaymentReceived { order_id },
            OrderEvent::Delivered { order_id },
        ])
        .await;
    assert!(results.iter().all(Result::is_ok));
    let attempts = h.publisher.attempts();
    let before = h.repository.get(order_id).await;

    let err = h
        .manager
        .handle(&OrderEvent::PaymentReceived { order_id })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ProcessManagerIsInTerminalState { .. }));
    assert_eq!(h.publisher.attempts(), attempts);
    assert_eq!(h.repository.get(order_id).await, before);
}

// -- materialized view --

#[derive(Debug, Clone, PartialEq)]
struct OrderSummary {
    order_id: Option<AggregateId>,
    status: &'static str,
    updates: u32,
}

impl StateIdentifier for OrderSummary {
    fn state_identifier(&self) -> Option<AggregateId> {
        self.order_id
    }
}

#[tokio::test]
async fn test_materialized_view_tracks_each_order() {
    let repository = InMemoryViewStateRepository::new();
    let view = MaterializedView::new(
        View::new(
            |summary: &OrderSummary, event: &OrderEvent| OrderSummary {
                order_id: Some(event.identifier()),
                status: match event {
                    OrderEvent::Placed { .. } => "placed",
                    OrderEvent::PaymentReceived { .. } => "paid",
                    OrderEvent::Delivered { .. } => "delivered",
                },
                updates: summary.updates + 1,
            },
            || OrderSummary {
                order_id: None,
                status: "unknown",
                updates: 0,
            },
        ),
        repository.clone(),
    );
    let first = AggregateId::new();
    let second = AggregateId::new();

    let results = view
        .handle_all(vec![
            placed(first),
            placed(second),
            OrderEvent::PaymentReceived { order_id: first },
        ])
        .await;
    assert_eq!(results[2].as_ref().unwrap().state.status, "paid");

    let summary = repository.get(first).await.unwrap();
    assert_eq!(summary.updates, 2);
    assert_eq!(repository.get(second).await.unwrap().status, "placed");
}

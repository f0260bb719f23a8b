//! The order flow: every orchestrator wired to in-memory collaborators.

use std::collections::VecDeque;

use application::{
    EventSourcingAggregate, LockingStateStoredAggregate, MaterializedView, ProcessManager,
    SagaManager,
};
use common::{AggregateId, Identifier};
use repository::{
    InMemoryActionPublisher, InMemoryEventRepository, InMemoryLockingStateRepository,
    InMemoryStateRepository, InMemoryViewStateRepository,
};
use serde::Serialize;

use crate::error::Result;
use crate::model::{
    Order, OrderCommand, OrderEvent, OrderStatus, OrderSummary, Shipment, ShipmentEvent, Stock,
    StockCommand, StockEvent, order_decider, order_summary_view, reservation_saga,
    shipment_process, stock_decider,
};

type Orders = EventSourcingAggregate<
    'static,
    OrderCommand,
    Order,
    OrderEvent,
    OrderEvent,
    InMemoryEventRepository<OrderEvent>,
>;
type Summaries =
    MaterializedView<'static, OrderSummary, OrderEvent, InMemoryViewStateRepository<OrderSummary>>;
type Warehouse = LockingStateStoredAggregate<
    'static,
    StockCommand,
    Stock,
    StockEvent,
    InMemoryLockingStateRepository<Stock>,
>;
type Reservations =
    SagaManager<'static, OrderEvent, StockCommand, InMemoryActionPublisher<StockCommand>>;
type Shipments = ProcessManager<
    'static,
    StockEvent,
    Shipment,
    ShipmentEvent,
    OrderCommand,
    InMemoryActionPublisher<OrderCommand>,
    InMemoryStateRepository<Shipment>,
>;

/// One order line requested by the flow.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub sku: String,
    pub quantity: u32,
}

impl OrderLine {
    pub fn new(sku: impl Into<String>, quantity: u32) -> Self {
        Self {
            sku: sku.into(),
            quantity,
        }
    }
}

/// What one run left behind.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub warehouse: Option<Stock>,
    pub warehouse_version: Option<i64>,
    pub orders: Vec<OrderSummary>,
    pub stored_events: usize,
}

impl RunReport {
    pub fn count(&self, status: OrderStatus) -> usize {
        self.orders.iter().filter(|o| o.status == status).count()
    }
}

/// Orders are event-sourced and summarized by a materialized view; each
/// placed order is reserved against a single warehouse through a saga; the
/// reservation outcome drives a shipment process that ships or cancels the
/// order.
pub struct OrderFlow {
    warehouse_id: AggregateId,
    orders: Orders,
    summaries: Summaries,
    warehouse: Warehouse,
    reservations: Reservations,
    shipments: Shipments,
    order_events: InMemoryEventRepository<OrderEvent>,
    summary_rows: InMemoryViewStateRepository<OrderSummary>,
    stock_rows: InMemoryLockingStateRepository<Stock>,
}

impl OrderFlow {
    pub fn new() -> Self {
        let warehouse_id = AggregateId::new();
        let order_events = InMemoryEventRepository::new();
        let summary_rows = InMemoryViewStateRepository::new();
        let stock_rows = InMemoryLockingStateRepository::new();

        Self {
            warehouse_id,
            orders: EventSourcingAggregate::new(order_decider(), order_events.clone()),
            summaries: MaterializedView::new(order_summary_view(), summary_rows.clone()),
            warehouse: LockingStateStoredAggregate::new(stock_decider(), stock_rows.clone()),
            reservations: SagaManager::new(
                reservation_saga(warehouse_id),
                InMemoryActionPublisher::new(),
            ),
            shipments: ProcessManager::new(
                shipment_process(),
                InMemoryActionPublisher::new(),
                InMemoryStateRepository::new(),
            ),
            order_events,
            summary_rows,
            stock_rows,
        }
    }

    /// Restocks the warehouse, places every line as a new order and follows
    /// the resulting events until nothing is left to do.
    #[tracing::instrument(skip_all, fields(warehouse = %self.warehouse_id, lines = lines.len()))]
    pub async fn run(&self, restock: u32, lines: &[OrderLine]) -> Result<RunReport> {
        self.warehouse
            .handle(&StockCommand::Restock {
                warehouse_id: self.warehouse_id,
                quantity: restock,
            })
            .await?;

        let commands: Vec<OrderCommand> = lines
            .iter()
            .map(|line| OrderCommand::Place {
                order_id: AggregateId::new(),
                sku: line.sku.clone(),
                quantity: line.quantity,
            })
            .collect();
        let order_ids: Vec<AggregateId> = commands.iter().map(Identifier::identifier).collect();

        let mut pending = VecDeque::new();
        for result in self.orders.handle_all(commands).await {
            pending.extend(result?.into_iter().map(|stored| stored.event));
        }

        while let Some(event) = pending.pop_front() {
            self.summaries.handle(&event).await?;

            for reservation in self.reservations.handle(&event).await? {
                let reserved = self.warehouse.handle(&reservation.action).await?;

                for outcome in reserved.events {
                    if matches!(outcome, StockEvent::Restocked { .. }) {
                        continue;
                    }
                    let step = self.shipments.handle(&outcome).await?;
                    for command in step.published {
                        let stored = self.orders.handle(&command.action).await?;
                        pending.extend(stored.into_iter().map(|stored| stored.event));
                    }
                }
            }
        }

        self.report(&order_ids).await
    }

    async fn report(&self, order_ids: &[AggregateId]) -> Result<RunReport> {
        let mut orders = Vec::with_capacity(order_ids.len());
        for order_id in order_ids {
            if let Some(summary) = self.summary_rows.get(*order_id).await {
                orders.push(summary);
            }
        }

        let (warehouse, warehouse_version) = match self.stock_rows.get(self.warehouse_id).await {
            Some((stock, version)) => (Some(stock), Some(version.as_i64())),
            None => (None, None),
        };

        Ok(RunReport {
            warehouse,
            warehouse_version,
            orders,
            stored_events: self.order_events.event_count().await,
        })
    }
}

impl Default for OrderFlow {
    fn default() -> Self {
        Self::new()
    }
}

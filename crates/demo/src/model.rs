//! The demo domain: orders, warehouse stock and the shipment process tying
//! them together.

use common::{AggregateId, Identifier, StateIdentifier};
use domain::{Decider, IDecider, IProcess, IView, Process, Saga, View};
use serde::{Deserialize, Serialize};

// -- orders (event-sourced) --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderCommand {
    Place {
        order_id: AggregateId,
        sku: String,
        quantity: u32,
    },
    Ship {
        order_id: AggregateId,
    },
    Cancel {
        order_id: AggregateId,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderEvent {
    Placed {
        order_id: AggregateId,
        sku: String,
        quantity: u32,
    },
    Shipped {
        order_id: AggregateId,
    },
    Cancelled {
        order_id: AggregateId,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    Placed,
    Shipped,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub order_id: Option<AggregateId>,
    pub status: OrderStatus,
}

impl Identifier for OrderCommand {
    fn identifier(&self) -> AggregateId {
        match self {
            OrderCommand::Place { order_id, .. }
            | OrderCommand::Ship { order_id }
            | OrderCommand::Cancel { order_id, .. } => *order_id,
        }
    }
}

impl Identifier for OrderEvent {
    fn identifier(&self) -> AggregateId {
        match self {
            OrderEvent::Placed { order_id, .. }
            | OrderEvent::Shipped { order_id }
            | OrderEvent::Cancelled { order_id, .. } => *order_id,
        }
    }
}

/// Orders accept one placement, then either ship or get cancelled.
pub fn order_decider<'a>() -> IDecider<'a, OrderCommand, Order, OrderEvent> {
    Decider::new(
        |command: &OrderCommand, order: &Order| match (command, order.status) {
            (
                OrderCommand::Place {
                    order_id,
                    sku,
                    quantity,
                },
                OrderStatus::New,
            ) => vec![OrderEvent::Placed {
                order_id: *order_id,
                sku: sku.clone(),
                quantity: *quantity,
            }],
            (OrderCommand::Ship { order_id }, OrderStatus::Placed) => {
                vec![OrderEvent::Shipped {
                    order_id: *order_id,
                }]
            }
            (OrderCommand::Cancel { order_id, reason }, OrderStatus::Placed) => {
                vec![OrderEvent::Cancelled {
                    order_id: *order_id,
                    reason: reason.clone(),
                }]
            }
            _ => vec![],
        },
        |_: &Order, event: &OrderEvent| Order {
            order_id: Some(event.identifier()),
            status: match event {
                OrderEvent::Placed { .. } => OrderStatus::Placed,
                OrderEvent::Shipped { .. } => OrderStatus::Shipped,
                OrderEvent::Cancelled { .. } => OrderStatus::Cancelled,
            },
        },
        || Order {
            order_id: None,
            status: OrderStatus::New,
        },
    )
    .with_terminal(|order: &Order| {
        matches!(order.status, OrderStatus::Shipped | OrderStatus::Cancelled)
    })
}

// -- order summaries (materialized view) --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: Option<AggregateId>,
    pub sku: Option<String>,
    pub quantity: u32,
    pub status: OrderStatus,
    pub note: Option<String>,
}

impl StateIdentifier for OrderSummary {
    fn state_identifier(&self) -> Option<AggregateId> {
        self.order_id
    }
}

pub fn order_summary_view<'a>() -> IView<'a, OrderSummary, OrderEvent> {
    View::new(
        |summary: &OrderSummary, event: &OrderEvent| match event {
            OrderEvent::Placed {
                order_id,
                sku,
                quantity,
            } => OrderSummary {
                order_id: Some(*order_id),
                sku: Some(sku.clone()),
                quantity: *quantity,
                status: OrderStatus::Placed,
                note: None,
            },
            OrderEvent::Shipped { order_id } => OrderSummary {
                order_id: Some(*order_id),
                status: OrderStatus::Shipped,
                ..summary.clone()
            },
            OrderEvent::Cancelled { order_id, reason } => OrderSummary {
                order_id: Some(*order_id),
                status: OrderStatus::Cancelled,
                note: Some(reason.clone()),
                ..summary.clone()
            },
        },
        || OrderSummary {
            order_id: None,
            sku: None,
            quantity: 0,
            status: OrderStatus::New,
            note: None,
        },
    )
}

// -- warehouse stock (locking state-stored) --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StockCommand {
    Restock {
        warehouse_id: AggregateId,
        quantity: u32,
    },
    Reserve {
        warehouse_id: AggregateId,
        order_id: AggregateId,
        quantity: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StockEvent {
    Restocked {
        warehouse_id: AggregateId,
        quantity: u32,
    },
    Reserved {
        warehouse_id: AggregateId,
        order_id: AggregateId,
        quantity: u32,
    },
    ReservationRejected {
        warehouse_id: AggregateId,
        order_id: AggregateId,
        available: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    pub warehouse_id: Option<AggregateId>,
    pub available: u32,
    pub reserved: u32,
}

impl Identifier for StockCommand {
    fn identifier(&self) -> AggregateId {
        match self {
            StockCommand::Restock { warehouse_id, .. }
            | StockCommand::Reserve { warehouse_id, .. } => *warehouse_id,
        }
    }
}

/// Reservation outcomes address the order they were made for.
impl Identifier for StockEvent {
    fn identifier(&self) -> AggregateId {
        match self {
            StockEvent::Restocked { warehouse_id, .. } => *warehouse_id,
            StockEvent::Reserved { order_id, .. }
            | StockEvent::ReservationRejected { order_id, .. } => *order_id,
        }
    }
}

impl StateIdentifier for Stock {
    fn state_identifier(&self) -> Option<AggregateId> {
        self.warehouse_id
    }
}

pub fn stock_decider<'a>() -> IDecider<'a, StockCommand, Stock, StockEvent> {
    Decider::new(
        |command: &StockCommand, stock: &Stock| match command {
            StockCommand::Restock {
                warehouse_id,
                quantity,
            } => vec![StockEvent::Restocked {
                warehouse_id: *warehouse_id,
                quantity: *quantity,
            }],
            StockCommand::Reserve {
                warehouse_id,
                order_id,
                quantity,
            } if *quantity <= stock.available => vec![StockEvent::Reserved {
                warehouse_id: *warehouse_id,
                order_id: *order_id,
                quantity: *quantity,
            }],
            StockCommand::Reserve {
                warehouse_id,
                order_id,
                ..
            } => vec![StockEvent::ReservationRejected {
                warehouse_id: *warehouse_id,
                order_id: *order_id,
                available: stock.available,
            }],
        },
        |stock: &Stock, event: &StockEvent| match event {
            StockEvent::Restocked {
                warehouse_id,
                quantity,
            } => Stock {
                warehouse_id: Some(*warehouse_id),
                available: stock.available + quantity,
                reserved: stock.reserved,
            },
            StockEvent::Reserved {
                warehouse_id,
                quantity,
                ..
            } => Stock {
                warehouse_id: Some(*warehouse_id),
                available: stock.available - quantity,
                reserved: stock.reserved + quantity,
            },
            StockEvent::ReservationRejected { warehouse_id, .. } => Stock {
                warehouse_id: Some(*warehouse_id),
                ..stock.clone()
            },
        },
        || Stock {
            warehouse_id: None,
            available: 0,
            reserved: 0,
        },
    )
}

/// Every placed order asks the warehouse for its quantity.
pub fn reservation_saga<'a>(warehouse_id: AggregateId) -> Saga<'a, OrderEvent, StockCommand> {
    Saga::new(move |event: &OrderEvent| match event {
        OrderEvent::Placed {
            order_id, quantity, ..
        } => vec![StockCommand::Reserve {
            warehouse_id,
            order_id: *order_id,
            quantity: *quantity,
        }],
        _ => vec![],
    })
}

// -- shipment (process manager) --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentStage {
    Waiting,
    Shipping,
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub order_id: Option<AggregateId>,
    pub stage: ShipmentStage,
    pub available: Option<u32>,
}

impl StateIdentifier for Shipment {
    fn state_identifier(&self) -> Option<AggregateId> {
        self.order_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShipmentEvent {
    Scheduled { order_id: AggregateId },
    Abandoned { order_id: AggregateId, available: u32 },
}

/// Turns reservation outcomes into order commands: reserved orders ship,
/// rejected ones are cancelled. Both outcomes are final.
pub fn shipment_process<'a>() -> IProcess<'a, StockEvent, Shipment, ShipmentEvent, OrderCommand> {
    Process::new(
        |outcome: &StockEvent, shipment: &Shipment| match (outcome, shipment.stage) {
            (StockEvent::Reserved { order_id, .. }, ShipmentStage::Waiting) => {
                vec![ShipmentEvent::Scheduled {
                    order_id: *order_id,
                }]
            }
            (
                StockEvent::ReservationRejected {
                    order_id,
                    available,
                    ..
                },
                ShipmentStage::Waiting,
            ) => vec![ShipmentEvent::Abandoned {
                order_id: *order_id,
                available: *available,
            }],
            _ => vec![],
        },
        |_: &Shipment, event: &ShipmentEvent| match event {
            ShipmentEvent::Scheduled { order_id } => Shipment {
                order_id: Some(*order_id),
                stage: ShipmentStage::Shipping,
                available: None,
            },
            ShipmentEvent::Abandoned {
                order_id,
                available,
            } => Shipment {
                order_id: Some(*order_id),
                stage: ShipmentStage::Abandoned,
                available: Some(*available),
            },
        },
        |shipment: &Shipment, _: &ShipmentEvent| owed_commands(shipment),
        owed_commands,
        || Shipment {
            order_id: None,
            stage: ShipmentStage::Waiting,
            available: None,
        },
    )
    .with_terminal(|shipment: &Shipment| shipment.stage != ShipmentStage::Waiting)
}

fn owed_commands(shipment: &Shipment) -> Vec<OrderCommand> {
    match (shipment.order_id, shipment.stage) {
        (Some(order_id), ShipmentStage::Shipping) => vec![OrderCommand::Ship { order_id }],
        (Some(order_id), ShipmentStage::Abandoned) => vec![OrderCommand::Cancel {
            order_id,
            reason: format!(
                "out of stock, {} available",
                shipment.available.unwrap_or_default()
            ),
        }],
        _ => vec![],
    }
}

//! Demo of the orchestrators driving a small order fulfillment domain.
//!
//! Everything runs in memory; the binary prints one JSON report per run and,
//! when enabled, the Prometheus scrape text of the orchestrator counters.

pub mod config;
pub mod error;
pub mod flow;
pub mod model;

pub use config::{Config, LogFormat};
pub use error::{DemoError, Result};
pub use flow::{OrderFlow, OrderLine, RunReport};

/// The order lines placed on every run, against a restock of
/// [`DEFAULT_RESTOCK`] units: the second line cannot be reserved.
pub fn default_lines() -> Vec<OrderLine> {
    vec![
        OrderLine::new("SKU-RED", 2),
        OrderLine::new("SKU-RED", 4),
        OrderLine::new("SKU-BLUE", 1),
    ]
}

pub const DEFAULT_RESTOCK: u32 = 5;

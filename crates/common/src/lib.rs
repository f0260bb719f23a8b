//! Shared types for the decision/evolution workspace.

pub mod sum;
pub mod types;

pub use sum::Sum;
pub use types::{AggregateId, Identifier, StateIdentifier};

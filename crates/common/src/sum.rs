//! Tagged union used when two computations are combined side by side.

use serde::{Deserialize, Serialize};

/// Either a value meant for the first operand or one meant for the second.
///
/// Combining two deciders, views or sagas over disjoint domains tags their
/// commands, events and actions with `Sum` so each side only observes what
/// belongs to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sum<A, B> {
    /// Routed to the first operand.
    First(A),
    /// Routed to the second operand.
    Second(B),
}

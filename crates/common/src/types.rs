use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an aggregate, view or process instance.
///
/// Wraps a UUID to provide type safety and prevent mixing up
/// instance IDs with other UUID-based identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

impl AggregateId {
    /// Creates a new random aggregate ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an aggregate ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AggregateId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AggregateId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<AggregateId> for Uuid {
    fn from(id: AggregateId) -> Self {
        id.0
    }
}

/// Anything that addresses a single instance: commands, events and action
/// results.
///
/// Collaborators use it to find the stream or row an input belongs to.
pub trait Identifier {
    fn identifier(&self) -> AggregateId;
}

impl Identifier for AggregateId {
    fn identifier(&self) -> AggregateId {
        *self
    }
}

impl<A: Identifier, B: Identifier> Identifier for crate::Sum<A, B> {
    fn identifier(&self) -> AggregateId {
        match self {
            crate::Sum::First(a) => a.identifier(),
            crate::Sum::Second(b) => b.identifier(),
        }
    }
}

/// The instance a state belongs to.
///
/// Initial states have not been addressed by any input yet and usually name
/// no instance; collaborators refuse to store those.
pub trait StateIdentifier {
    fn state_identifier(&self) -> Option<AggregateId>;
}

//! Collaborator contracts consumed by the orchestrators.
//!
//! The traits in [`store`] describe what an orchestrator needs from storage
//! and publishing; [`memory`] provides thread-safe in-memory implementations
//! used by tests and the demo binary.

pub mod error;
pub mod memory;
pub mod store;
pub mod version;

pub use common::{AggregateId, Identifier, StateIdentifier};
pub use error::{RepositoryError, Result};
pub use memory::{
    InMemoryActionPublisher, InMemoryEventRepository, InMemoryLockingStateRepository,
    InMemoryStateRepository, InMemoryViewStateRepository, StoredEvent,
};
pub use store::{
    ActionPublisher, EventRepository, StateLockingRepository, StateRepository,
    ViewStateRepository,
};
pub use version::Version;

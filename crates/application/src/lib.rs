//! Application layer: effectful orchestration of the pure domain algebra.
//!
//! Each orchestrator owns one pure computation from the `domain` crate plus
//! the collaborators it needs, and runs every input through the same shape:
//! fetch, compute, validate, then save and/or publish.
//!
//! | Orchestrator | Computation | Collaborators |
//! |---|---|---|
//! | [`EventSourcingAggregate`] | `Decider` | `EventRepository` |
//! | [`StateStoredAggregate`] | `IDecider` | `StateRepository` |
//! | [`LockingStateStoredAggregate`] | `IDecider` | `StateLockingRepository` |
//! | [`MaterializedView`] | `IView` | `ViewStateRepository` |
//! | [`SagaManager`] | `Saga` | `ActionPublisher` |
//! | [`ProcessManager`] | `IProcess` | `StateRepository`, `ActionPublisher` |
//!
//! Every failure is reported as an [`Error`] naming the phase that failed and
//! carrying the input; a panic inside a pure step is caught and classified
//! the same way.

pub mod aggregate;
pub mod error;
pub mod materialized_view;
pub mod process_manager;
pub mod saga_manager;
pub mod state_stored;
pub mod success;

pub use aggregate::EventSourcingAggregate;
pub use error::{Error, Result};
pub use materialized_view::MaterializedView;
pub use process_manager::ProcessManager;
pub use saga_manager::SagaManager;
pub use state_stored::{LockingStateStoredAggregate, StateStoredAggregate};
pub use success::{
    ActionPublished, EventStored, LockedStateStored, ProcessStored, StateStored, ViewStateStored,
};

use std::fmt::{Debug, Display};

use async_trait::async_trait;

use crate::Result;

/// Event-sourced storage for one decider.
///
/// `fetch_events` returns the history of the instance a command addresses,
/// oldest first. `save` appends newly decided events atomically and confirms
/// each one with the stream version it was stored at.
#[async_trait]
pub trait EventRepository<C, Ei, Eo>: Send + Sync {
    /// Version assigned to each stored event.
    type Version: Debug + Clone + Send + Sync;

    async fn fetch_events(&self, command: &C) -> Result<Vec<Ei>>;

    async fn save(&self, events: &[Eo]) -> Result<Vec<(Eo, Self::Version)>>;
}

/// State-stored persistence without concurrency control.
///
/// Concurrent writers are not detected: the last save wins unless the
/// implementation decides otherwise.
#[async_trait]
pub trait StateRepository<C, S>: Send + Sync {
    /// Returns the current state of the addressed instance, if any.
    async fn fetch_state(&self, command: &C) -> Result<Option<S>>;

    async fn save(&self, state: &S) -> Result<S>;
}

/// State-stored persistence with optimistic concurrency control.
///
/// `save` must fail with [`crate::RepositoryError::Conflict`] when
/// `expected_version` no longer matches the stored version, including a
/// `None` expectation for an instance that now exists.
#[async_trait]
pub trait StateLockingRepository<C, S>: Send + Sync {
    /// Opaque version token compared on save.
    type Version: PartialEq + Debug + Display + Clone + Send + Sync;

    async fn fetch_state(&self, command: &C) -> Result<(Option<S>, Option<Self::Version>)>;

    async fn save(
        &self,
        state: &S,
        expected_version: Option<&Self::Version>,
    ) -> Result<(S, Self::Version)>;
}

/// Storage for materialized view state, addressed by the incoming event.
///
/// Idempotency under duplicate delivery is up to the implementation.
#[async_trait]
pub trait ViewStateRepository<E, S>: Send + Sync {
    async fn fetch_state(&self, event: &E) -> Result<Option<S>>;

    async fn save(&self, state: &S) -> Result<S>;
}

/// Publishes actions (usually commands for other aggregates).
///
/// Returns the actions confirmed as published, in order.
#[async_trait]
pub trait ActionPublisher<A>: Send + Sync {
    async fn publish(&self, actions: &[A]) -> Result<Vec<A>>;
}

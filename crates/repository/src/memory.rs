use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    AggregateId, Identifier, RepositoryError, Result, StateIdentifier, Version,
    store::{
        ActionPublisher, EventRepository, StateLockingRepository, StateRepository,
        ViewStateRepository,
    },
};

/// An event as kept by [`InMemoryEventRepository`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent<E> {
    /// The instance this event belongs to.
    pub aggregate_id: AggregateId,

    /// The version of the instance after this event.
    pub version: Version,

    /// When the event was stored.
    pub recorded_at: DateTime<Utc>,

    pub event: E,
}

/// In-memory event repository.
///
/// Streams are keyed by [`Identifier`]: commands address a stream on fetch,
/// events name the stream they are appended to on save.
#[derive(Clone)]
pub struct InMemoryEventRepository<E> {
    events: Arc<RwLock<Vec<StoredEvent<E>>>>,
}

impl<E> Default for InMemoryEventRepository<E> {
    fn default() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl<E: Clone> InMemoryEventRepository<E> {
    /// Creates a new empty in-memory event repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Returns the stored stream of one instance, oldest first.
    pub async fn stream(&self, aggregate_id: AggregateId) -> Vec<StoredEvent<E>> {
        let store = self.events.read().await;
        let mut stream: Vec<_> = store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        stream.sort_by_key(|e| e.version);
        stream
    }
}

#[async_trait]
impl<C, E> EventRepository<C, E, E> for InMemoryEventRepository<E>
where
    C: Identifier + Sync,
    E: Identifier + Clone + Send + Sync,
{
    type Version = Version;

    async fn fetch_events(&self, command: &C) -> Result<Vec<E>> {
        let stream = self.stream(command.identifier()).await;
        Ok(stream.into_iter().map(|stored| stored.event).collect())
    }

    async fn save(&self, events: &[E]) -> Result<Vec<(E, Version)>> {
        let mut store = self.events.write().await;
        let mut saved = Vec::with_capacity(events.len());

        for event in events {
            let aggregate_id = event.identifier();
            let current_version = store
                .iter()
                .filter(|e| e.aggregate_id == aggregate_id)
                .map(|e| e.version)
                .max()
                .unwrap_or(Version::initial());
            let version = current_version.next();

            store.push(StoredEvent {
                aggregate_id,
                version,
                recorded_at: Utc::now(),
                event: event.clone(),
            });
            saved.push((event.clone(), version));
        }

        tracing::trace!(count = saved.len(), "events appended");
        Ok(saved)
    }
}

/// In-memory state repository without concurrency control; the last save
/// wins.
///
/// Also serves as view-state storage, where the incoming event addresses the
/// row.
#[derive(Clone)]
pub struct InMemoryStateRepository<S> {
    states: Arc<RwLock<HashMap<AggregateId, S>>>,
}

/// Materialized view storage shares the plain state repository.
pub type InMemoryViewStateRepository<S> = InMemoryStateRepository<S>;

impl<S> Default for InMemoryStateRepository<S> {
    fn default() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<S: Clone> InMemoryStateRepository<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored state of one instance.
    pub async fn get(&self, aggregate_id: AggregateId) -> Option<S> {
        self.states.read().await.get(&aggregate_id).cloned()
    }

    /// Returns the number of stored instances.
    pub async fn count(&self) -> usize {
        self.states.read().await.len()
    }
}

impl<S: StateIdentifier + Clone> InMemoryStateRepository<S> {
    async fn put(&self, state: &S) -> Result<S> {
        let aggregate_id = identity_of(state)?;
        self.states.write().await.insert(aggregate_id, state.clone());
        Ok(state.clone())
    }
}

fn identity_of<S: StateIdentifier>(state: &S) -> Result<AggregateId> {
    state.state_identifier().ok_or_else(|| {
        RepositoryError::MissingIdentity("state was not addressed by any input".to_string())
    })
}

#[async_trait]
impl<C, S> StateRepository<C, S> for InMemoryStateRepository<S>
where
    C: Identifier + Sync,
    S: StateIdentifier + Clone + Send + Sync,
{
    async fn fetch_state(&self, command: &C) -> Result<Option<S>> {
        Ok(self.get(command.identifier()).await)
    }

    async fn save(&self, state: &S) -> Result<S> {
        self.put(state).await
    }
}

#[async_trait]
impl<E, S> ViewStateRepository<E, S> for InMemoryStateRepository<S>
where
    E: Identifier + Sync,
    S: StateIdentifier + Clone + Send + Sync,
{
    async fn fetch_state(&self, event: &E) -> Result<Option<S>> {
        Ok(self.get(event.identifier()).await)
    }

    async fn save(&self, state: &S) -> Result<S> {
        self.put(state).await
    }
}

/// In-memory state repository with optimistic concurrency control.
///
/// Every save bumps the instance's [`Version`]; a save whose expected version
/// differs from the stored one fails with [`RepositoryError::Conflict`].
#[derive(Clone)]
pub struct InMemoryLockingStateRepository<S> {
    states: Arc<RwLock<HashMap<AggregateId, (S, Version)>>>,
}

impl<S> Default for InMemoryLockingStateRepository<S> {
    fn default() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<S: Clone> InMemoryLockingStateRepository<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored state and version of one instance.
    pub async fn get(&self, aggregate_id: AggregateId) -> Option<(S, Version)> {
        self.states.read().await.get(&aggregate_id).cloned()
    }
}

#[async_trait]
impl<C, S> StateLockingRepository<C, S> for InMemoryLockingStateRepository<S>
where
    C: Identifier + Sync,
    S: StateIdentifier + Clone + Send + Sync,
{
    type Version = Version;

    async fn fetch_state(&self, command: &C) -> Result<(Option<S>, Option<Version>)> {
        Ok(match self.get(command.identifier()).await {
            Some((state, version)) => (Some(state), Some(version)),
            None => (None, None),
        })
    }

    async fn save(&self, state: &S, expected_version: Option<&Version>) -> Result<(S, Version)> {
        let aggregate_id = identity_of(state)?;
        let mut store = self.states.write().await;
        let current_version = store.get(&aggregate_id).map(|(_, version)| *version);

        if current_version.as_ref() != expected_version {
            tracing::debug!(
                %aggregate_id,
                expected = ?expected_version,
                actual = ?current_version,
                "stale version on save"
            );
            return Err(RepositoryError::conflict(
                expected_version,
                current_version.as_ref(),
            ));
        }

        let version = current_version.unwrap_or(Version::initial()).next();
        store.insert(aggregate_id, (state.clone(), version));
        Ok((state.clone(), version))
    }
}

/// In-memory publisher recording every published action in order.
#[derive(Clone)]
pub struct InMemoryActionPublisher<A> {
    published: Arc<RwLock<Vec<A>>>,
}

impl<A> Default for InMemoryActionPublisher<A> {
    fn default() -> Self {
        Self {
            published: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl<A: Clone> InMemoryActionPublisher<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything published so far.
    pub async fn published(&self) -> Vec<A> {
        self.published.read().await.clone()
    }
}

#[async_trait]
impl<A> ActionPublisher<A> for InMemoryActionPublisher<A>
where
    A: Clone + Send + Sync,
{
    async fn publish(&self, actions: &[A]) -> Result<Vec<A>> {
        self.published.write().await.extend_from_slice(actions);
        Ok(actions.to_vec())
    }
}

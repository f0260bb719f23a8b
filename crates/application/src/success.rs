//! What an orchestrator durably stored or published.

/// One event appended by an event-sourcing aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct EventStored<E, V> {
    pub event: E,
    /// Stream version the repository assigned to the event.
    pub version: V,
}

/// New state saved by a state-stored aggregate, with the events that
/// justified it.
#[derive(Debug, Clone, PartialEq)]
pub struct StateStored<S, E> {
    pub state: S,
    pub events: Vec<E>,
}

/// New state and version saved by a locking state-stored aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct LockedStateStored<S, V, E> {
    pub state: S,
    pub version: V,
    pub events: Vec<E>,
}

/// New state saved by a materialized view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewStateStored<S> {
    pub state: S,
}

/// One action confirmed by the publisher.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionPublished<A> {
    pub action: A,
}

/// One process-manager step: the state saved, the events ingested and the
/// actions published afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessStored<S, E, A> {
    pub state: S,
    pub events: Vec<E>,
    pub published: Vec<ActionPublished<A>>,
}

impl<A> From<A> for ActionPublished<A> {
    fn from(action: A) -> Self {
        Self { action }
    }
}

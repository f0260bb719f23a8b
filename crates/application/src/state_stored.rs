//! State-stored aggregates, plain and optimistically locked.

use std::fmt::Debug;

use domain::IDecider;
use futures_core::Stream;
use futures_util::{StreamExt, stream};
use repository::{StateLockingRepository, StateRepository};

use crate::error::{Error, Result, catch_panic, guard, record_outcome};
use crate::success::{LockedStateStored, StateStored};

/// Drives a decider against a [`StateRepository`].
///
/// Only the latest state is persisted; events are computed to evolve it and
/// returned to the caller, never stored. Concurrent writers are not detected
/// here: whatever the repository does on concurrent saves is what happens.
pub struct StateStoredAggregate<'a, C, S, E, R> {
    decider: IDecider<'a, C, S, E>,
    repository: R,
}

impl<'a, C, S, E, R> StateStoredAggregate<'a, C, S, E, R>
where
    C: Clone + Debug,
    R: StateRepository<C, S>,
{
    pub fn new(decider: IDecider<'a, C, S, E>, repository: R) -> Self {
        Self {
            decider,
            repository,
        }
    }

    #[tracing::instrument(skip_all, name = "state_stored_aggregate.handle")]
    pub async fn handle(&self, command: &C) -> Result<StateStored<S, E>, C> {
        let result = self.try_handle(command).await;
        record_outcome("state_stored_aggregate", &result);
        result
    }

    async fn try_handle(&self, command: &C) -> Result<StateStored<S, E>, C> {
        let stored = guard(self.repository.fetch_state(command))
            .await
            .map_err(|source| Error::FetchingStateFailed {
                input: command.clone(),
                source,
            })?;

        let (state, events) = decide_and_evolve(&self.decider, command, stored)?;

        let state = guard(self.repository.save(&state))
            .await
            .map_err(|source| Error::StoringStateFailed {
                input: command.clone(),
                source,
            })?;

        Ok(StateStored { state, events })
    }

    /// Handles commands one after another, in order.
    pub fn handle_stream<St>(&self, commands: St) -> impl Stream<Item = Result<StateStored<S, E>, C>>
    where
        St: Stream<Item = C>,
    {
        commands.then(move |command| async move { self.handle(&command).await })
    }

    pub async fn handle_all<I>(&self, commands: I) -> Vec<Result<StateStored<S, E>, C>>
    where
        I: IntoIterator<Item = C>,
    {
        self.handle_stream(stream::iter(commands)).collect().await
    }
}

/// Drives a decider against a [`StateLockingRepository`].
///
/// The version read with the state is handed back on save, so a concurrent
/// writer that saved in between makes this save fail with a conflict instead
/// of being overwritten. A conflicted command can be retried as is.
pub struct LockingStateStoredAggregate<'a, C, S, E, R> {
    decider: IDecider<'a, C, S, E>,
    repository: R,
}

impl<'a, C, S, E, R> LockingStateStoredAggregate<'a, C, S, E, R>
where
    C: Clone + Debug,
    R: StateLockingRepository<C, S>,
{
    pub fn new(decider: IDecider<'a, C, S, E>, repository: R) -> Self {
        Self {
            decider,
            repository,
        }
    }

    #[tracing::instrument(skip_all, name = "locking_state_stored_aggregate.handle")]
    pub async fn handle(&self, command: &C) -> Result<LockedStateStored<S, R::Version, E>, C> {
        let result = self.try_handle(command).await;
        record_outcome("locking_state_stored_aggregate", &result);
        result
    }

    async fn try_handle(&self, command: &C) -> Result<LockedStateStored<S, R::Version, E>, C> {
        let (stored, version) = guard(self.repository.fetch_state(command))
            .await
            .map_err(|source| Error::FetchingStateFailed {
                input: command.clone(),
                source,
            })?;

        let (state, events) = decide_and_evolve(&self.decider, command, stored)?;

        let (state, version) = guard(self.repository.save(&state, version.as_ref()))
            .await
            .map_err(|source| {
                if source.is_conflict() {
                    tracing::warn!(
                        expected = ?version,
                        retryable = true,
                        "state changed since it was read"
                    );
                }
                Error::StoringStateFailed {
                    input: command.clone(),
                    source,
                }
            })?;

        tracing::debug!(%version, "state saved");
        Ok(LockedStateStored {
            state,
            version,
            events,
        })
    }

    /// Handles commands one after another, in order.
    pub fn handle_stream<St>(
        &self,
        commands: St,
    ) -> impl Stream<Item = Result<LockedStateStored<S, R::Version, E>, C>>
    where
        St: Stream<Item = C>,
    {
        commands.then(move |command| async move { self.handle(&command).await })
    }

    pub async fn handle_all<I>(
        &self,
        commands: I,
    ) -> Vec<Result<LockedStateStored<S, R::Version, E>, C>>
    where
        I: IntoIterator<Item = C>,
    {
        self.handle_stream(stream::iter(commands)).collect().await
    }
}

/// Shared compute phase: initial state if nothing is stored, terminal check,
/// decide, then fold the decided events into the state.
fn decide_and_evolve<C, S, E>(
    decider: &IDecider<'_, C, S, E>,
    command: &C,
    stored: Option<S>,
) -> Result<(S, Vec<E>), C>
where
    C: Clone,
{
    let (state, terminal) = catch_panic(|| {
        let state = stored.unwrap_or_else(|| (decider.initial_state)());
        let terminal = (decider.is_terminal)(&state);
        (state, terminal)
    })
    .map_err(|reason| Error::CalculatingNewStateFailed {
        input: command.clone(),
        reason,
    })?;

    if terminal {
        return Err(Error::AggregateIsInTerminalState {
            input: command.clone(),
        });
    }

    let events =
        catch_panic(|| (decider.decide)(command, &state)).map_err(|reason| {
            Error::CommandHandlingFailed {
                input: command.clone(),
                reason,
            }
        })?;

    let state = catch_panic(|| decider.compute_new_state(state, &events)).map_err(|reason| {
        Error::CalculatingNewStateFailed {
            input: command.clone(),
            reason,
        }
    })?;

    Ok((state, events))
}

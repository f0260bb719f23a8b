//! Event-sourcing aggregate.

use std::fmt::Debug;

use domain::Decider;
use futures_core::Stream;
use futures_util::{StreamExt, stream};
use repository::EventRepository;

use crate::error::{Error, Result, catch_panic, guard, record_outcome};
use crate::success::EventStored;

/// Drives a [`Decider`] against an [`EventRepository`].
///
/// For each command:
/// 1. Fetch the history of the addressed instance
/// 2. Replay it from the decider's initial state
/// 3. Reject the command if that state is terminal
/// 4. Decide on the command
/// 5. Append the new events
pub struct EventSourcingAggregate<'a, C, S, Ei, Eo, R> {
    decider: Decider<'a, C, S, S, Ei, Eo>,
    repository: R,
}

impl<'a, C, S, Ei, Eo, R> EventSourcingAggregate<'a, C, S, Ei, Eo, R>
where
    C: Clone + Debug,
    R: EventRepository<C, Ei, Eo>,
{
    pub fn new(decider: Decider<'a, C, S, S, Ei, Eo>, repository: R) -> Self {
        Self {
            decider,
            repository,
        }
    }

    /// Handles one command, returning one record per stored event.
    ///
    /// A command the decider answers with no events stores nothing.
    #[tracing::instrument(skip_all, name = "event_sourcing_aggregate.handle")]
    pub async fn handle(&self, command: &C) -> Result<Vec<EventStored<Eo, R::Version>>, C> {
        let result = self.try_handle(command).await;
        record_outcome("event_sourcing_aggregate", &result);
        result
    }

    async fn try_handle(&self, command: &C) -> Result<Vec<EventStored<Eo, R::Version>>, C> {
        let history = guard(self.repository.fetch_events(command))
            .await
            .map_err(|source| Error::FetchingEventsFailed {
                input: command.clone(),
                source,
            })?;

        let (state, terminal) = catch_panic(|| {
            let state = self.decider.replay(&history);
            let terminal = (self.decider.is_terminal)(&state);
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

        let events = catch_panic(|| (self.decider.decide)(command, &state)).map_err(|reason| {
            Error::CommandHandlingFailed {
                input: command.clone(),
                reason,
            }
        })?;

        if events.is_empty() {
            tracing::debug!(replayed = history.len(), "command produced no events");
            return Ok(Vec::new());
        }

        let saved = guard(self.repository.save(&events))
            .await
            .map_err(|source| Error::StoringEventsFailed {
                input: command.clone(),
                source,
            })?;

        tracing::debug!(
            replayed = history.len(),
            stored = saved.len(),
            "command handled"
        );

        Ok(saved
            .into_iter()
            .map(|(event, version)| EventStored { event, version })
            .collect())
    }

    /// Handles commands one after another, in order.
    ///
    /// Each command is fully stored before the next one is fetched; a failed
    /// command yields its error in place and the stream carries on.
    pub fn handle_stream<St>(
        &self,
        commands: St,
    ) -> impl Stream<Item = Result<Vec<EventStored<Eo, R::Version>>, C>>
    where
        St: Stream<Item = C>,
    {
        commands.then(move |command| async move { self.handle(&command).await })
    }

    /// Collects [`Self::handle_stream`] over a batch.
    pub async fn handle_all<I>(&self, commands: I) -> Vec<Result<Vec<EventStored<Eo, R::Version>>, C>>
    where
        I: IntoIterator<Item = C>,
    {
        self.handle_stream(stream::iter(commands)).collect().await
    }
}

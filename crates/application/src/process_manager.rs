//! Process manager: a saga with durable state.

use std::fmt::Debug;

use domain::IProcess;
use futures_core::Stream;
use futures_util::{StreamExt, stream};
use repository::{ActionPublisher, StateRepository};

use crate::error::{Error, Result, catch_panic, guard, record_outcome};
use crate::success::{ActionPublished, ProcessStored};

/// Drives an [`IProcess`] with a [`StateRepository`] for its state and an
/// [`ActionPublisher`] for the actions it owes.
///
/// State is saved before anything is published. A crash or publisher failure
/// in between leaves a durable state whose `pending` set still names the
/// unpublished actions; [`ProcessManager::recover`] republishes them.
pub struct ProcessManager<'a, AR, S, E, A, P, R> {
    process: IProcess<'a, AR, S, E, A>,
    publisher: P,
    repository: R,
}

impl<'a, AR, S, E, A, P, R> ProcessManager<'a, AR, S, E, A, P, R>
where
    AR: Clone + Debug,
    P: ActionPublisher<A>,
    R: StateRepository<AR, S>,
{
    pub fn new(process: IProcess<'a, AR, S, E, A>, publisher: P, repository: R) -> Self {
        Self {
            process,
            publisher,
            repository,
        }
    }

    /// Ingests one action result, saves the evolved state, then publishes
    /// the actions the new events call for.
    #[tracing::instrument(skip_all, name = "process_manager.handle")]
    pub async fn handle(&self, action_result: &AR) -> Result<ProcessStored<S, E, A>, AR> {
        let result = self.try_handle(action_result).await;
        record_outcome("process_manager", &result);
        result
    }

    async fn try_handle(&self, action_result: &AR) -> Result<ProcessStored<S, E, A>, AR> {
        let state = self.fetch_or_initial(action_result).await?;

        let terminal = catch_panic(|| (self.process.is_terminal)(&state)).map_err(|reason| {
            Error::CalculatingNewStateFailed {
                input: action_result.clone(),
                reason,
            }
        })?;
        if terminal {
            return Err(Error::ProcessManagerIsInTerminalState {
                input: action_result.clone(),
            });
        }

        let events = catch_panic(|| (self.process.ingest)(action_result, &state)).map_err(
            |reason| Error::ActionResultHandlingFailed {
                input: action_result.clone(),
                reason,
            },
        )?;

        let state = catch_panic(|| self.process.compute_new_state(state, &events)).map_err(
            |reason| Error::CalculatingNewStateFailed {
                input: action_result.clone(),
                reason,
            },
        )?;

        let state = guard(self.repository.save(&state))
            .await
            .map_err(|source| Error::StoringStateFailed {
                input: action_result.clone(),
                source,
            })?;

        let actions = catch_panic(|| -> Vec<A> {
            events
                .iter()
                .flat_map(|event| (self.process.react)(&state, event))
                .collect()
        })
        .map_err(|reason| Error::ActionResultHandlingFailed {
            input: action_result.clone(),
            reason,
        })?;

        let published = if actions.is_empty() {
            Vec::new()
        } else {
            guard(self.publisher.publish(&actions)).await.map_err(|source| {
                tracing::warn!(
                    owed = actions.len(),
                    "state saved but actions not published; recoverable from pending"
                );
                Error::CommandPublishingFailed {
                    input: action_result.clone(),
                    source,
                }
            })?
        };

        tracing::debug!(
            ingested = events.len(),
            published = published.len(),
            "action result handled"
        );

        Ok(ProcessStored {
            state,
            events,
            published: published.into_iter().map(ActionPublished::from).collect(),
        })
    }

    /// Computes the actions the stored state of the addressed process still
    /// owes, without publishing them.
    pub async fn pending_for(&self, action_result: &AR) -> Result<Vec<A>, AR> {
        let state = self.fetch_or_initial(action_result).await?;
        catch_panic(|| (self.process.pending)(&state)).map_err(|reason| {
            Error::ActionResultHandlingFailed {
                input: action_result.clone(),
                reason,
            }
        })
    }

    /// Republishes the pending actions of the addressed process.
    ///
    /// Meant for out-of-band recovery after a crash or publisher outage;
    /// [`ProcessManager::handle`] never calls it. Publishing the same pending
    /// set twice is harmless only if the receivers are idempotent.
    #[tracing::instrument(skip_all, name = "process_manager.recover")]
    pub async fn recover(&self, action_result: &AR) -> Result<Vec<ActionPublished<A>>, AR> {
        let result = self.try_recover(action_result).await;
        record_outcome("process_manager_recovery", &result);
        result
    }

    async fn try_recover(&self, action_result: &AR) -> Result<Vec<ActionPublished<A>>, AR> {
        let actions = self.pending_for(action_result).await?;
        if actions.is_empty() {
            return Ok(Vec::new());
        }

        let published = guard(self.publisher.publish(&actions)).await.map_err(|source| {
            Error::ActionResultPublishingFailed {
                input: action_result.clone(),
                source,
            }
        })?;

        tracing::info!(count = published.len(), "pending actions republished");
        Ok(published.into_iter().map(ActionPublished::from).collect())
    }

    async fn fetch_or_initial(&self, action_result: &AR) -> Result<S, AR> {
        let stored = guard(self.repository.fetch_state(action_result))
            .await
            .map_err(|source| Error::FetchingStateFailed {
                input: action_result.clone(),
                source,
            })?;

        match stored {
            Some(state) => Ok(state),
            None => catch_panic(|| (self.process.initial_state)()).map_err(|reason| {
                Error::CalculatingNewStateFailed {
                    input: action_result.clone(),
                    reason,
                }
            }),
        }
    }

    /// Handles action results one after another, in delivery order.
    pub fn handle_stream<St>(
        &self,
        action_results: St,
    ) -> impl Stream<Item = Result<ProcessStored<S, E, A>, AR>>
    where
        St: Stream<Item = AR>,
    {
        action_results.then(move |action_result| async move { self.handle(&action_result).await })
    }

    pub async fn handle_all<I>(&self, action_results: I) -> Vec<Result<ProcessStored<S, E, A>, AR>>
    where
        I: IntoIterator<Item = AR>,
    {
        self.handle_stream(stream::iter(action_results)).collect().await
    }
}

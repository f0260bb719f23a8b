//! Classified orchestration failures.

use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};

use futures_util::FutureExt;
use repository::RepositoryError;
use thiserror::Error;

/// Failure of one orchestrator call, naming the phase that failed.
///
/// `I` is the input the orchestrator was handling: a command for
/// aggregates, an event for materialized views, an action result for saga
/// and process managers.
#[derive(Debug, Error)]
pub enum Error<I> {
    /// Reading the current state from the repository failed.
    #[error("Fetching state failed for {input:?}: {source}")]
    FetchingStateFailed {
        input: I,
        #[source]
        source: RepositoryError,
    },

    /// Reading the event history from the repository failed.
    #[error("Fetching events failed for {input:?}: {source}")]
    FetchingEventsFailed {
        input: I,
        #[source]
        source: RepositoryError,
    },

    /// Folding events into state panicked.
    #[error("Calculating new state failed for {input:?}: {reason}")]
    CalculatingNewStateFailed { input: I, reason: String },

    /// Deciding on a command panicked.
    #[error("Command handling failed for {input:?}: {reason}")]
    CommandHandlingFailed { input: I, reason: String },

    /// Writing the new state failed; a stale version surfaces here as a
    /// [`RepositoryError::Conflict`] source.
    #[error("Storing state failed for {input:?}: {source}")]
    StoringStateFailed {
        input: I,
        #[source]
        source: RepositoryError,
    },

    /// Appending the new events failed.
    #[error("Storing events failed for {input:?}: {source}")]
    StoringEventsFailed {
        input: I,
        #[source]
        source: RepositoryError,
    },

    /// The addressed aggregate accepts no further commands.
    #[error("Aggregate is in a terminal state, rejected {input:?}")]
    AggregateIsInTerminalState { input: I },

    /// The addressed process accepts no further action results.
    #[error("Process manager is in a terminal state, rejected {input:?}")]
    ProcessManagerIsInTerminalState { input: I },

    /// Reacting to (or ingesting) an action result panicked.
    #[error("Action result handling failed for {input:?}: {reason}")]
    ActionResultHandlingFailed { input: I, reason: String },

    /// Publishing the actions derived from an action result failed.
    #[error("Action result publishing failed for {input:?}: {source}")]
    ActionResultPublishingFailed {
        input: I,
        #[source]
        source: RepositoryError,
    },

    /// Publishing the commands owed by an already stored process state
    /// failed; they are still recoverable from that state.
    #[error("Command publishing failed for {input:?}: {source}")]
    CommandPublishingFailed {
        input: I,
        #[source]
        source: RepositoryError,
    },
}

impl<I> Error<I> {
    /// Returns the input that triggered the failure.
    pub fn input(&self) -> &I {
        match self {
            Error::FetchingStateFailed { input, .. }
            | Error::FetchingEventsFailed { input, .. }
            | Error::CalculatingNewStateFailed { input, .. }
            | Error::CommandHandlingFailed { input, .. }
            | Error::StoringStateFailed { input, .. }
            | Error::StoringEventsFailed { input, .. }
            | Error::AggregateIsInTerminalState { input }
            | Error::ProcessManagerIsInTerminalState { input }
            | Error::ActionResultHandlingFailed { input, .. }
            | Error::ActionResultPublishingFailed { input, .. }
            | Error::CommandPublishingFailed { input, .. } => input,
        }
    }

    /// Returns the collaborator failure behind this error, if any.
    pub fn repository_error(&self) -> Option<&RepositoryError> {
        match self {
            Error::FetchingStateFailed { source, .. }
            | Error::FetchingEventsFailed { source, .. }
            | Error::StoringStateFailed { source, .. }
            | Error::StoringEventsFailed { source, .. }
            | Error::ActionResultPublishingFailed { source, .. }
            | Error::CommandPublishingFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns true when a save lost an optimistic concurrency race.
    /// Such a command can be retried against fresh state.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Error::StoringStateFailed { source, .. } if source.is_conflict()
        )
    }

    /// Returns true for the expected business rejections.
    pub fn is_terminal_state(&self) -> bool {
        matches!(
            self,
            Error::AggregateIsInTerminalState { .. } | Error::ProcessManagerIsInTerminalState { .. }
        )
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::FetchingStateFailed { .. } => "fetching_state_failed",
            Error::FetchingEventsFailed { .. } => "fetching_events_failed",
            Error::CalculatingNewStateFailed { .. } => "calculating_new_state_failed",
            Error::CommandHandlingFailed { .. } => "command_handling_failed",
            Error::StoringStateFailed { .. } if self.is_conflict() => "conflict",
            Error::StoringStateFailed { .. } => "storing_state_failed",
            Error::StoringEventsFailed { .. } => "storing_events_failed",
            Error::AggregateIsInTerminalState { .. } => "aggregate_terminal",
            Error::ProcessManagerIsInTerminalState { .. } => "process_manager_terminal",
            Error::ActionResultHandlingFailed { .. } => "action_result_handling_failed",
            Error::ActionResultPublishingFailed { .. } => "action_result_publishing_failed",
            Error::CommandPublishingFailed { .. } => "command_publishing_failed",
        }
    }
}

/// Convenience type alias for orchestration results.
pub type Result<T, I> = std::result::Result<T, Error<I>>;

/// Runs a pure step, turning a panic into its message.
pub(crate) fn catch_panic<T>(step: impl FnOnce() -> T) -> std::result::Result<T, String> {
    catch_unwind(AssertUnwindSafe(step)).map_err(|payload| panic_message(payload.as_ref()))
}

/// Awaits a collaborator call; a panic inside it becomes
/// [`RepositoryError::Panicked`] so the caller can classify it like any other
/// collaborator failure.
pub(crate) async fn guard<T>(
    call: impl Future<Output = repository::Result<T>>,
) -> repository::Result<T> {
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(RepositoryError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "step panicked".to_string())
}

/// Logs and counts the outcome of one `handle` call.
pub(crate) fn record_outcome<T, I: std::fmt::Debug>(
    orchestrator: &'static str,
    result: &std::result::Result<T, Error<I>>,
) {
    match result {
        Ok(_) => {
            metrics::counter!(
                "orchestrator_inputs_total",
                "orchestrator" => orchestrator,
                "outcome" => "ok"
            )
            .increment(1);
        }
        Err(err) => {
            if err.is_terminal_state() {
                tracing::info!(orchestrator, error = %err, "input rejected by terminal state");
            } else {
                tracing::warn!(orchestrator, error = %err, kind = err.kind(), "input failed");
            }
            metrics::counter!(
                "orchestrator_inputs_total",
                "orchestrator" => orchestrator,
                "outcome" => err.kind()
            )
            .increment(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_is_a_storing_state_sub_case() {
        let err: Error<&str> = Error::StoringStateFailed {
            input: "add",
            source: RepositoryError::Conflict {
                expected: "1".to_string(),
                actual: "2".to_string(),
            },
        };
        assert!(err.is_conflict());
        assert_eq!(err.kind(), "conflict");
        assert_eq!(*err.input(), "add");

        let plain: Error<&str> = Error::StoringStateFailed {
            input: "add",
            source: RepositoryError::Unavailable("down".to_string()),
        };
        assert!(!plain.is_conflict());
        assert_eq!(plain.kind(), "storing_state_failed");
    }

    #[test]
    fn display_names_phase_and_input() {
        let err: Error<u32> = Error::AggregateIsInTerminalState { input: 7 };
        assert_eq!(
            err.to_string(),
            "Aggregate is in a terminal state, rejected 7"
        );
        assert!(err.is_terminal_state());
        assert!(err.repository_error().is_none());
    }

    #[test]
    fn source_chain_reaches_repository_error() {
        let err: Error<u32> = Error::FetchingEventsFailed {
            input: 1,
            source: RepositoryError::Unavailable("timeout".to_string()),
        };
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("Repository unavailable: timeout"));
    }

    #[test]
    fn catch_panic_captures_message() {
        let ok = catch_panic(|| 1 + 1);
        assert_eq!(ok, Ok(2));

        let failed = catch_panic(|| -> u32 { panic!("boom {}", 42) });
        assert_eq!(failed, Err("boom 42".to_string()));

        let literal = catch_panic(|| -> u32 { panic!("static boom") });
        assert_eq!(literal, Err("static boom".to_string()));
    }

    #[tokio::test]
    async fn guard_turns_collaborator_panic_into_error() {
        let ok = guard(async { Ok::<_, RepositoryError>(5) }).await;
        assert_eq!(ok.ok(), Some(5));

        let failed = guard(async {
            if true {
                panic!("store exploded");
            }
            Ok::<u32, RepositoryError>(0)
        })
        .await
        .unwrap_err();
        assert!(matches!(failed, RepositoryError::Panicked(ref message) if message == "store exploded"));
    }
}

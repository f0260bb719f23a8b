//! Saga manager: stateless reaction and publishing.

use std::fmt::Debug;

use domain::Saga;
use futures_core::Stream;
use futures_util::{StreamExt, stream};
use repository::ActionPublisher;

use crate::error::{Error, Result, catch_panic, guard, record_outcome};
use crate::success::ActionPublished;

/// Reacts to action results with a [`Saga`] and publishes the resulting
/// actions through an [`ActionPublisher`].
///
/// Nothing is stored. If publishing fails the action result must be
/// redelivered; the saga computes the same actions again.
pub struct SagaManager<'a, AR, A, P> {
    saga: Saga<'a, AR, A>,
    publisher: P,
}

impl<'a, AR, A, P> SagaManager<'a, AR, A, P>
where
    AR: Clone + Debug,
    P: ActionPublisher<A>,
{
    pub fn new(saga: Saga<'a, AR, A>, publisher: P) -> Self {
        Self { saga, publisher }
    }

    /// Reacts to one action result and publishes what it calls for, in the
    /// order the saga produced it.
    #[tracing::instrument(skip_all, name = "saga_manager.handle")]
    pub async fn handle(&self, action_result: &AR) -> Result<Vec<ActionPublished<A>>, AR> {
        let result = self.try_handle(action_result).await;
        record_outcome("saga_manager", &result);
        result
    }

    async fn try_handle(&self, action_result: &AR) -> Result<Vec<ActionPublished<A>>, AR> {
        let actions = catch_panic(|| (self.saga.react)(action_result)).map_err(|reason| {
            Error::ActionResultHandlingFailed {
                input: action_result.clone(),
                reason,
            }
        })?;

        if actions.is_empty() {
            return Ok(Vec::new());
        }

        let published = guard(self.publisher.publish(&actions)).await.map_err(|source| {
            Error::ActionResultPublishingFailed {
                input: action_result.clone(),
                source,
            }
        })?;

        tracing::debug!(count = published.len(), "actions published");
        Ok(published.into_iter().map(ActionPublished::from).collect())
    }

    /// Handles action results one after another, in delivery order.
    pub fn handle_stream<St>(
        &self,
        action_results: St,
    ) -> impl Stream<Item = Result<Vec<ActionPublished<A>>, AR>>
    where
        St: Stream<Item = AR>,
    {
        action_results.then(move |action_result| async move { self.handle(&action_result).await })
    }

    pub async fn handle_all<I>(&self, action_results: I) -> Vec<Result<Vec<ActionPublished<A>>, AR>>
    where
        I: IntoIterator<Item = AR>,
    {
        self.handle_stream(stream::iter(action_results)).collect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repository::InMemoryActionPublisher;

    #[tokio::test]
    async fn no_actions_publishes_nothing() {
        let publisher = InMemoryActionPublisher::new();
        let manager = SagaManager::new(
            Saga::new(|n: &u32| if *n > 2 { vec![n * 10] } else { vec![] }),
            publisher.clone(),
        );

        assert!(manager.handle(&1).await.unwrap().is_empty());
        let published = manager.handle(&3).await.unwrap();
        assert_eq!(published, vec![ActionPublished { action: 30 }]);
        assert_eq!(publisher.published().await, vec![30]);
    }

    #[tokio::test]
    async fn panicking_react_is_classified() {
        let manager = SagaManager::new(
            Saga::new(|_: &u32| -> Vec<u32> { panic!("cannot react") }),
            InMemoryActionPublisher::new(),
        );
        let err = manager.handle(&1).await.unwrap_err();
        assert_eq!(err.kind(), "action_result_handling_failed");
    }
}

//! Materialized view: events folded into stored read state.

use std::fmt::Debug;

use domain::IView;
use futures_core::Stream;
use futures_util::{StreamExt, stream};
use repository::ViewStateRepository;

use crate::error::{Error, Result, catch_panic, guard, record_outcome};
use crate::success::ViewStateStored;

/// Feeds events, one at a time, into a [`IView`] backed by a
/// [`ViewStateRepository`].
///
/// Each event loads the row it addresses (or the initial state), evolves it
/// and saves the result. Delivering the same event twice evolves twice unless
/// the repository deduplicates.
pub struct MaterializedView<'a, S, E, R> {
    view: IView<'a, S, E>,
    repository: R,
}

impl<'a, S, E, R> MaterializedView<'a, S, E, R>
where
    E: Clone + Debug,
    R: ViewStateRepository<E, S>,
{
    pub fn new(view: IView<'a, S, E>, repository: R) -> Self {
        Self { view, repository }
    }

    #[tracing::instrument(skip_all, name = "materialized_view.handle")]
    pub async fn handle(&self, event: &E) -> Result<ViewStateStored<S>, E> {
        let result = self.try_handle(event).await;
        record_outcome("materialized_view", &result);
        result
    }

    async fn try_handle(&self, event: &E) -> Result<ViewStateStored<S>, E> {
        let stored = guard(self.repository.fetch_state(event))
            .await
            .map_err(|source| Error::FetchingStateFailed {
                input: event.clone(),
                source,
            })?;

        let state = catch_panic(|| {
            let current = stored.unwrap_or_else(|| (self.view.initial_state)());
            (self.view.evolve)(&current, event)
        })
        .map_err(|reason| Error::CalculatingNewStateFailed {
            input: event.clone(),
            reason,
        })?;

        let state = guard(self.repository.save(&state))
            .await
            .map_err(|source| Error::StoringStateFailed {
                input: event.clone(),
                source,
            })?;

        Ok(ViewStateStored { state })
    }

    /// Handles events one after another, in delivery order.
    pub fn handle_stream<St>(&self, events: St) -> impl Stream<Item = Result<ViewStateStored<S>, E>>
    where
        St: Stream<Item = E>,
    {
        events.then(move |event| async move { self.handle(&event).await })
    }

    pub async fn handle_all<I>(&self, events: I) -> Vec<Result<ViewStateStored<S>, E>>
    where
        I: IntoIterator<Item = E>,
    {
        self.handle_stream(stream::iter(events)).collect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{AggregateId, Identifier, StateIdentifier};
    use domain::View;
    use repository::InMemoryViewStateRepository;

    #[derive(Debug, Clone, PartialEq)]
    struct Deposited {
        account: AggregateId,
        amount: u64,
    }

    impl Identifier for Deposited {
        fn identifier(&self) -> AggregateId {
            self.account
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Statement {
        account: Option<AggregateId>,
        deposits: u32,
        total: u64,
    }

    impl StateIdentifier for Statement {
        fn state_identifier(&self) -> Option<AggregateId> {
            self.account
        }
    }

    fn statement_view<'a>() -> IView<'a, Statement, Deposited> {
        View::new(
            |s: &Statement, e: &Deposited| Statement {
                account: Some(e.account),
                deposits: s.deposits + 1,
                total: s.total + e.amount,
            },
            || Statement {
                account: None,
                deposits: 0,
                total: 0,
            },
        )
    }

    #[tokio::test]
    async fn events_accumulate_per_row() {
        let repo = InMemoryViewStateRepository::new();
        let view = MaterializedView::new(statement_view(), repo.clone());
        let a = AggregateId::new();
        let b = AggregateId::new();

        let results = view
            .handle_all(vec![
                Deposited { account: a, amount: 5 },
                Deposited { account: b, amount: 1 },
                Deposited { account: a, amount: 7 },
            ])
            .await;
        assert!(results.iter().all(|result| result.is_ok()));

        let row = repo.get(a).await.unwrap();
        assert_eq!(row.deposits, 2);
        assert_eq!(row.total, 12);
        assert_eq!(repo.count().await, 2);
    }

    #[tokio::test]
    async fn panicking_evolve_is_classified() {
        let view = MaterializedView::new(
            View::new(
                |_: &Statement, _: &Deposited| -> Statement { panic!("bad row") },
                || Statement {
                    account: None,
                    deposits: 0,
                    total: 0,
                },
            ),
            InMemoryViewStateRepository::new(),
        );

        let event = Deposited {
            account: AggregateId::new(),
            amount: 1,
        };
        let err = view.handle(&event).await.unwrap_err();
        assert!(matches!(err, Error::CalculatingNewStateFailed { ref reason, .. } if reason == "bad row"));
        assert_eq!(err.input(), &event);
    }
}

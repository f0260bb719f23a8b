//! The saga: stateless mapping from action results to new actions.

use std::convert::Infallible;

use common::Sum;

use crate::ReactFunction;

/// Pure, stateless reaction component.
///
/// - `AR` - action result (usually an event of another aggregate)
/// - `A` - action (usually a command for another aggregate)
pub struct Saga<'a, AR: 'a, A: 'a> {
    pub react: ReactFunction<'a, AR, A>,
}

impl<'a, AR: 'a, A: 'a> Saga<'a, AR, A> {
    pub fn new<R>(react: R) -> Self
    where
        R: Fn(&AR) -> Vec<A> + Send + Sync + 'a,
    {
        Self {
            react: Box::new(react),
        }
    }

    /// Contravariant map on the action result.
    pub fn map_action_result<ARn: 'a, F>(self, f: F) -> Saga<'a, ARn, A>
    where
        F: Fn(&ARn) -> AR + Send + Sync + 'a,
    {
        let react = self.react;
        Saga {
            react: Box::new(move |action_result: &ARn| react(&f(action_result))),
        }
    }

    /// Covariant map on the action.
    pub fn map_action<An: 'a, F>(self, f: F) -> Saga<'a, AR, An>
    where
        F: Fn(&A) -> An + Send + Sync + 'a,
    {
        let react = self.react;
        Saga {
            react: Box::new(move |action_result: &AR| -> Vec<An> {
                react(action_result).iter().map(&f).collect()
            }),
        }
    }

    /// Combines two sagas over disjoint domains: each tagged action result
    /// reaches only its own side, and the actions come back tagged.
    pub fn combine<AR2: 'a, A2: 'a>(
        self,
        other: Saga<'a, AR2, A2>,
    ) -> Saga<'a, Sum<AR, AR2>, Sum<A, A2>> {
        let react = self.react;
        let other_react = other.react;
        Saga {
            react: Box::new(move |action_result: &Sum<AR, AR2>| -> Vec<Sum<A, A2>> {
                match action_result {
                    Sum::First(ar) => react(ar).into_iter().map(Sum::First).collect(),
                    Sum::Second(ar) => other_react(ar).into_iter().map(Sum::Second).collect(),
                }
            }),
        }
    }

    /// Lets two sagas observe the same action result.
    ///
    /// This saga's actions come first, followed by the other's.
    pub fn merge<A2: 'a>(self, other: Saga<'a, AR, A2>) -> Saga<'a, AR, Sum<A, A2>> {
        let react = self.react;
        let other_react = other.react;
        Saga {
            react: Box::new(move |action_result: &AR| -> Vec<Sum<A, A2>> {
                react(action_result)
                    .into_iter()
                    .map(Sum::First)
                    .chain(other_react(action_result).into_iter().map(Sum::Second))
                    .collect()
            }),
        }
    }
}

impl<'a> Saga<'a, Infallible, Infallible> {
    /// The identity element of [`Saga::combine`].
    pub fn identity() -> Self {
        Saga {
            react: Box::new(|action_result: &Infallible| -> Vec<Infallible> {
                match *action_result {}
            }),
        }
    }
}

//! The view: events folded into denormalized read state.

use std::convert::Infallible;
use std::sync::Arc;

use common::Sum;

use crate::{EvolveFunction, InitialStateFunction};

/// Pure event-handling component backing the query side.
///
/// - `Si` / `So` - state consumed / state produced
/// - `E` - event
pub struct View<'a, Si: 'a, So: 'a, E: 'a> {
    pub evolve: EvolveFunction<'a, Si, E, So>,
    pub initial_state: InitialStateFunction<'a, So>,
}

/// A view whose input and output state coincide.
pub type IView<'a, S, E> = View<'a, S, S, E>;

impl<'a, Si: 'a, So: 'a, E: 'a> View<'a, Si, So, E> {
    pub fn new<V, I>(evolve: V, initial_state: I) -> Self
    where
        V: Fn(&Si, &E) -> So + Send + Sync + 'a,
        I: Fn() -> So + Send + Sync + 'a,
    {
        Self {
            evolve: Box::new(evolve),
            initial_state: Box::new(initial_state),
        }
    }

    /// Contravariant map on the event.
    pub fn map_event<En: 'a, F>(self, f: F) -> View<'a, Si, So, En>
    where
        F: Fn(&En) -> E + Send + Sync + 'a,
    {
        let evolve = self.evolve;
        View {
            evolve: Box::new(move |state: &Si, event: &En| evolve(state, &f(event))),
            initial_state: self.initial_state,
        }
    }

    /// Profunctor map on the state.
    pub fn dimap_on_state<Sin: 'a, Son: 'a, Fl, Fr>(self, fl: Fl, fr: Fr) -> View<'a, Sin, Son, E>
    where
        Fl: Fn(&Sin) -> Si + Send + Sync + 'a,
        Fr: Fn(&So) -> Son + Send + Sync + 'a,
    {
        let View {
            evolve,
            initial_state,
        } = self;
        let fr = Arc::new(fr);
        let fr_initial = Arc::clone(&fr);
        View {
            evolve: Box::new(move |state: &Sin, event: &E| fr(&evolve(&fl(state), event))),
            initial_state: Box::new(move || fr_initial(&initial_state())),
        }
    }

    /// Covariant map on the output state.
    pub fn map_state<Son: 'a, F>(self, f: F) -> View<'a, Si, Son, E>
    where
        F: Fn(&So) -> Son + Send + Sync + 'a,
    {
        let View {
            evolve,
            initial_state,
        } = self;
        let f = Arc::new(f);
        let f_initial = Arc::clone(&f);
        View {
            evolve: Box::new(move |state: &Si, event: &E| f(&evolve(state, event))),
            initial_state: Box::new(move || f_initial(&initial_state())),
        }
    }

    /// Applies a view carrying functions over the output state.
    pub fn rapply<Son: 'a, F: 'a>(self, ff: View<'a, Si, F, E>) -> View<'a, Si, Son, E>
    where
        F: Fn(&So) -> Son,
    {
        let View {
            evolve,
            initial_state,
        } = self;
        let View {
            evolve: f_evolve,
            initial_state: f_initial_state,
        } = ff;
        View {
            evolve: Box::new(move |state: &Si, event: &E| {
                let f = f_evolve(state, event);
                f(&evolve(state, event))
            }),
            initial_state: Box::new(move || {
                let f = f_initial_state();
                f(&initial_state())
            }),
        }
    }

    /// Runs two views over the same events and pairs their output states.
    pub fn rproduct<So2: 'a>(self, other: View<'a, Si, So2, E>) -> View<'a, Si, (So, So2), E> {
        let View {
            evolve,
            initial_state,
        } = self;
        let View {
            evolve: other_evolve,
            initial_state: other_initial_state,
        } = other;
        View {
            evolve: Box::new(move |state: &Si, event: &E| {
                (evolve(state, event), other_evolve(state, event))
            }),
            initial_state: Box::new(move || (initial_state(), other_initial_state())),
        }
    }
}

impl<'a, Si: 'a, So, E: 'a> View<'a, Si, So, E>
where
    So: Clone + Send + Sync + 'a,
{
    /// Lifts a constant into a view that ignores every event.
    pub fn rjust(value: So) -> Self {
        let evolved = value.clone();
        View {
            evolve: Box::new(move |_: &Si, _: &E| evolved.clone()),
            initial_state: Box::new(move || value.clone()),
        }
    }
}

impl<'a, S1, E1: 'a> View<'a, S1, S1, E1>
where
    S1: Clone + 'a,
{
    /// Combines two views over disjoint event domains, pairing their states.
    pub fn combine<S2, E2: 'a>(
        self,
        other: View<'a, S2, S2, E2>,
    ) -> View<'a, (S1, S2), (S1, S2), Sum<E1, E2>>
    where
        S2: Clone + 'a,
    {
        let View {
            evolve,
            initial_state,
        } = self;
        let View {
            evolve: other_evolve,
            initial_state: other_initial_state,
        } = other;
        View {
            evolve: Box::new(move |state: &(S1, S2), event: &Sum<E1, E2>| match event {
                Sum::First(e) => (evolve(&state.0, e), state.1.clone()),
                Sum::Second(e) => (state.0.clone(), other_evolve(&state.1, e)),
            }),
            initial_state: Box::new(move || (initial_state(), other_initial_state())),
        }
    }
}

impl<'a, S1: 'a, E1: 'a> View<'a, S1, S1, E1> {
    /// Folds `events` into `state`.
    pub fn compute_new_state<'e, I>(&self, state: S1, events: I) -> S1
    where
        I: IntoIterator<Item = &'e E1>,
        E1: 'e,
    {
        events
            .into_iter()
            .fold(state, |state, event| (self.evolve)(&state, event))
    }

    /// Folds `events` starting from the initial state.
    pub fn replay<'e, I>(&self, events: I) -> S1
    where
        I: IntoIterator<Item = &'e E1>,
        E1: 'e,
    {
        self.compute_new_state((self.initial_state)(), events)
    }
}

impl<'a> View<'a, (), (), Infallible> {
    /// The identity element of [`View::combine`].
    pub fn identity() -> Self {
        View {
            evolve: Box::new(|_: &(), event: &Infallible| -> () { match *event {} }),
            initial_state: Box::new(|| ()),
        }
    }
}

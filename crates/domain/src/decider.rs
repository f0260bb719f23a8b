//! The decider: commands become events, events become state.

use std::convert::Infallible;
use std::sync::Arc;

use common::Sum;

use crate::{DecideFunction, EvolveFunction, InitialStateFunction, IsTerminalFunction};

/// Pure decision-making component.
///
/// - `C` - command
/// - `Si` / `So` - state consumed / state produced
/// - `Ei` / `Eo` - event consumed by `evolve` / event produced by `decide`
///
/// All four functions must be pure and total. Business rejection is modeled
/// by `decide` returning no events, or by `is_terminal` flagging a state that
/// accepts no further commands. A decider is built once and never mutated;
/// every operator below consumes its operands and returns a new decider.
pub struct Decider<'a, C: 'a, Si: 'a, So: 'a, Ei: 'a, Eo: 'a> {
    pub decide: DecideFunction<'a, C, Si, Eo>,
    pub evolve: EvolveFunction<'a, Si, Ei, So>,
    pub initial_state: InitialStateFunction<'a, So>,
    pub is_terminal: IsTerminalFunction<'a, Si>,
}

/// A decider whose input and output types coincide.
pub type IDecider<'a, C, S, E> = Decider<'a, C, S, S, E, E>;

impl<'a, C: 'a, Si: 'a, So: 'a, Ei: 'a, Eo: 'a> Decider<'a, C, Si, So, Ei, Eo> {
    /// Builds a decider that never reaches a terminal state.
    pub fn new<D, V, I>(decide: D, evolve: V, initial_state: I) -> Self
    where
        D: Fn(&C, &Si) -> Vec<Eo> + Send + Sync + 'a,
        V: Fn(&Si, &Ei) -> So + Send + Sync + 'a,
        I: Fn() -> So + Send + Sync + 'a,
    {
        Self {
            decide: Box::new(decide),
            evolve: Box::new(evolve),
            initial_state: Box::new(initial_state),
            is_terminal: Box::new(|_: &Si| false),
        }
    }

    /// Replaces the terminal-state predicate.
    pub fn with_terminal<T>(self, is_terminal: T) -> Self
    where
        T: Fn(&Si) -> bool + Send + Sync + 'a,
    {
        Self {
            is_terminal: Box::new(is_terminal),
            ..self
        }
    }

    /// Contravariant map on the command: precomposes `decide` only.
    pub fn map_command<Cn: 'a, F>(self, f: F) -> Decider<'a, Cn, Si, So, Ei, Eo>
    where
        F: Fn(&Cn) -> C + Send + Sync + 'a,
    {
        let decide = self.decide;
        Decider {
            decide: Box::new(move |command: &Cn, state: &Si| decide(&f(command), state)),
            evolve: self.evolve,
            initial_state: self.initial_state,
            is_terminal: self.is_terminal,
        }
    }

    /// Profunctor map on the event.
    ///
    /// `fl` adapts events fed to `evolve`, `fr` adapts events produced by
    /// `decide`.
    pub fn dimap_on_event<Ein: 'a, Eon: 'a, Fl, Fr>(
        self,
        fl: Fl,
        fr: Fr,
    ) -> Decider<'a, C, Si, So, Ein, Eon>
    where
        Fl: Fn(&Ein) -> Ei + Send + Sync + 'a,
        Fr: Fn(&Eo) -> Eon + Send + Sync + 'a,
    {
        let decide = self.decide;
        let evolve = self.evolve;
        Decider {
            decide: Box::new(move |command: &C, state: &Si| -> Vec<Eon> {
                decide(command, state).iter().map(&fr).collect()
            }),
            evolve: Box::new(move |state: &Si, event: &Ein| evolve(state, &fl(event))),
            initial_state: self.initial_state,
            is_terminal: self.is_terminal,
        }
    }

    /// Profunctor map on the state.
    ///
    /// `fl` precomposes every state input (`decide`, `evolve`,
    /// `is_terminal`); `fr` postcomposes every state output (`evolve`,
    /// `initial_state`).
    pub fn dimap_on_state<Sin: 'a, Son: 'a, Fl, Fr>(
        self,
        fl: Fl,
        fr: Fr,
    ) -> Decider<'a, C, Sin, Son, Ei, Eo>
    where
        Fl: Fn(&Sin) -> Si + Send + Sync + 'a,
        Fr: Fn(&So) -> Son + Send + Sync + 'a,
    {
        let Decider {
            decide,
            evolve,
            initial_state,
            is_terminal,
        } = self;
        let fl = Arc::new(fl);
        let fr = Arc::new(fr);
        let (fl_evolve, fl_terminal) = (Arc::clone(&fl), Arc::clone(&fl));
        let fr_initial = Arc::clone(&fr);

        Decider {
            decide: Box::new(move |command: &C, state: &Sin| decide(command, &fl(state))),
            evolve: Box::new(move |state: &Sin, event: &Ei| {
                fr(&evolve(&fl_evolve(state), event))
            }),
            initial_state: Box::new(move || fr_initial(&initial_state())),
            is_terminal: Box::new(move |state: &Sin| is_terminal(&fl_terminal(state))),
        }
    }

    /// Covariant map on the output state.
    pub fn map_state<Son: 'a, F>(self, f: F) -> Decider<'a, C, Si, Son, Ei, Eo>
    where
        F: Fn(&So) -> Son + Send + Sync + 'a,
    {
        let evolve = self.evolve;
        let initial_state = self.initial_state;
        let f = Arc::new(f);
        let f_initial = Arc::clone(&f);
        Decider {
            decide: self.decide,
            evolve: Box::new(move |state: &Si, event: &Ei| f(&evolve(state, event))),
            initial_state: Box::new(move || f_initial(&initial_state())),
            is_terminal: self.is_terminal,
        }
    }

    /// Applies a decider carrying functions over the output state.
    ///
    /// Decisions are concatenated (this decider's first), the carried
    /// function is applied to this decider's state pointwise, and the result
    /// is terminal as soon as either side is.
    pub fn rapply<Son: 'a, F: 'a>(
        self,
        ff: Decider<'a, C, Si, F, Ei, Eo>,
    ) -> Decider<'a, C, Si, Son, Ei, Eo>
    where
        F: Fn(&So) -> Son,
    {
        let Decider {
            decide,
            evolve,
            initial_state,
            is_terminal,
        } = self;
        let Decider {
            decide: f_decide,
            evolve: f_evolve,
            initial_state: f_initial_state,
            is_terminal: f_is_terminal,
        } = ff;

        Decider {
            decide: Box::new(move |command: &C, state: &Si| {
                let mut events = decide(command, state);
                events.extend(f_decide(command, state));
                events
            }),
            evolve: Box::new(move |state: &Si, event: &Ei| {
                let f = f_evolve(state, event);
                f(&evolve(state, event))
            }),
            initial_state: Box::new(move || {
                let f = f_initial_state();
                f(&initial_state())
            }),
            is_terminal: Box::new(move |state: &Si| is_terminal(state) || f_is_terminal(state)),
        }
    }

    /// Runs two deciders over the same inputs and pairs their output states.
    pub fn rproduct<So2: 'a>(
        self,
        other: Decider<'a, C, Si, So2, Ei, Eo>,
    ) -> Decider<'a, C, Si, (So, So2), Ei, Eo> {
        let Decider {
            decide,
            evolve,
            initial_state,
            is_terminal,
        } = self;
        let Decider {
            decide: other_decide,
            evolve: other_evolve,
            initial_state: other_initial_state,
            is_terminal: other_is_terminal,
        } = other;

        Decider {
            decide: Box::new(move |command: &C, state: &Si| {
                let mut events = decide(command, state);
                events.extend(other_decide(command, state));
                events
            }),
            evolve: Box::new(move |state: &Si, event: &Ei| {
                (evolve(state, event), other_evolve(state, event))
            }),
            initial_state: Box::new(move || (initial_state(), other_initial_state())),
            is_terminal: Box::new(move |state: &Si| {
                is_terminal(state) || other_is_terminal(state)
            }),
        }
    }
}

impl<'a, C: 'a, Si: 'a, So, Ei: 'a, Eo: 'a> Decider<'a, C, Si, So, Ei, Eo>
where
    So: Clone + Send + Sync + 'a,
{
    /// Lifts a constant into a decider that never decides anything and
    /// always evolves to `value`.
    pub fn rjust(value: So) -> Self {
        let evolved = value.clone();
        Decider {
            decide: Box::new(|_: &C, _: &Si| Vec::<Eo>::new()),
            evolve: Box::new(move |_: &Si, _: &Ei| evolved.clone()),
            initial_state: Box::new(move || value.clone()),
            is_terminal: Box::new(|_: &Si| false),
        }
    }
}

impl<'a, C1: 'a, S1, Ei1: 'a, Eo1: 'a> Decider<'a, C1, S1, S1, Ei1, Eo1>
where
    S1: Clone + 'a,
{
    /// Combines two deciders over disjoint command and event domains.
    ///
    /// The state is the pair of both states; commands and events are tagged
    /// with [`Sum`] and each is routed to the matching side only, the other
    /// side's state passing through untouched. The combined state is terminal
    /// only when both sides are.
    #[allow(clippy::type_complexity)]
    pub fn combine<C2: 'a, S2, Ei2: 'a, Eo2: 'a>(
        self,
        other: Decider<'a, C2, S2, S2, Ei2, Eo2>,
    ) -> Decider<'a, Sum<C1, C2>, (S1, S2), (S1, S2), Sum<Ei1, Ei2>, Sum<Eo1, Eo2>>
    where
        S2: Clone + 'a,
    {
        let Decider {
            decide,
            evolve,
            initial_state,
            is_terminal,
        } = self;
        let Decider {
            decide: other_decide,
            evolve: other_evolve,
            initial_state: other_initial_state,
            is_terminal: other_is_terminal,
        } = other;

        Decider {
            decide: Box::new(
                move |command: &Sum<C1, C2>, state: &(S1, S2)| -> Vec<Sum<Eo1, Eo2>> {
                    match command {
                        Sum::First(c) => decide(c, &state.0).into_iter().map(Sum::First).collect(),
                        Sum::Second(c) => other_decide(c, &state.1)
                            .into_iter()
                            .map(Sum::Second)
                            .collect(),
                    }
                },
            ),
            evolve: Box::new(
                move |state: &(S1, S2), event: &Sum<Ei1, Ei2>| match event {
                    Sum::First(e) => (evolve(&state.0, e), state.1.clone()),
                    Sum::Second(e) => (state.0.clone(), other_evolve(&state.1, e)),
                },
            ),
            initial_state: Box::new(move || (initial_state(), other_initial_state())),
            is_terminal: Box::new(move |state: &(S1, S2)| {
                is_terminal(&state.0) && other_is_terminal(&state.1)
            }),
        }
    }
}

impl<'a, C: 'a, S: 'a, Ei: 'a, Eo: 'a> Decider<'a, C, S, S, Ei, Eo> {
    /// Folds `events` into `state`.
    pub fn compute_new_state<'e, I>(&self, state: S, events: I) -> S
    where
        I: IntoIterator<Item = &'e Ei>,
        Ei: 'e,
    {
        events
            .into_iter()
            .fold(state, |state, event| (self.evolve)(&state, event))
    }

    /// Folds `events` starting from the initial state.
    pub fn replay<'e, I>(&self, events: I) -> S
    where
        I: IntoIterator<Item = &'e Ei>,
        Ei: 'e,
    {
        self.compute_new_state((self.initial_state)(), events)
    }
}

impl<'a> Decider<'a, Infallible, (), (), Infallible, Infallible> {
    /// The identity element of [`Decider::combine`]: no command or event can
    /// reach it and its unit state is always terminal.
    pub fn identity() -> Self {
        Decider {
            decide: Box::new(|command: &Infallible, _: &()| -> Vec<Infallible> {
                match *command {}
            }),
            evolve: Box::new(|_: &(), event: &Infallible| -> () { match *event {} }),
            initial_state: Box::new(|| ()),
            is_terminal: Box::new(|_: &()| true),
        }
    }
}

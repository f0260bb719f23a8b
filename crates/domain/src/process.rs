//! The process: a saga with durable state.

use std::sync::Arc;

use crate::{
    DecideFunction, EvolveFunction, InitialStateFunction, IsTerminalFunction, PendingFunction,
    StatefulReactFunction,
};

/// Stateful generalization of [`crate::Saga`].
///
/// - `AR` - action result
/// - `Si` / `So` - state consumed / state produced
/// - `Ei` / `Eo` - event consumed by `evolve`/`react` / event produced by `ingest`
/// - `A` - action
///
/// `ingest` records what an action result means for the process as events,
/// `evolve` folds them into state, `react` derives the actions owed for each
/// ingested event. `pending` recomputes the actions still owed from the
/// durable state alone, so a crash between saving and publishing loses
/// nothing.
pub struct Process<'a, AR: 'a, Si: 'a, So: 'a, Ei: 'a, Eo: 'a, A: 'a> {
    pub ingest: DecideFunction<'a, AR, Si, Eo>,
    pub evolve: EvolveFunction<'a, Si, Ei, So>,
    pub react: StatefulReactFunction<'a, Si, Ei, A>,
    pub pending: PendingFunction<'a, Si, A>,
    pub initial_state: InitialStateFunction<'a, So>,
    pub is_terminal: IsTerminalFunction<'a, Si>,
}

/// A process whose input and output types coincide.
pub type IProcess<'a, AR, S, E, A> = Process<'a, AR, S, S, E, E, A>;

impl<'a, AR: 'a, Si: 'a, So: 'a, Ei: 'a, Eo: 'a, A: 'a> Process<'a, AR, Si, So, Ei, Eo, A> {
    /// Builds a process that never reaches a terminal state.
    pub fn new<G, V, R, P, I>(ingest: G, evolve: V, react: R, pending: P, initial_state: I) -> Self
    where
        G: Fn(&AR, &Si) -> Vec<Eo> + Send + Sync + 'a,
        V: Fn(&Si, &Ei) -> So + Send + Sync + 'a,
        R: Fn(&Si, &Ei) -> Vec<A> + Send + Sync + 'a,
        P: Fn(&Si) -> Vec<A> + Send + Sync + 'a,
        I: Fn() -> So + Send + Sync + 'a,
    {
        Self {
            ingest: Box::new(ingest),
            evolve: Box::new(evolve),
            react: Box::new(react),
            pending: Box::new(pending),
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

    /// Contravariant map on the action result.
    pub fn map_action_result<ARn: 'a, F>(self, f: F) -> Process<'a, ARn, Si, So, Ei, Eo, A>
    where
        F: Fn(&ARn) -> AR + Send + Sync + 'a,
    {
        let ingest = self.ingest;
        Process {
            ingest: Box::new(move |action_result: &ARn, state: &Si| {
                ingest(&f(action_result), state)
            }),
            evolve: self.evolve,
            react: self.react,
            pending: self.pending,
            initial_state: self.initial_state,
            is_terminal: self.is_terminal,
        }
    }

    /// Covariant map on the action.
    pub fn map_action<An: 'a, F>(self, f: F) -> Process<'a, AR, Si, So, Ei, Eo, An>
    where
        F: Fn(&A) -> An + Send + Sync + 'a,
    {
        let react = self.react;
        let pending = self.pending;
        let f = Arc::new(f);
        let f_pending = Arc::clone(&f);
        Process {
            ingest: self.ingest,
            evolve: self.evolve,
            react: Box::new(move |state: &Si, event: &Ei| -> Vec<An> {
                react(state, event).iter().map(|a| f(a)).collect()
            }),
            pending: Box::new(move |state: &Si| -> Vec<An> {
                pending(state).iter().map(|a| f_pending(a)).collect()
            }),
            initial_state: self.initial_state,
            is_terminal: self.is_terminal,
        }
    }

    /// Profunctor map on the event.
    pub fn dimap_on_event<Ein: 'a, Eon: 'a, Fl, Fr>(
        self,
        fl: Fl,
        fr: Fr,
    ) -> Process<'a, AR, Si, So, Ein, Eon, A>
    where
        Fl: Fn(&Ein) -> Ei + Send + Sync + 'a,
        Fr: Fn(&Eo) -> Eon + Send + Sync + 'a,
    {
        let Process {
            ingest,
            evolve,
            react,
            pending,
            initial_state,
            is_terminal,
        } = self;
        let fl = Arc::new(fl);
        let fl_react = Arc::clone(&fl);
        Process {
            ingest: Box::new(move |action_result: &AR, state: &Si| -> Vec<Eon> {
                ingest(action_result, state).iter().map(&fr).collect()
            }),
            evolve: Box::new(move |state: &Si, event: &Ein| evolve(state, &fl(event))),
            react: Box::new(move |state: &Si, event: &Ein| react(state, &fl_react(event))),
            pending,
            initial_state,
            is_terminal,
        }
    }

    /// Profunctor map on the state.
    pub fn dimap_on_state<Sin: 'a, Son: 'a, Fl, Fr>(
        self,
        fl: Fl,
        fr: Fr,
    ) -> Process<'a, AR, Sin, Son, Ei, Eo, A>
    where
        Fl: Fn(&Sin) -> Si + Send + Sync + 'a,
        Fr: Fn(&So) -> Son + Send + Sync + 'a,
    {
        let Process {
            ingest,
            evolve,
            react,
            pending,
            initial_state,
            is_terminal,
        } = self;
        let fl = Arc::new(fl);
        let fr = Arc::new(fr);
        let fl_evolve = Arc::clone(&fl);
        let fl_react = Arc::clone(&fl);
        let fl_pending = Arc::clone(&fl);
        let fl_terminal = Arc::clone(&fl);
        let fr_initial = Arc::clone(&fr);
        Process {
            ingest: Box::new(move |action_result: &AR, state: &Sin| {
                ingest(action_result, &fl(state))
            }),
            evolve: Box::new(move |state: &Sin, event: &Ei| {
                fr(&evolve(&fl_evolve(state), event))
            }),
            react: Box::new(move |state: &Sin, event: &Ei| react(&fl_react(state), event)),
            pending: Box::new(move |state: &Sin| pending(&fl_pending(state))),
            initial_state: Box::new(move || fr_initial(&initial_state())),
            is_terminal: Box::new(move |state: &Sin| is_terminal(&fl_terminal(state))),
        }
    }

    /// Applies a process carrying functions over the output state.
    ///
    /// Ingested events, reactions and pending actions are concatenated, this
    /// process's first.
    pub fn rapply<Son: 'a, F: 'a>(
        self,
        ff: Process<'a, AR, Si, F, Ei, Eo, A>,
    ) -> Process<'a, AR, Si, Son, Ei, Eo, A>
    where
        F: Fn(&So) -> Son,
    {
        let Process {
            ingest,
            evolve,
            react,
            pending,
            initial_state,
            is_terminal,
        } = self;
        let Process {
            ingest: f_ingest,
            evolve: f_evolve,
            react: f_react,
            pending: f_pending,
            initial_state: f_initial_state,
            is_terminal: f_is_terminal,
        } = ff;
        Process {
            ingest: Box::new(move |action_result: &AR, state: &Si| {
                let mut events = ingest(action_result, state);
                events.extend(f_ingest(action_result, state));
                events
            }),
            evolve: Box::new(move |state: &Si, event: &Ei| {
                let f = f_evolve(state, event);
                f(&evolve(state, event))
            }),
            react: Box::new(move |state: &Si, event: &Ei| {
                let mut actions = react(state, event);
                actions.extend(f_react(state, event));
                actions
            }),
            pending: Box::new(move |state: &Si| {
                let mut actions = pending(state);
                actions.extend(f_pending(state));
                actions
            }),
            initial_state: Box::new(move || {
                let f = f_initial_state();
                f(&initial_state())
            }),
            is_terminal: Box::new(move |state: &Si| is_terminal(state) || f_is_terminal(state)),
        }
    }

    /// Runs two processes over the same inputs and pairs their output states.
    pub fn rproduct<So2: 'a>(
        self,
        other: Process<'a, AR, Si, So2, Ei, Eo, A>,
    ) -> Process<'a, AR, Si, (So, So2), Ei, Eo, A> {
        let Process {
            ingest,
            evolve,
            react,
            pending,
            initial_state,
            is_terminal,
        } = self;
        let Process {
            ingest: other_ingest,
            evolve: other_evolve,
            react: other_react,
            pending: other_pending,
            initial_state: other_initial_state,
            is_terminal: other_is_terminal,
        } = other;
        Process {
            ingest: Box::new(move |action_result: &AR, state: &Si| {
                let mut events = ingest(action_result, state);
                events.extend(other_ingest(action_result, state));
                events
            }),
            evolve: Box::new(move |state: &Si, event: &Ei| {
                (evolve(state, event), other_evolve(state, event))
            }),
            react: Box::new(move |state: &Si, event: &Ei| {
                let mut actions = react(state, event);
                actions.extend(other_react(state, event));
                actions
            }),
            pending: Box::new(move |state: &Si| {
                let mut actions = pending(state);
                actions.extend(other_pending(state));
                actions
            }),
            initial_state: Box::new(move || (initial_state(), other_initial_state())),
            is_terminal: Box::new(move |state: &Si| {
                is_terminal(state) || other_is_terminal(state)
            }),
        }
    }
}

impl<'a, AR: 'a, Si: 'a, So, Ei: 'a, Eo: 'a, A: 'a> Process<'a, AR, Si, So, Ei, Eo, A>
where
    So: Clone + Send + Sync + 'a,
{
    /// Lifts a constant into a process that ingests, reacts and owes nothing.
    pub fn rjust(value: So) -> Self {
        let evolved = value.clone();
        Process {
            ingest: Box::new(|_: &AR, _: &Si| Vec::<Eo>::new()),
            evolve: Box::new(move |_: &Si, _: &Ei| evolved.clone()),
            react: Box::new(|_: &Si, _: &Ei| Vec::<A>::new()),
            pending: Box::new(|_: &Si| Vec::<A>::new()),
            initial_state: Box::new(move || value.clone()),
            is_terminal: Box::new(|_: &Si| false),
        }
    }
}

impl<'a, AR: 'a, S1: 'a, Ei: 'a, Eo: 'a, A: 'a> Process<'a, AR, S1, S1, Ei, Eo, A> {
    /// Combines two processes sharing action results, events and actions,
    /// pairing their states.
    ///
    /// Both sides observe every action result and every event; ingested
    /// events, reactions and pending actions are concatenated. The combined
    /// process is terminal only when both sides are.
    pub fn combine<S2: 'a>(
        self,
        other: Process<'a, AR, S2, S2, Ei, Eo, A>,
    ) -> Process<'a, AR, (S1, S2), (S1, S2), Ei, Eo, A> {
        let Process {
            ingest,
            evolve,
            react,
            pending,
            initial_state,
            is_terminal,
        } = self;
        let Process {
            ingest: other_ingest,
            evolve: other_evolve,
            react: other_react,
            pending: other_pending,
            initial_state: other_initial_state,
            is_terminal: other_is_terminal,
        } = other;
        Process {
            ingest: Box::new(move |action_result: &AR, state: &(S1, S2)| {
                let mut events = ingest(action_result, &state.0);
                events.extend(other_ingest(action_result, &state.1));
                events
            }),
            evolve: Box::new(move |state: &(S1, S2), event: &Ei| {
                (evolve(&state.0, event), other_evolve(&state.1, event))
            }),
            react: Box::new(move |state: &(S1, S2), event: &Ei| {
                let mut actions = react(&state.0, event);
                actions.extend(other_react(&state.1, event));
                actions
            }),
            pending: Box::new(move |state: &(S1, S2)| {
                let mut actions = pending(&state.0);
                actions.extend(other_pending(&state.1));
                actions
            }),
            initial_state: Box::new(move || (initial_state(), other_initial_state())),
            is_terminal: Box::new(move |state: &(S1, S2)| {
                is_terminal(&state.0) && other_is_terminal(&state.1)
            }),
        }
    }
}

impl<'a, AR: 'a, S: 'a, Ei: 'a, Eo: 'a, A: 'a> Process<'a, AR, S, S, Ei, Eo, A> {
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
}

impl<'a, AR: 'a, Ei: 'a, Eo: 'a, A: 'a> Process<'a, AR, (), (), Ei, Eo, A> {
    /// The identity element of [`Process::combine`].
    pub fn identity() -> Self {
        Process {
            ingest: Box::new(|_: &AR, _: &()| Vec::<Eo>::new()),
            evolve: Box::new(|_: &(), _: &Ei| ()),
            react: Box::new(|_: &(), _: &Ei| Vec::<A>::new()),
            pending: Box::new(|_: &()| Vec::<A>::new()),
            initial_state: Box::new(|| ()),
            is_terminal: Box::new(|_: &()| true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Payment result for an order.
    #[derive(Debug, Clone, PartialEq)]
    enum PaymentResult {
        Paid(u32),
        Refunded(u32),
    }

    #[derive(Debug, Clone, PartialEq)]
    enum FulfillmentEvent {
        ShipmentOwed(u32),
        Closed(u32),
    }

    #[derive(Debug, Clone, PartialEq)]
    enum ShippingCommand {
        Ship(u32),
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Fulfillment {
        owed: Vec<u32>,
        closed: bool,
    }

    fn fulfillment<'a>() -> IProcess<'a, PaymentResult, Fulfillment, FulfillmentEvent, ShippingCommand>
    {
        Process::new(
            |result: &PaymentResult, _: &Fulfillment| match result {
                PaymentResult::Paid(order) => vec![FulfillmentEvent::ShipmentOwed(*order)],
                PaymentResult::Refunded(order) => vec![FulfillmentEvent::Closed(*order)],
            },
            |state: &Fulfillment, event: &FulfillmentEvent| {
                let mut next = state.clone();
                match event {
                    FulfillmentEvent::ShipmentOwed(order) => next.owed.push(*order),
                    FulfillmentEvent::Closed(order) => {
                        next.owed.retain(|owed| owed != order);
                        next.closed = true;
                    }
                }
                next
            },
            |_: &Fulfillment, event: &FulfillmentEvent| match event {
                FulfillmentEvent::ShipmentOwed(order) => vec![ShippingCommand::Ship(*order)],
                FulfillmentEvent::Closed(_) => vec![],
            },
            |state: &Fulfillment| state.owed.iter().map(|o| ShippingCommand::Ship(*o)).collect(),
            Fulfillment::default,
        )
        .with_terminal(|state: &Fulfillment| state.closed)
    }

    #[test]
    fn ingest_evolve_react_cycle() {
        let process = fulfillment();
        let state = (process.initial_state)();
        let events = (process.ingest)(&PaymentResult::Paid(7), &state);
        let state = process.compute_new_state(state, &events);

        let actions: Vec<_> = events
            .iter()
            .flat_map(|event| (process.react)(&state, event))
            .collect();
        assert_eq!(actions, vec![ShippingCommand::Ship(7)]);
        assert_eq!((process.pending)(&state), actions);
    }

    #[test]
    fn pending_is_derived_from_state_alone() {
        let process = fulfillment();
        let state = Fulfillment {
            owed: vec![1, 2],
            closed: false,
        };
        assert_eq!(
            (process.pending)(&state),
            vec![ShippingCommand::Ship(1), ShippingCommand::Ship(2)]
        );
    }

    #[test]
    fn map_action_applies_to_react_and_pending() {
        let process = fulfillment().map_action(|ShippingCommand::Ship(order): &ShippingCommand| *order);
        let state = Fulfillment {
            owed: vec![4],
            closed: false,
        };
        assert_eq!((process.pending)(&state), vec![4]);
        assert_eq!(
            (process.react)(&state, &FulfillmentEvent::ShipmentOwed(5)),
            vec![5]
        );
    }

    #[test]
    fn map_action_result_precomposes_ingest() {
        let process = fulfillment().map_action_result(|order: &u32| PaymentResult::Paid(*order));
        assert_eq!(
            (process.ingest)(&3, &Fulfillment::default()),
            vec![FulfillmentEvent::ShipmentOwed(3)]
        );
    }

    #[test]
    fn dimap_on_state_wraps_every_state_access() {
        let process = fulfillment().dimap_on_state(
            |owed: &Vec<u32>| Fulfillment {
                owed: owed.clone(),
                closed: false,
            },
            |state: &Fulfillment| state.owed.clone(),
        );
        assert!((process.initial_state)().is_empty());
        assert_eq!(
            (process.evolve)(&vec![1], &FulfillmentEvent::ShipmentOwed(2)),
            vec![1, 2]
        );
        assert_eq!((process.pending)(&vec![9]), vec![ShippingCommand::Ship(9)]);
    }

    #[test]
    fn combine_pairs_states_and_concatenates_actions() {
        let process = fulfillment().combine(fulfillment());
        let state = (process.initial_state)();
        let events = (process.ingest)(&PaymentResult::Paid(1), &state);
        assert_eq!(events.len(), 2);

        let state = process.compute_new_state(state, &events);
        assert_eq!(state.0.owed, vec![1, 1]);
        assert_eq!(state.1.owed, vec![1, 1]);
        assert!(!(process.is_terminal)(&state));
    }

    #[test]
    fn rproduct_shares_inputs() {
        let process = fulfillment().rproduct(Process::rjust(0u8));
        let (fulfillment, constant) =
            (process.evolve)(&Fulfillment::default(), &FulfillmentEvent::ShipmentOwed(3));
        assert_eq!(fulfillment.owed, vec![3]);
        assert_eq!(constant, 0);
    }

    type OwedCount = Box<dyn Fn(&Fulfillment) -> usize + Send + Sync>;

    #[test]
    fn rapply_concatenates_outputs_and_applies_state_function() {
        let counter: Process<
            '_,
            PaymentResult,
            Fulfillment,
            OwedCount,
            FulfillmentEvent,
            FulfillmentEvent,
            ShippingCommand,
        > = Process::new(
            |result: &PaymentResult, _: &Fulfillment| match result {
                PaymentResult::Paid(order) => vec![FulfillmentEvent::Closed(order + 100)],
                PaymentResult::Refunded(_) => vec![],
            },
            |_: &Fulfillment, _: &FulfillmentEvent| -> OwedCount {
                Box::new(|state: &Fulfillment| state.owed.len())
            },
            |_: &Fulfillment, event: &FulfillmentEvent| match event {
                FulfillmentEvent::ShipmentOwed(order) => vec![ShippingCommand::Ship(order + 100)],
                FulfillmentEvent::Closed(_) => vec![],
            },
            |state: &Fulfillment| {
                if state.owed.is_empty() {
                    vec![]
                } else {
                    vec![ShippingCommand::Ship(0)]
                }
            },
            || -> OwedCount { Box::new(|state: &Fulfillment| state.owed.len() + 10) },
        )
        .with_terminal(|state: &Fulfillment| state.owed.len() > 2);

        let process = fulfillment().rapply(counter);
        let empty = Fulfillment::default();

        assert_eq!((process.initial_state)(), 10);
        assert_eq!(
            (process.ingest)(&PaymentResult::Paid(7), &empty),
            vec![FulfillmentEvent::ShipmentOwed(7), FulfillmentEvent::Closed(107)]
        );
        assert_eq!(
            (process.evolve)(&empty, &FulfillmentEvent::ShipmentOwed(3)),
            1
        );
        assert_eq!(
            (process.react)(&empty, &FulfillmentEvent::ShipmentOwed(3)),
            vec![ShippingCommand::Ship(3), ShippingCommand::Ship(103)]
        );
        assert_eq!(
            (process.pending)(&Fulfillment {
                owed: vec![1],
                closed: false,
            }),
            vec![ShippingCommand::Ship(1), ShippingCommand::Ship(0)]
        );

        assert!(!(process.is_terminal)(&empty));
        assert!((process.is_terminal)(&Fulfillment {
            owed: vec![],
            closed: true,
        }));
        assert!((process.is_terminal)(&Fulfillment {
            owed: vec![1, 2, 3],
            closed: false,
        }));
    }

    #[test]
    fn rjust_ingests_reacts_and_owes_nothing() {
        let process: Process<
            '_,
            PaymentResult,
            Fulfillment,
            &str,
            FulfillmentEvent,
            FulfillmentEvent,
            ShippingCommand,
        > = Process::rjust("idle");
        let owing = Fulfillment {
            owed: vec![1],
            closed: true,
        };

        assert_eq!((process.initial_state)(), "idle");
        assert_eq!(
            (process.evolve)(&owing, &FulfillmentEvent::ShipmentOwed(2)),
            "idle"
        );
        assert!((process.ingest)(&PaymentResult::Paid(1), &owing).is_empty());
        assert!((process.react)(&owing, &FulfillmentEvent::ShipmentOwed(2)).is_empty());
        assert!((process.pending)(&owing).is_empty());
        assert!(!(process.is_terminal)(&owing));
    }

    #[test]
    fn identity_owes_nothing() {
        let identity: IProcess<'_, PaymentResult, (), FulfillmentEvent, ShippingCommand> =
            Process::identity();
        assert!((identity.ingest)(&PaymentResult::Paid(1), &()).is_empty());
        assert!((identity.pending)(&()).is_empty());
        assert!((identity.is_terminal)(&()));
    }
}

//! Domain layer: pure decision and evolution algebra.
//!
//! This crate provides the pure computations and their composition operators:
//! - [`Decider`] turns commands into events and events into state
//! - [`View`] projects events into denormalized read state
//! - [`Saga`] maps action results to new actions, statelessly
//! - [`Process`] is a saga with durable state and crash-recoverable pending actions
//!
//! Nothing here performs I/O or fails for well-typed inputs. The effectful
//! orchestration lives in the `application` crate.

pub mod decider;
pub mod process;
pub mod saga;
pub mod view;

pub use common::Sum;
pub use decider::{Decider, IDecider};
pub use process::{IProcess, Process};
pub use saga::Saga;
pub use view::{IView, View};

/// Decides which events to produce from a command (or action result) and the current state.
pub type DecideFunction<'a, C, S, E> = Box<dyn Fn(&C, &S) -> Vec<E> + Send + Sync + 'a>;
/// Evolves the state by one event.
pub type EvolveFunction<'a, Si, E, So> = Box<dyn Fn(&Si, &E) -> So + Send + Sync + 'a>;
/// Produces the initial state.
pub type InitialStateFunction<'a, S> = Box<dyn Fn() -> S + Send + Sync + 'a>;
/// Flags states that accept no further input.
pub type IsTerminalFunction<'a, S> = Box<dyn Fn(&S) -> bool + Send + Sync + 'a>;
/// Maps an action result to the next actions.
pub type ReactFunction<'a, AR, A> = Box<dyn Fn(&AR) -> Vec<A> + Send + Sync + 'a>;
/// Maps a state and an ingested event to the next actions.
pub type StatefulReactFunction<'a, S, E, A> = Box<dyn Fn(&S, &E) -> Vec<A> + Send + Sync + 'a>;
/// Recovers the actions still owed by a durable state.
pub type PendingFunction<'a, S, A> = Box<dyn Fn(&S) -> Vec<A> + Send + Sync + 'a>;

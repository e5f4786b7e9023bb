//! Linprobe Generator - Scenario generation for linearizability runs.
//!
//! - [`param`]: Parameter generators and the [`ParamBinder`] that turns an
//!   operation declaration into a concrete [`Invocation`](linprobe_core::Invocation)
//! - [`actor`]: The [`ActorGenerator`] producing one actor per worker thread
//!
//! All randomness flows from a caller-supplied RNG, so a run seeded with
//! the same value generates the same scenarios.

pub mod actor;
pub mod param;

pub use actor::ActorGenerator;
pub use param::{
    build_generator, BoolGen, ChoiceGen, IntGen, ParamBinder, ParameterGenerator, StringGen,
};

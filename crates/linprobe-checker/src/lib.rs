//! Linprobe Checker - Linearizability verification.
//!
//! This crate decides whether a recorded [`History`](linprobe_core::History)
//! is linearizable with respect to a sequential [`Model`]:
//!
//! - [`model`]: The [`Model`] trait and [`SequentialSpec`], a table-driven
//!   model built from plain closures over a state value
//! - [`linearizability`]: The [`LinearizabilityChecker`], a memoized
//!   depth-first search for a sequential witness
//! - [`verdict`]: [`Verdict`], [`Witness`] and [`SearchStats`]
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeSet;
//!
//! use linprobe_checker::{LinearizabilityChecker, SequentialSpec};
//! use linprobe_core::{ActorId, Event, History, Invocation, Outcome, Timestamp};
//! use serde_json::json;
//!
//! let model = SequentialSpec::new("set", BTreeSet::<i64>::new())
//!     .operation("add", |set, (key,): (i64,)| Ok(set.insert(key)));
//!
//! // Two overlapping add(1) calls that both report success.
//! let history = History::from_events(vec![
//!     Event::invoke(ActorId(0), 0, Invocation::new("add", vec![json!(1)]), Timestamp(0)),
//!     Event::invoke(ActorId(1), 0, Invocation::new("add", vec![json!(1)]), Timestamp(1)),
//!     Event::response(ActorId(0), 0, Outcome::ok(json!(true)), Timestamp(2)),
//!     Event::response(ActorId(1), 0, Outcome::ok(json!(true)), Timestamp(3)),
//! ]);
//!
//! let verdict = LinearizabilityChecker::new(model).check(&history).unwrap();
//! assert!(verdict.is_violation());
//! ```

pub mod linearizability;
pub mod model;
pub mod verdict;

pub use linearizability::{LinearizabilityChecker, LinearizabilityConfig};
pub use model::{Model, SequentialSpec};
pub use verdict::{OpRef, SearchStats, Verdict, Witness};

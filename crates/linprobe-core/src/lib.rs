//! Linprobe Core - Core types for the linearizability checker.
//!
//! This crate provides the fundamental types shared by every stage of a
//! linearizability run:
//!
//! - [`operation`]: Operation declarations, invocations and their outcomes
//! - [`scenario`]: Actors (per-thread operation sequences) and scenarios
//! - [`history`]: Timestamped invocation/response events and the logical clock
//! - [`config`]: The typed run configuration
//! - [`error`]: Error types for configuration, generators and histories
//!
//! # Overview
//!
//! A run generates a [`Scenario`], executes it concurrently against a fresh
//! instance of the structure under test while recording a [`History`], and
//! then asks a verifier whether that history has a sequential witness.
//!
//! # Example
//!
//! ```
//! use linprobe_core::history::{Event, History, LogicalClock};
//! use linprobe_core::operation::{Invocation, Outcome};
//! use linprobe_core::scenario::ActorId;
//! use serde_json::json;
//!
//! let clock = LogicalClock::new();
//! let mut history = History::new();
//!
//! let add = Invocation::new("add", vec![json!(3)]);
//! history.push(Event::invoke(ActorId(0), 0, add, clock.tick()));
//! history.push(Event::response(ActorId(0), 0, Outcome::ok(json!(true)), clock.tick()));
//!
//! assert!(history.validate().is_ok());
//! assert_eq!(history.operations().unwrap().len(), 1);
//! ```

pub mod config;
pub mod error;
pub mod history;
pub mod operation;
pub mod scenario;

pub use config::{CheckConfig, CountRange, GeneratorSpec};
pub use error::{ConfigError, GeneratorError, HistoryError};
pub use history::{CompletedOp, Event, History, LogicalClock, RunId, Timestamp};
pub use operation::{
    decode_args, ExceptionKind, Invocation, OperationSpec, Outcome, ParamSpec, ReturnType, Value,
};
pub use scenario::{Actor, ActorId, Scenario};

//! Linprobe Runner - Drives linearizability runs.
//!
//! This crate owns everything that touches the structure under test:
//!
//! - [`table`]: [`OperationTable`], mapping operation names to typed calls
//! - [`instance`]: [`InstanceManager`], one fresh instance per execution
//! - [`executor`]: [`ConcurrentExecutor`], barrier-started worker threads
//!   recording a timestamped history
//! - [`minimize`]: [`ScenarioMinimizer`], shrinking a failing scenario
//! - [`controller`]: [`LinChecker`], the iteration loop tying generation,
//!   execution and verification together
//! - [`failure`]: [`Failure`], the reproduction detail of a failed run
//! - [`error`]: [`CheckError`] and [`ExecutionError`]

pub mod controller;
pub mod error;
pub mod executor;
pub mod failure;
pub mod instance;
pub mod minimize;
pub mod table;

pub use controller::{LinChecker, RunSummary};
pub use error::{CheckError, ExecutionError};
pub use executor::{ConcurrentExecutor, ExecutorConfig};
pub use failure::{Failure, FailureKind};
pub use instance::InstanceManager;
pub use minimize::{MinimizationStats, Minimized, ScenarioMinimizer};
pub use table::OperationTable;

//! Linprobe Targets - Reference structures.
//!
//! Correct structures should pass any run; the racy ones carry a known bug
//! a run should find.
//!
//! | Target | Structure | Bug |
//! |--------|-----------|-----|
//! | `locked-set` | [`set::LockedSet`] | none |
//! | `racy-set` | [`set::RacySet`] | check-then-insert in `add` |
//! | `locked-counter` | [`counter::LockedCounter`] | none |
//! | `racy-counter` | [`counter::RacyCounter`] | lost update in `inc` |
//! | `locked-queue` | [`queue::LockedQueue`] | none; `poll` declares `empty` |

use std::sync::PoisonError;
use std::time::Duration;

use tracing::info;

use linprobe_checker::Model;
use linprobe_core::{CheckConfig, ExceptionKind};
use linprobe_runner::{CheckError, LinChecker, OperationTable, RunSummary};

pub mod counter;
pub mod queue;
pub mod set;

/// Pause inside the racy critical sections.
pub(crate) const RACE_WINDOW: Duration = Duration::from_micros(200);

pub(crate) fn poisoned<G>(_: PoisonError<G>) -> ExceptionKind {
    ExceptionKind::new("poisoned")
}

/// A named structure together with its model.
#[derive(Debug, Clone, Copy)]
pub struct Target {
    pub name: &'static str,
    pub description: &'static str,
    check: fn(CheckConfig) -> Result<RunSummary, CheckError>,
}

impl Target {
    /// Check this target under `config`.
    pub fn run(&self, config: CheckConfig) -> Result<RunSummary, CheckError> {
        info!(target_name = self.name, "Checking target");
        (self.check)(config)
    }
}

/// Every registered target.
pub const TARGETS: &[Target] = &[
    Target {
        name: "locked-set",
        description: "integer set behind a mutex",
        check: check_locked_set,
    },
    Target {
        name: "racy-set",
        description: "integer set whose add races between check and insert",
        check: check_racy_set,
    },
    Target {
        name: "locked-counter",
        description: "counter behind a mutex",
        check: check_locked_counter,
    },
    Target {
        name: "racy-counter",
        description: "counter whose increment is a separate load and store",
        check: check_racy_counter,
    },
    Target {
        name: "locked-queue",
        description: "FIFO queue behind a mutex; poll on empty raises 'empty'",
        check: check_locked_queue,
    },
];

/// Look up a target by name.
pub fn find(name: &str) -> Option<&'static Target> {
    TARGETS.iter().find(|target| target.name == name)
}

fn check<T, M>(
    config: CheckConfig,
    table: OperationTable<T>,
    model: M,
) -> Result<RunSummary, CheckError>
where
    T: Default + Send + Sync + 'static,
    M: Model,
{
    LinChecker::new(config, table, model, T::default).run()
}

fn check_locked_set(config: CheckConfig) -> Result<RunSummary, CheckError> {
    check(config, set::operations::<set::LockedSet>(), set::model())
}

fn check_racy_set(config: CheckConfig) -> Result<RunSummary, CheckError> {
    check(config, set::operations::<set::RacySet>(), set::model())
}

fn check_locked_counter(config: CheckConfig) -> Result<RunSummary, CheckError> {
    check(
        config,
        counter::operations::<counter::LockedCounter>(),
        counter::model(),
    )
}

fn check_racy_counter(config: CheckConfig) -> Result<RunSummary, CheckError> {
    check(
        config,
        counter::operations::<counter::RacyCounter>(),
        counter::model(),
    )
}

fn check_locked_queue(config: CheckConfig) -> Result<RunSummary, CheckError> {
    check(config, queue::operations(), queue::model())
}

//! Reproduction detail of a failed run.

use std::fmt;

use serde::{Deserialize, Serialize};

use linprobe_checker::{SearchStats, Witness};
use linprobe_core::{
    ActorId, CheckConfig, ExceptionKind, History, Invocation, RunId, Scenario,
};

use crate::minimize::MinimizationStats;

/// What went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// The history has no sequential witness.
    Violation {
        /// The longest prefix the verifier could linearize.
        longest_prefix: Witness,
        stats: SearchStats,
    },

    /// An operation raised an error kind outside its declared contract.
    UnexpectedException {
        actor: ActorId,
        index: usize,
        invocation: Invocation,
        exception: ExceptionKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl FailureKind {
    /// Short title for headings.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Violation { .. } => "Linearizability violation",
            Self::UnexpectedException { .. } => "Unexpected exception",
        }
    }
}

/// Everything needed to understand and replay a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub run_id: RunId,
    /// Name of the sequential model.
    pub model: String,
    /// Generation seed; rerunning `config` reproduces the scenario.
    pub seed: u64,
    /// Zero-based iteration whose scenario failed.
    pub iteration: usize,
    /// The configuration of the run, with `seed` filled in.
    pub config: CheckConfig,
    /// The failing scenario, minimized when `minimization` is set.
    pub scenario: Scenario,
    /// The offending history.
    pub history: History,
    pub minimization: Option<MinimizationStats>,
}

impl Failure {
    /// Whether this failure is a linearizability violation.
    pub fn is_violation(&self) -> bool {
        matches!(self.kind, FailureKind::Violation { .. })
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "= {} =", self.kind.title())?;
        writeln!(
            f,
            "model: {}, seed: {}, iteration: {}",
            self.model, self.seed, self.iteration
        )?;
        if let Some(stats) = &self.minimization {
            writeln!(
                f,
                "scenario minimized: {} invocations removed",
                stats.successful_removals
            )?;
        }

        writeln!(f, "\nExecution scenario:")?;
        write!(f, "{}", self.scenario)?;

        writeln!(f, "\nExecution history:")?;
        write!(f, "{}", self.history)?;

        match &self.kind {
            FailureKind::Violation { longest_prefix, .. } => {
                writeln!(f, "\nLongest linearizable prefix:")?;
                if longest_prefix.is_empty() {
                    writeln!(f, "(none)")?;
                } else {
                    write!(f, "{}", longest_prefix.render(&self.history))?;
                }
            }
            FailureKind::UnexpectedException {
                actor,
                invocation,
                exception,
                message,
                ..
            } => {
                write!(f, "\n{actor}: {invocation} raised '{exception}'")?;
                match message {
                    Some(message) => writeln!(f, ": {message}")?,
                    None => writeln!(f)?,
                }
            }
        }
        Ok(())
    }
}

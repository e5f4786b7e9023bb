//! Report types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use linprobe_core::{CheckConfig, RunId};
use linprobe_runner::{CheckError, Failure, RunSummary};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportOutcome {
    /// Every iteration passed.
    Passed { summary: RunSummary },

    /// A violation or an unexpected exception was found.
    Failed { failure: Box<Failure> },

    /// The run could not be carried out.
    Error { message: String, exit_code: u8 },
}

/// A report of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    /// Name of the checked target.
    pub target: String,
    pub config: CheckConfig,
    pub outcome: ReportOutcome,
}

impl RunReport {
    /// Build a report from the result of `LinChecker::run`.
    pub fn from_result(
        target: impl Into<String>,
        config: &CheckConfig,
        result: &Result<RunSummary, CheckError>,
    ) -> Self {
        let outcome = match result {
            Ok(summary) => ReportOutcome::Passed {
                summary: summary.clone(),
            },
            Err(err) => match err.failure() {
                Some(failure) => ReportOutcome::Failed {
                    failure: Box::new(failure.clone()),
                },
                None => ReportOutcome::Error {
                    message: err.to_string(),
                    exit_code: err.exit_code(),
                },
            },
        };
        let config = match &outcome {
            ReportOutcome::Failed { failure } => failure.config.clone(),
            _ => config.clone(),
        };

        Self {
            generated_at: Utc::now(),
            target: target.into(),
            config,
            outcome,
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self.outcome, ReportOutcome::Passed { .. })
    }

    /// Process exit code matching the outcome.
    pub fn exit_code(&self) -> u8 {
        match &self.outcome {
            ReportOutcome::Passed { .. } => 0,
            ReportOutcome::Failed { .. } => 1,
            ReportOutcome::Error { exit_code, .. } => *exit_code,
        }
    }

    /// The run id, when the run got far enough to have one.
    pub fn run_id(&self) -> Option<RunId> {
        match &self.outcome {
            ReportOutcome::Passed { summary } => Some(summary.run_id),
            ReportOutcome::Failed { failure } => Some(failure.run_id),
            ReportOutcome::Error { .. } => None,
        }
    }

    /// The seed to replay the run with, if known.
    pub fn seed(&self) -> Option<u64> {
        match &self.outcome {
            ReportOutcome::Passed { summary } => Some(summary.seed),
            ReportOutcome::Failed { failure } => Some(failure.seed),
            ReportOutcome::Error { .. } => self.config.seed,
        }
    }
}

/// Error types for report generation.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid report data.
    #[error("Invalid report data: {0}")]
    InvalidData(String),
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use linprobe_checker::{OpRef, SearchStats, Witness};
    use linprobe_core::{
        Actor, ActorId, Event, History, Invocation, Outcome, Scenario, Timestamp,
    };
    use linprobe_runner::FailureKind;
    use serde_json::json;

    pub fn summary() -> RunSummary {
        RunSummary {
            run_id: RunId::new(),
            model: "set".into(),
            seed: 99,
            iterations: 10,
            executions: 10,
            inconclusive: 1,
            timeouts: 0,
            search: SearchStats::default(),
            elapsed_ms: 12,
        }
    }

    /// Two concurrent add(1) calls that both succeeded.
    pub fn failure() -> Failure {
        let add = Invocation::new("add", vec![json!(1)]);
        let scenario = Scenario::new(vec![
            Actor::new(vec![add.clone()]),
            Actor::new(vec![add.clone()]),
        ]);
        let history = History::from_events(vec![
            Event::invoke(ActorId(0), 0, add.clone(), Timestamp(0)),
            Event::invoke(ActorId(1), 0, add, Timestamp(1)),
            Event::response(ActorId(0), 0, Outcome::ok(true), Timestamp(2)),
            Event::response(ActorId(1), 0, Outcome::ok(true), Timestamp(3)),
        ]);
        Failure {
            kind: FailureKind::Violation {
                longest_prefix: Witness::new(vec![OpRef::new(ActorId(0), 0)]),
                stats: SearchStats::default(),
            },
            run_id: RunId::new(),
            model: "set".into(),
            seed: 7,
            iteration: 3,
            config: CheckConfig::default().with_seed(7),
            scenario,
            history,
            minimization: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linprobe_core::ConfigError;

    #[test]
    fn test_passed_report() {
        let summary = fixtures::summary();
        let report = RunReport::from_result("locked-set", &CheckConfig::default(), &Ok(summary.clone()));
        assert!(report.passed());
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.seed(), Some(99));
        assert_eq!(report.run_id(), Some(summary.run_id));
    }

    #[test]
    fn test_failed_report_uses_failure_config() {
        let result = Err(CheckError::Violation(Box::new(fixtures::failure())));
        let report = RunReport::from_result("racy-set", &CheckConfig::default(), &result);
        assert!(!report.passed());
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.config.seed, Some(7));
        assert_eq!(report.seed(), Some(7));
    }

    #[test]
    fn test_error_report() {
        let result = Err(CheckError::from(ConfigError::NoThreads));
        let config = CheckConfig::default().with_seed(5);
        let report = RunReport::from_result("locked-set", &config, &result);
        assert_eq!(report.exit_code(), 2);
        assert_eq!(report.run_id(), None);
        assert_eq!(report.seed(), Some(5));
        let ReportOutcome::Error { message, .. } = &report.outcome else {
            panic!("expected an error outcome");
        };
        assert!(message.starts_with("configuration error"));
    }
}

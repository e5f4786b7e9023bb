//! Error types for linprobe-runner.

use std::time::Duration;

use thiserror::Error;

use linprobe_core::{ConfigError, GeneratorError, HistoryError};

use crate::failure::Failure;

/// Errors from one concurrent execution.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Not every worker returned before the deadline. The stragglers are
    /// abandoned and the execution counts as inconclusive.
    #[error("execution exceeded {timeout:?}: {finished} of {workers} workers returned")]
    Timeout {
        timeout: Duration,
        finished: usize,
        workers: usize,
    },

    /// A worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// A worker exited without reporting its events.
    #[error("{lost} of {workers} workers exited without reporting")]
    WorkerLost { lost: usize, workers: usize },
}

impl ExecutionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// The ways a run can fail.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The configuration or operation table is unusable.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// A parameter generator could not be resolved.
    #[error("generator error: {0}")]
    Generator(#[from] GeneratorError),

    /// A recorded history has no sequential witness.
    #[error("linearizability violation in iteration {} (seed {})", .0.iteration, .0.seed)]
    Violation(Box<Failure>),

    /// An operation raised an error kind it does not declare.
    #[error("unexpected exception in iteration {} (seed {})", .0.iteration, .0.seed)]
    UnexpectedException(Box<Failure>),

    /// The executor failed for a reason other than a timeout.
    #[error("execution failed: {0}")]
    Execution(#[source] ExecutionError),

    /// The executor produced a malformed history.
    #[error("malformed history: {0}")]
    History(#[from] HistoryError),
}

impl CheckError {
    /// Process exit code for this error: 1 for a failed check, 2 for a
    /// configuration or generator error, 3 for an engine fault.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Violation(_) | Self::UnexpectedException(_) => 1,
            Self::Configuration(_) | Self::Generator(_) => 2,
            Self::Execution(_) | Self::History(_) => 3,
        }
    }

    /// The reproduction detail, if the run failed a check.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Violation(failure) | Self::UnexpectedException(failure) => {
                Some(failure.as_ref())
            }
            _ => None,
        }
    }

    pub fn is_violation(&self) -> bool {
        matches!(self, Self::Violation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CheckError::from(ConfigError::NoThreads).exit_code(), 2);
        assert_eq!(
            CheckError::from(GeneratorError::UnknownKind("x".into())).exit_code(),
            2
        );
        let lost = ExecutionError::WorkerLost {
            lost: 1,
            workers: 2,
        };
        assert_eq!(CheckError::Execution(lost).exit_code(), 3);
    }

    #[test]
    fn test_execution_error_display() {
        let err = ExecutionError::Timeout {
            timeout: Duration::from_millis(50),
            finished: 1,
            workers: 3,
        };
        assert!(err.is_timeout());
        assert_eq!(
            err.to_string(),
            "execution exceeded 50ms: 1 of 3 workers returned"
        );
    }

    #[test]
    fn test_config_error_wraps() {
        let err = CheckError::from(ConfigError::NoIterations);
        assert_eq!(
            err.to_string(),
            "configuration error: iteration count must be positive"
        );
        assert!(err.failure().is_none());
    }
}

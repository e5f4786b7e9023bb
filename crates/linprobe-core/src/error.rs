//! Error types for linprobe-core.
//!
//! This module provides the error taxonomy for the stages that run before
//! any concurrent execution happens (configuration and parameter
//! generation) and for history well-formedness.

use thiserror::Error;

use crate::scenario::ActorId;

/// Errors detected while validating a run configuration.
///
/// These are fatal: they surface before the first iteration executes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No worker threads were configured.
    #[error("at least one worker thread is required")]
    NoThreads,

    /// The iteration count was zero.
    #[error("iteration count must be positive")]
    NoIterations,

    /// The invocations-per-iteration count was zero.
    #[error("invocations per iteration must be positive")]
    NoInvocations,

    /// The iteration timeout was zero.
    #[error("iteration timeout must be positive")]
    ZeroTimeout,

    /// A per-thread operation count range could not be used.
    #[error("invalid operation count range '{range}': {reason}")]
    InvalidRange {
        /// The range as written in the configuration.
        range: String,
        /// Why the range was rejected.
        reason: String,
    },

    /// The operation table is empty.
    #[error("no operations are registered")]
    NoOperations,

    /// Two operations were registered under the same name.
    #[error("operation '{0}' is registered more than once")]
    DuplicateOperation(String),

    /// The verifier state budget was zero.
    #[error("max_states must be positive when set")]
    ZeroStateBudget,
}

impl ConfigError {
    /// Create an invalid range error.
    pub fn invalid_range(range: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRange {
            range: range.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while resolving parameter generators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeneratorError {
    /// No generator is known under this kind.
    #[error("unknown parameter generator '{0}'")]
    UnknownKind(String),

    /// The configuration string for a generator could not be parsed.
    #[error("malformed configuration '{config}' for {kind} generator: {reason}")]
    MalformedConfig {
        /// Generator kind, e.g. `int`.
        kind: String,
        /// The offending configuration string.
        config: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl GeneratorError {
    /// Create a malformed configuration error.
    pub fn malformed(
        kind: impl Into<String>,
        config: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedConfig {
            kind: kind.into(),
            config: config.into(),
            reason: reason.into(),
        }
    }
}

/// Errors for histories that break the invoke/response pairing rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// A response was recorded without a prior invocation.
    #[error("response for {actor}#{index} has no matching invocation")]
    UnmatchedResponse { actor: ActorId, index: usize },

    /// An invocation never received a response.
    #[error("invocation {actor}#{index} has no response")]
    MissingResponse { actor: ActorId, index: usize },

    /// The same invocation or response was recorded twice.
    #[error("duplicate {kind} event for {actor}#{index}")]
    DuplicateEvent {
        actor: ActorId,
        index: usize,
        kind: &'static str,
    },

    /// A response carries a timestamp not later than its invocation.
    #[error("response for {actor}#{index} does not follow its invocation")]
    ResponseBeforeInvoke { actor: ActorId, index: usize },

    /// An actor's operations were not numbered contiguously from zero.
    #[error("{actor} is missing operation #{index}")]
    IndexGap { actor: ActorId, index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::invalid_range("3:1", "min exceeds max");
        assert_eq!(
            err.to_string(),
            "invalid operation count range '3:1': min exceeds max"
        );
        assert_eq!(
            ConfigError::DuplicateOperation("add".into()).to_string(),
            "operation 'add' is registered more than once"
        );
    }

    #[test]
    fn test_generator_error_display() {
        let err = GeneratorError::malformed("int", "a:b", "expected integers");
        assert!(err.to_string().contains("'a:b'"));
        assert!(err.to_string().contains("int generator"));
    }

    #[test]
    fn test_history_error_display() {
        let err = HistoryError::MissingResponse {
            actor: ActorId(1),
            index: 2,
        };
        assert_eq!(err.to_string(), "invocation T1#2 has no response");

        let err = HistoryError::UnmatchedResponse {
            actor: ActorId::INIT,
            index: 0,
        };
        assert_eq!(
            err.to_string(),
            "response for init#0 has no matching invocation"
        );
    }
}

//! Run configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Closed range of per-thread operation counts, written `min:max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountRange {
    pub min: usize,
    pub max: usize,
}

impl CountRange {
    /// Create a range, rejecting empty or inverted bounds.
    pub fn new(min: usize, max: usize) -> Result<Self, ConfigError> {
        let range = Self { min, max };
        if min == 0 {
            return Err(ConfigError::invalid_range(
                range.to_string(),
                "operation counts must be positive",
            ));
        }
        if min > max {
            return Err(ConfigError::invalid_range(
                range.to_string(),
                "min exceeds max",
            ));
        }
        Ok(range)
    }

    /// Parse `"min:max"` or a single count `"n"`.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let bound = |part: &str| {
            part.trim()
                .parse::<usize>()
                .map_err(|e| ConfigError::invalid_range(s, e.to_string()))
        };
        let (min, max) = match s.split_once(':') {
            Some((min, max)) => (bound(min)?, bound(max)?),
            None => {
                let n = bound(s)?;
                (n, n)
            }
        };
        Self::new(min, max).map_err(|e| match e {
            ConfigError::InvalidRange { reason, .. } => ConfigError::invalid_range(s, reason),
            other => other,
        })
    }

    /// Whether `n` lies in the range.
    pub fn contains(&self, n: usize) -> bool {
        (self.min..=self.max).contains(&n)
    }
}

impl FromStr for CountRange {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CountRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.min, self.max)
    }
}

/// A parameter generator binding: generator kind plus configuration string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorSpec {
    pub generator: String,
    #[serde(default)]
    pub config: String,
}

impl GeneratorSpec {
    pub fn new(generator: impl Into<String>, config: impl Into<String>) -> Self {
        Self {
            generator: generator.into(),
            config: config.into(),
        }
    }
}

/// Typed configuration of one linearizability run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Number of generated scenarios.
    pub iterations: usize,

    /// Executions of each scenario, each against a fresh instance.
    pub invocations_per_iteration: usize,

    /// Operation count range per worker thread; its length is the thread count.
    pub actors_per_thread: Vec<String>,

    /// Operations in the sequential init part.
    pub actors_before: usize,

    /// Operations in the sequential post part.
    pub actors_after: usize,

    /// Per-execution timeout in milliseconds.
    pub timeout_ms: u64,

    /// Seed for scenario generation. A random seed is drawn when unset.
    pub seed: Option<u64>,

    /// Upper bound of the random spin before each parallel invocation.
    pub max_spin: u32,

    /// Shrink a failing scenario before reporting it.
    pub minimize: bool,

    /// Re-executions tried per candidate while minimizing.
    pub minimize_attempts: usize,

    /// Bound on verifier states per history; exceeding it is inconclusive.
    pub max_states: Option<u64>,

    /// Generator overrides keyed by parameter name.
    pub params: BTreeMap<String, GeneratorSpec>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            invocations_per_iteration: 1,
            actors_per_thread: vec!["1:3".to_string(), "1:3".to_string()],
            actors_before: 0,
            actors_after: 0,
            timeout_ms: 10_000,
            seed: None,
            max_spin: 64,
            minimize: true,
            minimize_attempts: 20,
            max_states: Some(1_000_000),
            params: BTreeMap::new(),
        }
    }
}

impl CheckConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the iteration count.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the executions per scenario.
    pub fn with_invocations_per_iteration(mut self, invocations: usize) -> Self {
        self.invocations_per_iteration = invocations;
        self
    }

    /// Use `threads` workers, each with the same operation count range.
    pub fn with_threads(mut self, threads: usize, range: impl Into<String>) -> Self {
        let range = range.into();
        self.actors_per_thread = vec![range; threads];
        self
    }

    /// Set the init and post part sizes.
    pub fn with_sequential_parts(mut self, before: usize, after: usize) -> Self {
        self.actors_before = before;
        self.actors_after = after;
        self
    }

    /// Set the per-execution timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Fix the generation seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enable or disable minimization.
    pub fn with_minimize(mut self, minimize: bool) -> Self {
        self.minimize = minimize;
        self
    }

    /// Set the verifier state budget.
    pub fn with_max_states(mut self, max_states: Option<u64>) -> Self {
        self.max_states = max_states;
        self
    }

    /// Rebind the generator of parameter `name`.
    pub fn with_param(
        mut self,
        name: impl Into<String>,
        generator: impl Into<String>,
        config: impl Into<String>,
    ) -> Self {
        self.params
            .insert(name.into(), GeneratorSpec::new(generator, config));
        self
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.actors_per_thread.len()
    }

    /// Per-execution timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed per-thread operation count ranges.
    pub fn thread_ranges(&self) -> Result<Vec<CountRange>, ConfigError> {
        self.actors_per_thread
            .iter()
            .map(|s| CountRange::parse(s))
            .collect()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::NoIterations);
        }
        if self.invocations_per_iteration == 0 {
            return Err(ConfigError::NoInvocations);
        }
        if self.actors_per_thread.is_empty() {
            return Err(ConfigError::NoThreads);
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.max_states == Some(0) {
            return Err(ConfigError::ZeroStateBudget);
        }
        self.thread_ranges()?;
        Ok(())
    }
}

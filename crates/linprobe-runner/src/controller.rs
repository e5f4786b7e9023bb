//! Iteration control.
//!
//! [`LinChecker`] drives a whole run: it validates the configuration,
//! generates one scenario per iteration, executes each scenario
//! `invocations_per_iteration` times against fresh instances, verifies every
//! history and stops at the first failure.

use std::sync::Arc;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use linprobe_checker::{
    LinearizabilityChecker, LinearizabilityConfig, Model, SearchStats, Verdict,
};
use linprobe_core::{
    CheckConfig, ExceptionKind, History, LogicalClock, Outcome, RunId, Scenario,
};
use linprobe_generator::{ActorGenerator, ParamBinder};

use crate::error::CheckError;
use crate::executor::{ConcurrentExecutor, ExecutorConfig};
use crate::failure::{Failure, FailureKind};
use crate::instance::InstanceManager;
use crate::minimize::ScenarioMinimizer;
use crate::table::OperationTable;

/// Outcome of a run with no failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    /// Name of the sequential model.
    pub model: String,
    /// Generation seed actually used.
    pub seed: u64,
    /// Scenarios generated and checked.
    pub iterations: usize,
    /// Executions whose history was verified.
    pub executions: u64,
    /// Executions that timed out or exhausted the verifier budget.
    pub inconclusive: u64,
    /// Executions that timed out.
    pub timeouts: u64,
    /// Verifier counters summed over every history.
    pub search: SearchStats,
    pub elapsed_ms: u64,
}

/// A failure found while executing one scenario.
#[derive(Debug, Clone)]
struct Finding {
    kind: FailureKind,
    history: History,
}

impl Finding {
    fn is_violation(&self) -> bool {
        matches!(self.kind, FailureKind::Violation { .. })
    }
}

/// Mutable state of one run.
struct Session<T> {
    executor: ConcurrentExecutor,
    instances: InstanceManager<T>,
    rng: ChaCha8Rng,
    executions: u64,
    inconclusive: u64,
    timeouts: u64,
    search: SearchStats,
}

/// Checks a concurrent structure for linearizability against a model.
///
/// # Example
///
/// ```
/// use std::sync::Mutex;
///
/// use linprobe_checker::SequentialSpec;
/// use linprobe_core::{CheckConfig, OperationSpec, ReturnType};
/// use linprobe_runner::{LinChecker, OperationTable};
///
/// let table = OperationTable::<Mutex<i64>>::new()
///     .register_nullary(OperationSpec::new("inc").returns(ReturnType::Int), |c| {
///         let mut c = c.lock().unwrap();
///         *c += 1;
///         Ok(*c)
///     });
/// let model = SequentialSpec::new("counter", 0i64).nullary("inc", |c| {
///     *c += 1;
///     Ok(*c)
/// });
///
/// let config = CheckConfig::new().with_iterations(20).with_seed(1);
/// let summary = LinChecker::new(config, table, model, || Mutex::new(0))
///     .run()
///     .unwrap();
/// assert_eq!(summary.iterations, 20);
/// ```
pub struct LinChecker<T, M> {
    config: CheckConfig,
    table: Arc<OperationTable<T>>,
    verifier: LinearizabilityChecker<M>,
    factory: Arc<dyn Fn() -> T + Send + Sync>,
}

impl<T, M> LinChecker<T, M>
where
    T: Send + Sync + 'static,
    M: Model,
{
    /// Create a checker for instances built by `factory`.
    pub fn new(
        config: CheckConfig,
        table: OperationTable<T>,
        model: M,
        factory: impl Fn() -> T + Send + Sync + 'static,
    ) -> Self {
        let verifier = LinearizabilityChecker::with_config(
            model,
            LinearizabilityConfig::new().with_max_states(config.max_states),
        );
        Self {
            config,
            table: Arc::new(table),
            verifier,
            factory: Arc::new(factory),
        }
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Run every iteration, stopping at the first failure.
    #[instrument(skip(self), fields(model = %self.verifier.model().name()))]
    pub fn run(&self) -> Result<RunSummary, CheckError> {
        let started = Instant::now();

        self.config.validate()?;
        self.table.validate()?;
        let specs = self.table.specs();
        let binder = ParamBinder::new(&specs, &self.config.params)?;
        let generator = ActorGenerator::new(specs, binder, self.config.thread_ranges()?)?
            .with_sequential_parts(self.config.actors_before, self.config.actors_after);

        let seed = self.config.seed.unwrap_or_else(rand::random);
        let run_id = RunId::new();
        info!(
            %run_id,
            seed,
            iterations = self.config.iterations,
            threads = generator.threads(),
            invocations_per_iteration = self.config.invocations_per_iteration,
            "Starting linearizability run"
        );

        let mut session = Session {
            executor: ConcurrentExecutor::new(
                LogicalClock::new(),
                ExecutorConfig::from(&self.config),
            ),
            instances: InstanceManager::from_shared(Arc::clone(&self.factory)),
            rng: ChaCha8Rng::seed_from_u64(seed),
            executions: 0,
            inconclusive: 0,
            timeouts: 0,
            search: SearchStats::default(),
        };

        for iteration in 0..self.config.iterations {
            let scenario = generator.generate(&mut session.rng);
            debug!(
                iteration,
                invocations = scenario.total_invocations(),
                "Checking scenario"
            );

            let attempts = self.config.invocations_per_iteration;
            if let Some(finding) = self.run_scenario(&mut session, &scenario, attempts)? {
                return Err(self.fail(&mut session, run_id, seed, iteration, scenario, finding)?);
            }
        }

        let summary = RunSummary {
            run_id,
            model: self.verifier.model().name().to_string(),
            seed,
            iterations: self.config.iterations,
            executions: session.executions,
            inconclusive: session.inconclusive,
            timeouts: session.timeouts,
            search: session.search,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            executions = summary.executions,
            inconclusive = summary.inconclusive,
            states_explored = summary.search.states_explored,
            elapsed_ms = summary.elapsed_ms,
            "Linearizability run passed"
        );
        Ok(summary)
    }

    /// Execute `scenario` up to `attempts` times, returning the first failure.
    fn run_scenario(
        &self,
        session: &mut Session<T>,
        scenario: &Scenario,
        attempts: usize,
    ) -> Result<Option<Finding>, CheckError> {
        for _ in 0..attempts {
            let instance = session.instances.fresh();
            let exec_seed = session.rng.r#gen();
            let result = session
                .executor
                .execute(&instance, &self.table, scenario, exec_seed);
            drop(instance);
            session.instances.release();

            let history = match result {
                Ok(history) => history,
                Err(e) if e.is_timeout() => {
                    session.timeouts += 1;
                    session.inconclusive += 1;
                    continue;
                }
                Err(e) => return Err(CheckError::Execution(e)),
            };
            session.executions += 1;

            if let Some(kind) = self.unexpected_exception(&history)? {
                return Ok(Some(Finding { kind, history }));
            }

            let verdict = self.verifier.check(&history)?;
            session.search.merge(verdict.stats());
            match verdict {
                Verdict::Linearizable { .. } => {}
                Verdict::Inconclusive { reason, .. } => {
                    warn!(%reason, "Verification inconclusive");
                    session.inconclusive += 1;
                }
                Verdict::Violation {
                    longest_prefix,
                    stats,
                    ..
                } => {
                    return Ok(Some(Finding {
                        kind: FailureKind::Violation {
                            longest_prefix,
                            stats,
                        },
                        history,
                    }));
                }
            }
        }
        Ok(None)
    }

    /// The earliest-returning operation that raised an undeclared error kind.
    fn unexpected_exception(&self, history: &History) -> Result<Option<FailureKind>, CheckError> {
        let culprit = history
            .operations()?
            .into_iter()
            .filter_map(|op| match op.outcome {
                Outcome::Threw { kind, message }
                    if !self.declares(&op.invocation.operation, &kind) =>
                {
                    let returned_at = op.returned_at;
                    let kind = FailureKind::UnexpectedException {
                        actor: op.actor,
                        index: op.index,
                        invocation: op.invocation,
                        exception: kind,
                        message,
                    };
                    Some((returned_at, kind))
                }
                _ => None,
            })
            .min_by_key(|(returned_at, _)| *returned_at)
            .map(|(_, kind)| kind);
        Ok(culprit)
    }

    fn declares(&self, operation: &str, kind: &ExceptionKind) -> bool {
        self.table
            .spec(operation)
            .is_some_and(|spec| spec.handles_kind(kind))
    }

    /// Minimize if configured and package the failure.
    fn fail(
        &self,
        session: &mut Session<T>,
        run_id: RunId,
        seed: u64,
        iteration: usize,
        scenario: Scenario,
        finding: Finding,
    ) -> Result<CheckError, CheckError> {
        let violation = finding.is_violation();
        let (scenario, finding, minimization) = if self.config.minimize {
            let attempts = self.config.minimize_attempts.max(1);
            let minimized = ScenarioMinimizer::new().minimize(scenario, finding, |candidate| {
                Ok::<_, CheckError>(
                    self.run_scenario(session, candidate, attempts)?
                        .filter(|f| f.is_violation() == violation),
                )
            })?;
            (minimized.scenario, minimized.evidence, Some(minimized.stats))
        } else {
            (scenario, finding, None)
        };

        let failure = Failure {
            kind: finding.kind,
            run_id,
            model: self.verifier.model().name().to_string(),
            seed,
            iteration,
            config: CheckConfig {
                seed: Some(seed),
                ..self.config.clone()
            },
            scenario,
            history: finding.history,
            minimization,
        };
        error!(
            %run_id,
            seed,
            iteration,
            kind = failure.kind.title(),
            "Linearizability run failed\n{failure}"
        );

        Ok(if violation {
            CheckError::Violation(Box::new(failure))
        } else {
            CheckError::UnexpectedException(Box::new(failure))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linprobe_checker::SequentialSpec;
    use linprobe_core::{ActorId, ConfigError, ExceptionKind, OperationSpec, ReturnType};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    type Counter = Mutex<i64>;

    fn counter_model() -> SequentialSpec<i64> {
        SequentialSpec::new("counter", 0)
            .nullary("inc", |c: &mut i64| {
                *c += 1;
                Ok(())
            })
            .nullary("get", |c: &mut i64| Ok(*c))
    }

    fn counter_table(get_offset: i64) -> OperationTable<Counter> {
        OperationTable::new()
            .register_nullary(
                OperationSpec::new("inc").returns(ReturnType::Unit),
                |c: &Counter| {
                    *c.lock().map_err(|_| ExceptionKind::new("poisoned"))? += 1;
                    Ok(())
                },
            )
            .register_nullary(
                OperationSpec::new("get").returns(ReturnType::Int),
                move |c: &Counter| {
                    let value = *c.lock().map_err(|_| ExceptionKind::new("poisoned"))?;
                    Ok(value + get_offset)
                },
            )
    }

    #[test]
    fn test_correct_structure_passes() {
        let config = CheckConfig::new()
            .with_iterations(50)
            .with_threads(3, "1:3")
            .with_sequential_parts(1, 1)
            .with_seed(5);
        let summary = LinChecker::new(config, counter_table(0), counter_model(), || {
            Mutex::new(0)
        })
        .run()
        .unwrap();

        assert_eq!(summary.seed, 5);
        assert_eq!(summary.iterations, 50);
        assert_eq!(summary.executions, 50);
        assert_eq!(summary.inconclusive, 0);
        assert!(summary.search.states_explored >= 50);
    }

    #[test]
    fn test_violation_is_minimized() {
        let config = CheckConfig::new()
            .with_iterations(50)
            .with_threads(1, "2:4")
            .with_seed(11);
        let err = LinChecker::new(config, counter_table(1), counter_model(), || {
            Mutex::new(0)
        })
        .run()
        .unwrap_err();

        assert!(err.is_violation());
        assert_eq!(err.exit_code(), 1);
        let failure = err.failure().unwrap();
        assert_eq!(failure.seed, 11);
        assert_eq!(failure.config.seed, Some(11));
        assert_eq!(failure.scenario.total_invocations(), 1);
        assert_eq!(failure.scenario.parallel[0].invocations[0].operation, "get");
        assert!(failure.minimization.is_some());
        assert!(failure.history.validate().is_ok());
    }

    #[test]
    fn test_same_seed_same_failure() {
        let run = || {
            let config = CheckConfig::new()
                .with_iterations(50)
                .with_threads(1, "2:4")
                .with_minimize(false)
                .with_seed(99);
            LinChecker::new(config, counter_table(1), counter_model(), || Mutex::new(0))
                .run()
                .unwrap_err()
        };
        let (a, b) = (run(), run());
        let (a, b) = (a.failure().unwrap(), b.failure().unwrap());
        assert_eq!(a.iteration, b.iteration);
        assert_eq!(a.scenario, b.scenario);
        assert!(a.minimization.is_none());
    }

    #[test]
    fn test_unexpected_exception_fails_run() {
        let table = OperationTable::<Counter>::new().register_nullary(
            OperationSpec::new("explode"),
            |_: &Counter| -> Result<(), ExceptionKind> { panic!("structure corrupted") },
        );
        let model = SequentialSpec::new("noop", 0i64).nullary("explode", |_: &mut i64| Ok(()));
        let config = CheckConfig::new().with_iterations(5).with_seed(3);

        let err = LinChecker::new(config, table, model, || Mutex::new(0))
            .run()
            .unwrap_err();

        assert!(matches!(err, CheckError::UnexpectedException(_)));
        assert_eq!(err.exit_code(), 1);
        let failure = err.failure().unwrap();
        assert_eq!(failure.iteration, 0);
        assert_eq!(failure.scenario.total_invocations(), 1);
        let FailureKind::UnexpectedException {
            exception, message, ..
        } = &failure.kind
        else {
            panic!("expected unexpected exception, got {:?}", failure.kind);
        };
        assert_eq!(exception.as_str(), ExceptionKind::PANIC);
        assert_eq!(message.as_deref(), Some("structure corrupted"));
    }

    #[test]
    fn test_declared_exception_is_response_data() {
        let table = OperationTable::<Counter>::new().register_nullary(
            OperationSpec::new("take").handles("empty"),
            |_: &Counter| Err::<(), _>(ExceptionKind::new("empty")),
        );
        let model = SequentialSpec::new("empty", 0i64)
            .nullary("take", |_: &mut i64| Err::<(), _>(ExceptionKind::new("empty")));
        let config = CheckConfig::new().with_iterations(10).with_seed(4);

        let summary = LinChecker::new(config, table, model, || Mutex::new(0))
            .run()
            .unwrap();
        assert_eq!(summary.executions, 10);
    }

    #[test]
    fn test_configuration_errors_precede_execution() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let config = CheckConfig::new().with_threads(2, "3:1");
        let err = LinChecker::new(config, counter_table(0), counter_model(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Mutex::new(0)
        })
        .run()
        .unwrap_err();

        assert!(matches!(
            err,
            CheckError::Configuration(ConfigError::InvalidRange { .. })
        ));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(built.load(Ordering::SeqCst), 0);

        let config = CheckConfig::new().with_param("delta", "gaussian", "");
        let table = counter_table(0).register(
            OperationSpec::new("add").param(linprobe_core::ParamSpec::int("delta", "1:2")),
            |c: &Counter, (d,): (i64,)| {
                *c.lock().map_err(|_| ExceptionKind::new("poisoned"))? += d;
                Ok(())
            },
        );
        let err = LinChecker::new(config, table, counter_model(), || Mutex::new(0))
            .run()
            .unwrap_err();
        assert!(matches!(err, CheckError::Generator(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_timeouts_are_inconclusive() {
        let table = OperationTable::<Counter>::new().register_nullary(
            OperationSpec::new("stall").returns(ReturnType::Unit),
            |_: &Counter| {
                std::thread::sleep(Duration::from_millis(300));
                Ok(())
            },
        );
        let model = SequentialSpec::new("stall", 0i64).nullary("stall", |_: &mut i64| Ok(()));
        let config = CheckConfig::new()
            .with_iterations(2)
            .with_threads(2, "1:1")
            .with_timeout(Duration::from_millis(30))
            .with_seed(8);

        let summary = LinChecker::new(config, table, model, || Mutex::new(0))
            .run()
            .unwrap();
        assert_eq!(summary.timeouts, 2);
        assert_eq!(summary.inconclusive, 2);
        assert_eq!(summary.executions, 0);
    }

    #[test]
    fn test_post_part_runs_after_workers() {
        let table = OperationTable::<Counter>::new().register_nullary(
            OperationSpec::new("get").returns(ReturnType::Int),
            |c: &Counter| Ok(*c.lock().map_err(|_| ExceptionKind::new("poisoned"))? + 1),
        );
        let config = CheckConfig::new()
            .with_iterations(3)
            .with_threads(2, "1:2")
            .with_sequential_parts(1, 1)
            .with_minimize(false)
            .with_seed(21);

        let err = LinChecker::new(config, table, counter_model(), || Mutex::new(0))
            .run()
            .unwrap_err();
        let failure = err.failure().unwrap();
        assert_eq!(failure.iteration, 0);

        let ops = failure.history.operations().unwrap();
        let init: Vec<_> = ops.iter().filter(|op| op.actor == ActorId::INIT).collect();
        let post: Vec<_> = ops.iter().filter(|op| op.actor == ActorId::POST).collect();
        assert_eq!((init.len(), post.len()), (1, 1));
        for op in ops.iter().filter(|op| op.actor.is_parallel()) {
            assert!(init[0].happens_before(op));
            assert!(op.happens_before(post[0]));
        }
    }
}

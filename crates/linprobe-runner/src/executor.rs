//! Concurrent execution of one scenario.
//!
//! Each lane of a phase runs on its own thread. Threads meet at a barrier
//! so their first invocations overlap, then run their invocations in order
//! while the shared [`LogicalClock`] stamps each call immediately before
//! and after it. The init and post parts run the same way as single-lane
//! phases, so one clock orders the whole history.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{trace, warn};

use linprobe_core::{ActorId, CheckConfig, Event, History, Invocation, LogicalClock, Scenario};

use crate::error::ExecutionError;
use crate::table::OperationTable;

/// Executor settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Bound on one whole execution, init and post parts included.
    pub timeout: Duration,
    /// Upper bound of the random spin before each parallel invocation.
    pub max_spin: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_spin: 64,
        }
    }
}

impl From<&CheckConfig> for ExecutorConfig {
    fn from(config: &CheckConfig) -> Self {
        Self {
            timeout: config.timeout(),
            max_spin: config.max_spin,
        }
    }
}

/// Runs scenarios against a shared instance and records their histories.
#[derive(Debug, Clone)]
pub struct ConcurrentExecutor {
    clock: LogicalClock,
    config: ExecutorConfig,
}

impl ConcurrentExecutor {
    /// Create an executor stamping events from `clock`.
    pub fn new(clock: LogicalClock, config: ExecutorConfig) -> Self {
        Self { clock, config }
    }

    pub fn clock(&self) -> &LogicalClock {
        &self.clock
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute `scenario` once against `instance`.
    ///
    /// `seed` drives the per-worker spin jitter. On timeout the workers that
    /// have not returned are abandoned: they keep their handle to the
    /// instance until their current call finishes.
    pub fn execute<T>(
        &self,
        instance: &Arc<T>,
        table: &Arc<OperationTable<T>>,
        scenario: &Scenario,
        seed: u64,
    ) -> Result<History, ExecutionError>
    where
        T: Send + Sync + 'static,
    {
        let deadline = Instant::now() + self.config.timeout;
        let mut events = Vec::with_capacity(scenario.total_invocations() * 2);

        if !scenario.init.is_empty() {
            let lanes = vec![(ActorId::INIT, scenario.init.clone())];
            events.extend(self.run_phase(lanes, instance, table, seed, deadline, 0)?);
        }

        if scenario.threads() > 0 {
            let lanes = scenario
                .parallel
                .iter()
                .enumerate()
                .map(|(i, actor)| (ActorId(i as u32), actor.invocations.clone()))
                .collect();
            events.extend(self.run_phase(
                lanes,
                instance,
                table,
                seed,
                deadline,
                self.config.max_spin,
            )?);
        }

        if !scenario.post.is_empty() {
            let lanes = vec![(ActorId::POST, scenario.post.clone())];
            events.extend(self.run_phase(lanes, instance, table, seed, deadline, 0)?);
        }

        Ok(History::from_events(events))
    }

    fn run_phase<T>(
        &self,
        lanes: Vec<(ActorId, Vec<Invocation>)>,
        instance: &Arc<T>,
        table: &Arc<OperationTable<T>>,
        seed: u64,
        deadline: Instant,
        max_spin: u32,
    ) -> Result<Vec<Event>, ExecutionError>
    where
        T: Send + Sync + 'static,
    {
        let workers = lanes.len();
        let barrier = Arc::new(Barrier::new(workers));
        let (tx, rx) = mpsc::channel();

        for (actor, invocations) in lanes {
            let barrier = Arc::clone(&barrier);
            let tx = tx.clone();
            let clock = self.clock.clone();
            let instance = Arc::clone(instance);
            let table = Arc::clone(table);
            let worker_seed = seed ^ u64::from(actor.inner()).wrapping_mul(0x9E37_79B9_7F4A_7C15);

            thread::Builder::new()
                .name(format!("linprobe-{actor}"))
                .spawn(move || {
                    let mut rng = ChaCha8Rng::seed_from_u64(worker_seed);
                    let mut events = Vec::with_capacity(invocations.len() * 2);
                    barrier.wait();

                    for (index, invocation) in invocations.into_iter().enumerate() {
                        spin(&mut rng, max_spin);
                        let invoked_at = clock.tick();
                        let outcome = table.invoke(&instance, &invocation);
                        let returned_at = clock.tick();
                        events.push(Event::invoke(actor, index, invocation, invoked_at));
                        events.push(Event::response(actor, index, outcome, returned_at));
                    }

                    // The receiver is gone once the phase has timed out.
                    let _ = tx.send(events);
                })?;
        }
        drop(tx);

        let mut collected = Vec::new();
        let mut finished = 0;
        while finished < workers {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(events) => {
                    collected.extend(events);
                    finished += 1;
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        finished,
                        workers,
                        timeout_ms = self.config.timeout.as_millis() as u64,
                        "Execution timed out, abandoning workers"
                    );
                    return Err(ExecutionError::Timeout {
                        timeout: self.config.timeout,
                        finished,
                        workers,
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ExecutionError::WorkerLost {
                        lost: workers - finished,
                        workers,
                    });
                }
            }
        }
        trace!(workers, events = collected.len(), "Phase complete");
        Ok(collected)
    }
}

fn spin(rng: &mut ChaCha8Rng, max_spin: u32) {
    if max_spin == 0 {
        return;
    }
    for _ in 0..rng.gen_range(0..=max_spin) {
        std::hint::spin_loop();
    }
}

//! Failing-scenario minimization.
//!
//! Repeatedly tries to drop a single invocation from the scenario and keeps
//! the smaller scenario whenever it still fails. Workers left without
//! invocations disappear with their last invocation. The search restarts
//! after every successful removal and stops when no single removal
//! reproduces the failure.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use linprobe_core::{ActorId, Scenario};

/// Statistics from a minimization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimizationStats {
    /// Invocations in the scenario before minimization.
    pub original_size: usize,
    /// Invocations in the scenario after minimization.
    pub final_size: usize,
    /// Candidate scenarios tried.
    pub checks_performed: usize,
    /// Candidates that still failed and were kept.
    pub successful_removals: usize,
    /// Candidates that passed and were discarded.
    pub failed_removals: usize,
}

/// A minimized scenario together with the evidence of its failure.
#[derive(Debug, Clone)]
pub struct Minimized<X> {
    pub scenario: Scenario,
    pub evidence: X,
    pub stats: MinimizationStats,
}

/// Shrinks failing scenarios one invocation at a time.
#[derive(Debug, Clone)]
pub struct ScenarioMinimizer {
    max_checks: usize,
}

impl Default for ScenarioMinimizer {
    fn default() -> Self {
        Self { max_checks: 1_000 }
    }
}

impl ScenarioMinimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the number of candidate scenarios tried.
    pub fn with_max_checks(mut self, max_checks: usize) -> Self {
        self.max_checks = max_checks;
        self
    }

    /// Minimize `scenario`, which is known to fail with `evidence`.
    ///
    /// `reproduce` runs a candidate and returns new evidence if it still
    /// fails. Errors from `reproduce` abort minimization.
    pub fn minimize<X, E, F>(
        &self,
        scenario: Scenario,
        evidence: X,
        mut reproduce: F,
    ) -> Result<Minimized<X>, E>
    where
        F: FnMut(&Scenario) -> Result<Option<X>, E>,
    {
        let mut stats = MinimizationStats {
            original_size: scenario.total_invocations(),
            ..Default::default()
        };
        info!(
            original_size = stats.original_size,
            threads = scenario.threads(),
            "Starting scenario minimization"
        );

        let mut current = scenario;
        let mut evidence = evidence;
        let mut made_progress = true;

        while made_progress && stats.checks_performed < self.max_checks {
            made_progress = false;

            for (actor, index) in removal_candidates(&current) {
                if stats.checks_performed >= self.max_checks {
                    debug!(max_checks = self.max_checks, "Minimization check budget spent");
                    break;
                }
                let Some(candidate) = current.without_invocation(actor, index) else {
                    continue;
                };
                if candidate.threads() == 0 {
                    continue;
                }

                stats.checks_performed += 1;
                if let Some(found) = reproduce(&candidate)? {
                    trace!(%actor, index, "Removed invocation");
                    current = candidate;
                    evidence = found;
                    stats.successful_removals += 1;
                    made_progress = true;
                    break;
                }
                stats.failed_removals += 1;
            }
        }

        stats.final_size = current.total_invocations();
        info!(
            original_size = stats.original_size,
            final_size = stats.final_size,
            checks = stats.checks_performed,
            "Scenario minimization complete"
        );

        Ok(Minimized {
            scenario: current,
            evidence,
            stats,
        })
    }
}

/// Positions to try removing, later invocations first within each lane,
/// parallel lanes before the sequential parts.
fn removal_candidates(scenario: &Scenario) -> Vec<(ActorId, usize)> {
    let mut lanes = scenario.lanes();
    lanes.sort_by_key(|(actor, _)| !actor.is_parallel());
    lanes
        .into_iter()
        .flat_map(|(actor, invocations)| (0..invocations.len()).rev().map(move |i| (actor, i)))
        .collect()
}

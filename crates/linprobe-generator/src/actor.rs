//! Scenario generation.

use rand::{Rng, RngCore};
use tracing::trace;

use linprobe_core::{Actor, ConfigError, CountRange, Invocation, OperationSpec, Scenario};

use crate::param::ParamBinder;

/// Produces one scenario per iteration: one actor per worker thread plus
/// the optional sequential init and post parts.
#[derive(Debug)]
pub struct ActorGenerator {
    operations: Vec<OperationSpec>,
    binder: ParamBinder,
    ranges: Vec<CountRange>,
    actors_before: usize,
    actors_after: usize,
}

impl ActorGenerator {
    /// Create a generator for `ranges.len()` worker threads.
    pub fn new(
        operations: Vec<OperationSpec>,
        binder: ParamBinder,
        ranges: Vec<CountRange>,
    ) -> Result<Self, ConfigError> {
        if operations.is_empty() {
            return Err(ConfigError::NoOperations);
        }
        if ranges.is_empty() {
            return Err(ConfigError::NoThreads);
        }
        for range in &ranges {
            CountRange::new(range.min, range.max)?;
        }
        Ok(Self {
            operations,
            binder,
            ranges,
            actors_before: 0,
            actors_after: 0,
        })
    }

    /// Generate `before` sequential operations ahead of the workers and
    /// `after` once they finish.
    pub fn with_sequential_parts(mut self, before: usize, after: usize) -> Self {
        self.actors_before = before;
        self.actors_after = after;
        self
    }

    /// Number of worker threads per scenario.
    pub fn threads(&self) -> usize {
        self.ranges.len()
    }

    fn invocation(&self, rng: &mut dyn RngCore) -> Invocation {
        let operation = &self.operations[rng.gen_range(0..self.operations.len())];
        self.binder.bind(operation, rng)
    }

    fn sequence(&self, len: usize, rng: &mut dyn RngCore) -> Vec<Invocation> {
        (0..len).map(|_| self.invocation(rng)).collect()
    }

    /// Generate the next scenario.
    pub fn generate(&self, rng: &mut dyn RngCore) -> Scenario {
        let init = self.sequence(self.actors_before, rng);
        let parallel = self
            .ranges
            .iter()
            .map(|range| {
                let len = rng.gen_range(range.min..=range.max);
                Actor::new(self.sequence(len, rng))
            })
            .collect();
        let post = self.sequence(self.actors_after, rng);

        let scenario = Scenario::new(parallel).with_init(init).with_post(post);
        trace!(
            threads = scenario.threads(),
            invocations = scenario.total_invocations(),
            "Generated scenario"
        );
        scenario
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linprobe_core::ParamSpec;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeMap;

    fn set_ops() -> Vec<OperationSpec> {
        vec![
            OperationSpec::new("add").param(ParamSpec::int("key", "1:10")),
            OperationSpec::new("remove").param(ParamSpec::int("key", "1:10")),
        ]
    }

    fn generator(ranges: &[&str]) -> ActorGenerator {
        let ops = set_ops();
        let binder = ParamBinder::new(&ops, &BTreeMap::new()).unwrap();
        let ranges = ranges.iter().map(|r| CountRange::parse(r).unwrap()).collect();
        ActorGenerator::new(ops, binder, ranges).unwrap()
    }

    #[test]
    fn test_actor_lengths_within_range() {
        let generator = generator(&["1:3", "1:3", "1:3"]);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut lengths = std::collections::BTreeSet::new();

        for _ in 0..200 {
            let scenario = generator.generate(&mut rng);
            assert_eq!(scenario.threads(), 3);
            assert!(scenario.init.is_empty());
            for actor in &scenario.parallel {
                assert!((1..=3).contains(&actor.len()));
                lengths.insert(actor.len());
                for inv in &actor.invocations {
                    assert!(inv.operation == "add" || inv.operation == "remove");
                    let key = inv.args[0].as_i64().unwrap();
                    assert!((1..=10).contains(&key));
                }
            }
        }
        assert_eq!(lengths.len(), 3);
    }

    #[test]
    fn test_exact_range_and_sequential_parts() {
        let generator = generator(&["2:2"]).with_sequential_parts(3, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let scenario = generator.generate(&mut rng);
        assert_eq!(scenario.parallel[0].len(), 2);
        assert_eq!(scenario.init.len(), 3);
        assert_eq!(scenario.post.len(), 1);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let generator = generator(&["1:3", "1:3"]);
        let run = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            (0..20).map(|_| generator.generate(&mut rng)).collect::<Vec<_>>()
        };
        assert_eq!(run(9), run(9));
        assert_ne!(run(9), run(10));
    }

    #[test]
    fn test_rejects_bad_configuration() {
        let ops = set_ops();
        let binder = || ParamBinder::new(&ops, &BTreeMap::new()).unwrap();

        assert_eq!(
            ActorGenerator::new(ops.clone(), binder(), vec![]).unwrap_err(),
            ConfigError::NoThreads
        );
        assert_eq!(
            ActorGenerator::new(vec![], binder(), vec![CountRange { min: 1, max: 2 }])
                .unwrap_err(),
            ConfigError::NoOperations
        );
        assert!(matches!(
            ActorGenerator::new(ops.clone(), binder(), vec![CountRange { min: 3, max: 1 }]),
            Err(ConfigError::InvalidRange { .. })
        ));
        assert!(matches!(
            ActorGenerator::new(ops.clone(), binder(), vec![CountRange { min: 0, max: 1 }]),
            Err(ConfigError::InvalidRange { .. })
        ));
    }
}

//! Linearizability verification.
//!
//! The history is split into one lane per actor, each holding that actor's
//! operations in program order. A search node is a vector of per-lane
//! cursors (how many operations of each lane are already linearized) plus
//! the model state reached by linearizing them. From a node, the next
//! pending operation of a lane may be linearized unless some other lane's
//! pending operation returned before it was invoked; the candidate is
//! applied to the model and kept only if the model reproduces the recorded
//! outcome.
//!
//! Nodes live in an arena and are indexed by a hash of (cursors, state), so
//! a node reached twice through different interleavings is expanded once.
//! The depth-first search is driven by an explicit stack, and a witness is
//! rebuilt from parent links when every cursor reaches its lane's end.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use tracing::{debug, instrument};

use linprobe_core::{ActorId, CompletedOp, History, HistoryError};

use crate::model::Model;
use crate::verdict::{OpRef, SearchStats, Verdict, Witness};

/// Configuration for the linearizability checker.
#[derive(Debug, Clone)]
pub struct LinearizabilityConfig {
    /// Maximum number of model steps before giving up (None for unbounded).
    pub max_states: Option<u64>,
    /// Skip successor nodes that were already explored.
    pub enable_caching: bool,
}

impl Default for LinearizabilityConfig {
    fn default() -> Self {
        Self {
            max_states: Some(1_000_000),
            enable_caching: true,
        }
    }
}

impl LinearizabilityConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the step budget.
    pub fn with_max_states(mut self, max_states: Option<u64>) -> Self {
        self.max_states = max_states;
        self
    }

    /// Disable memoization.
    pub fn without_caching(mut self) -> Self {
        self.enable_caching = false;
        self
    }
}

/// Decides whether histories are linearizable with respect to a model.
#[derive(Debug, Clone)]
pub struct LinearizabilityChecker<M> {
    model: M,
    config: LinearizabilityConfig,
}

impl<M: Model> LinearizabilityChecker<M> {
    /// Create a checker with the default configuration.
    pub fn new(model: M) -> Self {
        Self::with_config(model, LinearizabilityConfig::default())
    }

    /// Create a checker with a custom configuration.
    pub fn with_config(model: M, config: LinearizabilityConfig) -> Self {
        Self { model, config }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn config(&self) -> &LinearizabilityConfig {
        &self.config
    }

    /// Check one history.
    ///
    /// Fails only if the history is malformed. The verdict depends on the
    /// history alone: checking the same history twice yields the same
    /// verdict and witness.
    #[instrument(level = "debug", skip_all, fields(model = self.model.name(), events = history.len()))]
    pub fn check(&self, history: &History) -> Result<Verdict, HistoryError> {
        let lanes = Lane::split(history.operations()?);
        let mut search = Search::new(&self.model, &self.config, &lanes);
        let outcome = search.run();
        let stats = search.stats;

        let verdict = match outcome {
            SearchOutcome::Found(node) => Verdict::Linearizable {
                witness: search.witness(node),
                stats,
            },
            SearchOutcome::Exhausted => Verdict::Violation {
                history: history.clone(),
                longest_prefix: search.witness(search.deepest),
                stats,
            },
            SearchOutcome::BudgetExceeded(limit) => Verdict::Inconclusive {
                reason: format!("search budget of {limit} states exhausted"),
                stats,
            },
        };

        debug!(
            states_explored = stats.states_explored,
            memo_hits = stats.memo_hits,
            mismatches = stats.mismatches,
            max_depth = stats.max_depth,
            linearizable = verdict.is_linearizable(),
            "Linearizability check complete"
        );
        Ok(verdict)
    }
}

/// One actor's operations in program order.
struct Lane {
    actor: ActorId,
    ops: Vec<CompletedOp>,
}

impl Lane {
    /// Group operations (sorted by actor, then index) into lanes.
    fn split(ops: Vec<CompletedOp>) -> Vec<Lane> {
        let mut lanes: Vec<Lane> = Vec::new();
        for op in ops {
            match lanes.last_mut() {
                Some(lane) if lane.actor == op.actor => lane.ops.push(op),
                _ => lanes.push(Lane {
                    actor: op.actor,
                    ops: vec![op],
                }),
            }
        }
        lanes
    }
}

struct Node<S> {
    cursors: Vec<usize>,
    state: S,
    parent: Option<usize>,
    /// Lane whose operation led here from the parent.
    via: usize,
    depth: usize,
}

#[derive(Clone, Copy)]
struct Frame {
    node: usize,
    next_lane: usize,
}

enum SearchOutcome {
    Found(usize),
    Exhausted,
    BudgetExceeded(u64),
}

struct Search<'a, M: Model> {
    model: &'a M,
    config: &'a LinearizabilityConfig,
    lanes: &'a [Lane],
    total: usize,
    arena: Vec<Node<M::State>>,
    memo: HashMap<u64, Vec<usize>>,
    stats: SearchStats,
    deepest: usize,
}

impl<'a, M: Model> Search<'a, M> {
    fn new(model: &'a M, config: &'a LinearizabilityConfig, lanes: &'a [Lane]) -> Self {
        Self {
            model,
            config,
            lanes,
            total: lanes.iter().map(|l| l.ops.len()).sum(),
            arena: Vec::new(),
            memo: HashMap::new(),
            stats: SearchStats::default(),
            deepest: 0,
        }
    }

    fn key_hash(cursors: &[usize], state: &M::State) -> u64 {
        let mut hasher = DefaultHasher::new();
        cursors.hash(&mut hasher);
        state.hash(&mut hasher);
        hasher.finish()
    }

    fn seen(&self, hash: u64, cursors: &[usize], state: &M::State) -> bool {
        self.memo.get(&hash).is_some_and(|ids| {
            ids.iter()
                .any(|&id| self.arena[id].cursors == cursors && self.arena[id].state == *state)
        })
    }

    /// The pending operation of `lane`, if no other pending operation
    /// returned before it was invoked.
    ///
    /// Only the earliest pending operation of each other lane needs
    /// checking: later ones return after it does.
    fn eligible(&self, cursors: &[usize], lane: usize) -> Option<&'a CompletedOp> {
        let lanes = self.lanes;
        let candidate = lanes[lane].ops.get(cursors[lane])?;
        let blocked = lanes.iter().enumerate().any(|(other, l)| {
            other != lane
                && l.ops
                    .get(cursors[other])
                    .is_some_and(|pending| pending.happens_before(candidate))
        });
        (!blocked).then_some(candidate)
    }

    fn run(&mut self) -> SearchOutcome {
        let root = Node {
            cursors: vec![0; self.lanes.len()],
            state: self.model.init(),
            parent: None,
            via: 0,
            depth: 0,
        };
        if self.config.enable_caching {
            let hash = Self::key_hash(&root.cursors, &root.state);
            self.memo.entry(hash).or_default().push(0);
        }
        self.arena.push(root);
        if self.total == 0 {
            return SearchOutcome::Found(0);
        }

        let mut stack = vec![Frame {
            node: 0,
            next_lane: 0,
        }];

        while let Some(frame) = stack.last().copied() {
            let mut descended = None;

            for lane in frame.next_lane..self.lanes.len() {
                let Some(op) = self.eligible(&self.arena[frame.node].cursors, lane) else {
                    continue;
                };

                if let Some(limit) = self.config.max_states {
                    if self.stats.states_explored >= limit {
                        return SearchOutcome::BudgetExceeded(limit);
                    }
                }
                self.stats.states_explored += 1;

                let (state, outcome) = self
                    .model
                    .step(&self.arena[frame.node].state, &op.invocation);
                if outcome != op.outcome {
                    self.stats.mismatches += 1;
                    continue;
                }

                let mut cursors = self.arena[frame.node].cursors.clone();
                cursors[lane] += 1;

                let hash = if self.config.enable_caching {
                    let hash = Self::key_hash(&cursors, &state);
                    if self.seen(hash, &cursors, &state) {
                        self.stats.memo_hits += 1;
                        continue;
                    }
                    Some(hash)
                } else {
                    None
                };

                let depth = self.arena[frame.node].depth + 1;
                let id = self.arena.len();
                self.arena.push(Node {
                    cursors,
                    state,
                    parent: Some(frame.node),
                    via: lane,
                    depth,
                });
                if let Some(hash) = hash {
                    self.memo.entry(hash).or_default().push(id);
                }
                if depth > self.arena[self.deepest].depth {
                    self.deepest = id;
                    self.stats.max_depth = depth;
                }
                if depth == self.total {
                    return SearchOutcome::Found(id);
                }

                descended = Some((lane, id));
                break;
            }

            match descended {
                Some((lane, id)) => {
                    if let Some(top) = stack.last_mut() {
                        top.next_lane = lane + 1;
                    }
                    stack.push(Frame {
                        node: id,
                        next_lane: 0,
                    });
                }
                None => {
                    stack.pop();
                }
            }
        }

        SearchOutcome::Exhausted
    }

    /// The operations linearized on the path from the root to `node`.
    fn witness(&self, node: usize) -> Witness {
        let mut order = Vec::with_capacity(self.arena[node].depth);
        let mut current = node;
        while let Some(parent) = self.arena[current].parent {
            let lane = self.arena[current].via;
            let index = self.arena[current].cursors[lane] - 1;
            order.push(OpRef::new(self.lanes[lane].actor, self.lanes[lane].ops[index].index));
            current = parent;
        }
        order.reverse();
        Witness::new(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SequentialSpec;
    use linprobe_core::{Event, ExceptionKind, Invocation, Outcome, Timestamp, Value};
    use serde_json::json;
    use std::collections::{BTreeSet, VecDeque};

    fn set_model() -> SequentialSpec<BTreeSet<i64>> {
        SequentialSpec::new("set", BTreeSet::new())
            .operation("add", |s: &mut BTreeSet<i64>, (k,): (i64,)| Ok(s.insert(k)))
            .operation("remove", |s: &mut BTreeSet<i64>, (k,): (i64,)| Ok(s.remove(&k)))
            .operation("contains", |s: &mut BTreeSet<i64>, (k,): (i64,)| {
                Ok(s.contains(&k))
            })
    }

    fn register_model() -> SequentialSpec<i64> {
        SequentialSpec::new("register", 0)
            .operation("write", |r: &mut i64, (v,): (i64,)| {
                *r = v;
                Ok(())
            })
            .nullary("read", |r: &mut i64| Ok(*r))
    }

    /// Builds histories from (actor, name, args, outcome, invoke, return) rows.
    struct Builder {
        events: Vec<Event>,
        next_index: HashMap<ActorId, usize>,
    }

    impl Builder {
        fn new() -> Self {
            Self {
                events: Vec::new(),
                next_index: HashMap::new(),
            }
        }

        fn op(
            mut self,
            actor: ActorId,
            name: &str,
            args: Vec<Value>,
            outcome: Outcome,
            invoked: u64,
            returned: u64,
        ) -> Self {
            let index = self.next_index.entry(actor).or_insert(0);
            let i = *index;
            *index += 1;
            self.events.push(Event::invoke(
                actor,
                i,
                Invocation::new(name, args),
                Timestamp(invoked),
            ));
            self.events
                .push(Event::response(actor, i, outcome, Timestamp(returned)));
            self
        }

        fn build(self) -> History {
            History::from_events(self.events)
        }
    }

    const T0: ActorId = ActorId(0);
    const T1: ActorId = ActorId(1);
    const T2: ActorId = ActorId(2);

    #[test]
    fn test_empty_history_is_linearizable() {
        let verdict = LinearizabilityChecker::new(set_model())
            .check(&History::new())
            .unwrap();
        assert_eq!(
            verdict,
            Verdict::Linearizable {
                witness: Witness::default(),
                stats: SearchStats::default(),
            }
        );
    }

    #[test]
    fn test_sequential_history_matches_replay() {
        let valid = Builder::new()
            .op(T0, "add", vec![json!(1)], Outcome::ok(true), 0, 1)
            .op(T1, "add", vec![json!(1)], Outcome::ok(false), 2, 3)
            .op(T0, "remove", vec![json!(1)], Outcome::ok(true), 4, 5)
            .build();
        let verdict = LinearizabilityChecker::new(set_model())
            .check(&valid)
            .unwrap();
        let Verdict::Linearizable { witness, .. } = verdict else {
            panic!("expected linearizable, got {verdict}");
        };
        assert_eq!(
            witness.order,
            vec![OpRef::new(T0, 0), OpRef::new(T1, 0), OpRef::new(T0, 1)]
        );

        // Same shape, but the second add claims success.
        let invalid = Builder::new()
            .op(T0, "add", vec![json!(1)], Outcome::ok(true), 0, 1)
            .op(T1, "add", vec![json!(1)], Outcome::ok(true), 2, 3)
            .build();
        let verdict = LinearizabilityChecker::new(set_model())
            .check(&invalid)
            .unwrap();
        let Verdict::Violation { longest_prefix, .. } = verdict else {
            panic!("expected violation, got {verdict}");
        };
        assert_eq!(longest_prefix.order, vec![OpRef::new(T0, 0)]);
    }

    #[test]
    fn test_overlapping_operations_may_reorder() {
        // T1's add(1) is invoked first but returns false: only valid if
        // T0's overlapping add(1) is linearized before it.
        let history = Builder::new()
            .op(T1, "add", vec![json!(1)], Outcome::ok(false), 0, 3)
            .op(T0, "add", vec![json!(1)], Outcome::ok(true), 1, 2)
            .build();
        let verdict = LinearizabilityChecker::new(set_model())
            .check(&history)
            .unwrap();
        let Verdict::Linearizable { witness, .. } = verdict else {
            panic!("expected linearizable, got {verdict}");
        };
        assert_eq!(witness.order, vec![OpRef::new(T0, 0), OpRef::new(T1, 0)]);
    }

    #[test]
    fn test_concurrent_double_add_is_violation() {
        let history = Builder::new()
            .op(T0, "add", vec![json!(1)], Outcome::ok(true), 0, 2)
            .op(T1, "add", vec![json!(1)], Outcome::ok(true), 1, 3)
            .build();
        let verdict = LinearizabilityChecker::new(set_model())
            .check(&history)
            .unwrap();
        assert!(verdict.is_violation());
        assert_eq!(verdict.stats().mismatches, 2);
    }

    #[test]
    fn test_happens_before_is_respected() {
        // write(1) completes before read() starts, so read() -> 0 is stale.
        let history = Builder::new()
            .op(T0, "write", vec![json!(1)], Outcome::unit(), 0, 1)
            .op(T1, "read", vec![], Outcome::ok(0), 2, 3)
            .build();
        let verdict = LinearizabilityChecker::new(register_model())
            .check(&history)
            .unwrap();
        assert!(verdict.is_violation());

        // The same read overlapping the write may observe the old value.
        let history = Builder::new()
            .op(T0, "write", vec![json!(1)], Outcome::unit(), 0, 3)
            .op(T1, "read", vec![], Outcome::ok(0), 1, 2)
            .build();
        let verdict = LinearizabilityChecker::new(register_model())
            .check(&history)
            .unwrap();
        assert!(verdict.is_linearizable());
    }

    #[test]
    fn test_exceptions_compare_by_kind() {
        let model = SequentialSpec::new("queue", VecDeque::<i64>::new())
            .operation("offer", |q: &mut VecDeque<i64>, (v,): (i64,)| {
                q.push_back(v);
                Ok(())
            })
            .nullary("poll", |q: &mut VecDeque<i64>| {
                q.pop_front().ok_or_else(|| ExceptionKind::new("empty"))
            });

        let history = Builder::new()
            .op(T0, "poll", vec![], Outcome::threw_with("empty", "nothing queued"), 0, 1)
            .op(T0, "offer", vec![json!(2)], Outcome::unit(), 2, 3)
            .op(T1, "poll", vec![], Outcome::ok(2), 4, 5)
            .build();
        let verdict = LinearizabilityChecker::new(model).check(&history).unwrap();
        assert!(verdict.is_linearizable());
    }

    #[test]
    fn test_init_and_post_lanes_are_ordered_by_timestamps() {
        let history = Builder::new()
            .op(ActorId::INIT, "add", vec![json!(5)], Outcome::ok(true), 0, 1)
            .op(T0, "remove", vec![json!(5)], Outcome::ok(true), 2, 5)
            .op(T1, "remove", vec![json!(5)], Outcome::ok(false), 3, 4)
            .op(ActorId::POST, "contains", vec![json!(5)], Outcome::ok(false), 6, 7)
            .build();
        let verdict = LinearizabilityChecker::new(set_model())
            .check(&history)
            .unwrap();
        assert!(verdict.is_linearizable());

        let history = Builder::new()
            .op(ActorId::INIT, "add", vec![json!(5)], Outcome::ok(true), 0, 1)
            .op(T0, "remove", vec![json!(5)], Outcome::ok(true), 2, 3)
            .op(ActorId::POST, "contains", vec![json!(5)], Outcome::ok(true), 4, 5)
            .build();
        let verdict = LinearizabilityChecker::new(set_model())
            .check(&history)
            .unwrap();
        assert!(verdict.is_violation());
    }

    /// Three writers interleave freely, then a post read observes a value
    /// no writer produced. Every interleaving must be refuted.
    fn unreachable_read() -> History {
        Builder::new()
            .op(T0, "add", vec![json!(1)], Outcome::ok(true), 0, 10)
            .op(T0, "add", vec![json!(2)], Outcome::ok(true), 11, 20)
            .op(T1, "add", vec![json!(3)], Outcome::ok(true), 1, 12)
            .op(T1, "add", vec![json!(4)], Outcome::ok(true), 13, 21)
            .op(T2, "add", vec![json!(5)], Outcome::ok(true), 2, 14)
            .op(T2, "add", vec![json!(6)], Outcome::ok(true), 15, 22)
            .op(ActorId::POST, "contains", vec![json!(9)], Outcome::ok(true), 30, 31)
            .build()
    }

    #[test]
    fn test_memoization_prunes_without_changing_verdict() {
        let history = unreachable_read();

        let cached = LinearizabilityChecker::new(set_model())
            .check(&history)
            .unwrap();
        let uncached = LinearizabilityChecker::with_config(
            set_model(),
            LinearizabilityConfig::new().without_caching(),
        )
        .check(&history)
        .unwrap();

        assert!(cached.is_violation());
        assert!(uncached.is_violation());
        assert!(cached.stats().memo_hits > 0);
        assert_eq!(uncached.stats().memo_hits, 0);
        assert!(cached.stats().states_explored < uncached.stats().states_explored);
        assert_eq!(cached.stats().max_depth, 6);
    }

    #[test]
    fn test_budget_yields_inconclusive() {
        let checker = LinearizabilityChecker::with_config(
            set_model(),
            LinearizabilityConfig::new().with_max_states(Some(3)),
        );
        let verdict = checker.check(&unreachable_read()).unwrap();
        assert!(verdict.is_inconclusive());
        assert_eq!(verdict.stats().states_explored, 3);
    }

    #[test]
    fn test_deterministic() {
        let history = Builder::new()
            .op(T0, "add", vec![json!(1)], Outcome::ok(true), 0, 5)
            .op(T1, "remove", vec![json!(1)], Outcome::ok(true), 1, 6)
            .op(T2, "add", vec![json!(1)], Outcome::ok(true), 2, 7)
            .build();
        let checker = LinearizabilityChecker::new(set_model());
        let first = checker.check(&history).unwrap();
        let second = checker.check(&history).unwrap();
        assert!(first.is_linearizable());
        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_history_is_an_error() {
        let history = History::from_events(vec![Event::invoke(
            T0,
            0,
            Invocation::new("add", vec![json!(1)]),
            Timestamp(0),
        )]);
        let err = LinearizabilityChecker::new(set_model())
            .check(&history)
            .unwrap_err();
        assert_eq!(err, HistoryError::MissingResponse { actor: T0, index: 0 });
    }
}

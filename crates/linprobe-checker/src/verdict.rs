//! Verification results.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use linprobe_core::{ActorId, CompletedOp, History};

/// Reference to one operation of a history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OpRef {
    pub actor: ActorId,
    pub index: usize,
}

impl OpRef {
    pub fn new(actor: ActorId, index: usize) -> Self {
        Self { actor, index }
    }
}

impl fmt::Display for OpRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.actor, self.index)
    }
}

/// A sequential order over (a prefix of) a history's operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Witness {
    pub order: Vec<OpRef>,
}

impl Witness {
    pub fn new(order: Vec<OpRef>) -> Self {
        Self { order }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// One line per operation, `T0: add(1): true`, in witness order.
    ///
    /// Operations missing from `history` are rendered by reference only.
    pub fn render(&self, history: &History) -> String {
        let ops: HashMap<OpRef, CompletedOp> = history
            .operations()
            .unwrap_or_default()
            .into_iter()
            .map(|op| (OpRef::new(op.actor, op.index), op))
            .collect();
        self.order
            .iter()
            .map(|r| match ops.get(r) {
                Some(op) => format!("{op}\n"),
                None => format!("{r}\n"),
            })
            .collect()
    }
}

impl fmt::Display for Witness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let refs: Vec<String> = self.order.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", refs.join(", "))
    }
}

/// Counters describing one verifier search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Model steps taken.
    pub states_explored: u64,
    /// Successor states skipped because they were already explored.
    pub memo_hits: u64,
    /// Steps whose model outcome differed from the recorded one.
    pub mismatches: u64,
    /// Length of the longest prefix reached.
    pub max_depth: usize,
}

impl SearchStats {
    /// Accumulate another search's counters.
    pub fn merge(&mut self, other: &SearchStats) {
        self.states_explored += other.states_explored;
        self.memo_hits += other.memo_hits;
        self.mismatches += other.mismatches;
        self.max_depth = self.max_depth.max(other.max_depth);
    }
}

/// Outcome of checking one history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// A witness reproducing every response exists.
    Linearizable { witness: Witness, stats: SearchStats },

    /// No witness exists.
    Violation {
        history: History,
        /// The longest prefix the search could linearize.
        longest_prefix: Witness,
        stats: SearchStats,
    },

    /// The search gave up before reaching a decision.
    Inconclusive { reason: String, stats: SearchStats },
}

impl Verdict {
    pub fn is_linearizable(&self) -> bool {
        matches!(self, Self::Linearizable { .. })
    }

    pub fn is_violation(&self) -> bool {
        matches!(self, Self::Violation { .. })
    }

    pub fn is_inconclusive(&self) -> bool {
        matches!(self, Self::Inconclusive { .. })
    }

    pub fn stats(&self) -> &SearchStats {
        match self {
            Self::Linearizable { stats, .. }
            | Self::Violation { stats, .. }
            | Self::Inconclusive { stats, .. } => stats,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linearizable { witness, .. } => write!(f, "linearizable via {witness}"),
            Self::Violation { longest_prefix, .. } => write!(
                f,
                "not linearizable (longest linearizable prefix: {longest_prefix})"
            ),
            Self::Inconclusive { reason, .. } => write!(f, "inconclusive: {reason}"),
        }
    }
}

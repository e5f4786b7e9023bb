//! Execution histories.
//!
//! A [`History`] holds every invocation and response event of one
//! iteration, stamped from a shared [`LogicalClock`]. Timestamps define the
//! happens-before order: an operation whose response precedes another's
//! invocation is ordered before it; overlapping operations are unordered.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HistoryError;
use crate::operation::{Invocation, Outcome};
use crate::scenario::ActorId;

/// Unique identifier for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Create a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical timestamp drawn from a [`LogicalClock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared, strictly increasing logical clock.
///
/// Clones share the same counter, so one clock handed to every worker of
/// a run yields globally unique, totally ordered timestamps.
#[derive(Debug, Clone, Default)]
pub struct LogicalClock {
    counter: Arc<AtomicU64>,
}

impl LogicalClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next timestamp.
    pub fn tick(&self) -> Timestamp {
        Timestamp(self.counter.fetch_add(1, Ordering::SeqCst))
    }

    /// The timestamp the next `tick` will return.
    pub fn peek(&self) -> Timestamp {
        Timestamp(self.counter.load(Ordering::SeqCst))
    }
}

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An operation was invoked.
    Invoke {
        actor: ActorId,
        index: usize,
        invocation: Invocation,
        at: Timestamp,
    },
    /// An operation returned or raised.
    Response {
        actor: ActorId,
        index: usize,
        outcome: Outcome,
        at: Timestamp,
    },
}

impl Event {
    pub fn invoke(actor: ActorId, index: usize, invocation: Invocation, at: Timestamp) -> Self {
        Self::Invoke {
            actor,
            index,
            invocation,
            at,
        }
    }

    pub fn response(actor: ActorId, index: usize, outcome: Outcome, at: Timestamp) -> Self {
        Self::Response {
            actor,
            index,
            outcome,
            at,
        }
    }

    pub fn actor(&self) -> ActorId {
        match self {
            Self::Invoke { actor, .. } | Self::Response { actor, .. } => *actor,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Invoke { index, .. } | Self::Response { index, .. } => *index,
        }
    }

    pub fn at(&self) -> Timestamp {
        match self {
            Self::Invoke { at, .. } | Self::Response { at, .. } => *at,
        }
    }

    pub fn is_invoke(&self) -> bool {
        matches!(self, Self::Invoke { .. })
    }
}

/// A paired invocation and response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedOp {
    pub actor: ActorId,
    pub index: usize,
    pub invocation: Invocation,
    pub outcome: Outcome,
    pub invoked_at: Timestamp,
    pub returned_at: Timestamp,
}

impl CompletedOp {
    /// Whether this operation returned before `other` was invoked.
    pub fn happens_before(&self, other: &CompletedOp) -> bool {
        self.returned_at < other.invoked_at
    }

    /// Whether neither operation happens before the other.
    pub fn overlaps(&self, other: &CompletedOp) -> bool {
        !self.happens_before(other) && !other.happens_before(self)
    }
}

impl fmt::Display for CompletedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.actor, self.invocation, self.outcome)
    }
}

#[derive(Default)]
struct Pairing<'a> {
    invoke: Option<(&'a Invocation, Timestamp)>,
    response: Option<(&'a Outcome, Timestamp)>,
}

/// All events of one iteration, ordered by timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    events: Vec<Event>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history from events in any order.
    pub fn from_events(events: Vec<Event>) -> Self {
        let mut history = Self { events };
        history.sort();
        history
    }

    /// Append an event.
    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Append many events.
    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events.extend(events);
    }

    /// Order events by timestamp.
    pub fn sort(&mut self) {
        self.events.sort_by_key(Event::at);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Every actor that appears in the history.
    pub fn actors(&self) -> BTreeSet<ActorId> {
        self.events.iter().map(Event::actor).collect()
    }

    fn pair(&self) -> Result<BTreeMap<(ActorId, usize), Pairing<'_>>, HistoryError> {
        let mut pairs: BTreeMap<(ActorId, usize), Pairing<'_>> = BTreeMap::new();
        for event in &self.events {
            let entry = pairs.entry((event.actor(), event.index())).or_default();
            match event {
                Event::Invoke {
                    actor,
                    index,
                    invocation,
                    at,
                } => {
                    if entry.invoke.is_some() {
                        return Err(HistoryError::DuplicateEvent {
                            actor: *actor,
                            index: *index,
                            kind: "invoke",
                        });
                    }
                    entry.invoke = Some((invocation, *at));
                }
                Event::Response {
                    actor,
                    index,
                    outcome,
                    at,
                } => {
                    if entry.response.is_some() {
                        return Err(HistoryError::DuplicateEvent {
                            actor: *actor,
                            index: *index,
                            kind: "response",
                        });
                    }
                    entry.response = Some((outcome, *at));
                }
            }
        }
        Ok(pairs)
    }

    /// Check that every invocation has exactly one later response and that
    /// each actor's operations are numbered contiguously from zero.
    pub fn validate(&self) -> Result<(), HistoryError> {
        self.operations().map(|_| ())
    }

    /// Pair invocations with responses, ordered by actor and index.
    pub fn operations(&self) -> Result<Vec<CompletedOp>, HistoryError> {
        let pairs = self.pair()?;
        let mut ops = Vec::with_capacity(pairs.len());
        let mut expected: Option<(ActorId, usize)> = None;

        for ((actor, index), pairing) in pairs {
            let next_index = match expected {
                Some((a, i)) if a == actor => i,
                _ => 0,
            };
            if index != next_index {
                return Err(HistoryError::IndexGap {
                    actor,
                    index: next_index,
                });
            }
            expected = Some((actor, index + 1));

            let (invocation, invoked_at) = pairing
                .invoke
                .ok_or(HistoryError::UnmatchedResponse { actor, index })?;
            let (outcome, returned_at) = pairing
                .response
                .ok_or(HistoryError::MissingResponse { actor, index })?;
            if returned_at <= invoked_at {
                return Err(HistoryError::ResponseBeforeInvoke { actor, index });
            }

            ops.push(CompletedOp {
                actor,
                index,
                invocation: invocation.clone(),
                outcome: outcome.clone(),
                invoked_at,
                returned_at,
            });
        }
        Ok(ops)
    }

    /// Render the events as a table with one column per actor.
    pub fn render_table(&self) -> String {
        let actors: Vec<ActorId> = self.actors().into_iter().collect();
        let mut out = String::new();

        let ts_width = self
            .events
            .last()
            .map(|e| e.at().to_string().len())
            .unwrap_or(1)
            .max(2);
        let cells: Vec<(usize, String)> = self
            .events
            .iter()
            .map(|event| {
                let column = actors
                    .iter()
                    .position(|a| *a == event.actor())
                    .unwrap_or(0);
                let text = match event {
                    Event::Invoke { invocation, .. } => invocation.to_string(),
                    Event::Response { outcome, .. } => format!("-> {outcome}"),
                };
                (column, text)
            })
            .collect();
        let widths: Vec<usize> = actors
            .iter()
            .enumerate()
            .map(|(col, actor)| {
                cells
                    .iter()
                    .filter(|(c, _)| *c == col)
                    .map(|(_, text)| text.len())
                    .chain(std::iter::once(actor.to_string().len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        out.push_str(&format!("| {:>ts_width$} |", "ts"));
        for (actor, width) in actors.iter().zip(&widths) {
            out.push_str(&format!(" {:<width$} |", actor.to_string()));
        }
        out.push('\n');

        for (event, (column, text)) in self.events.iter().zip(&cells) {
            out.push_str(&format!("| {:>ts_width$} |", event.at().to_string()));
            for (col, width) in widths.iter().enumerate() {
                let cell = if col == *column { text.as_str() } else { "" };
                out.push_str(&format!(" {cell:<width$} |"));
            }
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_table())
    }
}

//! Actors and scenarios.
//!
//! A [`Scenario`] is everything one iteration executes: an optional
//! sequential init part, one [`Actor`] per worker thread, and an optional
//! sequential post part.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::operation::Invocation;

/// Identifier of an actor lane within a scenario.
///
/// Parallel actors are numbered from zero. The init and post parts use
/// reserved identifiers so they can share one history with the workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub u32);

impl ActorId {
    /// Lane of the sequential init part.
    pub const INIT: ActorId = ActorId(u32::MAX - 1);
    /// Lane of the sequential post part.
    pub const POST: ActorId = ActorId(u32::MAX);

    /// Create a new actor ID.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the inner value.
    pub const fn inner(&self) -> u32 {
        self.0
    }

    /// Whether this is a parallel worker lane.
    pub const fn is_parallel(&self) -> bool {
        self.0 < Self::INIT.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::INIT => write!(f, "init"),
            Self::POST => write!(f, "post"),
            Self(id) => write!(f, "T{id}"),
        }
    }
}

impl From<u32> for ActorId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Ordered sequence of invocations executed by one worker thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Actor {
    pub invocations: Vec<Invocation>,
}

impl Actor {
    pub fn new(invocations: Vec<Invocation>) -> Self {
        Self { invocations }
    }

    pub fn len(&self) -> usize {
        self.invocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty()
    }
}

/// Everything one iteration executes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Invocations run sequentially before the workers start.
    #[serde(default)]
    pub init: Vec<Invocation>,
    /// One actor per worker thread.
    pub parallel: Vec<Actor>,
    /// Invocations run sequentially after every worker finished.
    #[serde(default)]
    pub post: Vec<Invocation>,
}

impl Scenario {
    /// Create a scenario with only a parallel part.
    pub fn new(parallel: Vec<Actor>) -> Self {
        Self {
            init: Vec::new(),
            parallel,
            post: Vec::new(),
        }
    }

    /// Set the init part.
    pub fn with_init(mut self, init: Vec<Invocation>) -> Self {
        self.init = init;
        self
    }

    /// Set the post part.
    pub fn with_post(mut self, post: Vec<Invocation>) -> Self {
        self.post = post;
        self
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.parallel.len()
    }

    /// Number of invocations across all parts.
    pub fn total_invocations(&self) -> usize {
        self.init.len() + self.post.len() + self.parallel.iter().map(Actor::len).sum::<usize>()
    }

    /// Returns true if the scenario has nothing to execute.
    pub fn is_empty(&self) -> bool {
        self.total_invocations() == 0
    }

    /// The invocations of one lane.
    pub fn lane(&self, actor: ActorId) -> Option<&[Invocation]> {
        match actor {
            ActorId::INIT => Some(&self.init),
            ActorId::POST => Some(&self.post),
            ActorId(id) => self
                .parallel
                .get(id as usize)
                .map(|a| a.invocations.as_slice()),
        }
    }

    /// Every lane in execution order: init, workers, post.
    pub fn lanes(&self) -> Vec<(ActorId, &[Invocation])> {
        let mut lanes = Vec::with_capacity(self.parallel.len() + 2);
        lanes.push((ActorId::INIT, self.init.as_slice()));
        for (i, actor) in self.parallel.iter().enumerate() {
            lanes.push((ActorId(i as u32), actor.invocations.as_slice()));
        }
        lanes.push((ActorId::POST, self.post.as_slice()));
        lanes
    }

    /// A copy of this scenario with one invocation removed.
    ///
    /// A worker left without invocations is dropped and the remaining
    /// workers are renumbered. Returns `None` if the position does not exist.
    pub fn without_invocation(&self, actor: ActorId, index: usize) -> Option<Scenario> {
        let mut next = self.clone();
        match actor {
            ActorId::INIT => {
                if index >= next.init.len() {
                    return None;
                }
                next.init.remove(index);
            }
            ActorId::POST => {
                if index >= next.post.len() {
                    return None;
                }
                next.post.remove(index);
            }
            ActorId(id) => {
                let worker = next.parallel.get_mut(id as usize)?;
                if index >= worker.len() {
                    return None;
                }
                worker.invocations.remove(index);
                if worker.is_empty() {
                    next.parallel.remove(id as usize);
                }
            }
        }
        Some(next)
    }

    /// Render the parallel part with one column per worker.
    pub fn render_columns(&self) -> String {
        let rendered: Vec<Vec<String>> = self
            .parallel
            .iter()
            .map(|a| a.invocations.iter().map(ToString::to_string).collect())
            .collect();
        let headers: Vec<String> = (0..rendered.len())
            .map(|i| ActorId(i as u32).to_string())
            .collect();
        let widths: Vec<usize> = rendered
            .iter()
            .zip(&headers)
            .map(|(cells, header)| {
                cells
                    .iter()
                    .map(String::len)
                    .chain(std::iter::once(header.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();
        let rows = rendered.iter().map(Vec::len).max().unwrap_or(0);

        let mut out = String::new();
        push_row(&mut out, &headers, &widths);
        for row in 0..rows {
            let cells: Vec<String> = rendered
                .iter()
                .map(|cells| cells.get(row).cloned().unwrap_or_default())
                .collect();
            push_row(&mut out, &cells, &widths);
        }
        out
    }
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    out.push('|');
    for (cell, width) in cells.iter().zip(widths) {
        out.push_str(&format!(" {cell:<width$} |"));
    }
    out.push('\n');
}

fn join_invocations(invocations: &[Invocation]) -> String {
    invocations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.init.is_empty() {
            writeln!(f, "init: [{}]", join_invocations(&self.init))?;
        }
        write!(f, "{}", self.render_columns())?;
        if !self.post.is_empty() {
            writeln!(f, "post: [{}]", join_invocations(&self.post))?;
        }
        Ok(())
    }
}

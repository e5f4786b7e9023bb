//! Integer sets.

use std::collections::{BTreeSet, HashSet};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use linprobe_checker::SequentialSpec;
use linprobe_core::{ExceptionKind, OperationSpec, ParamSpec, ReturnType};
use linprobe_runner::OperationTable;

use crate::{poisoned, RACE_WINDOW};

/// A concurrent set of integers.
pub trait IntSet: Send + Sync + 'static {
    /// Insert `key`; true if it was absent.
    fn add(&self, key: i64) -> Result<bool, ExceptionKind>;
    /// Remove `key`; true if it was present.
    fn remove(&self, key: i64) -> Result<bool, ExceptionKind>;
    fn contains(&self, key: i64) -> Result<bool, ExceptionKind>;
}

/// A set behind a single mutex.
#[derive(Debug, Default)]
pub struct LockedSet {
    inner: Mutex<HashSet<i64>>,
}

impl IntSet for LockedSet {
    fn add(&self, key: i64) -> Result<bool, ExceptionKind> {
        Ok(self.inner.lock().map_err(poisoned)?.insert(key))
    }

    fn remove(&self, key: i64) -> Result<bool, ExceptionKind> {
        Ok(self.inner.lock().map_err(poisoned)?.remove(&key))
    }

    fn contains(&self, key: i64) -> Result<bool, ExceptionKind> {
        Ok(self.inner.lock().map_err(poisoned)?.contains(&key))
    }
}

/// Set whose `add` checks for the key and inserts it under separate locks.
///
/// BUG: two concurrent `add(k)` calls can both observe `k` as absent and
/// both report a successful insertion.
#[derive(Debug, Default)]
pub struct RacySet {
    inner: Mutex<HashSet<i64>>,
}

impl IntSet for RacySet {
    fn add(&self, key: i64) -> Result<bool, ExceptionKind> {
        let present = self.inner.lock().map_err(poisoned)?.contains(&key);
        if present {
            return Ok(false);
        }
        thread::sleep(RACE_WINDOW);
        self.inner.lock().map_err(poisoned)?.insert(key);
        Ok(true)
    }

    fn remove(&self, key: i64) -> Result<bool, ExceptionKind> {
        Ok(self.inner.lock().map_err(poisoned)?.remove(&key))
    }

    fn contains(&self, key: i64) -> Result<bool, ExceptionKind> {
        Ok(self.inner.lock().map_err(poisoned)?.contains(&key))
    }
}

fn keyed(name: &str) -> OperationSpec {
    OperationSpec::new(name)
        .param(ParamSpec::int("key", "1:5"))
        .returns(ReturnType::Bool)
}

/// `add`, `remove` and `contains` over any [`IntSet`].
pub fn operations<S: IntSet>() -> OperationTable<S> {
    OperationTable::new()
        .register(keyed("add"), |set: &S, (key,): (i64,)| set.add(key))
        .register(keyed("remove"), |set: &S, (key,): (i64,)| set.remove(key))
        .register(keyed("contains"), |set: &S, (key,): (i64,)| set.contains(key))
}

/// Sequential set semantics.
pub fn model() -> SequentialSpec<BTreeSet<i64>> {
    SequentialSpec::new("set", BTreeSet::new())
        .operation("add", |set: &mut BTreeSet<i64>, (key,): (i64,)| Ok(set.insert(key)))
        .operation("remove", |set: &mut BTreeSet<i64>, (key,): (i64,)| {
            Ok(set.remove(&key))
        })
        .operation("contains", |set: &mut BTreeSet<i64>, (key,): (i64,)| {
            Ok(set.contains(&key))
        })
}

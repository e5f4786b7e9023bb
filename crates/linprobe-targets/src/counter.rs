//! Counters.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::thread;

use linprobe_checker::SequentialSpec;
use linprobe_core::{ExceptionKind, OperationSpec, ReturnType};
use linprobe_runner::OperationTable;

use crate::{poisoned, RACE_WINDOW};

/// A concurrent counter.
pub trait Counter: Send + Sync + 'static {
    /// Increment and return the new value.
    fn inc(&self) -> Result<i64, ExceptionKind>;
    fn get(&self) -> Result<i64, ExceptionKind>;
}

/// Counter behind a mutex.
#[derive(Debug, Default)]
pub struct LockedCounter {
    value: Mutex<i64>,
}

impl Counter for LockedCounter {
    fn inc(&self) -> Result<i64, ExceptionKind> {
        let mut value = self.value.lock().map_err(poisoned)?;
        *value += 1;
        Ok(*value)
    }

    fn get(&self) -> Result<i64, ExceptionKind> {
        Ok(*self.value.lock().map_err(poisoned)?)
    }
}

/// Counter that increments with a separate load and store.
///
/// BUG: concurrent increments can read the same value, so one of them is
/// lost and both return the same result.
#[derive(Debug, Default)]
pub struct RacyCounter {
    value: AtomicI64,
}

impl Counter for RacyCounter {
    fn inc(&self) -> Result<i64, ExceptionKind> {
        let next = self.value.load(Ordering::SeqCst) + 1;
        thread::sleep(RACE_WINDOW);
        self.value.store(next, Ordering::SeqCst);
        Ok(next)
    }

    fn get(&self) -> Result<i64, ExceptionKind> {
        Ok(self.value.load(Ordering::SeqCst))
    }
}

/// `inc` and `get` over any [`Counter`].
pub fn operations<C: Counter>() -> OperationTable<C> {
    OperationTable::new()
        .register_nullary(
            OperationSpec::new("inc").returns(ReturnType::Int),
            |counter: &C| counter.inc(),
        )
        .register_nullary(
            OperationSpec::new("get").returns(ReturnType::Int),
            |counter: &C| counter.get(),
        )
}

/// Sequential counter semantics.
pub fn model() -> SequentialSpec<i64> {
    SequentialSpec::new("counter", 0)
        .nullary("inc", |value: &mut i64| {
            *value += 1;
            Ok(*value)
        })
        .nullary("get", |value: &mut i64| Ok(*value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_count_sequentially() {
        let locked = LockedCounter::default();
        let racy = RacyCounter::default();
        for expected in 1..=3 {
            assert_eq!(locked.inc(), Ok(expected));
            assert_eq!(racy.inc(), Ok(expected));
        }
        assert_eq!(locked.get(), Ok(3));
        assert_eq!(racy.get(), Ok(3));
    }

    #[test]
    fn test_table_matches_model() {
        let model = model();
        let table = operations::<RacyCounter>();
        assert_eq!(table.len(), 2);
        for spec in table.specs() {
            assert!(model.has_operation(&spec.name));
        }
    }
}

//! FIFO queue.

use std::collections::VecDeque;
use std::sync::Mutex;

use linprobe_checker::SequentialSpec;
use linprobe_core::{ExceptionKind, OperationSpec, ParamSpec, ReturnType};
use linprobe_runner::OperationTable;

use crate::poisoned;

/// Error kind raised by `poll` on an empty queue.
pub const EMPTY: &str = "empty";

/// Queue behind a mutex. `poll` on an empty queue raises [`EMPTY`].
#[derive(Debug, Default)]
pub struct LockedQueue {
    items: Mutex<VecDeque<i64>>,
}

impl LockedQueue {
    pub fn offer(&self, item: i64) -> Result<(), ExceptionKind> {
        self.items.lock().map_err(poisoned)?.push_back(item);
        Ok(())
    }

    pub fn poll(&self) -> Result<i64, ExceptionKind> {
        self.items
            .lock()
            .map_err(poisoned)?
            .pop_front()
            .ok_or_else(|| ExceptionKind::new(EMPTY))
    }

    pub fn len(&self) -> Result<usize, ExceptionKind> {
        Ok(self.items.lock().map_err(poisoned)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, ExceptionKind> {
        Ok(self.len()? == 0)
    }
}

/// `offer`, `poll` and `size`.
pub fn operations() -> OperationTable<LockedQueue> {
    OperationTable::new()
        .register(
            OperationSpec::new("offer")
                .param(ParamSpec::int("item", "1:9"))
                .returns(ReturnType::Unit),
            |queue: &LockedQueue, (item,): (i64,)| queue.offer(item),
        )
        .register_nullary(
            OperationSpec::new("poll")
                .returns(ReturnType::Int)
                .handles(EMPTY),
            |queue: &LockedQueue| queue.poll(),
        )
        .register_nullary(
            OperationSpec::new("size").returns(ReturnType::Int),
            |queue: &LockedQueue| queue.len(),
        )
}

/// Sequential FIFO semantics.
pub fn model() -> SequentialSpec<VecDeque<i64>> {
    SequentialSpec::new("queue", VecDeque::new())
        .operation("offer", |queue: &mut VecDeque<i64>, (item,): (i64,)| {
            queue.push_back(item);
            Ok(())
        })
        .nullary("poll", |queue: &mut VecDeque<i64>| {
            queue.pop_front().ok_or_else(|| ExceptionKind::new(EMPTY))
        })
        .nullary("size", |queue: &mut VecDeque<i64>| Ok(queue.len()))
}

//! Instance lifecycle.

use std::fmt;
use std::sync::Arc;

/// Creates a fresh instance of the structure under test for every
/// execution and holds the only long-lived handle to it.
///
/// Workers receive clones of the [`Arc`] for the duration of one
/// execution; once they finish and [`release`](Self::release) is called
/// the instance is dropped.
pub struct InstanceManager<T> {
    factory: Arc<dyn Fn() -> T + Send + Sync>,
    current: Option<Arc<T>>,
    created: u64,
}

impl<T> InstanceManager<T> {
    /// Create a manager that builds instances with `factory`.
    pub fn new(factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self::from_shared(Arc::new(factory))
    }

    /// Create a manager from an already shared factory.
    pub fn from_shared(factory: Arc<dyn Fn() -> T + Send + Sync>) -> Self {
        Self {
            factory,
            current: None,
            created: 0,
        }
    }

    /// Drop the previous instance and construct a new one.
    pub fn fresh(&mut self) -> Arc<T> {
        self.current = None;
        let instance = Arc::new((self.factory)());
        self.current = Some(Arc::clone(&instance));
        self.created += 1;
        instance
    }

    /// The instance of the current execution, if any.
    pub fn current(&self) -> Option<&Arc<T>> {
        self.current.as_ref()
    }

    /// Drop the manager's handle to the current instance.
    pub fn release(&mut self) {
        self.current = None;
    }

    /// Number of instances constructed so far.
    pub fn created(&self) -> u64 {
        self.created
    }
}

impl<T> fmt::Debug for InstanceManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceManager")
            .field("live", &self.current.is_some())
            .field("created", &self.created)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_fresh_instances_are_independent() {
        let mut manager = InstanceManager::new(|| AtomicI64::new(0));

        let first = manager.fresh();
        first.fetch_add(5, Ordering::SeqCst);

        let second = manager.fresh();
        assert_eq!(second.load(Ordering::SeqCst), 0);
        assert_eq!(first.load(Ordering::SeqCst), 5);
        assert_eq!(manager.created(), 2);
    }

    #[test]
    fn test_previous_instance_is_dropped() {
        let mut manager = InstanceManager::new(|| Mutex::new(vec![1, 2, 3]));

        let weak = Arc::downgrade(&manager.fresh());
        assert!(weak.upgrade().is_some());

        manager.fresh();
        assert!(weak.upgrade().is_none());

        let weak = Arc::downgrade(&manager.fresh());
        manager.release();
        assert!(weak.upgrade().is_none());
        assert!(manager.current().is_none());
    }

    #[test]
    fn test_consecutive_instances_behave_identically() {
        let mut manager = InstanceManager::new(|| Mutex::new(Vec::<i64>::new()));
        let observe = |instance: &Mutex<Vec<i64>>| {
            let mut v = instance.lock().unwrap();
            v.push(1);
            v.len()
        };
        let a = observe(&*manager.fresh());
        let b = observe(&*manager.fresh());
        assert_eq!(a, b);
    }
}

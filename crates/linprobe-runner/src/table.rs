//! Operation registration.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use linprobe_core::{
    decode_args, ConfigError, ExceptionKind, Invocation, OperationSpec, Outcome, Value,
};

type InvokeFn<T> = Arc<dyn Fn(&T, &[Value]) -> Outcome + Send + Sync>;

struct Registered<T> {
    spec: OperationSpec,
    invoke: InvokeFn<T>,
}

/// Maps operation names to typed calls on the structure under test.
///
/// # Example
///
/// ```
/// use std::sync::Mutex;
///
/// use linprobe_core::{Invocation, OperationSpec, Outcome, ParamSpec, ReturnType};
/// use linprobe_runner::OperationTable;
/// use serde_json::json;
///
/// let table = OperationTable::<Mutex<Vec<i64>>>::new().register(
///     OperationSpec::new("push")
///         .param(ParamSpec::int("value", "1:5"))
///         .returns(ReturnType::Unit),
///     |v, (value,): (i64,)| {
///         v.lock().unwrap().push(value);
///         Ok(())
///     },
/// );
///
/// let instance = Mutex::new(Vec::new());
/// let outcome = table.invoke(&instance, &Invocation::new("push", vec![json!(3)]));
/// assert_eq!(outcome, Outcome::unit());
/// ```
pub struct OperationTable<T> {
    operations: Vec<Registered<T>>,
}

impl<T: 'static> OperationTable<T> {
    pub fn new() -> Self {
        Self {
            operations: Vec::new(),
        }
    }

    /// Register an operation whose arguments decode into the tuple `A`.
    pub fn register<A, R, F>(mut self, spec: OperationSpec, f: F) -> Self
    where
        A: DeserializeOwned,
        R: Serialize,
        F: Fn(&T, A) -> Result<R, ExceptionKind> + Send + Sync + 'static,
    {
        let invoke = move |instance: &T, args: &[Value]| match decode_args::<A>(args) {
            Ok(args) => Outcome::from_result(f(instance, args)),
            Err(mismatch) => mismatch,
        };
        self.operations.push(Registered {
            spec,
            invoke: Arc::new(invoke),
        });
        self
    }

    /// Register an operation without arguments.
    pub fn register_nullary<R, F>(mut self, spec: OperationSpec, f: F) -> Self
    where
        R: Serialize,
        F: Fn(&T) -> Result<R, ExceptionKind> + Send + Sync + 'static,
    {
        let invoke = move |instance: &T, args: &[Value]| {
            if args.is_empty() {
                Outcome::from_result(f(instance))
            } else {
                Outcome::threw_with(
                    ExceptionKind::ARGUMENT_MISMATCH,
                    format!("expected no arguments, got {}", args.len()),
                )
            }
        };
        self.operations.push(Registered {
            spec,
            invoke: Arc::new(invoke),
        });
        self
    }
}

impl<T> OperationTable<T> {
    /// Declarations of every registered operation, in registration order.
    pub fn specs(&self) -> Vec<OperationSpec> {
        self.operations.iter().map(|op| op.spec.clone()).collect()
    }

    /// Declaration of the operation named `name`.
    pub fn spec(&self, name: &str) -> Option<&OperationSpec> {
        self.operations
            .iter()
            .find(|op| op.spec.name == name)
            .map(|op| &op.spec)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Check that at least one operation is registered and names are unique.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.operations.is_empty() {
            return Err(ConfigError::NoOperations);
        }
        let mut seen = HashSet::with_capacity(self.operations.len());
        for op in &self.operations {
            if !seen.insert(op.spec.name.as_str()) {
                return Err(ConfigError::DuplicateOperation(op.spec.name.clone()));
            }
        }
        Ok(())
    }

    /// Invoke one operation on `instance`.
    ///
    /// Errors returned by the operation become [`Outcome::Threw`]. A panic is
    /// captured as kind [`ExceptionKind::PANIC`], and a value that does not
    /// fit the declared return type as [`ExceptionKind::RETURN_TYPE_MISMATCH`].
    pub fn invoke(&self, instance: &T, invocation: &Invocation) -> Outcome {
        let Some(op) = self
            .operations
            .iter()
            .find(|op| op.spec.name == invocation.operation)
        else {
            return Outcome::threw_with(
                ExceptionKind::UNKNOWN_OPERATION,
                invocation.operation.clone(),
            );
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| (op.invoke)(instance, &invocation.args)))
            .unwrap_or_else(|payload| {
                Outcome::threw_with(ExceptionKind::PANIC, panic_message(payload.as_ref()))
            });

        match outcome.value() {
            Some(value) if !op.spec.returns.admits(value) => Outcome::threw_with(
                ExceptionKind::RETURN_TYPE_MISMATCH,
                format!("{} returned {value}, declared {:?}", op.spec.name, op.spec.returns),
            ),
            _ => outcome,
        }
    }
}

impl<T: 'static> Default for OperationTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for OperationTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.operations.iter().map(|op| &op.spec))
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

//! Sequential reference models.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use linprobe_core::{decode_args, ExceptionKind, Invocation, Outcome, Value};

/// A sequential specification of the structure under test.
///
/// The model defines what each operation returns when operations run one
/// at a time. States are plain values: `step` never mutates its input, so
/// the verifier can keep a state per search node, compare them and hash
/// them for memoization.
///
/// # Example
///
/// ```
/// use linprobe_checker::Model;
/// use linprobe_core::{ExceptionKind, Invocation, Outcome};
///
/// struct Counter;
///
/// impl Model for Counter {
///     type State = i64;
///
///     fn name(&self) -> &str {
///         "counter"
///     }
///
///     fn init(&self) -> i64 {
///         0
///     }
///
///     fn step(&self, state: &i64, invocation: &Invocation) -> (i64, Outcome) {
///         match invocation.operation.as_str() {
///             "inc" => (state + 1, Outcome::ok(state + 1)),
///             "get" => (*state, Outcome::ok(*state)),
///             _ => (*state, Outcome::threw(ExceptionKind::UNKNOWN_OPERATION)),
///         }
///     }
/// }
///
/// let (state, outcome) = Counter.step(&Counter.init(), &Invocation::nullary("inc"));
/// assert_eq!(state, 1);
/// assert_eq!(outcome, Outcome::ok(1));
/// ```
pub trait Model: Send + Sync {
    /// The model's state.
    type State: Clone + Eq + Hash + Debug + Send;

    /// Name used in logs and reports.
    fn name(&self) -> &str;

    /// The state of a freshly constructed instance.
    fn init(&self) -> Self::State;

    /// Apply `invocation` to `state`, returning the next state and the
    /// outcome a correct sequential implementation would produce.
    fn step(&self, state: &Self::State, invocation: &Invocation) -> (Self::State, Outcome);
}

type StepFn<S> = Arc<dyn Fn(&mut S, &[Value]) -> Outcome + Send + Sync>;

/// A [`Model`] assembled from one closure per operation.
///
/// Each closure receives a mutable copy of the state and the decoded
/// arguments, and returns either a result or a declared error kind.
pub struct SequentialSpec<S> {
    name: String,
    initial: S,
    operations: HashMap<String, StepFn<S>>,
}

impl<S> SequentialSpec<S>
where
    S: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    /// Create a model whose fresh instance is `initial`.
    pub fn new(name: impl Into<String>, initial: S) -> Self {
        Self {
            name: name.into(),
            initial,
            operations: HashMap::new(),
        }
    }

    /// Register an operation taking arguments decoded into `A`.
    ///
    /// `A` is a tuple matching the operation's parameters, e.g. `(i64,)`.
    pub fn operation<A, R, F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        A: DeserializeOwned,
        R: Serialize,
        F: Fn(&mut S, A) -> Result<R, ExceptionKind> + Send + Sync + 'static,
    {
        let step = move |state: &mut S, args: &[Value]| match decode_args::<A>(args) {
            Ok(args) => Outcome::from_result(f(state, args)),
            Err(mismatch) => mismatch,
        };
        self.operations.insert(name.into(), Arc::new(step));
        self
    }

    /// Register an operation without arguments.
    pub fn nullary<R, F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        R: Serialize,
        F: Fn(&mut S) -> Result<R, ExceptionKind> + Send + Sync + 'static,
    {
        let step = move |state: &mut S, args: &[Value]| {
            if args.is_empty() {
                Outcome::from_result(f(state))
            } else {
                Outcome::threw_with(
                    ExceptionKind::ARGUMENT_MISMATCH,
                    format!("expected no arguments, got {}", args.len()),
                )
            }
        };
        self.operations.insert(name.into(), Arc::new(step));
        self
    }

    /// Whether an operation with this name is registered.
    pub fn has_operation(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }
}

impl<S: Debug> Debug for SequentialSpec<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.operations.keys().collect();
        names.sort();
        f.debug_struct("SequentialSpec")
            .field("name", &self.name)
            .field("initial", &self.initial)
            .field("operations", &names)
            .finish()
    }
}

impl<S> Model for SequentialSpec<S>
where
    S: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    type State = S;

    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self) -> S {
        self.initial.clone()
    }

    fn step(&self, state: &S, invocation: &Invocation) -> (S, Outcome) {
        let mut next = state.clone();
        let outcome = match self.operations.get(&invocation.operation) {
            Some(step) => step(&mut next, &invocation.args),
            None => Outcome::threw_with(
                ExceptionKind::UNKNOWN_OPERATION,
                invocation.operation.clone(),
            ),
        };
        (next, outcome)
    }
}

//! Operation declarations, invocations and outcomes.
//!
//! An [`OperationSpec`] is declared once per run and describes one callable
//! operation of the structure under test. An [`Invocation`] is one concrete
//! call with bound arguments, and an [`Outcome`] is what that call produced:
//! either a value or a declared error kind.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Argument and result values.
pub type Value = serde_json::Value;

/// Classification of an error raised by an operation.
///
/// Outcomes compare errors by kind only; the message is informational.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExceptionKind(String);

impl ExceptionKind {
    /// Kind recorded when an operation panics.
    pub const PANIC: &'static str = "panic";
    /// Kind recorded when bound arguments do not decode into the operation's parameters.
    pub const ARGUMENT_MISMATCH: &'static str = "argument-mismatch";
    /// Kind recorded when a result cannot be converted into a [`Value`].
    pub const UNSERIALIZABLE_RESULT: &'static str = "unserializable-result";
    /// Kind recorded when a result does not match the declared return type.
    pub const RETURN_TYPE_MISMATCH: &'static str = "return-type-mismatch";
    /// Kind recorded when an invocation names an operation nobody registered.
    pub const UNKNOWN_OPERATION: &'static str = "unknown-operation";

    /// Create a new exception kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    /// The kind as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this kind is produced by the engine rather than the structure.
    pub fn is_engine_kind(&self) -> bool {
        matches!(
            self.0.as_str(),
            Self::PANIC
                | Self::ARGUMENT_MISMATCH
                | Self::UNSERIALIZABLE_RESULT
                | Self::RETURN_TYPE_MISMATCH
                | Self::UNKNOWN_OPERATION
        )
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExceptionKind {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

impl From<String> for ExceptionKind {
    fn from(kind: String) -> Self {
        Self(kind)
    }
}

/// Result of one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The operation returned a value (`null` for operations without a result).
    Ok(Value),
    /// The operation raised an error of the given kind.
    Threw {
        kind: ExceptionKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl Outcome {
    /// A successful outcome carrying `value`.
    pub fn ok(value: impl Into<Value>) -> Self {
        Self::Ok(value.into())
    }

    /// A successful outcome with no result.
    pub fn unit() -> Self {
        Self::Ok(Value::Null)
    }

    /// An error outcome of the given kind.
    pub fn threw(kind: impl Into<ExceptionKind>) -> Self {
        Self::Threw {
            kind: kind.into(),
            message: None,
        }
    }

    /// An error outcome of the given kind with a diagnostic message.
    pub fn threw_with(kind: impl Into<ExceptionKind>, message: impl Into<String>) -> Self {
        Self::Threw {
            kind: kind.into(),
            message: Some(message.into()),
        }
    }

    /// Convert a typed operation result into an outcome.
    pub fn from_result<R: Serialize>(result: Result<R, ExceptionKind>) -> Self {
        match result {
            Ok(value) => match serde_json::to_value(value) {
                Ok(value) => Self::Ok(value),
                Err(e) => Self::threw_with(ExceptionKind::UNSERIALIZABLE_RESULT, e.to_string()),
            },
            Err(kind) => Self::threw(kind),
        }
    }

    /// Returns true if the operation returned normally.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// The returned value, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Ok(value) => Some(value),
            Self::Threw { .. } => None,
        }
    }

    /// The error kind, if the operation raised one.
    pub fn exception(&self) -> Option<&ExceptionKind> {
        match self {
            Self::Ok(_) => None,
            Self::Threw { kind, .. } => Some(kind),
        }
    }
}

impl PartialEq for Outcome {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Ok(a), Self::Ok(b)) => a == b,
            (Self::Threw { kind: a, .. }, Self::Threw { kind: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for Outcome {}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok(Value::Null) => write!(f, "void"),
            Self::Ok(value) => write!(f, "{value}"),
            Self::Threw { kind, .. } => write!(f, "throws {kind}"),
        }
    }
}

/// Decode positional arguments into a typed parameter tuple.
///
/// Arguments are decoded as a JSON array, so an operation taking one
/// integer declares its parameters as `(i64,)`. A decoding failure is
/// reported as an [`ExceptionKind::ARGUMENT_MISMATCH`] outcome.
pub fn decode_args<A: DeserializeOwned>(args: &[Value]) -> Result<A, Outcome> {
    serde_json::from_value(Value::Array(args.to_vec())).map_err(|e| {
        Outcome::threw_with(ExceptionKind::ARGUMENT_MISMATCH, e.to_string())
    })
}

/// Declared return type of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnType {
    /// No result; the outcome value is `null`.
    Unit,
    /// A boolean.
    Bool,
    /// A signed 64-bit integer.
    Int,
    /// A string.
    Text,
    /// Any value, including `null`.
    #[default]
    Any,
}

impl ReturnType {
    /// Whether `value` is admissible for this return type.
    pub fn admits(&self, value: &Value) -> bool {
        match self {
            Self::Unit => value.is_null(),
            Self::Bool => value.is_boolean(),
            Self::Int => value.is_i64(),
            Self::Text => value.is_string(),
            Self::Any => true,
        }
    }
}

/// Declaration of one operation parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name. Run configuration can rebind a generator by this name.
    pub name: String,
    /// Generator kind, e.g. `int`.
    pub generator: String,
    /// Generator configuration string, e.g. `1:10`.
    pub config: String,
}

impl ParamSpec {
    /// Create a parameter spec.
    pub fn new(
        name: impl Into<String>,
        generator: impl Into<String>,
        config: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            generator: generator.into(),
            config: config.into(),
        }
    }

    /// An integer parameter drawn from the inclusive range in `config`.
    pub fn int(name: impl Into<String>, config: impl Into<String>) -> Self {
        Self::new(name, "int", config)
    }

    /// A boolean parameter.
    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, "bool", "")
    }
}

/// Declaration of one operation of the structure under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSpec {
    /// Operation name, unique within a run.
    pub name: String,
    /// Ordered parameter declarations.
    pub params: Vec<ParamSpec>,
    /// Declared return type.
    pub returns: ReturnType,
    /// Error kinds that are part of the operation's contract.
    pub handles: Vec<ExceptionKind>,
}

impl OperationSpec {
    /// Create a spec with no parameters returning any value.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: ReturnType::default(),
            handles: Vec::new(),
        }
    }

    /// Append a parameter.
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Set the return type.
    pub fn returns(mut self, returns: ReturnType) -> Self {
        self.returns = returns;
        self
    }

    /// Declare an error kind as part of the operation's contract.
    pub fn handles(mut self, kind: impl Into<ExceptionKind>) -> Self {
        self.handles.push(kind.into());
        self
    }

    /// Whether `kind` is a declared error kind of this operation.
    pub fn handles_kind(&self, kind: &ExceptionKind) -> bool {
        self.handles.contains(kind)
    }
}

/// One concrete call: an operation name with bound argument values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub operation: String,
    pub args: Vec<Value>,
}

impl Invocation {
    /// Create an invocation.
    pub fn new(operation: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            operation: operation.into(),
            args,
        }
    }

    /// Create an invocation without arguments.
    pub fn nullary(operation: impl Into<String>) -> Self {
        Self::new(operation, Vec::new())
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.operation)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

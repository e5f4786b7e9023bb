//! Parameter generators and binding.
//!
//! A generator is a pure function of a random source producing values in
//! a domain described by its configuration string:
//!
//! | kind     | configuration          | values                                |
//! |----------|------------------------|---------------------------------------|
//! | `int`    | `min:max` (`-10:10`)   | integers in the inclusive range       |
//! | `bool`   | empty                  | `true` / `false`                      |
//! | `string` | `maxlen[:alphabet]`    | strings of up to `maxlen` characters  |
//! | `choice` | `a\|b\|c`              | one of the listed values              |

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;

use rand::{Rng, RngCore};
use serde_json::Value;
use tracing::debug;

use linprobe_core::{GeneratorError, GeneratorSpec, Invocation, OperationSpec};

/// A source of argument values for one parameter.
pub trait ParameterGenerator: Send + Sync + Debug {
    /// Generator kind, as written in configuration.
    fn kind(&self) -> &'static str;

    /// Draw one value.
    fn generate(&self, rng: &mut dyn RngCore) -> Value;
}

/// Integers drawn uniformly from an inclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntGen {
    min: i64,
    max: i64,
}

impl IntGen {
    pub const DEFAULT_MIN: i64 = -10;
    pub const DEFAULT_MAX: i64 = 10;

    /// Parse `min:max`; an empty configuration yields the default range.
    pub fn parse(config: &str) -> Result<Self, GeneratorError> {
        let config = config.trim();
        if config.is_empty() {
            return Ok(Self {
                min: Self::DEFAULT_MIN,
                max: Self::DEFAULT_MAX,
            });
        }
        let malformed = |reason: &str| GeneratorError::malformed("int", config, reason);
        let (min, max) = config
            .split_once(':')
            .ok_or_else(|| malformed("expected 'min:max'"))?;
        let min: i64 = min
            .trim()
            .parse()
            .map_err(|_| malformed("min is not an integer"))?;
        let max: i64 = max
            .trim()
            .parse()
            .map_err(|_| malformed("max is not an integer"))?;
        if min > max {
            return Err(malformed("min exceeds max"));
        }
        Ok(Self { min, max })
    }

    pub fn range(&self) -> (i64, i64) {
        (self.min, self.max)
    }
}

impl ParameterGenerator for IntGen {
    fn kind(&self) -> &'static str {
        "int"
    }

    fn generate(&self, rng: &mut dyn RngCore) -> Value {
        Value::from(rng.gen_range(self.min..=self.max))
    }
}

/// Uniform booleans.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolGen;

impl BoolGen {
    pub fn parse(config: &str) -> Result<Self, GeneratorError> {
        if config.trim().is_empty() {
            Ok(Self)
        } else {
            Err(GeneratorError::malformed(
                "bool",
                config,
                "takes no configuration",
            ))
        }
    }
}

impl ParameterGenerator for BoolGen {
    fn kind(&self) -> &'static str {
        "bool"
    }

    fn generate(&self, rng: &mut dyn RngCore) -> Value {
        Value::from(rng.gen_bool(0.5))
    }
}

/// Short strings over a small alphabet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringGen {
    max_len: usize,
    alphabet: Vec<char>,
}

impl StringGen {
    pub const DEFAULT_MAX_LEN: usize = 4;
    pub const DEFAULT_ALPHABET: &'static str = "abc";

    /// Parse `maxlen` or `maxlen:alphabet`.
    pub fn parse(config: &str) -> Result<Self, GeneratorError> {
        let trimmed = config.trim();
        if trimmed.is_empty() {
            return Ok(Self {
                max_len: Self::DEFAULT_MAX_LEN,
                alphabet: Self::DEFAULT_ALPHABET.chars().collect(),
            });
        }
        let (len, alphabet) = match trimmed.split_once(':') {
            Some((len, alphabet)) => (len, alphabet),
            None => (trimmed, Self::DEFAULT_ALPHABET),
        };
        let max_len = len.trim().parse::<usize>().map_err(|_| {
            GeneratorError::malformed("string", config, "max length is not a count")
        })?;
        let alphabet: Vec<char> = alphabet.chars().collect();
        if alphabet.is_empty() {
            return Err(GeneratorError::malformed(
                "string",
                config,
                "alphabet is empty",
            ));
        }
        Ok(Self { max_len, alphabet })
    }
}

impl ParameterGenerator for StringGen {
    fn kind(&self) -> &'static str {
        "string"
    }

    fn generate(&self, rng: &mut dyn RngCore) -> Value {
        let len = rng.gen_range(0..=self.max_len);
        let s: String = (0..len)
            .map(|_| self.alphabet[rng.gen_range(0..self.alphabet.len())])
            .collect();
        Value::from(s)
    }
}

/// One of an explicit list of values.
///
/// Each choice is read as JSON when it parses (`1`, `true`, `null`) and
/// as a plain string otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceGen {
    choices: Vec<Value>,
}

impl ChoiceGen {
    pub fn parse(config: &str) -> Result<Self, GeneratorError> {
        let choices: Vec<Value> = config
            .split('|')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| serde_json::from_str(c).unwrap_or_else(|_| Value::from(c)))
            .collect();
        if choices.is_empty() {
            return Err(GeneratorError::malformed(
                "choice",
                config,
                "expected 'a|b|...'",
            ));
        }
        Ok(Self { choices })
    }
}

impl ParameterGenerator for ChoiceGen {
    fn kind(&self) -> &'static str {
        "choice"
    }

    fn generate(&self, rng: &mut dyn RngCore) -> Value {
        self.choices[rng.gen_range(0..self.choices.len())].clone()
    }
}

/// Build a generator from its kind and configuration string.
pub fn build_generator(
    kind: &str,
    config: &str,
) -> Result<Box<dyn ParameterGenerator>, GeneratorError> {
    match kind {
        "int" => Ok(Box::new(IntGen::parse(config)?)),
        "bool" => Ok(Box::new(BoolGen::parse(config)?)),
        "string" => Ok(Box::new(StringGen::parse(config)?)),
        "choice" => Ok(Box::new(ChoiceGen::parse(config)?)),
        other => Err(GeneratorError::UnknownKind(other.to_string())),
    }
}

/// Resolves every declared parameter into a generator once, then binds
/// argument values per invocation.
#[derive(Debug, Default)]
pub struct ParamBinder {
    generators: HashMap<String, Vec<Box<dyn ParameterGenerator>>>,
}

impl ParamBinder {
    /// Resolve the parameters of `operations`.
    ///
    /// An entry in `overrides` replaces the declared generator of every
    /// parameter with that name.
    pub fn new(
        operations: &[OperationSpec],
        overrides: &BTreeMap<String, GeneratorSpec>,
    ) -> Result<Self, GeneratorError> {
        let mut generators = HashMap::with_capacity(operations.len());
        for operation in operations {
            let mut resolved = Vec::with_capacity(operation.params.len());
            for param in &operation.params {
                let (kind, config) = match overrides.get(&param.name) {
                    Some(spec) => (spec.generator.as_str(), spec.config.as_str()),
                    None => (param.generator.as_str(), param.config.as_str()),
                };
                debug!(
                    operation = %operation.name,
                    param = %param.name,
                    kind,
                    config,
                    "Resolved parameter generator"
                );
                resolved.push(build_generator(kind, config)?);
            }
            generators.insert(operation.name.clone(), resolved);
        }
        Ok(Self { generators })
    }

    /// Draw arguments for `operation`.
    pub fn bind(&self, operation: &OperationSpec, rng: &mut dyn RngCore) -> Invocation {
        let args = self
            .generators
            .get(&operation.name)
            .map(|gens| gens.iter().map(|g| g.generate(rng)).collect())
            .unwrap_or_default();
        Invocation::new(operation.name.clone(), args)
    }
}

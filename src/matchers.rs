//! The building blocks used to describe what an acceptable request, response or message looks
//! like.
//!
//! A body is described as a [`Template`]: a tree of plain values, objects, arrays and
//! [`MatcherRule`]s. Plain values are expected verbatim, while each [`MatcherRule`] relaxes (or
//! tightens) the comparison at the position it occupies - e.g. [`like`] accepts any value of the
//! same JSON type as its example.
//!
//! Every rule carries an *example*: it is what the mock provider sends back when the rule appears
//! in a response, and what gets written to the pact file for the provider to verify against.
//!
//! ```rust
//! use pactmock::matchers::{integer, like, object, regex, Template};
//! use serde_json::json;
//!
//! let body: Template = object()
//!     .field("id", integer(27))
//!     .field("name", like("Billy"))
//!     .field("date", regex("2020-01-01", r"\d{4}-\d{2}-\d{2}").unwrap())
//!     .field("kind", "user")
//!     .into();
//!
//! assert_eq!(
//!     body.example(),
//!     json!({"id": 27, "name": "Billy", "date": "2020-01-01", "kind": "user"})
//! );
//! ```
use crate::contract::SpecificationVersion;
use crate::error::ContractError;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A single expectation on a value, together with the example used to exemplify it.
///
/// The set of rules is closed on purpose: the pact file format only understands these kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum MatcherRule {
    /// The value must be equal to the one provided.
    Equality(Value),
    /// The value must be a string matching `pattern`.
    Regex { example: String, pattern: String },
    /// The value must have the same shape (JSON type, recursively) as the example.
    TypeLike(Box<Template>),
    /// The value must be an integer.
    Integer(i64),
    /// The value must be a number with a decimal part.
    Decimal(f64),
    /// An array with at least `min` elements, each shaped like `example`.
    ArrayMinLike { example: Box<Template>, min: usize },
    /// An array with at most `max` elements, each shaped like `example`.
    ArrayMaxLike { example: Box<Template>, max: usize },
    /// An array with between `min` and `max` elements, each shaped like `example`.
    ArrayMinMaxLike {
        example: Box<Template>,
        min: usize,
        max: usize,
    },
    /// An array containing, in any position, at least one element matching each of the
    /// provided templates.
    ArrayContaining(Vec<Template>),
    /// A string containing the provided substring.
    Includes(String),
    /// A value that the provider will inject from its provider state, using `expression`.
    FromProviderState { expression: String, example: Value },
    /// A date-time string in `format` (Java `SimpleDateFormat` notation), regenerated by the
    /// provider when verifying.
    DateTimeGenerated { example: String, format: String },
}

impl MatcherRule {
    /// The concrete value this rule stands for.
    pub fn example(&self) -> Value {
        match self {
            MatcherRule::Equality(value) => value.clone(),
            MatcherRule::Regex { example, .. } => Value::String(example.clone()),
            MatcherRule::TypeLike(example) => example.example(),
            MatcherRule::Integer(example) => Value::from(*example),
            MatcherRule::Decimal(example) => Value::from(*example),
            MatcherRule::ArrayMinLike { example, min } => repeat(example, Some(*min), None),
            MatcherRule::ArrayMaxLike { example, max } => repeat(example, None, Some(*max)),
            MatcherRule::ArrayMinMaxLike { example, min, max } => {
                repeat(example, Some(*min), Some(*max))
            }
            MatcherRule::ArrayContaining(elements) => {
                Value::Array(elements.iter().map(Template::example).collect())
            }
            MatcherRule::Includes(substring) => Value::String(substring.clone()),
            MatcherRule::FromProviderState { example, .. } => example.clone(),
            MatcherRule::DateTimeGenerated { example, .. } => Value::String(example.clone()),
        }
    }

    /// A short name for the rule kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            MatcherRule::Equality(_) => "equality",
            MatcherRule::Regex { .. } => "regex",
            MatcherRule::TypeLike(_) => "type",
            MatcherRule::Integer(_) => "integer",
            MatcherRule::Decimal(_) => "decimal",
            MatcherRule::ArrayMinLike { .. } => "min",
            MatcherRule::ArrayMaxLike { .. } => "max",
            MatcherRule::ArrayMinMaxLike { .. } => "min/max",
            MatcherRule::ArrayContaining(_) => "arrayContains",
            MatcherRule::Includes(_) => "include",
            MatcherRule::FromProviderState { .. } => "fromProviderState",
            MatcherRule::DateTimeGenerated { .. } => "datetime",
        }
    }

    /// The oldest pact specification able to express this rule.
    ///
    /// V2 only knows about `regex`, `type`, `min` and `max`.
    pub fn minimum_version(&self) -> SpecificationVersion {
        match self {
            MatcherRule::Regex { .. }
            | MatcherRule::TypeLike(_)
            | MatcherRule::ArrayMinLike { .. }
            | MatcherRule::ArrayMaxLike { .. }
            | MatcherRule::ArrayMinMaxLike { .. } => SpecificationVersion::V2,
            MatcherRule::Equality(_)
            | MatcherRule::Integer(_)
            | MatcherRule::Decimal(_)
            | MatcherRule::ArrayContaining(_)
            | MatcherRule::Includes(_)
            | MatcherRule::FromProviderState { .. }
            | MatcherRule::DateTimeGenerated { .. } => SpecificationVersion::V3,
        }
    }
}

fn repeat(example: &Template, min: Option<usize>, max: Option<usize>) -> Value {
    let mut n = min.unwrap_or(1).max(1);
    if let Some(max) = max {
        n = n.min(max);
    }
    let element = example.example();
    Value::Array(vec![element; n])
}

/// A node in the description of an expected body.
#[derive(Debug, Clone, PartialEq)]
pub enum Template {
    /// A plain scalar, expected verbatim.
    Literal(Value),
    Object(BTreeMap<String, Template>),
    Array(Vec<Template>),
    Rule(MatcherRule),
}

impl Template {
    /// The concrete JSON value described by this template.
    pub fn example(&self) -> Value {
        match self {
            Template::Literal(value) => value.clone(),
            Template::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, template)| (key.clone(), template.example()))
                    .collect::<Map<String, Value>>(),
            ),
            Template::Array(elements) => {
                Value::Array(elements.iter().map(Template::example).collect())
            }
            Template::Rule(rule) => rule.example(),
        }
    }

    /// Visit every rule in the tree, depth-first.
    pub(crate) fn rules(&self) -> Vec<&MatcherRule> {
        let mut rules = Vec::new();
        self.collect_rules(&mut rules);
        rules
    }

    fn collect_rules<'a>(&'a self, rules: &mut Vec<&'a MatcherRule>) {
        match self {
            Template::Literal(_) => {}
            Template::Object(fields) => fields.values().for_each(|t| t.collect_rules(rules)),
            Template::Array(elements) => elements.iter().for_each(|t| t.collect_rules(rules)),
            Template::Rule(rule) => {
                rules.push(rule);
                match rule {
                    MatcherRule::TypeLike(example)
                    | MatcherRule::ArrayMinLike { example, .. }
                    | MatcherRule::ArrayMaxLike { example, .. }
                    | MatcherRule::ArrayMinMaxLike { example, .. } => example.collect_rules(rules),
                    MatcherRule::ArrayContaining(elements) => {
                        elements.iter().for_each(|t| t.collect_rules(rules))
                    }
                    _ => {}
                }
            }
        }
    }

    /// Fail if the template uses a rule that `version` cannot express.
    pub(crate) fn check_version(&self, version: SpecificationVersion) -> Result<(), ContractError> {
        match self
            .rules()
            .into_iter()
            .find(|rule| rule.minimum_version() > version)
        {
            Some(rule) => Err(ContractError::UnsupportedForSpecVersion {
                feature: rule.kind(),
                version,
            }),
            None => Ok(()),
        }
    }

    /// The number of nodes in the tree - a proxy for how specific an expectation is.
    pub(crate) fn weight(&self) -> usize {
        match self {
            Template::Literal(_) | Template::Rule(_) => 1,
            Template::Object(fields) => 1 + fields.values().map(Template::weight).sum::<usize>(),
            Template::Array(elements) => {
                1 + elements.iter().map(Template::weight).sum::<usize>()
            }
        }
    }
}

impl From<Value> for Template {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => Template::Object(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, Template::from(value)))
                    .collect(),
            ),
            Value::Array(elements) => {
                Template::Array(elements.into_iter().map(Template::from).collect())
            }
            scalar => Template::Literal(scalar),
        }
    }
}

impl From<MatcherRule> for Template {
    fn from(rule: MatcherRule) -> Self {
        Template::Rule(rule)
    }
}

impl From<ObjectTemplate> for Template {
    fn from(object: ObjectTemplate) -> Self {
        Template::Object(object.0)
    }
}

impl From<Vec<Template>> for Template {
    fn from(elements: Vec<Template>) -> Self {
        Template::Array(elements)
    }
}

impl From<&str> for Template {
    fn from(value: &str) -> Self {
        Template::Literal(Value::from(value))
    }
}

impl From<String> for Template {
    fn from(value: String) -> Self {
        Template::Literal(Value::from(value))
    }
}

// A quick macro to implement `From` for all the scalars `serde_json::Value` knows about.
macro_rules! impl_from_scalar_for_template {
    ($($type_name:ty),*) => {
        $(
            impl From<$type_name> for Template {
                fn from(value: $type_name) -> Self {
                    Template::Literal(Value::from(value))
                }
            }
        )*
    };
}

impl_from_scalar_for_template!(bool, i32, i64, u32, u64, usize, f32, f64);

/// An object whose fields are [`Template`]s - use [`object`] to get started.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectTemplate(BTreeMap<String, Template>);

impl ObjectTemplate {
    /// Add (or replace) a field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Template>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }
}

/// Start describing an object, one [`ObjectTemplate::field`] at a time.
pub fn object() -> ObjectTemplate {
    ObjectTemplate::default()
}

/// Match on the exact value provided.
///
/// Unlike a plain value, an `equality` rule is recorded in the pact file and stays strict even
/// when nested inside a [`like`].
pub fn equality(value: impl Into<Value>) -> MatcherRule {
    MatcherRule::Equality(value.into())
}

/// Match any string matching `pattern`.
///
/// Fails if `pattern` is not a valid regular expression.
pub fn regex(
    example: impl Into<String>,
    pattern: impl Into<String>,
) -> Result<MatcherRule, ContractError> {
    let pattern = pattern.into();
    if let Err(source) = Regex::new(&pattern) {
        return Err(ContractError::InvalidPattern { pattern, source });
    }
    Ok(MatcherRule::Regex {
        example: example.into(),
        pattern,
    })
}

/// Match any value with the same shape as `example`.
pub fn like(example: impl Into<Template>) -> MatcherRule {
    MatcherRule::TypeLike(Box::new(example.into()))
}

pub fn integer(example: i64) -> MatcherRule {
    MatcherRule::Integer(example)
}

pub fn decimal(example: f64) -> MatcherRule {
    MatcherRule::Decimal(example)
}

/// An array with at least `min` elements shaped like `example`.
pub fn array_min_like(example: impl Into<Template>, min: usize) -> MatcherRule {
    MatcherRule::ArrayMinLike {
        example: Box::new(example.into()),
        min,
    }
}

/// An array with at most `max` elements shaped like `example`.
pub fn array_max_like(example: impl Into<Template>, max: usize) -> MatcherRule {
    MatcherRule::ArrayMaxLike {
        example: Box::new(example.into()),
        max,
    }
}

/// An array with between `min` and `max` elements shaped like `example`.
///
/// `min == max == 0` is accepted: only the empty array will match.
///
/// ```rust
/// use pactmock::matchers::array_min_max_like;
///
/// assert!(array_min_max_like(27, 3, 5).is_ok());
/// assert!(array_min_max_like(27, 5, 3).is_err());
/// ```
pub fn array_min_max_like(
    example: impl Into<Template>,
    min: usize,
    max: usize,
) -> Result<MatcherRule, ContractError> {
    if min > max {
        return Err(ContractError::InvalidBounds { min, max });
    }
    Ok(MatcherRule::ArrayMinMaxLike {
        example: Box::new(example.into()),
        min,
        max,
    })
}

/// An array containing at least one element matching each template, in any order.
pub fn array_containing(elements: Vec<Template>) -> MatcherRule {
    MatcherRule::ArrayContaining(elements)
}

/// A string containing `substring`.
pub fn includes(substring: impl Into<String>) -> MatcherRule {
    MatcherRule::Includes(substring.into())
}

/// A value injected by the provider from its state, e.g. `${name}`.
///
/// The consumer side always uses `example`.
pub fn from_provider_state(expression: impl Into<String>, example: impl Into<Value>) -> MatcherRule {
    MatcherRule::FromProviderState {
        expression: expression.into(),
        example: example.into(),
    }
}

/// A date-time string formatted according to `format`, e.g. `yyyy-MM-dd'T'HH:mm:ss`.
pub fn datetime_generated(example: impl Into<String>, format: impl Into<String>) -> MatcherRule {
    MatcherRule::DateTimeGenerated {
        example: example.into(),
        format: format.into(),
    }
}

//! Describing a body through a typed record instead of a hand-written [`Template`].
//!
//! Every leaf field of the record needs an example (and, for generated values, a format):
//! they are provided out-of-band through [`FieldDescriptors`], keyed by the field's serialized
//! name. Nested fields use dotted names, e.g. `address.city`.
use crate::contract::SpecificationVersion;
use crate::error::ContractError;
use crate::matchers::{array_min_like, datetime_generated, like, Template};
use crate::matching::json_type_name;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// A value the provider generates when replaying the interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    DateTime,
}

/// Example, format and generator for a single field of a record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldDescriptor {
    pub example: Option<String>,
    pub format: Option<String>,
    pub generator: Option<GeneratorKind>,
}

impl FieldDescriptor {
    pub fn example(example: impl Into<String>) -> Self {
        Self {
            example: Some(example.into()),
            ..Self::default()
        }
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn generator(mut self, generator: GeneratorKind) -> Self {
        self.generator = Some(generator);
        self
    }
}

/// Field descriptors for a record, keyed by (dotted) field name.
///
/// ```rust
/// use pactmock::{FieldDescriptor, FieldDescriptors, GeneratorKind};
///
/// let fields = FieldDescriptors::new()
///     .field("name", FieldDescriptor::example("billy"))
///     .field(
///         "datetime",
///         FieldDescriptor::example("2020-01-01T08:00:45")
///             .format("yyyy-MM-dd'T'HH:mm:ss")
///             .generator(GeneratorKind::DateTime),
///     );
/// assert!(fields.get("datetime").is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct FieldDescriptors(HashMap<String, FieldDescriptor>);

impl FieldDescriptors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.0.insert(name.into(), descriptor);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.0.get(name)
    }
}

/// Build the template of a record: every leaf becomes a type matcher around its example, every
/// non-empty array an `array_min_like` with a minimum of one element.
pub(crate) fn record_template<R: Serialize>(
    record: &R,
    fields: &FieldDescriptors,
    version: SpecificationVersion,
) -> Result<Template, ContractError> {
    let value =
        serde_json::to_value(record).map_err(|e| ContractError::IncompatibleType(e.to_string()))?;
    match value {
        Value::Object(map) => object_template(map, "", fields, version),
        other => Err(ContractError::IncompatibleType(format!(
            "expected a record, got a {}",
            json_type_name(&other)
        ))),
    }
}

fn object_template(
    map: Map<String, Value>,
    prefix: &str,
    fields: &FieldDescriptors,
    version: SpecificationVersion,
) -> Result<Template, ContractError> {
    let mut templates = BTreeMap::new();
    for (key, value) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        let template = field_template(&name, value, fields, version)?;
        templates.insert(key, template);
    }
    Ok(Template::Object(templates))
}

fn field_template(
    name: &str,
    value: Value,
    fields: &FieldDescriptors,
    version: SpecificationVersion,
) -> Result<Template, ContractError> {
    match value {
        Value::Object(map) => object_template(map, name, fields, version),
        Value::Array(elements) => {
            // The element's shape comes from the record itself: an empty collection has none.
            let element = elements
                .into_iter()
                .next()
                .ok_or_else(|| ContractError::MissingExample {
                    field: name.to_string(),
                })?;
            let element = field_template(name, element, fields, version)?;
            Ok(array_min_like(element, 1).into())
        }
        scalar => leaf_template(name, &scalar, fields, version),
    }
}

fn leaf_template(
    name: &str,
    shape: &Value,
    fields: &FieldDescriptors,
    version: SpecificationVersion,
) -> Result<Template, ContractError> {
    let missing = || ContractError::MissingExample {
        field: name.to_string(),
    };
    let descriptor = fields.get(name).ok_or_else(missing)?;
    let example = descriptor.example.as_deref().ok_or_else(missing)?;

    match descriptor.generator {
        Some(GeneratorKind::DateTime) => {
            if version < SpecificationVersion::V3 {
                return Err(ContractError::UnsupportedForSpecVersion {
                    feature: "datetime",
                    version,
                });
            }
            let format = descriptor.format.clone().ok_or_else(missing)?;
            Ok(datetime_generated(example, format).into())
        }
        None => Ok(like(parse_example(name, example, shape)?).into()),
    }
}

/// Interpret the textual example according to the JSON type of the field.
fn parse_example(name: &str, example: &str, shape: &Value) -> Result<Value, ContractError> {
    match shape {
        Value::String(_) => Ok(Value::String(example.to_string())),
        // `None` fields carry no type information.
        Value::Null => Ok(serde_json::from_str(example)
            .unwrap_or_else(|_| Value::String(example.to_string()))),
        _ => serde_json::from_str::<Value>(example)
            .ok()
            .filter(|parsed| json_type_name(parsed) == json_type_name(shape))
            .ok_or_else(|| {
                ContractError::IncompatibleType(format!(
                    "the example `{}` of field `{}` is not a {}",
                    example,
                    name,
                    json_type_name(shape)
                ))
            }),
    }
}

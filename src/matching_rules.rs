//! Flattening [`Template`]s into the path-keyed tables written to pact files.
//!
//! A verification engine on the provider side has no knowledge of our [`MatcherRule`] type: all it
//! gets is the example body plus two tables, `matchingRules` and `generators`, keyed by [`Path`].
use crate::contract::SpecificationVersion;
use crate::descriptor::{record_template, FieldDescriptors};
use crate::error::ContractError;
use crate::matchers::{MatcherRule, Template};
use crate::path::{Category, Path};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// A rule as it appears in a pact file.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchingRule {
    Type,
    Regex(String),
    Equality,
    Integer,
    Decimal,
    MinType(usize),
    MaxType(usize),
    MinMaxType(usize, usize),
    Include(String),
    ArrayContains,
    Timestamp(String),
}

impl MatchingRule {
    /// The value of the `match` key, e.g. `type` or `regex`.
    pub fn tag(&self) -> &'static str {
        match self {
            MatchingRule::Type
            | MatchingRule::MinType(_)
            | MatchingRule::MaxType(_)
            | MatchingRule::MinMaxType(_, _) => "type",
            MatchingRule::Regex(_) => "regex",
            MatchingRule::Equality => "equality",
            MatchingRule::Integer => "integer",
            MatchingRule::Decimal => "decimal",
            MatchingRule::Include(_) => "include",
            MatchingRule::ArrayContains => "arrayContains",
            MatchingRule::Timestamp(_) => "timestamp",
        }
    }

    pub fn to_json(&self) -> Value {
        let mut rule = Map::new();
        rule.insert("match".into(), Value::from(self.tag()));
        match self {
            MatchingRule::Regex(pattern) => {
                rule.insert("regex".into(), Value::from(pattern.as_str()));
            }
            MatchingRule::MinType(min) => {
                rule.insert("min".into(), Value::from(*min));
            }
            MatchingRule::MaxType(max) => {
                rule.insert("max".into(), Value::from(*max));
            }
            MatchingRule::MinMaxType(min, max) => {
                rule.insert("min".into(), Value::from(*min));
                rule.insert("max".into(), Value::from(*max));
            }
            MatchingRule::Include(value) => {
                rule.insert("value".into(), Value::from(value.as_str()));
            }
            MatchingRule::Timestamp(format) => {
                rule.insert("timestamp".into(), Value::from(format.as_str()));
            }
            MatchingRule::Type
            | MatchingRule::Equality
            | MatchingRule::Integer
            | MatchingRule::Decimal
            | MatchingRule::ArrayContains => {}
        }
        Value::Object(rule)
    }
}

/// How the provider should produce a fresh value when replaying an interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Generator {
    ProviderState { expression: String },
    DateTime { format: String },
}

impl Generator {
    pub fn to_json(&self) -> Value {
        match self {
            Generator::ProviderState { expression } => {
                json!({"type": "ProviderState", "expression": expression})
            }
            Generator::DateTime { format } => json!({"type": "DateTime", "format": format}),
        }
    }
}

/// Matching rules keyed by [`Path`]. Rules landing on the same path are combined with `AND`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleTable(BTreeMap<Path, Vec<MatchingRule>>);

impl RuleTable {
    pub fn insert(&mut self, path: Path, rule: MatchingRule) {
        self.0.entry(path).or_default().push(rule);
    }

    /// Look a path up using its rendered form, e.g. `$.body.id`.
    pub fn get(&self, path: &str) -> Option<&[MatchingRule]> {
        self.0
            .iter()
            .find(|(key, _)| key.to_string() == path)
            .map(|(_, rules)| rules.as_slice())
    }

    pub fn paths(&self) -> Vec<String> {
        self.0.keys().map(Path::to_string).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &[MatchingRule])> {
        self.0.iter().map(|(path, rules)| (path, rules.as_slice()))
    }

    pub(crate) fn extend(&mut self, other: &RuleTable) {
        for (path, rules) in other.iter() {
            for rule in rules {
                self.insert(path.clone(), rule.clone());
            }
        }
    }

    /// `{"$.body.id": {"match": "type"}}` - V2 has a single rule object per path, so combined
    /// rules are merged into one.
    pub(crate) fn to_v2_json(&self) -> Value {
        let mut table = Map::new();
        for (path, rules) in self.iter() {
            let mut merged = Map::new();
            for rule in rules {
                if let Value::Object(fields) = rule.to_json() {
                    merged.extend(fields);
                }
            }
            table.insert(path.to_string(), Value::Object(merged));
        }
        Value::Object(table)
    }

    /// `{"body": {"$.id": {"combine": "AND", "matchers": [{"match": "type"}]}}}`
    pub(crate) fn to_v3_json(&self) -> Value {
        let mut grouped: BTreeMap<&'static str, BTreeMap<String, Vec<Value>>> = BTreeMap::new();
        for (path, rules) in self.iter() {
            grouped
                .entry(path.category().v3_key())
                .or_default()
                .entry(path.v3_key())
                .or_default()
                .extend(rules.iter().map(MatchingRule::to_json));
        }

        let mut table = Map::new();
        for (category, paths) in grouped {
            let mut entries: Vec<(String, Value)> = paths
                .into_iter()
                .map(|(key, matchers)| (key, json!({"combine": "AND", "matchers": matchers})))
                .collect();
            let value = if category == Category::Path.v3_key() {
                // The request path is a single value: no key below the category.
                entries.pop().map(|(_, rules)| rules).unwrap_or(Value::Null)
            } else {
                Value::Object(entries.into_iter().collect())
            };
            table.insert(category.to_string(), value);
        }
        Value::Object(table)
    }
}

/// Generators keyed by [`Path`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratorTable(BTreeMap<Path, Generator>);

impl GeneratorTable {
    pub fn insert(&mut self, path: Path, generator: Generator) {
        self.0.insert(path, generator);
    }

    pub fn get(&self, path: &str) -> Option<&Generator> {
        self.0
            .iter()
            .find(|(key, _)| key.to_string() == path)
            .map(|(_, generator)| generator)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn extend(&mut self, other: &GeneratorTable) {
        for (path, generator) in &other.0 {
            self.insert(path.clone(), generator.clone());
        }
    }

    pub(crate) fn to_v3_json(&self) -> Value {
        let mut grouped: BTreeMap<&'static str, Map<String, Value>> = BTreeMap::new();
        for (path, generator) in &self.0 {
            grouped
                .entry(path.category().v3_key())
                .or_default()
                .insert(path.v3_key(), generator.to_json());
        }

        let mut table = Map::new();
        for (category, mut paths) in grouped {
            let value = if category == Category::Path.v3_key() {
                paths.remove("").unwrap_or(Value::Null)
            } else {
                Value::Object(paths)
            };
            table.insert(category.to_string(), value);
        }
        Value::Object(table)
    }
}

/// A body template together with the rule and generator tables derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyMatchers {
    template: Template,
    rules: RuleTable,
    generators: GeneratorTable,
}

impl BodyMatchers {
    /// Walk `template` depth-first, recording every rule (and generator) under `root`.
    ///
    /// Fails if the template uses rules that `version` cannot express.
    pub fn build(
        template: Template,
        version: SpecificationVersion,
        root: Path,
    ) -> Result<Self, ContractError> {
        template.check_version(version)?;
        let mut rules = RuleTable::default();
        let mut generators = GeneratorTable::default();
        collect(&template, &root, &mut rules, &mut generators);
        Ok(Self {
            template,
            rules,
            generators,
        })
    }

    /// Derive matchers from a typed record, using `fields` to provide the example, format and
    /// generator of each of its fields.
    pub fn from_record<R: Serialize>(
        record: &R,
        fields: &FieldDescriptors,
        version: SpecificationVersion,
        root: Path,
    ) -> Result<Self, ContractError> {
        let template = record_template(record, fields, version)?;
        Self::build(template, version, root)
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn generators(&self) -> &GeneratorTable {
        &self.generators
    }

    pub fn example(&self) -> Value {
        self.template.example()
    }
}

/// Record the rules and generators carried by `template`, rooted at `path`.
///
/// Plain values are exact expectations: they are part of the example but do not get a rule.
pub(crate) fn collect(
    template: &Template,
    path: &Path,
    rules: &mut RuleTable,
    generators: &mut GeneratorTable,
) {
    match template {
        Template::Literal(_) => {}
        Template::Object(fields) => {
            for (key, child) in fields {
                collect(child, &path.field(key.as_str()), rules, generators);
            }
        }
        Template::Array(elements) => {
            for (index, child) in elements.iter().enumerate() {
                collect(child, &path.index(index), rules, generators);
            }
        }
        Template::Rule(rule) => match rule {
            MatcherRule::Equality(_) => rules.insert(path.clone(), MatchingRule::Equality),
            MatcherRule::Regex { pattern, .. } => {
                rules.insert(path.clone(), MatchingRule::Regex(pattern.clone()))
            }
            MatcherRule::TypeLike(example) => {
                rules.insert(path.clone(), MatchingRule::Type);
                collect(example, path, rules, generators);
            }
            MatcherRule::Integer(_) => rules.insert(path.clone(), MatchingRule::Integer),
            MatcherRule::Decimal(_) => rules.insert(path.clone(), MatchingRule::Decimal),
            MatcherRule::ArrayMinLike { example, min } => {
                rules.insert(path.clone(), MatchingRule::MinType(*min));
                collect(example, &path.wildcard(), rules, generators);
            }
            MatcherRule::ArrayMaxLike { example, max } => {
                rules.insert(path.clone(), MatchingRule::MaxType(*max));
                collect(example, &path.wildcard(), rules, generators);
            }
            MatcherRule::ArrayMinMaxLike { example, min, max } => {
                rules.insert(path.clone(), MatchingRule::MinMaxType(*min, *max));
                collect(example, &path.wildcard(), rules, generators);
            }
            MatcherRule::ArrayContaining(elements) => {
                rules.insert(path.clone(), MatchingRule::ArrayContains);
                for (index, element) in elements.iter().enumerate() {
                    collect(element, &path.index(index), rules, generators);
                }
            }
            MatcherRule::Includes(substring) => {
                rules.insert(path.clone(), MatchingRule::Include(substring.clone()))
            }
            MatcherRule::FromProviderState { expression, .. } => {
                rules.insert(path.clone(), MatchingRule::Type);
                generators.insert(
                    path.clone(),
                    Generator::ProviderState {
                        expression: expression.clone(),
                    },
                );
            }
            MatcherRule::DateTimeGenerated { format, .. } => {
                rules.insert(path.clone(), MatchingRule::Timestamp(format.clone()));
                generators.insert(
                    path.clone(),
                    Generator::DateTime {
                        format: format.clone(),
                    },
                );
            }
        },
    }
}

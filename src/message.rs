use crate::contract::{provider_states_json, SpecificationVersion};
use crate::error::ContractError;
use crate::interaction::ProviderState;
use crate::matching_rules::BodyMatchers;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// An asynchronous message the consumer expects to receive from the provider, e.g. through a
/// queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    version: SpecificationVersion,
    states: Vec<ProviderState>,
    description: String,
    metadata: BTreeMap<String, Value>,
    content: Option<BodyMatchers>,
}

impl Message {
    pub fn new(version: SpecificationVersion) -> Self {
        Self {
            version,
            states: Vec::new(),
            description: String::new(),
            metadata: BTreeMap::new(),
            content: None,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn provider_states(&self) -> &[ProviderState] {
        &self.states
    }

    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    pub fn content(&self) -> Option<&BodyMatchers> {
        self.content.as_ref()
    }

    pub fn given(&mut self, state: impl Into<ProviderState>) -> Result<(), ContractError> {
        let state = state.into();
        if !state.params.is_empty() && self.version < SpecificationVersion::V3 {
            return Err(ContractError::UnsupportedForSpecVersion {
                feature: "provider state parameters",
                version: self.version,
            });
        }
        self.states.push(state);
        Ok(())
    }

    pub fn expects_to_receive(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn with_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn with_content(&mut self, content: BodyMatchers) -> Result<(), ContractError> {
        content.template().check_version(self.version)?;
        self.content = Some(content);
        Ok(())
    }

    /// The content the consumer's handler is invoked with.
    pub fn example(&self) -> Value {
        self.content
            .as_ref()
            .map(BodyMatchers::example)
            .unwrap_or(Value::Null)
    }

    pub(crate) fn to_pact_json(&self) -> Value {
        let mut message = Map::new();
        message.insert("description".into(), Value::from(self.description.as_str()));
        if !self.states.is_empty() {
            message.insert("providerStates".into(), provider_states_json(&self.states));
        }
        message.insert("contents".into(), self.example());
        if !self.metadata.is_empty() {
            message.insert(
                "metadata".into(),
                Value::Object(self.metadata.clone().into_iter().collect()),
            );
        }
        if let Some(content) = &self.content {
            if !content.rules().is_empty() {
                let rules = match self.version {
                    SpecificationVersion::V2 => content.rules().to_v2_json(),
                    SpecificationVersion::V3 => content.rules().to_v3_json(),
                };
                message.insert("matchingRules".into(), rules);
            }
            if self.version >= SpecificationVersion::V3 && !content.generators().is_empty() {
                message.insert("generators".into(), content.generators().to_v3_json());
            }
        }
        Value::Object(message)
    }
}

/// The message handed to the consumer's handler: the reified content, deserialized into the
/// type the consumer works with.
#[derive(Debug, Clone, PartialEq)]
pub struct AsynchronousMessage<T> {
    pub description: String,
    pub metadata: BTreeMap<String, Value>,
    pub content: T,
}

use crate::error::ContractError;
use crate::interaction::{Interaction, InteractionStage, ProviderState};
use crate::message::Message;
use serde_json::{json, Map, Value};
use std::fmt;

/// The pact specification a contract is written against.
///
/// It decides which matching rules can be used and how rules, generators and queries are laid
/// out in the pact file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SpecificationVersion {
    V2,
    V3,
}

impl SpecificationVersion {
    /// The version string written in the pact file metadata.
    pub fn pact_version(&self) -> &'static str {
        match self {
            SpecificationVersion::V2 => "2.0.0",
            SpecificationVersion::V3 => "3.0.0",
        }
    }
}

impl Default for SpecificationVersion {
    fn default() -> Self {
        SpecificationVersion::V3
    }
}

impl fmt::Display for SpecificationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecificationVersion::V2 => f.write_str("V2"),
            SpecificationVersion::V3 => f.write_str("V3"),
        }
    }
}

/// An entry of a [`Contract`].
#[derive(Debug, Clone, PartialEq)]
pub enum ContractInteraction {
    Http(Interaction),
    Message(Message),
}

impl ContractInteraction {
    pub fn description(&self) -> &str {
        match self {
            ContractInteraction::Http(interaction) => interaction.description(),
            ContractInteraction::Message(message) => message.description(),
        }
    }

    pub fn provider_states(&self) -> &[ProviderState] {
        match self {
            ContractInteraction::Http(interaction) => interaction.provider_states(),
            ContractInteraction::Message(message) => message.provider_states(),
        }
    }

    fn is_message(&self) -> bool {
        matches!(self, ContractInteraction::Message(_))
    }
}

/// The ordered collection of interactions agreed between a consumer and a provider.
///
/// Interactions can only be appended. Once a test run starts the contract is sealed and
/// becomes read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct Contract {
    consumer: String,
    provider: String,
    specification: SpecificationVersion,
    interactions: Vec<ContractInteraction>,
    sealed: bool,
}

impl Contract {
    pub fn new(
        consumer: impl Into<String>,
        provider: impl Into<String>,
        specification: SpecificationVersion,
    ) -> Self {
        Self {
            consumer: consumer.into(),
            provider: provider.into(),
            specification,
            interactions: Vec::new(),
            sealed: false,
        }
    }

    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn specification(&self) -> SpecificationVersion {
        self.specification
    }

    pub fn interactions(&self) -> &[ContractInteraction] {
        &self.interactions
    }

    pub fn http_interactions(&self) -> impl Iterator<Item = &Interaction> {
        self.interactions.iter().filter_map(|i| match i {
            ContractInteraction::Http(interaction) => Some(interaction),
            ContractInteraction::Message(_) => None,
        })
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.interactions.iter().filter_map(|i| match i {
            ContractInteraction::Message(message) => Some(message),
            ContractInteraction::Http(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Append an HTTP interaction. It must have progressed at least to its response status.
    pub fn append(&mut self, interaction: Interaction) -> Result<(), ContractError> {
        if interaction.stage() < InteractionStage::ResponseStatusSet {
            return Err(ContractError::InvalidInteractionSequence {
                expected: InteractionStage::ResponseStatusSet,
                actual: interaction.stage(),
            });
        }
        self.push(ContractInteraction::Http(interaction))
    }

    pub fn append_message(&mut self, message: Message) -> Result<(), ContractError> {
        self.push(ContractInteraction::Message(message))
    }

    /// Check that `message` can be appended, without appending it.
    pub(crate) fn check_message(&self, message: &Message) -> Result<(), ContractError> {
        self.check_entry(true, message.description(), message.provider_states())
    }

    fn check_entry(
        &self,
        is_message: bool,
        description: &str,
        states: &[ProviderState],
    ) -> Result<(), ContractError> {
        if self.sealed {
            return Err(ContractError::ContractSealed);
        }
        if description.is_empty() {
            return Err(ContractError::IncompleteInteraction);
        }
        if let Some(first) = self.interactions.first() {
            if first.is_message() != is_message {
                return Err(ContractError::MixedInteractionKind);
            }
        }
        let duplicate = self.interactions.iter().any(|existing| {
            existing.description() == description && existing.provider_states() == states
        });
        if duplicate {
            return Err(ContractError::DuplicateInteraction {
                description: description.to_string(),
            });
        }
        Ok(())
    }

    fn push(&mut self, entry: ContractInteraction) -> Result<(), ContractError> {
        self.check_entry(
            entry.is_message(),
            entry.description(),
            entry.provider_states(),
        )?;
        self.interactions.push(entry);
        Ok(())
    }

    /// Refine the most recently appended HTTP interaction (i.e. its response).
    pub(crate) fn last_interaction_mut(&mut self) -> Option<&mut Interaction> {
        if self.sealed {
            return None;
        }
        match self.interactions.last_mut() {
            Some(ContractInteraction::Http(interaction)) => Some(interaction),
            _ => None,
        }
    }

    /// Freeze the contract: every interaction is marked as complete and nothing else can be
    /// appended.
    pub(crate) fn seal(&mut self) {
        for entry in &mut self.interactions {
            if let ContractInteraction::Http(interaction) = entry {
                interaction.complete();
            }
        }
        self.sealed = true;
    }

    /// The pact file representation of this contract.
    pub fn to_pact_json(&self) -> Value {
        let mut pact = Map::new();
        pact.insert("consumer".into(), json!({ "name": self.consumer }));
        pact.insert("provider".into(), json!({ "name": self.provider }));

        let is_message_pact = self.interactions.iter().any(ContractInteraction::is_message);
        let entries: Vec<Value> = self
            .interactions
            .iter()
            .map(|entry| match entry {
                ContractInteraction::Http(interaction) => interaction.to_pact_json(),
                ContractInteraction::Message(message) => message.to_pact_json(),
            })
            .collect();
        let key = if is_message_pact {
            "messages"
        } else {
            "interactions"
        };
        pact.insert(key.into(), Value::Array(entries));

        pact.insert(
            "metadata".into(),
            json!({
                "pactSpecification": { "version": self.specification.pact_version() },
                "pactRust": { "pactmock": env!("CARGO_PKG_VERSION") }
            }),
        );
        Value::Object(pact)
    }
}

/// `[{"name": ..., "params": {...}}]`, `params` being omitted when empty.
pub(crate) fn provider_states_json(states: &[ProviderState]) -> Value {
    Value::Array(
        states
            .iter()
            .map(|state| {
                let mut entry = Map::new();
                entry.insert("name".into(), Value::from(state.name.as_str()));
                if !state.params.is_empty() {
                    entry.insert(
                        "params".into(),
                        Value::Object(state.params.clone().into_iter().collect()),
                    );
                }
                Value::Object(entry)
            })
            .collect(),
    )
}

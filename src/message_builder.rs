use crate::config::MockProviderConfig;
use crate::contract::Contract;
use crate::descriptor::FieldDescriptors;
use crate::error::{ContractError, DynError, ExecutionError, VerificationFailure};
use crate::interaction::ProviderState;
use crate::matchers::Template;
use crate::matching_rules::BodyMatchers;
use crate::message::{AsynchronousMessage, Message};
use crate::mock_provider::panic_message;
use crate::path::{Category, Path};
use crate::persistence::{ContractWriter, PactFileWriter};
use log::Level;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// A contract made of asynchronous messages.
///
/// There is no server involved: each message is built, its example content is handed to the
/// consumer's handler and, if the handler accepts it, the message is added to the contract and
/// the contract is written.
///
/// ```rust
/// use pactmock::matchers::{like, object};
/// use pactmock::{MessagePact, MockProviderConfig};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     name: String,
/// }
///
/// let pact_dir = std::env::temp_dir().join("pactmock-doc");
/// let mut pact = MessagePact::new(
///     MockProviderConfig::new("consumer", "provider").with_pact_dir(&pact_dir),
/// );
/// pact.add_message()
///     .given("User billy exists")
///     .expects_to_receive("A user created event")
///     .json_content(object().field("name", like("billy")))
///     .unwrap()
///     .as_type::<User>()
///     .consumed_by(|message| {
///         assert_eq!(message.content.name, "billy");
///         Ok::<_, std::io::Error>(())
///     })
///     .verify()
///     .unwrap();
/// # std::fs::remove_dir_all(pact_dir).unwrap();
/// ```
pub struct MessagePact<W = PactFileWriter> {
    config: MockProviderConfig,
    contract: Contract,
    writer: W,
}

impl MessagePact {
    pub fn new(config: MockProviderConfig) -> Self {
        let writer = PactFileWriter::new(config.pact_dir());
        Self::with_writer(config, writer)
    }
}

impl<W: ContractWriter> MessagePact<W> {
    pub fn with_writer(config: MockProviderConfig, writer: W) -> Self {
        let contract = Contract::new(
            config.consumer(),
            config.provider(),
            config.specification(),
        );
        Self {
            config,
            contract,
            writer,
        }
    }

    /// Start declaring a new message.
    pub fn add_message(&mut self) -> UnconfiguredMessage<'_, W> {
        let message = Message::new(self.contract.specification());
        UnconfiguredMessage {
            context: MessageContext {
                contract: &mut self.contract,
                writer: &self.writer,
                config: &self.config,
            },
            message,
        }
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }
}

struct MessageContext<'a, W> {
    contract: &'a mut Contract,
    writer: &'a W,
    config: &'a MockProviderConfig,
}

#[must_use]
pub struct UnconfiguredMessage<'a, W> {
    context: MessageContext<'a, W>,
    message: Message,
}

/// A described message: metadata and content can be set.
#[must_use]
pub struct ConfiguredMessage<'a, W> {
    context: MessageContext<'a, W>,
    message: Message,
}

/// A message whose content is handed to the consumer as a `T`.
#[must_use]
pub struct TypedMessage<'a, W, T> {
    context: MessageContext<'a, W>,
    message: Message,
    content_type: PhantomData<T>,
}

/// A message ready to be verified against its handler.
#[must_use]
pub struct MessageWithHandler<'a, W, T, F> {
    context: MessageContext<'a, W>,
    message: Message,
    handler: F,
    content_type: PhantomData<T>,
}

impl<'a, W> UnconfiguredMessage<'a, W> {
    pub fn given(mut self, state: &str) -> Self {
        self.message
            .given(state)
            .expect("A provider state without parameters is valid with every version");
        self
    }

    pub fn given_with_params(mut self, state: ProviderState) -> Result<Self, ContractError> {
        self.message.given(state)?;
        Ok(self)
    }

    pub fn expects_to_receive(mut self, description: &str) -> ConfiguredMessage<'a, W> {
        self.message.expects_to_receive(description);
        ConfiguredMessage {
            context: self.context,
            message: self.message,
        }
    }
}

impl<'a, W> ConfiguredMessage<'a, W> {
    pub fn with_metadata<K, V>(mut self, metadata: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in metadata {
            self.message.with_metadata(key, value);
        }
        self
    }

    pub fn json_content(mut self, content: impl Into<Template>) -> Result<Self, ContractError> {
        let version = self.context.contract.specification();
        let content = BodyMatchers::build(content.into(), version, Path::root(Category::Body))?;
        self.message.with_content(content)?;
        Ok(self)
    }

    /// Content shaped like `record`, with examples taken from `fields`.
    pub fn content_match<R: Serialize>(
        mut self,
        record: &R,
        fields: &FieldDescriptors,
    ) -> Result<Self, ContractError> {
        let version = self.context.contract.specification();
        let content =
            BodyMatchers::from_record(record, fields, version, Path::root(Category::Body))?;
        self.message.with_content(content)?;
        Ok(self)
    }

    /// The type the consumer's handler expects the content as.
    pub fn as_type<T: DeserializeOwned>(self) -> TypedMessage<'a, W, T> {
        TypedMessage {
            context: self.context,
            message: self.message,
            content_type: PhantomData,
        }
    }
}

impl<'a, W, T: DeserializeOwned> TypedMessage<'a, W, T> {
    pub fn consumed_by<F, E>(self, handler: F) -> MessageWithHandler<'a, W, T, F>
    where
        F: FnOnce(AsynchronousMessage<T>) -> Result<(), E>,
        E: Into<DynError>,
    {
        MessageWithHandler {
            context: self.context,
            message: self.message,
            handler,
            content_type: PhantomData,
        }
    }
}

impl<'a, W, T, F, E> MessageWithHandler<'a, W, T, F>
where
    W: ContractWriter,
    T: DeserializeOwned,
    F: FnOnce(AsynchronousMessage<T>) -> Result<(), E>,
    E: Into<DynError>,
{
    /// Hand the example content to the handler. If it succeeds, the message is added to the
    /// contract and the contract is written.
    pub fn verify(self) -> Result<(), ExecutionError> {
        let MessageWithHandler {
            context,
            message,
            handler,
            ..
        } = self;

        // Nothing the handler does can fix these: fail before invoking it.
        context
            .config
            .validate()
            .map_err(ExecutionError::InvalidConfiguration)?;
        context.contract.check_message(&message)?;

        let content: T = serde_json::from_value(message.example())
            .map_err(|e| ContractError::IncompatibleType(e.to_string()))?;
        let asynchronous_message = AsynchronousMessage {
            description: message.description().to_string(),
            metadata: message.metadata().clone(),
            content,
        };

        let exercise_error = match catch_unwind(AssertUnwindSafe(|| handler(asynchronous_message)))
        {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.into()),
            Err(panic) => Some(panic_message(panic)),
        };
        if let Some(exercise_error) = exercise_error {
            let failure = VerificationFailure {
                exercise_error: Some(exercise_error),
                mismatches: vec![],
            };
            context.log(
                Level::Warn,
                format_args!("Message `{}`: {}", message.description(), failure),
            );
            return Err(failure.into());
        }

        context.log(
            Level::Debug,
            format_args!("Message `{}` consumed", message.description()),
        );
        context.contract.append_message(message)?;
        context.writer.write_contract(context.contract)?;
        Ok(())
    }
}

impl<'a, W> MessageContext<'a, W> {
    fn log(&self, level: Level, message: std::fmt::Arguments<'_>) {
        if level <= self.config.log_level() {
            log::log!(level, "{}", message);
        }
    }
}

use crate::builder::UnconfiguredInteraction;
use crate::config::MockProviderConfig;
use crate::contract::Contract;
use crate::error::{DynError, ExecutionError, VerificationFailure};
use crate::interaction::Interaction;
use crate::mock_server::HttpMockServer;
use crate::persistence::{ContractWriter, PactFileWriter};
use crate::transport::{MockServerConfig, MockTransport, TransportConfig};
use futures::FutureExt;
use log::Level;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// Where a [`HttpMockProvider`] is in a test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Interactions can be added.
    Configured,
    /// The contract is sealed and handed to the transport.
    Loaded,
    /// The transport accepts connections.
    Listening,
    /// The exercise function returned (or panicked).
    Exercised,
    Verified,
    Failed,
    /// The transport has been stopped.
    TornDown,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A mock provider for HTTP interactions.
///
/// Interactions are declared with [`add_interaction`](HttpMockProvider::add_interaction), then
/// [`execute_test`](HttpMockProvider::execute_test) starts a mock server serving them, runs the
/// exercise function against it, verifies what the server received and, if everything matched,
/// writes the contract.
///
/// ```rust,no_run
/// use pactmock::matchers::{like, object};
/// use pactmock::{HttpMockProvider, MockProviderConfig};
///
/// #[async_std::main]
/// async fn main() {
///     let mut provider = HttpMockProvider::new(MockProviderConfig::new("consumer", "provider"));
///     provider
///         .add_interaction()
///         .given("User foo exists")
///         .upon_receiving("A request to get foo")
///         .with_request("GET", "/foo")
///         .unwrap()
///         .will_respond_with(200)
///         .unwrap()
///         .json_body(object().field("name", like("billy")))
///         .unwrap();
///
///     provider
///         .execute_test(|config| async move {
///             let body: serde_json::Value = reqwest::get(format!("{}/foo", config.uri()))
///                 .await?
///                 .json()
///                 .await?;
///             assert_eq!(body["name"], "billy");
///             Ok::<_, reqwest::Error>(())
///         })
///         .await
///         .unwrap();
/// }
/// ```
pub struct HttpMockProvider<T = HttpMockServer, W = PactFileWriter> {
    config: MockProviderConfig,
    contract: Contract,
    transport: T,
    writer: W,
    state: LifecycleState,
}

impl HttpMockProvider {
    /// A mock provider served by an [`HttpMockServer`], writing pact files to the configured
    /// directory.
    pub fn new(config: MockProviderConfig) -> Self {
        let transport = HttpMockServer::new(config.body_print_limit());
        let writer = PactFileWriter::new(config.pact_dir());
        Self::with_collaborators(config, transport, writer)
    }
}

impl<T: MockTransport, W: ContractWriter> HttpMockProvider<T, W> {
    pub fn with_collaborators(config: MockProviderConfig, transport: T, writer: W) -> Self {
        let contract = Contract::new(
            config.consumer(),
            config.provider(),
            config.specification(),
        );
        Self {
            config,
            contract,
            transport,
            writer,
            state: LifecycleState::Configured,
        }
    }

    /// Start declaring a new interaction.
    pub fn add_interaction(&mut self) -> UnconfiguredInteraction<'_> {
        UnconfiguredInteraction::new(&mut self.contract)
    }

    pub fn config(&self) -> &MockProviderConfig {
        &self.config
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Run a test against the mock provider.
    ///
    /// `exercise` receives the address of the running mock server and is expected to drive the
    /// consumer code under test against it. Once it returns (or panics) the server is verified
    /// and stopped. The contract is written only if the exercise succeeded and every expected
    /// request was received, with no unexpected one.
    ///
    /// The server is always stopped, whatever the outcome.
    pub async fn execute_test<F, Fut, E>(&mut self, exercise: F) -> Result<(), ExecutionError>
    where
        F: FnOnce(MockServerConfig) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Into<DynError>,
    {
        self.state = LifecycleState::Configured;
        self.config
            .validate()
            .map_err(ExecutionError::InvalidConfiguration)?;
        if self.contract.is_empty() {
            return Err(ExecutionError::EmptyContract);
        }

        self.contract.seal();
        self.transition(LifecycleState::Loaded);
        let interactions: Vec<Interaction> = self.contract.http_interactions().cloned().collect();
        let transport_config = TransportConfig {
            host: self.config.host().to_string(),
            port: self.config.port(),
            tls: self.config.tls(),
        };

        let server_config = match self.transport.start(&interactions, &transport_config).await {
            Ok(server_config) => server_config,
            Err(e) => {
                self.log(Level::Error, format_args!("{}", e));
                self.teardown().await;
                return Err(e.into());
            }
        };
        self.transition(LifecycleState::Listening);
        self.log(
            Level::Debug,
            format_args!("Mock provider listening on {}", server_config.uri()),
        );

        let exercise_error = match AssertUnwindSafe(exercise(server_config))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.into()),
            Err(panic) => Some(panic_message(panic)),
        };
        self.transition(LifecycleState::Exercised);

        let outcome = self.verify_and_persist(exercise_error).await;
        self.teardown().await;
        outcome
    }

    async fn verify_and_persist(
        &mut self,
        exercise_error: Option<DynError>,
    ) -> Result<(), ExecutionError> {
        let verification = self.transport.verify().await;
        if !verification.matched || exercise_error.is_some() {
            self.transition(LifecycleState::Failed);
            let failure = VerificationFailure {
                exercise_error,
                mismatches: verification.mismatches,
            };
            self.log(Level::Warn, format_args!("{}", failure));
            return Err(failure.into());
        }

        self.transition(LifecycleState::Verified);
        if let Err(e) = self.writer.write_contract(&self.contract) {
            self.log(Level::Error, format_args!("Failed to write the pact: {}", e));
            return Err(e.into());
        }
        Ok(())
    }

    async fn teardown(&mut self) {
        self.transport.stop().await;
        self.transition(LifecycleState::TornDown);
    }

    fn transition(&mut self, state: LifecycleState) {
        self.log(
            Level::Debug,
            format_args!("Mock provider: {} -> {}", self.state, state),
        );
        self.state = state;
    }

    fn log(&self, level: Level, message: fmt::Arguments<'_>) {
        if level <= self.config.log_level() {
            log::log!(level, "{}", message);
        }
    }
}

pub(crate) fn panic_message(panic: Box<dyn Any + Send>) -> DynError {
    let message = match panic.downcast::<String>() {
        Ok(message) => *message,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(message) => message.to_string(),
            Err(_) => "unknown panic".to_string(),
        },
    };
    format!("the test function panicked: {}", message).into()
}

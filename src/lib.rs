#![allow(clippy::needless_doctest_main)]
//! `pactmock` provides consumer-driven contract testing for Rust applications that interact with
//! HTTP APIs or consume asynchronous messages.
//!
//! A consumer declares, in code, the interactions it expects from a provider. `pactmock` serves
//! them from a disposable mock provider, checks that the consumer's client code exchanges exactly
//! the expected requests and, if it does, writes the interactions to a pact file that the
//! provider can later be verified against.
//!
//! # Table of Contents
//! 1. [Getting started](#getting-started)
//! 2. [Matching rules](#matching-rules)
//! 3. [Verification](#verification)
//! 4. [Messages](#messages)
//! 5. [Runtime compatibility](#runtime-compatibility)
//!
//! ## Getting started
//! ```rust
//! use pactmock::matchers::{like, object};
//! use pactmock::{HttpMockProvider, MockProviderConfig};
//!
//! #[async_std::main]
//! async fn main() {
//!     let pact_dir = std::env::temp_dir().join("pactmock-getting-started");
//!     let config = MockProviderConfig::new("UserClient", "UserService").with_pact_dir(&pact_dir);
//!     let mut provider = HttpMockProvider::new(config);
//!
//!     // When the provider receives a GET request on `/users/27` it answers with a user.
//!     provider
//!         .add_interaction()
//!         .given("User 27 exists")
//!         .upon_receiving("A request for user 27")
//!         .with_request("GET", "/users/27")
//!         .unwrap()
//!         .will_respond_with(200)
//!         .unwrap()
//!         .json_body(object().field("id", like(27)).field("name", like("billy")))
//!         .unwrap();
//!
//!     // Exercise the client code against the running mock provider.
//!     provider
//!         .execute_test(|server| async move {
//!             let user: serde_json::Value = reqwest::get(format!("{}/users/27", server.uri()))
//!                 .await?
//!                 .json()
//!                 .await?;
//!             assert_eq!(user["name"], "billy");
//!             Ok::<_, reqwest::Error>(())
//!         })
//!         .await
//!         .unwrap();
//!
//!     // The verified contract has been written to `UserClient-UserService.json`.
//!     assert!(pact_dir.join("UserClient-UserService.json").exists());
//!     # std::fs::remove_dir_all(pact_dir).unwrap();
//! }
//! ```
//!
//! ## Matching rules
//!
//! Plain values in a body are expected verbatim. The [`matchers`] module provides looser
//! expectations: same type as an example, a regex, arrays with a minimum number of elements
//! shaped like an example, arrays containing some elements in any order, values injected from
//! the provider state... Each rule is recorded in the pact file, next to the example it is built
//! from.
//!
//! Typed records can be used as bodies as well, see [`FieldDescriptors`].
//!
//! ## Verification
//!
//! [`HttpMockProvider::execute_test`] fails if the test function fails, if an expected
//! interaction was never exercised, or if the mock provider received a request that no
//! interaction accounts for. Every mismatch is reported, with the path of the mismatching element,
//! the violated expectation and the value received:
//! `$.body.id: expected type:number, got "27"`.
//!
//! Requests that do not match any interaction are answered with a `500` describing the
//! mismatches.
//!
//! ## Messages
//!
//! Contracts can describe asynchronous messages instead of HTTP interactions: see
//! [`MessagePact`].
//!
//! ## Runtime compatibility
//!
//! The mock provider runs on its own thread, with its own runtime: tests can use `tokio`,
//! `async-std` or any other async runtime.
pub mod http;
pub mod matchers;
#[cfg(feature = "tls")]
pub mod tls;

mod builder;
mod config;
mod contract;
mod descriptor;
mod error;
mod interaction;
mod interaction_set;
mod matching;
mod matching_rules;
mod message;
mod message_builder;
mod mock_provider;
mod mock_server;
mod mounted_interaction;
mod multipart;
mod path;
mod persistence;
mod request;
mod response_template;
mod transport;
mod verification;

pub use builder::{
    DescribedInteraction, InteractionWithRequest, InteractionWithResponse,
    UnconfiguredInteraction,
};
pub use config::{default_log_level, init_log_level, MockProviderConfig, BODY_PRINT_LIMIT_ENV};
pub use contract::{Contract, ContractInteraction, SpecificationVersion};
pub use descriptor::{FieldDescriptor, FieldDescriptors, GeneratorKind};
pub use error::{
    ContractError, DynError, ExecutionError, PersistenceError, TransportStartError,
    VerificationFailure,
};
pub use interaction::{
    Body, Interaction, InteractionStage, NamedValues, ProviderState, RequestSpec, ResponseSpec,
};
pub use matching_rules::{BodyMatchers, Generator, GeneratorTable, MatchingRule, RuleTable};
pub use message::{AsynchronousMessage, Message};
pub use message_builder::{
    ConfiguredMessage, MessagePact, MessageWithHandler, TypedMessage, UnconfiguredMessage,
};
pub use mock_provider::{HttpMockProvider, LifecycleState};
pub use mock_server::HttpMockServer;
pub use multipart::MultipartBody;
pub use path::{Category, Path, PathToken};
pub use persistence::{ContractWriter, PactFileWriter};
pub use request::{BodyPrintLimit, Request, BODY_PRINT_LIMIT};
pub use transport::{MockServerConfig, MockTransport, TlsMaterial, TransportConfig};
pub use verification::{Mismatch, VerificationResult};

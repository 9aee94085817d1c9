//! All bits and pieces concerning the HTTP mock provider are in this module.
//!
//! `bare_server::BareMockServer` is the "front-end" to drive behaviour for the `hyper` HTTP
//! server running in the background, defined in the `hyper` sub-module.
//!
//! `bare_server::BareMockServer` is not exposed directly: crate users only get to interact with
//! `exposed_server::HttpMockServer`, the [`MockTransport`](crate::MockTransport) implementation
//! driven by the lifecycle of a [`HttpMockProvider`](crate::HttpMockProvider).
mod bare_server;
mod exposed_server;
mod hyper;

pub use exposed_server::HttpMockServer;

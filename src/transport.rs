use crate::error::TransportStartError;
use crate::interaction::Interaction;
use crate::verification::VerificationResult;
use std::net::SocketAddr;

/// Where and how the mock transport should listen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub host: String,
    /// `0` lets the operating system pick a free port.
    pub port: u16,
    pub tls: bool,
}

/// A client needs this to trust a mock provider started with TLS enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    pub root_cert_der: Vec<u8>,
    pub root_cert_pem: String,
}

/// Where a running mock provider can be reached. It is handed to the exercise function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockServerConfig {
    pub address: SocketAddr,
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsMaterial>,
}

impl MockServerConfig {
    /// The base uri of the mock provider, e.g. `http://127.0.0.1:4372`.
    pub fn uri(&self) -> String {
        let scheme = if self.tls.is_some() { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

/// A mock implementation of the provider, serving the interactions of a contract.
///
/// [`HttpMockServer`](crate::HttpMockServer) is the implementation used by default; the
/// lifecycle only depends on this trait.
#[async_trait::async_trait]
pub trait MockTransport {
    /// Start serving `interactions`. Resolves once the transport is ready to accept connections.
    async fn start(
        &mut self,
        interactions: &[Interaction],
        config: &TransportConfig,
    ) -> Result<MockServerConfig, TransportStartError>;

    /// Report how the requests received so far compare to the served interactions.
    async fn verify(&self) -> VerificationResult;

    /// Stop serving. Calling it on a transport that is not running is a no-op.
    async fn stop(&mut self);
}

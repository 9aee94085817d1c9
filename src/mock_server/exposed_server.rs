use crate::error::TransportStartError;
use crate::interaction::Interaction;
use crate::mock_server::bare_server::BareMockServer;
use crate::mock_server::hyper::Acceptor;
use crate::request::BodyPrintLimit;
use crate::transport::{MockServerConfig, MockTransport, TlsMaterial, TransportConfig};
use crate::verification::VerificationResult;
use crate::Request;
use log::debug;
use std::net::{SocketAddr, TcpListener};

/// An HTTP web-server running in the background, playing the provider of a contract.
///
/// `HttpMockServer` is the [`MockTransport`] used by [`HttpMockProvider`] unless another one is
/// provided: it answers every request matching an interaction of the contract with the example
/// response of that interaction, and keeps track of everything it receives for verification.
///
/// Each instance is fully isolated: it listens on its own port (a random one, unless configured
/// otherwise) and shuts down when stopped or dropped.
///
/// [`HttpMockProvider`]: crate::HttpMockProvider
#[derive(Default)]
pub struct HttpMockServer {
    server: Option<BareMockServer>,
    body_print_limit: BodyPrintLimit,
}

impl HttpMockServer {
    pub fn new(body_print_limit: BodyPrintLimit) -> Self {
        Self {
            server: None,
            body_print_limit,
        }
    }

    /// The socket address the server listens on, if it is running.
    pub fn address(&self) -> Option<&SocketAddr> {
        self.server.as_ref().map(BareMockServer::address)
    }

    /// Return a vector with all received requests, matched or not.
    ///
    /// It returns an empty vector if the server is not running.
    pub async fn received_requests(&self) -> Vec<Request> {
        match &self.server {
            Some(server) => server.received_requests().await,
            None => Vec::new(),
        }
    }
}

#[async_trait::async_trait]
impl MockTransport for HttpMockServer {
    async fn start(
        &mut self,
        interactions: &[Interaction],
        config: &TransportConfig,
    ) -> Result<MockServerConfig, TransportStartError> {
        let address = format!("{}:{}", config.host, config.port);
        let start_error = |reason: String| TransportStartError {
            address: address.clone(),
            reason,
        };

        let listener = TcpListener::bind(&address).map_err(|e| start_error(e.to_string()))?;
        let (acceptor, tls) = acceptor(config.tls).await.map_err(start_error)?;
        let server = BareMockServer::start(listener, interactions, self.body_print_limit, acceptor)
            .await
            .map_err(|e| start_error(e.to_string()))?;

        let server_address = *server.address();
        debug!("Mock server listening on {}", server_address);
        self.server = Some(server);
        Ok(MockServerConfig {
            address: server_address,
            host: config.host.clone(),
            port: server_address.port(),
            tls,
        })
    }

    async fn verify(&self) -> VerificationResult {
        match &self.server {
            Some(server) => server.verify().await,
            None => VerificationResult::from_mismatches(vec![]),
        }
    }

    async fn stop(&mut self) {
        // Dropping the server triggers its shutdown.
        if let Some(server) = self.server.take() {
            debug!("Stopping mock server on {}", server.address());
        }
    }
}

#[cfg(feature = "tls")]
async fn acceptor(tls: bool) -> Result<(Acceptor, Option<TlsMaterial>), String> {
    use crate::tls::MockTlsCertificates;
    use hyper_server::tls_rustls::{RustlsAcceptor, RustlsConfig};

    if !tls {
        return Ok((Acceptor::Plain, None));
    }
    let certificates = MockTlsCertificates::generate().map_err(|e| e.to_string())?;
    let config = RustlsConfig::from_der(
        vec![certificates.server_cert_der()],
        certificates.server_private_key_der(),
    )
    .await
    .map_err(|e| e.to_string())?;
    Ok((
        Acceptor::Rustls(RustlsAcceptor::new(config)),
        Some(certificates.material()),
    ))
}

#[cfg(not(feature = "tls"))]
async fn acceptor(tls: bool) -> Result<(Acceptor, Option<TlsMaterial>), String> {
    if tls {
        Err("TLS support requires the `tls` feature".to_string())
    } else {
        Ok((Acceptor::Plain, None))
    }
}

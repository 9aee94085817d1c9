use crate::interaction::Interaction;
use crate::interaction_set::MountedInteractionSet;
use crate::mock_server::hyper::{run_server, Acceptor};
use crate::request::BodyPrintLimit;
use crate::verification::VerificationResult;
use crate::Request;
use http::Response;
use http_body_util::Full;
use hyper::body::Bytes;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use tokio::sync::{oneshot, watch, RwLock};

/// An HTTP web-server running in the background to behave as the provider of a contract.
///
/// `BareMockServer` is the actual mock server behind the publicly-exposed `HttpMockServer`.
pub(crate) struct BareMockServer {
    state: Arc<RwLock<MockServerState>>,
    server_address: SocketAddr,
    // When `_shutdown_trigger` gets dropped the listening server terminates gracefully.
    _shutdown_trigger: watch::Sender<()>,
}

/// The elements of [`BareMockServer`] that are affected by each incoming request.
/// By bundling them together, we can expose a unified `handle_request` that ensures
/// they are kept in sync.
pub(super) struct MockServerState {
    interaction_set: MountedInteractionSet,
}

impl MockServerState {
    pub(super) fn handle_request(&mut self, request: Request) -> Response<Full<Bytes>> {
        self.interaction_set.handle_request(request)
    }
}

impl BareMockServer {
    /// Start a new instance of a `BareMockServer` listening on the specified
    /// [`TcpListener`](std::net::TcpListener), serving `interactions`.
    ///
    /// The server runs on a dedicated thread, with its own single-threaded runtime: it keeps
    /// working whatever async runtime the test itself runs on.
    pub(super) async fn start(
        listener: TcpListener,
        interactions: &[Interaction],
        body_print_limit: BodyPrintLimit,
        acceptor: Acceptor,
    ) -> Result<Self, std::io::Error> {
        let (shutdown_trigger, shutdown_receiver) = watch::channel(());
        let (ready_sender, ready_receiver) = oneshot::channel();
        let state = Arc::new(RwLock::new(MockServerState {
            interaction_set: MountedInteractionSet::new(interactions, body_print_limit),
        }));
        let server_address = listener.local_addr()?;

        let server_state = state.clone();
        std::thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    let _ = ready_sender.send(Err(e));
                    return;
                }
            };
            runtime.block_on(run_server(
                listener,
                server_state,
                shutdown_receiver,
                acceptor,
                ready_sender,
            ))
        });

        match ready_receiver.await {
            Ok(Ok(())) => Ok(Self {
                state,
                server_address,
                _shutdown_trigger: shutdown_trigger,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "The mock server thread exited before it was ready",
            )),
        }
    }

    /// Compare what the server received with the interactions it serves.
    pub(super) async fn verify(&self) -> VerificationResult {
        self.state.read().await.interaction_set.verify()
    }

    /// Return a vector with all received requests, matched or not.
    pub(super) async fn received_requests(&self) -> Vec<Request> {
        self.state.read().await.interaction_set.received_requests()
    }

    /// Return the socket address of this running instance of `BareMockServer`, e.g. `127.0.0.1:4372`.
    pub(super) fn address(&self) -> &SocketAddr {
        &self.server_address
    }
}

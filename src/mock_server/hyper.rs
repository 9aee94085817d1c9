use crate::mock_server::bare_server::MockServerState;
use crate::response_template::ResponseTemplate;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch, RwLock};

/// How accepted connections are turned into byte streams.
#[derive(Clone)]
pub(super) enum Acceptor {
    Plain,
    #[cfg(feature = "tls")]
    Rustls(hyper_server::tls_rustls::RustlsAcceptor),
}

/// The actual HTTP server responding to incoming requests according to the interactions of the
/// contract.
///
/// `ready` is resolved once the listener is registered with the runtime: from that point on,
/// connections are accepted.
pub(super) async fn run_server(
    listener: std::net::TcpListener,
    server_state: Arc<RwLock<MockServerState>>,
    mut shutdown_signal: watch::Receiver<()>,
    acceptor: Acceptor,
    ready: oneshot::Sender<std::io::Result<()>>,
) {
    let listener = match listener
        .set_nonblocking(true)
        .and_then(|_| TcpListener::from_std(listener))
    {
        Ok(listener) => {
            let _ = ready.send(Ok(()));
            listener
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    loop {
        tokio::select! {
            biased;
            // This resolves when either:
            // - the sender half of the channel gets dropped (i.e. the mock server is dropped)
            // - the sender is used, therefore sending a poison pill willingly as a shutdown signal
            _ = shutdown_signal.changed() => break,
            accepted = listener.accept() => {
                let stream = match accepted {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        log::debug!("Failed to accept a connection: {}", e);
                        continue;
                    }
                };
                let server_state = server_state.clone();
                let shutdown_signal = shutdown_signal.clone();
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    match acceptor {
                        Acceptor::Plain => {
                            serve_connection(stream, server_state, shutdown_signal).await
                        }
                        #[cfg(feature = "tls")]
                        Acceptor::Rustls(acceptor) => {
                            use hyper_server::accept::Accept;
                            match acceptor.accept(stream, ()).await {
                                Ok((stream, ())) => {
                                    serve_connection(stream, server_state, shutdown_signal).await
                                }
                                Err(e) => log::debug!("TLS handshake failed: {}", e),
                            }
                        }
                    }
                });
            }
        }
    }
}

async fn serve_connection<S>(
    stream: S,
    server_state: Arc<RwLock<MockServerState>>,
    mut shutdown_signal: watch::Receiver<()>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let request_handler = service_fn(move |request: hyper::Request<Incoming>| {
        let server_state = server_state.clone();
        async move {
            let response = match crate::Request::from_hyper(request).await {
                Ok(request) => server_state.write().await.handle_request(request),
                Err(e) => ResponseTemplate::bad_request(e).generate_response(),
            };
            Ok::<_, Infallible>(response)
        }
    });

    let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), request_handler);
    tokio::pin!(connection);

    let mut shutting_down = false;
    loop {
        tokio::select! {
            result = connection.as_mut() => {
                if let Err(e) = result {
                    log::debug!("Connection error: {}", e);
                }
                break;
            }
            _ = shutdown_signal.changed(), if !shutting_down => {
                shutting_down = true;
                connection.as_mut().graceful_shutdown();
            }
        }
    }
}

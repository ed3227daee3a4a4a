//! TCP accept loop and per-connection serving.

use std::convert::Infallible;
use std::time::Duration;

use http::{Request, Response};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::{debug, error, info};

use crate::response::GatewayBody;

/// Grace period for in-flight connections once shutdown begins.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Accept connections on `listener` and serve them with `service` until
/// the shutdown token is cancelled.
///
/// Each connection runs on its own task with HTTP/1 and HTTP/2 auto
/// negotiation and TCP_NODELAY set. Requests on different connections are
/// fully independent; the service carries no shared mutable state.
pub async fn serve<S>(
    listener: TcpListener,
    service: S,
    shutdown: CancellationToken,
) -> std::io::Result<()>
where
    S: Service<Request<Incoming>, Response = Response<GatewayBody>, Error = Infallible>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer_addr)) => {
                        debug!(peer = %peer_addr, "Accepted connection");
                        if let Err(e) = stream.set_nodelay(true) {
                            error!(error = %e, "Failed to set TCP_NODELAY");
                        }
                        let conn_service = service.clone();
                        let conn_shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            handle_connection(stream, conn_service, conn_shutdown).await;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                }
            }

            _ = shutdown.cancelled() => {
                info!("Shutdown signal received, no longer accepting connections");
                break;
            }
        }
    }

    Ok(())
}

/// Serve one connection, closing it gracefully on shutdown.
async fn handle_connection<S>(stream: TcpStream, service: S, shutdown: CancellationToken)
where
    S: Service<Request<Incoming>, Response = Response<GatewayBody>, Error = Infallible>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    let io = TokioIo::new(stream);

    let svc_fn = service_fn(move |req| {
        let mut svc = service.clone();
        async move { svc.call(req).await }
    });

    let builder = auto::Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection(io, svc_fn);
    tokio::pin!(conn);

    tokio::select! {
        result = &mut conn => {
            if let Err(e) = result {
                // Client resets and half-closes land here; not actionable.
                debug!(error = %e, "Connection closed with error");
            }
        }
        _ = shutdown.cancelled() => {
            conn.as_mut().graceful_shutdown();
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, conn).await;
        }
    }
}

//! HTTP/1 accept loop
//!
//! Each connection is served on its own task. On cancellation the
//! listener stops accepting, open connections are asked to finish their
//! in-flight request, and `serve` returns once they have.

use std::convert::Infallible;
use std::sync::Arc;

use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::routes::route;
use crate::state::AppState;

/// Largest request body accepted
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Serves requests from `listener` until `shutdown` is cancelled
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let tracker = TaskTracker::new();
    info!(addr = %listener.local_addr()?, "HTTP server listening");

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        continue;
                    }
                };
                debug!(%peer, "Connection accepted");

                let io = TokioIo::new(stream);
                let state = Arc::clone(&state);
                let shutdown = shutdown.clone();
                tracker.spawn(async move {
                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(req, &state).await }
                    });

                    let conn = http1::Builder::new().serve_connection(io, service);
                    tokio::pin!(conn);
                    let result = tokio::select! {
                        result = conn.as_mut() => result,
                        _ = shutdown.cancelled() => {
                            conn.as_mut().graceful_shutdown();
                            conn.await
                        }
                    };
                    if let Err(e) = result {
                        error!(error = %e, %peer, "HTTP connection error");
                    }
                });
            }
            _ = shutdown.cancelled() => {
                info!("HTTP server shutting down");
                break;
            }
        }
    }

    tracker.close();
    tracker.wait().await;
    info!("All connections closed");
    Ok(())
}

async fn handle_request(
    req: Request<Incoming>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let path = parts.uri.path().to_string();

    let (status, body) = match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => {
            let reply = route(state, &parts.method, &path, collected.to_bytes()).await;
            (reply.status, reply.body)
        }
        Err(e) => (
            StatusCode::PAYLOAD_TOO_LARGE,
            json!({"success": false, "error": format!("request body rejected: {e}")}),
        ),
    };
    debug!(method = %parts.method, %path, status = status.as_u16(), "Request handled");

    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

/// Cancels `token` on SIGINT or SIGTERM
pub async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

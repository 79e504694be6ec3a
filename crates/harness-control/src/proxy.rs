//! The control-plane proxy server.
//!
//! Binds one supervisor to a fixed set of routes, one per lifecycle
//! operation. Operation errors are passed through as a 500 with the error
//! text in the body; there is no structured error taxonomy at this layer.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use harness_common::{Error, FlushStatus, Result, ServerLifecycle};

use crate::types::{ConfigRequest, LogsResponse, PingResponse};

type Shared<S> = Arc<Mutex<S>>;

/// HTTP server wrapping one supervisor for its whole lifetime.
///
/// Concurrent requests serialize on the supervisor's mutex; the intended
/// usage pattern is one test-runner client at a time.
pub struct ControlPlaneProxy<S: ServerLifecycle + 'static> {
    supervisor: Shared<S>,
    addr: SocketAddr,
    cancel: CancellationToken,
    server: JoinHandle<()>,
}

impl<S: ServerLifecycle + 'static> ControlPlaneProxy<S> {
    /// Binds the listener and starts serving the control-plane routes.
    /// Pass port 0 to let the OS pick one; the bound address is available
    /// through [`local_addr`](Self::local_addr).
    pub async fn bind(supervisor: S, addr: SocketAddr) -> Result<Self> {
        let supervisor = Arc::new(Mutex::new(supervisor));
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;

        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();
        let app = router(Arc::clone(&supervisor));
        let server = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "control plane server failed");
            }
        });

        info!(%addr, "control plane listening");
        Ok(Self {
            supervisor,
            addr,
            cancel,
            server,
        })
    }

    /// The address the proxy is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// The owned supervisor, shared with the route handlers.
    pub fn supervisor(&self) -> &Shared<S> {
        &self.supervisor
    }

    /// Stops and kill-alls the owned supervisor, then closes the
    /// listening socket. No managed process outlives the proxy.
    pub async fn shutdown(self) -> Result<()> {
        {
            let mut supervisor = self.supervisor.lock().await;
            supervisor.stop().await?;
            supervisor.kill_all().await?;
        }
        self.cancel.cancel();
        self.server
            .await
            .map_err(|e| Error::internal(format!("control plane task failed: {e}")))?;
        info!("control plane stopped");
        Ok(())
    }
}

fn router<S: ServerLifecycle + 'static>(supervisor: Shared<S>) -> Router {
    Router::new()
        .route("/config", post(load_config::<S>))
        .route("/start", post(start::<S>))
        .route("/ping", get(ping::<S>))
        .route("/flush", post(flush::<S>))
        .route("/stop", post(stop::<S>))
        .route("/killAll", post(kill_all::<S>))
        .route("/logs", get(logs::<S>))
        .with_state(supervisor)
}

fn pass_through(err: Error) -> (StatusCode, String) {
    error!(error = %err, "supervisor operation failed");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

async fn load_config<S: ServerLifecycle>(
    State(supervisor): State<Shared<S>>,
    Json(request): Json<ConfigRequest>,
) -> std::result::Result<&'static str, (StatusCode, String)> {
    supervisor
        .lock()
        .await
        .load_config(&request.path_to_config)
        .await
        .map_err(pass_through)?;
    Ok("OK")
}

async fn start<S: ServerLifecycle>(
    State(supervisor): State<Shared<S>>,
    body: Bytes,
) -> std::result::Result<String, (StatusCode, String)> {
    // An absent body counts as an empty env map.
    let env: HashMap<String, String> = if body.is_empty() {
        HashMap::new()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid env map: {e}")))?
    };
    supervisor.lock().await.start(env).await.map_err(pass_through)
}

async fn ping<S: ServerLifecycle>(
    State(supervisor): State<Shared<S>>,
) -> std::result::Result<Json<PingResponse>, (StatusCode, String)> {
    let http_api_version = supervisor.lock().await.ping().await.map_err(pass_through)?;
    Ok(Json(PingResponse { http_api_version }))
}

async fn flush<S: ServerLifecycle>(
    State(supervisor): State<Shared<S>>,
) -> std::result::Result<(StatusCode, Json<FlushStatus>), (StatusCode, String)> {
    let flushed = supervisor.lock().await.flush().await.map_err(pass_through)?;
    // The managed server's own answer becomes the proxy's answer.
    let status = StatusCode::from_u16(flushed.status)
        .map_err(|e| pass_through(Error::internal(e.to_string())))?;
    Ok((status, Json(flushed)))
}

async fn stop<S: ServerLifecycle>(
    State(supervisor): State<Shared<S>>,
) -> std::result::Result<&'static str, (StatusCode, String)> {
    supervisor.lock().await.stop().await.map_err(pass_through)?;
    Ok("OK")
}

async fn kill_all<S: ServerLifecycle>(
    State(supervisor): State<Shared<S>>,
) -> std::result::Result<&'static str, (StatusCode, String)> {
    supervisor.lock().await.kill_all().await.map_err(pass_through)?;
    Ok("OK")
}

async fn logs<S: ServerLifecycle>(
    State(supervisor): State<Shared<S>>,
) -> std::result::Result<Json<LogsResponse>, (StatusCode, String)> {
    let logs = supervisor.lock().await.logs().await.map_err(pass_through)?;
    Ok(Json(LogsResponse { logs }))
}

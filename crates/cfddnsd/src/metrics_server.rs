//! Prometheus scrape endpoint
//!
//! Serves the controller's registry as `GET /metrics` until the shutdown
//! token is cancelled.

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use prometheus::Registry;
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

fn create_app(registry: Registry) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(registry)
}

async fn render_metrics(State(registry): State<Registry>) -> Response {
    match cfddns_core::metrics::render(&registry) {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Running metrics server
pub struct MetricsServer {
    socket: SocketAddr,
    join_handle: JoinHandle<()>,
}

impl MetricsServer {
    /// Bind `addr` and start serving
    pub async fn start(
        addr: SocketAddr,
        registry: Registry,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind metrics endpoint on {}", addr))?;
        let socket = listener.local_addr()?;

        let app = create_app(registry);
        let join_handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
                .unwrap_or_else(|e| error!("Metrics server error: {}", e));
        });

        info!("Serving metrics on http://{}/metrics", socket);
        Ok(Self {
            socket,
            join_handle,
        })
    }

    /// Address the server is listening on
    pub fn listen_socket(&self) -> SocketAddr {
        self.socket
    }

    /// Wait for the server to finish after shutdown
    pub async fn stopped(self) {
        if let Err(e) = self.join_handle.await {
            error!("Metrics server task failed: {}", e);
        }
    }
}

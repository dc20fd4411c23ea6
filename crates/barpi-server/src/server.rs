//! `BarPiServer`: Axum HTTP + `WebSocket` server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use barpi_stomp::{MessagingCore, Publisher, UsernameResolver};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::health::HealthResponse;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::connection::{ConnectionContext, run_connection};
use crate::websocket::sockjs;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Per-connection dependencies.
    pub connection: ConnectionContext,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// Tracks upgraded connections for draining.
    pub shutdown: Arc<ShutdownCoordinator>,
}

/// The Bar-Pi server.
pub struct BarPiServer {
    config: Arc<ServerConfig>,
    core: Arc<MessagingCore>,
    resolver: Arc<dyn UsernameResolver>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl BarPiServer {
    /// Create a new server around an existing messaging core.
    pub fn new(
        config: ServerConfig,
        core: Arc<MessagingCore>,
        resolver: Arc<dyn UsernameResolver>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            core,
            resolver,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            connection: ConnectionContext {
                core: Arc::clone(&self.core),
                resolver: Arc::clone(&self.resolver),
                shutdown: self.shutdown.token(),
                heartbeat_interval: self.config.heartbeat_interval(),
                write_timeout: self.config.write_timeout(),
            },
            config: Arc::clone(&self.config),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
            shutdown: Arc::clone(&self.shutdown),
        };

        let ws_path = self.config.ws_path.as_str();
        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route(ws_path, get(ws_handler))
            .route(&format!("{ws_path}/info"), get(sockjs::info_handler))
            .route(&format!("{ws_path}/{{*rest}}"), get(ws_transport_handler))
            .with_state(state)
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address and serve in a background task.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    /// The task ends after [`ShutdownCoordinator::shutdown`]; pass it to
    /// [`ShutdownCoordinator::drain`] to also wait for open connections.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "http server failed");
            }
        });

        info!(%local_addr, ws_path = %self.config.ws_path, "Bar-Pi server listening");
        Ok((local_addr, handle))
    }

    /// Get the messaging core.
    pub fn core(&self) -> &Arc<MessagingCore> {
        &self.core
    }

    /// A publisher bound to this server's core.
    pub fn publisher(&self) -> Publisher {
        Publisher::new(Arc::clone(&self.core))
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Response {
    Json(HealthResponse::snapshot(
        &state.config,
        &state.connection.core,
        state.start_time,
    ))
    .into_response()
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// GET {ws_path}
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    upgrade(ws, state)
}

/// GET {ws_path}/{*rest}: SockJS raw-websocket transport URLs
/// (`/{server}/{session}/websocket`). iframe pages are not served.
async fn ws_transport_handler(
    Path(rest): Path<String>,
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if rest.starts_with("iframe") {
        return StatusCode::NOT_FOUND.into_response();
    }
    match ws {
        Ok(ws) => upgrade(ws, state),
        Err(rejection) => rejection.into_response(),
    }
}

fn upgrade(ws: WebSocketUpgrade, state: AppState) -> Response {
    let AppState {
        connection,
        config,
        shutdown,
        ..
    } = state;
    ws.max_message_size(config.max_message_size)
        .on_upgrade(move |socket| shutdown.track(run_connection(socket, connection)))
}

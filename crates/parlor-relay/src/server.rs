//! HTTP surface: the WebSocket endpoint, health and presence, static files.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Query, State,
        ws::{WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use futures::StreamExt;
use parlor_core::DisplayName;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{info, warn};

use crate::config::RelayConfig;
use crate::connection::ConnectionHandle;
use crate::dispatcher::{Dispatcher, Outbox};
use crate::error::RelayError;
use crate::lifecycle::{self, Session};
use crate::registry::Registry;

/// Build identifier baked in by `build.rs`.
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

/// Shared relay state handed to every request.
pub struct RelayState {
    registry: Arc<Registry>,
    outbox: Outbox,
    config: RelayConfig,
}

impl RelayState {
    /// Create the state and the dispatcher that must be spawned alongside it.
    pub fn new(config: RelayConfig) -> (Arc<Self>, Dispatcher) {
        let registry = Arc::new(Registry::new());
        let (outbox, dispatcher) = Dispatcher::new(Arc::clone(&registry), config.write_timeout);
        let state = Arc::new(Self {
            registry,
            outbox,
            config,
        });
        (state, dispatcher)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

/// Routes for the relay.
pub fn router(state: Arc<RelayState>) -> Router {
    let assets = ServeDir::new(&state.config.static_dir);
    Router::new()
        .route("/ws", get(connect))
        .route("/health", get(health))
        .route("/api/presence", get(presence))
        .fallback_service(assets)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// A bound, not yet serving, relay.
pub struct Relay {
    listener: TcpListener,
    state: Arc<RelayState>,
}

impl Relay {
    /// Bind the listener and start the dispatcher.
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        let (state, dispatcher) = RelayState::new(config);
        tokio::spawn(dispatcher.run());
        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> Arc<RelayState> {
        Arc::clone(&self.state)
    }

    /// Serve until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), RelayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = router(self.state);
        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    #[serde(default)]
    pub username: Option<String>,
}

/// GET /ws: check the name, then upgrade.
async fn connect(
    State(state): State<Arc<RelayState>>,
    Query(params): Query<ConnectParams>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let name = match lifecycle::admit(params.username.as_deref(), Utc::now()) {
        Ok(name) => name,
        Err(e) => {
            warn!("rejected connection: {e}");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            warn!("websocket accept error: {rejection}");
            return rejection.into_response();
        }
    };

    upgrade.on_upgrade(move |socket| handle_socket(socket, name, state))
}

async fn handle_socket(socket: WebSocket, name: DisplayName, state: Arc<RelayState>) {
    let (sink, stream) = socket.split();
    let handle = Arc::new(ConnectionHandle::new(name, Box::new(sink)));
    let session = Session::new(
        handle,
        Arc::clone(&state.registry),
        state.outbox.clone(),
        &state.config,
    );
    let _ = session.run(stream).await;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub version: String,
    pub connections: usize,
}

/// GET /health
async fn health(State(state): State<Arc<RelayState>>) -> Json<Health> {
    Json(Health {
        status: "ok".into(),
        version: BUILD_VERSION.into(),
        connections: state.registry.len().await,
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Presence {
    pub online: usize,
}

/// GET /api/presence: how many participants are connected right now.
async fn presence(State(state): State<Arc<RelayState>>) -> Json<Presence> {
    let online = state.registry.len().await;
    Json(Presence { online })
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

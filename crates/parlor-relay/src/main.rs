//! Parlor relay server.
//!
//! Serves the chat WebSocket at `/ws` and static client files for every
//! other path. Settings come from `PARLOR_*` environment variables.

use parlor_relay::server::{BUILD_VERSION, shutdown_signal};
use parlor_relay::{Relay, RelayConfig, RelayError};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("relay failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), RelayError> {
    let config = RelayConfig::from_env()?;
    let relay = Relay::bind(config.clone()).await?;
    let addr = relay.local_addr()?;

    tracing::info!("Parlor relay {BUILD_VERSION} listening on {addr}");
    tracing::info!("Web client: http://{addr}/ (from {})", config.static_dir.display());
    tracing::info!("WebSocket:  ws://{addr}/ws");

    relay.serve(shutdown_signal()).await
}

//! Tandem - paired co-storytelling server
//!
//! Binds the TCP transport to the coordination core and the narration
//! backend. Takes an optional config file path as its only argument.

use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tandem_core::{Narrator, Orchestrator, ServerConfig, SessionRegistry};
use tandem_net::Server;

mod narrator;

use narrator::{HttpNarrator, OfflineNarrator};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => match ServerConfig::load(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Failed to load config {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => ServerConfig::default(),
    };

    tracing::info!(
        port = config.listen_port,
        session_secs = config.session_secs,
        mode = ?config.orchestration,
        "Starting tandem server"
    );

    let narrator: Arc<dyn Narrator> = match HttpNarrator::from_config(&config.narrator) {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            tracing::warn!("Narration backend unavailable ({}), stories will use fallback lines", e);
            Arc::new(OfflineNarrator)
        }
    };

    let registry = Arc::new(SessionRegistry::new(config.session_secs));
    let orchestrator = Orchestrator::new(
        registry.clone(),
        narrator,
        config.orchestration,
        config.narration_ceiling,
    );

    let server = match Server::start(config.listen_port, registry, orchestrator).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }

    tracing::info!("Shutting down");
    server.shutdown();
}

//! # barpi
//!
//! Bar-Pi messaging server binary. Loads settings, wires the messaging core
//! to the HTTP/WebSocket server, and runs until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use barpi_auth::JwtUsernameResolver;
use barpi_server::metrics::install_recorder;
use barpi_server::{BarPiServer, ServerConfig};
use barpi_settings::BarPiSettings;
use barpi_stomp::{MessagingConfig, MessagingCore};
use clap::Parser;

/// Bar-Pi push-messaging server.
#[derive(Parser, Debug)]
#[command(name = "barpi", about = "Bar-Pi STOMP-over-WebSocket server")]
struct Cli {
    /// Host to bind (overrides settings if specified).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings if specified).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.barpi/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Load settings from the chosen file, then apply CLI overrides.
fn resolve_settings(cli: &Cli) -> Result<BarPiSettings> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(barpi_settings::settings_path);
    let mut settings = barpi_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;

    if let Some(host) = &cli.host {
        settings.server.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    Ok(settings)
}

fn init_subscriber(level: &str, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    // try_init is a no-op if a subscriber is already set
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.compact().try_init();
    }
}

fn messaging_config(settings: &BarPiSettings) -> MessagingConfig {
    MessagingConfig {
        mailbox_capacity: settings.messaging.mailbox_capacity,
        server_name: settings.messaging.server_name.clone(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let settings = resolve_settings(&cli)?;
    init_subscriber(&settings.logging.level, settings.logging.json);

    let metrics = install_recorder().context("Failed to install metrics recorder")?;
    let core = Arc::new(MessagingCore::new(messaging_config(&settings)));
    let resolver = JwtUsernameResolver::new(&settings.jwt.secret)
        .context("Failed to initialize JWT validation")?;

    let server = BarPiServer::new(ServerConfig::from(&settings), core, Arc::new(resolver))
        .with_metrics(metrics);
    let (addr, handle) = server.listen().await.context("Failed to start server")?;

    tracing::info!(
        "{} {} listening on http://{addr}{}",
        settings.name,
        settings.version,
        settings.messaging.ws_path
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().drain(handle, None).await;

    tracing::info!("Shutdown complete");
    Ok(())
}

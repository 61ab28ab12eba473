//! # storefront-server
//!
//! Realtime notification server binary — wires the credential verifier,
//! room directory, event router, and push notifier into one Axum server.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use storefront_auth::{CredentialVerifier, JwtVerifier};
use storefront_realtime::config::RealtimeConfig;
use storefront_realtime::push::{
    HttpPushTransport, MemoryRegistrationStore, PushNotifier, RegistrationStore,
    SqliteRegistrationStore,
};
use storefront_realtime::router::MemoryOrderStore;
use storefront_realtime::server::RealtimeServer;

/// Storefront realtime notification server.
#[derive(Parser, Debug)]
#[command(name = "storefront-server", about = "Realtime order notification server")]
struct Cli {
    /// Path to a JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides config; 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Log filter, e.g. `info` or `storefront_realtime=debug`.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn ensure_parent_dir(path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    storefront_core::logging::init_subscriber(&args.log_level);

    let mut config = match &args.config {
        Some(path) => RealtimeConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => RealtimeConfig::from_env(),
    };
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if config.jwt_secret.is_empty() {
        bail!("no JWT secret configured (set STOREFRONT_JWT_SECRET or jwt_secret in the config file)");
    }

    let verifier: Arc<dyn CredentialVerifier> =
        Arc::new(JwtVerifier::new(&config.jwt_secret));

    let registrations: Arc<dyn RegistrationStore> = match &config.push_db_path {
        Some(path) => {
            ensure_parent_dir(path)?;
            tracing::info!(path = %path.display(), "push registrations persisted to SQLite");
            Arc::new(SqliteRegistrationStore::open(path).context("failed to open push store")?)
        }
        None => {
            tracing::warn!("no push database configured, registrations are in-memory only");
            Arc::new(MemoryRegistrationStore::new())
        }
    };
    let transport = Arc::new(HttpPushTransport::new().context("failed to build push transport")?);
    let notifier = Arc::new(PushNotifier::new(registrations, transport));

    let metrics = storefront_realtime::metrics::install_recorder();

    let server = RealtimeServer::new(
        config,
        verifier,
        Arc::new(MemoryOrderStore::new()),
        notifier,
        metrics,
    );
    server.serve().await
}

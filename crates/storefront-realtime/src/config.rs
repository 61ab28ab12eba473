//! Server configuration.
//!
//! Defaults are suitable for local development; a JSON config file and
//! `STOREFRONT_*` environment variables override them, environment last.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Configuration for the realtime server.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Interval between server-initiated Ping frames, in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close a session after this many seconds without a Pong.
    pub heartbeat_timeout_secs: u64,
    /// Credential verification budget per join, in seconds.
    pub auth_timeout_secs: u64,
    /// HMAC secret for session token verification.
    pub jwt_secret: String,
    /// Path to the push registration database; in-memory when unset.
    pub push_db_path: Option<PathBuf>,
    /// URL opened when a push notification is clicked.
    pub default_notification_url: String,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 60,
            auth_timeout_secs: 5,
            jwt_secret: String::new(),
            push_db_path: None,
            default_notification_url: "/orders.html".into(),
        }
    }
}

impl RealtimeConfig {
    /// Load configuration from a JSON file, then apply environment
    /// overrides.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&raw)?;
        config.apply_env();
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("STOREFRONT_HOST") {
            self.host = host;
        }
        if let Some(port) = env_parsed("STOREFRONT_PORT") {
            self.port = port;
        }
        if let Ok(secret) = std::env::var("STOREFRONT_JWT_SECRET") {
            self.jwt_secret = secret;
        }
        if let Ok(path) = std::env::var("STOREFRONT_PUSH_DB") {
            self.push_db_path = Some(PathBuf::from(path));
        }
        if let Some(secs) = env_parsed("STOREFRONT_AUTH_TIMEOUT_SECS") {
            self.auth_timeout_secs = secs;
        }
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

//! Error types for the realtime service.
//!
//! The taxonomy mirrors the subsystem's failure policy: unauthorized
//! connections are terminated and never retried; malformed events are
//! dropped with no side effects; an empty push selection is a declined
//! operation rather than a fault; delivery failures stay isolated per
//! target.

use storefront_auth::AuthError;
use thiserror::Error;

/// Session gateway failures.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Credential verification failed, timed out, or the principal lacks
    /// the required role. The session is disconnected; no retry.
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    /// Principal verified but lacks admin rights for the admin room.
    #[error("unauthorized: principal {0} is not an admin")]
    NotAdmin(String),
}

/// Event router failures.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The event carried no order identifier; dropped before any
    /// room directory access.
    #[error("order event is missing an order id")]
    MissingOrderId,
}

/// Push notifier failures.
#[derive(Debug, Error)]
pub enum PushError {
    /// No registrations matched the send request; zero deliveries
    /// were attempted.
    #[error("no push registrations matched")]
    NoRegistrations,

    /// The registration store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Registration store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite error.
    #[error("registration store: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Endpoint descriptor could not be (de)serialized.
    #[error("endpoint descriptor: {0}")]
    Serde(#[from] serde_json::Error),
}

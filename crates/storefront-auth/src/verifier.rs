//! The verification seam: [`CredentialVerifier`] and [`PrincipalStore`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use storefront_core::UserId;

use crate::errors::AuthError;

/// An authenticated identity attached to a request or connection.
///
/// Resolved per verification; never persisted by this subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Account ID.
    pub id: UserId,
    /// Whether the account has admin rights.
    pub is_admin: bool,
    /// Human-readable name for logs and notifications.
    pub display_name: String,
}

/// Validates a bearer credential and resolves it to a [`Principal`].
///
/// Used identically by HTTP middleware and the realtime gateway.
/// Implementations may suspend (e.g. a store lookup); callers impose
/// their own deadline and fail closed on timeout.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Verify `token`, returning the principal it names.
    async fn verify(&self, token: &str) -> Result<Principal, AuthError>;
}

/// Lookup of account records in the persistence layer.
///
/// External collaborator; the realtime subsystem only reads through this
/// interface.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Fetch the principal for `id`, or `None` when no such account exists.
    async fn find_user_by_id(&self, id: &UserId) -> Result<Option<Principal>, AuthError>;
}

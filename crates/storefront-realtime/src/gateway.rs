//! Session gateway — authenticates realtime connections and manages
//! their room membership through disconnect.
//!
//! Verification failures are terminal for the connection: the caller
//! closes the socket and the client must reconnect with a valid
//! credential. Every failure cause (bad signature, expiry, unknown
//! principal, lookup error, timeout) collapses into a single
//! unauthorized outcome on the wire; the cause is only logged.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use storefront_auth::{AuthError, CredentialVerifier, Principal};
use storefront_core::ConnectionId;
use tracing::{info, warn};

use crate::connection::ClientConnection;
use crate::errors::GatewayError;
use crate::metrics::JOIN_REJECTED_TOTAL;
use crate::rooms::{RoomDirectory, RoomKey};

/// Authenticates connections and joins them to rooms.
pub struct SessionGateway {
    rooms: Arc<RoomDirectory>,
    verifier: Arc<dyn CredentialVerifier>,
    auth_timeout: Duration,
}

impl SessionGateway {
    /// Create a gateway over a room directory and credential verifier.
    ///
    /// `auth_timeout` bounds each verification; a verification that does
    /// not complete in time fails closed as unauthorized.
    pub fn new(
        rooms: Arc<RoomDirectory>,
        verifier: Arc<dyn CredentialVerifier>,
        auth_timeout: Duration,
    ) -> Self {
        Self {
            rooms,
            verifier,
            auth_timeout,
        }
    }

    async fn verify(&self, token: &str) -> Result<Principal, GatewayError> {
        match tokio::time::timeout(self.auth_timeout, self.verifier.verify(token)).await {
            Ok(Ok(principal)) => Ok(principal),
            Ok(Err(cause)) => {
                warn!(%cause, "credential verification failed");
                Err(GatewayError::Unauthorized(cause))
            }
            Err(_) => {
                warn!(timeout = ?self.auth_timeout, "credential verification timed out");
                Err(GatewayError::Unauthorized(AuthError::Timeout))
            }
        }
    }

    /// Verify an admin credential and join the connection to the admin
    /// room. On failure the connection must be closed by the caller.
    pub async fn authenticate_admin(
        &self,
        connection: &Arc<ClientConnection>,
        token: &str,
    ) -> Result<(), GatewayError> {
        let principal = match self.verify(token).await {
            Ok(p) => p,
            Err(e) => {
                counter!(JOIN_REJECTED_TOTAL, "room" => "adminRoom").increment(1);
                return Err(e);
            }
        };
        if !principal.is_admin {
            counter!(JOIN_REJECTED_TOTAL, "room" => "adminRoom").increment(1);
            warn!(principal = %principal.id, "admin join rejected: principal lacks admin rights");
            return Err(GatewayError::NotAdmin(principal.id.into_inner()));
        }

        info!(conn_id = %connection.id, principal = %principal.id, "admin session joined");
        connection.set_principal(principal);
        self.rooms.join(RoomKey::Admin, Arc::clone(connection)).await;
        Ok(())
    }

    /// Verify a user credential and join the connection to that user's
    /// room. On failure the connection must be closed by the caller.
    pub async fn authenticate_user(
        &self,
        connection: &Arc<ClientConnection>,
        token: &str,
    ) -> Result<(), GatewayError> {
        let principal = match self.verify(token).await {
            Ok(p) => p,
            Err(e) => {
                counter!(JOIN_REJECTED_TOTAL, "room" => "user").increment(1);
                return Err(e);
            }
        };

        // A session occupies at most one user room; re-authentication as
        // a different user moves the session rather than widening it.
        let target = RoomKey::User(principal.id.clone());
        if let Some(previous) = self.rooms.user_room_of(&connection.id).await {
            if previous != target {
                self.rooms.leave(&previous, &connection.id).await;
            }
        }

        info!(conn_id = %connection.id, principal = %principal.id, "user session joined");
        connection.set_principal(principal);
        self.rooms.join(target, Arc::clone(connection)).await;
        Ok(())
    }

    /// Remove the connection from every room. Idempotent; called
    /// unconditionally when a socket closes.
    pub async fn disconnect(&self, connection_id: &ConnectionId) {
        self.rooms.leave_all(connection_id).await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

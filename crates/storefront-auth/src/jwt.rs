//! JWT credential verification (HS256 via `jsonwebtoken`).

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::AuthError;
use crate::verifier::{CredentialVerifier, Principal, PrincipalStore};

/// JWT claims issued by the platform's login flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject — the account ID.
    pub sub: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Admin flag.
    #[serde(default)]
    pub admin: bool,
    /// Expiry (Unix timestamp, seconds).
    pub exp: i64,
}

impl Claims {
    /// Build claims expiring `ttl_secs` from now.
    #[must_use]
    pub fn new(sub: impl Into<String>, name: impl Into<String>, admin: bool, ttl_secs: i64) -> Self {
        Self {
            sub: sub.into(),
            name: name.into(),
            admin,
            exp: chrono::Utc::now().timestamp() + ttl_secs,
        }
    }
}

/// Sign `claims` with `secret` (HS256).
///
/// Token issuance lives in the platform's login service; this helper
/// exists for tests and operator tooling.
pub fn encode_token(secret: &str, claims: &Claims) -> Result<String, AuthError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

/// Verifies HS256 bearer tokens against a shared secret.
///
/// With a [`PrincipalStore`] attached, the decoded subject is confirmed
/// against the account database and the stored record wins over the
/// claims (a deleted account fails verification even while its token is
/// unexpired).
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
    store: Option<Arc<dyn PrincipalStore>>,
}

impl JwtVerifier {
    /// Create a verifier for `secret` with no principal confirmation.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            store: None,
        }
    }

    /// Attach a principal store; decoded subjects must exist in it.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn PrincipalStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, AuthError> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(AuthError::Expired),
                _ => Err(AuthError::InvalidToken(e.to_string())),
            },
        }
    }
}

#[async_trait]
impl CredentialVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.decode_claims(token)?;
        debug!(sub = %claims.sub, admin = claims.admin, "token decoded");

        let Some(store) = &self.store else {
            return Ok(Principal {
                id: claims.sub.into(),
                is_admin: claims.admin,
                display_name: claims.name,
            });
        };

        let id = claims.sub.clone().into();
        match store.find_user_by_id(&id).await? {
            Some(principal) => Ok(principal),
            None => Err(AuthError::UnknownPrincipal(claims.sub)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

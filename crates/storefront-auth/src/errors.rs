//! Credential verification errors.

use thiserror::Error;

/// Why a credential failed verification.
///
/// The gateway folds every variant into a single unauthorized outcome on
/// the wire; the variant is logged server-side for diagnostics only.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token was malformed or its signature did not verify.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Token signature verified but the token has expired.
    #[error("token expired")]
    Expired,

    /// Token names a principal the store does not know.
    #[error("unknown principal: {0}")]
    UnknownPrincipal(String),

    /// Principal lookup against the persistence layer failed.
    #[error("principal lookup failed: {0}")]
    Lookup(String),

    /// Verification did not complete within the allowed time.
    #[error("verification timed out")]
    Timeout,
}

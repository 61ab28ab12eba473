//! # storefront-auth
//!
//! Bearer-credential verification for the storefront platform.
//!
//! The same [`CredentialVerifier`] instance backs the REST middleware and
//! the realtime session gateway, so a token that opens an HTTP session
//! also opens a WebSocket session. Verification resolves a token to a
//! [`Principal`] (`{id, is_admin, display_name}`); the caller decides
//! what roles it requires.
//!
//! The shipped implementation is [`JwtVerifier`] (HS256 via
//! `jsonwebtoken`), optionally confirming the principal against a
//! [`PrincipalStore`] so revoked accounts fail verification even while
//! their tokens are unexpired.

pub mod errors;
pub mod jwt;
pub mod verifier;

pub use errors::AuthError;
pub use jwt::{Claims, JwtVerifier, encode_token};
pub use verifier::{CredentialVerifier, Principal, PrincipalStore};

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

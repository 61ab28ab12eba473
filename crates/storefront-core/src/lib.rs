//! # storefront-core
//!
//! Shared building blocks for the storefront realtime service:
//!
//! - [`ids`]: branded ID newtypes (`UserId`, `OrderId`, ...)
//! - [`events`]: domain events and the WebSocket wire frames
//! - [`logging`]: `tracing` subscriber initialization

pub mod events;
pub mod ids;
pub mod logging;

pub use events::{CatalogKind, ClientFrame, OrderDocument, OrderEvent, ServerFrame, UserRef};
pub use ids::{ConnectionId, OrderId, RegistrationId, UserId};

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! # storefront-realtime
//!
//! Axum HTTP + `WebSocket` server for realtime order notifications.
//!
//! - `WebSocket` gateway: credential-checked room joins, heartbeat,
//!   frame dispatch
//! - Presence rooms: the admin room plus one room per customer
//! - Event router: catalog and order-status fan-out to rooms
//! - Push fallback: registration registry + concurrent HTTP delivery
//!   with prune-on-permanent-failure
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod errors;
pub mod gateway;
pub mod health;
pub mod metrics;
pub mod push;
pub mod rooms;
pub mod router;
pub mod server;
pub mod session;
pub mod shutdown;

pub use config::RealtimeConfig;
pub use errors::{GatewayError, PushError, RouterError, StoreError};
pub use gateway::SessionGateway;
pub use push::{PushNotifier, PushPayload};
pub use rooms::{RoomDirectory, RoomKey};
pub use router::{EventRouter, MemoryOrderStore, OrderStore};
pub use server::{AppState, RealtimeServer};

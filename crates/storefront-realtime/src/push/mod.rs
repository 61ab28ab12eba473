//! Push notification fallback channel.
//!
//! When a customer has no connected realtime session, order updates
//! still reach them through browser push. This module owns the
//! registration registry and the fan-out delivery path:
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `registry` | `PushRegistration`, the `RegistrationStore` seam, in-memory store |
//! | `store` | SQLite-backed registration store |
//! | `transport` | `PushTransport` seam, HTTP delivery, outcome classification |
//! | `notifier` | Concurrent fan-out, prune-on-permanent-failure, send report |

pub mod notifier;
pub mod registry;
pub mod store;
pub mod transport;

pub use notifier::{PushNotifier, SendReport};
pub use registry::{MemoryRegistrationStore, PushRegistration, RegistrationStore};
pub use store::SqliteRegistrationStore;
pub use transport::{DeliveryOutcome, HttpPushTransport, PushPayload, PushTransport};

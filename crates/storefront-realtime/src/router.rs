//! Event router — fans domain events out to the correct rooms.
//!
//! Request handlers call in after committing a persistence change.
//! Catalog changes are admin-only signals with no payload; order state
//! changes carry the full order document to the admin room and to the
//! owning customer's room.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use parking_lot::RwLock;
use std::collections::HashMap;
use storefront_core::{CatalogKind, OrderDocument, OrderEvent, OrderId, ServerFrame};
use tracing::{debug, warn};

use crate::errors::{RouterError, StoreError};
use crate::metrics::{ORDER_EVENTS_DROPPED_TOTAL, ORDER_EVENTS_TOTAL};
use crate::rooms::{RoomDirectory, RoomKey};

/// Read access to order records in the persistence layer.
///
/// External collaborator; only consulted when an event arrives without a
/// resolvable owner or without its document.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Fetch the order with its user reference populated, or `None` when
    /// no such order exists.
    async fn find_order_by_id(&self, id: &OrderId) -> Result<Option<OrderDocument>, StoreError>;
}

/// In-memory order store for the demo binary and tests.
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<OrderId, OrderDocument>>,
}

impl MemoryOrderStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an order document.
    pub fn insert(&self, order: OrderDocument) {
        let _ = self.orders.write().insert(order.id.clone(), order);
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn find_order_by_id(&self, id: &OrderId) -> Result<Option<OrderDocument>, StoreError> {
        Ok(self.orders.read().get(id).cloned())
    }
}

/// Routes domain events to rooms via the room directory.
pub struct EventRouter {
    rooms: Arc<RoomDirectory>,
    orders: Arc<dyn OrderStore>,
}

impl EventRouter {
    /// Create a router over a room directory and order store.
    pub fn new(rooms: Arc<RoomDirectory>, orders: Arc<dyn OrderStore>) -> Self {
        Self { rooms, orders }
    }

    /// Broadcast a payloadless catalog-change signal to the admin room.
    /// Receivers are expected to refetch.
    pub async fn catalog_changed(&self, kind: CatalogKind) {
        let frame = kind.frame();
        debug!(event = frame.event_name(), "catalog changed");
        let _ = self.rooms.broadcast(&RoomKey::Admin, &frame).await;
    }

    /// Route an order state transition.
    ///
    /// The full order payload goes to the admin room unconditionally and
    /// to `user_<owner>` when an owner resolves. An event whose order
    /// cannot be found is dropped — the order may have been deleted
    /// concurrently — and an event without an order id is rejected
    /// before any room access.
    pub async fn order_status_changed(&self, event: OrderEvent) -> Result<(), RouterError> {
        if event.order_id.as_str().is_empty() {
            counter!(ORDER_EVENTS_DROPPED_TOTAL, "reason" => "missing_id").increment(1);
            warn!("dropping order event with no order id");
            return Err(RouterError::MissingOrderId);
        }
        counter!(ORDER_EVENTS_TOTAL).increment(1);

        let order_id = event.order_id.clone();
        let mut owner = event.resolved_user();
        let mut order = event.order;

        // Repopulate from the order store when the handler gave us only a
        // reference, or a document whose user reference is unresolved.
        if order.is_none() || owner.is_none() {
            match self.orders.find_order_by_id(&order_id).await {
                Ok(Some(fetched)) => {
                    if owner.is_none() {
                        owner = fetched.owner().cloned();
                    }
                    order = Some(fetched);
                }
                Ok(None) => {
                    counter!(ORDER_EVENTS_DROPPED_TOTAL, "reason" => "unknown_order")
                        .increment(1);
                    warn!(order_id = %order_id, "dropping event for unknown order");
                    return Ok(());
                }
                Err(e) => {
                    counter!(ORDER_EVENTS_DROPPED_TOTAL, "reason" => "store_error").increment(1);
                    warn!(order_id = %order_id, error = %e, "order lookup failed, dropping event");
                    return Ok(());
                }
            }
        }

        let Some(payload) = order else {
            // Unreachable in practice: the fetch above either filled
            // `order` or returned early.
            return Ok(());
        };
        let frame = ServerFrame::OrderStatusUpdate(payload);

        let _ = self.rooms.broadcast(&RoomKey::Admin, &frame).await;
        if let Some(owner) = owner {
            // Empty room: silent no-op; the push notifier is the durable
            // fallback path.
            let _ = self.rooms.broadcast(&RoomKey::User(owner), &frame).await;
        } else {
            debug!(order_id = %order_id, "order has no resolvable owner, admin-only broadcast");
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

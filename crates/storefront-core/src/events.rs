//! Domain events and WebSocket wire frames.
//!
//! The realtime channel speaks JSON envelopes of the shape
//! `{"event": <name>, "data": <payload>}`. [`ClientFrame`] covers the
//! client-to-server events (`joinAdmin`, `joinUser`, the catalog signals,
//! `orderStatusUpdate`); [`ServerFrame`] covers what the server
//! rebroadcasts. Order payloads pass through [`OrderDocument`] untouched —
//! unknown fields are preserved so receivers see the full document.

use serde::{Deserialize, Serialize};

use crate::ids::{OrderId, UserId};

// ─────────────────────────────────────────────────────────────────────────────
// Wire frames
// ─────────────────────────────────────────────────────────────────────────────

/// Client-to-server events on the realtime channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientFrame {
    /// Join the admin room; payload is the bearer credential.
    #[serde(rename = "joinAdmin")]
    JoinAdmin(String),
    /// Join the caller's own user room.
    #[serde(rename = "joinUser")]
    JoinUser {
        /// Bearer credential for the connecting user.
        token: String,
    },
    /// A category changed; rebroadcast to the admin room.
    #[serde(rename = "categoryUpdate")]
    CategoryUpdate,
    /// A product changed; rebroadcast to the admin room.
    #[serde(rename = "productUpdate")]
    ProductUpdate,
    /// An order changed state; routed to admins and the owning user.
    #[serde(rename = "orderStatusUpdate")]
    OrderStatusUpdate(OrderDocument),
}

/// Server-to-client events on the realtime channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerFrame {
    /// Category list changed; receivers refetch (no payload).
    #[serde(rename = "categoryUpdate")]
    CategoryUpdate,
    /// Product list changed; receivers refetch (no payload).
    #[serde(rename = "productUpdate")]
    ProductUpdate,
    /// Full order document for a state transition.
    #[serde(rename = "orderStatusUpdate")]
    OrderStatusUpdate(OrderDocument),
}

impl ServerFrame {
    /// The wire event name of this frame.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::CategoryUpdate => "categoryUpdate",
            Self::ProductUpdate => "productUpdate",
            Self::OrderStatusUpdate(_) => "orderStatusUpdate",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Domain events
// ─────────────────────────────────────────────────────────────────────────────

/// Which part of the catalog changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    /// A category was created, updated, or deleted.
    Category,
    /// A product was created, updated, or deleted.
    Product,
}

impl CatalogKind {
    /// The payloadless frame broadcast for this kind.
    #[must_use]
    pub fn frame(self) -> ServerFrame {
        match self {
            Self::Category => ServerFrame::CategoryUpdate,
            Self::Product => ServerFrame::ProductUpdate,
        }
    }
}

/// Reference to the owning user inside an order document.
///
/// The catalog database stores either a bare user ID or a populated
/// user object, depending on whether the query populated the reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserRef {
    /// Bare user ID.
    Id(UserId),
    /// Populated user object.
    Doc(UserDoc),
}

impl UserRef {
    /// The owning user's ID, if the reference carries a usable one.
    #[must_use]
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Id(id) => (!id.as_str().is_empty()).then_some(id),
            Self::Doc(doc) => (!doc.id.as_str().is_empty()).then_some(&doc.id),
        }
    }
}

// Documents arriving off the wire must not gain generated IDs; an
// absent `_id` stays empty so validation can reject the document.
fn empty_user_id() -> UserId {
    UserId::from("")
}

fn empty_order_id() -> OrderId {
    OrderId::from("")
}

/// Populated user object embedded in an order document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDoc {
    /// User ID. Empty when the source document carried none.
    #[serde(rename = "_id", default = "empty_user_id")]
    pub id: UserId,
    /// Display name, when populated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Remaining user fields, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// An order document as stored by the catalog database.
///
/// Only the fields the router needs are typed; everything else flows
/// through `extra` so connected clients receive the full payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDocument {
    /// Order ID. Empty when the source event was malformed.
    #[serde(rename = "_id", default = "empty_order_id")]
    pub id: OrderId,
    /// Owning user, when present on the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRef>,
    /// Order status, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Remaining order fields, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl OrderDocument {
    /// The owning user's ID, if this document carries a usable reference.
    #[must_use]
    pub fn owner(&self) -> Option<&UserId> {
        self.user.as_ref().and_then(UserRef::user_id)
    }
}

/// An order state transition, constructed by a request handler and
/// consumed exactly once by the event router.
#[derive(Debug, Clone)]
pub struct OrderEvent {
    /// ID of the order that changed.
    pub order_id: OrderId,
    /// The order document, when the handler already has it.
    pub order: Option<OrderDocument>,
    /// Explicit owning-user override, when the handler knows it.
    pub target_user_id: Option<UserId>,
}

impl OrderEvent {
    /// Build an event from a full order document.
    #[must_use]
    pub fn from_document(order: OrderDocument) -> Self {
        Self {
            order_id: order.id.clone(),
            order: Some(order),
            target_user_id: None,
        }
    }

    /// Build an event from an order ID only; the router will fetch the
    /// document from the order store.
    #[must_use]
    pub fn from_id(order_id: OrderId) -> Self {
        Self {
            order_id,
            order: None,
            target_user_id: None,
        }
    }

    /// The owning user, resolved from the explicit override or the
    /// embedded document.
    #[must_use]
    pub fn resolved_user(&self) -> Option<UserId> {
        if let Some(user) = &self.target_user_id {
            return Some(user.clone());
        }
        self.order.as_ref().and_then(|o| o.owner().cloned())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_admin_frame_shape() {
        let frame: ClientFrame =
            serde_json::from_value(json!({"event": "joinAdmin", "data": "tok123"})).unwrap();
        match frame {
            ClientFrame::JoinAdmin(token) => assert_eq!(token, "tok123"),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn join_user_frame_shape() {
        let frame: ClientFrame =
            serde_json::from_value(json!({"event": "joinUser", "data": {"token": "tok456"}}))
                .unwrap();
        match frame {
            ClientFrame::JoinUser { token } => assert_eq!(token, "tok456"),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn catalog_frames_have_no_payload() {
        let frame: ClientFrame =
            serde_json::from_value(json!({"event": "productUpdate"})).unwrap();
        assert!(matches!(frame, ClientFrame::ProductUpdate));

        let out = serde_json::to_value(ServerFrame::ProductUpdate).unwrap();
        assert_eq!(out, json!({"event": "productUpdate"}));
    }

    #[test]
    fn catalog_frame_tolerates_null_data() {
        let frame: ClientFrame =
            serde_json::from_value(json!({"event": "categoryUpdate", "data": null})).unwrap();
        assert!(matches!(frame, ClientFrame::CategoryUpdate));
    }

    #[test]
    fn order_status_frame_carries_document() {
        let frame: ClientFrame = serde_json::from_value(json!({
            "event": "orderStatusUpdate",
            "data": {"_id": "o1", "status": "shipped", "total": 42}
        }))
        .unwrap();
        match frame {
            ClientFrame::OrderStatusUpdate(doc) => {
                assert_eq!(doc.id.as_str(), "o1");
                assert_eq!(doc.status.as_deref(), Some("shipped"));
                assert_eq!(doc.extra["total"], 42);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn unknown_event_fails_to_parse() {
        let result: Result<ClientFrame, _> =
            serde_json::from_value(json!({"event": "selfDestruct"}));
        assert!(result.is_err());
    }

    #[test]
    fn order_document_preserves_extra_fields() {
        let doc: OrderDocument = serde_json::from_value(json!({
            "_id": "o9",
            "items": [{"sku": "s1", "qty": 2}],
            "total": 99.5
        }))
        .unwrap();
        let back = serde_json::to_value(&doc).unwrap();
        assert_eq!(back["_id"], "o9");
        assert_eq!(back["items"][0]["sku"], "s1");
        assert_eq!(back["total"], 99.5);
    }

    #[test]
    fn owner_from_bare_id() {
        let doc: OrderDocument =
            serde_json::from_value(json!({"_id": "o1", "user": "u7"})).unwrap();
        assert_eq!(doc.owner().map(UserId::as_str), Some("u7"));
    }

    #[test]
    fn owner_from_populated_user() {
        let doc: OrderDocument = serde_json::from_value(
            json!({"_id": "o1", "user": {"_id": "u9", "name": "Ada"}}),
        )
        .unwrap();
        assert_eq!(doc.owner().map(UserId::as_str), Some("u9"));
    }

    #[test]
    fn owner_missing_when_no_user() {
        let doc: OrderDocument = serde_json::from_value(json!({"_id": "o1"})).unwrap();
        assert!(doc.owner().is_none());
    }

    #[test]
    fn owner_missing_when_user_id_empty() {
        let doc: OrderDocument =
            serde_json::from_value(json!({"_id": "o1", "user": {"name": "ghost"}})).unwrap();
        assert!(doc.owner().is_none());
    }

    #[test]
    fn missing_order_id_defaults_to_empty() {
        let doc: OrderDocument =
            serde_json::from_value(json!({"status": "pending"})).unwrap();
        assert!(doc.id.as_str().is_empty());
    }

    #[test]
    fn missing_ids_are_never_generated() {
        // An absent `_id` must stay empty; a generated UUID here would
        // defeat the router's empty-id validation and invent an owner.
        let doc: OrderDocument = serde_json::from_value(
            json!({"status": "pending", "user": {"name": "ghost"}}),
        )
        .unwrap();
        assert!(doc.id.as_str().is_empty());
        assert!(doc.owner().is_none());
    }

    #[test]
    fn order_frame_without_id_parses_with_empty_id() {
        let frame: ClientFrame = serde_json::from_value(json!({
            "event": "orderStatusUpdate",
            "data": {"status": "pending"}
        }))
        .unwrap();
        match frame {
            ClientFrame::OrderStatusUpdate(doc) => assert!(doc.id.as_str().is_empty()),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn event_resolves_explicit_target_first() {
        let doc: OrderDocument =
            serde_json::from_value(json!({"_id": "o1", "user": "u1"})).unwrap();
        let mut event = OrderEvent::from_document(doc);
        event.target_user_id = Some(UserId::from("u2"));
        assert_eq!(event.resolved_user().unwrap().as_str(), "u2");
    }

    #[test]
    fn event_from_id_has_no_user() {
        let event = OrderEvent::from_id(OrderId::from("o3"));
        assert!(event.resolved_user().is_none());
        assert!(event.order.is_none());
    }

    #[test]
    fn catalog_kind_maps_to_frame() {
        assert_eq!(CatalogKind::Category.frame().event_name(), "categoryUpdate");
        assert_eq!(CatalogKind::Product.frame().event_name(), "productUpdate");
    }

    #[test]
    fn server_order_frame_roundtrip() {
        let doc: OrderDocument =
            serde_json::from_value(json!({"_id": "o1", "user": {"_id": "u9"}})).unwrap();
        let frame = ServerFrame::OrderStatusUpdate(doc);
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["event"], "orderStatusUpdate");
        assert_eq!(value["data"]["_id"], "o1");
        assert_eq!(value["data"]["user"]["_id"], "u9");
    }
}

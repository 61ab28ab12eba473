//! HTTP push delivery and outcome classification.
//!
//! The transport speaks to the browser vendor's push service. It never
//! retries; each delivery resolves to exactly one outcome, and the
//! notifier decides what to do with the registration based on it.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Notification payload shown by the service worker.
#[derive(Debug, Clone, Serialize)]
pub struct PushPayload {
    /// Notification title.
    pub title: String,
    /// Notification body text.
    pub body: String,
    /// Relative URL opened when the notification is clicked.
    pub url: String,
}

impl PushPayload {
    /// Payload pointing at the order history page.
    #[must_use]
    pub fn order_update(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            url: "/orders.html".to_string(),
        }
    }
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The push service accepted the message.
    Delivered,
    /// The endpoint is gone for good; its registration must be pruned.
    Permanent(String),
    /// A retryable condition; the registration stays.
    Transient(String),
}

/// Delivery seam between the notifier and the outside world.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Deliver `payload` to the endpoint described by `endpoint`.
    async fn deliver(&self, endpoint: &Value, payload: &PushPayload) -> DeliveryOutcome;
}

/// Message time-to-live at the push service, in seconds.
const PUSH_TTL_SECS: u64 = 60 * 60 * 24;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport that POSTs the payload to the endpoint's delivery URL.
///
/// Endpoint descriptors carry an `endpoint` field with the push
/// service URL; a descriptor without one can never be delivered to and
/// classifies as a permanent failure.
pub struct HttpPushTransport {
    client: reqwest::Client,
}

impl HttpPushTransport {
    /// Build a transport with its own HTTP client.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn deliver(&self, endpoint: &Value, payload: &PushPayload) -> DeliveryOutcome {
        let Some(url) = endpoint.get("endpoint").and_then(Value::as_str) else {
            return DeliveryOutcome::Permanent("descriptor has no endpoint url".to_string());
        };

        let response = self
            .client
            .post(url)
            .header("TTL", PUSH_TTL_SECS)
            .json(payload)
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status();
                debug!(%status, "push delivery response");
                if status.is_success() {
                    DeliveryOutcome::Delivered
                } else if status == reqwest::StatusCode::NOT_FOUND
                    || status == reqwest::StatusCode::GONE
                {
                    DeliveryOutcome::Permanent(format!("endpoint returned {status}"))
                } else {
                    DeliveryOutcome::Transient(format!("endpoint returned {status}"))
                }
            }
            Err(e) => DeliveryOutcome::Transient(e.to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

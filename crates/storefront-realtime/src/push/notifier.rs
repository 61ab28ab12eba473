//! Push notifier — concurrent fan-out with prune-on-permanent-failure.

use std::sync::Arc;

use futures::future::join_all;
use metrics::counter;
use serde_json::Value;
use storefront_core::{RegistrationId, UserId};
use tracing::{debug, info, warn};

use crate::errors::PushError;
use crate::metrics::{PUSH_DELIVERIES_TOTAL, PUSH_REGISTRATIONS_PRUNED_TOTAL};
use crate::push::registry::{PushRegistration, RegistrationStore};
use crate::push::transport::{DeliveryOutcome, PushPayload, PushTransport};

/// Summary of one send operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    /// Registrations selected for delivery.
    pub attempted: usize,
    /// Deliveries the push service accepted.
    pub delivered: usize,
    /// Registrations removed after a permanent failure.
    pub pruned: usize,
}

/// Delivers notifications to registered endpoints.
pub struct PushNotifier {
    store: Arc<dyn RegistrationStore>,
    transport: Arc<dyn PushTransport>,
}

impl PushNotifier {
    /// Create a notifier over a registration store and a transport.
    pub fn new(store: Arc<dyn RegistrationStore>, transport: Arc<dyn PushTransport>) -> Self {
        Self { store, transport }
    }

    /// Record a new endpoint registration for `user_id`.
    ///
    /// The descriptor is stored verbatim; a device registering twice
    /// simply holds two registrations.
    pub fn register(
        &self,
        user_id: UserId,
        endpoint: Value,
    ) -> Result<RegistrationId, PushError> {
        let registration = PushRegistration::new(user_id, endpoint);
        let id = registration.id.clone();
        info!(registration_id = %id, user_id = %registration.user_id, "push endpoint registered");
        self.store.insert(registration)?;
        Ok(id)
    }

    /// Number of live registrations.
    pub fn registration_count(&self) -> Result<usize, PushError> {
        Ok(self.store.count()?)
    }

    /// Send `payload` to every registration, or only to `target`'s
    /// registrations when one is given.
    ///
    /// Deliveries run concurrently. A permanent failure prunes exactly
    /// the failing registration; transient failures leave it in place
    /// for the next send. No delivery is retried.
    pub async fn send(
        &self,
        payload: &PushPayload,
        target: Option<&UserId>,
    ) -> Result<SendReport, PushError> {
        let registrations = match target {
            Some(user_id) => self.store.for_user(user_id)?,
            None => self.store.all()?,
        };
        if registrations.is_empty() {
            return Err(PushError::NoRegistrations);
        }

        let attempted = registrations.len();
        debug!(attempted, target = ?target.map(UserId::as_str), "push fan-out started");

        let attempts = registrations.iter().map(|registration| async move {
            let outcome = self.transport.deliver(&registration.endpoint, payload).await;
            (registration, outcome)
        });
        let outcomes = join_all(attempts).await;

        let mut delivered = 0;
        let mut pruned = 0;
        for (registration, outcome) in outcomes {
            match outcome {
                DeliveryOutcome::Delivered => {
                    counter!(PUSH_DELIVERIES_TOTAL, "outcome" => "delivered").increment(1);
                    delivered += 1;
                }
                DeliveryOutcome::Permanent(reason) => {
                    counter!(PUSH_DELIVERIES_TOTAL, "outcome" => "permanent").increment(1);
                    warn!(
                        registration_id = %registration.id,
                        user_id = %registration.user_id,
                        %reason,
                        "pruning registration after permanent failure"
                    );
                    match self.store.remove(&registration.id) {
                        Ok(removed) => {
                            if removed {
                                counter!(PUSH_REGISTRATIONS_PRUNED_TOTAL).increment(1);
                                pruned += 1;
                            }
                        }
                        Err(e) => {
                            warn!(registration_id = %registration.id, error = %e, "prune failed");
                        }
                    }
                }
                DeliveryOutcome::Transient(reason) => {
                    counter!(PUSH_DELIVERIES_TOTAL, "outcome" => "transient").increment(1);
                    warn!(
                        registration_id = %registration.id,
                        %reason,
                        "push delivery failed, registration retained"
                    );
                }
            }
        }

        info!(attempted, delivered, pruned, "push fan-out finished");
        Ok(SendReport {
            attempted,
            delivered,
            pruned,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

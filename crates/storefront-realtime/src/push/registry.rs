//! Push registrations and the registry seam.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use storefront_core::{RegistrationId, UserId};

use crate::errors::StoreError;

/// A registered push endpoint for one of a user's devices.
///
/// The endpoint descriptor is an opaque blob understood only by the push
/// transport. One user may hold several registrations (multi-tab,
/// multi-device); descriptors are deliberately not deduplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRegistration {
    /// Registration ID (assigned at registration time).
    pub id: RegistrationId,
    /// Owning user.
    pub user_id: UserId,
    /// Opaque endpoint descriptor.
    pub endpoint: serde_json::Value,
    /// When the registration was created.
    pub created_at: DateTime<Utc>,
}

impl PushRegistration {
    /// Create a registration with a fresh ID.
    #[must_use]
    pub fn new(user_id: UserId, endpoint: serde_json::Value) -> Self {
        Self {
            id: RegistrationId::new(),
            user_id,
            endpoint,
            created_at: Utc::now(),
        }
    }
}

/// Storage seam for push registrations.
///
/// Kept synchronous and behind a trait so the in-memory map used in
/// tests and the SQLite store used in production are interchangeable,
/// and so a shared backing store can replace both without touching the
/// notifier.
pub trait RegistrationStore: Send + Sync {
    /// Append a registration. No dedup by descriptor.
    fn insert(&self, registration: PushRegistration) -> Result<(), StoreError>;

    /// Every registration, in insertion order.
    fn all(&self) -> Result<Vec<PushRegistration>, StoreError>;

    /// Registrations belonging to one user.
    fn for_user(&self, user_id: &UserId) -> Result<Vec<PushRegistration>, StoreError>;

    /// Remove a registration by ID. Returns whether anything was removed;
    /// removing an already-removed ID is a no-op.
    fn remove(&self, id: &RegistrationId) -> Result<bool, StoreError>;

    /// Number of live registrations.
    fn count(&self) -> Result<usize, StoreError>;
}

/// Process-local registration store.
#[derive(Default)]
pub struct MemoryRegistrationStore {
    registrations: RwLock<Vec<PushRegistration>>,
}

impl MemoryRegistrationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistrationStore for MemoryRegistrationStore {
    fn insert(&self, registration: PushRegistration) -> Result<(), StoreError> {
        self.registrations.write().push(registration);
        Ok(())
    }

    fn all(&self) -> Result<Vec<PushRegistration>, StoreError> {
        Ok(self.registrations.read().clone())
    }

    fn for_user(&self, user_id: &UserId) -> Result<Vec<PushRegistration>, StoreError> {
        Ok(self
            .registrations
            .read()
            .iter()
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect())
    }

    fn remove(&self, id: &RegistrationId) -> Result<bool, StoreError> {
        let mut registrations = self.registrations.write();
        let before = registrations.len();
        registrations.retain(|r| &r.id != id);
        Ok(registrations.len() < before)
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.registrations.read().len())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! SQLite-backed registration store — one `push_registrations` table.
//!
//! Registrations are durable pointers to a device's push endpoint and
//! survive server restarts, unlike room membership.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, params};
use storefront_core::{RegistrationId, UserId};
use tracing::debug;

use crate::errors::StoreError;
use crate::push::registry::{PushRegistration, RegistrationStore};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS push_registrations (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    endpoint TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_push_registrations_user
    ON push_registrations (user_id);";

/// Registration store over a single guarded SQLite connection.
pub struct SqliteRegistrationStore {
    conn: Mutex<Connection>,
}

impl SqliteRegistrationStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: &std::path::Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::new(conn)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::new(Connection::open_in_memory()?)
    }

    /// Wrap an open connection, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        debug!("push registration store ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PushRegistration> {
        let created_at: String = row.get(3)?;
        let created_at = created_at
            .parse::<DateTime<Utc>>()
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;
        Ok(PushRegistration {
            id: RegistrationId::from_string(row.get(0)?),
            user_id: UserId::from_string(row.get(1)?),
            endpoint: row.get(2)?,
            created_at,
        })
    }
}

impl RegistrationStore for SqliteRegistrationStore {
    fn insert(&self, registration: PushRegistration) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let _ = conn.execute(
            "INSERT INTO push_registrations (id, user_id, endpoint, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                registration.id.as_str(),
                registration.user_id.as_str(),
                registration.endpoint,
                registration.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn all(&self) -> Result<Vec<PushRegistration>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, endpoint, created_at
             FROM push_registrations ORDER BY created_at, id",
        )?;
        let rows = stmt
            .query_map([], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn for_user(&self, user_id: &UserId) -> Result<Vec<PushRegistration>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, endpoint, created_at
             FROM push_registrations WHERE user_id = ?1 ORDER BY created_at, id",
        )?;
        let rows = stmt
            .query_map(params![user_id.as_str()], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn remove(&self, id: &RegistrationId) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "DELETE FROM push_registrations WHERE id = ?1",
            params![id.as_str()],
        )?;
        Ok(changed > 0)
    }

    fn count(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM push_registrations", [], |row| {
                row.get(0)
            })?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Persistence module for session history
//!
//! The session store is the shared history every detector reads. Rows are
//! append-only: a session is only ever mutated to bump its activity
//! timestamp or to close it, never deleted by this engine.

pub mod sqlite_store;

pub use sqlite_store::SqliteSessionStore;

use crate::models::SessionRecord;
use thiserror::Error;

/// Errors that can occur during persistence operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data in database: {0}")]
    InvalidData(String),
}

/// Trait for session history backends
///
/// Implementations must serialize writes for the same user; the SQLite
/// backend does this with a connection-level lock. Detectors only use the
/// read side and degrade to "not anomalous" when a query fails.
pub trait SessionStore: Send + Sync {
    /// Insert a new session row, returning its id
    fn insert_session(&self, record: &SessionRecord) -> Result<i64, StoreError>;

    /// Most recent session whose coordinates differ from the given point
    ///
    /// Returns `(login_time, latitude, longitude)`. Sessions without
    /// coordinates are skipped.
    fn last_location_change(
        &self,
        user_id: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<(i64, f64, f64)>, StoreError>;

    /// Whether any session for the user carries this device fingerprint
    fn device_seen(&self, user_id: &str, fingerprint: &str) -> Result<bool, StoreError>;

    /// Count logins for (user, ip) with login_time >= since
    fn count_logins_since(&self, user_id: &str, ip: &str, since: i64) -> Result<u32, StoreError>;

    /// Count currently-active sessions for the user
    fn count_active_sessions(&self, user_id: &str) -> Result<u32, StoreError>;

    /// Close active sessions, stamping the logout time
    ///
    /// When `token_hash` is given only the matching session is closed,
    /// otherwise every active session for the user. Returns the number of
    /// rows changed; already-inactive sessions are untouched, which makes
    /// repeated logout calls no-ops.
    fn close_sessions(
        &self,
        user_id: &str,
        token_hash: Option<&str>,
        logout_time: i64,
    ) -> Result<usize, StoreError>;

    /// Bump last_activity on the most recent active session matching the IP
    ///
    /// Returns false when no such session exists.
    fn touch_activity(&self, user_id: &str, ip: &str, now: i64) -> Result<bool, StoreError>;

    /// Most recent sessions for a user, newest first
    fn recent_sessions(&self, user_id: &str, limit: usize) -> Result<Vec<SessionRecord>, StoreError>;
}

//! SQLite implementation of the SessionStore trait

use super::{SessionStore, StoreError};
use crate::models::{DeviceInfo, GeoInfo, SessionRecord};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed session history
///
/// The connection mutex serializes all writes, satisfying the per-user
/// write-ordering requirement while keeping the implementation simple.
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    /// Create a new session store at the specified path
    ///
    /// Creates the database file and initializes the schema if needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        let store = SqliteSessionStore {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (useful for testing)
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteSessionStore {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    fn row_to_session(row: &Row) -> rusqlite::Result<SessionRecord> {
        let country: Option<String> = row.get(9)?;
        let region: Option<String> = row.get(10)?;
        let city: Option<String> = row.get(11)?;
        let latitude: Option<f64> = row.get(12)?;
        let longitude: Option<f64> = row.get(13)?;
        let isp: Option<String> = row.get(14)?;

        // A row has geo attributes only when coordinates were resolved
        let geo = match (latitude, longitude) {
            (Some(lat), Some(lon)) => Some(GeoInfo {
                country: country.unwrap_or_default(),
                region: region.unwrap_or_default(),
                city: city.unwrap_or_default(),
                latitude: lat,
                longitude: lon,
                isp: isp.unwrap_or_default(),
            }),
            _ => None,
        };

        Ok(SessionRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            session_token_hash: row.get(2)?,
            ip_address: row.get(3)?,
            user_agent: row.get(4)?,
            device: DeviceInfo {
                device_type: row.get(5)?,
                os: row.get(6)?,
                browser: row.get(7)?,
            },
            device_fingerprint: row.get(8)?,
            geo,
            is_active: row.get(15)?,
            is_suspicious: row.get(16)?,
            risk_score: row.get::<_, i64>(17)?.clamp(0, 100) as u8,
            suspicious_reasons: row.get(18)?,
            login_time: row.get(19)?,
            last_activity: row.get(20)?,
            logout_time: row.get(21)?,
        })
    }
}

const SESSION_COLUMNS: &str = "id, user_id, session_token_hash, ip_address, user_agent, \
     device_type, os, browser, device_fingerprint, \
     country, region, city, latitude, longitude, isp, \
     is_active, is_suspicious, risk_score, suspicious_reasons, \
     login_time, last_activity, logout_time";

impl SessionStore for SqliteSessionStore {
    fn insert_session(&self, record: &SessionRecord) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO login_sessions
             (user_id, session_token_hash, ip_address, user_agent,
              device_type, os, browser, device_fingerprint,
              country, region, city, latitude, longitude, isp,
              is_active, is_suspicious, risk_score, suspicious_reasons,
              login_time, last_activity, logout_time)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.user_id,
                record.session_token_hash,
                record.ip_address,
                record.user_agent,
                record.device.device_type,
                record.device.os,
                record.device.browser,
                record.device_fingerprint,
                record.geo.as_ref().map(|g| g.country.clone()),
                record.geo.as_ref().map(|g| g.region.clone()),
                record.geo.as_ref().map(|g| g.city.clone()),
                record.geo.as_ref().map(|g| g.latitude),
                record.geo.as_ref().map(|g| g.longitude),
                record.geo.as_ref().map(|g| g.isp.clone()),
                record.is_active,
                record.is_suspicious,
                record.risk_score as i64,
                record.suspicious_reasons,
                record.login_time,
                record.last_activity,
                record.logout_time,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn last_location_change(
        &self,
        user_id: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<(i64, f64, f64)>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT login_time, latitude, longitude FROM login_sessions
             WHERE user_id = ?
               AND latitude IS NOT NULL AND longitude IS NOT NULL
               AND (latitude != ? OR longitude != ?)
             ORDER BY login_time DESC LIMIT 1",
        )?;

        let result = stmt.query_row(params![user_id, latitude, longitude], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        });

        match result {
            Ok(data) => Ok(Some(data)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn device_seen(&self, user_id: &str, fingerprint: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT 1 FROM login_sessions
             WHERE user_id = ? AND device_fingerprint = ? LIMIT 1",
        )?;

        match stmt.query_row(params![user_id, fingerprint], |_| Ok(())) {
            Ok(()) => Ok(true),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn count_logins_since(&self, user_id: &str, ip: &str, since: i64) -> Result<u32, StoreError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM login_sessions
             WHERE user_id = ? AND ip_address = ? AND login_time >= ?",
            params![user_id, ip, since],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    fn count_active_sessions(&self, user_id: &str) -> Result<u32, StoreError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM login_sessions
             WHERE user_id = ? AND is_active = 1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    fn close_sessions(
        &self,
        user_id: &str,
        token_hash: Option<&str>,
        logout_time: i64,
    ) -> Result<usize, StoreError> {
        let conn = self.conn.lock().unwrap();
        let changed = match token_hash {
            Some(hash) => conn.execute(
                "UPDATE login_sessions
                 SET is_active = 0, logout_time = ?
                 WHERE user_id = ? AND session_token_hash = ? AND is_active = 1",
                params![logout_time, user_id, hash],
            )?,
            None => conn.execute(
                "UPDATE login_sessions
                 SET is_active = 0, logout_time = ?
                 WHERE user_id = ? AND is_active = 1",
                params![logout_time, user_id],
            )?,
        };
        Ok(changed)
    }

    fn touch_activity(&self, user_id: &str, ip: &str, now: i64) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE login_sessions SET last_activity = ?
             WHERE id = (SELECT id FROM login_sessions
                         WHERE user_id = ? AND ip_address = ? AND is_active = 1
                         ORDER BY login_time DESC LIMIT 1)",
            params![now, user_id, ip],
        )?;
        Ok(changed > 0)
    }

    fn recent_sessions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<SessionRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT {} FROM login_sessions
             WHERE user_id = ? ORDER BY login_time DESC LIMIT ?",
            SESSION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let sessions = stmt
            .query_map(params![user_id, limit], Self::row_to_session)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sessions)
    }
}

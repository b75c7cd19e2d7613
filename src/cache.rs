//! Write-through session summary cache
//!
//! Keyed by user id, holding the most recent session summary with a fixed
//! TTL so callers can short-circuit redundant store lookups. Every
//! operation takes the current time explicitly, letting tests drive expiry
//! with a fake clock.

use std::collections::HashMap;
use std::sync::Mutex;

/// Compact view of the most recent session for one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub user_id: String,
    pub ip_address: String,
    pub device_fingerprint: String,
    pub login_time: i64,
}

struct CacheEntry {
    inserted_at: i64,
    summary: SessionSummary,
}

/// Concurrent map of user id to session summary with per-entry TTL
pub struct SessionCache {
    ttl_seconds: i64,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl SessionCache {
    pub fn new(ttl_seconds: i64) -> Self {
        SessionCache {
            ttl_seconds,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Insert or replace the summary for a user
    pub fn insert(&self, summary: SessionSummary, now: i64) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            summary.user_id.clone(),
            CacheEntry {
                inserted_at: now,
                summary,
            },
        );
    }

    /// Fetch the summary for a user, dropping it if expired
    pub fn get(&self, user_id: &str, now: i64) -> Option<SessionSummary> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(user_id) {
            Some(entry) if now - entry.inserted_at < self.ttl_seconds => {
                Some(entry.summary.clone())
            }
            Some(_) => {
                entries.remove(user_id);
                None
            }
            None => None,
        }
    }

    /// Remove the entry for a user (logout, session termination)
    pub fn invalidate(&self, user_id: &str) {
        self.entries.lock().unwrap().remove(user_id);
    }

    /// Drop every expired entry, returning how many were removed
    pub fn prune_expired(&self, now: i64) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| now - entry.inserted_at < self.ttl_seconds);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(user: &str, login_time: i64) -> SessionSummary {
        SessionSummary {
            user_id: user.to_string(),
            ip_address: "1.1.1.1".to_string(),
            device_fingerprint: "fp".to_string(),
            login_time,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let cache = SessionCache::new(100);
        cache.insert(summary("alice", 1000), 1000);

        let cached = cache.get("alice", 1050).unwrap();
        assert_eq!(cached.user_id, "alice");
        assert_eq!(cached.login_time, 1000);
    }

    #[test]
    fn test_expiry_with_fake_clock() {
        let cache = SessionCache::new(100);
        cache.insert(summary("alice", 1000), 1000);

        // One second before the TTL boundary
        assert!(cache.get("alice", 1099).is_some());
        // At the boundary the entry is expired and evicted
        assert!(cache.get("alice", 1100).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate() {
        let cache = SessionCache::new(100);
        cache.insert(summary("alice", 1000), 1000);
        cache.invalidate("alice");
        assert!(cache.get("alice", 1001).is_none());
    }

    #[test]
    fn test_replace_resets_ttl() {
        let cache = SessionCache::new(100);
        cache.insert(summary("alice", 1000), 1000);
        cache.insert(summary("alice", 1090), 1090);

        // Old insert time no longer counts
        let cached = cache.get("alice", 1150).unwrap();
        assert_eq!(cached.login_time, 1090);
    }

    #[test]
    fn test_prune_expired() {
        let cache = SessionCache::new(100);
        cache.insert(summary("alice", 1000), 1000);
        cache.insert(summary("bob", 1080), 1080);

        assert_eq!(cache.prune_expired(1120), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("bob", 1120).is_some());
    }
}

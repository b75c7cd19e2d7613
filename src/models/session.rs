use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// A successful authentication reported by the caller.
///
/// Timestamps are unix seconds supplied by the caller, which keeps every
/// downstream computation reproducible in tests.
#[derive(Debug, Clone)]
pub struct LoginEvent {
    pub user_id: String,
    pub ip: IpAddr,
    pub user_agent: String,
    pub timestamp: i64,
}

/// Best-effort device attributes parsed from a user-agent string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_type: String,
    pub os: String,
    pub browser: String,
}

impl DeviceInfo {
    /// Placeholder used when the user-agent is empty or unparseable.
    pub fn unknown() -> Self {
        DeviceInfo {
            device_type: "unknown".to_string(),
            os: "unknown".to_string(),
            browser: "unknown".to_string(),
        }
    }
}

/// Geographic attributes resolved from an IP address.
///
/// Absent entirely (`Option<GeoInfo>`) when the resolver is unavailable;
/// individual fields may still be empty for sparse database records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoInfo {
    pub country: String,
    pub region: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub isp: String,
}

impl GeoInfo {
    /// Human-readable "city, country" string for alert payloads.
    pub fn display_location(&self) -> String {
        match (self.city.is_empty(), self.country.is_empty()) {
            (false, false) => format!("{}, {}", self.city, self.country),
            (true, false) => self.country.clone(),
            (false, true) => self.city.clone(),
            (true, true) => format!("({:.4}, {:.4})", self.latitude, self.longitude),
        }
    }
}

/// Persisted audit entry for one login.
///
/// Append-only except for the activity timestamp, the logout timestamp and
/// the active flag. `id` is the database rowid, zero until inserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub user_id: String,
    /// SHA-256 digest; the raw session token is never stored.
    pub session_token_hash: String,
    pub ip_address: String,
    pub user_agent: String,
    pub device: DeviceInfo,
    pub device_fingerprint: String,
    pub geo: Option<GeoInfo>,
    pub is_active: bool,
    pub is_suspicious: bool,
    /// Clamped to [0, 100].
    pub risk_score: u8,
    /// Comma-joined list; non-empty whenever `is_suspicious` is set.
    pub suspicious_reasons: String,
    pub login_time: i64,
    pub last_activity: i64,
    pub logout_time: Option<i64>,
}

impl SessionRecord {
    /// Human-readable "browser on OS" string for alert payloads.
    pub fn device_summary(&self) -> String {
        format!("{} on {}", self.device.browser, self.device.os)
    }

    /// The individual suspicion reasons, empty when none were recorded.
    pub fn reasons(&self) -> Vec<&str> {
        if self.suspicious_reasons.is_empty() {
            Vec::new()
        } else {
            self.suspicious_reasons.split(',').collect()
        }
    }

    pub fn latitude(&self) -> Option<f64> {
        self.geo.as_ref().map(|g| g.latitude)
    }

    pub fn longitude(&self) -> Option<f64> {
        self.geo.as_ref().map(|g| g.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_geo() -> GeoInfo {
        GeoInfo {
            country: "China".to_string(),
            region: "Beijing".to_string(),
            city: "Beijing".to_string(),
            latitude: 39.9,
            longitude: 116.4,
            isp: "China Telecom".to_string(),
        }
    }

    #[test]
    fn test_display_location() {
        let mut geo = sample_geo();
        assert_eq!(geo.display_location(), "Beijing, China");

        geo.city = String::new();
        assert_eq!(geo.display_location(), "China");

        geo.country = String::new();
        assert_eq!(geo.display_location(), "(39.9000, 116.4000)");
    }

    #[test]
    fn test_reasons_split() {
        let record = SessionRecord {
            id: 1,
            user_id: "alice".to_string(),
            session_token_hash: "abc".to_string(),
            ip_address: "1.1.1.1".to_string(),
            user_agent: "test".to_string(),
            device: DeviceInfo::unknown(),
            device_fingerprint: "fp".to_string(),
            geo: None,
            is_active: true,
            is_suspicious: true,
            risk_score: 50,
            suspicious_reasons: "login from a new device,login at an unusual hour".to_string(),
            login_time: 1700000000,
            last_activity: 1700000000,
            logout_time: None,
        };

        assert_eq!(
            record.reasons(),
            vec!["login from a new device", "login at an unusual hour"]
        );
        assert_eq!(record.device_summary(), "unknown on unknown");
    }

    #[test]
    fn test_empty_reasons() {
        let record = SessionRecord {
            id: 0,
            user_id: "bob".to_string(),
            session_token_hash: String::new(),
            ip_address: "2.2.2.2".to_string(),
            user_agent: String::new(),
            device: DeviceInfo::unknown(),
            device_fingerprint: String::new(),
            geo: Some(sample_geo()),
            is_active: true,
            is_suspicious: false,
            risk_score: 10,
            suspicious_reasons: String::new(),
            login_time: 0,
            last_activity: 0,
            logout_time: None,
        };

        assert!(record.reasons().is_empty());
        assert_eq!(record.latitude(), Some(39.9));
        assert_eq!(record.longitude(), Some(116.4));
    }
}

use serde::{Deserialize, Serialize};

/// Alert type emitted by this engine. Other types belong to other subsystems.
pub const ALERT_TYPE_LOGIN_ANOMALY: &str = "LOGIN_ANOMALY";

/// Severity tier derived from the risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    /// Fixed breakpoints: >= 80 critical, >= 60 high, >= 40 medium, else low.
    pub fn from_score(score: u8) -> Self {
        if score >= 80 {
            AlertSeverity::Critical
        } else if score >= 60 {
            AlertSeverity::High
        } else if score >= 40 {
            AlertSeverity::Medium
        } else {
            AlertSeverity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "LOW",
            AlertSeverity::Medium => "MEDIUM",
            AlertSeverity::High => "HIGH",
            AlertSeverity::Critical => "CRITICAL",
        }
    }
}

/// Security alert raised for one anomalous login.
///
/// Created at most once per login; the resolution workflow (resolved flag,
/// notification delivery) belongs to the alert-management collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityAlert {
    pub user_id: String,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub title: String,
    pub description: String,
    /// Structured evidence: ip, location, device, score, reasons.
    pub alert_data: serde_json::Value,
    pub ip_address: String,
    pub location: String,
    pub is_resolved: bool,
    pub is_notified: bool,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_breakpoints() {
        assert_eq!(AlertSeverity::from_score(0), AlertSeverity::Low);
        assert_eq!(AlertSeverity::from_score(39), AlertSeverity::Low);
        assert_eq!(AlertSeverity::from_score(40), AlertSeverity::Medium);
        assert_eq!(AlertSeverity::from_score(59), AlertSeverity::Medium);
        assert_eq!(AlertSeverity::from_score(60), AlertSeverity::High);
        assert_eq!(AlertSeverity::from_score(79), AlertSeverity::High);
        assert_eq!(AlertSeverity::from_score(80), AlertSeverity::Critical);
        assert_eq!(AlertSeverity::from_score(100), AlertSeverity::Critical);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(AlertSeverity::Low < AlertSeverity::Medium);
        assert!(AlertSeverity::Medium < AlertSeverity::High);
        assert!(AlertSeverity::High < AlertSeverity::Critical);
    }

    #[test]
    fn test_severity_serde() {
        let json = serde_json::to_string(&AlertSeverity::Medium).unwrap();
        assert_eq!(json, "\"MEDIUM\"");
        let back: AlertSeverity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AlertSeverity::Medium);
    }
}

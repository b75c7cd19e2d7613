use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Immutable configuration snapshot for one scoring pass.
///
/// The engine holds the current snapshot and swaps it atomically between
/// events; a detector never observes a partially updated configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Per-signal score weights
    pub weights: SignalWeights,
    /// Detection thresholds and windows
    pub thresholds: DetectionThresholds,
    /// Worker pool, cache and timeout tuning
    pub runtime: RuntimeConfig,
}

/// Score contribution of each signal, plus the base score every login gets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalWeights {
    pub base_score: u8,
    pub geographic_jump: u8,
    pub new_device: u8,
    pub ip_reputation: u8,
    pub login_frequency: u8,
    pub concurrent_sessions: u8,
    pub unusual_time: u8,
}

/// Thresholds and time windows for the signal detectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionThresholds {
    /// Distance beyond which a location change counts as a jump (km)
    pub geo_distance_km: f64,
    /// A jump only counts when the prior login is this recent (hours)
    pub geo_window_hours: i64,
    /// Max logins per (user, ip) within the frequency window
    pub login_frequency_limit: u32,
    /// Frequency window in minutes
    pub login_frequency_window_minutes: i64,
    /// Max simultaneously active sessions per user
    pub max_concurrent_sessions: u32,
}

/// Runtime tuning for the worker pool, session cache and geo lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Session summary cache TTL in seconds
    pub cache_ttl_seconds: i64,
    /// Budget for one geo resolver call in seconds
    pub geo_timeout_seconds: u64,
    /// Number of event workers
    pub worker_count: usize,
    /// Per-worker event queue capacity
    pub queue_capacity: usize,
    /// Alert queue capacity
    pub alert_queue_capacity: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            weights: SignalWeights {
                base_score: 10,
                geographic_jump: 25,
                new_device: 15,
                ip_reputation: 30,
                login_frequency: 20,
                concurrent_sessions: 15,
                unusual_time: 10,
            },
            thresholds: DetectionThresholds {
                geo_distance_km: 500.0,
                geo_window_hours: 6,
                login_frequency_limit: 10,
                login_frequency_window_minutes: 30,
                max_concurrent_sessions: 5,
            },
            runtime: RuntimeConfig {
                cache_ttl_seconds: 24 * 3600,
                geo_timeout_seconds: 3,
                worker_count: 4,
                queue_capacity: 256,
                alert_queue_capacity: 100,
            },
        }
    }
}

impl RiskConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: RiskConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let config = RiskConfig::default();
        assert_eq!(config.weights.base_score, 10);
        assert_eq!(config.weights.geographic_jump, 25);
        assert_eq!(config.weights.new_device, 15);
        assert_eq!(config.weights.ip_reputation, 30);
        assert_eq!(config.weights.login_frequency, 20);
        assert_eq!(config.weights.concurrent_sessions, 15);
        assert_eq!(config.weights.unusual_time, 10);
    }

    #[test]
    fn test_default_thresholds() {
        let config = RiskConfig::default();
        assert_eq!(config.thresholds.geo_distance_km, 500.0);
        assert_eq!(config.thresholds.geo_window_hours, 6);
        assert_eq!(config.thresholds.login_frequency_limit, 10);
        assert_eq!(config.thresholds.login_frequency_window_minutes, 30);
        assert_eq!(config.thresholds.max_concurrent_sessions, 5);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = RiskConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: RiskConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.weights.ip_reputation, config.weights.ip_reputation);
        assert_eq!(
            parsed.thresholds.geo_distance_km,
            config.thresholds.geo_distance_km
        );
        assert_eq!(
            parsed.runtime.cache_ttl_seconds,
            config.runtime.cache_ttl_seconds
        );
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("risk.toml");

        let mut config = RiskConfig::default();
        config.weights.base_score = 5;
        config.to_file(&path).unwrap();

        let loaded = RiskConfig::from_file(&path).unwrap();
        assert_eq!(loaded.weights.base_score, 5);
    }
}

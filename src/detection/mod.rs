//! Signal detectors and risk aggregation
//!
//! Each detector is a pure predicate over the session store and the current
//! event. Detectors never mutate state and never raise: a store failure or
//! missing input degrades to "not anomalous" so a single unavailable signal
//! cannot block the recording pipeline.

pub mod detectors;
pub mod scoring;

pub use detectors::{
    detect_concurrent_sessions, detect_flagged_ip, detect_geographic_jump,
    detect_login_frequency, detect_new_device, detect_unusual_time, run_all, DetectionInput,
};
pub use scoring::score;

use std::net::IpAddr;

use crate::config::SignalWeights;

/// One anomaly signal, as produced by its detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    GeographicJump,
    ConcurrentSessions,
    LoginFrequency,
    NewDevice,
    IpReputation,
    UnusualTime,
}

impl Signal {
    /// Evaluation order; also the order reasons appear in alerts.
    pub const ALL: [Signal; 6] = [
        Signal::GeographicJump,
        Signal::ConcurrentSessions,
        Signal::LoginFrequency,
        Signal::NewDevice,
        Signal::IpReputation,
        Signal::UnusualTime,
    ];

    /// Stable machine-readable name
    pub fn label(&self) -> &'static str {
        match self {
            Signal::GeographicJump => "geographic_jump",
            Signal::ConcurrentSessions => "concurrent_sessions",
            Signal::LoginFrequency => "login_frequency",
            Signal::NewDevice => "new_device",
            Signal::IpReputation => "ip_reputation",
            Signal::UnusualTime => "unusual_time",
        }
    }

    /// Human-readable suspicion reason recorded on the session and alert
    pub fn reason(&self) -> &'static str {
        match self {
            Signal::GeographicJump => "login from an unexpected location",
            Signal::ConcurrentSessions => "too many concurrent sessions",
            Signal::LoginFrequency => "abnormal login frequency",
            Signal::NewDevice => "login from a new device",
            Signal::IpReputation => "login from a flagged IP address",
            Signal::UnusualTime => "login at an unusual hour",
        }
    }

    /// Score contribution under the given weights
    pub fn weight(&self, weights: &SignalWeights) -> u8 {
        match self {
            Signal::GeographicJump => weights.geographic_jump,
            Signal::ConcurrentSessions => weights.concurrent_sessions,
            Signal::LoginFrequency => weights.login_frequency,
            Signal::NewDevice => weights.new_device,
            Signal::IpReputation => weights.ip_reputation,
            Signal::UnusualTime => weights.unusual_time,
        }
    }
}

/// IP reputation extension point.
///
/// No implementation ships with the engine; without one the reputation
/// detector always answers false.
pub trait ReputationList: Send + Sync {
    fn is_flagged(&self, ip: &IpAddr) -> bool;
}

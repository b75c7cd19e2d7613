//! The six signal detectors
//!
//! Detection runs before the session row is inserted, so detectors that
//! count sessions take a `pending` argument: the number of logins in flight
//! that the store does not contain yet (1 while recording, 0 when
//! re-evaluating a persisted record).

use chrono::Timelike;
use std::net::IpAddr;

use super::{ReputationList, Signal};
use crate::config::RiskConfig;
use crate::persistence::SessionStore;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Event-derived fields the detectors evaluate
#[derive(Debug, Clone)]
pub struct DetectionInput<'a> {
    pub user_id: &'a str,
    pub ip: IpAddr,
    pub device_fingerprint: &'a str,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub login_time: i64,
}

/// Run every detector, returning the signals that fired in evaluation order
pub fn run_all(
    store: &dyn SessionStore,
    config: &RiskConfig,
    reputation: Option<&dyn ReputationList>,
    input: &DetectionInput,
    pending: u32,
) -> Vec<Signal> {
    let mut signals = Vec::new();

    if detect_geographic_jump(
        store,
        config,
        input.user_id,
        input.latitude,
        input.longitude,
        input.login_time,
    ) {
        signals.push(Signal::GeographicJump);
    }
    if detect_concurrent_sessions(store, config, input.user_id, pending) {
        signals.push(Signal::ConcurrentSessions);
    }
    if detect_login_frequency(
        store,
        config,
        input.user_id,
        &input.ip.to_string(),
        input.login_time,
        pending,
    ) {
        signals.push(Signal::LoginFrequency);
    }
    if detect_new_device(store, input.user_id, input.device_fingerprint) {
        signals.push(Signal::NewDevice);
    }
    if detect_flagged_ip(reputation, &input.ip) {
        signals.push(Signal::IpReputation);
    }
    if detect_unusual_time(input.login_time) {
        signals.push(Signal::UnusualTime);
    }

    signals
}

/// Geographic jump: the user moved further than plausible since their last
/// login from a different location.
///
/// A large jump outside the recency window is not flagged; it no longer
/// indicates physical impossibility.
pub fn detect_geographic_jump(
    store: &dyn SessionStore,
    config: &RiskConfig,
    user_id: &str,
    latitude: Option<f64>,
    longitude: Option<f64>,
    now: i64,
) -> bool {
    let (lat, lon) = match (latitude, longitude) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return false,
    };

    let previous = match store.last_location_change(user_id, lat, lon) {
        Ok(Some(prev)) => prev,
        Ok(None) => return false,
        Err(e) => {
            log::warn!("geographic jump check failed: user={}: {}", user_id, e);
            return false;
        }
    };

    let (prev_time, prev_lat, prev_lon) = previous;
    let distance_km = haversine_distance(prev_lat, prev_lon, lat, lon);
    let window_start = now - config.thresholds.geo_window_hours * 3600;

    if distance_km > config.thresholds.geo_distance_km && prev_time > window_start {
        log::warn!(
            "geographic jump detected: user={}, distance={:.1}km",
            user_id,
            distance_km
        );
        true
    } else {
        false
    }
}

/// New device: no prior session for this user carries the fingerprint.
pub fn detect_new_device(store: &dyn SessionStore, user_id: &str, fingerprint: &str) -> bool {
    match store.device_seen(user_id, fingerprint) {
        Ok(seen) => !seen,
        Err(e) => {
            log::warn!("new device check failed: user={}: {}", user_id, e);
            false
        }
    }
}

/// Login frequency: too many logins from the same (user, ip) in the window.
///
/// The login being recorded counts toward the window via `pending`.
pub fn detect_login_frequency(
    store: &dyn SessionStore,
    config: &RiskConfig,
    user_id: &str,
    ip: &str,
    now: i64,
    pending: u32,
) -> bool {
    let window_start = now - config.thresholds.login_frequency_window_minutes * 60;

    let count = match store.count_logins_since(user_id, ip, window_start) {
        Ok(count) => count,
        Err(e) => {
            log::warn!("login frequency check failed: user={}: {}", user_id, e);
            return false;
        }
    };

    if count + pending > config.thresholds.login_frequency_limit {
        log::warn!(
            "login frequency anomaly: user={}, ip={}, count={} in {}min",
            user_id,
            ip,
            count + pending,
            config.thresholds.login_frequency_window_minutes
        );
        true
    } else {
        false
    }
}

/// Concurrent sessions: more simultaneously-active sessions than allowed.
pub fn detect_concurrent_sessions(
    store: &dyn SessionStore,
    config: &RiskConfig,
    user_id: &str,
    pending: u32,
) -> bool {
    let count = match store.count_active_sessions(user_id) {
        Ok(count) => count,
        Err(e) => {
            log::warn!("concurrent session check failed: user={}: {}", user_id, e);
            return false;
        }
    };

    if count + pending > config.thresholds.max_concurrent_sessions {
        log::warn!(
            "concurrent session anomaly: user={}, sessions={}",
            user_id,
            count + pending
        );
        true
    } else {
        false
    }
}

/// Unusual time: the login hour falls outside [06:00, 23:00).
pub fn detect_unusual_time(login_time: i64) -> bool {
    match chrono::DateTime::from_timestamp(login_time, 0) {
        Some(dt) => {
            let hour = dt.hour();
            hour < 6 || hour >= 23
        }
        None => false,
    }
}

/// IP reputation: delegated to the optional reputation list.
pub fn detect_flagged_ip(reputation: Option<&dyn ReputationList>, ip: &IpAddr) -> bool {
    match reputation {
        Some(list) => list.is_flagged(ip),
        None => false,
    }
}

/// Great-circle distance between two points in kilometers (haversine)
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

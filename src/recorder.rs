//! Per-event orchestration
//!
//! The [`EventRecorder`] turns one login/logout/activity event into store
//! and cache mutations plus, for suspicious logins, a queued alert. It is
//! best-effort security telemetry: no step here may fail the caller, so
//! every internal error is logged with user/ip context and the pipeline
//! continues with whatever it has.

use std::net::IpAddr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::alerting::{build_alert, AlertQueue};
use crate::cache::{SessionCache, SessionSummary};
use crate::config::RiskConfig;
use crate::detection::{self, DetectionInput, ReputationList, Signal};
use crate::device;
use crate::geolocation::GeoResolver;
use crate::models::{GeoInfo, LoginEvent, SessionRecord};
use crate::persistence::SessionStore;

/// Orchestrates detection, scoring, persistence and alerting per event
pub struct EventRecorder {
    store: Arc<dyn SessionStore>,
    cache: SessionCache,
    config: RwLock<Arc<RiskConfig>>,
    geo_resolver: Option<Arc<dyn GeoResolver>>,
    reputation: Option<Arc<dyn ReputationList>>,
    alerts: Option<AlertQueue>,
}

impl EventRecorder {
    pub fn new(store: Arc<dyn SessionStore>, config: RiskConfig) -> Self {
        let cache = SessionCache::new(config.runtime.cache_ttl_seconds);
        EventRecorder {
            store,
            cache,
            config: RwLock::new(Arc::new(config)),
            geo_resolver: None,
            reputation: None,
            alerts: None,
        }
    }

    /// Attach an IP geolocation resolver
    pub fn with_geo_resolver(mut self, resolver: Arc<dyn GeoResolver>) -> Self {
        self.geo_resolver = Some(resolver);
        self
    }

    /// Attach an IP reputation list
    pub fn with_reputation_list(mut self, list: Arc<dyn ReputationList>) -> Self {
        self.reputation = Some(list);
        self
    }

    /// Attach the alert queue fed by suspicious logins
    pub fn with_alert_queue(mut self, queue: AlertQueue) -> Self {
        self.alerts = Some(queue);
        self
    }

    /// Current configuration snapshot
    pub fn config_snapshot(&self) -> Arc<RiskConfig> {
        self.config.read().unwrap().clone()
    }

    /// Swap in a new configuration between events
    pub fn update_config(&self, config: RiskConfig) {
        *self.config.write().unwrap() = Arc::new(config);
    }

    /// Record one successful login.
    ///
    /// Never returns an error: detection, alerting and even persistence
    /// failures are logged and swallowed so the authentication path is
    /// never blocked by its own telemetry.
    pub async fn record_login(&self, event: LoginEvent) {
        let config = self.config_snapshot();

        let device_info = device::parse_user_agent(&event.user_agent);
        let geo = self
            .resolve_geo(event.ip, config.runtime.geo_timeout_seconds)
            .await;
        let fingerprint = device::fingerprint(&event.ip, &event.user_agent);

        let input = DetectionInput {
            user_id: &event.user_id,
            ip: event.ip,
            device_fingerprint: &fingerprint,
            latitude: geo.as_ref().map(|g| g.latitude),
            longitude: geo.as_ref().map(|g| g.longitude),
            login_time: event.timestamp,
        };
        let signals = detection::run_all(
            self.store.as_ref(),
            &config,
            self.reputation.as_deref(),
            &input,
            1,
        );
        let (risk_score, suspicious) = detection::score(&config, &signals);
        let reasons: Vec<&str> = signals.iter().map(Signal::reason).collect();

        let record = SessionRecord {
            id: 0,
            user_id: event.user_id.clone(),
            session_token_hash: device::session_token_hash(&event.user_id, event.timestamp),
            ip_address: event.ip.to_string(),
            user_agent: event.user_agent.clone(),
            device: device_info,
            device_fingerprint: fingerprint,
            geo,
            is_active: true,
            is_suspicious: suspicious,
            risk_score,
            suspicious_reasons: reasons.join(","),
            login_time: event.timestamp,
            last_activity: event.timestamp,
            logout_time: None,
        };

        if suspicious {
            if let Some(ref queue) = self.alerts {
                queue.submit(build_alert(&record, &reasons, event.timestamp));
            }
        }

        if let Err(e) = self.store.insert_session(&record) {
            log::error!(
                "failed to persist session: user={}, ip={}: {}",
                event.user_id,
                event.ip,
                e
            );
        }

        self.cache.insert(
            SessionSummary {
                user_id: record.user_id.clone(),
                ip_address: record.ip_address.clone(),
                device_fingerprint: record.device_fingerprint.clone(),
                login_time: record.login_time,
            },
            event.timestamp,
        );

        log::info!(
            "recorded login: user={}, ip={}, suspicious={}, score={}",
            event.user_id,
            event.ip,
            suspicious,
            risk_score
        );
    }

    /// Mark every active session for the user as logged out.
    ///
    /// Idempotent: sessions already closed are untouched.
    pub fn record_logout(&self, user_id: &str, now: i64) {
        match self.store.close_sessions(user_id, None, now) {
            Ok(count) => log::info!("recorded logout: user={}, sessions={}", user_id, count),
            Err(e) => log::error!("failed to record logout: user={}: {}", user_id, e),
        }
        self.cache.invalidate(user_id);
    }

    /// Bump the activity timestamp on the most recent matching session.
    ///
    /// A missing session is a silent no-op.
    pub fn update_activity(&self, user_id: &str, ip: IpAddr, now: i64) {
        match self.store.touch_activity(user_id, &ip.to_string(), now) {
            Ok(true) => log::debug!("activity updated: user={}, ip={}", user_id, ip),
            Ok(false) => {}
            Err(e) => log::error!("failed to update activity: user={}, ip={}: {}", user_id, ip, e),
        }
    }

    /// Force-close one session (by token hash) or all sessions for a user
    pub fn terminate_sessions(&self, user_id: &str, token_hash: Option<&str>, now: i64) {
        match self.store.close_sessions(user_id, token_hash, now) {
            Ok(count) => log::info!("terminated sessions: user={}, count={}", user_id, count),
            Err(e) => log::error!("failed to terminate sessions: user={}: {}", user_id, e),
        }
        self.cache.invalidate(user_id);
    }

    /// Cached summary of the user's most recent session, if still fresh
    pub fn cached_session(&self, user_id: &str, now: i64) -> Option<SessionSummary> {
        self.cache.get(user_id, now)
    }

    /// Standalone geographic anomaly check against the user's history
    pub fn detect_geographic_anomaly(
        &self,
        user_id: &str,
        latitude: Option<f64>,
        longitude: Option<f64>,
        now: i64,
    ) -> bool {
        let config = self.config_snapshot();
        detection::detect_geographic_jump(
            self.store.as_ref(),
            &config,
            user_id,
            latitude,
            longitude,
            now,
        )
    }

    /// Standalone concurrent-session check over persisted sessions
    pub fn detect_concurrent_session_anomaly(&self, user_id: &str) -> bool {
        let config = self.config_snapshot();
        detection::detect_concurrent_sessions(self.store.as_ref(), &config, user_id, 0)
    }

    /// Standalone login-frequency check over persisted sessions
    pub fn detect_login_frequency_anomaly(&self, user_id: &str, ip: IpAddr, now: i64) -> bool {
        let config = self.config_snapshot();
        detection::detect_login_frequency(
            self.store.as_ref(),
            &config,
            user_id,
            &ip.to_string(),
            now,
            0,
        )
    }

    /// Re-evaluate the risk score of a persisted session record
    pub fn calculate_risk_score(&self, record: &SessionRecord) -> u8 {
        let config = self.config_snapshot();

        let ip = match record.ip_address.parse() {
            Ok(ip) => ip,
            Err(_) => {
                log::warn!(
                    "invalid ip on session record: user={}, ip={}",
                    record.user_id,
                    record.ip_address
                );
                return config.weights.base_score.min(100);
            }
        };

        let input = DetectionInput {
            user_id: &record.user_id,
            ip,
            device_fingerprint: &record.device_fingerprint,
            latitude: record.latitude(),
            longitude: record.longitude(),
            login_time: record.login_time,
        };
        // The record is already persisted, so nothing is pending
        let signals = detection::run_all(
            self.store.as_ref(),
            &config,
            self.reputation.as_deref(),
            &input,
            0,
        );
        detection::score(&config, &signals).0
    }

    async fn resolve_geo(&self, ip: IpAddr, timeout_seconds: u64) -> Option<GeoInfo> {
        let resolver = self.geo_resolver.clone()?;

        let lookup = tokio::task::spawn_blocking(move || resolver.resolve(&ip));
        match tokio::time::timeout(Duration::from_secs(timeout_seconds), lookup).await {
            Ok(Ok(geo)) => geo,
            Ok(Err(e)) => {
                log::warn!("geo lookup task failed: ip={}: {}", ip, e);
                None
            }
            Err(_) => {
                log::warn!("geo lookup timed out: ip={}", ip);
                None
            }
        }
    }
}

//! Heimdall: login risk scoring and anomaly detection.
//!
//! Embeds in an authentication service: report successful logins, logouts
//! and session activity to the [`RiskEngine`], and Heimdall scores each
//! login against the user's history, persists an audit record and raises
//! alerts for suspicious sessions, all off the caller's hot path.

pub mod alerting;
pub mod cache;
pub mod config;
pub mod detection;
pub mod device;
pub mod engine;
pub mod geolocation;
pub mod models;
pub mod persistence;
pub mod recorder;

pub use alerting::{AlertDispatcher, AlertQueue, AlertSink, MemorySink, WebhookSink};
pub use config::RiskConfig;
pub use detection::{ReputationList, Signal};
pub use engine::RiskEngine;
pub use geolocation::{GeoResolver, MaxMindResolver};
pub use models::{AlertSeverity, LoginEvent, SecurityAlert, SessionRecord};
pub use persistence::{SessionStore, SqliteSessionStore};
pub use recorder::EventRecorder;

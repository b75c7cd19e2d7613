//! Alert construction and dispatch
//!
//! Suspicious logins become [`SecurityAlert`]s, queued on a bounded channel
//! and drained by an async dispatcher that hands them to the configured
//! [`AlertSink`]. Alerts are best-effort telemetry: a full queue drops the
//! alert with a warning and a failing sink is logged and swallowed, never
//! surfaced to the login path.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::{AlertSeverity, SecurityAlert, SessionRecord, ALERT_TYPE_LOGIN_ANOMALY};

/// Errors that can occur during alert dispatch
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Alert channel closed")]
    ChannelClosed,

    #[error("Sink rejected alert: {0}")]
    Rejected(String),
}

/// Destination for security alerts (the alert-management collaborator)
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Persist or dispatch the alert, returning its id
    async fn create(&self, alert: &SecurityAlert) -> Result<i64, AlertError>;
}

/// Build the alert for one suspicious session.
///
/// Severity follows the fixed score breakpoints; the evidence payload
/// carries ip, location, device, score and the ordered reason list.
pub fn build_alert(record: &SessionRecord, reasons: &[&str], created_at: i64) -> SecurityAlert {
    let location = record
        .geo
        .as_ref()
        .map(|g| g.display_location())
        .unwrap_or_else(|| "unknown".to_string());

    let alert_data = serde_json::json!({
        "ip_address": record.ip_address,
        "location": location.clone(),
        "device": record.device_summary(),
        "risk_score": record.risk_score,
        "suspicious_reasons": reasons,
    });

    SecurityAlert {
        user_id: record.user_id.clone(),
        alert_type: ALERT_TYPE_LOGIN_ANOMALY.to_string(),
        severity: AlertSeverity::from_score(record.risk_score),
        title: "Anomalous login detected".to_string(),
        description: format!(
            "User '{}' triggered anomalous login signals: {}",
            record.user_id,
            reasons.join(", ")
        ),
        alert_data,
        ip_address: record.ip_address.clone(),
        location,
        is_resolved: false,
        is_notified: false,
        created_at,
    }
}

/// Synchronous handle for queueing alerts from the recording path
#[derive(Clone)]
pub struct AlertQueue {
    tx: mpsc::Sender<SecurityAlert>,
}

impl AlertQueue {
    pub fn new(tx: mpsc::Sender<SecurityAlert>) -> Self {
        AlertQueue { tx }
    }

    /// Create a bounded alert channel
    pub fn channel(capacity: usize) -> (mpsc::Sender<SecurityAlert>, mpsc::Receiver<SecurityAlert>) {
        mpsc::channel(capacity)
    }

    /// Queue an alert without blocking; a full or closed queue drops it
    pub fn submit(&self, alert: SecurityAlert) {
        if let Err(e) = self.tx.try_send(alert) {
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    log::warn!("alert queue full, dropping alert");
                }
                mpsc::error::TrySendError::Closed(_) => {
                    log::warn!("alert queue closed, dropping alert");
                }
            }
        }
    }

    /// Queue an alert (async version)
    pub async fn submit_async(&self, alert: SecurityAlert) -> Result<(), AlertError> {
        self.tx
            .send(alert)
            .await
            .map_err(|_| AlertError::ChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Async dispatcher draining the alert queue into a sink
pub struct AlertDispatcher {
    sink: Arc<dyn AlertSink>,
}

impl AlertDispatcher {
    pub fn new(sink: Arc<dyn AlertSink>) -> Self {
        AlertDispatcher { sink }
    }

    /// Run the dispatch loop until the queue closes.
    ///
    /// Spawn this as a tokio task. Sink failures are logged and swallowed;
    /// retry policy belongs to the sink itself.
    pub async fn run(self, mut rx: mpsc::Receiver<SecurityAlert>) {
        log::info!("alert dispatcher started");

        while let Some(alert) = rx.recv().await {
            match self.sink.create(&alert).await {
                Ok(id) => log::debug!(
                    "alert dispatched: id={}, user={}, severity={}",
                    id,
                    alert.user_id,
                    alert.severity.as_str()
                ),
                Err(e) => log::error!(
                    "failed to dispatch alert: user={}, ip={}: {}",
                    alert.user_id,
                    alert.ip_address,
                    e
                ),
            }
        }

        log::info!("alert dispatcher stopped");
    }
}

/// Webhook sink: POSTs each alert as JSON to a configured URL
pub struct WebhookSink {
    url: String,
    client: Client,
    next_id: AtomicI64,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Self {
        WebhookSink {
            url: url.into(),
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    async fn create(&self, alert: &SecurityAlert) -> Result<i64, AlertError> {
        let response = self.client.post(&self.url).json(alert).send().await?;

        if !response.status().is_success() {
            return Err(AlertError::Rejected(format!(
                "webhook returned status {}",
                response.status()
            )));
        }

        Ok(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// In-memory sink collecting alerts, for tests and embedding callers
#[derive(Default)]
pub struct MemorySink {
    alerts: Mutex<Vec<SecurityAlert>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<SecurityAlert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AlertSink for MemorySink {
    async fn create(&self, alert: &SecurityAlert) -> Result<i64, AlertError> {
        let mut alerts = self.alerts.lock().unwrap();
        alerts.push(alert.clone());
        Ok(alerts.len() as i64)
    }
}

//! Asynchronous event intake
//!
//! The [`RiskEngine`] is the embedding application's handle. Callers hand it
//! login/logout/activity events from their hot path; the engine enqueues
//! them onto a fixed pool of workers and returns immediately. Events for the
//! same user always land on the same worker, so per-user history is applied
//! in submission order without any cross-worker coordination.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::RiskConfig;
use crate::models::{LoginEvent, SessionRecord};
use crate::recorder::EventRecorder;

/// One queued unit of work
#[derive(Debug)]
enum Task {
    Login(LoginEvent),
    Logout { user_id: String, at: i64 },
    Activity { user_id: String, ip: IpAddr, at: i64 },
}

impl Task {
    fn user_id(&self) -> &str {
        match self {
            Task::Login(event) => &event.user_id,
            Task::Logout { user_id, .. } => user_id,
            Task::Activity { user_id, .. } => user_id,
        }
    }
}

/// Sharded worker pool over an [`EventRecorder`]
pub struct RiskEngine {
    recorder: Arc<EventRecorder>,
    senders: Vec<mpsc::Sender<Task>>,
    handles: Vec<JoinHandle<()>>,
    queued: Arc<AtomicUsize>,
}

impl RiskEngine {
    /// Spawn the worker pool. Worker count and queue capacity come from the
    /// recorder's runtime configuration.
    pub fn start(recorder: Arc<EventRecorder>) -> Self {
        let runtime = recorder.config_snapshot().runtime.clone();
        let worker_count = runtime.worker_count.max(1);
        let queued = Arc::new(AtomicUsize::new(0));

        let mut senders = Vec::with_capacity(worker_count);
        let mut handles = Vec::with_capacity(worker_count);

        for worker in 0..worker_count {
            let (tx, rx) = mpsc::channel(runtime.queue_capacity.max(1));
            senders.push(tx);
            handles.push(tokio::spawn(Self::worker_loop(
                worker,
                recorder.clone(),
                rx,
                queued.clone(),
            )));
        }

        log::info!("risk engine started with {} workers", worker_count);

        RiskEngine {
            recorder,
            senders,
            handles,
            queued,
        }
    }

    async fn worker_loop(
        worker: usize,
        recorder: Arc<EventRecorder>,
        mut rx: mpsc::Receiver<Task>,
        queued: Arc<AtomicUsize>,
    ) {
        log::debug!("worker {} started", worker);

        while let Some(task) = rx.recv().await {
            queued.fetch_sub(1, Ordering::Relaxed);
            match task {
                Task::Login(event) => recorder.record_login(event).await,
                Task::Logout { user_id, at } => recorder.record_logout(&user_id, at),
                Task::Activity { user_id, ip, at } => {
                    recorder.update_activity(&user_id, ip, at)
                }
            }
        }

        log::debug!("worker {} stopped", worker);
    }

    /// Queue a successful login for recording. Never blocks; when the
    /// worker's queue is full the event is dropped with a warning.
    pub fn record_login(&self, user_id: impl Into<String>, ip: IpAddr, user_agent: impl Into<String>) {
        self.submit(Task::Login(LoginEvent {
            user_id: user_id.into(),
            ip,
            user_agent: user_agent.into(),
            timestamp: chrono::Utc::now().timestamp(),
        }));
    }

    /// Queue a login event with a caller-supplied timestamp
    pub fn record_login_event(&self, event: LoginEvent) {
        self.submit(Task::Login(event));
    }

    /// Queue a logout for the user's active sessions
    pub fn record_logout(&self, user_id: impl Into<String>) {
        self.submit(Task::Logout {
            user_id: user_id.into(),
            at: chrono::Utc::now().timestamp(),
        });
    }

    /// Queue an activity bump for the user's most recent session at this IP
    pub fn update_activity(&self, user_id: impl Into<String>, ip: IpAddr) {
        self.submit(Task::Activity {
            user_id: user_id.into(),
            ip,
            at: chrono::Utc::now().timestamp(),
        });
    }

    /// Force-close sessions immediately, bypassing the queue.
    ///
    /// Termination is an administrative action and must not wait behind
    /// queued telemetry.
    pub fn terminate_sessions(&self, user_id: &str, token_hash: Option<&str>) {
        self.recorder
            .terminate_sessions(user_id, token_hash, chrono::Utc::now().timestamp());
    }

    /// Swap the scoring configuration; applies to events recorded after the
    /// swap, not to events already queued ahead of it on busy workers.
    pub fn update_config(&self, config: RiskConfig) {
        self.recorder.update_config(config);
    }

    /// Re-evaluate the risk score of a persisted session record
    pub fn calculate_risk_score(&self, record: &SessionRecord) -> u8 {
        self.recorder.calculate_risk_score(record)
    }

    /// Events queued across all workers but not yet processed
    pub fn queue_depth(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    /// Close the queues and wait for the workers to drain them
    pub async fn shutdown(self) {
        drop(self.senders);
        for handle in self.handles {
            if let Err(e) = handle.await {
                log::error!("worker task failed: {}", e);
            }
        }
        log::info!("risk engine stopped");
    }

    fn submit(&self, task: Task) {
        let shard = Self::shard_for(task.user_id(), self.senders.len());

        match self.senders[shard].try_send(task) {
            Ok(()) => {
                self.queued.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(task)) => {
                log::warn!(
                    "worker {} queue full, dropping event for user {}",
                    shard,
                    task.user_id()
                );
            }
            Err(mpsc::error::TrySendError::Closed(task)) => {
                log::warn!(
                    "worker {} stopped, dropping event for user {}",
                    shard,
                    task.user_id()
                );
            }
        }
    }

    fn shard_for(user_id: &str, workers: usize) -> usize {
        let mut hasher = DefaultHasher::new();
        user_id.hash(&mut hasher);
        (hasher.finish() % workers as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{SessionStore, SqliteSessionStore};
    use std::str::FromStr;
    use std::time::Duration;

    const UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
         AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    fn engine() -> (RiskEngine, Arc<SqliteSessionStore>) {
        let _ = env_logger::builder().is_test(true).try_init();
        let store = Arc::new(SqliteSessionStore::in_memory().unwrap());
        let recorder = Arc::new(EventRecorder::new(store.clone(), RiskConfig::default()));
        (RiskEngine::start(recorder), store)
    }

    fn ip(s: &str) -> IpAddr {
        IpAddr::from_str(s).unwrap()
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within timeout");
    }

    #[tokio::test]
    async fn test_login_processed_by_worker() {
        let (engine, store) = engine();

        engine.record_login("alice", ip("1.1.1.1"), UA);
        wait_for(|| !store.recent_sessions("alice", 1).unwrap().is_empty()).await;

        let sessions = store.recent_sessions("alice", 1).unwrap();
        assert_eq!(sessions[0].user_id, "alice");
        assert!(sessions[0].is_active);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_same_user_events_in_order() {
        let (engine, store) = engine();

        // Ten logins then a logout; FIFO per user means all sessions close
        for i in 0..10 {
            engine.record_login_event(LoginEvent {
                user_id: "alice".to_string(),
                ip: ip("1.1.1.1"),
                user_agent: UA.to_string(),
                timestamp: 1705312800 + i,
            });
        }
        engine.record_logout("alice");

        wait_for(|| store.count_active_sessions("alice").unwrap() == 0).await;
        assert_eq!(store.recent_sessions("alice", 20).unwrap().len(), 10);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_queue_depth_drains_to_zero() {
        let (engine, store) = engine();

        for user in ["alice", "bob", "carol"] {
            engine.record_login(user, ip("1.1.1.1"), UA);
        }

        wait_for(|| {
            !store.recent_sessions("carol", 1).unwrap().is_empty()
                && engine.queue_depth() == 0
        })
        .await;

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_terminate_bypasses_queue() {
        let (engine, store) = engine();

        engine.record_login("alice", ip("1.1.1.1"), UA);
        wait_for(|| store.count_active_sessions("alice").unwrap() == 1).await;

        engine.terminate_sessions("alice", None);
        assert_eq!(store.count_active_sessions("alice").unwrap(), 0);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_pending_events() {
        let (engine, store) = engine();

        for i in 0..5 {
            engine.record_login_event(LoginEvent {
                user_id: format!("user-{}", i),
                ip: ip("1.1.1.1"),
                user_agent: UA.to_string(),
                timestamp: 1705312800,
            });
        }
        engine.shutdown().await;

        for i in 0..5 {
            let user = format!("user-{}", i);
            assert_eq!(store.recent_sessions(&user, 1).unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_activity_update_through_engine() {
        let (engine, store) = engine();

        engine.record_login_event(LoginEvent {
            user_id: "alice".to_string(),
            ip: ip("1.1.1.1"),
            user_agent: UA.to_string(),
            timestamp: 1000,
        });
        engine.update_activity("alice", ip("1.1.1.1"));

        wait_for(|| {
            store
                .recent_sessions("alice", 1)
                .unwrap()
                .first()
                .map(|s| s.last_activity > 1000)
                .unwrap_or(false)
        })
        .await;

        engine.shutdown().await;
    }

    #[test]
    fn test_shard_stable() {
        assert_eq!(
            RiskEngine::shard_for("alice", 4),
            RiskEngine::shard_for("alice", 4)
        );
        assert!(RiskEngine::shard_for("alice", 4) < 4);
        assert_eq!(RiskEngine::shard_for("anyone", 1), 0);
    }
}

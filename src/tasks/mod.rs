//! Monitoring task registry.
//!
//! Holds one cancellation token per (session, target) and owns the lifecycle of
//! the polling loops in [`runner`]. Every read or write of the map happens under
//! a single mutex; the lock is never held across a network call.
//!
//! Digest timing is tracked per session: whichever loop of the session first
//! sees the report interval elapsed claims the digest, so a session with many
//! targets gets one digest per interval.

mod runner;

use crate::monitors::{normalize_url, ProbeResult, Prober};
use crate::transport::Notifier;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A user's monitoring context (one chat = one session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Timing and alerting policy shared by every loop.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub report_interval: Duration,
    /// Also alert when a target returns to 200 after a problem.
    pub alert_on_recovery: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30 * 60),
            report_interval: Duration::from_secs(30 * 60),
            alert_on_recovery: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    NotFound,
}

struct TaskHandle {
    token: CancellationToken,
    started_at: DateTime<Utc>,
}

struct SessionTasks {
    tasks: HashMap<String, TaskHandle>,
    last_digest: Instant,
}

impl SessionTasks {
    fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            last_digest: Instant::now(),
        }
    }

    fn sorted_targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self.tasks.keys().cloned().collect();
        targets.sort();
        targets
    }
}

struct RegistryInner {
    sessions: Mutex<HashMap<SessionId, SessionTasks>>,
    prober: Arc<dyn Prober>,
    notifier: Arc<dyn Notifier>,
    settings: MonitorSettings,
}

/// Shared handle to the registry. Cheap to clone; each polling loop holds one.
#[derive(Clone)]
pub struct TaskRegistry {
    inner: Arc<RegistryInner>,
}

impl TaskRegistry {
    pub fn new(prober: Arc<dyn Prober>, notifier: Arc<dyn Notifier>, settings: MonitorSettings) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: Mutex::new(HashMap::new()),
                prober,
                notifier,
                settings,
            }),
        }
    }

    // No operation panics while the guard is held, so a poisoned map is still consistent.
    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, SessionTasks>> {
        self.inner.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.inner.settings
    }

    pub(crate) fn prober(&self) -> &dyn Prober {
        self.inner.prober.as_ref()
    }

    /// Register `url` for `session` and spawn its polling loop.
    pub fn start(&self, session: SessionId, url: &str) -> StartOutcome {
        let url = normalize_url(url);
        let token = {
            let mut sessions = self.sessions();
            let entry = sessions.entry(session).or_insert_with(SessionTasks::new);
            if entry.tasks.contains_key(&url) {
                debug!("Registry: {} already monitored for session {}", url, session);
                return StartOutcome::AlreadyRunning;
            }
            let token = CancellationToken::new();
            entry.tasks.insert(
                url.clone(),
                TaskHandle {
                    token: token.clone(),
                    started_at: Utc::now(),
                },
            );
            token
        };

        info!("Registry: Started monitoring {} for session {}", url, session);
        tokio::spawn(runner::run(self.clone(), session, url, token));
        StartOutcome::Started
    }

    /// Stop monitoring one target. Removal is immediate; the loop notices the
    /// cancellation at its next check point.
    pub fn cancel(&self, session: SessionId, url: &str) -> CancelOutcome {
        let url = normalize_url(url);
        let removed = {
            let mut sessions = self.sessions();
            let Some(entry) = sessions.get_mut(&session) else {
                return CancelOutcome::NotFound;
            };
            let removed = entry.tasks.remove(&url);
            if entry.tasks.is_empty() {
                sessions.remove(&session);
            }
            removed
        };

        match removed {
            Some(handle) => {
                handle.token.cancel();
                info!(
                    "Registry: Cancelled {} for session {} (running since {})",
                    url, session, handle.started_at
                );
                CancelOutcome::Cancelled
            }
            None => CancelOutcome::NotFound,
        }
    }

    /// Stop every target of the session. Returns how many were cancelled.
    pub fn cancel_all(&self, session: SessionId) -> usize {
        let removed = self.sessions().remove(&session);
        let Some(entry) = removed else {
            return 0;
        };
        for handle in entry.tasks.values() {
            handle.token.cancel();
        }
        info!("Registry: Cancelled {} monitors for session {}", entry.tasks.len(), session);
        entry.tasks.len()
    }

    /// Snapshot of the session's targets.
    pub fn list(&self, session: SessionId) -> BTreeSet<String> {
        self.sessions()
            .get(&session)
            .map(|entry| entry.tasks.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Probe every current target of the session right now. The target set is
    /// copied under the lock; probes run concurrently outside it.
    pub async fn snapshot_results(&self, session: SessionId) -> Vec<ProbeResult> {
        let targets = self
            .sessions()
            .get(&session)
            .map(SessionTasks::sorted_targets)
            .unwrap_or_default();
        self.probe_all(&targets).await
    }

    /// Restart the session's digest clock after an on-demand digest. `checked_from`
    /// is when that digest's fan-out began, so a slow fan-out does not push the
    /// next periodic digest back.
    pub fn reset_digest_clock(&self, session: SessionId, checked_from: Instant) {
        if let Some(entry) = self.sessions().get_mut(&session) {
            entry.last_digest = checked_from;
        }
    }

    /// Claim the session digest if the report interval has elapsed. Returns the
    /// targets to include, or `None` when no digest is due.
    pub(crate) fn claim_digest(&self, session: SessionId) -> Option<Vec<String>> {
        let mut sessions = self.sessions();
        let entry = sessions.get_mut(&session)?;
        if entry.last_digest.elapsed() < self.inner.settings.report_interval {
            return None;
        }
        entry.last_digest = Instant::now();
        Some(entry.sorted_targets())
    }

    pub(crate) async fn probe_all(&self, targets: &[String]) -> Vec<ProbeResult> {
        let prober = self.prober();
        join_all(targets.iter().map(|url| prober.probe(url))).await
    }

    /// Send text to a session; failures are logged, never propagated.
    pub async fn notify(&self, session: SessionId, text: &str) {
        if let Err(e) = self.inner.notifier.send_text(session, text).await {
            warn!("Registry: Failed to notify session {}: {:#}", session, e);
        }
    }

    /// Cancel every loop of every session (process shutdown).
    pub fn shutdown(&self) -> usize {
        let drained: Vec<SessionTasks> = self.sessions().drain().map(|(_, entry)| entry).collect();
        let mut count = 0;
        for entry in drained {
            for handle in entry.tasks.values() {
                handle.token.cancel();
                count += 1;
            }
        }
        info!("Registry: Shutdown cancelled {} monitors", count);
        count
    }
}

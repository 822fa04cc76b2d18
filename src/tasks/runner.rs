//! Per-target polling loop.
//!
//! Probes immediately on start, then once per poll interval until cancelled.
//! Alerts fire on status transitions only; the digest is claimed from the
//! registry when the session's report interval has elapsed.

use super::{SessionId, TaskRegistry};
use crate::monitors::digest::{format_alert, format_digest, format_recovery};
use crate::monitors::{ProbeResult, STATUS_OK};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// State carried by one loop between iterations.
pub(super) struct MonitoringTask {
    pub session: SessionId,
    pub url: String,
    /// Compared against the next probe only.
    pub last_status: u16,
}

impl MonitoringTask {
    pub fn new(session: SessionId, url: String) -> Self {
        Self {
            session,
            url,
            last_status: STATUS_OK,
        }
    }

    /// Record a probe result and return the alert text for this transition, if any.
    /// The last known status is always updated, so a persisting problem alerts once.
    pub fn observe(&mut self, result: &ProbeResult, alert_on_recovery: bool) -> Option<String> {
        let previous = self.last_status;
        self.last_status = result.status_code;

        if result.status_code == previous {
            None
        } else if result.is_ok() {
            alert_on_recovery.then(|| format_recovery(result, previous))
        } else {
            Some(format_alert(result))
        }
    }
}

pub(super) async fn run(registry: TaskRegistry, session: SessionId, url: String, token: CancellationToken) {
    let settings = registry.settings().clone();
    let mut task = MonitoringTask::new(session, url);
    debug!("Monitor: Loop started for {} (session {})", task.url, task.session);

    loop {
        if token.is_cancelled() {
            break;
        }

        let result = registry.prober().probe(&task.url).await;
        if token.is_cancelled() {
            break;
        }

        if let Some(alert) = task.observe(&result, settings.alert_on_recovery) {
            info!(
                "Monitor: {} changed to {} (session {})",
                task.url, result.status_code, task.session
            );
            registry.notify(task.session, &alert).await;
        }

        if let Some(targets) = registry.claim_digest(task.session) {
            let results = registry.probe_all(&targets).await;
            if token.is_cancelled() {
                break;
            }
            debug!("Monitor: Sending digest of {} targets to session {}", results.len(), task.session);
            registry.notify(task.session, &format_digest(&results)).await;
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(settings.poll_interval) => {}
        }
    }

    info!("Monitor: Loop stopped for {} (session {})", task.url, task.session);
}

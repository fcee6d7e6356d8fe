//! Consecutive system-failure tracking and self-restart.
//!
//! One counter is shared by every [`FailureCategory`]. Reaching the threshold
//! with self-restart enabled runs the restart sequence exactly once:
//! announce, settle, wait the configured delay, spawn the replacement. The
//! replacement starts with fresh counters; nothing is carried over.

use crate::alerts::{Alerts, INFO_TITLE};
use crate::restart::{RestartError, Restarter};
use crate::throttle::ErrorCategory;
use nfcuid_core::AdvancedConfig;
use nfcuid_core::constants::RESTART_SETTLE_SECS;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// System-level operation whose failures count toward a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    PcscContext,
    ReaderEnumeration,
    StatusMonitoring,
    ReaderConnection,
}

impl FailureCategory {
    pub fn label(self) -> &'static str {
        match self {
            Self::PcscContext => "PC/SC context",
            Self::ReaderEnumeration => "reader enumeration",
            Self::StatusMonitoring => "reader status monitoring",
            Self::ReaderConnection => "reader connection",
        }
    }

    /// Alert category for user-visible reports of this failure.
    pub fn alert_category(self) -> ErrorCategory {
        match self {
            Self::PcscContext => ErrorCategory::PcscContext,
            Self::ReaderEnumeration => ErrorCategory::Reader,
            Self::StatusMonitoring | Self::ReaderConnection => ErrorCategory::Card,
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// When and how to restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub enabled: bool,
    pub threshold: u32,
    pub settle: Duration,
    pub delay: Duration,
}

impl RestartPolicy {
    pub fn from_config(config: &AdvancedConfig) -> Self {
        Self {
            enabled: config.self_restart,
            threshold: config.max_context_failures.max(1),
            settle: Duration::from_secs(RESTART_SETTLE_SECS),
            delay: config.restart_delay(),
        }
    }
}

/// Result of recording a failure.
#[derive(Debug)]
pub enum FailureOutcome {
    /// Counted; below the threshold or self-restart disabled.
    Tracked { count: u32, threshold: u32 },

    /// The replacement process was started. The caller must unwind.
    RestartTriggered { pid: u32 },

    /// A restart was already triggered by this process.
    RestartPending,

    /// The replacement could not be started.
    RestartFailed(RestartError),
}

impl FailureOutcome {
    /// True if the caller must stop treating the failure as retryable.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Tracked { .. })
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    count: u32,
    restart_triggered: bool,
}

pub struct FailureTracker {
    state: Mutex<TrackerState>,
    policy: RestartPolicy,
    alerts: Arc<Alerts>,
    restarter: Arc<dyn Restarter>,
}

impl fmt::Debug for FailureTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureTracker")
            .field("state", &self.state)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl FailureTracker {
    pub fn new(policy: RestartPolicy, alerts: Arc<Alerts>, restarter: Arc<dyn Restarter>) -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            policy,
            alerts,
            restarter,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn policy(&self) -> &RestartPolicy {
        &self.policy
    }

    /// Consecutive failures since the last success.
    pub fn count(&self) -> u32 {
        self.lock().count
    }

    pub fn restart_triggered(&self) -> bool {
        self.lock().restart_triggered
    }

    /// Count a failure and restart the process if the threshold is reached.
    pub async fn record_failure(
        &self,
        category: FailureCategory,
        error: &dyn fmt::Display,
    ) -> FailureOutcome {
        let (count, restart) = {
            let mut state = self.lock();
            if state.restart_triggered {
                tracing::debug!(%category, "failure ignored, restart already triggered");
                return FailureOutcome::RestartPending;
            }

            state.count = state.count.saturating_add(1);
            let restart = self.policy.enabled && state.count >= self.policy.threshold;
            if restart {
                state.restart_triggered = true;
            }
            (state.count, restart)
        };

        tracing::warn!(
            %category,
            count,
            threshold = self.policy.threshold,
            error = %error,
            "PC/SC failure"
        );

        if restart {
            self.restart(category).await
        } else {
            FailureOutcome::Tracked {
                count,
                threshold: self.policy.threshold,
            }
        }
    }

    /// Reset the counter after a successful context establishment.
    pub fn record_success(&self) {
        let mut state = self.lock();
        if state.count > 0 {
            tracing::info!(
                previous = state.count,
                "PC/SC context established, resetting failure count"
            );
            state.count = 0;
        }
    }

    async fn restart(&self, category: FailureCategory) -> FailureOutcome {
        let message = format!(
            "Maximum {} failures reached ({}). Restarting application...",
            category, self.policy.threshold
        );
        tracing::error!(%category, threshold = self.policy.threshold, "{}", message);
        self.alerts.notify_info(INFO_TITLE, &message);

        tokio::time::sleep(self.policy.settle).await;
        if !self.policy.delay.is_zero() {
            tracing::info!(delay_secs = self.policy.delay.as_secs(), "waiting before restart");
            tokio::time::sleep(self.policy.delay).await;
        }

        match self.restarter.spawn_replacement() {
            Ok(pid) => {
                tracing::info!(pid, "replacement process started, exiting current instance");
                self.alerts.notify_info(INFO_TITLE, "Application restart initiated");
                FailureOutcome::RestartTriggered { pid }
            }
            Err(e) => {
                tracing::error!(error = %e, "self-restart failed");
                self.alerts
                    .notify_error(ErrorCategory::General, &format!("Failed to restart application: {}", e));
                FailureOutcome::RestartFailed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{RecordingNotifier, RecordingRestarter};
    use nfcuid_core::NotificationConfig;
    use tokio::time::Instant;

    fn tracker(threshold: u32, enabled: bool) -> (FailureTracker, RecordingRestarter, RecordingNotifier) {
        let notifier = RecordingNotifier::new();
        let restarter = RecordingRestarter::new();
        let alerts = Arc::new(Alerts::new(
            Arc::new(notifier.clone()),
            NotificationConfig::default(),
        ));
        let policy = RestartPolicy {
            enabled,
            threshold,
            settle: Duration::from_secs(2),
            delay: Duration::from_secs(10),
        };
        (
            FailureTracker::new(policy, alerts, Arc::new(restarter.clone())),
            restarter,
            notifier,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_on_threshold_only() {
        let (tracker, restarter, _) = tracker(5, true);

        for expected in 1..=4 {
            let outcome = tracker.record_failure(FailureCategory::PcscContext, &"no service").await;
            assert!(
                matches!(outcome, FailureOutcome::Tracked { count, threshold: 5 } if count == expected)
            );
            assert_eq!(restarter.spawns(), 0);
        }

        let outcome = tracker.record_failure(FailureCategory::PcscContext, &"no service").await;
        assert!(matches!(outcome, FailureOutcome::RestartTriggered { .. }));
        assert_eq!(restarter.spawns(), 1);

        let outcome = tracker.record_failure(FailureCategory::PcscContext, &"no service").await;
        assert!(matches!(outcome, FailureOutcome::RestartPending));
        assert_eq!(restarter.spawns(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_counter() {
        let (tracker, restarter, _) = tracker(5, true);

        for _ in 0..4 {
            tracker.record_failure(FailureCategory::PcscContext, &"no service").await;
        }
        tracker.record_success();
        assert_eq!(tracker.count(), 0);

        for _ in 0..4 {
            let outcome = tracker.record_failure(FailureCategory::PcscContext, &"no service").await;
            assert!(!outcome.is_terminal());
        }
        assert_eq!(restarter.spawns(), 0);
        assert_eq!(tracker.count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_is_shared_across_categories() {
        let (tracker, restarter, _) = tracker(3, true);

        tracker.record_failure(FailureCategory::PcscContext, &"a").await;
        tracker.record_failure(FailureCategory::StatusMonitoring, &"b").await;
        let outcome = tracker.record_failure(FailureCategory::ReaderConnection, &"c").await;

        assert!(matches!(outcome, FailureOutcome::RestartTriggered { .. }));
        assert_eq!(restarter.spawns(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_restart_only_counts() {
        let (tracker, restarter, _) = tracker(2, false);

        for _ in 0..5 {
            let outcome = tracker.record_failure(FailureCategory::ReaderEnumeration, &"gone").await;
            assert!(!outcome.is_terminal());
        }
        assert_eq!(tracker.count(), 5);
        assert_eq!(restarter.spawns(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_sequence_announces_and_waits() {
        let (tracker, _, notifier) = tracker(1, true);
        let start = Instant::now();

        tracker.record_failure(FailureCategory::PcscContext, &"no service").await;

        assert_eq!(start.elapsed(), Duration::from_secs(12));
        let bodies: Vec<_> = notifier.notifications().into_iter().map(|n| n.body).collect();
        assert_eq!(
            bodies,
            vec![
                "Maximum PC/SC context failures reached (1). Restarting application...".to_string(),
                "Application restart initiated".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_failure_is_surfaced() {
        let (tracker, restarter, notifier) = tracker(1, true);
        restarter.fail_spawns(true);

        let outcome = tracker.record_failure(FailureCategory::ReaderConnection, &"reset").await;

        assert!(matches!(outcome, FailureOutcome::RestartFailed(_)));
        assert!(
            notifier
                .notifications()
                .iter()
                .any(|n| n.body.starts_with("Failed to restart application"))
        );
    }
}

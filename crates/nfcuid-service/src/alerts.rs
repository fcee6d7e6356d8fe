//! User-facing notifications.
//!
//! [`Alerts`] is the only place that decides whether something reaches the
//! operator. It applies the configuration switches and the
//! [`NotificationThrottle`], then hands the result to a [`Notifier`], which
//! delivers unconditionally.

use crate::throttle::{ErrorCategory, NotificationThrottle};
use nfcuid_core::NotificationConfig;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub const INFO_TITLE: &str = "NFC reader";
pub const ERROR_TITLE: &str = "NFC reader error";
pub const SYSTEM_ERROR_TITLE: &str = "NFC system error";
pub const SUCCESS_TITLE: &str = "NFC card read successful";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Error,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.body)
    }
}

/// Audible feedback after a card was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCue {
    Success,
    Error,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Delivery back-end.
pub trait Notifier: Send + Sync {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;

    fn play_cue(&self, _cue: AudioCue) {}
}

/// Notifier that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        match notification.kind {
            NotificationKind::Error => tracing::warn!(title = %notification.title, "{}", notification.body),
            _ => tracing::info!(title = %notification.title, "{}", notification.body),
        }
        Ok(())
    }
}

/// Notifier backed by the platform notification service.
#[cfg(feature = "desktop-notify")]
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    app_name: String,
}

#[cfg(feature = "desktop-notify")]
impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

#[cfg(feature = "desktop-notify")]
impl Notifier for DesktopNotifier {
    /// Hands the notification to the platform service without waiting for it.
    ///
    /// `show()` talks to the session bus synchronously, so delivery failures
    /// are logged from the blocking thread instead of returned.
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut toast = notify_rust::Notification::new();
        toast
            .appname(&self.app_name)
            .summary(&notification.title)
            .body(&notification.body);
        let title = notification.title.clone();
        run_detached(move || {
            if let Err(e) = toast.show() {
                tracing::warn!(error = %e, %title, "failed to deliver desktop notification");
            }
        });
        Ok(())
    }

    fn play_cue(&self, cue: AudioCue) {
        use std::io::Write;

        // One bell for success, two for an error.
        let bells: &[u8] = match cue {
            AudioCue::Success => b"\x07",
            AudioCue::Error => b"\x07\x07",
        };
        let mut stderr = std::io::stderr();
        if let Err(e) = stderr.write_all(bells).and_then(|_| stderr.flush()) {
            tracing::debug!(error = %e, "failed to ring terminal bell");
        }
    }
}

/// Run `work` on the blocking pool when called inside a runtime, inline otherwise.
#[cfg_attr(not(feature = "desktop-notify"), allow(dead_code))]
fn run_detached<F>(work: F)
where
    F: FnOnce() + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => drop(handle.spawn_blocking(work)),
        Err(_) => work(),
    }
}

/// Alert front-end shared by the service and the failure tracker.
pub struct Alerts {
    throttle: NotificationThrottle,
    notifier: Arc<dyn Notifier>,
    config: NotificationConfig,
}

impl fmt::Debug for Alerts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Alerts")
            .field("throttle", &self.throttle)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Alerts {
    pub fn new(notifier: Arc<dyn Notifier>, config: NotificationConfig) -> Self {
        Self {
            throttle: NotificationThrottle::new(),
            notifier,
            config,
        }
    }

    pub fn throttle(&self) -> &NotificationThrottle {
        &self.throttle
    }

    /// Informational notice. Never throttled.
    pub fn notify_info(&self, title: &str, body: &str) -> bool {
        if !self.config.enabled {
            return false;
        }
        self.deliver(Notification {
            kind: NotificationKind::Info,
            title: title.to_string(),
            body: body.to_string(),
        })
    }

    /// Throttled error about a single operation.
    pub fn notify_error(&self, category: ErrorCategory, body: &str) -> bool {
        self.throttled(ERROR_TITLE, category, body)
    }

    /// Throttled error about a system-level condition.
    pub fn notify_error_throttled(&self, category: ErrorCategory, body: &str) -> bool {
        self.throttled(SYSTEM_ERROR_TITLE, category, body)
    }

    /// Success notice, delivered only when recovering from earlier errors.
    ///
    /// Delivery clears every error count.
    pub fn notify_success(&self, body: &str) -> bool {
        if !self.config.enabled || !self.config.show_success {
            return false;
        }
        if !self.throttle.take_recovery() {
            return false;
        }
        self.deliver(Notification {
            kind: NotificationKind::Success,
            title: SUCCESS_TITLE.to_string(),
            body: body.to_string(),
        })
    }

    pub fn play_cue(&self, cue: AudioCue) {
        self.notifier.play_cue(cue);
    }

    fn throttled(&self, title: &str, category: ErrorCategory, body: &str) -> bool {
        if !self.config.enabled || !self.config.show_errors {
            return false;
        }

        let decision = self.throttle.record(category);
        if !decision.notify {
            tracing::debug!(
                %category,
                count = decision.previous_count + 1,
                "error notification throttled"
            );
            return false;
        }

        let title = if decision.previous_count > 1 {
            format!("{} (x{})", title, decision.previous_count)
        } else {
            title.to_string()
        };

        self.deliver(Notification {
            kind: NotificationKind::Error,
            title,
            body: body.to_string(),
        })
    }

    fn deliver(&self, notification: Notification) -> bool {
        match self.notifier.deliver(&notification) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, title = %notification.title, "failed to deliver notification");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingNotifier;

    fn alerts(config: NotificationConfig) -> (Alerts, RecordingNotifier) {
        let notifier = RecordingNotifier::new();
        (Alerts::new(Arc::new(notifier.clone()), config), notifier)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_detached_work_leaves_the_runtime_thread() {
        let caller = std::thread::current().id();
        let (tx, rx) = tokio::sync::oneshot::channel();
        run_detached(move || {
            let _ = tx.send(std::thread::current().id());
        });
        let worker = rx.await.unwrap();
        assert_ne!(worker, caller);
    }

    #[test]
    fn test_detached_work_runs_inline_without_runtime() {
        let caller = std::thread::current().id();
        let (tx, rx) = std::sync::mpsc::channel();
        run_detached(move || tx.send(std::thread::current().id()).unwrap());
        assert_eq!(rx.try_recv().unwrap(), caller);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_without_prior_errors_is_silent() {
        let (alerts, notifier) = alerts(NotificationConfig::default());

        assert!(!alerts.notify_success("Card UID: 04ae65ca"));
        assert!(notifier.notifications().is_empty());
        assert!(!alerts.throttle().has_errors());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_error_clears_counts() {
        let (alerts, notifier) = alerts(NotificationConfig::default());

        alerts.notify_error_throttled(ErrorCategory::Card, "card could not be read");
        assert!(alerts.notify_success("Card UID: 04ae65ca"));
        assert!(!alerts.throttle().has_errors());

        let kinds: Vec<_> = notifier.notifications().iter().map(|n| n.kind).collect();
        assert_eq!(kinds, vec![NotificationKind::Error, NotificationKind::Success]);

        assert!(!alerts.notify_success("Card UID: 04ae65ca"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_title_suffix() {
        let (alerts, notifier) = alerts(NotificationConfig::default());

        // Service class notifies at counts 0, 1 and 5.
        for _ in 0..6 {
            alerts.notify_error_throttled(ErrorCategory::Service, "connection lost");
        }

        let titles: Vec<_> = notifier.notifications().into_iter().map(|n| n.title).collect();
        assert_eq!(
            titles,
            vec![
                SYSTEM_ERROR_TITLE.to_string(),
                SYSTEM_ERROR_TITLE.to_string(),
                format!("{} (x5)", SYSTEM_ERROR_TITLE),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_suppresses_everything() {
        let config = NotificationConfig {
            enabled: false,
            ..NotificationConfig::default()
        };
        let (alerts, notifier) = alerts(config);

        alerts.notify_info(INFO_TITLE, "started");
        alerts.notify_error(ErrorCategory::Format, "fallback");
        alerts.notify_success("ok");

        assert!(notifier.notifications().is_empty());
        assert!(!alerts.throttle().has_errors());
    }

    #[tokio::test(start_paused = true)]
    async fn test_show_success_off_keeps_counts() {
        let config = NotificationConfig {
            show_success: false,
            ..NotificationConfig::default()
        };
        let (alerts, notifier) = alerts(config);

        alerts.notify_error(ErrorCategory::Keyboard, "write failed");
        assert!(!alerts.notify_success("ok"));

        assert_eq!(notifier.notifications().len(), 1);
        assert!(alerts.throttle().has_errors());
    }

    #[tokio::test(start_paused = true)]
    async fn test_show_errors_off_leaves_throttle_untouched() {
        let config = NotificationConfig {
            show_errors: false,
            ..NotificationConfig::default()
        };
        let (alerts, notifier) = alerts(config);

        alerts.notify_error(ErrorCategory::Card, "unreadable");
        alerts.notify_info(INFO_TITLE, "started");

        assert_eq!(notifier.notifications().len(), 1);
        assert!(!alerts.throttle().has_errors());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_failure_is_not_fatal() {
        let (alerts, notifier) = alerts(NotificationConfig::default());
        notifier.fail_deliveries(true);

        assert!(!alerts.notify_error(ErrorCategory::General, "boom"));
        assert_eq!(alerts.throttle().occurrences(ErrorCategory::General), 1);
    }
}

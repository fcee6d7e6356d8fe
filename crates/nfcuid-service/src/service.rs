//! Reader service: the supervising loop.
//!
//! Each iteration opens a session through the [`CardPresenceWatcher`] and
//! scans cards until something fails. The service is the single decision
//! point for what the operator sees: it turns watcher errors into throttled
//! notifications and decides whether to start another iteration.

use crate::alerts::{Alerts, AudioCue, INFO_TITLE};
use crate::error::{ServiceError, ServiceExit, WatcherError};
use crate::keyboard::KeystrokeSink;
use crate::selection::DevicePrompt;
use crate::throttle::ErrorCategory;
use crate::watcher::CardPresenceWatcher;
use nfcuid_core::{Config, DeviceSelection, OutputFormat, format_uid};
use nfcuid_hardware::SmartcardBackend;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const MSG_STARTED: &str = "Service started, ready to read cards";
const MSG_CONNECTION_LOST: &str = "Connection to the NFC reader lost. Please check the device.";
const MSG_CARD_NOT_DETECTED: &str = "Card could not be detected. Please check the NFC reader.";
const MSG_CARD_NOT_READ: &str = "Card could not be read. Please try again.";
const MSG_FORMAT_FALLBACK: &str = "Card ID could not be converted to decimal. Using hex format.";
const MSG_KEYBOARD_FAILED: &str = "Card ID could not be typed. Is the cursor in the right field?";
const MSG_RELEASE_FAILED: &str = "Error while waiting for card removal. The card was read anyway.";

pub struct ReaderService<B, K, P>
where
    B: SmartcardBackend,
    K: KeystrokeSink,
    P: DevicePrompt,
{
    watcher: CardPresenceWatcher<B>,
    sink: K,
    prompt: P,
    alerts: Arc<Alerts>,
    format: OutputFormat,
    selection: DeviceSelection,
    auto_reconnect: bool,
    reconnect_delay: Duration,
    auto_restarted: bool,
}

impl<B, K, P> ReaderService<B, K, P>
where
    B: SmartcardBackend,
    K: KeystrokeSink,
    P: DevicePrompt,
{
    pub fn new(
        config: &Config,
        watcher: CardPresenceWatcher<B>,
        sink: K,
        prompt: P,
        alerts: Arc<Alerts>,
    ) -> Self {
        Self {
            watcher,
            sink,
            prompt,
            alerts,
            format: config.output_format(),
            selection: config.device_selection(),
            auto_reconnect: config.advanced.auto_reconnect,
            reconnect_delay: config.advanced.reconnect_delay(),
            auto_restarted: false,
        }
    }

    /// Mark this process as started by a self-restart.
    pub fn with_auto_restart(mut self, auto_restarted: bool) -> Self {
        self.auto_restarted = auto_restarted;
        self
    }

    pub fn watcher(&self) -> &CardPresenceWatcher<B> {
        &self.watcher
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Current device selection; a prompted answer replaces `Prompt`.
    pub fn selection(&self) -> DeviceSelection {
        self.selection
    }

    /// Run until cancelled, restarted, or stopped by an error.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<ServiceExit, ServiceError> {
        if self.auto_restarted {
            tracing::info!("service started by automatic restart");
        } else {
            self.alerts.notify_info(INFO_TITLE, MSG_STARTED);
        }
        tracing::info!("service starting main loop");

        loop {
            let error = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("shutdown requested, stopping service");
                    return Ok(ServiceExit::Cancelled);
                }
                error = self.run_session() => error,
            };

            if error.is_terminal() {
                return match error {
                    WatcherError::RestartTriggered => {
                        tracing::info!("replacement process running, stopping service");
                        Ok(ServiceExit::Restarted)
                    }
                    other => Err(other.into()),
                };
            }

            tracing::error!(error = %error, category = %error.category(), "service loop error");

            if error.is_fatal_configuration() {
                self.alerts.notify_error(ErrorCategory::Reader, &error.to_string());
                return Err(ServiceError::Stopped(error));
            }

            self.alerts
                .notify_error_throttled(ErrorCategory::Service, MSG_CONNECTION_LOST);

            if !self.auto_reconnect {
                tracing::error!("service stopped, auto-reconnect disabled");
                return Err(ServiceError::Stopped(error));
            }

            tracing::warn!(
                delay_secs = self.reconnect_delay.as_secs(),
                "attempting to restart service loop"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("shutdown requested, stopping service");
                    return Ok(ServiceExit::Cancelled);
                }
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
    }

    /// One iteration: open a session and scan until it fails.
    async fn run_session(&mut self) -> WatcherError {
        tracing::info!("starting service loop");

        let session = match self.watcher.open_session().await {
            Ok(session) => session,
            Err(e) => return e,
        };
        let error = self.scan(&session).await;
        self.watcher.close_session(session).await;
        error
    }

    async fn scan(&mut self, session: &B::Session) -> WatcherError {
        let readers = match self.watcher.list_readers(session).await {
            Ok(readers) => readers,
            Err(e) => return e,
        };

        let reader = match self
            .watcher
            .select_device(&readers, &mut self.selection, &mut self.prompt)
            .await
        {
            Ok(reader) => reader,
            Err(e) => return e,
        };

        tracing::info!(device = %reader, "ready for card scanning");
        loop {
            tracing::info!(device = %reader, "waiting for card");
            if let Err(e) = self.watcher.wait_for_card(session, &reader).await {
                if e.is_terminal() {
                    return e;
                }
                tracing::error!(device = %reader, error = %e, "card detection failed");
                self.alerts
                    .notify_error_throttled(ErrorCategory::Card, MSG_CARD_NOT_DETECTED);
                if self.auto_reconnect {
                    tracing::warn!("retrying card detection");
                    continue;
                }
                return e;
            }

            tracing::info!(device = %reader, "card detected");
            if let Err(e) = self.process_card(session, &reader).await {
                if e.is_terminal() {
                    return e;
                }
                tracing::error!(device = %reader, error = %e, "card processing failed");
                self.alerts
                    .notify_error_throttled(ErrorCategory::Card, MSG_CARD_NOT_READ);
            }
        }
    }

    /// Read, format and emit one card, then wait for its removal.
    async fn process_card(&mut self, session: &B::Session, reader: &str) -> Result<(), WatcherError> {
        let uid = self.watcher.read_uid(session, reader).await?;
        tracing::info!(uid = %uid, device = reader, "card read");

        let formatted = format_uid(uid, &self.format);
        if let Some(fallback) = formatted.fallback {
            tracing::warn!(%fallback, "decimal output not possible");
            self.alerts.notify_error(ErrorCategory::Format, MSG_FORMAT_FALLBACK);
        }

        match self.sink.write(&formatted.text).await {
            Ok(()) => {
                tracing::info!(output = ?formatted.text, device = reader, "card processed");
                self.alerts
                    .notify_success(&format!("Card UID: {}", formatted.text));
                self.alerts.play_cue(AudioCue::Success);
            }
            Err(e) => {
                tracing::error!(error = %e, output = ?formatted.text, device = reader, "keyboard output failed");
                self.alerts
                    .notify_error_throttled(ErrorCategory::Keyboard, MSG_KEYBOARD_FAILED);
                self.alerts.play_cue(AudioCue::Error);
            }
        }

        tracing::info!(device = reader, "waiting for card removal");
        match self.watcher.wait_for_release(session, reader).await {
            Ok(()) => tracing::info!(device = reader, "card removed"),
            Err(e) if e.is_terminal() => return Err(e),
            Err(e) => {
                tracing::error!(device = reader, error = %e, "error waiting for card removal");
                self.alerts.notify_error(ErrorCategory::General, MSG_RELEASE_FAILED);
            }
        }
        Ok(())
    }
}

//! Common test utilities for reader service integration tests.
//!
//! [`harness`] wires a [`ReaderService`] to the mock smartcard backend and
//! the recording collaborators, and returns every handle a test needs to
//! script hardware events and inspect what the operator would have seen.
//!
//! Tests run with paused time; [`wait_until`] polls in small virtual-time
//! steps so the service and the test script interleave deterministically.

#![allow(dead_code)]

use nfcuid_core::Config;
use nfcuid_hardware::mock::{MockSmartcard, MockSmartcardHandle};
use nfcuid_service::mock::{RecordingKeyboard, RecordingNotifier, RecordingRestarter, ScriptedPrompt};
use nfcuid_service::{Alerts, CardPresenceWatcher, FailureTracker, ReaderService, RestartPolicy, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;

pub const READER: &str = "ACS ACR122U PICC Interface 00 00";
pub const SECOND_READER: &str = "Identiv uTrust 3700 F 01 00";

pub const UID: [u8; 4] = [0x04, 0xAE, 0x65, 0xCA];

/// Hex output, hyphen separated, Enter at the end; fast retries.
pub const HEX_CONFIG: &str = "
nfc:
  device: 1
  in_char: hyphen
  end_char: enter
advanced:
  retry_attempts: 3
  reconnect_delay: 1
  restart_delay: 0
";

pub type TestService = ReaderService<MockSmartcard, RecordingKeyboard, ScriptedPrompt>;

pub struct Harness {
    pub service: TestService,
    pub handle: MockSmartcardHandle,
    pub keyboard: RecordingKeyboard,
    pub notifier: RecordingNotifier,
    pub restarter: RecordingRestarter,
    pub prompt: ScriptedPrompt,
    pub alerts: Arc<Alerts>,
    pub tracker: Arc<FailureTracker>,
}

pub fn config(yaml: &str) -> Config {
    Config::from_yaml_str(yaml).unwrap()
}

pub fn harness(config: Config, readers: &[&str], answers: impl IntoIterator<Item = usize>) -> Harness {
    let (backend, handle) = MockSmartcard::new(readers);
    let notifier = RecordingNotifier::new();
    let restarter = RecordingRestarter::new();
    let keyboard = RecordingKeyboard::new();
    let prompt = ScriptedPrompt::new(answers);

    let alerts = Arc::new(Alerts::new(
        Arc::new(notifier.clone()),
        config.notifications.clone(),
    ));
    let tracker = Arc::new(FailureTracker::new(
        RestartPolicy::from_config(&config.advanced),
        Arc::clone(&alerts),
        Arc::new(restarter.clone()),
    ));
    let watcher = CardPresenceWatcher::new(
        backend,
        RetryPolicy::from_config(&config.advanced),
        Arc::clone(&tracker),
    );
    let service = ReaderService::new(
        &config,
        watcher,
        keyboard.clone(),
        prompt.clone(),
        Arc::clone(&alerts),
    );

    Harness {
        service,
        handle,
        keyboard,
        notifier,
        restarter,
        prompt,
        alerts,
        tracker,
    }
}

/// Poll `condition` every 10ms of virtual time, up to ten virtual minutes.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..60_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within ten minutes of virtual time");
}

/// Give the service a moment of virtual time to react.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

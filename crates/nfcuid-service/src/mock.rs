//! Recording and scripted collaborators for tests and development.
//!
//! Every type here is cheap to clone and clones share state, so a test keeps
//! one clone for assertions and hands the other to the code under test.

use crate::alerts::{AudioCue, Notification, NotificationKind, Notifier, NotifyError};
use crate::error::WatcherError;
use crate::keyboard::{KeystrokeError, KeystrokeSink};
use crate::restart::{RestartError, Restarter};
use crate::selection::{DevicePrompt, parse_choice};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct NotifierState {
    delivered: Vec<Notification>,
    cues: Vec<AudioCue>,
    fail: bool,
}

/// Notifier that records every delivery.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    state: Arc<Mutex<NotifierState>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent deliveries fail (nothing is recorded while failing).
    pub fn fail_deliveries(&self, fail: bool) {
        lock(&self.state).fail = fail;
    }

    pub fn notifications(&self) -> Vec<Notification> {
        lock(&self.state).delivered.clone()
    }

    pub fn of_kind(&self, kind: NotificationKind) -> Vec<Notification> {
        lock(&self.state)
            .delivered
            .iter()
            .filter(|n| n.kind == kind)
            .cloned()
            .collect()
    }

    pub fn cues(&self) -> Vec<AudioCue> {
        lock(&self.state).cues.clone()
    }
}

impl Notifier for RecordingNotifier {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut state = lock(&self.state);
        if state.fail {
            return Err(NotifyError::Delivery("notification service unavailable".into()));
        }
        state.delivered.push(notification.clone());
        Ok(())
    }

    fn play_cue(&self, cue: AudioCue) {
        lock(&self.state).cues.push(cue);
    }
}

#[derive(Debug, Default)]
struct KeyboardState {
    written: Vec<String>,
    fail: bool,
}

/// Keystroke sink that records what was typed.
#[derive(Debug, Clone, Default)]
pub struct RecordingKeyboard {
    state: Arc<Mutex<KeyboardState>>,
}

impl RecordingKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail.
    pub fn fail_writes(&self, fail: bool) {
        lock(&self.state).fail = fail;
    }

    pub fn written(&self) -> Vec<String> {
        lock(&self.state).written.clone()
    }
}

impl KeystrokeSink for RecordingKeyboard {
    async fn write(&mut self, text: &str) -> Result<(), KeystrokeError> {
        let mut state = lock(&self.state);
        if state.fail {
            return Err(KeystrokeError::Write("no focused input".into()));
        }
        state.written.push(text.to_string());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RestarterState {
    spawns: usize,
    fail: bool,
}

/// Restarter that counts spawns instead of starting processes.
#[derive(Debug, Clone, Default)]
pub struct RecordingRestarter {
    state: Arc<Mutex<RestarterState>>,
}

impl RecordingRestarter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_spawns(&self, fail: bool) {
        lock(&self.state).fail = fail;
    }

    /// Successful spawns so far.
    pub fn spawns(&self) -> usize {
        lock(&self.state).spawns
    }
}

impl Restarter for RecordingRestarter {
    fn spawn_replacement(&self) -> Result<u32, RestartError> {
        let mut state = lock(&self.state);
        if state.fail {
            return Err(RestartError::Spawn(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "spawn refused",
            )));
        }
        state.spawns += 1;
        Ok(40_000 + state.spawns as u32)
    }
}

/// Device prompt answering from a fixed script.
///
/// Answers outside the reader range are skipped like invalid operator input;
/// an exhausted script behaves like closed stdin.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompt {
    answers: Arc<Mutex<VecDeque<usize>>>,
    asked: Arc<Mutex<usize>>,
}

impl ScriptedPrompt {
    pub fn new(answers: impl IntoIterator<Item = usize>) -> Self {
        Self {
            answers: Arc::new(Mutex::new(answers.into_iter().collect())),
            asked: Arc::new(Mutex::new(0)),
        }
    }

    /// Number of times a choice was requested.
    pub fn asked(&self) -> usize {
        *lock(&self.asked)
    }
}

impl DevicePrompt for ScriptedPrompt {
    async fn choose(&mut self, readers: &[String]) -> Result<usize, WatcherError> {
        *lock(&self.asked) += 1;
        let mut answers = lock(&self.answers);
        while let Some(answer) = answers.pop_front() {
            if let Ok(number) = parse_choice(&answer.to_string(), readers.len()) {
                return Ok(number);
            }
        }
        Err(WatcherError::PromptClosed)
    }
}

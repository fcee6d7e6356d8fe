//! Keystroke sinks.
//!
//! A sink receives the formatted UID text and types it. A write either
//! fully succeeds or fails; partial output is not reported.

use std::io::{self, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeystrokeError {
    #[error("failed to initialize keyboard: {0}")]
    Init(String),

    #[error("keyboard output failed: {0}")]
    Write(String),
}

impl From<io::Error> for KeystrokeError {
    fn from(e: io::Error) -> Self {
        Self::Write(e.to_string())
    }
}

/// Destination for formatted UID text.
///
/// Not `Send`: platform keyboard handles are often bound to the thread that
/// created them, and the service drives its sink from a single task.
#[allow(async_fn_in_trait)]
pub trait KeystrokeSink {
    async fn write(&mut self, text: &str) -> Result<(), KeystrokeError>;
}

/// Sink that prints the text to standard output.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl KeystrokeSink for StdoutSink {
    async fn write(&mut self, text: &str) -> Result<(), KeystrokeError> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }
}

type WriteJob = (String, tokio::sync::oneshot::Sender<Result<(), KeystrokeError>>);

/// Blocking writer owned by a dedicated OS thread.
///
/// The writer is built and used on that thread only, so it need not be
/// `Send`. The thread exits once the handle is dropped.
#[cfg_attr(not(feature = "keyboard-enigo"), allow(dead_code))]
#[derive(Debug)]
struct WriterThread {
    jobs: std::sync::mpsc::Sender<WriteJob>,
}

#[cfg_attr(not(feature = "keyboard-enigo"), allow(dead_code))]
impl WriterThread {
    fn spawn<W, I, F>(name: &str, init: I, mut write: F) -> Result<Self, KeystrokeError>
    where
        I: FnOnce() -> Result<W, KeystrokeError> + Send + 'static,
        F: FnMut(&mut W, &str) -> Result<(), KeystrokeError> + Send + 'static,
    {
        let (jobs, queue) = std::sync::mpsc::channel::<WriteJob>();
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel(1);

        std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut writer = match init() {
                    Ok(writer) => {
                        let _ = ready_tx.send(Ok(()));
                        writer
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                for (text, reply) in queue {
                    let _ = reply.send(write(&mut writer, &text));
                }
            })
            .map_err(|e| KeystrokeError::Init(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| KeystrokeError::Init("writer thread exited during startup".to_string()))??;
        Ok(Self { jobs })
    }

    async fn write(&self, text: &str) -> Result<(), KeystrokeError> {
        let stopped = || KeystrokeError::Write("writer thread stopped".to_string());
        let (reply, done) = tokio::sync::oneshot::channel();
        self.jobs.send((text.to_string(), reply)).map_err(|_| stopped())?;
        done.await.map_err(|_| stopped())?
    }
}

/// Sink that types the text as synthetic keyboard input.
#[cfg(feature = "keyboard-enigo")]
pub struct EnigoKeyboard {
    writer: WriterThread,
    warmup: Option<std::time::Duration>,
}

#[cfg(feature = "keyboard-enigo")]
impl std::fmt::Debug for EnigoKeyboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnigoKeyboard")
            .field("warmup", &self.warmup)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "keyboard-enigo")]
impl EnigoKeyboard {
    /// Virtual input devices on Linux need a moment before the first event
    /// is accepted.
    const LINUX_WARMUP: std::time::Duration = std::time::Duration::from_secs(2);

    pub fn new() -> Result<Self, KeystrokeError> {
        use enigo::Keyboard;

        let writer = WriterThread::spawn(
            "nfcuid-keyboard",
            || {
                enigo::Enigo::new(&enigo::Settings::default())
                    .map_err(|e| KeystrokeError::Init(e.to_string()))
            },
            |enigo: &mut enigo::Enigo, text: &str| {
                enigo
                    .text(text)
                    .map_err(|e| KeystrokeError::Write(e.to_string()))
            },
        )?;

        let warmup = cfg!(target_os = "linux").then_some(Self::LINUX_WARMUP);
        tracing::info!("keyboard initialized");

        Ok(Self { writer, warmup })
    }
}

#[cfg(feature = "keyboard-enigo")]
impl KeystrokeSink for EnigoKeyboard {
    async fn write(&mut self, text: &str) -> Result<(), KeystrokeError> {
        if let Some(delay) = self.warmup.take() {
            tracing::debug!(delay_ms = delay.as_millis() as u64, "applying keyboard warm-up delay");
            tokio::time::sleep(delay).await;
        }

        self.writer.write(text).await
    }
}

/// Enum wrapper for sink dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyKeystrokeSink {
    Stdout(StdoutSink),
    #[cfg(feature = "keyboard-enigo")]
    Enigo(EnigoKeyboard),
}

impl AnyKeystrokeSink {
    /// Best sink compiled into this build.
    pub fn platform_default() -> Result<Self, KeystrokeError> {
        #[cfg(feature = "keyboard-enigo")]
        {
            EnigoKeyboard::new().map(Self::Enigo)
        }
        #[cfg(not(feature = "keyboard-enigo"))]
        {
            Ok(Self::Stdout(StdoutSink))
        }
    }
}

impl KeystrokeSink for AnyKeystrokeSink {
    async fn write(&mut self, text: &str) -> Result<(), KeystrokeError> {
        match self {
            Self::Stdout(sink) => sink.write(text).await,
            #[cfg(feature = "keyboard-enigo")]
            Self::Enigo(sink) => sink.write(text).await,
        }
    }
}

//! Read-and-recover engine for the NFC UID reader.
//!
//! The engine waits for cards on a smartcard reader, reads their UID,
//! formats it and types it through a keystroke sink, while surviving reader
//! disconnects, driver errors and sustained subsystem failures.
//!
//! # Components
//!
//! - [`retry`]: bounded retry with linear back-off
//! - [`throttle`]: per-category notification throttling
//! - [`alerts`]: notification front-end and delivery back-ends
//! - [`failure`] and [`restart`]: consecutive-failure tracking and process
//!   self-restart
//! - [`state_machine`] and [`watcher`]: the card presence watcher
//! - [`selection`]: device selection and the operator prompt
//! - [`keyboard`]: keystroke sinks
//! - [`service`]: the supervising loop
//!
//! # Example
//!
//! ```no_run
//! use nfcuid_core::Config;
//! use nfcuid_hardware::mock::MockSmartcard;
//! use nfcuid_service::alerts::{Alerts, LogNotifier};
//! use nfcuid_service::failure::{FailureTracker, RestartPolicy};
//! use nfcuid_service::keyboard::StdoutSink;
//! use nfcuid_service::restart::ProcessRestarter;
//! use nfcuid_service::retry::RetryPolicy;
//! use nfcuid_service::selection::StdinPrompt;
//! use nfcuid_service::{CardPresenceWatcher, ReaderService};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let (backend, _handle) = MockSmartcard::new(&["Reader A"]);
//!
//! let alerts = Arc::new(Alerts::new(Arc::new(LogNotifier), config.notifications.clone()));
//! let tracker = Arc::new(FailureTracker::new(
//!     RestartPolicy::from_config(&config.advanced),
//!     Arc::clone(&alerts),
//!     Arc::new(ProcessRestarter::from_current_process()?),
//! ));
//! let watcher = CardPresenceWatcher::new(backend, RetryPolicy::from_config(&config.advanced), tracker);
//!
//! let mut service = ReaderService::new(&config, watcher, StdoutSink, StdinPrompt::stdin(), alerts);
//! service.run(&CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod error;
pub mod failure;
pub mod keyboard;
pub mod mock;
pub mod restart;
pub mod retry;
pub mod selection;
pub mod service;
pub mod state_machine;
pub mod throttle;
pub mod watcher;

pub use alerts::{Alerts, AudioCue, Notification, NotificationKind, Notifier};
pub use error::{Operation, ServiceError, ServiceExit, WatcherError};
pub use failure::{FailureCategory, FailureOutcome, FailureTracker, RestartPolicy};
pub use retry::{RetryError, RetryPolicy};
pub use service::ReaderService;
pub use throttle::{ErrorCategory, NotificationThrottle};
pub use watcher::CardPresenceWatcher;

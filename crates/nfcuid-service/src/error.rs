//! Error types for the read-and-recover engine.

use crate::restart::RestartError;
use crate::state_machine::WatcherState;
use crate::throttle::ErrorCategory;
use nfcuid_hardware::HardwareError;
use std::fmt;
use std::io;
use thiserror::Error;

/// Smartcard step performed by the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    EstablishContext,
    ListReaders,
    WaitForCard,
    Connect,
    ReadUid,
    WaitForRelease,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EstablishContext => "establish PC/SC context",
            Self::ListReaders => "list readers",
            Self::WaitForCard => "detect card",
            Self::Connect => "connect to card",
            Self::ReadUid => "read card UID",
            Self::WaitForRelease => "wait for card removal",
        })
    }
}

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("failed to {operation} after {attempts} attempt(s): {source}")]
    Hardware {
        operation: Operation,
        attempts: u32,
        #[source]
        source: HardwareError,
    },

    #[error("no NFC reader found, connect a reader and restart the application")]
    NoReaders,

    #[error(transparent)]
    InvalidDevice(nfcuid_core::Error),

    #[error("input closed before a device was selected")]
    PromptClosed,

    #[error("failed to read device selection: {0}")]
    Prompt(#[source] io::Error),

    #[error("invalid watcher transition from {from} to {to}")]
    InvalidTransition { from: WatcherState, to: WatcherState },

    #[error("self-restart triggered")]
    RestartTriggered,

    #[error(transparent)]
    RestartFailed(RestartError),
}

impl WatcherError {
    pub(crate) fn hardware(operation: Operation, source: HardwareError) -> Self {
        Self::Hardware {
            operation,
            attempts: 1,
            source,
        }
    }

    /// Record the attempt count once retries are exhausted.
    pub(crate) fn after_attempts(self, total: u32) -> Self {
        match self {
            Self::Hardware {
                operation, source, ..
            } => Self::Hardware {
                operation,
                attempts: total,
                source,
            },
            other => other,
        }
    }

    /// A hardware wait was interrupted by this process.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Hardware { source, .. } if source.is_cancelled())
    }

    /// The process is being replaced or replacement failed; unwind.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RestartTriggered | Self::RestartFailed(_))
    }

    /// Stops the service even when auto-reconnect is on.
    pub fn is_fatal_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidDevice(_) | Self::PromptClosed | Self::Prompt(_)
        )
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Hardware { operation, .. } => match operation {
                Operation::EstablishContext => ErrorCategory::PcscContext,
                Operation::ListReaders => ErrorCategory::Reader,
                Operation::WaitForCard
                | Operation::Connect
                | Operation::ReadUid
                | Operation::WaitForRelease => ErrorCategory::Card,
            },
            Self::NoReaders | Self::InvalidDevice(_) | Self::PromptClosed | Self::Prompt(_) => {
                ErrorCategory::Reader
            }
            Self::InvalidTransition { .. }
            | Self::RestartTriggered
            | Self::RestartFailed(_) => ErrorCategory::Service,
        }
    }
}

/// Why the reader service stopped with an error.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service stopped: {0}")]
    Stopped(#[source] WatcherError),

    #[error("self-restart failed: {0}")]
    RestartFailed(#[source] RestartError),
}

impl From<WatcherError> for ServiceError {
    fn from(e: WatcherError) -> Self {
        match e {
            WatcherError::RestartFailed(e) => Self::RestartFailed(e),
            other => Self::Stopped(other),
        }
    }
}

/// How the reader service ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceExit {
    /// Shutdown was requested.
    Cancelled,

    /// A replacement process was started; the caller should exit.
    Restarted,
}

//! Smartcard access layer trait definitions.
//!
//! These traits are the contract between the read-and-recover engine and a
//! PC/SC-like smartcard subsystem. The hierarchy follows the lifetime of the
//! underlying handles:
//!
//! ```text
//! SmartcardBackend ──establish_context──► ReaderSession ──connect──► CardConnection
//!                                             │                          │
//!                                          release                   disconnect
//! ```
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro. Like every RPITIT trait
//! they are not object-safe; use generics, or
//! [`AnySmartcardBackend`](crate::devices::AnySmartcardBackend) for dispatch
//! between the real and the mock backend.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::types::ReaderState;
use std::time::Duration;

/// Entry point of a smartcard subsystem.
///
/// # Examples
///
/// ```no_run
/// use nfcuid_hardware::traits::{ReaderSession, SmartcardBackend};
/// use nfcuid_hardware::Result;
///
/// async fn first_reader<B: SmartcardBackend>(backend: &B) -> Result<Option<String>> {
///     let session = backend.establish_context().await?;
///     let readers = session.list_readers().await?;
///     session.release().await?;
///     Ok(readers.into_iter().next())
/// }
/// ```
pub trait SmartcardBackend: Send + Sync {
    /// Session type produced by this backend.
    type Session: ReaderSession;

    /// Acquire a session handle (a PC/SC context).
    ///
    /// # Errors
    ///
    /// Returns an error if the subsystem is unavailable.
    async fn establish_context(&self) -> Result<Self::Session>;
}

/// An established session with the smartcard subsystem.
pub trait ReaderSession: Send + Sync {
    /// Card handle type produced by this session.
    type Card: CardConnection;

    /// Enumerate reader names. An empty list is not an error.
    async fn list_readers(&self) -> Result<Vec<String>>;

    /// Block until the state of one of `states` differs from its
    /// `current_state`, filling every `event_state`.
    ///
    /// A `timeout` of `None` waits forever.
    ///
    /// # Errors
    ///
    /// Returns an error if the subsystem fails while waiting, or
    /// [`HardwareError::Timeout`](crate::HardwareError::Timeout) when a
    /// finite timeout expires.
    async fn wait_for_status_change(
        &self,
        states: &mut [ReaderState],
        timeout: Option<Duration>,
    ) -> Result<()>;

    /// Connect to the card currently in `reader`.
    async fn connect(&self, reader: &str) -> Result<Self::Card>;

    /// Release the session.
    async fn release(self) -> Result<()>;
}

/// A connection to a card in a reader.
pub trait CardConnection: Send + Sync {
    /// Send an APDU and return the raw response, status word included.
    async fn transmit(&self, apdu: &[u8]) -> Result<Vec<u8>>;

    /// Disconnect, resetting the card.
    async fn disconnect(self) -> Result<()>;
}

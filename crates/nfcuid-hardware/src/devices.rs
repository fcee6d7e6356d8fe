//! Enum wrappers for smartcard backend dispatch.
//!
//! Native `async fn` in traits is not object-safe, so `Box<dyn SmartcardBackend>`
//! is not an option. The binary picks a backend at runtime through these enums
//! instead; each layer of the trait hierarchy gets its own wrapper so that the
//! associated types line up.
//!
//! # Examples
//!
//! ```
//! use nfcuid_hardware::devices::AnySmartcardBackend;
//! use nfcuid_hardware::mock::MockSmartcard;
//!
//! let (backend, _handle) = MockSmartcard::new(&["Reader A"]);
//! let any_backend = AnySmartcardBackend::Mock(backend);
//!
//! // Can now be used polymorphically through the SmartcardBackend trait
//! ```

use crate::mock::{MockCard, MockSession, MockSmartcard};
#[cfg(feature = "hardware-pcsc")]
use crate::pcsc::{PcscBackend, PcscCard, PcscSession};
use crate::traits::{CardConnection, ReaderSession, SmartcardBackend};
use crate::{ReaderState, Result};
use std::time::Duration;

/// Enum wrapper for smartcard subsystem dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnySmartcardBackend {
    /// Mock subsystem for development and testing.
    Mock(MockSmartcard),

    /// System PC/SC service.
    #[cfg(feature = "hardware-pcsc")]
    Pcsc(PcscBackend),
}

impl AnySmartcardBackend {
    /// Short name of the active backend, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Mock(_) => "mock",
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(_) => "pcsc",
        }
    }
}

impl SmartcardBackend for AnySmartcardBackend {
    type Session = AnyReaderSession;

    async fn establish_context(&self) -> Result<AnyReaderSession> {
        match self {
            Self::Mock(backend) => backend.establish_context().await.map(AnyReaderSession::Mock),
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(backend) => backend.establish_context().await.map(AnyReaderSession::Pcsc),
        }
    }
}

/// Enum wrapper for reader session dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyReaderSession {
    Mock(MockSession),
    #[cfg(feature = "hardware-pcsc")]
    Pcsc(PcscSession),
}

impl ReaderSession for AnyReaderSession {
    type Card = AnyCardConnection;

    async fn list_readers(&self) -> Result<Vec<String>> {
        match self {
            Self::Mock(session) => session.list_readers().await,
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(session) => session.list_readers().await,
        }
    }

    async fn wait_for_status_change(
        &self,
        states: &mut [ReaderState],
        timeout: Option<Duration>,
    ) -> Result<()> {
        match self {
            Self::Mock(session) => session.wait_for_status_change(states, timeout).await,
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(session) => session.wait_for_status_change(states, timeout).await,
        }
    }

    async fn connect(&self, reader: &str) -> Result<AnyCardConnection> {
        match self {
            Self::Mock(session) => session.connect(reader).await.map(AnyCardConnection::Mock),
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(session) => session.connect(reader).await.map(AnyCardConnection::Pcsc),
        }
    }

    async fn release(self) -> Result<()> {
        match self {
            Self::Mock(session) => session.release().await,
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(session) => session.release().await,
        }
    }
}

/// Enum wrapper for card connection dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyCardConnection {
    Mock(MockCard),
    #[cfg(feature = "hardware-pcsc")]
    Pcsc(PcscCard),
}

impl CardConnection for AnyCardConnection {
    async fn transmit(&self, apdu: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Mock(card) => card.transmit(apdu).await,
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(card) => card.transmit(apdu).await,
        }
    }

    async fn disconnect(self) -> Result<()> {
        match self {
            Self::Mock(card) => card.disconnect().await,
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(card) => card.disconnect().await,
        }
    }
}

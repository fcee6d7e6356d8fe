//! Smartcard access layer for the NFC UID reader.
//!
//! This crate abstracts the PC/SC-style subsystem the reader service talks to:
//! establishing a context, enumerating readers, waiting for reader status
//! changes, connecting to a card and exchanging APDUs.
//!
//! # Backends
//!
//! - [`mock::MockSmartcard`]: scriptable in-memory subsystem with a control
//!   handle, used by tests and for development without hardware.
//! - `pcsc::PcscBackend` (feature `hardware-pcsc`): the system PC/SC service
//!   (pcsclite on Linux and macOS, WinSCard on Windows).
//!
//! [`devices::AnySmartcardBackend`] dispatches between them at runtime.
//!
//! # Example
//!
//! ```no_run
//! use nfcuid_hardware::apdu::{GET_UID_APDU, parse_uid_response};
//! use nfcuid_hardware::traits::{CardConnection, ReaderSession, SmartcardBackend};
//! use nfcuid_hardware::{ReaderState, Result, StateFlags};
//!
//! async fn read_one<B: SmartcardBackend>(backend: &B, reader: &str) -> Result<String> {
//!     let session = backend.establish_context().await?;
//!
//!     let mut states = [ReaderState::new(reader, StateFlags::EMPTY)];
//!     while !states[0].is_present() {
//!         session.wait_for_status_change(&mut states, None).await?;
//!         states[0].sync_current_state();
//!     }
//!
//!     let card = session.connect(reader).await?;
//!     let uid = parse_uid_response(&card.transmit(&GET_UID_APDU).await?)?;
//!     card.disconnect().await?;
//!     Ok(uid.to_string())
//! }
//! ```

pub mod apdu;
pub mod blocking;
pub mod devices;
pub mod error;
pub mod mock;
#[cfg(feature = "hardware-pcsc")]
pub mod pcsc;
pub mod traits;
pub mod types;

pub use error::{HardwareError, Result};
pub use traits::{CardConnection, ReaderSession, SmartcardBackend};
pub use types::{ReaderState, StateFlags};

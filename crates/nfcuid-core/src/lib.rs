//! Shared vocabulary for the NFC UID reader.
//!
//! This crate holds everything the other crates agree on: the error type,
//! protocol and policy constants, the output format model, the UID codec
//! and the YAML configuration.

pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use codec::{FormatFallback, FormattedUid, format_uid};
pub use config::{AdvancedConfig, Config, NfcConfig, NotificationConfig};
pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

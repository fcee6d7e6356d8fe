//! Core constants for the NFC UID reader.
//!
//! This module centralises the protocol bytes exchanged with the reader,
//! the configuration defaults and the timing windows of the recovery
//! policies, so that every crate agrees on the same values.
//!
//! # APDU Exchange
//!
//! The UID is obtained with the PC/SC pseudo-APDU `GET DATA`:
//!
//! ```text
//! request:  FF CA 00 00 00
//! response: <UID bytes ...> 90 00
//! ```
//!
//! The two trailing bytes are the status word. Anything other than `90 00`
//! is a protocol failure for the card that produced it.
//!
//! # Usage
//!
//! ```
//! use nfcuid_core::constants::*;
//!
//! assert_eq!(GET_UID_APDU, [0xFF, 0xCA, 0x00, 0x00, 0x00]);
//! assert_eq!(STATUS_SUCCESS, [0x90, 0x00]);
//! assert_eq!(DECIMAL_UID_LEN, 4);
//! ```

// ============================================================================
// APDU Protocol
// ============================================================================

/// `GET DATA` command returning the card UID.
pub const GET_UID_APDU: [u8; 5] = [0xFF, 0xCA, 0x00, 0x00, 0x00];

/// Status word signalling a successful command.
pub const STATUS_SUCCESS: [u8; 2] = [0x90, 0x00];

/// Length of the status word at the end of every response.
pub const STATUS_WORD_LEN: usize = 2;

/// UID length required for the decimal output format.
pub const DECIMAL_UID_LEN: usize = 4;

// ============================================================================
// Configuration Defaults
// ============================================================================

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Default number of attempts for every fallible hardware step.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default base delay (seconds) of the linear back-off and of the
/// service-loop reconnect pause.
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 2;

/// Default number of consecutive system failures before a self-restart.
pub const DEFAULT_MAX_CONTEXT_FAILURES: u32 = 5;

/// Default extra delay (seconds) before the replacement process is spawned.
pub const DEFAULT_RESTART_DELAY_SECS: u64 = 10;

// ============================================================================
// Self-Restart
// ============================================================================

/// Fixed pause after announcing a restart so the notification is delivered.
pub const RESTART_SETTLE_SECS: u64 = 2;

/// Command-line marker passed to a process started by a self-restart.
pub const AUTO_RESTART_FLAG: &str = "--auto-restart";

/// Application name, used for the lock file and log file names.
pub const APP_NAME: &str = "nfcuid";

// ============================================================================
// Notification Throttling
// ============================================================================

/// Time after which a critical (context/reader) alert is shown again.
pub const CRITICAL_RENOTIFY_SECS: u64 = 5 * 60;

/// Time after which a card-read alert is shown again.
pub const CARD_RENOTIFY_SECS: u64 = 2 * 60;

/// Time after which a service-loop alert is shown again.
pub const SERVICE_RENOTIFY_SECS: u64 = 3 * 60;

/// Time after which any other alert is shown again.
pub const DEFAULT_RENOTIFY_SECS: u64 = 60;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_word_len_matches_success_code() {
        assert_eq!(STATUS_SUCCESS.len(), STATUS_WORD_LEN);
    }

    #[test]
    fn test_renotify_windows_are_ordered() {
        assert!(DEFAULT_RENOTIFY_SECS < CARD_RENOTIFY_SECS);
        assert!(CARD_RENOTIFY_SECS < SERVICE_RENOTIFY_SECS);
        assert!(SERVICE_RENOTIFY_SECS < CRITICAL_RENOTIFY_SECS);
    }

    #[test]
    fn test_restart_flag_is_long_option() {
        assert!(AUTO_RESTART_FLAG.starts_with("--"));
    }
}

//! Failures at the PC/SC boundary.
//!
//! Variants say which part of the chain broke (service, reader, card or the
//! bytes it returned). Whether a failure is retried, counted towards a
//! restart or only affects the current card is decided by the caller.

use std::time::Duration;

pub type Result<T> = std::result::Result<T, HardwareError>;

#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// The smartcard service is not running or the context is no longer valid.
    #[error("smartcard service unavailable: {reason}")]
    ServiceUnavailable { reason: String },

    /// The named reader is not known to the service.
    #[error("reader not found: {reader}")]
    UnknownReader { reader: String },

    /// A status wait ended without the expected change.
    #[error("no reader state change within {}ms", after.as_millis())]
    Timeout { after: Duration },

    /// No card, or the card left the field mid-operation.
    #[error("no card in reader: {reason}")]
    NoCard { reason: String },

    /// Reader or card rejected the exchange.
    #[error("transport failure: {reason}")]
    Transport { reason: String },

    /// Response bytes do not form a UID reply.
    #[error("malformed card response: {reason}")]
    MalformedResponse { reason: String },

    /// Card answered with a status word other than `90 00`.
    #[error("card returned status {sw1:02x} {sw2:02x}")]
    StatusWord { sw1: u8, sw2: u8 },

    /// A pending wait was interrupted on purpose (SCardCancel).
    #[error("wait cancelled")]
    Cancelled,

    #[error("{0}")]
    Internal(String),
}

impl HardwareError {
    pub fn service_unavailable(reason: impl Into<String>) -> Self {
        Self::ServiceUnavailable { reason: reason.into() }
    }

    pub fn unknown_reader(reader: impl Into<String>) -> Self {
        Self::UnknownReader { reader: reader.into() }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::Timeout { after }
    }

    pub fn no_card(reason: impl Into<String>) -> Self {
        Self::NoCard { reason: reason.into() }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport { reason: reason.into() }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse { reason: reason.into() }
    }

    /// The operation was interrupted by this process, not failed by the
    /// hardware.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Failure inside this crate rather than at the hardware.
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(HardwareError::unknown_reader("ACS ACR122U"), "reader not found: ACS ACR122U")]
    #[case(HardwareError::timeout(Duration::from_secs(3)), "no reader state change within 3000ms")]
    #[case(
        HardwareError::service_unavailable("service not running"),
        "smartcard service unavailable: service not running"
    )]
    #[case(HardwareError::StatusWord { sw1: 0x6A, sw2: 0x81 }, "card returned status 6a 81")]
    fn test_messages(#[case] error: HardwareError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn test_only_cancelled_is_cancelled() {
        assert!(HardwareError::Cancelled.is_cancelled());
        assert!(!HardwareError::transport("reader busy").is_cancelled());
        assert!(!HardwareError::timeout(Duration::from_secs(1)).is_cancelled());
    }
}

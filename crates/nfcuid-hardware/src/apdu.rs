//! UID read command and response parsing.

use crate::error::{HardwareError, Result};
use nfcuid_core::Uid;
use nfcuid_core::constants::{STATUS_SUCCESS, STATUS_WORD_LEN};

pub use nfcuid_core::constants::GET_UID_APDU;

/// Extract the UID from a `GET DATA` response.
///
/// The last two bytes are the status word and must be `90 00`; everything
/// before them is the UID.
///
/// # Errors
///
/// - [`HardwareError::MalformedResponse`] if the response is shorter than the
///   status word or carries no UID bytes.
/// - [`HardwareError::StatusWord`] for any status word other than `90 00`.
///
/// # Examples
///
/// ```
/// use nfcuid_hardware::apdu::parse_uid_response;
///
/// let uid = parse_uid_response(&[0x04, 0xAE, 0x65, 0xCA, 0x90, 0x00]).unwrap();
/// assert_eq!(uid.as_bytes(), &[0x04, 0xAE, 0x65, 0xCA]);
///
/// assert!(parse_uid_response(&[0x6A, 0x81]).is_err());
/// ```
pub fn parse_uid_response(response: &[u8]) -> Result<Uid> {
    if response.len() < STATUS_WORD_LEN {
        return Err(HardwareError::malformed(format!(
            "insufficient response bytes from card: {}",
            response.len()
        )));
    }

    let (uid, status) = response.split_at(response.len() - STATUS_WORD_LEN);
    if status != STATUS_SUCCESS {
        return Err(HardwareError::StatusWord {
            sw1: status[0],
            sw2: status[1],
        });
    }

    // A bare `90 00` is a read error here, not an empty UID followed by the end char.
    Uid::new(uid.to_vec()).map_err(|e| HardwareError::malformed(e.to_string()))
}

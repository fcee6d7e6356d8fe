//! UID to text codec.
//!
//! Turns the raw UID bytes of a tag into the exact text that is typed by the
//! keystroke sink. The codec is pure: the output depends only on the UID and
//! the [`OutputFormat`].
//!
//! # Algorithm
//!
//! 1. Optionally reverse the byte order.
//! 2. Decimal mode on a 4-byte UID: little-endian `u32`, zero-padded to
//!    `decimal_padding` digits.
//! 3. Decimal mode on any other length: report a [`FormatFallback`] and
//!    continue with the hex path.
//! 4. Hex path: two digits per byte (uppercase with `caps_lock`), joined by
//!    the `in_char` glyph.
//! 5. Append the `end_char` glyph.
//!
//! # Examples
//!
//! ```
//! use nfcuid_core::{CharFlag, OutputFormat, Uid, format_uid};
//!
//! let uid = Uid::new(vec![0x04, 0xAE, 0x65, 0xCA]).unwrap();
//! let format = OutputFormat {
//!     in_char: CharFlag::Hyphen,
//!     end_char: CharFlag::Enter,
//!     ..OutputFormat::default()
//! };
//!
//! let formatted = format_uid(uid, &format);
//! assert_eq!(formatted.text, "04-ae-65-ca\n");
//! assert!(formatted.fallback.is_none());
//! ```

use crate::constants::DECIMAL_UID_LEN;
use crate::types::{OutputFormat, Uid};
use std::fmt::Write;

/// Soft failure: decimal output was requested but the UID length does not
/// allow it, so hex was produced instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatFallback {
    /// Length of the UID that could not be rendered in decimal.
    pub uid_len: usize,
}

impl std::fmt::Display for FormatFallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "decimal format needs a {}-byte UID, got {} bytes; using hex",
            DECIMAL_UID_LEN, self.uid_len
        )
    }
}

/// Result of formatting a UID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedUid {
    /// Text to emit, including the end glyph.
    pub text: String,

    /// Set when decimal output fell back to hex.
    pub fallback: Option<FormatFallback>,
}

/// Format a UID according to `format`.
///
/// The UID is taken by value because the reverse step reorders it in place.
pub fn format_uid(mut uid: Uid, format: &OutputFormat) -> FormattedUid {
    if format.reverse {
        uid.reverse();
    }

    let bytes = uid.as_bytes();
    let mut fallback = None;

    let mut text = match decimal_value(bytes) {
        Some(value) if format.decimal => {
            format!("{:0width$}", value, width = format.decimal_padding)
        }
        _ => {
            if format.decimal {
                fallback = Some(FormatFallback {
                    uid_len: bytes.len(),
                });
            }
            hex_text(bytes, format)
        }
    };

    text.push_str(format.end_char.glyph());

    FormattedUid { text, fallback }
}

fn decimal_value(bytes: &[u8]) -> Option<u32> {
    let array: [u8; DECIMAL_UID_LEN] = bytes.try_into().ok()?;
    Some(u32::from_le_bytes(array))
}

fn hex_text(bytes: &[u8], format: &OutputFormat) -> String {
    let separator = format.in_char.glyph();
    let mut text = String::with_capacity(bytes.len() * (2 + separator.len()));

    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            text.push_str(separator);
        }
        // Writing to a String cannot fail.
        let _ = if format.caps_lock {
            write!(text, "{:02X}", byte)
        } else {
            write!(text, "{:02x}", byte)
        };
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CharFlag;
    use rstest::rstest;

    fn uid(bytes: &[u8]) -> Uid {
        Uid::new(bytes.to_vec()).unwrap()
    }

    const SAMPLE: [u8; 4] = [0x04, 0xAE, 0x65, 0xCA];

    #[test]
    fn test_hex_with_hyphen_and_enter() {
        let format = OutputFormat {
            in_char: CharFlag::Hyphen,
            end_char: CharFlag::Enter,
            ..OutputFormat::default()
        };

        let formatted = format_uid(uid(&SAMPLE), &format);
        assert_eq!(formatted.text, "04-ae-65-ca\n");
        assert_eq!(formatted.fallback, None);
    }

    #[test]
    fn test_decimal_padded() {
        let format = OutputFormat {
            decimal: true,
            decimal_padding: 10,
            ..OutputFormat::default()
        };

        let formatted = format_uid(uid(&SAMPLE), &format);
        assert_eq!(formatted.text, "3395661316");
        assert_eq!(formatted.fallback, None);
    }

    #[rstest]
    #[case(0, "16909060")]
    #[case(8, "16909060")]
    #[case(12, "000016909060")]
    fn test_decimal_padding_width(#[case] padding: usize, #[case] expected: &str) {
        let format = OutputFormat {
            decimal: true,
            decimal_padding: padding,
            ..OutputFormat::default()
        };

        let formatted = format_uid(uid(&[0x04, 0x03, 0x02, 0x01]), &format);
        assert_eq!(formatted.text, expected);
    }

    #[test]
    fn test_decimal_falls_back_to_hex_for_seven_bytes() {
        let format = OutputFormat {
            decimal: true,
            decimal_padding: 10,
            ..OutputFormat::default()
        };

        let formatted = format_uid(
            uid(&[0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66]),
            &format,
        );
        assert_eq!(formatted.text, "04112233445566");
        assert_eq!(formatted.fallback, Some(FormatFallback { uid_len: 7 }));
    }

    #[test]
    fn test_reverse_then_decimal() {
        let format = OutputFormat {
            reverse: true,
            decimal: true,
            ..OutputFormat::default()
        };

        // Reversed bytes CA 65 AE 04 read little-endian.
        let formatted = format_uid(uid(&SAMPLE), &format);
        assert_eq!(formatted.text, u32::from_le_bytes([0xCA, 0x65, 0xAE, 0x04]).to_string());
    }

    #[test]
    fn test_caps_lock_reverse_colon() {
        let format = OutputFormat {
            caps_lock: true,
            reverse: true,
            in_char: CharFlag::Colon,
            end_char: CharFlag::Tab,
            ..OutputFormat::default()
        };

        let formatted = format_uid(uid(&SAMPLE), &format);
        assert_eq!(formatted.text, "CA:65:AE:04\t");
    }

    #[test]
    fn test_single_byte_has_no_separator() {
        let format = OutputFormat {
            in_char: CharFlag::Comma,
            ..OutputFormat::default()
        };

        assert_eq!(format_uid(uid(&[0xFF]), &format).text, "ff");
    }

    #[test]
    fn test_end_char_applies_to_decimal() {
        let format = OutputFormat {
            decimal: true,
            end_char: CharFlag::Semicolon,
            ..OutputFormat::default()
        };

        assert_eq!(format_uid(uid(&[0x01, 0, 0, 0]), &format).text, "1;");
    }

    #[test]
    fn test_fallback_display() {
        let fallback = FormatFallback { uid_len: 7 };
        assert_eq!(
            fallback.to_string(),
            "decimal format needs a 4-byte UID, got 7 bytes; using hex"
        );
    }
}

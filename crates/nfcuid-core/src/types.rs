use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

/// Separator glyph placed between UID bytes or after the UID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharFlag {
    #[default]
    None,
    Space,
    Tab,
    Hyphen,
    Enter,
    Semicolon,
    Colon,
    Comma,
}

impl CharFlag {
    /// All flags in the order they are listed to users.
    pub const ALL: [CharFlag; 8] = [
        CharFlag::None,
        CharFlag::Space,
        CharFlag::Tab,
        CharFlag::Hyphen,
        CharFlag::Enter,
        CharFlag::Semicolon,
        CharFlag::Colon,
        CharFlag::Comma,
    ];

    /// Text emitted for this flag.
    pub fn glyph(&self) -> &'static str {
        match self {
            CharFlag::None => "",
            CharFlag::Space => " ",
            CharFlag::Tab => "\t",
            CharFlag::Hyphen => "-",
            CharFlag::Enter => "\n",
            CharFlag::Semicolon => ";",
            CharFlag::Colon => ":",
            CharFlag::Comma => ",",
        }
    }

    /// Configuration name of this flag.
    pub fn name(&self) -> &'static str {
        match self {
            CharFlag::None => "none",
            CharFlag::Space => "space",
            CharFlag::Tab => "tab",
            CharFlag::Hyphen => "hyphen",
            CharFlag::Enter => "enter",
            CharFlag::Semicolon => "semicolon",
            CharFlag::Colon => "colon",
            CharFlag::Comma => "comma",
        }
    }

    /// Comma separated list of accepted names, for help texts.
    pub fn options() -> String {
        Self::ALL
            .iter()
            .map(CharFlag::name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for CharFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CharFlag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|flag| flag.name() == wanted)
            .ok_or_else(|| Error::InvalidCharFlag(format!("{} (options: {})", s, Self::options())))
    }
}

/// How a UID is rendered before it is typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputFormat {
    /// Uppercase hex digits.
    pub caps_lock: bool,

    /// Reverse the byte order before rendering.
    pub reverse: bool,

    /// Render 4-byte UIDs as a little-endian `u32` in decimal.
    pub decimal: bool,

    /// Zero-pad decimal output to this width (0 = no padding).
    pub decimal_padding: usize,

    /// Glyph appended after the UID.
    pub end_char: CharFlag,

    /// Glyph placed between hex bytes.
    pub in_char: CharFlag,
}

/// UID bytes reported by a contactless tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Uid(Vec<u8>);

impl Uid {
    /// Wrap raw UID bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUid`] for an empty byte sequence.
    ///
    /// # Examples
    ///
    /// ```
    /// use nfcuid_core::Uid;
    ///
    /// let uid = Uid::new(vec![0x04, 0xAE, 0x65, 0xCA]).unwrap();
    /// assert_eq!(uid.len(), 4);
    /// assert!(Uid::new(Vec::new()).is_err());
    /// ```
    pub fn new(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::InvalidUid("UID must not be empty".to_string()));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reverse the byte order in place.
    pub fn reverse(&mut self) {
        self.0.reverse();
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Display for Uid {
    /// Space separated lowercase hex, the form used in logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Which reader to use, by its 1-based number in the current enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceSelection {
    /// Ask the operator on every fresh enumeration until a choice is made.
    #[default]
    Prompt,

    /// Fixed 1-based reader number.
    Number(NonZeroUsize),
}

impl DeviceSelection {
    /// Build a selection from a configured number; 0 means prompt.
    pub fn from_number(number: usize) -> Self {
        NonZeroUsize::new(number).map_or(Self::Prompt, Self::Number)
    }

    /// Configured number (0 for prompt).
    pub fn number(&self) -> usize {
        match self {
            Self::Prompt => 0,
            Self::Number(n) => n.get(),
        }
    }

    /// Validate against the current reader count.
    ///
    /// Returns the 0-based reader index, or `None` when the operator has to
    /// be asked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceOutOfRange`] if the number exceeds the count.
    ///
    /// # Examples
    ///
    /// ```
    /// use nfcuid_core::DeviceSelection;
    ///
    /// assert_eq!(DeviceSelection::from_number(2).resolve(3).unwrap(), Some(1));
    /// assert_eq!(DeviceSelection::Prompt.resolve(3).unwrap(), None);
    /// assert!(DeviceSelection::from_number(4).resolve(3).is_err());
    /// ```
    pub fn resolve(&self, available: usize) -> Result<Option<usize>> {
        match self {
            Self::Prompt => Ok(None),
            Self::Number(n) if n.get() <= available => Ok(Some(n.get() - 1)),
            Self::Number(n) => Err(Error::DeviceOutOfRange {
                selected: n.get(),
                available,
            }),
        }
    }
}

//! Reader status types shared by every backend.
//!
//! [`StateFlags`] uses the PC/SC `SCARD_STATE_*` bit values, so the PC/SC
//! backend converts without a lookup table and the mock reports exactly what
//! a real reader would.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Reader status bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StateFlags(u32);

impl StateFlags {
    /// Caller has no idea of the current state.
    pub const UNAWARE: Self = Self(0x0000);
    pub const IGNORE: Self = Self(0x0001);
    /// State differs from the `current_state` passed in.
    pub const CHANGED: Self = Self(0x0002);
    pub const UNKNOWN: Self = Self(0x0004);
    pub const UNAVAILABLE: Self = Self(0x0008);
    /// No card in the reader.
    pub const EMPTY: Self = Self(0x0010);
    /// A card is in the reader.
    pub const PRESENT: Self = Self(0x0020);
    pub const ATRMATCH: Self = Self(0x0040);
    pub const EXCLUSIVE: Self = Self(0x0080);
    pub const INUSE: Self = Self(0x0100);
    pub const MUTE: Self = Self(0x0200);
    pub const UNPOWERED: Self = Self(0x0400);

    const NAMES: [(StateFlags, &'static str); 11] = [
        (Self::IGNORE, "IGNORE"),
        (Self::CHANGED, "CHANGED"),
        (Self::UNKNOWN, "UNKNOWN"),
        (Self::UNAVAILABLE, "UNAVAILABLE"),
        (Self::EMPTY, "EMPTY"),
        (Self::PRESENT, "PRESENT"),
        (Self::ATRMATCH, "ATRMATCH"),
        (Self::EXCLUSIVE, "EXCLUSIVE"),
        (Self::INUSE, "INUSE"),
        (Self::MUTE, "MUTE"),
        (Self::UNPOWERED, "UNPOWERED"),
    ];

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// True if every bit of `other` is set.
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Copy with the bits of `other` cleared.
    pub const fn without(&self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for StateFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for StateFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for StateFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return f.write_str("UNAWARE");
        }
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&names.join("|"))
    }
}

/// Per-reader record passed to a status-change wait.
///
/// The caller sets `current_state`; the wait fills `event_state`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderState {
    pub reader: String,
    pub current_state: StateFlags,
    pub event_state: StateFlags,
}

impl ReaderState {
    pub fn new(reader: impl Into<String>, current_state: StateFlags) -> Self {
        Self {
            reader: reader.into(),
            current_state,
            event_state: StateFlags::UNAWARE,
        }
    }

    /// Adopt the last reported state as the known state for the next wait.
    pub fn sync_current_state(&mut self) {
        self.current_state = self.event_state;
    }

    pub fn is_present(&self) -> bool {
        self.event_state.contains(StateFlags::PRESENT)
    }

    pub fn is_empty(&self) -> bool {
        self.event_state.contains(StateFlags::EMPTY)
    }
}

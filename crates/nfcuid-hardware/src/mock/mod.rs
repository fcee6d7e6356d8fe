//! Mock smartcard implementation for testing and development.
//!
//! This module provides a scriptable smartcard backend that simulates readers,
//! card presentation and hardware failures without requiring physical hardware.

mod smartcard;

pub use smartcard::{MockCard, MockOperation, MockSession, MockSmartcard, MockSmartcardHandle};

//! Card presence state machine.
//!
//! Tracks where the watcher is in a reader session and rejects out-of-order
//! steps.
//!
//! # States
//!
//! - `ContextPending`: no PC/SC context yet
//! - `ContextEstablished`: context acquired
//! - `ReadersListed`: readers enumerated
//! - `DeviceSelected`: reader chosen for this session
//! - `AwaitingCard`: waiting for a card to be presented
//! - `CardPresent`: reading the presented card
//! - `AwaitingRelease`: UID emitted, waiting for the card to be removed
//!
//! # Valid Transitions
//!
//! - ContextPending → ContextEstablished → ReadersListed → DeviceSelected → AwaitingCard
//! - AwaitingCard → CardPresent → AwaitingRelease → AwaitingCard
//! - CardPresent → AwaitingCard (card could not be read)
//! - any state → ContextPending via [`WatcherStateMachine::reset`]
//!
//! # Examples
//!
//! ```
//! use nfcuid_service::state_machine::{WatcherState, WatcherStateMachine};
//!
//! let mut machine = WatcherStateMachine::new();
//! machine.transition_to(WatcherState::ContextEstablished).unwrap();
//! assert!(machine.transition_to(WatcherState::CardPresent).is_err());
//! ```

use crate::error::WatcherError;
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

/// Transitions kept for diagnostics. A read cycle is three transitions.
const MAX_HISTORY_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatcherState {
    ContextPending,
    ContextEstablished,
    ReadersListed,
    DeviceSelected,
    AwaitingCard,
    CardPresent,
    AwaitingRelease,
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WatcherState::ContextPending => "ContextPending",
            WatcherState::ContextEstablished => "ContextEstablished",
            WatcherState::ReadersListed => "ReadersListed",
            WatcherState::DeviceSelected => "DeviceSelected",
            WatcherState::AwaitingCard => "AwaitingCard",
            WatcherState::CardPresent => "CardPresent",
            WatcherState::AwaitingRelease => "AwaitingRelease",
        };
        f.write_str(name)
    }
}

impl WatcherState {
    /// Check if transition to `target` is valid from this state.
    ///
    /// ```
    /// use nfcuid_service::state_machine::WatcherState;
    ///
    /// assert!(WatcherState::AwaitingCard.can_transition_to(&WatcherState::CardPresent));
    /// assert!(!WatcherState::AwaitingCard.can_transition_to(&WatcherState::AwaitingRelease));
    /// ```
    pub fn can_transition_to(&self, target: &WatcherState) -> bool {
        matches!(
            (self, target),
            (WatcherState::ContextPending, WatcherState::ContextEstablished)
                | (WatcherState::ContextEstablished, WatcherState::ReadersListed)
                | (WatcherState::ReadersListed, WatcherState::DeviceSelected)
                | (WatcherState::DeviceSelected, WatcherState::AwaitingCard)
                | (WatcherState::AwaitingCard, WatcherState::CardPresent)
                | (
                    WatcherState::CardPresent,
                    WatcherState::AwaitingRelease | WatcherState::AwaitingCard
                )
                | (WatcherState::AwaitingRelease, WatcherState::AwaitingCard)
        )
    }

    /// True once a reader session is usable for card operations.
    pub fn has_session(&self) -> bool {
        !matches!(self, WatcherState::ContextPending)
    }
}

/// A single recorded transition.
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: WatcherState,
    pub to: WatcherState,
    pub timestamp: Instant,
}

impl StateTransition {
    pub fn new(from: WatcherState, to: WatcherState) -> Self {
        Self {
            from,
            to,
            timestamp: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

/// State machine for one watcher.
///
/// Not shared between tasks; the watcher owns it.
#[derive(Debug)]
pub struct WatcherStateMachine {
    current_state: WatcherState,
    state_entered_at: Instant,
    history: VecDeque<StateTransition>,
    completed_reads: u64,
}

impl WatcherStateMachine {
    pub fn new() -> Self {
        Self {
            current_state: WatcherState::ContextPending,
            state_entered_at: Instant::now(),
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
            completed_reads: 0,
        }
    }

    pub fn current_state(&self) -> WatcherState {
        self.current_state
    }

    pub fn time_in_current_state(&self) -> Duration {
        self.state_entered_at.elapsed()
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Cards that reached `AwaitingRelease` since creation.
    pub fn completed_reads(&self) -> u64 {
        self.completed_reads
    }

    /// Move to `new_state` if the transition is valid.
    pub fn transition_to(&mut self, new_state: WatcherState) -> Result<StateTransition, WatcherError> {
        if !self.current_state.can_transition_to(&new_state) {
            return Err(WatcherError::InvalidTransition {
                from: self.current_state,
                to: new_state,
            });
        }

        let transition = StateTransition::new(self.current_state, new_state);
        if new_state == WatcherState::AwaitingRelease {
            self.completed_reads += 1;
        }
        self.record(transition.clone());
        Ok(transition)
    }

    /// Unwind to `ContextPending` from any state.
    pub fn reset(&mut self) {
        if self.current_state != WatcherState::ContextPending {
            let transition = StateTransition::new(self.current_state, WatcherState::ContextPending);
            self.record(transition);
        }
    }

    fn record(&mut self, transition: StateTransition) {
        tracing::trace!(from = %transition.from, to = %transition.to, "watcher transition");

        self.current_state = transition.to;
        self.state_entered_at = transition.timestamp;

        if self.history.len() >= MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(transition);
    }
}

impl Default for WatcherStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_awaiting_card() -> WatcherStateMachine {
        let mut machine = WatcherStateMachine::new();
        for state in [
            WatcherState::ContextEstablished,
            WatcherState::ReadersListed,
            WatcherState::DeviceSelected,
            WatcherState::AwaitingCard,
        ] {
            machine.transition_to(state).unwrap();
        }
        machine
    }

    #[test]
    fn test_initial_state() {
        let machine = WatcherStateMachine::new();
        assert_eq!(machine.current_state(), WatcherState::ContextPending);
        assert!(machine.history().is_empty());
        assert!(!machine.current_state().has_session());
    }

    #[test]
    fn test_full_read_cycle() {
        let mut machine = at_awaiting_card();

        machine.transition_to(WatcherState::CardPresent).unwrap();
        machine.transition_to(WatcherState::AwaitingRelease).unwrap();
        machine.transition_to(WatcherState::AwaitingCard).unwrap();

        assert_eq!(machine.current_state(), WatcherState::AwaitingCard);
        assert_eq!(machine.completed_reads(), 1);
        assert_eq!(machine.history().len(), 7);
    }

    #[test]
    fn test_unreadable_card_returns_to_awaiting() {
        let mut machine = at_awaiting_card();
        machine.transition_to(WatcherState::CardPresent).unwrap();
        machine.transition_to(WatcherState::AwaitingCard).unwrap();
        assert_eq!(machine.completed_reads(), 0);
    }

    #[test]
    fn test_invalid_transition() {
        let mut machine = WatcherStateMachine::new();
        let err = machine.transition_to(WatcherState::AwaitingCard).unwrap_err();

        assert!(matches!(
            err,
            WatcherError::InvalidTransition {
                from: WatcherState::ContextPending,
                to: WatcherState::AwaitingCard
            }
        ));
        assert_eq!(machine.current_state(), WatcherState::ContextPending);
        assert!(machine.history().is_empty());
    }

    #[test]
    fn test_reset_from_any_state() {
        let mut machine = at_awaiting_card();
        machine.reset();

        assert_eq!(machine.current_state(), WatcherState::ContextPending);
        let last = machine.history().back().unwrap();
        assert_eq!(last.from, WatcherState::AwaitingCard);

        let len = machine.history().len();
        machine.reset();
        assert_eq!(machine.history().len(), len);
    }

    #[test]
    fn test_history_is_capped() {
        let mut machine = at_awaiting_card();
        for _ in 0..100 {
            machine.transition_to(WatcherState::CardPresent).unwrap();
            machine.transition_to(WatcherState::AwaitingCard).unwrap();
        }
        assert_eq!(machine.history().len(), MAX_HISTORY_SIZE);
        assert_eq!(machine.current_state(), WatcherState::AwaitingCard);
    }
}

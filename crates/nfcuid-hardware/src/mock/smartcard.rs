//! Mock smartcard backend.
//!
//! The backend and its control handle share one state. Tests drive the
//! handle (present/remove cards, inject failures) while the code under test
//! talks to the backend through the regular traits. Status-change waits
//! block until the handle changes something, exactly like a real reader.

use crate::{
    HardwareError, Result,
    traits::{CardConnection, ReaderSession, SmartcardBackend},
    types::{ReaderState, StateFlags},
};
use nfcuid_core::constants::STATUS_SUCCESS;
use std::collections::{HashMap, VecDeque};
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// Operations of the smartcard layer that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    EstablishContext,
    ListReaders,
    StatusChange,
    Connect,
    Transmit,
}

#[derive(Debug, Default)]
struct MockState {
    readers: Vec<String>,

    /// Raw `GET DATA` response of the card in each reader.
    cards: HashMap<String, Vec<u8>>,

    failures: HashMap<MockOperation, VecDeque<String>>,
    calls: HashMap<MockOperation, usize>,
    transmitted: Vec<Vec<u8>>,
    releases: usize,
    disconnects: usize,

    /// Bumped by [`MockSmartcardHandle::cancel_waits`].
    cancellations: u64,
}

impl MockState {
    /// Count a call and pop a scripted failure for it, if any.
    fn begin(&mut self, operation: MockOperation) -> Result<()> {
        *self.calls.entry(operation).or_default() += 1;
        match self.failures.get_mut(&operation).and_then(VecDeque::pop_front) {
            Some(message) => Err(HardwareError::transport(message)),
            None => Ok(()),
        }
    }

    fn reader_state(&self, reader: &str) -> StateFlags {
        if !self.readers.iter().any(|r| r == reader) {
            StateFlags::UNKNOWN
        } else if self.cards.contains_key(reader) {
            StateFlags::PRESENT
        } else {
            StateFlags::EMPTY
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<MockState>,
    changed: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut MockState)) {
        f(&mut self.lock());
        self.changed.notify_waiters();
    }
}

/// Mock smartcard subsystem.
///
/// # Examples
///
/// ```
/// use nfcuid_hardware::mock::MockSmartcard;
/// use nfcuid_hardware::traits::{CardConnection, ReaderSession, SmartcardBackend};
/// use nfcuid_hardware::apdu::{GET_UID_APDU, parse_uid_response};
///
/// #[tokio::main]
/// async fn main() -> nfcuid_hardware::Result<()> {
///     let (backend, handle) = MockSmartcard::new(&["Reader A"]);
///     handle.present_card("Reader A", &[0x04, 0xAE, 0x65, 0xCA]);
///
///     let session = backend.establish_context().await?;
///     let card = session.connect("Reader A").await?;
///     let response = card.transmit(&GET_UID_APDU).await?;
///
///     assert_eq!(parse_uid_response(&response)?.as_bytes(), &[0x04, 0xAE, 0x65, 0xCA]);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockSmartcard {
    shared: Arc<Shared>,
}

impl MockSmartcard {
    /// Create a mock subsystem with the given readers and no cards.
    pub fn new(readers: &[&str]) -> (Self, MockSmartcardHandle) {
        let shared = Arc::new(Shared::default());
        shared.lock().readers = readers.iter().map(|r| r.to_string()).collect();

        (
            Self {
                shared: Arc::clone(&shared),
            },
            MockSmartcardHandle { shared },
        )
    }
}

impl SmartcardBackend for MockSmartcard {
    type Session = MockSession;

    async fn establish_context(&self) -> Result<MockSession> {
        self.shared
            .lock()
            .begin(MockOperation::EstablishContext)
            .map_err(|e| HardwareError::service_unavailable(e.to_string()))?;

        Ok(MockSession {
            shared: Arc::clone(&self.shared),
        })
    }
}

/// Session of the mock subsystem.
#[derive(Debug)]
pub struct MockSession {
    shared: Arc<Shared>,
}

impl ReaderSession for MockSession {
    type Card = MockCard;

    async fn list_readers(&self) -> Result<Vec<String>> {
        let mut state = self.shared.lock();
        state.begin(MockOperation::ListReaders)?;
        Ok(state.readers.clone())
    }

    async fn wait_for_status_change(
        &self,
        states: &mut [ReaderState],
        timeout: Option<Duration>,
    ) -> Result<()> {
        let generation = {
            let mut state = self.shared.lock();
            state.begin(MockOperation::StatusChange)?;
            state.cancellations
        };

        let wait = async {
            loop {
                // Register interest before inspecting the state so that a
                // change between the check and the await is not lost.
                let mut notified = pin!(self.shared.changed.notified());
                notified.as_mut().enable();

                {
                    let state = self.shared.lock();
                    if state.cancellations != generation {
                        return Err(HardwareError::Cancelled);
                    }
                    let mut changed = false;
                    for reader_state in states.iter_mut() {
                        let actual = state.reader_state(&reader_state.reader);
                        if reader_state.current_state.without(StateFlags::CHANGED) != actual {
                            reader_state.event_state = actual | StateFlags::CHANGED;
                            changed = true;
                        } else {
                            reader_state.event_state = actual;
                        }
                    }
                    if changed {
                        return Ok(());
                    }
                }

                notified.await;
            }
        };

        match timeout {
            Some(duration) => tokio::time::timeout(duration, wait)
                .await
                .map_err(|_| HardwareError::timeout(duration))?,
            None => wait.await,
        }
    }

    async fn connect(&self, reader: &str) -> Result<MockCard> {
        let mut state = self.shared.lock();
        state.begin(MockOperation::Connect)?;

        let actual = state.reader_state(reader);
        if actual == StateFlags::UNKNOWN {
            return Err(HardwareError::unknown_reader(reader));
        }
        if actual == StateFlags::EMPTY {
            return Err(HardwareError::no_card(format!("no card in {}", reader)));
        }

        Ok(MockCard {
            shared: Arc::clone(&self.shared),
            reader: reader.to_string(),
        })
    }

    async fn release(self) -> Result<()> {
        self.shared.lock().releases += 1;
        Ok(())
    }
}

/// Connection to a card in the mock subsystem.
#[derive(Debug)]
pub struct MockCard {
    shared: Arc<Shared>,
    reader: String,
}

impl CardConnection for MockCard {
    async fn transmit(&self, apdu: &[u8]) -> Result<Vec<u8>> {
        let mut state = self.shared.lock();
        state.begin(MockOperation::Transmit)?;
        state.transmitted.push(apdu.to_vec());

        state
            .cards
            .get(&self.reader)
            .cloned()
            .ok_or_else(|| HardwareError::no_card(format!("card removed from {}", self.reader)))
    }

    async fn disconnect(self) -> Result<()> {
        self.shared.lock().disconnects += 1;
        Ok(())
    }
}

/// Handle for controlling a mock smartcard subsystem.
///
/// Cloning the handle shares the same subsystem.
#[derive(Debug, Clone)]
pub struct MockSmartcardHandle {
    shared: Arc<Shared>,
}

impl MockSmartcardHandle {
    /// Place a card answering with `uid` and a success status word.
    pub fn present_card(&self, reader: &str, uid: &[u8]) {
        let mut response = uid.to_vec();
        response.extend_from_slice(&STATUS_SUCCESS);
        self.present_raw(reader, response);
    }

    /// Place a card answering `GET DATA` with exactly `response`.
    pub fn present_raw(&self, reader: &str, response: Vec<u8>) {
        let reader = reader.to_string();
        self.shared.update(|state| {
            state.cards.insert(reader, response);
        });
    }

    /// Take the card out of `reader`.
    pub fn remove_card(&self, reader: &str) {
        self.shared.update(|state| {
            state.cards.remove(reader);
        });
    }

    /// Replace the set of attached readers.
    pub fn set_readers(&self, readers: &[&str]) {
        let readers = readers.iter().map(|r| r.to_string()).collect();
        self.shared.update(|state| state.readers = readers);
    }

    /// Make the next `times` calls of `operation` fail.
    pub fn fail_next(&self, operation: MockOperation, times: usize) {
        self.shared.update(|state| {
            let queue = state.failures.entry(operation).or_default();
            queue.extend((0..times).map(|i| format!("scripted {:?} failure #{}", operation, i + 1)));
        });
    }

    /// Interrupt every pending status wait with [`HardwareError::Cancelled`].
    pub fn cancel_waits(&self) {
        self.shared.update(|state| state.cancellations += 1);
    }

    /// Number of calls made to `operation` so far.
    pub fn calls(&self, operation: MockOperation) -> usize {
        self.shared.lock().calls.get(&operation).copied().unwrap_or(0)
    }

    /// APDUs transmitted so far.
    pub fn transmitted(&self) -> Vec<Vec<u8>> {
        self.shared.lock().transmitted.clone()
    }

    /// Sessions released so far.
    pub fn releases(&self) -> usize {
        self.shared.lock().releases
    }

    /// Card connections closed so far.
    pub fn disconnects(&self) -> usize {
        self.shared.lock().disconnects
    }
}

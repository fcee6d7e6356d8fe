//! Card presence watcher.
//!
//! Drives one reader session through the [`WatcherStateMachine`]: context,
//! enumeration, selection, then the wait / read / release cycle. Every
//! fallible hardware step runs under the [`RetryPolicy`]; failures of
//! system-level steps are reported to the [`FailureTracker`], which may
//! escalate to a restart. The watcher never notifies the operator itself.

use crate::error::{Operation, WatcherError};
use crate::failure::{FailureCategory, FailureOutcome, FailureTracker};
use crate::retry::{RetryError, RetryPolicy};
use crate::selection::{self, DevicePrompt};
use crate::state_machine::{WatcherState, WatcherStateMachine};
use nfcuid_core::{DeviceSelection, Uid};
use nfcuid_hardware::apdu::{GET_UID_APDU, parse_uid_response};
use nfcuid_hardware::{
    CardConnection, HardwareError, ReaderSession, ReaderState, SmartcardBackend, StateFlags,
};
use std::sync::Arc;

/// Report a failed system-level step and translate the tracker's verdict.
///
/// A cancelled call is not a failure of the system and is not reported.
async fn escalate(
    tracker: &FailureTracker,
    category: FailureCategory,
    operation: Operation,
    source: HardwareError,
) -> WatcherError {
    if source.is_cancelled() {
        tracing::debug!(%operation, "hardware call cancelled");
        return WatcherError::hardware(operation, source);
    }
    match tracker.record_failure(category, &source).await {
        FailureOutcome::Tracked { .. } => WatcherError::hardware(operation, source),
        FailureOutcome::RestartTriggered { .. } | FailureOutcome::RestartPending => {
            WatcherError::RestartTriggered
        }
        FailureOutcome::RestartFailed(e) => WatcherError::RestartFailed(e),
    }
}

fn finish(error: RetryError<WatcherError>) -> WatcherError {
    match error {
        RetryError::Exhausted { attempts, last } => last.after_attempts(attempts),
        RetryError::Aborted { error, .. } => error,
    }
}

/// Block until the reader reports `wanted`.
///
/// Starts from `known` as the caller's view of the reader and waits without a
/// timeout: no card ever arriving is a valid idle state.
async fn wait_for_flag<S: ReaderSession>(
    session: &S,
    reader: &str,
    known: StateFlags,
    wanted: StateFlags,
) -> nfcuid_hardware::Result<()> {
    let mut states = [ReaderState::new(reader, known)];
    loop {
        session.wait_for_status_change(&mut states, None).await?;
        tracing::trace!(device = reader, state = %states[0].event_state, "reader state changed");
        if states[0].event_state.contains(wanted) {
            return Ok(());
        }
        states[0].sync_current_state();
    }
}

pub struct CardPresenceWatcher<B: SmartcardBackend> {
    backend: B,
    retry: RetryPolicy,
    tracker: Arc<FailureTracker>,
    machine: WatcherStateMachine,
}

impl<B: SmartcardBackend> CardPresenceWatcher<B> {
    pub fn new(backend: B, retry: RetryPolicy, tracker: Arc<FailureTracker>) -> Self {
        Self {
            backend,
            retry,
            tracker,
            machine: WatcherStateMachine::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn tracker(&self) -> &Arc<FailureTracker> {
        &self.tracker
    }

    pub fn state(&self) -> WatcherState {
        self.machine.current_state()
    }

    pub fn machine(&self) -> &WatcherStateMachine {
        &self.machine
    }

    /// `ContextPending → ContextEstablished`.
    ///
    /// A successful context resets the failure counter.
    pub async fn open_session(&mut self) -> Result<B::Session, WatcherError> {
        self.machine.reset();

        let backend = &self.backend;
        let tracker = &*self.tracker;
        let session = self
            .retry
            .run_until(
                move |attempt| async move {
                    match backend.establish_context().await {
                        Ok(session) => Ok(session),
                        Err(e) => {
                            tracing::warn!(attempt, error = %e, "failed to establish PC/SC context");
                            Err(escalate(
                                tracker,
                                FailureCategory::PcscContext,
                                Operation::EstablishContext,
                                e,
                            )
                            .await)
                        }
                    }
                },
                WatcherError::is_terminal,
            )
            .await
            .map_err(finish)?;

        tracing::info!("PC/SC context established");
        self.tracker.record_success();
        self.machine.transition_to(WatcherState::ContextEstablished)?;
        Ok(session)
    }

    /// `ContextEstablished → ReadersListed`.
    ///
    /// An empty list is [`WatcherError::NoReaders`] and is not tracked.
    pub async fn list_readers(&mut self, session: &B::Session) -> Result<Vec<String>, WatcherError> {
        let readers = match session.list_readers().await {
            Ok(readers) => readers,
            Err(e) => {
                tracing::error!(error = %e, "failed to list readers");
                return Err(escalate(
                    &self.tracker,
                    FailureCategory::ReaderEnumeration,
                    Operation::ListReaders,
                    e,
                )
                .await);
            }
        };

        if readers.is_empty() {
            tracing::warn!("no NFC readers found");
            return Err(WatcherError::NoReaders);
        }

        tracing::info!(count = readers.len(), "found NFC readers");
        for (i, reader) in readers.iter().enumerate() {
            tracing::info!(index = i + 1, name = %reader, "available reader");
        }

        self.machine.transition_to(WatcherState::ReadersListed)?;
        Ok(readers)
    }

    /// `ReadersListed → DeviceSelected`. Returns the chosen reader name.
    pub async fn select_device<P: DevicePrompt>(
        &mut self,
        readers: &[String],
        selection: &mut DeviceSelection,
        prompt: &mut P,
    ) -> Result<String, WatcherError> {
        let index = selection::select_device(selection, readers, prompt).await?;
        let reader = readers[index].clone();

        tracing::info!(device = selection.number(), name = %reader, "device selected");
        self.machine.transition_to(WatcherState::DeviceSelected)?;
        Ok(reader)
    }

    /// `→ AwaitingCard → CardPresent`.
    ///
    /// Polling failures are tracked as status monitoring and retried.
    pub async fn wait_for_card(&mut self, session: &B::Session, reader: &str) -> Result<(), WatcherError> {
        if self.machine.current_state() != WatcherState::AwaitingCard {
            self.machine.transition_to(WatcherState::AwaitingCard)?;
        }

        let tracker = &*self.tracker;
        self.retry
            .run_until(
                move |attempt| async move {
                    match wait_for_flag(session, reader, StateFlags::UNAWARE, StateFlags::PRESENT).await {
                        Ok(()) => Ok(()),
                        Err(e) => {
                            tracing::warn!(attempt, device = reader, error = %e, "reader status monitoring failed");
                            Err(escalate(
                                tracker,
                                FailureCategory::StatusMonitoring,
                                Operation::WaitForCard,
                                e,
                            )
                            .await)
                        }
                    }
                },
                |e: &WatcherError| e.is_terminal() || e.is_cancelled(),
            )
            .await
            .map_err(finish)?;

        self.machine.transition_to(WatcherState::CardPresent)?;
        Ok(())
    }

    /// Read the UID of the card in `reader`.
    ///
    /// Connection failures are tracked. Transmit and response failures only
    /// concern this card: they are retried but never tracked.
    pub async fn read_uid(&mut self, session: &B::Session, reader: &str) -> Result<Uid, WatcherError> {
        let tracker = &*self.tracker;
        let card = self
            .retry
            .run_until(
                move |attempt| async move {
                    match session.connect(reader).await {
                        Ok(card) => Ok(card),
                        Err(e) => {
                            tracing::warn!(attempt, device = reader, error = %e, "failed to connect to card");
                            Err(escalate(
                                tracker,
                                FailureCategory::ReaderConnection,
                                Operation::Connect,
                                e,
                            )
                            .await)
                        }
                    }
                },
                WatcherError::is_terminal,
            )
            .await
            .map_err(finish)?;
        tracing::debug!(device = reader, "connected to card");

        let connection = &card;
        let uid = self
            .retry
            .run(move |attempt| async move {
                let response = connection.transmit(&GET_UID_APDU).await;
                response
                    .and_then(|response| parse_uid_response(&response))
                    .map_err(|e| {
                        tracing::debug!(attempt, device = reader, error = %e, "UID read attempt failed");
                        WatcherError::hardware(Operation::ReadUid, e)
                    })
            })
            .await
            .map_err(finish);

        if let Err(e) = card.disconnect().await {
            tracing::debug!(device = reader, error = %e, "failed to disconnect from card");
        }
        uid
    }

    /// `CardPresent → AwaitingRelease → AwaitingCard`.
    ///
    /// The watcher returns to `AwaitingCard` even when the wait fails; the
    /// card has already been handled.
    pub async fn wait_for_release(&mut self, session: &B::Session, reader: &str) -> Result<(), WatcherError> {
        self.machine.transition_to(WatcherState::AwaitingRelease)?;

        let result = match wait_for_flag(session, reader, StateFlags::PRESENT, StateFlags::EMPTY).await {
            Ok(()) => Ok(()),
            Err(e) => Err(escalate(
                &self.tracker,
                FailureCategory::StatusMonitoring,
                Operation::WaitForRelease,
                e,
            )
            .await),
        };

        self.machine.transition_to(WatcherState::AwaitingCard)?;
        result
    }

    /// Release the session and unwind to `ContextPending`.
    pub async fn close_session(&mut self, session: B::Session) {
        match session.release().await {
            Ok(()) => tracing::info!("PC/SC context released"),
            Err(e) => tracing::warn!(error = %e, "failed to release PC/SC context"),
        }
        self.machine.reset();
    }
}

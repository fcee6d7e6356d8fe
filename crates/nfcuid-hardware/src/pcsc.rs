//! PC/SC backend built on the `pcsc` crate.
//!
//! Every PC/SC call blocks, so each one runs on the blocking thread pool.
//! [`pcsc::Context`] is reference counted and thread safe, which lets the
//! session hand a clone to each blocking closure.
//!
//! Reader status waits have no timeout. Dropping a pending wait calls
//! `SCardCancel` on the context so the blocking thread is released.

use crate::blocking::{blocking, blocking_cancellable};
use crate::{
    HardwareError, Result,
    traits::{CardConnection, ReaderSession, SmartcardBackend},
    types::{ReaderState, StateFlags},
};
use pcsc::{Context, Disposition, Protocols, Scope, ShareMode, State};
use std::ffi::CString;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

fn map_error(error: pcsc::Error, timeout: Option<Duration>) -> HardwareError {
    match error {
        pcsc::Error::Timeout => HardwareError::timeout(timeout.unwrap_or_default()),
        pcsc::Error::Cancelled => HardwareError::Cancelled,
        pcsc::Error::NoService
        | pcsc::Error::ServiceStopped
        | pcsc::Error::InvalidHandle
        | pcsc::Error::NoReadersAvailable => HardwareError::service_unavailable(error.to_string()),
        pcsc::Error::RemovedCard | pcsc::Error::NoSmartcard | pcsc::Error::UnpoweredCard => {
            HardwareError::no_card(error.to_string())
        }
        _ => HardwareError::transport(error.to_string()),
    }
}

fn reader_name(reader: &str) -> Result<CString> {
    CString::new(reader)
        .map_err(|_| HardwareError::malformed(format!("reader name contains NUL: {:?}", reader)))
}

/// System PC/SC service.
#[derive(Debug, Default, Clone, Copy)]
pub struct PcscBackend;

impl PcscBackend {
    pub fn new() -> Self {
        Self
    }
}

impl SmartcardBackend for PcscBackend {
    type Session = PcscSession;

    async fn establish_context(&self) -> Result<PcscSession> {
        let context = blocking(|| {
            Context::establish(Scope::User)
                .map_err(|e| HardwareError::service_unavailable(e.to_string()))
        })
        .await?;

        tracing::debug!("PC/SC context established");
        Ok(PcscSession { context })
    }
}

/// An established PC/SC context.
pub struct PcscSession {
    context: Context,
}

impl std::fmt::Debug for PcscSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcscSession").finish_non_exhaustive()
    }
}

impl ReaderSession for PcscSession {
    type Card = PcscCard;

    async fn list_readers(&self) -> Result<Vec<String>> {
        let context = self.context.clone();
        blocking(move || match context.list_readers_owned() {
            Ok(readers) => Ok(readers
                .into_iter()
                .map(|name| name.to_string_lossy().into_owned())
                .collect()),
            Err(pcsc::Error::NoReadersAvailable) => Ok(Vec::new()),
            Err(e) => Err(map_error(e, None)),
        })
        .await
    }

    async fn wait_for_status_change(
        &self,
        states: &mut [ReaderState],
        timeout: Option<Duration>,
    ) -> Result<()> {
        let context = self.context.clone();
        let canceller = self.context.clone();
        let request = states
            .iter()
            .map(|s| Ok((reader_name(&s.reader)?, s.current_state.bits())))
            .collect::<Result<Vec<_>>>()?;

        let wait = move || {
            let mut pcsc_states: Vec<pcsc::ReaderState> = request
                .into_iter()
                .map(|(name, bits)| pcsc::ReaderState::new(name, State::from_bits_truncate(bits as _)))
                .collect();

            context
                .get_status_change(timeout, &mut pcsc_states)
                .map_err(|e| map_error(e, timeout))?;

            Ok(pcsc_states
                .iter()
                .map(|s| s.event_state().bits() as u32)
                .collect::<Vec<_>>())
        };
        let cancel = move || {
            if let Err(e) = canceller.cancel() {
                tracing::warn!(error = %e, "failed to cancel reader status wait");
            }
        };
        let events = blocking_cancellable(wait, cancel).await?;

        for (state, bits) in states.iter_mut().zip(events) {
            state.event_state = StateFlags::from_bits(bits);
        }
        Ok(())
    }

    async fn connect(&self, reader: &str) -> Result<PcscCard> {
        let context = self.context.clone();
        let name = reader_name(reader)?;

        let card = blocking(move || {
            context
                .connect(&name, ShareMode::Shared, Protocols::ANY)
                .map_err(|e| map_error(e, None))
        })
        .await?;

        Ok(PcscCard {
            card: Arc::new(Mutex::new(card)),
        })
    }

    async fn release(self) -> Result<()> {
        let context = self.context;
        blocking(move || {
            context
                .release()
                .map_err(|(_, e)| HardwareError::transport(e.to_string()))
        })
        .await
    }
}

/// Connection to a card through PC/SC.
pub struct PcscCard {
    card: Arc<Mutex<pcsc::Card>>,
}

impl std::fmt::Debug for PcscCard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcscCard").finish_non_exhaustive()
    }
}

impl CardConnection for PcscCard {
    async fn transmit(&self, apdu: &[u8]) -> Result<Vec<u8>> {
        let card = Arc::clone(&self.card);
        let apdu = apdu.to_vec();

        blocking(move || {
            let card = card.lock().unwrap_or_else(PoisonError::into_inner);
            let mut buffer = [0u8; pcsc::MAX_BUFFER_SIZE];
            let response = card
                .transmit(&apdu, &mut buffer)
                .map_err(|e| map_error(e, None))?;
            Ok(response.to_vec())
        })
        .await
    }

    async fn disconnect(self) -> Result<()> {
        let card = Arc::try_unwrap(self.card)
            .map_err(|_| HardwareError::internal("card connection still in use"))?
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);

        blocking(move || {
            card.disconnect(Disposition::ResetCard)
                .map_err(|(_, e)| map_error(e, None))
        })
        .await
    }
}

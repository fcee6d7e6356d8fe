//! Running blocking smartcard calls from async code.
//!
//! A blocking call keeps running after the future awaiting it is dropped,
//! and the runtime cannot shut down until it returns. Calls that may block
//! indefinitely go through [`blocking_cancellable`] so that dropping the
//! future also interrupts the call.

use crate::{HardwareError, Result};

/// Run `f` on the blocking thread pool.
pub async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| HardwareError::internal(format!("blocking task failed: {}", e)))?
}

/// Run `f` on the blocking thread pool; `cancel` runs if the returned future
/// is dropped before `f` has finished.
///
/// `cancel` must make `f` return promptly.
pub async fn blocking_cancellable<T, F, C>(f: F, cancel: C) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
    C: FnOnce(),
{
    let mut guard = CancelOnDrop(Some(cancel));
    let result = blocking(f).await;
    guard.disarm();
    result
}

struct CancelOnDrop<C: FnOnce()>(Option<C>);

impl<C: FnOnce()> CancelOnDrop<C> {
    fn disarm(&mut self) {
        self.0 = None;
    }
}

impl<C: FnOnce()> Drop for CancelOnDrop<C> {
    fn drop(&mut self) {
        if let Some(cancel) = self.0.take() {
            cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    /// A blocking wait that only ends when `release` fires, like an idle
    /// status-change wait ends only on SCardCancel.
    fn idle_wait() -> (impl FnOnce() -> Result<()> + Send + 'static, impl FnOnce(), Arc<AtomicBool>) {
        let (tx, rx) = mpsc::channel::<()>();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let wait = move || {
            rx.recv()
                .map_err(|e| HardwareError::internal(e.to_string()))?;
            Err(HardwareError::Cancelled)
        };
        let release = move || {
            flag.store(true, Ordering::SeqCst);
            let _ = tx.send(());
        };
        (wait, release, cancelled)
    }

    #[test]
    fn test_dropped_wait_lets_runtime_shut_down() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let (wait, release, cancelled) = idle_wait();

        runtime.block_on(async {
            tokio::select! {
                _ = blocking_cancellable(wait, release) => panic!("idle wait returned on its own"),
                _ = tokio::time::sleep(Duration::from_millis(50)) => {}
            }
        });
        assert!(cancelled.load(Ordering::SeqCst));

        let (done_tx, done_rx) = mpsc::channel();
        std::thread::spawn(move || {
            drop(runtime);
            let _ = done_tx.send(());
        });
        assert!(
            done_rx.recv_timeout(Duration::from_secs(5)).is_ok(),
            "runtime shutdown blocked by the idle wait"
        );
    }

    #[tokio::test]
    async fn test_finished_call_is_not_cancelled() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let value = blocking_cancellable(|| Ok(7), move || flag.store(true, Ordering::SeqCst))
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert!(!cancelled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_error_passes_through() {
        let result: Result<()> = blocking(|| Err(HardwareError::transport("reader busy"))).await;
        assert!(matches!(result, Err(HardwareError::Transport { .. })));
    }
}

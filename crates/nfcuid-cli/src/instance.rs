//! Single-instance lock.
//!
//! The lock is a file holding the owner's PID, created with create-new
//! semantics. A lock whose PID is no longer running is stale and replaced.

use anyhow::{Context, Result, bail};
use nfcuid_core::constants::APP_NAME;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long a restarted process waits for its predecessor's lock.
pub const RESTART_LOCK_WAIT: Duration = Duration::from_secs(10);

const RESTART_LOCK_POLL: Duration = Duration::from_millis(500);

/// Default lock location in the system temp directory.
pub fn default_lock_path() -> PathBuf {
    std::env::temp_dir().join(format!("{}.lock", APP_NAME))
}

/// Held lock; released on [`InstanceLock::release`] or drop.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    released: bool,
}

impl InstanceLock {
    /// Take the lock at `path`, replacing a stale lock once.
    pub fn acquire(path: &Path) -> Result<Self> {
        match create(path) {
            Ok(lock) => return Ok(lock),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(e).with_context(|| format!("failed to create lock file {}", path.display()));
            }
        }

        match read_owner(path) {
            Some(pid) if process_alive(pid) => {
                bail!("another instance is already running (PID {})", pid)
            }
            owner => {
                tracing::warn!(path = %path.display(), pid = ?owner, "removing stale lock file");
                fs::remove_file(path)
                    .with_context(|| format!("failed to remove stale lock file {}", path.display()))?;
            }
        }

        create(path).with_context(|| format!("failed to create lock file {}", path.display()))
    }

    /// Take the lock, retrying for up to `wait` while another instance holds it.
    pub async fn acquire_with_wait(path: &Path, wait: Duration) -> Result<Self> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            match Self::acquire(path) {
                Ok(lock) => return Ok(lock),
                Err(e) if tokio::time::Instant::now() >= deadline => return Err(e),
                Err(e) => {
                    tracing::debug!(error = %e, "lock busy, waiting for previous instance");
                    tokio::time::sleep(RESTART_LOCK_POLL).await;
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the lock file.
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "lock released"),
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "failed to remove lock file"),
        }
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        self.remove();
    }
}

fn create(path: &Path) -> std::io::Result<InstanceLock> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    if let Err(e) = write!(file, "{}", std::process::id()) {
        let _ = fs::remove_file(path);
        return Err(e);
    }
    Ok(InstanceLock {
        path: path.to_path_buf(),
        released: false,
    })
}

fn read_owner(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn process_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(true)
}

#[cfg(windows)]
fn process_alive(pid: u32) -> bool {
    std::process::Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid), "/NH"])
        .output()
        .map(|output| String::from_utf8_lossy(&output.stdout).contains(&pid.to_string()))
        .unwrap_or(true)
}

#[cfg(not(any(unix, windows)))]
fn process_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("nfcuid.lock")
    }

    #[test]
    fn test_acquire_writes_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);

        let lock = InstanceLock::acquire(&path).unwrap();
        assert_eq!(read_owner(lock.path()), Some(std::process::id()));
    }

    #[test]
    fn test_second_acquire_fails_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);

        let _lock = InstanceLock::acquire(&path).unwrap();
        let err = InstanceLock::acquire(&path).unwrap_err();
        assert!(err.to_string().contains("already running"));
    }

    #[test]
    fn test_release_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);

        let lock = InstanceLock::acquire(&path).unwrap();
        lock.release();
        assert!(!path.exists());
        assert!(InstanceLock::acquire(&path).is_ok());
    }

    #[test]
    fn test_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);

        drop(InstanceLock::acquire(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_unreadable_lock_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);
        fs::write(&path, "not a pid").unwrap();

        let lock = InstanceLock::acquire(&path).unwrap();
        assert_eq!(read_owner(lock.path()), Some(std::process::id()));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_dead_pid_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);
        // Above the kernel's PID limit.
        fs::write(&path, "4194305").unwrap();

        assert!(InstanceLock::acquire(&path).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_gives_up_after_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);
        let _held = InstanceLock::acquire(&path).unwrap();

        let start = tokio::time::Instant::now();
        let result = InstanceLock::acquire_with_wait(&path, Duration::from_secs(2)).await;

        assert!(result.is_err());
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_succeeds_once_released() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);
        let held = InstanceLock::acquire(&path).unwrap();

        let waiter = InstanceLock::acquire_with_wait(&path, RESTART_LOCK_WAIT);
        let releaser = async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            held.release();
        };
        let (result, ()) = tokio::join!(waiter, releaser);

        assert!(result.is_ok());
    }
}

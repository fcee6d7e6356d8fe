//! Process replacement for self-restart.
//!
//! A restart re-invokes the current executable with the current arguments
//! plus the [`AUTO_RESTART_FLAG`] marker. The caller exits once the spawn is
//! confirmed.

use nfcuid_core::constants::AUTO_RESTART_FLAG;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RestartError {
    #[error("cannot locate the current executable: {0}")]
    Executable(#[source] io::Error),

    #[error("failed to start replacement process: {0}")]
    Spawn(#[source] io::Error),
}

/// Starts the replacement process.
pub trait Restarter: Send + Sync {
    /// Spawn the replacement and return its process id.
    fn spawn_replacement(&self) -> Result<u32, RestartError>;
}

/// Arguments for the replacement: `args` without any earlier marker, then
/// the marker once.
pub fn restart_arguments<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args: Vec<OsString> = args
        .into_iter()
        .filter(|arg| arg != AUTO_RESTART_FLAG)
        .collect();
    args.push(OsString::from(AUTO_RESTART_FLAG));
    args
}

/// Restarter that spawns a real process with inherited stdio.
#[derive(Debug, Clone)]
pub struct ProcessRestarter {
    executable: PathBuf,
    args: Vec<OsString>,
}

impl ProcessRestarter {
    /// `args` excludes the program name.
    pub fn new<I>(executable: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = OsString>,
    {
        Self {
            executable: executable.into(),
            args: restart_arguments(args),
        }
    }

    pub fn from_current_process() -> Result<Self, RestartError> {
        let executable = std::env::current_exe().map_err(RestartError::Executable)?;
        Ok(Self::new(executable, std::env::args_os().skip(1)))
    }

    pub fn executable(&self) -> &PathBuf {
        &self.executable
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }
}

impl Restarter for ProcessRestarter {
    fn spawn_replacement(&self) -> Result<u32, RestartError> {
        tracing::info!(
            executable = %self.executable.display(),
            args = ?self.args,
            "starting replacement process"
        );

        let child = Command::new(&self.executable)
            .args(&self.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(RestartError::Spawn)?;

        Ok(child.id())
    }
}

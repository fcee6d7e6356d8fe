//! `nfcuid`: types the UID of NFC cards presented to a PC/SC reader.
//!
//! Usage:
//!     nfcuid --device 1 --in-char hyphen --end-char enter

mod cli;
mod instance;
mod logging;

use anyhow::Result;
use clap::Parser;
use cli::Args;
use instance::{InstanceLock, RESTART_LOCK_WAIT};
use logging::{LogConfig, init_logging};
use nfcuid_core::Config;
use nfcuid_hardware::devices::AnySmartcardBackend;
use nfcuid_service::keyboard::AnyKeystrokeSink;
use nfcuid_service::restart::ProcessRestarter;
use nfcuid_service::selection::StdinPrompt;
use nfcuid_service::{
    Alerts, CardPresenceWatcher, FailureTracker, Notifier, ReaderService, RestartPolicy, RetryPolicy,
    ServiceExit,
};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Longest wait for blocking calls still running after the service stopped.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(&LogConfig {
        dir: (!args.no_log_file).then(|| args.log_dir.clone()),
    });

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "failed to start the async runtime");
            return ExitCode::FAILURE;
        }
    };
    let code = runtime.block_on(start(args));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    code
}

async fn start(args: Args) -> ExitCode {
    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let lock_path = instance::default_lock_path();
    let lock = if args.auto_restart {
        InstanceLock::acquire_with_wait(&lock_path, RESTART_LOCK_WAIT).await
    } else {
        InstanceLock::acquire(&lock_path)
    };
    let lock = match lock {
        Ok(lock) => {
            tracing::debug!(path = %lock.path().display(), "instance lock acquired");
            lock
        }
        Err(e) => {
            tracing::error!(error = %e, "could not start");
            return ExitCode::FAILURE;
        }
    };

    let code = match run(&args, &config).await {
        Ok(ServiceExit::Cancelled) => {
            tracing::info!("stopped");
            ExitCode::SUCCESS
        }
        Ok(ServiceExit::Restarted) => {
            tracing::info!("handing over to the restarted process");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "stopped with an error");
            ExitCode::FAILURE
        }
    };
    lock.release();
    code
}

async fn run(args: &Args, config: &Config) -> Result<ServiceExit> {
    log_config(config);

    let backend = backend()?;
    tracing::info!(backend = backend.kind(), "smartcard backend ready");

    let alerts = Arc::new(Alerts::new(notifier(), config.notifications.clone()));
    let tracker = Arc::new(FailureTracker::new(
        RestartPolicy::from_config(&config.advanced),
        Arc::clone(&alerts),
        Arc::new(ProcessRestarter::from_current_process()?),
    ));
    let watcher = CardPresenceWatcher::new(backend, RetryPolicy::from_config(&config.advanced), tracker);
    let sink = AnyKeystrokeSink::platform_default()?;

    let mut service = ReaderService::new(config, watcher, sink, StdinPrompt::stdin(), alerts)
        .with_auto_restart(args.auto_restart);

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown_signal(cancel.clone()));

    Ok(service.run(&cancel).await?)
}

fn log_config(config: &Config) {
    let nfc = &config.nfc;
    tracing::info!(
        device = nfc.device,
        caps_lock = nfc.caps_lock,
        reverse = nfc.reverse,
        decimal = nfc.decimal,
        decimal_padding = nfc.decimal_padding,
        in_char = %nfc.in_char,
        end_char = %nfc.end_char,
        "output format"
    );
    let advanced = &config.advanced;
    tracing::info!(
        retry_attempts = advanced.retry_attempts,
        reconnect_delay = advanced.reconnect_delay,
        auto_reconnect = advanced.auto_reconnect,
        self_restart = advanced.self_restart,
        max_context_failures = advanced.max_context_failures,
        restart_delay = advanced.restart_delay,
        "recovery policy"
    );
}

#[cfg(feature = "hardware-pcsc")]
fn backend() -> Result<AnySmartcardBackend> {
    Ok(AnySmartcardBackend::Pcsc(nfcuid_hardware::pcsc::PcscBackend::new()))
}

#[cfg(not(feature = "hardware-pcsc"))]
fn backend() -> Result<AnySmartcardBackend> {
    anyhow::bail!(
        "{} was built without PC/SC support; rebuild with `--features hardware-pcsc`",
        nfcuid_core::constants::APP_NAME
    )
}

#[cfg(feature = "desktop-notify")]
fn notifier() -> Arc<dyn Notifier> {
    Arc::new(nfcuid_service::alerts::DesktopNotifier::new(
        nfcuid_core::constants::APP_NAME,
    ))
}

#[cfg(not(feature = "desktop-notify"))]
fn notifier() -> Arc<dyn Notifier> {
    Arc::new(nfcuid_service::alerts::LogNotifier)
}

async fn cancel_on_shutdown_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("shutdown signal received");
    cancel.cancel();
}

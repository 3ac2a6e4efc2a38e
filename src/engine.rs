//! Run coordination
//!
//! Wires the dispatcher and the churn controller to one stop signal, runs
//! them as two tokio tasks, and tears down the churn working directory once
//! both have returned.

use crate::churn::{ChurnController, ChurnReport, RetryPolicy, TrackerSwarm};
use crate::config::Config;
use crate::dispatcher::{Dispatcher, DispatcherSettings};
use crate::frontier::Frontier;
use crate::shutdown::{cleanup_work_dir, stop_channel, ShutdownSignals};
use crate::NoiseError;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the churn working directory, created next to the config file
pub const WORK_DIR_NAME: &str = ".noisewake-churn";

/// What a finished run left behind
#[derive(Debug)]
pub struct RunSummary {
    /// Final frontier size, if the dispatcher exited cleanly
    pub frontier_len: Option<usize>,

    /// Churn outcome, if the controller exited cleanly
    pub churn: Option<ChurnReport>,
}

/// Working directory used for churn scratch files
pub fn work_dir_for(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(WORK_DIR_NAME),
        _ => PathBuf::from(WORK_DIR_NAME),
    }
}

/// Runs until SIGINT/SIGTERM
pub async fn run(config: Config, config_path: &Path) -> crate::Result<RunSummary> {
    run_with_signals(config, config_path, || {
        let mut signals = ShutdownSignals::install()?;
        Ok(async move { signals.recv().await })
    })
    .await
}

/// Runs until the future produced by `install` completes
///
/// `install` is called before anything is spawned. If it fails, nothing
/// runs and the error is returned as [`NoiseError::Signal`].
pub async fn run_with_signals<I, F>(
    config: Config,
    config_path: &Path,
    install: I,
) -> crate::Result<RunSummary>
where
    I: FnOnce() -> io::Result<F>,
    F: Future<Output = ()>,
{
    let shutdown = install().map_err(NoiseError::Signal)?;
    run_until(config, config_path, shutdown).await
}

/// Runs until `shutdown` completes
///
/// # Shutdown protocol
///
/// 1. `shutdown` resolves
/// 2. The stop signal is triggered exactly once
/// 3. Both tasks are awaited; each returns at its next boundary
/// 4. The churn working directory is removed, best-effort
///
/// # Returns
///
/// * `Ok(RunSummary)` - The run started and shut down
/// * `Err(NoiseError)` - The run could not start
pub async fn run_until<F>(
    config: Config,
    config_path: &Path,
    shutdown: F,
) -> crate::Result<RunSummary>
where
    F: Future<Output = ()>,
{
    let work_dir = work_dir_for(config_path);
    let settings = DispatcherSettings::from_config(&config);
    let policy = RetryPolicy::from_config(&config);
    let descriptor = config.torrent_link.clone();

    let swarm = TrackerSwarm::new(&work_dir, settings.probe_timeout)?
        .with_dht_bootstrap(config.dht_bootstrap_nodes());
    let dispatcher = Dispatcher::new(Frontier::load(config, config_path), &settings)?;
    let churn = ChurnController::new(swarm, policy, descriptor);

    let (signal, listener) = stop_channel();
    let dispatcher_task = tokio::spawn(dispatcher.run(listener.clone()));
    let churn_task = tokio::spawn(churn.run(listener));

    tracing::info!("Traffic generation running, press Ctrl+C to stop");
    shutdown.await;
    if signal.trigger() {
        tracing::info!("Received stop signal, waiting for tasks to finish");
    }

    let frontier_len = match dispatcher_task.await {
        Ok(frontier) => Some(frontier.len()),
        Err(e) => {
            tracing::error!("Dispatcher task failed: {}", e);
            None
        }
    };

    let churn = match churn_task.await {
        Ok(report) => Some(report),
        Err(e) => {
            tracing::error!("Churn task failed: {}", e);
            None
        }
    };

    if let Err(e) = cleanup_work_dir(&work_dir) {
        tracing::warn!("{}", e);
    }

    Ok(RunSummary {
        frontier_len,
        churn,
    })
}

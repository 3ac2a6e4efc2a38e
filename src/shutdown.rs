//! Cooperative cancellation
//!
//! A single [`StopSignal`] is held by the coordinator; every long-running
//! task gets a [`StopListener`] and polls it at its own suspension points.
//! The signal is a `watch` channel carrying one boolean that only ever moves
//! from `false` to `true`.

use crate::CleanupError;
use std::io::ErrorKind;
use std::path::Path;
use tokio::sync::watch;

/// Creates a connected signal/listener pair
pub fn stop_channel() -> (StopSignal, StopListener) {
    let (tx, rx) = watch::channel(false);
    (StopSignal { tx }, StopListener { rx })
}

/// The sending half of the stop signal
#[derive(Debug)]
pub struct StopSignal {
    tx: watch::Sender<bool>,
}

impl StopSignal {
    /// Sets the stop state
    ///
    /// # Returns
    ///
    /// * `true` - This call set the state
    /// * `false` - It was already set
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        })
    }
}

/// The receiving half of the stop signal
#[derive(Debug, Clone)]
pub struct StopListener {
    rx: watch::Receiver<bool>,
}

impl StopListener {
    /// Returns true once stop has been requested
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes when stop is requested
    ///
    /// If the signal is dropped without ever being triggered, nothing can
    /// stop the listener any more and this never completes.
    pub async fn stopped(&mut self) {
        let closed = self.rx.wait_for(|stopped| *stopped).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

/// OS stop signals, registered up front
///
/// Registration happens in [`ShutdownSignals::install`] so a failure is
/// seen before any traffic starts, not when the first signal is awaited.
#[derive(Debug)]
pub struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(windows)]
    ctrl_c: tokio::signal::windows::CtrlC,
}

impl ShutdownSignals {
    /// Registers SIGINT and SIGTERM handlers (Ctrl+C on Windows)
    ///
    /// Must be called from within a tokio runtime.
    pub fn install() -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
            })
        }
        #[cfg(windows)]
        {
            Ok(Self {
                ctrl_c: tokio::signal::windows::ctrl_c()?,
            })
        }
    }

    /// Completes when the first stop signal arrives
    pub async fn recv(&mut self) {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.interrupt.recv() => {}
                _ = self.terminate.recv() => {}
            }
        }
        #[cfg(windows)]
        {
            self.ctrl_c.recv().await;
        }
    }
}

/// Removes a working directory and everything below it
///
/// A directory that is already gone counts as cleaned up.
pub fn cleanup_work_dir(path: &Path) -> Result<(), CleanupError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => {
            tracing::debug!("Removed working directory {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(CleanupError::RemoveDir {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_trigger_sets_state_once() {
        let (signal, listener) = stop_channel();

        assert!(!listener.is_stopped());
        assert!(signal.trigger());
        assert!(!signal.trigger());
        assert!(listener.is_stopped());
    }

    #[test]
    fn test_cloned_listener_sees_state() {
        let (signal, listener) = stop_channel();
        let late = listener.clone();
        signal.trigger();
        assert!(late.is_stopped());
    }

    #[tokio::test]
    async fn test_signal_handlers_install() {
        let mut signals = ShutdownSignals::install().unwrap();

        // Nothing has been sent, so waiting must not complete
        let waited = tokio::time::timeout(Duration::from_millis(50), signals.recv()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_stopped_wakes_on_trigger() {
        let (signal, mut listener) = stop_channel();

        let waiter = tokio::spawn(async move {
            listener.stopped().await;
        });
        signal.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("listener should wake")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_signal_never_stops() {
        let (signal, mut listener) = stop_channel();
        drop(signal);

        let result = tokio::time::timeout(Duration::from_secs(60), listener.stopped()).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let dir = tempdir().unwrap();
        let work = dir.path().join("scratch");
        std::fs::create_dir_all(work.join("nested")).unwrap();
        std::fs::write(work.join("nested").join("file"), b"x").unwrap();

        cleanup_work_dir(&work).unwrap();
        assert!(!work.exists());
        cleanup_work_dir(&work).unwrap();
    }
}

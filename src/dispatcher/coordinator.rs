//! Dispatcher - the sweep loop
//!
//! The dispatcher owns the frontier for the lifetime of the run. Each cycle
//! sweeps a snapshot of the frontier, merges what the probes harvest,
//! checkpoints, maybe runs a WebSocket sweep, then waits for the cadence.

use crate::config::Config;
use crate::dispatcher::scheduler::{SweepScheduler, WEBSOCKET_SWEEP_PROBABILITY};
use crate::frontier::Frontier;
use crate::probe::{HttpProber, WebSocketProber};
use crate::shutdown::StopListener;
use crate::ProbeError;
use std::time::{Duration, Instant};

/// Lifecycle of the dispatcher task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatcherState {
    Running,
    Stopping,
    Stopped,
}

/// Tunables for a dispatcher, usually derived from the configuration
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// Pause between sweeps
    pub cadence: Duration,

    /// Bound on one HTTP probe
    pub probe_timeout: Duration,

    /// Bound on one WebSocket handshake
    pub websocket_timeout: Duration,

    /// Chance of a WebSocket sweep after each HTTP sweep
    pub websocket_probability: f64,
}

impl DispatcherSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cadence: config.sweep_cadence(),
            probe_timeout: config.probe_timeout(),
            websocket_timeout: config.websocket_timeout(),
            websocket_probability: WEBSOCKET_SWEEP_PROBABILITY,
        }
    }
}

/// What one sweep did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// HTTP probes that got a response
    pub http_ok: usize,

    /// HTTP probes that failed
    pub http_failed: usize,

    /// URLs newly merged into the frontier
    pub discovered: usize,

    /// Whether a WebSocket sweep ran
    pub websocket_swept: bool,

    /// WebSocket probes that completed
    pub websocket_ok: usize,

    /// WebSocket probes that failed
    pub websocket_failed: usize,

    /// Whether the frontier checkpoint was written
    pub persisted: bool,

    /// Whether stop arrived before the sweep finished
    pub interrupted: bool,
}

/// Main dispatcher structure
pub struct Dispatcher {
    frontier: Frontier,
    http: HttpProber,
    websocket: WebSocketProber,
    scheduler: SweepScheduler,
    state: DispatcherState,
}

impl Dispatcher {
    /// Creates a dispatcher over a loaded frontier
    ///
    /// # Returns
    ///
    /// * `Ok(Dispatcher)` - Ready to run
    /// * `Err(ProbeError)` - The HTTP client could not be built
    pub fn new(frontier: Frontier, settings: &DispatcherSettings) -> Result<Self, ProbeError> {
        let scheduler = SweepScheduler::new(settings.cadence, settings.websocket_probability);
        Self::with_scheduler(frontier, settings, scheduler)
    }

    /// Creates a dispatcher with a caller-supplied scheduler
    pub fn with_scheduler(
        frontier: Frontier,
        settings: &DispatcherSettings,
        scheduler: SweepScheduler,
    ) -> Result<Self, ProbeError> {
        Ok(Self {
            frontier,
            http: HttpProber::new(settings.probe_timeout)?,
            websocket: WebSocketProber::new(settings.websocket_timeout),
            scheduler,
            state: DispatcherState::Running,
        })
    }

    /// The frontier as it stands now
    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    /// Runs sweeps until stop is requested
    ///
    /// Stop is observed at the top of every cycle, between probe pairs,
    /// and during the pause between sweeps. The frontier is handed back so
    /// the caller can inspect what the run discovered.
    pub async fn run(mut self, mut stop: StopListener) -> Frontier {
        tracing::info!(
            "Starting traffic generation: {} URLs, {} identities, {:?} between sweeps",
            self.frontier.len(),
            self.frontier.identities().len(),
            self.scheduler.cadence()
        );

        let mut sweeps: u64 = 0;
        let start_time = Instant::now();

        while self.state == DispatcherState::Running {
            if stop.is_stopped() {
                self.state = DispatcherState::Stopping;
                break;
            }

            let report = self.sweep(&stop).await;
            sweeps += 1;
            tracing::info!(
                "Sweep {} done: {} ok, {} failed, {} new URLs, frontier {}{}",
                sweeps,
                report.http_ok,
                report.http_failed,
                report.discovered,
                self.frontier.len(),
                if report.websocket_swept {
                    format!(
                        ", websocket {} ok / {} failed",
                        report.websocket_ok, report.websocket_failed
                    )
                } else {
                    String::new()
                }
            );

            if report.interrupted || !self.scheduler.pause(&mut stop).await {
                self.state = DispatcherState::Stopping;
            }
        }

        tracing::info!(
            "Stopping HTTP traffic after {} sweeps in {:?}",
            sweeps,
            start_time.elapsed()
        );
        self.state = DispatcherState::Stopped;
        self.frontier
    }

    /// Runs one sweep without pausing afterwards
    ///
    /// 1. Snapshot URLs and identities
    /// 2. HTTP probe every (URL, identity) pair, URL-major
    /// 3. Merge harvested links
    /// 4. Persist the frontier
    /// 5. Roll for a WebSocket sweep over the same snapshot
    pub async fn sweep(&mut self, stop: &StopListener) -> SweepReport {
        let urls = self.frontier.snapshot();
        let identities = self.frontier.identities().to_vec();
        let mut report = SweepReport::default();

        'urls: for url in &urls {
            for identity in &identities {
                if stop.is_stopped() {
                    report.interrupted = true;
                    break 'urls;
                }
                self.probe_http(url, identity, &mut report).await;
            }
        }

        match self.frontier.persist() {
            Ok(()) => report.persisted = true,
            Err(e) => tracing::error!("Failed to persist frontier: {}", e),
        }

        if !report.interrupted && self.scheduler.roll_websocket() {
            report.websocket_swept = true;
            self.websocket_sweep(&urls, &identities, stop, &mut report)
                .await;
        }

        report
    }

    async fn probe_http(&mut self, url: &str, identity: &str, report: &mut SweepReport) {
        tracing::debug!("Probing {} as {}", url, identity);

        match self.http.probe(url, identity).await {
            Ok(outcome) => {
                report.http_ok += 1;
                tracing::info!(
                    "GET {} as {:?} -> {} in {:?}",
                    outcome.url,
                    outcome.identity,
                    outcome.status,
                    outcome.elapsed
                );

                for link in &outcome.links {
                    if self.frontier.merge(link) {
                        report.discovered += 1;
                        tracing::info!("Added new URL to frontier: {}", link);
                    }
                }
            }
            Err(e) => {
                report.http_failed += 1;
                tracing::warn!("GET {} as {:?} failed: {}", url, identity, e);
            }
        }
    }

    async fn websocket_sweep(
        &self,
        urls: &[String],
        identities: &[String],
        stop: &StopListener,
        report: &mut SweepReport,
    ) {
        'urls: for url in urls {
            for identity in identities {
                if stop.is_stopped() {
                    report.interrupted = true;
                    break 'urls;
                }

                match self.websocket.probe(url, identity).await {
                    Ok(outcome) => {
                        report.websocket_ok += 1;
                        tracing::info!(
                            "WS {} as {:?} handshake in {:?}, sent {:?}",
                            outcome.url,
                            outcome.identity,
                            outcome.elapsed,
                            outcome.message
                        );
                    }
                    Err(e) => {
                        report.websocket_failed += 1;
                        tracing::warn!("WS {} as {:?} failed: {}", url, identity, e);
                    }
                }
            }
        }
    }
}

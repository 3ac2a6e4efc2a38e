//! Sweep pacing and the WebSocket roll
//!
//! The scheduler owns the two time/chance decisions the dispatcher makes
//! between sweeps, so they can be exercised without any network traffic.

use crate::shutdown::StopListener;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Chance that a sweep is followed by a WebSocket sweep
pub const WEBSOCKET_SWEEP_PROBABILITY: f64 = 0.2;

/// Decides when the next sweep starts and whether a WebSocket sweep runs
#[derive(Debug)]
pub struct SweepScheduler {
    /// Pause between two sweeps
    cadence: Duration,

    /// Chance of a WebSocket sweep, in `0.0..=1.0`
    websocket_probability: f64,

    rng: StdRng,
}

impl SweepScheduler {
    /// Creates a scheduler seeded from OS entropy
    pub fn new(cadence: Duration, websocket_probability: f64) -> Self {
        Self::with_rng(cadence, websocket_probability, StdRng::from_entropy())
    }

    /// Creates a scheduler with a caller-supplied generator
    ///
    /// The probability is clamped into `0.0..=1.0`.
    pub fn with_rng(cadence: Duration, websocket_probability: f64, rng: StdRng) -> Self {
        let websocket_probability = if websocket_probability.is_nan() {
            0.0
        } else {
            websocket_probability.clamp(0.0, 1.0)
        };

        Self {
            cadence,
            websocket_probability,
            rng,
        }
    }

    /// Pause between two sweeps
    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Rolls for a WebSocket sweep
    pub fn roll_websocket(&mut self) -> bool {
        self.rng.gen_bool(self.websocket_probability)
    }

    /// Sleeps for the cadence unless stop is requested first
    ///
    /// # Returns
    ///
    /// * `true` - The full cadence elapsed
    /// * `false` - Stop was requested while waiting
    pub async fn pause(&self, stop: &mut StopListener) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.cadence) => true,
            _ = stop.stopped() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::stop_channel;

    #[test]
    fn test_websocket_frequency_is_binomial() {
        const TRIALS: u32 = 10_000;
        let mut scheduler = SweepScheduler::with_rng(
            Duration::ZERO,
            WEBSOCKET_SWEEP_PROBABILITY,
            StdRng::seed_from_u64(0x5eed),
        );

        let hits = (0..TRIALS).filter(|_| scheduler.roll_websocket()).count() as f64;

        // Mean 2000, standard deviation 40; accept four standard deviations
        let mean = TRIALS as f64 * WEBSOCKET_SWEEP_PROBABILITY;
        let sd = (mean * (1.0 - WEBSOCKET_SWEEP_PROBABILITY)).sqrt();
        assert!(
            (hits - mean).abs() <= 4.0 * sd,
            "{} WebSocket sweeps out of {}",
            hits,
            TRIALS
        );
    }

    #[test]
    fn test_probability_edges() {
        let mut never = SweepScheduler::with_rng(Duration::ZERO, 0.0, StdRng::seed_from_u64(1));
        let mut always = SweepScheduler::with_rng(Duration::ZERO, 1.0, StdRng::seed_from_u64(1));
        let mut clamped = SweepScheduler::with_rng(Duration::ZERO, 7.5, StdRng::seed_from_u64(1));

        for _ in 0..100 {
            assert!(!never.roll_websocket());
            assert!(always.roll_websocket());
            assert!(clamped.roll_websocket());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_runs_full_cadence() {
        let (_signal, mut listener) = stop_channel();
        let scheduler = SweepScheduler::new(Duration::from_secs(30), 0.0);

        let start = tokio::time::Instant::now();
        assert!(scheduler.pause(&mut listener).await);
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_is_cut_short_by_stop() {
        let (signal, mut listener) = stop_channel();
        let scheduler = SweepScheduler::new(Duration::from_secs(3600), 0.0);

        signal.trigger();
        let start = tokio::time::Instant::now();
        assert!(!scheduler.pause(&mut listener).await);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}

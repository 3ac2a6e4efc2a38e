//! Churn controller - the join/retrieve/leave loop

use crate::churn::descriptor::SwarmDescriptor;
use crate::churn::policy::RetryPolicy;
use crate::churn::{Membership, Retrieval, Swarm};
use crate::shutdown::StopListener;
use crate::ChurnError;
use std::time::Duration;

/// Bound on leaving a swarm; stopped announces go to unresponsive trackers
/// too
const LEAVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Why the controller returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChurnExit {
    /// Every configured iteration ran
    Completed,
    /// Stop was requested
    Cancelled,
    /// Too many iterations failed in a row
    FailureThreshold,
    /// No descriptor was configured
    Disabled,
    /// The descriptor did not parse
    InvalidDescriptor,
}

/// Summary of a controller run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChurnReport {
    /// Iterations started
    pub iterations: u32,
    pub successes: u32,
    pub failures: u32,
    /// Peers handshaken with across all iterations
    pub peers_contacted: usize,
    pub exit: ChurnExit,
}

impl ChurnReport {
    fn new(exit: ChurnExit) -> Self {
        Self {
            iterations: 0,
            successes: 0,
            failures: 0,
            peers_contacted: 0,
            exit,
        }
    }
}

/// Repeatedly joins and leaves one swarm
pub struct ChurnController<S: Swarm> {
    swarm: S,
    policy: RetryPolicy,
    descriptor: Option<String>,
}

impl<S: Swarm> ChurnController<S> {
    /// Creates a controller
    ///
    /// # Arguments
    ///
    /// * `swarm` - How to join the swarm
    /// * `policy` - Iteration count, backoff and failure threshold
    /// * `descriptor` - The magnet URI; `None` disables churn
    pub fn new(swarm: S, policy: RetryPolicy, descriptor: Option<String>) -> Self {
        Self {
            swarm,
            policy,
            descriptor,
        }
    }

    /// Runs the churn loop until the policy is exhausted, stop is requested,
    /// or the consecutive-failure threshold is reached
    ///
    /// Joining, retrieving and the backoff race the stop signal. Leaving
    /// does not, so a joined swarm is left even when stop cuts the
    /// retrieval short. Iteration failures never propagate; they only count
    /// toward the threshold.
    pub async fn run(self, mut stop: StopListener) -> ChurnReport {
        let Some(raw) = self.descriptor.as_deref() else {
            tracing::info!("No torrent_link configured, churn disabled");
            return ChurnReport::new(ChurnExit::Disabled);
        };

        let descriptor = match SwarmDescriptor::parse(raw) {
            Ok(d) => d,
            Err(e) => {
                tracing::error!("Churn disabled: {}", e);
                return ChurnReport::new(ChurnExit::InvalidDescriptor);
            }
        };

        tracing::info!(
            "Starting churn: {} iterations over swarm {}",
            self.policy.attempts,
            descriptor.info_hash_hex()
        );
        tracing::debug!("Swarm descriptor: {}", raw);

        let mut report = ChurnReport::new(ChurnExit::Completed);
        let mut consecutive_failures = 0;

        for iteration in 0..self.policy.attempts {
            if stop.is_stopped() {
                report.exit = ChurnExit::Cancelled;
                break;
            }

            report.iterations += 1;
            let Some(outcome) = self.iterate(&descriptor, &mut stop).await else {
                report.exit = ChurnExit::Cancelled;
                break;
            };

            match outcome {
                Ok(retrieval) => {
                    consecutive_failures = 0;
                    report.successes += 1;
                    report.peers_contacted += retrieval.contacted;
                    tracing::info!(
                        "Churn iteration {}: contacted {} of {} advertised peers",
                        iteration + 1,
                        retrieval.contacted,
                        retrieval.advertised
                    );
                }
                Err(e) => {
                    consecutive_failures += 1;
                    report.failures += 1;
                    tracing::warn!(
                        "Churn iteration {} failed ({} in a row): {}",
                        iteration + 1,
                        consecutive_failures,
                        e
                    );

                    if self.policy.should_abort(consecutive_failures) {
                        tracing::error!(
                            "Giving up on churn after {} consecutive failures",
                            consecutive_failures
                        );
                        report.exit = ChurnExit::FailureThreshold;
                        break;
                    }
                }
            }

            if let Some(backoff) = self.policy.backoff_after(iteration) {
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = stop.stopped() => {
                        report.exit = ChurnExit::Cancelled;
                        break;
                    }
                }
            }
        }

        if report.exit == ChurnExit::Cancelled {
            tracing::info!("Stop torrent churn");
        }
        tracing::info!(
            "Churn finished: {} iterations, {} ok, {} failed",
            report.iterations,
            report.successes,
            report.failures
        );
        report
    }

    /// Join, retrieve, leave
    ///
    /// Returns `None` when stop won the race against joining or retrieving.
    /// Once joined, the membership is left either way, within
    /// `LEAVE_TIMEOUT`.
    async fn iterate(
        &self,
        descriptor: &SwarmDescriptor,
        stop: &mut StopListener,
    ) -> Option<Result<Retrieval, ChurnError>> {
        let joined = tokio::select! {
            joined = self.swarm.join(descriptor) => joined,
            _ = stop.stopped() => return None,
        };
        let mut membership = match joined {
            Ok(membership) => membership,
            Err(e) => return Some(Err(e)),
        };

        let retrieved = tokio::select! {
            retrieved = membership.retrieve() => Some(retrieved),
            _ = stop.stopped() => None,
        };

        if tokio::time::timeout(LEAVE_TIMEOUT, membership.leave())
            .await
            .is_err()
        {
            tracing::warn!("Leaving the swarm took longer than {:?}, abandoned", LEAVE_TIMEOUT);
        }
        retrieved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::churn::DEFAULT_BACKOFF;
    use crate::shutdown::stop_channel;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    const MAGNET: &str = "magnet:?xt=urn:btih:c9e15763f722f23e98a29decdfae341b98d53056";

    #[derive(Clone, Copy)]
    enum Step {
        Ok,
        JoinFails,
        RetrieveFails,
        Hang,
        HangLeave,
    }

    #[derive(Clone, Default)]
    struct ScriptedSwarm {
        script: Arc<Mutex<VecDeque<Step>>>,
        joins: Arc<AtomicU32>,
        leaves: Arc<AtomicU32>,
    }

    impl ScriptedSwarm {
        fn new(steps: &[Step]) -> Self {
            Self {
                script: Arc::new(Mutex::new(steps.iter().copied().collect())),
                ..Self::default()
            }
        }
    }

    struct ScriptedMembership {
        step: Step,
        leaves: Arc<AtomicU32>,
    }

    impl Swarm for ScriptedSwarm {
        type Membership = ScriptedMembership;

        async fn join(&self, _: &SwarmDescriptor) -> Result<ScriptedMembership, ChurnError> {
            self.joins.fetch_add(1, Ordering::SeqCst);
            let step = self.script.lock().unwrap().pop_front().unwrap_or(Step::Ok);
            match step {
                Step::JoinFails => Err(ChurnError::NoSourceResponded),
                step => Ok(ScriptedMembership {
                    step,
                    leaves: self.leaves.clone(),
                }),
            }
        }
    }

    impl Membership for ScriptedMembership {
        async fn retrieve(&mut self) -> Result<Retrieval, ChurnError> {
            match self.step {
                Step::RetrieveFails => Err(ChurnError::NoPeerReachable { advertised: 4 }),
                Step::Hang | Step::HangLeave => std::future::pending().await,
                _ => Ok(Retrieval {
                    advertised: 5,
                    contacted: 2,
                }),
            }
        }

        async fn leave(self) {
            self.leaves.fetch_add(1, Ordering::SeqCst);
            if let Step::HangLeave = self.step {
                std::future::pending::<()>().await;
            }
        }
    }

    fn controller(swarm: ScriptedSwarm, attempts: u32) -> ChurnController<ScriptedSwarm> {
        ChurnController::new(swarm, RetryPolicy::new(attempts), Some(MAGNET.to_string()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_every_iteration_without_trailing_sleep() {
        let swarm = ScriptedSwarm::new(&[]);
        let (_signal, listener) = stop_channel();

        let start = Instant::now();
        let report = controller(swarm.clone(), 4).run(listener).await;

        assert_eq!(report.exit, ChurnExit::Completed);
        assert_eq!(report.iterations, 4);
        assert_eq!(report.successes, 4);
        assert_eq!(report.peers_contacted, 8);
        assert_eq!(swarm.joins.load(Ordering::SeqCst), 4);
        assert_eq!(swarm.leaves.load(Ordering::SeqCst), 4);
        // Three pauses between four iterations, none after the last
        assert_eq!(start.elapsed(), DEFAULT_BACKOFF * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_iteration_never_sleeps() {
        let (_signal, listener) = stop_channel();

        let start = Instant::now();
        let report = controller(ScriptedSwarm::new(&[]), 1).run(listener).await;

        assert_eq!(report.iterations, 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborts_at_failure_threshold() {
        let swarm = ScriptedSwarm::new(&[Step::JoinFails, Step::RetrieveFails, Step::JoinFails]);
        let (_signal, listener) = stop_channel();

        let report = controller(swarm.clone(), 10).run(listener).await;

        assert_eq!(report.exit, ChurnExit::FailureThreshold);
        assert_eq!(report.iterations, 3);
        assert_eq!(report.failures, 3);
        // The membership whose retrieval failed was still left
        assert_eq!(swarm.leaves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_count() {
        let swarm = ScriptedSwarm::new(&[
            Step::JoinFails,
            Step::JoinFails,
            Step::Ok,
            Step::JoinFails,
            Step::JoinFails,
            Step::Ok,
        ]);
        let (_signal, listener) = stop_channel();

        let report = controller(swarm, 6).run(listener).await;

        assert_eq!(report.exit, ChurnExit::Completed);
        assert_eq!(report.successes, 2);
        assert_eq!(report.failures, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_backoff() {
        let (signal, listener) = stop_channel();
        let task = tokio::spawn(controller(ScriptedSwarm::new(&[]), 100).run(listener));

        // First iteration completes at t=0, then the controller sleeps 5s
        tokio::time::sleep(Duration::from_secs(7)).await;
        signal.trigger();
        let report = task.await.unwrap();

        assert_eq!(report.exit, ChurnExit::Cancelled);
        assert_eq!(report.iterations, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interrupts_hung_retrieval() {
        let (signal, listener) = stop_channel();
        let swarm = ScriptedSwarm::new(&[Step::Hang]);
        let task = tokio::spawn(controller(swarm.clone(), 3).run(listener));

        tokio::time::sleep(Duration::from_secs(60)).await;
        signal.trigger();
        let report = task.await.unwrap();

        assert_eq!(report.exit, ChurnExit::Cancelled);
        assert_eq!(report.iterations, 1);
        assert_eq!(report.successes + report.failures, 0);
        // The interrupted membership was still left
        assert_eq!(swarm.joins.load(Ordering::SeqCst), 1);
        assert_eq!(swarm.leaves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_leave_is_abandoned_after_timeout() {
        let (signal, listener) = stop_channel();
        let swarm = ScriptedSwarm::new(&[Step::HangLeave]);
        let task = tokio::spawn(controller(swarm.clone(), 3).run(listener));

        tokio::time::sleep(Duration::from_secs(1)).await;
        let stopped_at = Instant::now();
        signal.trigger();
        let report = task.await.unwrap();

        assert_eq!(report.exit, ChurnExit::Cancelled);
        assert_eq!(swarm.leaves.load(Ordering::SeqCst), 1);
        let waited = stopped_at.elapsed();
        assert!(waited >= LEAVE_TIMEOUT && waited < LEAVE_TIMEOUT + Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_stopped_before_start_runs_nothing() {
        let (signal, listener) = stop_channel();
        signal.trigger();
        let swarm = ScriptedSwarm::new(&[]);

        let report = controller(swarm.clone(), 5).run(listener).await;

        assert_eq!(report.exit, ChurnExit::Cancelled);
        assert_eq!(report.iterations, 0);
        assert_eq!(swarm.joins.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disabled_and_invalid_descriptor() {
        let (_signal, listener) = stop_channel();

        let disabled = ChurnController::new(ScriptedSwarm::new(&[]), RetryPolicy::new(3), None)
            .run(listener.clone())
            .await;
        assert_eq!(disabled.exit, ChurnExit::Disabled);

        let invalid = ChurnController::new(
            ScriptedSwarm::new(&[]),
            RetryPolicy::new(3),
            Some("https://example.com/x.torrent".to_string()),
        )
        .run(listener)
        .await;
        assert_eq!(invalid.exit, ChurnExit::InvalidDescriptor);
    }

    #[tokio::test]
    async fn test_zero_attempts_completes_immediately() {
        let (_signal, listener) = stop_channel();
        let report = controller(ScriptedSwarm::new(&[]), 0).run(listener).await;

        assert_eq!(report.exit, ChurnExit::Completed);
        assert_eq!(report.iterations, 0);
    }
}

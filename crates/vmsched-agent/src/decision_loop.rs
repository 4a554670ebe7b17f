//! Decision loop - polls the exchange channel and answers each request
//!
//! Two states: waiting (no request, sleep `idle_delay`) and processing
//! (read, decide, publish, clear). Every error is contained in its cycle and
//! followed by `error_backoff`; nothing is ever written back for a failed
//! request.

use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use vmsched_core::{ActionResponse, ChannelError, DecodeError, ExchangeChannel, InvalidAction};
use vmsched_rl::{Decision, EpsilonGreedy, PolicyError, ValueEstimator};

use crate::config::Config;

/// Error from a single processing cycle
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("Invalid action: {0}")]
    InvalidAction(#[from] InvalidAction),
}

impl CycleError {
    fn is_decode(&self) -> bool {
        matches!(self, Self::Channel(e) if e.is_decode())
    }

    /// The request contents themselves are unparseable.
    ///
    /// Empty reads are excluded: they are usually a producer mid-write.
    pub fn is_malformed_request(&self) -> bool {
        matches!(self, Self::Channel(ChannelError::Decode(DecodeError::Json(_))))
    }
}

/// Result of one loop iteration
#[derive(Debug)]
pub enum CycleOutcome {
    /// No request pending
    Idle,
    /// Response published and request cleared
    Decided(Decision),
    /// Request left in place for the next cycle
    Failed(CycleError),
    /// Malformed request failed too many times and was moved aside
    Quarantined(CycleError),
}

impl CycleOutcome {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn decision(&self) -> Option<Decision> {
        match self {
            Self::Decided(decision) => Some(*decision),
            _ => None,
        }
    }
}

/// Timing and retry settings for the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub idle_delay: Duration,
    pub error_backoff: Duration,
    pub max_request_failures: Option<u32>,
    pub stats_interval: u64,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            idle_delay: Duration::from_millis(10),
            error_backoff: Duration::from_millis(100),
            max_request_failures: None,
            stats_interval: 100,
        }
    }
}

impl From<&Config> for LoopSettings {
    fn from(config: &Config) -> Self {
        Self {
            idle_delay: config.exchange.idle_delay(),
            error_backoff: config.exchange.error_backoff(),
            max_request_failures: config.exchange.max_request_failures,
            stats_interval: config.agent.stats_interval,
        }
    }
}

/// Single-task loop answering placement requests
pub struct DecisionLoop<C, E> {
    channel: C,
    estimator: E,
    policy: EpsilonGreedy,
    settings: LoopSettings,
    consecutive_failures: u32,
}

impl<C, E> DecisionLoop<C, E>
where
    C: ExchangeChannel,
    E: ValueEstimator,
{
    /// Create a loop. The estimator must score exactly the policy's action space.
    pub fn new(
        channel: C,
        estimator: E,
        policy: EpsilonGreedy,
        settings: LoopSettings,
    ) -> Result<Self, PolicyError> {
        if estimator.action_dim() != policy.action_dim() {
            return Err(PolicyError::Config(format!(
                "estimator scores {} actions but the policy selects among {}",
                estimator.action_dim(),
                policy.action_dim()
            )));
        }

        Ok(Self {
            channel,
            estimator,
            policy,
            settings,
            consecutive_failures: 0,
        })
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn policy(&self) -> &EpsilonGreedy {
        &self.policy
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// Run forever. There is no terminal state; stop by dropping the future.
    pub async fn run(&mut self) {
        loop {
            self.step().await;
        }
    }

    /// One iteration followed by the delay its outcome calls for
    pub async fn step(&mut self) -> CycleOutcome {
        let outcome = self.tick();
        if let Some(delay) = self.delay_after(&outcome) {
            tokio::time::sleep(delay).await;
        }
        outcome
    }

    /// Pause owed after `outcome`; a decision polls again immediately
    pub fn delay_after(&self, outcome: &CycleOutcome) -> Option<Duration> {
        match outcome {
            CycleOutcome::Idle => Some(self.settings.idle_delay),
            CycleOutcome::Decided(_) => None,
            CycleOutcome::Failed(_) | CycleOutcome::Quarantined(_) => {
                Some(self.settings.error_backoff)
            }
        }
    }

    /// One iteration without sleeping
    pub fn tick(&mut self) -> CycleOutcome {
        match self.process() {
            Ok(None) => {
                self.consecutive_failures = 0;
                CycleOutcome::Idle
            }
            Ok(Some(decision)) => {
                self.consecutive_failures = 0;
                self.maybe_log_stats();
                CycleOutcome::Decided(decision)
            }
            Err(e) => self.handle_failure(e),
        }
    }

    fn process(&mut self) -> Result<Option<Decision>, CycleError> {
        let Some(request) = self.channel.poll_request()? else {
            return Ok(None);
        };

        let decision = self.policy.decide(&request, &self.estimator)?;
        let response = ActionResponse::new(decision.vm_id, self.policy.action_dim())?;

        self.channel.publish(&response)?;
        // Clearing second tells the producer the response is already durable
        self.channel.clear_request()?;

        info!(
            "State: {:?} | Action: VM #{} ({})",
            request.to_features(),
            decision.vm_id,
            decision.branch
        );
        Ok(Some(decision))
    }

    fn handle_failure(&mut self, e: CycleError) -> CycleOutcome {
        // Only unparseable contents count toward quarantine; a well-formed
        // request that failed for any other reason must stay in place
        if e.is_malformed_request() {
            self.consecutive_failures += 1;
            warn!(
                "Malformed request (attempt {}): {}",
                self.consecutive_failures, e
            );
        } else {
            self.consecutive_failures = 0;
            if e.is_decode() {
                warn!("Error processing state: {}", e);
            } else {
                error!("Error processing state: {}", e);
            }
            return CycleOutcome::Failed(e);
        }

        let Some(limit) = self.settings.max_request_failures else {
            return CycleOutcome::Failed(e);
        };
        if self.consecutive_failures < limit {
            return CycleOutcome::Failed(e);
        }

        let attempts = self.consecutive_failures;
        self.consecutive_failures = 0;
        match self.channel.quarantine_request() {
            Ok(true) => {
                warn!("Quarantined request after {} failed attempts", attempts);
                CycleOutcome::Quarantined(e)
            }
            Ok(false) => CycleOutcome::Failed(e),
            Err(qe) => {
                error!("Failed to quarantine request: {}", qe);
                CycleOutcome::Failed(e)
            }
        }
    }

    fn maybe_log_stats(&self) {
        let interval = self.settings.stats_interval;
        let stats = self.policy.stats();
        if interval > 0 && stats.decisions % interval == 0 {
            info!(
                "Policy stats: decisions={}, explored={}, exploited={}, epsilon={:.4}",
                stats.decisions, stats.explorations, stats.exploitations, stats.epsilon
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmsched_core::memory::ChannelOp;
    use vmsched_core::{MemoryChannel, StateRequest};
    use vmsched_rl::{Branch, EpsilonSchedule, FixedScores};

    fn greedy_loop(scores: Vec<f64>, settings: LoopSettings) -> DecisionLoop<MemoryChannel, FixedScores> {
        let policy =
            EpsilonGreedy::new(scores.len(), EpsilonSchedule::fixed(0.0).unwrap(), Some(1)).unwrap();
        DecisionLoop::new(MemoryChannel::new(), FixedScores::new(scores), policy, settings).unwrap()
    }

    #[test]
    fn test_idle_tick() {
        let mut dl = greedy_loop(vec![0.1, 0.2], LoopSettings::default());
        for _ in 0..10 {
            assert!(dl.tick().is_idle());
        }
        assert_eq!(dl.channel().poll_count(), 10);
        assert!(dl.channel().published().is_empty());
    }

    #[test]
    fn test_decided_tick_publishes_before_clearing() {
        let mut dl = greedy_loop(vec![0.2, 0.9, 0.1, 0.4, 0.3], LoopSettings::default());
        dl.channel().put_request(&StateRequest::new(0.5, 0.2, 1500.0));

        let decision = dl.tick().decision().unwrap();
        assert_eq!(decision, Decision { vm_id: 1, branch: Branch::Exploit });
        assert_eq!(
            dl.channel().ops(),
            vec![ChannelOp::Poll, ChannelOp::Publish, ChannelOp::Clear]
        );
        assert!(!dl.channel().has_request());
        assert_eq!(dl.channel().response(), Some(ActionResponse { vm_id: 1 }));
    }

    #[test]
    fn test_failed_publish_keeps_request() {
        let mut dl = greedy_loop(vec![1.0, 0.0], LoopSettings::default());
        dl.channel().put_request(&StateRequest::default());
        dl.channel().set_fail_publish(true);

        assert!(matches!(dl.tick(), CycleOutcome::Failed(CycleError::Channel(_))));
        assert!(dl.channel().has_request());
        assert!(!dl.channel().ops().contains(&ChannelOp::Clear));

        dl.channel().set_fail_publish(false);
        assert!(dl.tick().decision().is_some());
        assert!(!dl.channel().has_request());
    }

    #[test]
    fn test_only_json_errors_count_as_malformed() {
        let malformed = CycleError::Channel(StateRequest::decode("{").unwrap_err().into());
        let empty = CycleError::Channel(StateRequest::decode("  ").unwrap_err().into());
        let io = CycleError::Channel(ChannelError::Injected("publish"));

        assert!(malformed.is_malformed_request());
        assert!(!empty.is_malformed_request());
        assert!(!io.is_malformed_request());
    }

    #[test]
    fn test_estimator_mismatch_rejected_at_construction() {
        let policy = EpsilonGreedy::new(5, EpsilonSchedule::fixed(0.0).unwrap(), None).unwrap();
        let result = DecisionLoop::new(
            MemoryChannel::new(),
            FixedScores::new(vec![0.0; 3]),
            policy,
            LoopSettings::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_delays_per_outcome() {
        let settings = LoopSettings {
            idle_delay: Duration::from_millis(10),
            error_backoff: Duration::from_millis(100),
            ..LoopSettings::default()
        };
        let dl = greedy_loop(vec![0.0], settings);

        assert_eq!(dl.delay_after(&CycleOutcome::Idle), Some(Duration::from_millis(10)));
        assert_eq!(
            dl.delay_after(&CycleOutcome::Decided(Decision { vm_id: 0, branch: Branch::Explore })),
            None
        );
        let failed = CycleOutcome::Failed(CycleError::Channel(ChannelError::Injected("test")));
        assert_eq!(dl.delay_after(&failed), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.exchange.idle_delay_ms = 5;
        config.exchange.max_request_failures = Some(3);

        let settings = LoopSettings::from(&config);
        assert_eq!(settings.idle_delay, Duration::from_millis(5));
        assert_eq!(settings.max_request_failures, Some(3));
        assert_eq!(settings.stats_interval, 100);
    }
}

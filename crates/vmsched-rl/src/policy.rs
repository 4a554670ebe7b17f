//! Epsilon-greedy VM selection

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::debug;

use vmsched_core::StateRequest;

use crate::estimator::{greedy_action, EstimatorError, ValueEstimator};

/// Errors from configuring or running the policy
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("Estimator error: {0}")]
    Estimator(#[from] EstimatorError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Which branch of the policy produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    /// Uniformly random VM
    Explore,
    /// Arg-max of the estimator's scores
    Exploit,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::Explore => write!(f, "random exploration"),
            Branch::Exploit => write!(f, "model prediction"),
        }
    }
}

/// A chosen VM and how it was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub vm_id: usize,
    pub branch: Branch,
}

/// Exploration probability with optional multiplicative decay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpsilonSchedule {
    epsilon: f64,
    decay: f64,
    min_epsilon: f64,
}

fn check_unit(name: &str, value: f64) -> Result<(), PolicyError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(PolicyError::Config(format!("{name} must be in [0, 1], got {value}")))
    }
}

impl EpsilonSchedule {
    pub fn new(epsilon: f64, decay: f64, min_epsilon: f64) -> Result<Self, PolicyError> {
        check_unit("epsilon", epsilon)?;
        check_unit("epsilon_decay", decay)?;
        check_unit("min_epsilon", min_epsilon)?;
        if min_epsilon > epsilon {
            return Err(PolicyError::Config(format!(
                "min_epsilon ({min_epsilon}) exceeds epsilon ({epsilon})"
            )));
        }
        Ok(Self {
            epsilon,
            decay,
            min_epsilon,
        })
    }

    /// Constant exploration probability
    pub fn fixed(epsilon: f64) -> Result<Self, PolicyError> {
        Self::new(epsilon, 1.0, 0.0)
    }

    pub fn current(&self) -> f64 {
        self.epsilon
    }

    /// Advance one decision
    pub fn step(&mut self) {
        self.epsilon = (self.epsilon * self.decay).max(self.min_epsilon);
    }
}

/// Running counters for logging
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PolicyStats {
    pub decisions: u64,
    pub explorations: u64,
    pub exploitations: u64,
    pub epsilon: f64,
}

impl PolicyStats {
    pub fn exploration_rate(&self) -> f64 {
        if self.decisions == 0 {
            0.0
        } else {
            self.explorations as f64 / self.decisions as f64
        }
    }
}

/// Epsilon-greedy policy over a fixed action space
#[derive(Debug)]
pub struct EpsilonGreedy<R: Rng = StdRng> {
    action_dim: usize,
    schedule: EpsilonSchedule,
    rng: R,
    explorations: u64,
    exploitations: u64,
}

impl EpsilonGreedy<StdRng> {
    /// Create a policy, seeding its RNG when `seed` is given
    pub fn new(
        action_dim: usize,
        schedule: EpsilonSchedule,
        seed: Option<u64>,
    ) -> Result<Self, PolicyError> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(action_dim, schedule, rng)
    }
}

impl<R: Rng> EpsilonGreedy<R> {
    pub fn with_rng(
        action_dim: usize,
        schedule: EpsilonSchedule,
        rng: R,
    ) -> Result<Self, PolicyError> {
        if action_dim == 0 {
            return Err(PolicyError::Config("action_dim must be at least 1".into()));
        }
        Ok(Self {
            action_dim,
            schedule,
            rng,
            explorations: 0,
            exploitations: 0,
        })
    }

    pub fn action_dim(&self) -> usize {
        self.action_dim
    }

    pub fn epsilon(&self) -> f64 {
        self.schedule.current()
    }

    /// Pick a VM for `request`.
    ///
    /// The estimator is only consulted on the exploitation branch. Epsilon
    /// advances only when a decision is produced.
    pub fn decide<E>(&mut self, request: &StateRequest, estimator: &E) -> Result<Decision, PolicyError>
    where
        E: ValueEstimator + ?Sized,
    {
        let decision = if self.rng.gen::<f64>() < self.schedule.current() {
            Decision {
                vm_id: self.rng.gen_range(0..self.action_dim),
                branch: Branch::Explore,
            }
        } else {
            let scores = estimator.evaluate(&request.to_features())?;
            if scores.len() != self.action_dim {
                return Err(EstimatorError::DimensionMismatch {
                    expected: self.action_dim,
                    actual: scores.len(),
                }
                .into());
            }
            debug!("Q-values: {:?}", scores);
            Decision {
                vm_id: greedy_action(&scores)?,
                branch: Branch::Exploit,
            }
        };

        match decision.branch {
            Branch::Explore => self.explorations += 1,
            Branch::Exploit => self.exploitations += 1,
        }
        self.schedule.step();

        Ok(decision)
    }

    pub fn stats(&self) -> PolicyStats {
        PolicyStats {
            decisions: self.explorations + self.exploitations,
            explorations: self.explorations,
            exploitations: self.exploitations,
            epsilon: self.schedule.current(),
        }
    }
}

//! Value estimator trait and helpers

use thiserror::Error;

use vmsched_core::STATE_DIM;

/// Errors from evaluating a state
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimatorError {
    #[error("expected {expected} scores, estimator returned {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("score at index {index} is not finite")]
    NonFinite { index: usize },

    #[error("invalid estimator: {0}")]
    Invalid(String),
}

/// Scores every VM for a given workload state.
///
/// Implementations are pure inference from the caller's point of view; any
/// parameters they hold are updated elsewhere.
pub trait ValueEstimator {
    /// Number of scores returned by [`evaluate`](Self::evaluate)
    fn action_dim(&self) -> usize;

    /// One score per VM, in VM index order
    fn evaluate(&self, state: &[f64; STATE_DIM]) -> Result<Vec<f64>, EstimatorError>;
}

impl<E: ValueEstimator + ?Sized> ValueEstimator for Box<E> {
    fn action_dim(&self) -> usize {
        (**self).action_dim()
    }

    fn evaluate(&self, state: &[f64; STATE_DIM]) -> Result<Vec<f64>, EstimatorError> {
        (**self).evaluate(state)
    }
}

/// Index of the highest score; the first one wins on ties.
pub fn greedy_action(scores: &[f64]) -> Result<usize, EstimatorError> {
    if scores.is_empty() {
        return Err(EstimatorError::DimensionMismatch {
            expected: 1,
            actual: 0,
        });
    }

    let mut best = 0;
    for (index, &score) in scores.iter().enumerate() {
        if !score.is_finite() {
            return Err(EstimatorError::NonFinite { index });
        }
        // Strict comparison keeps the earliest maximum
        if score > scores[best] {
            best = index;
        }
    }
    Ok(best)
}

/// Estimator returning the same scores for every state
#[derive(Debug, Clone)]
pub struct FixedScores {
    scores: Vec<f64>,
}

impl FixedScores {
    pub fn new(scores: Vec<f64>) -> Self {
        Self { scores }
    }
}

impl ValueEstimator for FixedScores {
    fn action_dim(&self) -> usize {
        self.scores.len()
    }

    fn evaluate(&self, _state: &[f64; STATE_DIM]) -> Result<Vec<f64>, EstimatorError> {
        Ok(self.scores.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greedy_picks_maximum() {
        assert_eq!(greedy_action(&[0.2, 0.9, 0.1, 0.4, 0.3]).unwrap(), 1);
        assert_eq!(greedy_action(&[-3.0, -1.0, -2.0]).unwrap(), 1);
        assert_eq!(greedy_action(&[7.0]).unwrap(), 0);
    }

    #[test]
    fn test_greedy_ties_take_first() {
        assert_eq!(greedy_action(&[0.5, 0.5, 0.1, 0.0, 0.0]).unwrap(), 0);
        assert_eq!(greedy_action(&[0.0, 0.3, 0.1, 0.3]).unwrap(), 1);
        assert_eq!(greedy_action(&[0.0; 5]).unwrap(), 0);
    }

    #[test]
    fn test_greedy_rejects_bad_scores() {
        assert!(matches!(
            greedy_action(&[]),
            Err(EstimatorError::DimensionMismatch { .. })
        ));
        assert_eq!(
            greedy_action(&[0.1, f64::NAN, 0.3]),
            Err(EstimatorError::NonFinite { index: 1 })
        );
        assert_eq!(
            greedy_action(&[0.1, 0.2, f64::INFINITY]),
            Err(EstimatorError::NonFinite { index: 2 })
        );
    }

    #[test]
    fn test_fixed_scores_ignore_state() {
        let estimator = FixedScores::new(vec![0.1, 0.2]);
        assert_eq!(estimator.action_dim(), 2);
        assert_eq!(estimator.evaluate(&[0.0; 3]).unwrap(), vec![0.1, 0.2]);
        assert_eq!(estimator.evaluate(&[1.0, 1.0, 9000.0]).unwrap(), vec![0.1, 0.2]);
    }
}

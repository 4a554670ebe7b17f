//! Feed-forward Q-network used as the default value estimator
//!
//! Three fully connected layers, `STATE_DIM -> hidden -> hidden -> action_dim`,
//! with ReLU after each hidden layer. Only the forward pass lives here.

use ndarray::{Array1, Array2};
use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use vmsched_core::STATE_DIM;

use crate::estimator::{EstimatorError, ValueEstimator};

/// Default hidden layer width
pub const DEFAULT_HIDDEN_DIM: usize = 128;

#[derive(Debug, Clone)]
struct Linear {
    weight: Array2<f64>,
    bias: Array1<f64>,
}

impl Linear {
    /// Uniform init in `±1/sqrt(fan_in)` for both weights and bias
    fn init<R: Rng>(fan_in: usize, fan_out: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (fan_in as f64).sqrt();
        let dist = Uniform::new_inclusive(-bound, bound);
        Self {
            weight: Array2::from_shape_fn((fan_out, fan_in), |_| rng.sample(&dist)),
            bias: Array1::from_shape_fn(fan_out, |_| rng.sample(&dist)),
        }
    }

    fn forward(&self, input: &Array1<f64>) -> Array1<f64> {
        self.weight.dot(input) + &self.bias
    }

    fn parameter_count(&self) -> usize {
        self.weight.len() + self.bias.len()
    }
}

/// Shape summary for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkShape {
    pub input_dim: usize,
    pub hidden_dim: usize,
    pub output_dim: usize,
    pub parameters: usize,
}

/// Q-network mapping a workload state to one score per VM
#[derive(Debug, Clone)]
pub struct QNetwork {
    fc1: Linear,
    fc2: Linear,
    fc3: Linear,
    action_dim: usize,
}

impl QNetwork {
    /// Build a network with freshly initialised weights
    pub fn new<R: Rng>(
        action_dim: usize,
        hidden_dim: usize,
        rng: &mut R,
    ) -> Result<Self, EstimatorError> {
        if action_dim == 0 {
            return Err(EstimatorError::Invalid("action_dim must be at least 1".into()));
        }
        if hidden_dim == 0 {
            return Err(EstimatorError::Invalid("hidden_dim must be at least 1".into()));
        }

        Ok(Self {
            fc1: Linear::init(STATE_DIM, hidden_dim, rng),
            fc2: Linear::init(hidden_dim, hidden_dim, rng),
            fc3: Linear::init(hidden_dim, action_dim, rng),
            action_dim,
        })
    }

    /// Build a network from a seed, or from OS entropy when `seed` is `None`
    pub fn seeded(
        action_dim: usize,
        hidden_dim: usize,
        seed: Option<u64>,
    ) -> Result<Self, EstimatorError> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(action_dim, hidden_dim, &mut rng)
    }

    pub fn shape(&self) -> NetworkShape {
        NetworkShape {
            input_dim: STATE_DIM,
            hidden_dim: self.fc1.bias.len(),
            output_dim: self.action_dim,
            parameters: self.fc1.parameter_count()
                + self.fc2.parameter_count()
                + self.fc3.parameter_count(),
        }
    }
}

fn relu(x: Array1<f64>) -> Array1<f64> {
    x.mapv_into(|v| v.max(0.0))
}

impl ValueEstimator for QNetwork {
    fn action_dim(&self) -> usize {
        self.action_dim
    }

    fn evaluate(&self, state: &[f64; STATE_DIM]) -> Result<Vec<f64>, EstimatorError> {
        let input = Array1::from(state.to_vec());

        let hidden = relu(self.fc1.forward(&input));
        let hidden = relu(self.fc2.forward(&hidden));
        let output = self.fc3.forward(&hidden);

        if let Some(index) = output.iter().position(|v| !v.is_finite()) {
            return Err(EstimatorError::NonFinite { index });
        }
        Ok(output.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_dimension() {
        let net = QNetwork::seeded(5, DEFAULT_HIDDEN_DIM, Some(7)).unwrap();
        let scores = net.evaluate(&[0.5, 0.2, 1500.0]).unwrap();
        assert_eq!(scores.len(), 5);
        assert_eq!(net.action_dim(), 5);
    }

    #[test]
    fn test_shape_and_parameter_count() {
        let net = QNetwork::seeded(5, 128, Some(1)).unwrap();
        let shape = net.shape();
        assert_eq!(shape.input_dim, 3);
        assert_eq!(shape.hidden_dim, 128);
        assert_eq!(shape.output_dim, 5);
        // (3*128 + 128) + (128*128 + 128) + (128*5 + 5)
        assert_eq!(shape.parameters, 512 + 16_512 + 645);
    }

    #[test]
    fn test_same_seed_same_scores() {
        let a = QNetwork::seeded(4, 16, Some(42)).unwrap();
        let b = QNetwork::seeded(4, 16, Some(42)).unwrap();
        let state = [0.3, 0.9, 2500.0];
        assert_eq!(a.evaluate(&state).unwrap(), b.evaluate(&state).unwrap());
    }

    #[test]
    fn test_inference_is_repeatable() {
        let net = QNetwork::seeded(5, 32, None).unwrap();
        let state = [0.1, 0.2, 300.0];
        let first = net.evaluate(&state).unwrap();
        for _ in 0..10 {
            assert_eq!(net.evaluate(&state).unwrap(), first);
        }
    }

    #[test]
    fn test_weights_within_init_bound() {
        let net = QNetwork::seeded(5, 64, Some(3)).unwrap();
        let bound = 1.0 / (STATE_DIM as f64).sqrt();
        assert!(net.fc1.weight.iter().all(|w| w.abs() <= bound));
        let bound = 1.0 / 64f64.sqrt();
        assert!(net.fc3.weight.iter().all(|w| w.abs() <= bound));
    }

    #[test]
    fn test_zero_dims_rejected() {
        assert!(QNetwork::seeded(0, 128, Some(1)).is_err());
        assert!(QNetwork::seeded(5, 0, Some(1)).is_err());
    }

    #[test]
    fn test_relu_clamps_negatives() {
        let out = relu(Array1::from(vec![-1.5, 0.0, 2.0]));
        assert_eq!(out.to_vec(), vec![0.0, 0.0, 2.0]);
    }
}

//! Documents exchanged with the simulator

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::DecodeError;

/// Number of state features: cpu load, ram load, task size
pub const STATE_DIM: usize = 3;

/// Workload observation deposited by the simulator.
///
/// Every field is optional on the wire and defaults to zero. Loads are expected
/// in `[0, 1]` but are passed through unvalidated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateRequest {
    pub cpu_load: f64,
    pub ram_load: f64,
    pub task_size: f64,
}

impl StateRequest {
    pub fn new(cpu_load: f64, ram_load: f64, task_size: f64) -> Self {
        Self {
            cpu_load,
            ram_load,
            task_size,
        }
    }

    /// Feature vector in estimator order
    pub fn to_features(&self) -> [f64; STATE_DIM] {
        [self.cpu_load, self.ram_load, self.task_size]
    }

    /// Decode a request document.
    ///
    /// Blank contents are reported separately from bad JSON since they usually
    /// mean the producer has not finished writing yet.
    pub fn decode(contents: &str) -> Result<Self, DecodeError> {
        if contents.trim().is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(serde_json::from_str(contents)?)
    }
}

/// The agent's answer: index of the chosen VM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub vm_id: usize,
}

/// A VM index outside the configured action space
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("vm_id {vm_id} is outside the action space [0, {action_dim})")]
pub struct InvalidAction {
    pub vm_id: usize,
    pub action_dim: usize,
}

impl ActionResponse {
    /// Create a response, checking the index against the action space
    pub fn new(vm_id: usize, action_dim: usize) -> Result<Self, InvalidAction> {
        if vm_id >= action_dim {
            return Err(InvalidAction { vm_id, action_dim });
        }
        Ok(Self { vm_id })
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(contents: &str) -> Result<Self, DecodeError> {
        if contents.trim().is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(serde_json::from_str(contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_request_decodes() {
        let req = StateRequest::decode(r#"{"cpu_load": 0.5, "ram_load": 0.2, "task_size": 1500}"#)
            .unwrap();
        assert_eq!(req.to_features(), [0.5, 0.2, 1500.0]);
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        let req = StateRequest::decode(r#"{"cpu_load": 0.7}"#).unwrap();
        assert_eq!(req.to_features(), [0.7, 0.0, 0.0]);

        let req = StateRequest::decode("{}").unwrap();
        assert_eq!(req, StateRequest::default());
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let req = StateRequest::decode(r#"{"cpu_load": 0.1, "host": "h1"}"#).unwrap();
        assert_eq!(req.cpu_load, 0.1);
    }

    #[test]
    fn test_malformed_requests_rejected() {
        assert!(matches!(StateRequest::decode(""), Err(DecodeError::Empty)));
        assert!(matches!(StateRequest::decode("  \n"), Err(DecodeError::Empty)));
        assert!(matches!(
            StateRequest::decode(r#"{"cpu_load": 0.5"#),
            Err(DecodeError::Json(_))
        ));
        assert!(StateRequest::decode(r#"{"cpu_load": "high"}"#).is_err());
        assert!(StateRequest::decode(r#"{"cpu_load": null}"#).is_err());
        assert!(StateRequest::decode("42").is_err());
    }

    #[test]
    fn test_action_response_bounds() {
        assert_eq!(ActionResponse::new(4, 5).unwrap().vm_id, 4);
        let err = ActionResponse::new(5, 5).unwrap_err();
        assert_eq!(err, InvalidAction { vm_id: 5, action_dim: 5 });
    }

    #[test]
    fn test_action_response_wire_format() {
        let json = ActionResponse { vm_id: 3 }.encode().unwrap();
        assert_eq!(json, r#"{"vm_id":3}"#);
        assert_eq!(ActionResponse::decode(&json).unwrap().vm_id, 3);
    }
}

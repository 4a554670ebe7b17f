//! vmsched RL - value estimation and VM selection
//!
//! This crate provides the value-estimator seam, a feed-forward Q-network
//! implementing it, and the epsilon-greedy policy that turns a workload
//! observation into a VM index.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::float_cmp)]
#![allow(clippy::similar_names)]

pub mod estimator;
pub mod network;
pub mod policy;

pub use estimator::{greedy_action, EstimatorError, FixedScores, ValueEstimator};
pub use network::QNetwork;
pub use policy::{Branch, Decision, EpsilonGreedy, EpsilonSchedule, PolicyError, PolicyStats};

//! vmsched Agent - answers VM placement requests from the exchange directory
//!
//! The binary wires configuration, logging and a Q-network into the
//! [`DecisionLoop`]; the pieces are exposed here so they can be driven from
//! tests with in-memory channels and stub estimators.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod decision_loop;

pub use crate::config::Config;
pub use crate::decision_loop::{CycleError, CycleOutcome, DecisionLoop, LoopSettings};

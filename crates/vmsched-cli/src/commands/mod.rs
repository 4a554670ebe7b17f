//! CLI command implementations

pub mod exchange;
pub mod simulate;

//! vmsched Core - request/response types and the exchange channel
//!
//! This crate provides the data model shared by the agent and the CLI, and the
//! file-based protocol used to hand placement requests between an external
//! simulator and the decision agent.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod exchange;
pub mod memory;
pub mod producer;
pub mod types;
pub mod util;

pub use error::{ChannelError, DecodeError, Result};
pub use exchange::{ChannelNames, ExchangeChannel, FileChannel};
pub use memory::MemoryChannel;
pub use producer::{ExchangeStatus, Producer};
pub use types::{ActionResponse, InvalidAction, StateRequest, STATE_DIM};

//! In-process exchange channel for tests and dry runs

use std::cell::{Cell, RefCell};

use crate::error::{ChannelError, Result};
use crate::exchange::ExchangeChannel;
use crate::types::{ActionResponse, StateRequest};

/// Operations recorded by [`MemoryChannel`], in call order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOp {
    Poll,
    Publish,
    Clear,
    Quarantine,
}

/// Exchange channel holding its two slots in memory.
///
/// The request slot keeps raw text so malformed documents can be injected.
/// Publish and clear can be made to fail to exercise the loop's error path.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    request: RefCell<Option<String>>,
    response: RefCell<Option<ActionResponse>>,
    published: RefCell<Vec<ActionResponse>>,
    quarantined: RefCell<Vec<String>>,
    ops: RefCell<Vec<ChannelOp>>,
    fail_publish: Cell<bool>,
    fail_clear: Cell<bool>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deposit raw request contents, replacing any pending request
    pub fn put_raw(&self, contents: impl Into<String>) {
        *self.request.borrow_mut() = Some(contents.into());
    }

    /// Deposit a well-formed request
    pub fn put_request(&self, request: &StateRequest) {
        // Serializing a struct of plain floats cannot fail
        let json = serde_json::to_string(request).unwrap_or_default();
        self.put_raw(json);
    }

    pub fn has_request(&self) -> bool {
        self.request.borrow().is_some()
    }

    /// Current response slot contents
    pub fn response(&self) -> Option<ActionResponse> {
        *self.response.borrow()
    }

    /// Consume the response, as the simulator would
    pub fn take_response(&self) -> Option<ActionResponse> {
        self.response.borrow_mut().take()
    }

    /// Every response ever published
    pub fn published(&self) -> Vec<ActionResponse> {
        self.published.borrow().clone()
    }

    /// Raw contents of every quarantined request
    pub fn quarantined(&self) -> Vec<String> {
        self.quarantined.borrow().clone()
    }

    pub fn ops(&self) -> Vec<ChannelOp> {
        self.ops.borrow().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.ops
            .borrow()
            .iter()
            .filter(|op| **op == ChannelOp::Poll)
            .count()
    }

    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.set(fail);
    }

    pub fn set_fail_clear(&self, fail: bool) {
        self.fail_clear.set(fail);
    }

    fn record(&self, op: ChannelOp) {
        self.ops.borrow_mut().push(op);
    }
}

impl ExchangeChannel for MemoryChannel {
    fn poll_request(&self) -> Result<Option<StateRequest>> {
        self.record(ChannelOp::Poll);
        match self.request.borrow().as_deref() {
            None => Ok(None),
            Some(contents) => Ok(Some(StateRequest::decode(contents)?)),
        }
    }

    fn publish(&self, response: &ActionResponse) -> Result<()> {
        self.record(ChannelOp::Publish);
        if self.fail_publish.get() {
            return Err(ChannelError::Injected("publish"));
        }
        *self.response.borrow_mut() = Some(*response);
        self.published.borrow_mut().push(*response);
        Ok(())
    }

    fn clear_request(&self) -> Result<()> {
        self.record(ChannelOp::Clear);
        if self.fail_clear.get() {
            return Err(ChannelError::Injected("clear"));
        }
        self.request.borrow_mut().take();
        Ok(())
    }

    fn quarantine_request(&self) -> Result<bool> {
        self.record(ChannelOp::Quarantine);
        match self.request.borrow_mut().take() {
            Some(contents) => {
                self.quarantined.borrow_mut().push(contents);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

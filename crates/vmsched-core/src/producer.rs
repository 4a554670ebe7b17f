//! Simulator side of the exchange, for tooling and tests
//!
//! The real producer is an external simulator. This mirrors what it does so a
//! running agent can be exercised without it: deposit a state, wait for the
//! action file, consume it.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{ChannelError, Result};
use crate::exchange::{write_atomic, FileChannel};
use crate::types::{ActionResponse, StateRequest};

/// Which exchange files currently exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeStatus {
    pub request_pending: bool,
    pub response_pending: bool,
    pub staging_left_behind: bool,
    pub quarantined: bool,
}

/// Producer handle over the same directory the agent watches
#[derive(Debug, Clone)]
pub struct Producer {
    channel: FileChannel,
}

impl Producer {
    pub fn new(channel: FileChannel) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> &FileChannel {
        &self.channel
    }

    fn request_staging_path(&self) -> PathBuf {
        self.channel
            .dir()
            .join(format!(".{}.tmp", self.channel.names().request))
    }

    /// Deposit a request. Refuses while a previous request is still pending.
    pub fn submit(&self, request: &StateRequest) -> Result<()> {
        let target = self.channel.request_path();
        if target.exists() {
            return Err(ChannelError::Busy(target));
        }

        let json = serde_json::to_string(request).map_err(ChannelError::Encode)?;
        write_atomic(&self.request_staging_path(), &target, json.as_bytes())?;
        debug!("Submitted {} to {:?}", json, target);
        Ok(())
    }

    /// Read and delete the response if one is present
    pub fn take_response(&self) -> Result<Option<ActionResponse>> {
        let path = self.channel.response_path();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ChannelError::io("read", path, e)),
        };

        let response = ActionResponse::decode(&contents)?;
        fs::remove_file(&path).map_err(|e| ChannelError::io("remove", &path, e))?;
        Ok(Some(response))
    }

    /// Block until a response appears or `timeout` elapses
    pub fn wait_for_response(&self, timeout: Duration, poll: Duration) -> Result<ActionResponse> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(response) = self.take_response()? {
                return Ok(response);
            }
            if Instant::now() >= deadline {
                return Err(ChannelError::Timeout(timeout));
            }
            std::thread::sleep(poll);
        }
    }

    pub fn status(&self) -> ExchangeStatus {
        ExchangeStatus {
            request_pending: self.channel.request_path().exists(),
            response_pending: self.channel.response_path().exists(),
            staging_left_behind: self.channel.staging_path().exists(),
            quarantined: self.channel.quarantine_path().exists(),
        }
    }

    /// Remove every exchange file. Returns how many were deleted.
    pub fn clean(&self) -> Result<usize> {
        let paths = [
            self.channel.request_path(),
            self.channel.response_path(),
            self.channel.staging_path(),
            self.channel.quarantine_path(),
            self.request_staging_path(),
        ];

        let mut removed = 0;
        for path in paths {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(ChannelError::io("remove", path, e)),
            }
        }
        Ok(removed)
    }
}

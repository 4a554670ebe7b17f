//! Exchange channel - single-slot request/response handoff through a directory
//!
//! The simulator deposits a request file and waits for a response file. The
//! agent owns the response name and is the only party that deletes the request
//! name, so the rename in [`FileChannel::publish`] is the only synchronisation
//! needed.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ChannelError, Result};
use crate::types::{ActionResponse, StateRequest};

/// Trait for the agent's side of the exchange
pub trait ExchangeChannel {
    /// Read the pending request, if any. Absence is not an error.
    fn poll_request(&self) -> Result<Option<StateRequest>>;

    /// Make a response visible under the canonical name in one step
    fn publish(&self, response: &ActionResponse) -> Result<()>;

    /// Remove the pending request. Only call after a successful publish.
    fn clear_request(&self) -> Result<()>;

    /// Move the pending request out of the request slot.
    ///
    /// Returns `false` when there was nothing to move.
    fn quarantine_request(&self) -> Result<bool>;
}

/// File names used inside the exchange directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNames {
    pub request: String,
    pub response: String,
    pub staging: String,
    pub quarantine: String,
}

impl Default for ChannelNames {
    fn default() -> Self {
        Self {
            request: "state.json".to_string(),
            response: "action.json".to_string(),
            staging: "action_temp.json".to_string(),
            quarantine: "state.rejected.json".to_string(),
        }
    }
}

impl ChannelNames {
    /// Names must be plain, non-empty and pairwise distinct.
    ///
    /// Keeping them as bare file names puts staging and response in the same
    /// directory, which is what makes the publish rename atomic.
    pub fn validate(&self) -> Result<()> {
        let names = [
            ("request", &self.request),
            ("response", &self.response),
            ("staging", &self.staging),
            ("quarantine", &self.quarantine),
        ];

        for (label, name) in &names {
            if name.is_empty() {
                return Err(ChannelError::Config(format!("{label} file name is empty")));
            }
            if name.contains('/') || name.contains('\\') || *name == "." || *name == ".." {
                return Err(ChannelError::Config(format!(
                    "{label} file name must be a plain file name, got {name:?}"
                )));
            }
        }

        for (i, (a_label, a)) in names.iter().enumerate() {
            for (b_label, b) in &names[i + 1..] {
                if a == b {
                    return Err(ChannelError::Config(format!(
                        "{a_label} and {b_label} file names collide: {a:?}"
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Exchange channel backed by a shared directory
#[derive(Debug, Clone)]
pub struct FileChannel {
    dir: PathBuf,
    names: ChannelNames,
}

impl FileChannel {
    /// Create a channel over `dir` with the given file names
    pub fn new(dir: impl Into<PathBuf>, names: ChannelNames) -> Result<Self> {
        names.validate()?;
        Ok(Self {
            dir: dir.into(),
            names,
        })
    }

    /// Channel using the simulator's default file names
    pub fn with_defaults(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            names: ChannelNames::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn names(&self) -> &ChannelNames {
        &self.names
    }

    pub fn request_path(&self) -> PathBuf {
        self.dir.join(&self.names.request)
    }

    pub fn response_path(&self) -> PathBuf {
        self.dir.join(&self.names.response)
    }

    pub fn staging_path(&self) -> PathBuf {
        self.dir.join(&self.names.staging)
    }

    pub fn quarantine_path(&self) -> PathBuf {
        self.dir.join(&self.names.quarantine)
    }
}

/// Write `contents` to `staging`, sync, then rename onto `target`.
/// On unix the parent directory is synced too so the rename itself is durable.
pub(crate) fn write_atomic(staging: &Path, target: &Path, contents: &[u8]) -> Result<()> {
    let mut file =
        fs::File::create(staging).map_err(|e| ChannelError::io("create", staging, e))?;
    file.write_all(contents)
        .map_err(|e| ChannelError::io("write", staging, e))?;
    file.sync_all()
        .map_err(|e| ChannelError::io("sync", staging, e))?;
    drop(file);

    fs::rename(staging, target).map_err(|e| ChannelError::io("rename", target, e))?;
    sync_parent(target)
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| ChannelError::io("sync", dir, e))
}

// Directories cannot be opened for syncing on windows
#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> Result<()> {
    Ok(())
}

impl ExchangeChannel for FileChannel {
    fn poll_request(&self) -> Result<Option<StateRequest>> {
        let path = self.request_path();

        // Reading directly instead of checking existence first keeps the
        // producer deleting the file between the two calls from being an error.
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ChannelError::io("read", path, e)),
        };

        let request = StateRequest::decode(&contents)?;
        debug!("Read request from {:?}: {:?}", path, request);
        Ok(Some(request))
    }

    fn publish(&self, response: &ActionResponse) -> Result<()> {
        let json = response.encode().map_err(ChannelError::Encode)?;
        let target = self.response_path();

        write_atomic(&self.staging_path(), &target, json.as_bytes())?;

        debug!("Published {} to {:?}", json, target);
        Ok(())
    }

    fn clear_request(&self) -> Result<()> {
        let path = self.request_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Request {:?} already gone", path);
                Ok(())
            }
            Err(e) => Err(ChannelError::io("remove", path, e)),
        }
    }

    fn quarantine_request(&self) -> Result<bool> {
        let from = self.request_path();
        let to = self.quarantine_path();
        match fs::rename(&from, &to) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ChannelError::io("rename", from, e)),
        }
    }
}

//! Waiting for the external helper to hand over app hashes
//!
//! The helper writes a small file whose first line is the poster app's hash
//! and whose optional second line is the CarPlay app's hash. Until it shows
//! up the watcher keeps polling; a missing file is not an error.

use super::defaults::HASH_POLL_INTERVAL_MS;
use crate::exceptions::{Result, TendiesError};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Hashes handed over by the helper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppHashes {
    pub poster_board: String,
    pub carplay: Option<String>,
}

/// Parse the helper's hash file. Returns `None` if the first line is empty.
pub fn parse_hash_file(contents: &str) -> Option<AppHashes> {
    let mut lines = contents
        .split('\n')
        .map(|l| l.trim())
        .filter(|l| !l.is_empty());
    let poster_board = lines.next()?.to_string();
    let carplay = lines.next().map(str::to_string);
    Some(AppHashes {
        poster_board,
        carplay,
    })
}

/// Cooperative cancellation flag shared between threads
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// The underlying flag, for signal handlers
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

/// Polls for the hash file
#[derive(Debug, Clone)]
pub struct HashWatcher {
    path: PathBuf,
    interval: Duration,
}

impl HashWatcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            interval: Duration::from_millis(HASH_POLL_INTERVAL_MS),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until the hash file appears, then consume it.
    ///
    /// Cancellation is checked once per poll.
    pub fn wait(&self, token: &CancellationToken) -> Result<AppHashes> {
        info!("⏳ Waiting for app hash at {:?}", self.path);
        loop {
            if token.is_cancelled() {
                debug!("🛑 Hash wait cancelled");
                return Err(TendiesError::Cancelled);
            }
            if let Some(hashes) = self.try_take()? {
                return Ok(hashes);
            }
            thread::sleep(self.interval);
        }
    }

    /// Consume the hash file if it is present
    pub fn try_take(&self) -> Result<Option<AppHashes>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        // an empty file is still being written
        let Some(hashes) = parse_hash_file(&contents) else {
            return Ok(None);
        };
        if let Err(e) = fs::remove_file(&self.path) {
            debug!("⚠️ Failed to remove hash file: {e}");
        }
        info!("🔑 Received app hash");
        Ok(Some(hashes))
    }
}

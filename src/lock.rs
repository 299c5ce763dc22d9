//! Process-wide mutual exclusion for state-mutating entry points.

use derive_more::{Display, Error};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Delay between lock attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lock acquisition failure with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Lock error: {} at {}:{}", message, file, line)]
pub struct LockError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl LockError {
    /// Creates a new lock error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        let message = message.into();
        error!(error_message = %message, "Lock error created");
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Exclusive advisory lock on a file, shared by every process of the deployment.
#[derive(Debug, Clone)]
pub struct TickLock {
    path: PathBuf,
    max_wait: Duration,
}

/// Proof that the tick lock is held. Released on drop.
///
/// Helpers that must only run under the lock take `&TickLockGuard`.
#[derive(Debug)]
pub struct TickLockGuard {
    file: File,
    path: PathBuf,
}

impl TickLock {
    /// Creates a lock on `path` that waits at most `max_wait`.
    pub fn new(path: impl Into<PathBuf>, max_wait: Duration) -> Self {
        Self {
            path: path.into(),
            max_wait,
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquires the lock, polling until the deadline.
    ///
    /// # Errors
    ///
    /// Returns [`LockError`] if the lock file cannot be opened or the lock is
    /// still held by someone else when `max_wait` elapses.
    #[instrument(skip(self), fields(path = %self.path.display(), max_wait = ?self.max_wait))]
    pub async fn acquire(&self) -> Result<TickLockGuard, LockError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|e| LockError::new(format!("Failed to create lock directory: {}", e)))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| LockError::new(format!("Failed to open lock file: {}", e)))?;

        let deadline = Instant::now() + self.max_wait;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    info!("Tick lock acquired");
                    return Ok(TickLockGuard {
                        file,
                        path: self.path.clone(),
                    });
                }
                Err(e) if Instant::now() >= deadline => {
                    return Err(LockError::new(format!(
                        "Timed out after {:?} waiting for {} ({})",
                        self.max_wait,
                        self.path.display(),
                        e
                    )));
                }
                Err(_) => {
                    debug!("Tick lock busy, waiting");
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }
    }
}

impl Drop for TickLockGuard {
    fn drop(&mut self) {
        match FileExt::unlock(&self.file) {
            Ok(()) => debug!(path = %self.path.display(), "Tick lock released"),
            // Closing the handle releases it regardless.
            Err(e) => warn!(error = %e, "Explicit unlock failed"),
        }
    }
}

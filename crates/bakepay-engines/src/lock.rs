//! Advisory cycle lock
//!
//! One lock file per cycle under the lock directory, created exclusively.
//! The holder's pid is written into it for operators. The file is removed
//! when the [`CycleLock`] is dropped.

use bakepay_core::{PayoutError, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

const RETRY_INTERVAL: Duration = Duration::from_millis(250);

/// Path of the lock file guarding `cycle`
pub fn lock_path(lock_dir: &Path, cycle: i64) -> PathBuf {
    lock_dir.join(format!("cycle-{}.lock", cycle))
}

#[derive(Debug)]
pub struct CycleLock {
    cycle: i64,
    path: PathBuf,
}

impl CycleLock {
    /// Take the lock if nobody holds it
    pub fn try_acquire(lock_dir: impl AsRef<Path>, cycle: i64) -> Result<Option<Self>> {
        let lock_dir = lock_dir.as_ref();
        fs::create_dir_all(lock_dir)?;
        let path = lock_path(lock_dir, cycle);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                debug!(cycle, path = %path.display(), "Cycle lock acquired");
                Ok(Some(Self { cycle, path }))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Wait up to `timeout` for the lock
    pub async fn acquire(lock_dir: impl AsRef<Path>, cycle: i64, timeout: Duration) -> Result<Self> {
        let lock_dir = lock_dir.as_ref();
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(lock) = Self::try_acquire(lock_dir, cycle)? {
                return Ok(lock);
            }
            let now = Instant::now();
            if now >= deadline {
                warn!(cycle, timeout_secs = timeout.as_secs(), "Timed out waiting for cycle lock");
                return Err(PayoutError::LockTimeout { cycle });
            }
            tokio::time::sleep(RETRY_INTERVAL.min(deadline - now)).await;
        }
    }

    pub fn cycle(&self) -> i64 {
        self.cycle
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CycleLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(cycle = self.cycle, error = %e, "Failed to release cycle lock");
        } else {
            debug!(cycle = self.cycle, "Cycle lock released");
        }
    }
}

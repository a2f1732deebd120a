//! Exclusive advisory lock guarding the registry's check-and-swap.
//!
//! `registry.lock` is a persistent file; ownership is an OS-level exclusive
//! lock on it, not its existence. The kernel drops the lock when the holder's
//! file handle closes, including when the process is killed mid-publish, so a
//! crashed writer never wedges the registry.

use std::fs::{File, OpenOptions};
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs4::fs_std::FileExt;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::storage_traits::StorageResult;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Held while a writer owns the registry. Released on drop.
///
/// Each acquisition opens its own handle, so the lock excludes other tasks in
/// this process as well as other processes sharing the directory.
#[derive(Debug)]
pub struct RegistryLock {
    path: PathBuf,
    file: File,
}

impl RegistryLock {
    /// Acquire the lock at `path`, polling until `timeout` elapses.
    pub async fn acquire(path: impl AsRef<Path>, timeout: Duration) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let deadline = Instant::now() + timeout;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        while file.try_lock_exclusive().is_err() {
            if Instant::now() >= deadline {
                warn!(lock = %path.display(), "registry lock wait timed out");
                return Err(RegistryError::LockTimeout { path });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        // Owner info for operators; the lock itself lives in the kernel.
        let _ = file.set_len(0).and_then(|_| file.rewind()).and_then(|_| {
            writeln!(
                file,
                "pid={} acquired_at={}",
                std::process::id(),
                chrono::Utc::now().to_rfc3339()
            )
        });
        debug!(lock = %path.display(), "registry lock acquired");
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        // Closing the handle releases the lock; this just makes it prompt.
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(lock = %self.path.display(), error = %e, "failed to release registry lock");
        }
    }
}

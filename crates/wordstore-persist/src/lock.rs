//! Advisory interprocess lock keyed by a target path.
//!
//! The lock lives in a sibling `<path>.lock` file that never holds payload
//! data. It is held for as long as the [`InterprocessLock`] guard is alive
//! and released on drop, whatever the exit path.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs4::FileExt;
use tracing::{debug, warn};

use crate::error::{PersistError, Result};

/// Suffix appended to the target path to form the lock file path.
pub const LOCK_SUFFIX: &str = ".lock";

/// Append `suffix` to the full file name of `path` (`words.cdb` -> `words.cdb.lock`).
pub fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Held exclusive lock on `<target>.lock`.
#[derive(Debug)]
pub struct InterprocessLock {
    file: File,
    path: PathBuf,
}

impl InterprocessLock {
    /// Lock file path for a target path.
    pub fn lock_path(target: &Path) -> PathBuf {
        sibling(target, LOCK_SUFFIX)
    }

    /// Acquire the lock for `target`, retrying every `retry` until `timeout`.
    ///
    /// At least one attempt is always made. Fails with
    /// [`PersistError::LockTimeout`] if the lock is still contended when the
    /// timeout expires, and with [`PersistError::LockUnavailable`] if the lock
    /// file cannot be opened or the platform refuses to lock it.
    pub fn acquire(target: &Path, timeout: Duration, retry: Duration) -> Result<Self> {
        let path = Self::lock_path(target);
        let file = open_lock_file(&path)?;
        let start = Instant::now();

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(lock = %path.display(), waited = ?start.elapsed(), "lock acquired");
                    return Ok(Self { file, path });
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    let waited = start.elapsed();
                    if waited >= timeout {
                        warn!(lock = %path.display(), ?waited, "lock acquisition timed out");
                        return Err(PersistError::LockTimeout { path, waited });
                    }
                    thread::sleep(retry.min(timeout - waited));
                }
                Err(source) => return Err(PersistError::LockUnavailable { path, source }),
            }
        }
    }

    /// Attempt the lock once without waiting.
    ///
    /// Returns `Ok(None)` if another holder has it.
    pub fn try_acquire(target: &Path) -> Result<Option<Self>> {
        let path = Self::lock_path(target);
        let file = open_lock_file(&path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file, path })),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(source) => Err(PersistError::LockUnavailable { path, source }),
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InterprocessLock {
    fn drop(&mut self) {
        // Closing the handle releases the lock too; unlocking first makes the
        // release point explicit.
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(lock = %self.path.display(), error = %e, "failed to unlock");
        }
        debug!(lock = %self.path.display(), "lock released");
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|source| PersistError::LockUnavailable {
            path: path.to_path_buf(),
            source,
        })
}

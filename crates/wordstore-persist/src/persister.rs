//! Crash-safe whole-file save and load.
//!
//! On-disk protocol for `save(path, bytes)`:
//! ```text
//! 1. lock   <path>.lock          (bounded wait)
//! 2. write  <path>.tmp           (fsync)
//! 3. rename <path>.tmp -> <path> (or the .bak dance, see below)
//! 4. fsync  parent directory
//! 5. unlock
//! ```
//!
//! The backup dance, for platforms that refuse to rename onto an existing
//! file: `<path> -> <path>.bak`, `<path>.tmp -> <path>`, remove `<path>.bak`.
//! An interruption at any step leaves a complete snapshot in `<path>` or
//! `<path>.bak`, and [`AtomicPersister::load`] falls back to the latter.

use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{PersistConfig, ReplaceStrategy};
use crate::error::{PersistError, Result};
use crate::lock::{sibling, InterprocessLock};

/// Suffix of the temp file a save writes before renaming it into place.
pub const TMP_SUFFIX: &str = ".tmp";

/// Suffix of the backup file used by the replace dance.
pub const BAK_SUFFIX: &str = ".bak";

/// Saves and loads whole files atomically under an interprocess lock.
#[derive(Clone, Debug, Default)]
pub struct AtomicPersister {
    config: PersistConfig,
}

impl AtomicPersister {
    /// Create a persister with the given configuration.
    pub fn new(config: PersistConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &PersistConfig {
        &self.config
    }

    /// Run `body` while holding the interprocess lock for `path`.
    ///
    /// The lock is released when `body` returns, fails, or panics. If the
    /// lock cannot be acquired, `body` never runs.
    pub fn with_lock<R>(&self, path: &Path, body: impl FnOnce() -> Result<R>) -> Result<R> {
        let _lock = InterprocessLock::acquire(
            path,
            self.config.lock_timeout(),
            self.config.lock_retry(),
        )?;
        body()
    }

    /// Durably replace the contents of `path` with `bytes`.
    ///
    /// Creates the parent directory if needed. On failure the previous
    /// contents of `path` are left intact.
    pub fn save(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| PersistError::io(parent, e))?;
            }
        }
        self.with_lock(path, || {
            let tmp = sibling(path, TMP_SUFFIX);
            write_temp(&tmp, bytes, self.config.sync_data)?;
            install(&tmp, path, self.config.replace)?;
            if self.config.sync_data {
                sync_parent(path)?;
            }
            debug!(path = %path.display(), len = bytes.len(), "snapshot saved");
            Ok(())
        })
    }

    /// Read the current durable contents of `path`.
    ///
    /// Fails with an I/O `NotFound` error if no snapshot exists.
    pub fn load(&self, path: &Path) -> Result<Vec<u8>> {
        self.load_optional(path)?
            .ok_or_else(|| PersistError::io(path, io::Error::from(ErrorKind::NotFound)))
    }

    /// Read the current durable contents of `path`, or `None` if neither
    /// `path` nor its `.bak` exists.
    pub fn load_optional(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Ok(None);
            }
        }
        self.with_lock(path, || {
            if let Some(bytes) = read_if_exists(path)? {
                debug!(path = %path.display(), len = bytes.len(), "snapshot loaded");
                return Ok(Some(bytes));
            }
            let bak = sibling(path, BAK_SUFFIX);
            match read_if_exists(&bak)? {
                Some(bytes) => {
                    warn!(
                        path = %path.display(),
                        backup = %bak.display(),
                        "snapshot missing; loaded backup left by an interrupted save"
                    );
                    Ok(Some(bytes))
                }
                None => Ok(None),
            }
        })
    }

    /// Serialize `value` with bincode and save it.
    pub fn save_value<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let bytes = bincode::serialize(value).map_err(|e| PersistError::Serialization {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        self.save(path, &bytes)
    }

    /// Load and deserialize a value saved with [`save_value`](Self::save_value).
    pub fn load_value<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let bytes = self.load(path)?;
        decode(path, &bytes)
    }

    /// Like [`load_value`](Self::load_value), but `None` when nothing is saved.
    pub fn load_value_optional<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match self.load_optional(path)? {
            Some(bytes) => decode(path, &bytes).map(Some),
            None => Ok(None),
        }
    }
}

fn decode<T: DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| PersistError::Deserialization {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PersistError::io(path, e)),
    }
}

/// Write `bytes` to the temp file. Removes the temp file on failure.
pub(crate) fn write_temp(tmp: &Path, bytes: &[u8], sync: bool) -> Result<()> {
    let written = File::create(tmp).and_then(|mut file| {
        file.write_all(bytes)?;
        file.flush()?;
        if sync {
            file.sync_all()?;
        }
        Ok(())
    });
    if let Err(e) = written {
        warn!(tmp = %tmp.display(), error = %e, "failed to write temp file");
        if tmp.is_file() {
            let _ = fs::remove_file(tmp);
        }
        return Err(PersistError::io(tmp, e));
    }
    Ok(())
}

/// Move a fully written temp file over `path`.
pub(crate) fn install(tmp: &Path, path: &Path, strategy: ReplaceStrategy) -> Result<()> {
    match strategy {
        // `path` now holds the newest snapshot; a .bak left by an
        // interrupted dance is older and must not outlive it.
        ReplaceStrategy::Rename => match fs::rename(tmp, path) {
            Ok(()) => remove_if_exists(&sibling(path, BAK_SUFFIX)),
            Err(e) if path.exists() => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "rename onto existing file refused; using backup dance"
                );
                backup_dance(tmp, path)
            }
            Err(e) => Err(PersistError::io(path, e)),
        },
        ReplaceStrategy::BackupDance => backup_dance(tmp, path),
    }
}

fn backup_dance(tmp: &Path, path: &Path) -> Result<()> {
    let bak = sibling(path, BAK_SUFFIX);

    let had_old = path.exists();
    if had_old {
        // A stale .bak is only discarded while `path` still holds a snapshot.
        remove_if_exists(&bak)?;
        fs::rename(path, &bak).map_err(|e| PersistError::io(path, e))?;
    }

    if let Err(e) = fs::rename(tmp, path) {
        if had_old {
            if let Err(restore) = fs::rename(&bak, path) {
                warn!(
                    path = %path.display(),
                    backup = %bak.display(),
                    error = %restore,
                    "could not restore snapshot; only the backup holds it"
                );
            }
        }
        return Err(PersistError::io(path, e));
    }

    remove_if_exists(&bak)
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PersistError::io(path, e)),
    }
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(parent)
        .and_then(|dir| dir.sync_all())
        .map_err(|e| PersistError::io(parent, e))
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> Result<()> {
    Ok(())
}

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a fully written temp file replaces the live snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplaceStrategy {
    /// Atomic rename over the existing file. If the platform refuses to
    /// rename onto an existing file, falls back to the backup dance.
    #[default]
    Rename,
    /// Always rename the live file to `.bak`, move the temp file into place,
    /// then remove the `.bak`.
    BackupDance,
}

/// Configuration for [`AtomicPersister`](crate::AtomicPersister).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    /// Maximum time to wait for the interprocess lock, in milliseconds.
    pub lock_timeout_ms: u64,
    /// Delay between lock acquisition attempts, in milliseconds.
    pub lock_retry_ms: u64,
    /// `fsync` the temp file and its directory around the rename.
    pub sync_data: bool,
    /// How the temp file replaces the live file.
    pub replace: ReplaceStrategy,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 20_000,
            lock_retry_ms: 50,
            sync_data: true,
            replace: ReplaceStrategy::default(),
        }
    }
}

impl PersistConfig {
    /// Lock acquisition timeout.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Delay between lock attempts. Never zero.
    pub fn lock_retry(&self) -> Duration {
        Duration::from_millis(self.lock_retry_ms.max(1))
    }

    /// Return a copy with a different lock timeout.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Return a copy with a different replace strategy.
    pub fn with_replace(mut self, replace: ReplaceStrategy) -> Self {
        self.replace = replace;
        self
    }
}

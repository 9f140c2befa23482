use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use wordstore_overlay::OverlayConfig;
use wordstore_persist::PersistConfig;

/// Settings read from `--config`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub persist: PersistConfig,
    pub overlay: OverlayConfig,
}

impl CliConfig {
    /// Read the TOML file at `path`, or use defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("invalid config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wordstore_persist::ReplaceStrategy;

    #[test]
    fn no_path_is_default() {
        assert_eq!(CliConfig::load(None).unwrap(), CliConfig::default());
    }

    #[test]
    fn parses_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wordstore.toml");
        fs::write(
            &path,
            "[persist]\nlock_timeout_ms = 500\nreplace = \"backup_dance\"\n\n[overlay]\nbackup_dump = true\n",
        )
        .unwrap();

        let config = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(config.persist.lock_timeout_ms, 500);
        assert_eq!(config.persist.replace, ReplaceStrategy::BackupDance);
        assert!(config.persist.sync_data);
        assert!(config.overlay.backup_dump);
    }

    #[test]
    fn missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CliConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}

use serde::{Deserialize, Serialize};

/// Configuration for overlays over compiled indexes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Also write a textual dump of every rebuilt index to `<path>.txt`.
    pub backup_dump: bool,
}

impl OverlayConfig {
    /// Return a copy with the textual dump enabled or disabled.
    pub fn with_backup_dump(mut self, enabled: bool) -> Self {
        self.backup_dump = enabled;
        self
    }
}

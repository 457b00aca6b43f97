use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration.
///
/// Constructed by the host and passed into the controller; there is no
/// process-global settings instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Debounce delay after the last edit before an auto-save fires (ms)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Periodic auto-save safety-net interval (ms)
    #[serde(default = "default_autosave_interval_ms")]
    pub autosave_interval_ms: u64,
    /// Base directory for the local draft store files
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    /// Key prefix for per-field draft entries
    #[serde(default = "default_field_prefix")]
    pub field_prefix: String,
}

fn default_debounce_ms() -> u64 {
    3_000
}

fn default_autosave_interval_ms() -> u64 {
    30_000
}

fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("onboarding-sync")
}

fn default_field_prefix() -> String {
    "onboarding_field_".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            autosave_interval_ms: default_autosave_interval_ms(),
            storage_dir: default_storage_dir(),
            field_prefix: default_field_prefix(),
        }
    }
}

impl EngineConfig {
    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_millis(self.autosave_interval_ms)
    }
}

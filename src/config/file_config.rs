use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Server endpoints (can override CLI)
    pub base_url: Option<String>,
    pub ws_url: Option<String>,
    pub request_timeout_sec: Option<u64>,

    // Subscription behaviour
    pub sync: Option<SyncConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SyncConfig {
    pub reconnect_delay_sec: Option<u64>,
    pub frame_buffer: Option<usize>,
    pub mark_read_on_view: Option<bool>,
    /// Seconds between server push triggers, 0 disables them
    pub trigger_interval_sec: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

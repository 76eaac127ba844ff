mod file_config;

pub use file_config::{FileConfig, SyncConfig};

use crate::subscription::SyncSettings;
use anyhow::{bail, Result};
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub base_url: Option<String>,
    pub ws_url: Option<String>,
    pub request_timeout_sec: u64,
    pub reconnect_delay_sec: u64,
    pub frame_buffer: usize,
    pub mark_read_on_view: bool,
    pub trigger_interval_sec: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_url: String,
    pub ws_url: String,
    pub request_timeout_sec: u64,
    pub reconnect_delay_sec: u64,
    pub frame_buffer: usize,
    pub mark_read_on_view: bool,
    /// None when periodic push triggers are disabled.
    pub trigger_interval: Option<Duration>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let base_url = file
            .base_url
            .or_else(|| cli.base_url.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("base_url must be specified via --base-url or in config file")
            })?;
        let base_url = base_url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            bail!("base_url must be an http(s) URL: {}", base_url);
        }

        let ws_url = match file.ws_url.or_else(|| cli.ws_url.clone()) {
            Some(url) => {
                if !url.starts_with("ws://") && !url.starts_with("wss://") {
                    bail!("ws_url must be a ws(s) URL: {}", url);
                }
                url
            }
            None => derive_ws_url(&base_url),
        };

        let request_timeout_sec = file.request_timeout_sec.unwrap_or(cli.request_timeout_sec);

        let sync = file.sync.unwrap_or_default();
        let reconnect_delay_sec = sync.reconnect_delay_sec.unwrap_or(cli.reconnect_delay_sec);
        let frame_buffer = sync.frame_buffer.unwrap_or(cli.frame_buffer);
        if frame_buffer == 0 {
            bail!("frame_buffer must be greater than 0");
        }
        let mark_read_on_view = sync.mark_read_on_view.unwrap_or(cli.mark_read_on_view);
        let trigger_interval = match sync
            .trigger_interval_sec
            .unwrap_or(cli.trigger_interval_sec)
        {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            base_url,
            ws_url,
            request_timeout_sec,
            reconnect_delay_sec,
            frame_buffer,
            mark_read_on_view,
            trigger_interval,
        })
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            endpoint: self.ws_url.clone(),
            frame_buffer: self.frame_buffer,
            reconnect_delay: Duration::from_secs(self.reconnect_delay_sec),
        }
    }
}

/// Push endpoint served next to the HTTP API: same host, ws(s) scheme, `/ws`.
fn derive_ws_url(base_url: &str) -> String {
    if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{}/ws", rest)
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{}/ws", rest)
    } else {
        format!("{}/ws", base_url)
    }
}

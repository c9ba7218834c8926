/// Configuration for the KanbanAI board client.
/// Reads client.json from ~/.config/kanbanai/client.json (or platform equivalent).

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Bearer credential issued by the auth service.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub log_to_file: bool,
}

fn default_api_base() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_ws_url() -> String {
    "ws://127.0.0.1:8000/ws".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_request_timeout_secs() -> u64 {
    15
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            ws_url: default_ws_url(),
            token: None,
            reconnect_delay_ms: default_reconnect_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            log_to_file: false,
        }
    }
}

impl ClientConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Directory holding client.json and the logs folder.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kanbanai")
}

/// Default config path: ~/.config/kanbanai/client.json
pub fn default_config_path() -> PathBuf {
    config_dir().join("client.json")
}

/// Read client.json. A missing file means first run; an unreadable or
/// malformed one is logged and replaced by defaults so the client still starts.
pub fn load_config(path: &Path) -> ClientConfig {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::info!("[config] No config at {}, using defaults", path.display());
            return ClientConfig::default();
        }
        Err(e) => {
            log::warn!("[config] Cannot read {}: {}", path.display(), e);
            return ClientConfig::default();
        }
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        log::warn!("[config] Invalid {}: {}", path.display(), e);
        ClientConfig::default()
    })
}

// crates/core/src/config.rs
//! Backend configuration.
//!
//! A session is started from one `BackendConfig` value, usually deserialized
//! from the host's settings. Validation happens once in `spawn_backend`;
//! after that the config is immutable for the backend's lifetime.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Which backend to run and its settings. Tagged so host settings read as
/// `{"type": "live", "live_id": 92613}` or `{"type": "process", "cmd": "..."}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    Live(LiveConfig),
    Process(ProcessConfig),
}

impl BackendConfig {
    /// Parse a config from its JSON representation.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value)?)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        match self {
            BackendConfig::Live(cfg) if cfg.live_id == 0 => Err(ConfigError::Missing("live_id")),
            BackendConfig::Process(cfg) if cfg.cmd.trim().is_empty() => {
                Err(ConfigError::Missing("cmd"))
            }
            _ => Ok(()),
        }
    }

    /// Human-readable backend description, used in the session start notice.
    pub fn describe(&self) -> String {
        match self {
            BackendConfig::Live(cfg) => format!("Live {}", cfg.live_id),
            BackendConfig::Process(cfg) => format!("External: {}", cfg.cmd),
        }
    }
}

/// Live chat-server backend settings. Endpoint fields default to the real
/// vendor services; tests point them at local stand-ins, and the intervals
/// shrink to millisecond scale there.
#[derive(Debug, Clone, Deserialize)]
pub struct LiveConfig {
    /// Public room id as shown to viewers; resolved to the numeric room id
    /// through `room_api` at connect time.
    pub live_id: u64,

    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    #[serde(default = "default_room_api")]
    pub room_api: String,

    #[serde(default = "default_avatar_api")]
    pub avatar_api: String,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl LiveConfig {
    /// Config for the given public room id with all defaults.
    pub fn new(live_id: u64) -> Self {
        Self {
            live_id,
            ws_url: default_ws_url(),
            room_api: default_room_api(),
            avatar_api: default_avatar_api(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Subprocess backend settings. The command runs under `sh -c`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessConfig {
    pub cmd: String,
}

fn default_ws_url() -> String {
    "wss://broadcastlv.chat.bilibili.com/sub".to_string()
}

fn default_room_api() -> String {
    "https://api.live.bilibili.com/room/v1/Room/room_init".to_string()
}

fn default_avatar_api() -> String {
    "https://api.bilibili.com/x/space/app/index".to_string()
}

fn default_heartbeat_interval_ms() -> u64 {
    10_000
}

fn default_reconnect_delay_ms() -> u64 {
    3_000
}

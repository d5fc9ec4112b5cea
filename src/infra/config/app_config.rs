use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AppConfig {
    pub logging: LogConfig,
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    /// When set, logs also go to a daily-rolled file in this directory.
    pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    pub ws_url: String,
    pub api_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://localhost:8443/events".to_owned(),
            api_url: "https://localhost:8443/api".to_owned(),
        }
    }
}

/// Credentials scoping the transport session. An empty token means the
/// client is not authenticated and the engine stays disconnected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SessionConfig {
    pub account_id: String,
    pub tenant_id: String,
    pub auth_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
    /// Delay between a successful connect and the first queue pass, letting
    /// the transport settle.
    pub settle_delay_ms: u64,
    /// Delay before reconnecting after a server-initiated disconnect or a
    /// failed connect attempt.
    pub reconnect_delay_ms: u64,
    /// Delay between teardown and reconnect on a credential-scope change.
    pub scope_switch_delay_ms: u64,
    /// Ceiling for the acknowledgment wait on a queued submission.
    pub ack_timeout_ms: u64,
    /// Connect attempts before the recoverable retrying state becomes a
    /// terminal error.
    pub max_connect_retries: u32,
    /// Failed queue operations older than this are purged.
    pub failed_op_retention_hours: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 2_000,
            reconnect_delay_ms: 3_000,
            scope_switch_delay_ms: 1_000,
            ack_timeout_ms: 5_000,
            max_connect_retries: 5,
            failed_op_retention_hours: 24,
        }
    }
}

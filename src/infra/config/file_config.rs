use std::path::PathBuf;

use serde::Deserialize;

use crate::infra::config::{AppConfig, LogConfig, ServerConfig, SessionConfig, SyncConfig};

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub logging: Option<FileLogConfig>,
    pub server: Option<FileServerConfig>,
    pub session: Option<FileSessionConfig>,
    pub sync: Option<FileSyncConfig>,
}

impl FileConfig {
    pub fn merge_into(self, config: &mut AppConfig) {
        if let Some(logging) = self.logging {
            logging.merge_into(&mut config.logging);
        }

        if let Some(server) = self.server {
            server.merge_into(&mut config.server);
        }

        if let Some(session) = self.session {
            session.merge_into(&mut config.session);
        }

        if let Some(sync) = self.sync {
            sync.merge_into(&mut config.sync);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogConfig {
    pub level: Option<String>,
    pub directory: Option<PathBuf>,
}

impl FileLogConfig {
    fn merge_into(self, config: &mut LogConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }

        if let Some(directory) = self.directory {
            config.directory = Some(directory);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileServerConfig {
    pub ws_url: Option<String>,
    pub api_url: Option<String>,
}

impl FileServerConfig {
    fn merge_into(self, config: &mut ServerConfig) {
        if let Some(ws_url) = self.ws_url {
            config.ws_url = ws_url;
        }

        if let Some(api_url) = self.api_url {
            config.api_url = api_url;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileSessionConfig {
    pub account_id: Option<String>,
    pub tenant_id: Option<String>,
    pub auth_token: Option<String>,
}

impl FileSessionConfig {
    fn merge_into(self, config: &mut SessionConfig) {
        if let Some(account_id) = self.account_id {
            config.account_id = account_id;
        }

        if let Some(tenant_id) = self.tenant_id {
            config.tenant_id = tenant_id;
        }

        if let Some(auth_token) = self.auth_token {
            config.auth_token = auth_token;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileSyncConfig {
    pub settle_delay_ms: Option<u64>,
    pub reconnect_delay_ms: Option<u64>,
    pub scope_switch_delay_ms: Option<u64>,
    pub ack_timeout_ms: Option<u64>,
    pub max_connect_retries: Option<u32>,
    pub failed_op_retention_hours: Option<u64>,
}

impl FileSyncConfig {
    fn merge_into(self, config: &mut SyncConfig) {
        if let Some(settle_delay_ms) = self.settle_delay_ms {
            config.settle_delay_ms = settle_delay_ms;
        }

        if let Some(reconnect_delay_ms) = self.reconnect_delay_ms {
            config.reconnect_delay_ms = reconnect_delay_ms;
        }

        if let Some(scope_switch_delay_ms) = self.scope_switch_delay_ms {
            config.scope_switch_delay_ms = scope_switch_delay_ms;
        }

        if let Some(ack_timeout_ms) = self.ack_timeout_ms {
            config.ack_timeout_ms = ack_timeout_ms;
        }

        if let Some(max_connect_retries) = self.max_connect_retries {
            config.max_connect_retries = max_connect_retries;
        }

        if let Some(failed_op_retention_hours) = self.failed_op_retention_hours {
            config.failed_op_retention_hours = failed_op_retention_hours;
        }
    }
}

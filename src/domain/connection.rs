use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionPhase {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Disconnected => "CONNECTION_DISCONNECTED",
            Self::Connecting => "CONNECTION_CONNECTING",
            Self::Connected => "CONNECTION_CONNECTED",
            Self::Error => "CONNECTION_ERROR",
        }
    }
}

/// Connection state owned exclusively by the connection manager. Everything
/// else only reads snapshots of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionStatus {
    pub phase: ConnectionPhase,
    /// Unix milliseconds of the most recent transition to disconnected.
    pub disconnected_at: Option<i64>,
    /// Set on the first successful connection and never cleared.
    pub has_ever_connected: bool,
}

impl ConnectionStatus {
    /// Elapsed downtime, when a disconnect timestamp is known.
    pub fn downtime_ms(&self, now_ms: i64) -> Option<i64> {
        self.disconnected_at
            .map(|at| now_ms.saturating_sub(at).max(0))
    }
}

pub fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    SendMessage,
    SendTemplate,
}

impl OperationKind {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::SendMessage => "send-message",
            Self::SendTemplate => "send-template",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    Pending,
    Completed,
    Failed,
}

/// A durable outbound action awaiting confirmed delivery. Created when an
/// action cannot be confirmed immediately, destroyed on confirmed completion
/// or by retention cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOperation {
    pub id: String,
    pub kind: OperationKind,
    /// Opaque submission payload, forwarded to the gateway verbatim.
    pub payload: serde_json::Value,
    pub status: OperationStatus,
    /// Unix milliseconds.
    pub created_at: i64,
    pub last_error: Option<String>,
}

impl SyncOperation {
    pub fn new(id: String, kind: OperationKind, payload: serde_json::Value, now_ms: i64) -> Self {
        Self {
            id,
            kind,
            payload,
            status: OperationStatus::Pending,
            created_at: now_ms,
            last_error: None,
        }
    }

    /// Failed operations older than the retention horizon are no longer
    /// retried and may be purged.
    pub fn is_beyond_retention(&self, now_ms: i64, retention_ms: i64) -> bool {
        now_ms.saturating_sub(self.created_at) > retention_ms
    }

    /// The client temp id this operation will confirm, for send operations
    /// that carry one.
    pub fn temp_id(&self) -> Option<&str> {
        self.payload.get("tempId").and_then(|value| value.as_str())
    }
}

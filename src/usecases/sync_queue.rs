//! Drains the persisted queue of outbound operations once connectivity is
//! available: serial, in creation order, with idempotent completion marking.

use std::time::Duration;

use crate::{
    domain::{
        inbox::InboxState,
        message::MessageStatus,
        sync_operation::{OperationKind, OperationStatus, SyncOperation},
    },
    usecases::contracts::{CacheStore, GatewayError, OutboundGateway},
};

const QUEUE_PASS_COMPLETED: &str = "SYNC_QUEUE_PASS_COMPLETED";
const QUEUE_SUBMISSION_FAILED: &str = "SYNC_QUEUE_SUBMISSION_FAILED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassSummary {
    /// False when the pass was skipped (already running, or disconnected).
    pub ran: bool,
    pub submitted: usize,
    pub failed: usize,
}

/// Owns the one-pass-at-a-time discipline for queue replay. Concurrent
/// triggers (reconnect settle timer, reachability change, foreground event)
/// must not run overlapping passes.
#[derive(Debug, Default)]
pub struct SyncQueueProcessor {
    in_progress: bool,
}

impl SyncQueueProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one replay pass. Does nothing while another pass is active or
    /// the transport is not connected. Stops at the first sign of a dead
    /// transport; remaining operations wait for the next trigger.
    pub async fn process(
        &mut self,
        gateway: &dyn OutboundGateway,
        cache: &mut dyn CacheStore,
        inbox: &mut InboxState,
        ack_timeout: Duration,
        retention_ms: i64,
        now_ms: i64,
    ) -> PassSummary {
        if self.in_progress || !gateway.is_connected() {
            return PassSummary::default();
        }
        self.in_progress = true;

        let mut summary = PassSummary {
            ran: true,
            ..PassSummary::default()
        };

        for operation in cache.pending_operations() {
            if !gateway.is_connected() {
                break;
            }
            // Failed operations are retried until the retention horizon,
            // then left for cleanup below.
            if operation.status == OperationStatus::Failed
                && operation.is_beyond_retention(now_ms, retention_ms)
            {
                tracing::debug!(
                    operation_id = %operation.id,
                    kind = operation.kind.as_label(),
                    last_error = ?operation.last_error,
                    "retention-expired operation skipped"
                );
                continue;
            }

            match submit(gateway, &operation, ack_timeout).await {
                Ok(()) => {
                    cache.mark_completed(&operation.id);
                    confirm_optimistic_entry(inbox, &operation);
                    summary.submitted += 1;
                }
                Err(GatewayError::NotConnected) => {
                    cache.mark_failed(&operation.id, "transport not connected");
                    summary.failed += 1;
                    tracing::warn!(
                        code = QUEUE_SUBMISSION_FAILED,
                        operation_id = %operation.id,
                        kind = operation.kind.as_label(),
                        "queue pass stopped on dead transport"
                    );
                    break;
                }
                Err(GatewayError::Rejected(reason)) => {
                    cache.mark_failed(&operation.id, &reason);
                    summary.failed += 1;
                }
            }
        }

        cache.cleanup_queue(now_ms, retention_ms);
        self.in_progress = false;

        tracing::debug!(
            code = QUEUE_PASS_COMPLETED,
            submitted = summary.submitted,
            failed = summary.failed,
            "sync queue pass finished"
        );
        summary
    }

    #[cfg(test)]
    fn force_in_progress(&mut self) {
        self.in_progress = true;
    }
}

async fn submit(
    gateway: &dyn OutboundGateway,
    operation: &SyncOperation,
    ack_timeout: Duration,
) -> Result<(), GatewayError> {
    let attempt = async {
        match operation.kind {
            OperationKind::SendMessage => gateway.send_message(&operation.payload).await,
            OperationKind::SendTemplate => gateway.send_template(&operation.payload).await,
        }
    };

    match tokio::time::timeout(ack_timeout, attempt).await {
        Ok(result) => result,
        // The transport offers no reliable ack channel; an elapsed wait
        // counts as likely sent and receipts settle the truth later.
        Err(_) => Ok(()),
    }
}

/// A replayed send leaves the queued state; delivery receipts promote it
/// further from here.
fn confirm_optimistic_entry(inbox: &mut InboxState, operation: &SyncOperation) {
    let (Some(chat_id), Some(temp_id)) = (
        operation.payload.get("chatId").and_then(|v| v.as_str()),
        operation.temp_id(),
    ) else {
        return;
    };

    let chat_id = chat_id.to_owned();
    let temp_id = temp_id.to_owned();
    if let Some(message) = inbox
        .conversation_mut(&chat_id)
        .iter_mut()
        .find(|m| m.temp_id.as_deref() == Some(temp_id.as_str()))
    {
        if message.status == MessageStatus::Queued {
            message.status = MessageStatus::Pending;
        }
    }
}

//! Use case for sending a message from the inbox.
//!
//! A send always creates an optimistic entry first so the conversation view
//! updates instantly. Submission then either goes straight out over the live
//! gateway or is captured as a durable queue operation for later replay.

use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use crate::{
    domain::{
        message::{Message, MessageType, TEMP_ID_PREFIX},
        sync_operation::{OperationKind, SyncOperation},
    },
    usecases::contracts::{GatewayError, OutboundGateway},
};

/// Command to send a text message to a specific chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageCommand {
    pub chat_id: String,
    pub body: String,
}

/// Command to send a pre-approved template to a specific chat.
#[derive(Debug, Clone, PartialEq)]
pub struct SendTemplateCommand {
    pub chat_id: String,
    pub template: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendMessageError {
    /// Message text is empty after trimming whitespace.
    EmptyMessage,
}

/// An optimistic entry plus the durable operation that would confirm it.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSend {
    pub chat_id: String,
    pub message: Message,
    pub operation: SyncOperation,
}

/// Validates the command and builds the optimistic message together with its
/// replayable operation.
///
/// # Errors
/// Returns `SendMessageError::EmptyMessage` if the text is empty or
/// whitespace only.
pub fn prepare_send(command: &SendMessageCommand, now_ms: i64) -> Result<PreparedSend, SendMessageError> {
    let body = command.body.trim();
    if body.is_empty() {
        return Err(SendMessageError::EmptyMessage);
    }

    let temp_id = format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4());
    let message = Message::optimistic(temp_id.clone(), MessageType::Text, body.to_owned(), now_ms);
    let payload = json!({
        "chatId": command.chat_id,
        "tempId": temp_id,
        "type": MessageType::Text.as_label(),
        "body": body,
    });
    let operation = SyncOperation::new(
        format!("op-{}", Uuid::new_v4()),
        OperationKind::SendMessage,
        payload,
        now_ms,
    );

    Ok(PreparedSend {
        chat_id: command.chat_id.clone(),
        message,
        operation,
    })
}

/// Builds the durable operation for a template send. Templates have no
/// free-text body to validate; the payload is forwarded opaquely.
pub fn prepare_template_send(command: &SendTemplateCommand, now_ms: i64) -> PreparedSend {
    let temp_id = format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4());
    let message = Message::optimistic(
        temp_id.clone(),
        MessageType::Template,
        String::new(),
        now_ms,
    );
    let payload = json!({
        "chatId": command.chat_id,
        "tempId": temp_id,
        "type": MessageType::Template.as_label(),
        "template": command.template,
    });
    let operation = SyncOperation::new(
        format!("op-{}", Uuid::new_v4()),
        OperationKind::SendTemplate,
        payload,
        now_ms,
    );

    PreparedSend {
        chat_id: command.chat_id.clone(),
        message,
        operation,
    }
}

/// Outcome of trying to submit a prepared send right away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Submission went out (or the bounded wait elapsed, which counts as
    /// likely sent). Delivery receipts arrive separately.
    Submitted,
    /// The gateway could not take the submission; the operation must be
    /// queued for replay.
    Deferred,
}

/// Attempts immediate submission with a bounded acknowledgment wait.
pub async fn dispatch_send(
    gateway: &dyn OutboundGateway,
    prepared: &PreparedSend,
    ack_timeout: Duration,
) -> DispatchOutcome {
    if !gateway.is_connected() {
        return DispatchOutcome::Deferred;
    }

    let submit = async {
        match prepared.operation.kind {
            OperationKind::SendMessage => gateway.send_message(&prepared.operation.payload).await,
            OperationKind::SendTemplate => gateway.send_template(&prepared.operation.payload).await,
        }
    };

    match tokio::time::timeout(ack_timeout, submit).await {
        Ok(Ok(())) => DispatchOutcome::Submitted,
        // No reliable ack channel: an elapsed wait is treated as likely
        // sent, receipts will settle the truth.
        Err(_) => DispatchOutcome::Submitted,
        Ok(Err(GatewayError::NotConnected)) => DispatchOutcome::Deferred,
        Ok(Err(GatewayError::Rejected(_))) => DispatchOutcome::Deferred,
    }
}

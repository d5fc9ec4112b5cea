//! In-memory stand-ins for the external collaborators. The cache store
//! backs tests and compositions that bring their own persistence later; the
//! notifier swallows everything.

use std::collections::HashMap;

use crate::{
    domain::{
        chat::{Chat, ContactRef},
        message::Message,
        sync_operation::{OperationStatus, SyncOperation},
    },
    usecases::contracts::{CacheStore, Notifier},
};

#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStore {
    chats: Vec<Chat>,
    conversations: HashMap<String, Vec<Message>>,
    queue: Vec<SyncOperation>,
}

#[cfg_attr(not(test), allow(dead_code))]
impl MemoryCacheStore {
    pub fn seed_chats(&mut self, chats: Vec<Chat>) {
        self.chats = chats;
    }

    pub fn seed_conversation(&mut self, chat_id: &str, messages: Vec<Message>) {
        self.conversations.insert(chat_id.to_owned(), messages);
    }
}

impl CacheStore for MemoryCacheStore {
    fn cached_chats(&self) -> Vec<Chat> {
        self.chats.clone()
    }

    fn cached_conversation(&self, chat_id: &str) -> Vec<Message> {
        self.conversations.get(chat_id).cloned().unwrap_or_default()
    }

    fn invalidate_chats(&mut self) {
        self.chats.clear();
    }

    fn enqueue_operation(&mut self, operation: SyncOperation) {
        self.queue.push(operation);
    }

    fn pending_operations(&self) -> Vec<SyncOperation> {
        let mut operations: Vec<SyncOperation> = self
            .queue
            .iter()
            .filter(|operation| operation.status != OperationStatus::Completed)
            .cloned()
            .collect();
        operations.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        operations
    }

    fn mark_completed(&mut self, operation_id: &str) {
        if let Some(operation) = self.queue.iter_mut().find(|op| op.id == operation_id) {
            operation.status = OperationStatus::Completed;
            operation.last_error = None;
        }
    }

    fn mark_failed(&mut self, operation_id: &str, reason: &str) {
        if let Some(operation) = self.queue.iter_mut().find(|op| op.id == operation_id) {
            operation.status = OperationStatus::Failed;
            operation.last_error = Some(reason.to_owned());
        }
    }

    fn cleanup_queue(&mut self, now_ms: i64, retention_ms: i64) {
        self.queue.retain(|operation| match operation.status {
            OperationStatus::Completed => false,
            OperationStatus::Failed => !operation.is_beyond_retention(now_ms, retention_ms),
            OperationStatus::Pending => true,
        });
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify_incoming_message(&self, _message: &Message, _contact: &ContactRef, _chat_id: &str) {}

    fn set_badge_count(&self, _count: u32) {}
}

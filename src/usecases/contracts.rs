//! Seams to the engine's external collaborators: the server fetch contract,
//! the outbound gateway, the local cache store, and the notification
//! collaborator. Use cases depend on these traits only; adapters live in
//! `transport` and `infra`.

use async_trait::async_trait;

use crate::domain::{
    chat::{Chat, ContactRef},
    message::Message,
    sync_operation::SyncOperation,
};

/// One page of the paginated "list chats" server contract.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPage {
    pub chats: Vec<Chat>,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchSourceError {
    Unauthorized,
    Unavailable,
    InvalidData,
}

#[async_trait]
pub trait ChatDirectory: Send + Sync {
    /// Fetches one page of chat summaries. `cursor` is the oldest update
    /// timestamp already seen, so consecutive pages do not overlap.
    async fn list_chats(
        &self,
        filter: Option<&str>,
        cursor: Option<i64>,
    ) -> Result<ChatPage, FetchSourceError>;
}

/// How much of a conversation to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationScope {
    All,
    /// Paged read for long histories.
    #[cfg_attr(not(test), allow(dead_code))]
    Window { limit: usize, skip: usize },
}

#[async_trait]
pub trait ConversationSource: Send + Sync {
    async fn fetch_conversation(
        &self,
        chat_id: &str,
        scope: ConversationScope,
    ) -> Result<Vec<Message>, FetchSourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The transport was not connected at send time.
    NotConnected,
    /// The transport accepted the session but refused this submission.
    Rejected(String),
}

/// Fire-and-confirm outbound actions over the live session.
#[async_trait]
pub trait OutboundGateway: Send + Sync {
    fn is_connected(&self) -> bool;
    async fn send_message(&self, payload: &serde_json::Value) -> Result<(), GatewayError>;
    async fn send_template(&self, payload: &serde_json::Value) -> Result<(), GatewayError>;
    async fn reset_unread_count(&self, chat_id: &str) -> Result<(), GatewayError>;
}

/// Narrow contract over the persisted local cache. The physical storage
/// engine is out of scope; the engine treats it as eventually consistent and
/// prefers fresh server reads at merge time.
pub trait CacheStore: Send {
    fn cached_chats(&self) -> Vec<Chat>;
    fn cached_conversation(&self, chat_id: &str) -> Vec<Message>;
    fn invalidate_chats(&mut self);

    fn enqueue_operation(&mut self, operation: SyncOperation);
    /// Operations still owed to the server (pending and failed), in creation
    /// order. Completed operations are never returned.
    fn pending_operations(&self) -> Vec<SyncOperation>;
    fn mark_completed(&mut self, operation_id: &str);
    fn mark_failed(&mut self, operation_id: &str, reason: &str);
    /// Purges completed operations and failed operations older than the
    /// retention horizon.
    fn cleanup_queue(&mut self, now_ms: i64, retention_ms: i64);
}

/// External notification collaborator.
pub trait Notifier: Send {
    fn notify_incoming_message(&self, message: &Message, contact: &ContactRef, chat_id: &str);
    fn set_badge_count(&self, count: u32);
}

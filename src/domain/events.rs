use super::{
    chat::Chat,
    message::{Message, MessageStatus},
};

/// Transport lifecycle notifications produced by the session layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The session dropped. `server_initiated` distinguishes a remote close
    /// (schedule an automatic reconnect) from a local teardown.
    Disconnected { server_initiated: bool },
}

/// Delivery receipt for a previously sent message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub chat_id: String,
    pub wamid: Option<String>,
    pub temp_id: Option<String>,
    pub status: MessageStatus,
    pub sent_at: Option<i64>,
    pub delivered_at: Option<i64>,
    pub read_at: Option<i64>,
}

/// One sender's reaction change on a delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionUpdate {
    pub chat_id: String,
    pub wamid: String,
    pub sender: String,
    /// Empty string removes the sender's reaction.
    pub emoji: String,
}

/// A chat snapshot plus the messages it arrived with, as delivered by the
/// bulk catch-up event.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkChatUpdate {
    pub chat: Chat,
    pub messages: Vec<Message>,
}

/// Canonical form of every event the server pushes over the session, decoded
/// once at the wire boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    NewMessage {
        chat: Box<Chat>,
        message: Box<Message>,
    },
    NewMessagesBulk {
        updates: Vec<BulkChatUpdate>,
    },
    MessageStatus(StatusUpdate),
    MessageReaction(ReactionUpdate),
    ResetUnreadCount {
        chat_id: String,
    },
    ContactCreated {
        contact_id: String,
    },
    ContactCreateError {
        message: String,
    },
    SendMessageError {
        message: String,
    },
    TeamMemberLogout {
        accounts: Vec<String>,
    },
    ChatUpdatedOnContactUpdate {
        contact_ids: Vec<String>,
    },
    TemplateStatusUpdate {
        template_id: String,
        status: String,
    },
}

/// Local user intents fed into the engine.
#[cfg_attr(not(test), allow(dead_code))]
#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    SendMessage {
        chat_id: String,
        body: String,
    },
    SendTemplate {
        chat_id: String,
        template: serde_json::Value,
    },
    ResetUnread {
        chat_id: String,
    },
    OpenChat {
        chat_id: Option<String>,
    },
    SetForeground {
        foreground: bool,
    },
}

/// How much of the chat list to re-fetch after a connection transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// First connection of the process lifetime: cache-first full load.
    Full,
    /// Reconnection: downtime decides the backfill tier. `None` means the
    /// disconnect time is unknown and the widest tier applies.
    AfterDowntime { downtime_ms: Option<i64> },
}

/// The single tagged union every producer (session reader, scheduler, user
/// actions, reachability hooks) pushes into the engine channel.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Ask the connection manager to (re)connect.
    Connect,
    Transport(TransportEvent),
    Inbound(InboundEvent),
    Action(UserAction),
    RefreshChats(RefreshMode),
    ProcessQueue,
    /// Network reachability changed; produced by platform hooks.
    #[cfg_attr(not(test), allow(dead_code))]
    Reachability { online: bool },
}

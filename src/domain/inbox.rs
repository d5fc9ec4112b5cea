use std::collections::HashMap;

use super::{chat::Chat, message::Message};

/// The in-memory inbox model. All mutation happens on the single engine
/// context, so plain ownership is enough.
#[derive(Debug, Default)]
pub struct InboxState {
    chats: Vec<Chat>,
    conversations: HashMap<String, Vec<Message>>,
    active_chat: Option<String>,
    foreground: bool,
    badge_count: u32,
    chats_stale: bool,
}

impl InboxState {
    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn chat(&self, chat_id: &str) -> Option<&Chat> {
        self.chats.iter().find(|chat| chat.id == chat_id)
    }

    pub fn chat_mut(&mut self, chat_id: &str) -> Option<&mut Chat> {
        self.chats.iter_mut().find(|chat| chat.id == chat_id)
    }

    /// Mutable view for in-place reordering. The slice cannot grow, so the
    /// unique-id invariant survives.
    pub fn chats_mut(&mut self) -> &mut [Chat] {
        &mut self.chats
    }

    /// Replaces the working chat list wholesale. Callers are expected to
    /// hand over an already deduplicated, sorted list.
    pub fn set_chats(&mut self, chats: Vec<Chat>) {
        self.chats = chats;
    }

    /// Inserts or replaces a chat by identifier. At most one entry per id
    /// ever exists in the list.
    pub fn upsert_chat(&mut self, chat: Chat) {
        match self.chats.iter_mut().find(|existing| existing.id == chat.id) {
            Some(existing) => *existing = chat,
            None => self.chats.push(chat),
        }
    }

    pub fn conversation(&self, chat_id: &str) -> &[Message] {
        self.conversations
            .get(chat_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn conversation_mut(&mut self, chat_id: &str) -> &mut Vec<Message> {
        self.conversations.entry(chat_id.to_owned()).or_default()
    }

    pub fn set_conversation(&mut self, chat_id: &str, messages: Vec<Message>) {
        self.conversations.insert(chat_id.to_owned(), messages);
    }

    pub fn open_chat(&mut self, chat_id: Option<String>) {
        self.active_chat = chat_id;
    }

    pub fn active_chat(&self) -> Option<&str> {
        self.active_chat.as_deref()
    }

    pub fn set_foreground(&mut self, foreground: bool) {
        self.foreground = foreground;
    }

    pub fn is_foreground(&self) -> bool {
        self.foreground
    }

    /// True when an inbound message in `chat_id` should raise a notification:
    /// the app is backgrounded or the chat is not the open one.
    pub fn should_notify(&self, chat_id: &str) -> bool {
        !self.foreground || self.active_chat.as_deref() != Some(chat_id)
    }

    pub fn increment_badge(&mut self) -> u32 {
        self.badge_count = self.badge_count.saturating_add(1);
        self.badge_count
    }

    pub fn clear_badge(&mut self) {
        self.badge_count = 0;
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn badge_count(&self) -> u32 {
        self.badge_count
    }

    pub fn set_chats_stale(&mut self, stale: bool) {
        self.chats_stale = stale;
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn chats_stale(&self) -> bool {
        self.chats_stale
    }
}

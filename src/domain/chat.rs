use serde::{Deserialize, Serialize};

use super::message::{Message, MessageStatus, MessageType, SenderRole};

/// Workflow state of a chat in the inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChatStatus {
    #[default]
    Open,
    Pending,
    Resolved,
}

impl ChatStatus {
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Pending => "pending",
            Self::Resolved => "resolved",
        }
    }
}

/// The remote participant a chat belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContactRef {
    pub id: String,
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// Denormalized summary of a chat's most recent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    pub message_type: MessageType,
    pub body: Option<String>,
    pub status: MessageStatus,
    pub sender: SenderRole,
    pub timestamp: Option<i64>,
}

impl LastMessage {
    pub fn from_message(message: &Message) -> Self {
        Self {
            message_type: message.message_type,
            body: message.body.clone(),
            status: message.status,
            sender: message.sender,
            timestamp: Some(message.timestamp),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub contact: ContactRef,
    pub last_message: Option<LastMessage>,
    /// Unix milliseconds of the newest reconciled message.
    pub last_message_time: Option<i64>,
    pub unread_count: u32,
    pub status: ChatStatus,
    pub assigned_to: Option<String>,
    pub updated_at: Option<i64>,
    pub created_at: Option<i64>,
}

impl Chat {
    pub fn new(id: String, contact: ContactRef) -> Self {
        Self {
            id,
            contact,
            last_message: None,
            last_message_time: None,
            unread_count: 0,
            status: ChatStatus::Open,
            assigned_to: None,
            updated_at: None,
            created_at: None,
        }
    }

    /// Folds a reconciled message into the denormalized summary.
    /// `last_message_time` only ever moves forward.
    pub fn apply_message_summary(&mut self, message: &Message) {
        let newer = self
            .last_message_time
            .map(|current| message.timestamp >= current)
            .unwrap_or(true);

        if newer {
            self.last_message = Some(LastMessage::from_message(message));
            self.last_message_time = Some(message.timestamp);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incoming(timestamp: i64, body: &str) -> Message {
        Message {
            id: Some(format!("srv-{timestamp}")),
            temp_id: None,
            wamid: Some(format!("wamid-{timestamp}")),
            message_type: MessageType::Text,
            body: Some(body.to_owned()),
            timestamp,
            status: MessageStatus::Delivered,
            is_optimistic: false,
            sender: SenderRole::Contact,
            reactions: Vec::new(),
            reaction: None,
            sent_at: None,
            delivered_at: None,
            read_at: None,
        }
    }

    #[test]
    fn newer_message_updates_summary_and_timestamp() {
        let mut chat = Chat::new("chat-1".to_owned(), ContactRef::default());

        chat.apply_message_summary(&incoming(2_000, "newer"));

        assert_eq!(chat.last_message_time, Some(2_000));
        assert_eq!(
            chat.last_message.as_ref().and_then(|m| m.body.as_deref()),
            Some("newer")
        );
    }

    #[test]
    fn older_message_never_rewinds_summary() {
        let mut chat = Chat::new("chat-1".to_owned(), ContactRef::default());
        chat.apply_message_summary(&incoming(2_000, "current"));

        chat.apply_message_summary(&incoming(1_000, "stale"));

        assert_eq!(chat.last_message_time, Some(2_000));
        assert_eq!(
            chat.last_message.as_ref().and_then(|m| m.body.as_deref()),
            Some("current")
        );
    }

    #[test]
    fn equal_timestamp_takes_the_later_arrival() {
        let mut chat = Chat::new("chat-1".to_owned(), ContactRef::default());
        chat.apply_message_summary(&incoming(2_000, "first"));

        chat.apply_message_summary(&incoming(2_000, "second"));

        assert_eq!(
            chat.last_message.as_ref().and_then(|m| m.body.as_deref()),
            Some("second")
        );
    }
}

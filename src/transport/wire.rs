//! Wire-payload normalization. Server frames arrive as loosely shaped JSON
//! with more than one spelling for the same concept; everything is folded
//! into the canonical domain types here, once, so matching logic never sees
//! a duck-typed payload.

use serde::{Deserialize, Serialize};

use crate::domain::{
    chat::{Chat, ChatStatus, ContactRef, LastMessage},
    events::{BulkChatUpdate, InboundEvent, ReactionUpdate, StatusUpdate},
    message::{Message, MessageStatus, MessageType, SenderRole},
};

/// A timestamp as servers actually send it: unix milliseconds or RFC 3339.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TimestampValue {
    Millis(i64),
    Text(String),
}

impl TimestampValue {
    pub fn to_unix_ms(&self) -> Option<i64> {
        match self {
            Self::Millis(ms) => Some(*ms),
            Self::Text(text) => chrono::DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|at| at.timestamp_millis()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContact {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    #[serde(default, alias = "displayName")]
    pub name: Option<String>,
    #[serde(default, alias = "phoneNumber")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub temp_id: Option<String>,
    #[serde(default)]
    pub wamid: Option<String>,
    #[serde(default, rename = "type")]
    pub message_type: Option<String>,
    #[serde(default, alias = "text", alias = "caption")]
    pub body: Option<String>,
    #[serde(default)]
    pub timestamp: Option<TimestampValue>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "fromMe")]
    pub from_me: Option<bool>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub reaction: Option<String>,
    #[serde(default)]
    pub sent_at: Option<TimestampValue>,
    #[serde(default)]
    pub delivered_at: Option<TimestampValue>,
    #[serde(default)]
    pub read_at: Option<TimestampValue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChat {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub contact: Option<RawContact>,
    #[serde(default)]
    pub contact_id: Option<String>,
    /// The message that triggered a `newMessage` push.
    #[serde(default)]
    pub message: Option<RawMessage>,
    /// Catch-up batches carry several messages per chat.
    #[serde(default)]
    pub messages: Option<Vec<RawMessage>>,
    #[serde(default)]
    pub last_message: Option<RawMessage>,
    #[serde(default, alias = "lastMessageText")]
    pub last_message_body: Option<String>,
    #[serde(default)]
    pub last_message_type: Option<String>,
    #[serde(default)]
    pub last_message_status: Option<String>,
    #[serde(default)]
    pub last_message_sender: Option<String>,
    #[serde(default)]
    pub last_message_time: Option<TimestampValue>,
    #[serde(default)]
    pub unread_count: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub updated_at: Option<TimestampValue>,
    #[serde(default)]
    pub created_at: Option<TimestampValue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStatusUpdate {
    pub chat_id: String,
    #[serde(default, alias = "messageTransportId")]
    pub wamid: Option<String>,
    #[serde(default)]
    pub temp_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub sent_at: Option<TimestampValue>,
    #[serde(default)]
    pub delivered_at: Option<TimestampValue>,
    #[serde(default)]
    pub read_at: Option<TimestampValue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReactionUpdate {
    pub chat_id: String,
    #[serde(alias = "messageTransportId")]
    pub wamid: String,
    pub sender: String,
    #[serde(default, alias = "emoji")]
    pub reaction: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTemplate {
    #[serde(alias = "_id")]
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data")]
enum WireEvent {
    #[serde(rename = "newMessage")]
    NewMessage { chat: RawChat },
    #[serde(rename = "newMessagesBulk")]
    NewMessagesBulk { chats: Vec<RawChat> },
    #[serde(rename = "messageStatus")]
    MessageStatus(RawStatusUpdate),
    #[serde(rename = "messageReaction")]
    MessageReaction(RawReactionUpdate),
    #[serde(rename = "resetUnreadCount")]
    ResetUnreadCount {
        #[serde(alias = "chatId")]
        chat_id: String,
    },
    #[serde(rename = "contactCreated")]
    ContactCreated {
        #[serde(alias = "_id")]
        id: String,
    },
    #[serde(rename = "contactCreateError")]
    ContactCreateError { message: String },
    #[serde(rename = "sendMessageError")]
    SendMessageError { message: String },
    #[serde(rename = "teamMemberLogout")]
    TeamMemberLogout { accounts: Vec<String> },
    #[serde(rename = "chatUpdatedOnContactUpdate")]
    ChatUpdatedOnContactUpdate {
        #[serde(alias = "contactIds")]
        contact_ids: Vec<String>,
    },
    #[serde(rename = "templateStatusUpdate")]
    TemplateStatusUpdate { template: RawTemplate },
}

#[derive(Debug)]
pub enum WireError {
    Malformed(serde_json::Error),
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(source) => write!(f, "malformed wire frame: {source}"),
        }
    }
}

impl std::error::Error for WireError {}

/// Decodes one inbound frame into the canonical event union.
pub fn decode_event(text: &str) -> Result<InboundEvent, WireError> {
    let wire: WireEvent = serde_json::from_str(text).map_err(WireError::Malformed)?;

    Ok(match wire {
        WireEvent::NewMessage { chat } => {
            let normalized = normalize_chat(chat);
            match newest_message(&normalized) {
                Some(message) => InboundEvent::NewMessage {
                    chat: Box::new(normalized.chat),
                    message: Box::new(message),
                },
                // Chat-only push: fold it in as a bulk update without
                // messages so the summary still lands.
                None => InboundEvent::NewMessagesBulk {
                    updates: vec![BulkChatUpdate {
                        chat: normalized.chat,
                        messages: vec![],
                    }],
                },
            }
        }
        WireEvent::NewMessagesBulk { chats } => InboundEvent::NewMessagesBulk {
            updates: chats
                .into_iter()
                .map(|raw| {
                    let normalized = normalize_chat(raw);
                    BulkChatUpdate {
                        messages: normalized.messages.clone(),
                        chat: normalized.chat,
                    }
                })
                .collect(),
        },
        WireEvent::MessageStatus(raw) => InboundEvent::MessageStatus(StatusUpdate {
            chat_id: raw.chat_id,
            wamid: raw.wamid,
            temp_id: raw.temp_id,
            status: MessageStatus::from_label(&raw.status).unwrap_or(MessageStatus::Sent),
            sent_at: raw.sent_at.as_ref().and_then(TimestampValue::to_unix_ms),
            delivered_at: raw.delivered_at.as_ref().and_then(TimestampValue::to_unix_ms),
            read_at: raw.read_at.as_ref().and_then(TimestampValue::to_unix_ms),
        }),
        WireEvent::MessageReaction(raw) => InboundEvent::MessageReaction(ReactionUpdate {
            chat_id: raw.chat_id,
            wamid: raw.wamid,
            sender: raw.sender,
            emoji: raw.reaction.unwrap_or_default(),
        }),
        WireEvent::ResetUnreadCount { chat_id } => InboundEvent::ResetUnreadCount { chat_id },
        WireEvent::ContactCreated { id } => InboundEvent::ContactCreated { contact_id: id },
        WireEvent::ContactCreateError { message } => InboundEvent::ContactCreateError { message },
        WireEvent::SendMessageError { message } => InboundEvent::SendMessageError { message },
        WireEvent::TeamMemberLogout { accounts } => InboundEvent::TeamMemberLogout { accounts },
        WireEvent::ChatUpdatedOnContactUpdate { contact_ids } => {
            InboundEvent::ChatUpdatedOnContactUpdate { contact_ids }
        }
        WireEvent::TemplateStatusUpdate { template } => InboundEvent::TemplateStatusUpdate {
            template_id: template.id,
            status: template.status,
        },
    })
}

/// Actions this client pushes over the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", content = "payload")]
pub enum OutboundFrame {
    #[serde(rename = "sendMessage")]
    SendMessage(serde_json::Value),
    #[serde(rename = "sendTemplate")]
    SendTemplate(serde_json::Value),
    #[serde(rename = "resetUnreadCount")]
    ResetUnreadCount {
        #[serde(rename = "chatId")]
        chat_id: String,
    },
}

pub fn encode_frame(frame: &OutboundFrame) -> String {
    // Serialization of these shapes cannot fail.
    serde_json::to_string(frame).unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct NormalizedChat {
    pub chat: Chat,
    pub message: Option<Message>,
    pub messages: Vec<Message>,
}

fn newest_message(normalized: &NormalizedChat) -> Option<Message> {
    normalized
        .message
        .clone()
        .or_else(|| normalized.messages.last().cloned())
}

/// Folds one raw chat payload into the canonical shape. The denormalized
/// last-message summary is synthesized from whatever is present, richest
/// shape first: a nested message object, then flat fields, then nothing.
pub fn normalize_chat(raw: RawChat) -> NormalizedChat {
    let contact = normalize_contact(raw.contact, raw.contact_id, &raw.id);
    let message = raw.message.map(normalize_message);
    let messages: Vec<Message> = raw
        .messages
        .unwrap_or_default()
        .into_iter()
        .map(normalize_message)
        .collect();

    let nested_summary = raw.last_message.map(normalize_message);
    let last_message = match &nested_summary {
        Some(nested) => Some(LastMessage::from_message(nested)),
        None => synthesize_last_message(
            raw.last_message_type.as_deref(),
            raw.last_message_body.clone(),
            raw.last_message_status.as_deref(),
            raw.last_message_sender.as_deref(),
            raw.last_message_time.as_ref().and_then(TimestampValue::to_unix_ms),
        ),
    };

    let last_message_time = raw
        .last_message_time
        .as_ref()
        .and_then(TimestampValue::to_unix_ms)
        .or_else(|| last_message.as_ref().and_then(|summary| summary.timestamp))
        .or_else(|| message.as_ref().map(|m| m.timestamp));

    let chat = Chat {
        id: raw.id,
        contact,
        last_message,
        last_message_time,
        unread_count: raw.unread_count.unwrap_or(0),
        status: parse_chat_status(raw.status.as_deref()),
        assigned_to: raw.assigned_to,
        updated_at: raw.updated_at.as_ref().and_then(TimestampValue::to_unix_ms),
        created_at: raw.created_at.as_ref().and_then(TimestampValue::to_unix_ms),
    };

    NormalizedChat {
        chat,
        message,
        messages,
    }
}

pub fn normalize_message(raw: RawMessage) -> Message {
    let sender = parse_sender(raw.from_me, raw.sender.as_deref());
    let status = raw
        .status
        .as_deref()
        .and_then(MessageStatus::from_label)
        .unwrap_or(match sender {
            SenderRole::Agent => MessageStatus::Sent,
            SenderRole::Contact => MessageStatus::Delivered,
        });

    Message {
        id: raw.id,
        temp_id: raw.temp_id,
        wamid: raw.wamid,
        message_type: raw
            .message_type
            .as_deref()
            .map(MessageType::from_label)
            .unwrap_or_default(),
        body: raw.body,
        timestamp: raw
            .timestamp
            .as_ref()
            .and_then(TimestampValue::to_unix_ms)
            .unwrap_or(0),
        status,
        is_optimistic: false,
        sender,
        reactions: Vec::new(),
        reaction: raw.reaction,
        sent_at: raw.sent_at.as_ref().and_then(TimestampValue::to_unix_ms),
        delivered_at: raw.delivered_at.as_ref().and_then(TimestampValue::to_unix_ms),
        read_at: raw.read_at.as_ref().and_then(TimestampValue::to_unix_ms),
    }
}

fn normalize_contact(
    contact: Option<RawContact>,
    contact_id: Option<String>,
    chat_id: &str,
) -> ContactRef {
    let raw = contact.unwrap_or_default();
    ContactRef {
        id: raw
            .id
            .or(contact_id)
            .unwrap_or_else(|| chat_id.to_owned()),
        name: raw.name,
        phone: raw.phone,
    }
}

fn synthesize_last_message(
    message_type: Option<&str>,
    body: Option<String>,
    status: Option<&str>,
    sender: Option<&str>,
    timestamp: Option<i64>,
) -> Option<LastMessage> {
    if message_type.is_none() && body.is_none() && status.is_none() && timestamp.is_none() {
        return None;
    }

    let sender = parse_sender(None, sender);
    Some(LastMessage {
        message_type: message_type
            .map(MessageType::from_label)
            .unwrap_or(if body.is_some() {
                MessageType::Text
            } else {
                MessageType::Unknown
            }),
        body,
        status: status
            .and_then(MessageStatus::from_label)
            .unwrap_or(MessageStatus::Delivered),
        sender,
        timestamp,
    })
}

fn parse_sender(from_me: Option<bool>, sender: Option<&str>) -> SenderRole {
    if let Some(from_me) = from_me {
        return if from_me {
            SenderRole::Agent
        } else {
            SenderRole::Contact
        };
    }

    match sender {
        Some("agent") | Some("me") | Some("operator") => SenderRole::Agent,
        _ => SenderRole::Contact,
    }
}

fn parse_chat_status(status: Option<&str>) -> ChatStatus {
    match status {
        Some("pending") => ChatStatus::Pending,
        Some("resolved") | Some("closed") => ChatStatus::Resolved,
        _ => ChatStatus::Open,
    }
}

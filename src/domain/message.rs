use serde::{Deserialize, Serialize};

/// Prefix of client-generated placeholder identifiers. An optimistic message
/// carries one of these as its `id` until the server copy replaces it.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Delivery lifecycle of a message as seen by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    /// Created locally, submission outcome not yet known.
    Pending,
    /// Captured in the offline send queue, waiting for connectivity.
    Queued,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
            Self::Failed => "failed",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "pending" => Some(Self::Pending),
            "queued" => Some(Self::Queued),
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "read" => Some(Self::Read),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Position in the forward delivery progression. Receipts can arrive out
    /// of order; a lower-ranked update never demotes a higher-ranked status.
    pub fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Queued => 1,
            Self::Sent => 2,
            Self::Delivered => 3,
            Self::Read => 4,
            Self::Failed => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    Location,
    Template,
    Unknown,
}

impl MessageType {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Sticker => "sticker",
            Self::Location => "location",
            Self::Template => "template",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label {
            "text" => Self::Text,
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            "document" => Self::Document,
            "sticker" => Self::Sticker,
            "location" => Self::Location,
            "template" => Self::Template,
            _ => Self::Unknown,
        }
    }
}

/// Who authored a message relative to this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SenderRole {
    /// The local operator of this inbox.
    Agent,
    /// The remote chat participant.
    #[default]
    Contact,
}

/// One sender's reaction to a message. A sender holds at most one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionRecord {
    pub sender: String,
    pub emoji: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned identifier. Optimistic entries carry a client
    /// placeholder (`temp-` prefixed) until replaced.
    pub id: Option<String>,
    /// Client-generated identifier, present only for locally originated
    /// messages.
    pub temp_id: Option<String>,
    /// Provider-assigned transport identifier, authoritative once present.
    pub wamid: Option<String>,
    pub message_type: MessageType,
    pub body: Option<String>,
    /// Unix milliseconds.
    pub timestamp: i64,
    pub status: MessageStatus,
    pub is_optimistic: bool,
    pub sender: SenderRole,
    /// Per-sender reaction records.
    pub reactions: Vec<ReactionRecord>,
    /// Singular current-reaction field kept for consumers that render a
    /// single emoji; refreshed on every reaction change.
    pub reaction: Option<String>,
    pub sent_at: Option<i64>,
    pub delivered_at: Option<i64>,
    pub read_at: Option<i64>,
}

impl Message {
    /// Builds the local placeholder shown before server confirmation.
    pub fn optimistic(temp_id: String, message_type: MessageType, body: String, now_ms: i64) -> Self {
        Self {
            id: Some(temp_id.clone()),
            temp_id: Some(temp_id),
            wamid: None,
            message_type,
            body: Some(body),
            timestamp: now_ms,
            status: MessageStatus::Pending,
            is_optimistic: true,
            sender: SenderRole::Agent,
            reactions: Vec::new(),
            reaction: None,
            sent_at: None,
            delivered_at: None,
            read_at: None,
        }
    }

    /// True when `id` is a client-generated placeholder rather than a
    /// server-assigned identifier.
    pub fn has_placeholder_id(&self) -> bool {
        self.id
            .as_deref()
            .is_some_and(|id| id.starts_with(TEMP_ID_PREFIX))
    }

    /// Applies one sender's reaction. An empty emoji removes that sender's
    /// record. The singular display field always reflects the latest state.
    ///
    /// Returns true when anything changed.
    pub fn set_reaction(&mut self, sender: &str, emoji: &str) -> bool {
        let had_same = self
            .reactions
            .iter()
            .any(|record| record.sender == sender && record.emoji == emoji);
        if had_same {
            return false;
        }

        let before_len = self.reactions.len();
        self.reactions.retain(|record| record.sender != sender);
        let removed = self.reactions.len() != before_len;
        if !emoji.is_empty() {
            self.reactions.push(ReactionRecord {
                sender: sender.to_owned(),
                emoji: emoji.to_owned(),
            });
        }

        self.reaction = self.reactions.last().map(|record| record.emoji.clone());
        removed || !emoji.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg() -> Message {
        Message::optimistic("temp-1".to_owned(), MessageType::Text, "hi".to_owned(), 1_000)
    }

    #[test]
    fn optimistic_message_carries_placeholder_id_and_pending_status() {
        let message = msg();

        assert!(message.has_placeholder_id());
        assert_eq!(message.temp_id.as_deref(), Some("temp-1"));
        assert_eq!(message.status, MessageStatus::Pending);
        assert!(message.is_optimistic);
        assert_eq!(message.sender, SenderRole::Agent);
    }

    #[test]
    fn server_assigned_id_is_not_a_placeholder() {
        let mut message = msg();
        message.id = Some("64fe01ab".to_owned());

        assert!(!message.has_placeholder_id());
    }

    #[test]
    fn status_rank_is_monotonic_along_the_delivery_path() {
        assert!(MessageStatus::Sent.rank() < MessageStatus::Delivered.rank());
        assert!(MessageStatus::Delivered.rank() < MessageStatus::Read.rank());
        assert!(MessageStatus::Pending.rank() < MessageStatus::Queued.rank());
    }

    #[test]
    fn set_reaction_adds_record_and_refreshes_display_field() {
        let mut message = msg();

        let changed = message.set_reaction("contact-1", "👍");

        assert!(changed);
        assert_eq!(message.reactions.len(), 1);
        assert_eq!(message.reaction.as_deref(), Some("👍"));
    }

    #[test]
    fn set_reaction_replaces_previous_record_for_same_sender() {
        let mut message = msg();
        message.set_reaction("contact-1", "👍");

        message.set_reaction("contact-1", "❤️");

        assert_eq!(message.reactions.len(), 1);
        assert_eq!(message.reactions[0].emoji, "❤️");
        assert_eq!(message.reaction.as_deref(), Some("❤️"));
    }

    #[test]
    fn empty_emoji_removes_the_sender_record() {
        let mut message = msg();
        message.set_reaction("contact-1", "👍");

        let changed = message.set_reaction("contact-1", "");

        assert!(changed);
        assert!(message.reactions.is_empty());
        assert_eq!(message.reaction, None);
    }

    #[test]
    fn repeated_identical_reaction_reports_no_change() {
        let mut message = msg();
        message.set_reaction("contact-1", "👍");

        let changed = message.set_reaction("contact-1", "👍");

        assert!(!changed);
        assert_eq!(message.reactions.len(), 1);
    }

    #[test]
    fn reactions_from_multiple_senders_coexist() {
        let mut message = msg();
        message.set_reaction("contact-1", "👍");
        message.set_reaction("contact-2", "😂");

        assert_eq!(message.reactions.len(), 2);
        assert_eq!(message.reaction.as_deref(), Some("😂"));
    }

    #[test]
    fn from_label_round_trips_known_types() {
        for kind in [
            MessageType::Text,
            MessageType::Image,
            MessageType::Video,
            MessageType::Audio,
            MessageType::Document,
            MessageType::Sticker,
            MessageType::Location,
            MessageType::Template,
        ] {
            assert_eq!(MessageType::from_label(kind.as_label()), kind);
        }
    }

    #[test]
    fn from_label_maps_unrecognized_type_to_unknown() {
        assert_eq!(MessageType::from_label("contacts"), MessageType::Unknown);
    }
}

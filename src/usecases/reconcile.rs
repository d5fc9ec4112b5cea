//! Folds inbound server events into a chat's message collection so that
//! every server-side message appears exactly once, optimistic placeholders
//! are replaced rather than duplicated, and chronological order survives
//! out-of-order delivery.

use crate::domain::{
    events::{ReactionUpdate, StatusUpdate},
    message::{Message, MessageStatus, MessageType, SenderRole},
};

/// Window for pairing an optimistic message with its server-confirmed
/// counterpart by content. Generous on purpose: queued offline sends can be
/// confirmed long after their optimistic timestamp. Known approximation: an
/// unrelated message of identical type and body inside this window can be
/// paired instead; no stronger identifier exists for queued sends.
pub const CONTENT_MATCH_WINDOW_MS: i64 = 10 * 60 * 1_000;

/// What `reconcile_message` did with the incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// An optimistic entry with the same temp id was replaced.
    ReplacedByTempId,
    /// An optimistic entry was paired by type, body, and time window.
    ReplacedByContent,
    /// The message was already present; changed reaction data was merged.
    MergedReaction,
    /// The message was already present; nothing changed.
    AlreadyPresent,
    /// A genuinely new message was appended.
    Appended,
}

impl ReconcileOutcome {
    /// Whether the incoming event added information that was not yet in the
    /// collection.
    pub fn is_new_content(self) -> bool {
        matches!(self, Self::Appended)
    }
}

/// Applies the matching cascade for one incoming message.
pub fn reconcile_message(messages: &mut Vec<Message>, incoming: Message) -> ReconcileOutcome {
    if let Some(index) = match_by_temp_id(messages, &incoming) {
        replace_entry(messages, index, incoming);
        return ReconcileOutcome::ReplacedByTempId;
    }

    if let Some(index) = match_outgoing_by_content(messages, &incoming) {
        replace_entry(messages, index, incoming);
        return ReconcileOutcome::ReplacedByContent;
    }

    if let Some(index) = match_by_identity(messages, &incoming) {
        let entry = &mut messages[index];
        let mut merged = false;
        if incoming.reaction != entry.reaction {
            entry.reaction = incoming.reaction.clone();
            merged = true;
        }
        if !incoming.reactions.is_empty() && incoming.reactions != entry.reactions {
            entry.reactions = incoming.reactions.clone();
            merged = true;
        }
        return if merged {
            ReconcileOutcome::MergedReaction
        } else {
            ReconcileOutcome::AlreadyPresent
        };
    }

    messages.push(incoming);
    sort_messages(messages);
    ReconcileOutcome::Appended
}

/// Applies a delivery receipt in place. Target lookup order: transport id,
/// then temp id, then the single-pending-optimistic fallback. With no match
/// nothing is mutated; a status update never creates an entry.
pub fn apply_status_update(messages: &mut [Message], update: &StatusUpdate) -> bool {
    let index = match locate_status_target(messages, update) {
        Some(index) => index,
        None => return false,
    };

    if let Some(wamid) = &update.wamid {
        let already_held = messages
            .iter()
            .enumerate()
            .any(|(i, m)| i != index && m.wamid.as_deref() == Some(wamid));
        let entry = &mut messages[index];
        if entry.wamid.is_none() && !already_held {
            entry.wamid = Some(wamid.clone());
        }
    }

    let entry = &mut messages[index];
    if update.status == MessageStatus::Failed || update.status.rank() > entry.status.rank() {
        entry.status = update.status;
    }
    entry.sent_at = update.sent_at.or(entry.sent_at);
    entry.delivered_at = update.delivered_at.or(entry.delivered_at);
    entry.read_at = update.read_at.or(entry.read_at);
    true
}

/// Applies one sender's reaction change. With no transport-id match nothing
/// is mutated.
pub fn apply_reaction_update(messages: &mut [Message], update: &ReactionUpdate) -> bool {
    let Some(entry) = messages
        .iter_mut()
        .find(|message| message.wamid.as_deref() == Some(update.wamid.as_str()))
    else {
        return false;
    };

    entry.set_reaction(&update.sender, &update.emoji);
    true
}

/// Reconciles a freshly fetched conversation into the cached one. Locally
/// originated entries the server does not know yet survive the merge.
pub fn merge_conversation(existing: &mut Vec<Message>, fetched: Vec<Message>) {
    for message in fetched {
        reconcile_message(existing, message);
    }
    sort_messages(existing);
}

/// Timestamp-ascending order, message id as the tie-break for stability.
pub fn sort_messages(messages: &mut [Message]) {
    messages.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn match_by_temp_id(messages: &[Message], incoming: &Message) -> Option<usize> {
    let temp_id = incoming.temp_id.as_deref()?;
    messages
        .iter()
        .position(|m| m.is_optimistic && m.temp_id.as_deref() == Some(temp_id))
}

fn match_outgoing_by_content(messages: &[Message], incoming: &Message) -> Option<usize> {
    let any_pending_optimistic = messages
        .iter()
        .any(|m| m.is_optimistic && matches!(m.status, MessageStatus::Pending | MessageStatus::Queued));
    let attributable = incoming.sender == SenderRole::Agent
        || (incoming.wamid.is_some() && any_pending_optimistic);
    if !attributable {
        return None;
    }

    messages.iter().position(|m| {
        m.is_optimistic
            && m.message_type == incoming.message_type
            && (m.message_type != MessageType::Text || m.body == incoming.body)
            && (m.timestamp - incoming.timestamp).abs() <= CONTENT_MATCH_WINDOW_MS
    })
}

fn match_by_identity(messages: &[Message], incoming: &Message) -> Option<usize> {
    messages.iter().position(|m| {
        let same_wamid = match (&m.wamid, &incoming.wamid) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
        let same_id = !incoming.has_placeholder_id()
            && !m.has_placeholder_id()
            && matches!((&m.id, &incoming.id), (Some(a), Some(b)) if a == b);
        same_wamid || same_id
    })
}

fn replace_entry(messages: &mut Vec<Message>, index: usize, mut incoming: Message) {
    incoming.is_optimistic = false;
    if incoming.temp_id.is_none() {
        incoming.temp_id = messages[index].temp_id.take();
    }
    messages[index] = incoming;
    sort_messages(messages);
}

fn locate_status_target(messages: &[Message], update: &StatusUpdate) -> Option<usize> {
    if let Some(wamid) = &update.wamid {
        if let Some(index) = messages
            .iter()
            .position(|m| m.wamid.as_deref() == Some(wamid.as_str()))
        {
            return Some(index);
        }
    }

    if let Some(temp_id) = &update.temp_id {
        if let Some(index) = messages
            .iter()
            .position(|m| m.temp_id.as_deref() == Some(temp_id.as_str()))
        {
            return Some(index);
        }
    }

    // Elimination is only safe when exactly one candidate exists.
    let mut candidates = messages.iter().enumerate().filter(|(_, m)| {
        m.is_optimistic && matches!(m.status, MessageStatus::Pending | MessageStatus::Queued)
    });
    let first = candidates.next();
    match (first, candidates.next()) {
        (Some((index, _)), None) => Some(index),
        _ => None,
    }
}

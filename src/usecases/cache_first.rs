//! Cache-first loading: hand back locally persisted data immediately, then
//! converge on server truth in the background. A failed refresh leaves the
//! cached snapshot (and its stale flag) untouched.

use crate::{
    domain::{chat::Chat, message::Message},
    usecases::{
        backfill::{run_backfill, BackfillError, BackfillPlan, BackfillTier},
        contracts::{CacheStore, ChatDirectory, ConversationScope, ConversationSource, FetchSourceError},
        merge_chats::{merge_chat_list, replace_chat_list},
        reconcile::merge_conversation,
    },
};

/// Immediate snapshot served from the local cache. `stale` stays set until a
/// background refresh succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedChats {
    pub chats: Vec<Chat>,
    pub from_cache: bool,
    pub stale: bool,
}

pub fn load_cached_chats(cache: &dyn CacheStore) -> CachedChats {
    CachedChats {
        chats: cache.cached_chats(),
        from_cache: true,
        stale: true,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedConversation {
    pub messages: Vec<Message>,
    pub from_cache: bool,
    pub stale: bool,
}

pub fn load_cached_conversation(cache: &dyn CacheStore, chat_id: &str) -> CachedConversation {
    CachedConversation {
        messages: cache.cached_conversation(chat_id),
        from_cache: true,
        stale: true,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshedChats {
    pub chats: Vec<Chat>,
    /// True when the fetch was exhaustive and fully replaced the list;
    /// false when it was folded into the existing one.
    pub replaced: bool,
    pub pages_fetched: usize,
}

/// Background phase of the cache-first load: fetch under the backfill plan,
/// then replace (exhaustive tier) or merge (tiered partial refresh).
pub async fn refresh_chat_list(
    directory: &dyn ChatDirectory,
    filter: Option<&str>,
    existing: &[Chat],
    plan: &BackfillPlan,
) -> Result<RefreshedChats, BackfillError> {
    let outcome = run_backfill(directory, filter, plan).await?;
    tracing::debug!(
        pages = outcome.pages_fetched,
        exhausted = outcome.exhausted,
        "directory walk finished"
    );
    let replaced = plan.tier == BackfillTier::Full;
    let chats = if replaced {
        replace_chat_list(outcome.chats)
    } else {
        merge_chat_list(existing, outcome.chats)
    };

    Ok(RefreshedChats {
        chats,
        replaced,
        pages_fetched: outcome.pages_fetched,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    Unauthorized,
    TemporarilyUnavailable,
    DataContractViolation,
}

/// Background phase for one conversation: fetch and reconcile into the
/// cached copy so unconfirmed local sends survive.
pub async fn refresh_conversation(
    source: &dyn ConversationSource,
    chat_id: &str,
    cached: Vec<Message>,
    scope: ConversationScope,
) -> Result<Vec<Message>, ConversationError> {
    let fetched = source
        .fetch_conversation(chat_id, scope)
        .await
        .map_err(map_source_error)?;

    let mut merged = cached;
    merge_conversation(&mut merged, fetched);
    Ok(merged)
}

fn map_source_error(error: FetchSourceError) -> ConversationError {
    match error {
        FetchSourceError::Unauthorized => ConversationError::Unauthorized,
        FetchSourceError::Unavailable => ConversationError::TemporarilyUnavailable,
        FetchSourceError::InvalidData => ConversationError::DataContractViolation,
    }
}

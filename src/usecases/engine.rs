//! The engine loop body: one tagged event union in, deterministic state
//! transitions out. Every producer (session reader, scheduler, user actions,
//! reachability hooks) feeds the same channel, so all mutation of the inbox
//! model is serialized by construction.

use std::{sync::Arc, time::Duration};

use crate::{
    domain::{
        chat::{Chat, ContactRef},
        connection::now_unix_ms,
        events::{
            BulkChatUpdate, EngineEvent, InboundEvent, ReactionUpdate, RefreshMode, StatusUpdate,
            UserAction,
        },
        inbox::InboxState,
        message::{Message, MessageStatus, SenderRole},
    },
    usecases::{
        backfill::plan_backfill,
        cache_first::{load_cached_chats, load_cached_conversation, refresh_chat_list, refresh_conversation},
        contracts::{CacheStore, ChatDirectory, ConversationScope, ConversationSource, Notifier, OutboundGateway},
        merge_chats::sort_chat_list,
        reconcile::{apply_reaction_update, apply_status_update, reconcile_message},
        send_message::{
            dispatch_send, prepare_send, prepare_template_send, DispatchOutcome, PreparedSend,
            SendMessageCommand, SendTemplateCommand,
        },
        sync_queue::SyncQueueProcessor,
    },
};

const CHAT_LIST_REFRESHED: &str = "CHAT_LIST_REFRESHED";
const CHAT_LIST_REFRESH_FAILED: &str = "CHAT_LIST_REFRESH_FAILED";
const CONVERSATION_REFRESH_FAILED: &str = "CONVERSATION_REFRESH_FAILED";
const STATUS_UPDATE_UNMATCHED: &str = "STATUS_UPDATE_UNMATCHED";
const SEND_REJECTED_EMPTY: &str = "SEND_REJECTED_EMPTY";
const SERVER_SIDE_SEND_ERROR: &str = "SERVER_SIDE_SEND_ERROR";

/// Engine knobs lifted out of the application config.
#[derive(Debug, Clone, Copy)]
pub struct EngineTuning {
    pub ack_timeout: Duration,
    pub failed_op_retention_ms: i64,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(5),
            failed_op_retention_ms: 24 * 60 * 60 * 1_000,
        }
    }
}

pub struct SyncEngine {
    inbox: InboxState,
    cache: Box<dyn CacheStore>,
    notifier: Box<dyn Notifier>,
    directory: Arc<dyn ChatDirectory>,
    conversations: Arc<dyn ConversationSource>,
    gateway: Arc<dyn OutboundGateway>,
    queue: SyncQueueProcessor,
    tuning: EngineTuning,
}

impl SyncEngine {
    pub fn new(
        cache: Box<dyn CacheStore>,
        notifier: Box<dyn Notifier>,
        directory: Arc<dyn ChatDirectory>,
        conversations: Arc<dyn ConversationSource>,
        gateway: Arc<dyn OutboundGateway>,
        tuning: EngineTuning,
    ) -> Self {
        Self {
            inbox: InboxState::default(),
            cache,
            notifier,
            directory,
            conversations,
            gateway,
            queue: SyncQueueProcessor::new(),
            tuning,
        }
    }

    pub fn inbox(&self) -> &InboxState {
        &self.inbox
    }

    pub async fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Inbound(inbound) => self.handle_inbound(inbound).await,
            EngineEvent::Action(action) => self.handle_action(action).await,
            EngineEvent::RefreshChats(mode) => self.refresh_chats(mode).await,
            EngineEvent::ProcessQueue => self.run_queue_pass().await,
            EngineEvent::Reachability { online } => {
                if online && self.gateway.is_connected() {
                    self.run_queue_pass().await;
                }
            }
            // Connection lifecycle events belong to the manager; the
            // composition root routes them before they reach the engine.
            EngineEvent::Connect | EngineEvent::Transport(_) => {
                tracing::debug!("connection lifecycle event ignored by engine");
            }
        }
    }

    async fn handle_inbound(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::NewMessage { chat, message } => {
                self.ingest_message(*chat, *message);
            }
            InboundEvent::NewMessagesBulk { updates } => {
                for BulkChatUpdate { chat, messages } in updates {
                    if messages.is_empty() {
                        // Summary-only update: no message to reconcile.
                        self.inbox.upsert_chat(chat);
                        sort_chat_list(self.inbox.chats_mut());
                        continue;
                    }
                    for message in messages {
                        self.ingest_message(chat.clone(), message);
                    }
                }
            }
            InboundEvent::MessageStatus(update) => self.apply_status(update),
            InboundEvent::MessageReaction(update) => self.apply_reaction(update),
            InboundEvent::ResetUnreadCount { chat_id } => {
                if let Some(chat) = self.inbox.chat_mut(&chat_id) {
                    chat.unread_count = 0;
                }
            }
            InboundEvent::ContactCreated { contact_id } => {
                tracing::info!(contact_id = %contact_id, "contact created upstream");
                self.inbox.set_chats_stale(true);
            }
            InboundEvent::ChatUpdatedOnContactUpdate { contact_ids } => {
                tracing::debug!(
                    contacts = contact_ids.len(),
                    "chats touched by contact update, scheduling re-read"
                );
                self.cache.invalidate_chats();
                self.inbox.set_chats_stale(true);
            }
            InboundEvent::ContactCreateError { message } => {
                tracing::warn!(error = %message, "contact creation failed upstream");
            }
            InboundEvent::SendMessageError { message } => {
                // No identifier to pin the failure to; ambiguity policy is
                // no match, no mutation.
                tracing::warn!(code = SERVER_SIDE_SEND_ERROR, error = %message, "send failed upstream");
            }
            InboundEvent::TeamMemberLogout { accounts } => {
                tracing::info!(accounts = accounts.len(), "team member session logout");
            }
            InboundEvent::TemplateStatusUpdate { template_id, status } => {
                tracing::info!(template_id = %template_id, status = %status, "template status changed");
            }
        }
    }

    /// Folds one inbound message into chat-list and conversation state, and
    /// raises the notification side effect for new remote content.
    fn ingest_message(&mut self, chat: Chat, message: Message) {
        let chat_id = chat.id.clone();
        let contact = chat.contact.clone();
        self.inbox.upsert_chat(chat);

        let outcome = reconcile_message(self.inbox.conversation_mut(&chat_id), message.clone());

        if let Some(chat) = self.inbox.chat_mut(&chat_id) {
            chat.apply_message_summary(&message);
        }
        sort_chat_list(self.inbox.chats_mut());

        let remote = message.sender == SenderRole::Contact;
        if remote && outcome.is_new_content() && self.inbox.should_notify(&chat_id) {
            self.notifier.notify_incoming_message(&message, &contact, &chat_id);
            let badge = self.inbox.increment_badge();
            self.notifier.set_badge_count(badge);
        }
    }

    fn apply_status(&mut self, update: StatusUpdate) {
        let chat_id = update.chat_id.clone();
        let applied = apply_status_update(self.inbox.conversation_mut(&chat_id), &update);
        if !applied {
            tracing::debug!(
                code = STATUS_UPDATE_UNMATCHED,
                chat_id = %chat_id,
                status = update.status.as_label(),
                "status update had no unambiguous target"
            );
        }
    }

    fn apply_reaction(&mut self, update: ReactionUpdate) {
        let chat_id = update.chat_id.clone();
        let _ = apply_reaction_update(self.inbox.conversation_mut(&chat_id), &update);
    }

    async fn handle_action(&mut self, action: UserAction) {
        match action {
            UserAction::SendMessage { chat_id, body } => {
                let command = SendMessageCommand { chat_id, body };
                match prepare_send(&command, now_unix_ms()) {
                    Ok(prepared) => self.submit_prepared(prepared).await,
                    Err(_) => {
                        tracing::debug!(code = SEND_REJECTED_EMPTY, "empty message not sent");
                    }
                }
            }
            UserAction::SendTemplate { chat_id, template } => {
                let command = SendTemplateCommand { chat_id, template };
                let prepared = prepare_template_send(&command, now_unix_ms());
                self.submit_prepared(prepared).await;
            }
            UserAction::ResetUnread { chat_id } => {
                if let Some(chat) = self.inbox.chat_mut(&chat_id) {
                    chat.unread_count = 0;
                }
                if let Err(error) = self.gateway.reset_unread_count(&chat_id).await {
                    // Safe to lose: unread counts reconverge on the next
                    // fetch.
                    tracing::debug!(error = ?error, "unread reset not delivered");
                }
            }
            UserAction::OpenChat { chat_id } => {
                self.inbox.open_chat(chat_id.clone());
                if let Some(chat_id) = chat_id {
                    self.load_conversation(&chat_id).await;
                }
            }
            UserAction::SetForeground { foreground } => {
                self.inbox.set_foreground(foreground);
                if foreground {
                    self.inbox.clear_badge();
                    self.notifier.set_badge_count(0);
                    if self.gateway.is_connected() {
                        self.run_queue_pass().await;
                    }
                }
            }
        }
    }

    /// Optimistic entry first, then immediate submission or durable queueing.
    async fn submit_prepared(&mut self, prepared: PreparedSend) {
        let chat_id = prepared.chat_id.clone();
        if self.inbox.chat(&chat_id).is_none() {
            // First outbound message to a chat we have never fetched.
            self.inbox.upsert_chat(Chat::new(
                chat_id.clone(),
                ContactRef {
                    id: chat_id.clone(),
                    name: None,
                    phone: None,
                },
            ));
        }

        reconcile_message(self.inbox.conversation_mut(&chat_id), prepared.message.clone());
        if let Some(chat) = self.inbox.chat_mut(&chat_id) {
            chat.apply_message_summary(&prepared.message);
        }
        sort_chat_list(self.inbox.chats_mut());

        match dispatch_send(self.gateway.as_ref(), &prepared, self.tuning.ack_timeout).await {
            DispatchOutcome::Submitted => {}
            DispatchOutcome::Deferred => {
                let temp_id = prepared.message.temp_id.clone();
                if let Some(message) = self
                    .inbox
                    .conversation_mut(&chat_id)
                    .iter_mut()
                    .find(|m| m.temp_id == temp_id)
                {
                    message.status = MessageStatus::Queued;
                }
                self.cache.enqueue_operation(prepared.operation);
            }
        }
    }

    async fn refresh_chats(&mut self, mode: RefreshMode) {
        let plan = match mode {
            RefreshMode::Full => {
                if self.inbox.chats().is_empty() {
                    let snapshot = load_cached_chats(self.cache.as_ref());
                    tracing::debug!(
                        from_cache = snapshot.from_cache,
                        chats = snapshot.chats.len(),
                        "serving cached chat list while the fetch runs"
                    );
                    self.inbox.set_chats(snapshot.chats);
                    self.inbox.set_chats_stale(snapshot.stale);
                }
                plan_backfill(None)
            }
            RefreshMode::AfterDowntime { downtime_ms } => plan_backfill(downtime_ms),
        };

        match refresh_chat_list(self.directory.as_ref(), None, self.inbox.chats(), &plan).await {
            Ok(refreshed) => {
                tracing::info!(
                    code = CHAT_LIST_REFRESHED,
                    tier = plan.tier.as_label(),
                    pages = refreshed.pages_fetched,
                    replaced = refreshed.replaced,
                    chats = refreshed.chats.len(),
                    "chat list converged on server data"
                );
                self.inbox.set_chats(refreshed.chats);
                self.inbox.set_chats_stale(false);
            }
            Err(error) => {
                // Cached data stays on screen; only the stale flag lingers.
                tracing::warn!(
                    code = CHAT_LIST_REFRESH_FAILED,
                    error = ?error,
                    tier = plan.tier.as_label(),
                    "chat list refresh failed, keeping cached data"
                );
            }
        }
    }

    async fn load_conversation(&mut self, chat_id: &str) {
        if self.inbox.conversation(chat_id).is_empty() {
            let snapshot = load_cached_conversation(self.cache.as_ref(), chat_id);
            tracing::debug!(
                chat_id = %chat_id,
                from_cache = snapshot.from_cache,
                stale = snapshot.stale,
                messages = snapshot.messages.len(),
                "serving cached conversation while the fetch runs"
            );
            self.inbox.set_conversation(chat_id, snapshot.messages);
        }

        let cached = self.inbox.conversation(chat_id).to_vec();
        match refresh_conversation(
            self.conversations.as_ref(),
            chat_id,
            cached,
            ConversationScope::All,
        )
        .await
        {
            Ok(merged) => self.inbox.set_conversation(chat_id, merged),
            Err(error) => {
                tracing::warn!(
                    code = CONVERSATION_REFRESH_FAILED,
                    chat_id = %chat_id,
                    error = ?error,
                    "conversation refresh failed, keeping cached messages"
                );
            }
        }
    }

    async fn run_queue_pass(&mut self) {
        let summary = self
            .queue
            .process(
                self.gateway.as_ref(),
                self.cache.as_mut(),
                &mut self.inbox,
                self.tuning.ack_timeout,
                self.tuning.failed_op_retention_ms,
                now_unix_ms(),
            )
            .await;
        if summary.ran {
            tracing::debug!(
                submitted = summary.submitted,
                failed = summary.failed,
                "queue replay pass ran"
            );
        }
    }
}

//! Reconnection backfill: decide how much chat history to re-fetch after a
//! connection gap, then execute the paged fetch.
//!
//! Short gaps re-fetch only the most recent pages; long or unknown gaps walk
//! the directory exhaustively up to a safety bound.

use crate::{
    domain::chat::Chat,
    usecases::contracts::{ChatDirectory, FetchSourceError},
};

const RECENT_DOWNTIME_CEILING_MS: i64 = 5 * 60 * 1_000;
const MEDIUM_DOWNTIME_CEILING_MS: i64 = 30 * 60 * 1_000;

const RECENT_PAGE_CAP: usize = 2;
const MEDIUM_PAGE_CAP: usize = 5;
/// Safety bound against runaway pagination, not a semantic limit.
const FULL_PAGE_CAP: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillTier {
    Recent,
    Medium,
    Full,
}

impl BackfillTier {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Recent => "recent",
            Self::Medium => "medium",
            Self::Full => "full",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillPlan {
    pub tier: BackfillTier,
    pub page_cap: usize,
}

/// Picks the backfill tier for the elapsed downtime. `None` means the gap is
/// unknown (first connection, missing disconnect timestamp) and gets the
/// widest tier.
pub fn plan_backfill(downtime_ms: Option<i64>) -> BackfillPlan {
    match downtime_ms {
        Some(elapsed) if elapsed < RECENT_DOWNTIME_CEILING_MS => BackfillPlan {
            tier: BackfillTier::Recent,
            page_cap: RECENT_PAGE_CAP,
        },
        Some(elapsed) if elapsed < MEDIUM_DOWNTIME_CEILING_MS => BackfillPlan {
            tier: BackfillTier::Medium,
            page_cap: MEDIUM_PAGE_CAP,
        },
        _ => BackfillPlan {
            tier: BackfillTier::Full,
            page_cap: FULL_PAGE_CAP,
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackfillOutcome {
    pub chats: Vec<Chat>,
    pub pages_fetched: usize,
    /// True when the server signaled no more data before the page cap.
    pub exhausted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackfillError {
    Unauthorized,
    TemporarilyUnavailable,
    DataContractViolation,
}

/// Walks the paginated directory under the plan's page cap, carrying the
/// oldest-seen update timestamp as the cursor. Stops early on an empty page
/// or when the server signals no more data.
pub async fn run_backfill(
    directory: &dyn ChatDirectory,
    filter: Option<&str>,
    plan: &BackfillPlan,
) -> Result<BackfillOutcome, BackfillError> {
    let mut chats = Vec::new();
    let mut cursor: Option<i64> = None;
    let mut pages_fetched = 0;
    let mut exhausted = false;

    while pages_fetched < plan.page_cap {
        let page = directory
            .list_chats(filter, cursor)
            .await
            .map_err(map_source_error)?;
        pages_fetched += 1;

        if page.chats.is_empty() {
            exhausted = true;
            break;
        }

        cursor = page
            .chats
            .iter()
            .filter_map(|chat| chat.updated_at.or(chat.last_message_time))
            .min()
            .or(cursor);
        chats.extend(page.chats);

        if !page.has_more {
            exhausted = true;
            break;
        }
    }

    Ok(BackfillOutcome {
        chats,
        pages_fetched,
        exhausted,
    })
}

fn map_source_error(error: FetchSourceError) -> BackfillError {
    match error {
        FetchSourceError::Unauthorized => BackfillError::Unauthorized,
        FetchSourceError::Unavailable => BackfillError::TemporarilyUnavailable,
        FetchSourceError::InvalidData => BackfillError::DataContractViolation,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        domain::chat::{Chat, ContactRef},
        usecases::contracts::ChatPage,
    };

    const MINUTE_MS: i64 = 60 * 1_000;

    struct StubDirectory {
        pages: Mutex<Vec<ChatPage>>,
        captured_cursors: Mutex<Vec<Option<i64>>>,
    }

    impl StubDirectory {
        fn with_pages(pages: Vec<ChatPage>) -> Self {
            Self {
                pages: Mutex::new(pages),
                captured_cursors: Mutex::new(Vec::new()),
            }
        }

        fn endless(page: ChatPage, copies: usize) -> Self {
            Self::with_pages(vec![page; copies])
        }
    }

    #[async_trait]
    impl ChatDirectory for StubDirectory {
        async fn list_chats(
            &self,
            _filter: Option<&str>,
            cursor: Option<i64>,
        ) -> Result<ChatPage, FetchSourceError> {
            self.captured_cursors.lock().expect("cursor lock").push(cursor);
            let mut pages = self.pages.lock().expect("pages lock");
            if pages.is_empty() {
                return Ok(ChatPage {
                    chats: vec![],
                    has_more: false,
                });
            }
            Ok(pages.remove(0))
        }
    }

    fn chat(id: &str, updated_at: i64) -> Chat {
        let mut chat = Chat::new(id.to_owned(), ContactRef::default());
        chat.updated_at = Some(updated_at);
        chat
    }

    fn page(ids_and_updates: &[(&str, i64)], has_more: bool) -> ChatPage {
        ChatPage {
            chats: ids_and_updates
                .iter()
                .map(|(id, at)| chat(id, *at))
                .collect(),
            has_more,
        }
    }

    #[test]
    fn three_minute_gap_plans_the_recent_tier() {
        let plan = plan_backfill(Some(3 * MINUTE_MS));

        assert_eq!(plan.tier, BackfillTier::Recent);
        assert_eq!(plan.page_cap, 2);
    }

    #[test]
    fn twelve_minute_gap_plans_the_medium_tier() {
        let plan = plan_backfill(Some(12 * MINUTE_MS));

        assert_eq!(plan.tier, BackfillTier::Medium);
        assert_eq!(plan.page_cap, 5);
    }

    #[test]
    fn forty_five_minute_gap_plans_the_full_tier() {
        let plan = plan_backfill(Some(45 * MINUTE_MS));

        assert_eq!(plan.tier, BackfillTier::Full);
        assert_eq!(plan.page_cap, 50);
    }

    #[test]
    fn unknown_gap_plans_the_full_tier() {
        let plan = plan_backfill(None);

        assert_eq!(plan.tier, BackfillTier::Full);
    }

    #[test]
    fn tier_boundaries_are_half_open() {
        assert_eq!(plan_backfill(Some(5 * MINUTE_MS)).tier, BackfillTier::Medium);
        assert_eq!(plan_backfill(Some(30 * MINUTE_MS)).tier, BackfillTier::Full);
    }

    #[tokio::test]
    async fn fetching_stops_at_the_page_cap() {
        let directory = StubDirectory::endless(page(&[("a", 100)], true), 10);

        let outcome = run_backfill(&directory, None, &plan_backfill(Some(3 * MINUTE_MS)))
            .await
            .expect("backfill should succeed");

        assert_eq!(outcome.pages_fetched, 2);
        assert!(!outcome.exhausted);
    }

    #[tokio::test]
    async fn medium_tier_is_capped_at_five_pages() {
        let directory = StubDirectory::endless(page(&[("a", 100)], true), 10);

        let outcome = run_backfill(&directory, None, &plan_backfill(Some(12 * MINUTE_MS)))
            .await
            .expect("backfill should succeed");

        assert_eq!(outcome.pages_fetched, 5);
        assert!(!outcome.exhausted);
    }

    #[tokio::test]
    async fn fetching_stops_early_when_server_has_no_more_data() {
        let directory = StubDirectory::with_pages(vec![
            page(&[("a", 300)], true),
            page(&[("b", 200)], false),
        ]);

        let outcome = run_backfill(&directory, None, &plan_backfill(None))
            .await
            .expect("backfill should succeed");

        assert_eq!(outcome.pages_fetched, 2);
        assert!(outcome.exhausted);
        assert_eq!(outcome.chats.len(), 2);
    }

    #[tokio::test]
    async fn fetching_stops_early_on_an_empty_page() {
        let directory = StubDirectory::with_pages(vec![
            page(&[("a", 300)], true),
            page(&[], true),
        ]);

        let outcome = run_backfill(&directory, None, &plan_backfill(None))
            .await
            .expect("backfill should succeed");

        assert_eq!(outcome.pages_fetched, 2);
        assert!(outcome.exhausted);
        assert_eq!(outcome.chats.len(), 1);
    }

    #[tokio::test]
    async fn cursor_carries_the_oldest_seen_update_timestamp() {
        let directory = StubDirectory::with_pages(vec![
            page(&[("a", 300), ("b", 250)], true),
            page(&[("c", 200)], true),
            page(&[], false),
        ]);

        let _ = run_backfill(&directory, None, &plan_backfill(None))
            .await
            .expect("backfill should succeed");

        let cursors = directory.captured_cursors.lock().expect("cursor lock");
        assert_eq!(*cursors, vec![None, Some(250), Some(200)]);
    }

    #[tokio::test]
    async fn source_errors_map_to_domain_errors() {
        struct FailingDirectory;

        #[async_trait]
        impl ChatDirectory for FailingDirectory {
            async fn list_chats(
                &self,
                _filter: Option<&str>,
                _cursor: Option<i64>,
            ) -> Result<ChatPage, FetchSourceError> {
                Err(FetchSourceError::Unavailable)
            }
        }

        let err = run_backfill(&FailingDirectory, None, &plan_backfill(None))
            .await
            .expect_err("must fail");

        assert_eq!(err, BackfillError::TemporarilyUnavailable);
    }
}

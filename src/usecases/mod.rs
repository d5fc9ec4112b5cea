//! Use case layer: synchronization workflows behind trait seams.

pub mod backfill;
pub mod cache_first;
pub mod contracts;
pub mod engine;
pub mod merge_chats;
pub mod reconcile;
pub mod send_message;
pub mod sync_queue;

/// Returns the usecases module name for smoke checks.
pub fn module_name() -> &'static str {
    "usecases"
}

//! Domain layer: core entities and in-memory inbox state.

pub mod chat;
pub mod connection;
pub mod events;
pub mod inbox;
pub mod message;
pub mod sync_operation;

/// Returns the domain module name for smoke checks.
pub fn module_name() -> &'static str {
    "domain"
}

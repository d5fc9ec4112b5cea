//! Transport layer: session lifecycle, wire normalization, and the server
//! fetch adapter.

pub mod api;
pub mod manager;
pub mod scheduler;
pub mod session;
pub mod wire;

/// Returns the transport module name for smoke checks.
pub fn module_name() -> &'static str {
    "transport"
}

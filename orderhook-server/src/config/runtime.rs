//! Runtime configuration re-exports.
//!
//! The validated config types are defined in `orderhook-core::config`.

pub use orderhook_core::config::{ServerConfig, SharedConfig, WebhookConfig};

//! Configuration types for orderhook.
//!
//! These are the validated runtime values shared across crates. Loading and
//! parsing happen in the server crate.

mod server;
mod webhook;

pub use server::ServerConfig;
pub use webhook::{DEFAULT_WEBHOOK_PATH, WebhookConfig};

use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared configuration state with separate locks for each section.
#[derive(Clone)]
pub struct SharedConfig {
    /// Server configuration (listen address).
    pub server: Arc<RwLock<ServerConfig>>,
    /// Webhook verification settings. Replaced on reload, so a rotated
    /// signature key takes effect without a restart.
    pub webhook: Arc<RwLock<WebhookConfig>>,
}

impl SharedConfig {
    pub fn new(server: ServerConfig, webhook: WebhookConfig) -> Self {
        Self {
            server: Arc::new(RwLock::new(server)),
            webhook: Arc::new(RwLock::new(webhook)),
        }
    }
}

//! TOML file configuration structures.
//!
//! These structs directly map to the `orderhook.toml` file format. Every
//! section is optional so that a deployment can be configured from the
//! environment alone.

use orderhook_core::config::DEFAULT_WEBHOOK_PATH;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub square: SquareConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

/// Webhook section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Signature key shown on the processor's webhook subscription page.
    #[serde(default)]
    pub signature_key: Option<String>,
    /// The exact URL registered with the processor.
    #[serde(default)]
    pub notification_url: Option<String>,
    /// Accept deliveries without verification when no key is configured.
    #[serde(default)]
    pub allow_unsigned: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_webhook_path")]
    pub path: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            signature_key: None,
            notification_url: None,
            allow_unsigned: false,
            debug: false,
            path: default_webhook_path(),
        }
    }
}

fn default_webhook_path() -> String {
    DEFAULT_WEBHOOK_PATH.to_string()
}

/// Payment processor section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SquareConfig {
    #[serde(default)]
    pub environment: SquareEnvironment,
    /// Public base URL of this deployment. `{api_base_url}/webhook` is used as
    /// the notification URL when none is set explicitly.
    #[serde(default)]
    pub api_base_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SquareEnvironment {
    #[default]
    Production,
    Sandbox,
}

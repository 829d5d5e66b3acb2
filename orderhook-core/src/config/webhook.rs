//! Webhook verification configuration.

/// Route the processor posts notifications to unless configured otherwise.
pub const DEFAULT_WEBHOOK_PATH: &str = "/api/square/webhook";

/// Settings the webhook endpoint reads on every delivery.
#[derive(Clone)]
pub struct WebhookConfig {
    /// Shared secret for HMAC verification. `None` disables verification,
    /// which is only accepted when `allow_unsigned` is set.
    pub signature_key: Option<Box<[u8]>>,
    /// URL the processor signs together with the body, used by the
    /// URL-prefixed fallback scheme.
    pub notification_url: Option<String>,
    pub allow_unsigned: bool,
    /// Log lengths and schemes on signature mismatch.
    pub debug: bool,
    /// Route path. Read once when the router is built.
    pub path: String,
}

impl WebhookConfig {
    /// Get the secret key bytes for HMAC verification.
    pub fn secret_bytes(&self) -> Option<&[u8]> {
        self.signature_key.as_deref()
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            signature_key: None,
            notification_url: None,
            allow_unsigned: false,
            debug: false,
            path: DEFAULT_WEBHOOK_PATH.to_string(),
        }
    }
}

// The secret must never end up in logs.
impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("signature_key", &self.signature_key.as_ref().map(|_| "<redacted>"))
            .field("notification_url", &self.notification_url)
            .field("allow_unsigned", &self.allow_unsigned)
            .field("debug", &self.debug)
            .field("path", &self.path)
            .finish()
    }
}

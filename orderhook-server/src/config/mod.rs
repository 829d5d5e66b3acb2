//! Configuration module for orderhook-server.
//!
//! Handles loading configuration from the TOML file, CLI arguments,
//! and environment variables.

pub mod file;
pub mod runtime;

use crate::config::file::{FileConfig, SquareEnvironment};
use crate::config::runtime::{ServerConfig, SharedConfig, WebhookConfig};
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error(
        "no webhook signature key configured; set SQUARE_WEBHOOK_SIGNATURE_KEY or allow unsigned deliveries explicitly"
    )]
    MissingSignatureKey,

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
#[derive(Debug)]
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub webhook: WebhookConfig,
}

impl LoadedConfig {
    /// Convert into a SharedConfig with Arc<RwLock<T>> wrappers.
    pub fn into_shared(self) -> SharedConfig {
        SharedConfig::new(self.server, self.webhook)
    }
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file (a missing file means all defaults)
    /// 2. Apply environment and CLI overrides
    /// 3. Validate the result and resolve the notification URL
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let file_config = match std::fs::read_to_string(&self.config_path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    path = %self.config_path.display(),
                    "Config file not found, using defaults and environment"
                );
                FileConfig::default()
            }
            Err(e) => return Err(e.into()),
        };
        self.build(file_config, |name| std::env::var(name).ok())
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    /// Overrides, validation and conversion, with the environment supplied by `env`.
    fn build(
        &self,
        mut file_config: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<LoadedConfig, ConfigError> {
        apply_env_overrides(&mut file_config, &env);
        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        let signature_key = file_config
            .webhook
            .signature_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(|key| key.as_bytes().to_vec().into_boxed_slice());

        if signature_key.is_none() {
            if !file_config.webhook.allow_unsigned {
                return Err(ConfigError::MissingSignatureKey);
            }
            tracing::warn!("No webhook signature key configured; deliveries will NOT be verified");
        }

        if !file_config.webhook.path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "webhook path {} must start with '/'",
                file_config.webhook.path
            )));
        }

        let notification_url = resolve_notification_url(&file_config)?;

        Ok(LoadedConfig {
            server: ServerConfig {
                listen: file_config.server.listen,
            },
            webhook: WebhookConfig {
                signature_key,
                notification_url,
                allow_unsigned: file_config.webhook.allow_unsigned,
                debug: file_config.webhook.debug,
                path: file_config.webhook.path,
            },
        })
    }
}

fn apply_env_overrides(config: &mut FileConfig, env: &impl Fn(&str) -> Option<String>) {
    if let Some(environment) = env("SQUARE_ENVIRONMENT") {
        if environment.trim().eq_ignore_ascii_case("sandbox") {
            config.square.environment = SquareEnvironment::Sandbox;
        } else if environment.trim().eq_ignore_ascii_case("production") {
            config.square.environment = SquareEnvironment::Production;
        }
    }

    if let Some(key) = env("SQUARE_WEBHOOK_SIGNATURE_KEY").filter(|k| !k.trim().is_empty()) {
        config.webhook.signature_key = Some(key);
    } else if config.square.environment == SquareEnvironment::Sandbox
        && config.webhook.signature_key.is_none()
    {
        config.webhook.signature_key = env("SQUARE_SANDBOX_WEBHOOK_SECRET");
    }

    if let Some(url) = env("SQUARE_WEBHOOK_NOTIFICATION_URL").filter(|u| !u.trim().is_empty()) {
        config.webhook.notification_url = Some(url);
    }
    if let Some(debug) = env("WEBHOOK_DEBUG") {
        config.webhook.debug = is_truthy(&debug);
    }
    if let Some(allow) = env("WEBHOOK_ALLOW_UNSIGNED") {
        config.webhook.allow_unsigned = is_truthy(&allow);
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// The URL the processor signs along with the body, if one can be known.
fn resolve_notification_url(config: &FileConfig) -> Result<Option<String>, ConfigError> {
    let resolved = match config.webhook.notification_url.as_deref().map(str::trim) {
        Some(explicit) if !explicit.is_empty() => Some(explicit.to_string()),
        _ => config
            .square
            .api_base_url
            .as_deref()
            .map(|base| base.trim().trim_end_matches('/'))
            .filter(|base| !base.is_empty())
            .map(|base| format!("{base}/webhook")),
    };

    if let Some(url) = &resolved {
        url::Url::parse(url).map_err(|e| {
            ConfigError::ValidationError(format!("invalid notification url {url}: {e}"))
        })?;
    }
    Ok(resolved)
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn build_with(
        toml_str: &str,
        vars: &[(&str, &str)],
    ) -> Result<LoadedConfig, ConfigError> {
        let file_config: FileConfig = toml::from_str(toml_str).unwrap();
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConfigLoader::new("unused.toml", None).build(file_config, |name| vars.get(name).cloned())
    }

    #[test]
    fn test_missing_key_is_rejected() {
        assert!(matches!(
            build_with("", &[]),
            Err(ConfigError::MissingSignatureKey)
        ));
        assert!(matches!(
            build_with("[webhook]\nsignature_key = \"  \"\n", &[]),
            Err(ConfigError::MissingSignatureKey)
        ));
    }

    #[test]
    fn test_unsigned_must_be_explicit() {
        let loaded = build_with("", &[("WEBHOOK_ALLOW_UNSIGNED", "true")]).unwrap();
        assert!(loaded.webhook.allow_unsigned);
        assert_eq!(loaded.webhook.secret_bytes(), None);
    }

    #[test]
    fn test_env_key_overrides_file() {
        let loaded = build_with(
            "[webhook]\nsignature_key = \"from-file\"\n",
            &[("SQUARE_WEBHOOK_SIGNATURE_KEY", "from-env")],
        )
        .unwrap();
        assert_eq!(loaded.webhook.secret_bytes(), Some(&b"from-env"[..]));
    }

    #[test]
    fn test_sandbox_secret_fallback() {
        let vars = [
            ("SQUARE_ENVIRONMENT", "sandbox"),
            ("SQUARE_SANDBOX_WEBHOOK_SECRET", "sandbox-key"),
        ];
        let loaded = build_with("", &vars).unwrap();
        assert_eq!(loaded.webhook.secret_bytes(), Some(&b"sandbox-key"[..]));

        // Only consulted in sandbox.
        assert!(build_with("", &vars[1..]).is_err());
    }

    #[test]
    fn test_notification_url_resolution() {
        let key = [("SQUARE_WEBHOOK_SIGNATURE_KEY", "k")];

        let derived = build_with(
            "[square]\napi_base_url = \"https://shop.example.com/api/\"\n",
            &key,
        )
        .unwrap();
        assert_eq!(
            derived.webhook.notification_url.as_deref(),
            Some("https://shop.example.com/api/webhook")
        );

        let explicit = build_with(
            "[webhook]\nnotification_url = \"https://hooks.example.com/sq\"\n[square]\napi_base_url = \"https://shop.example.com\"\n",
            &key,
        )
        .unwrap();
        assert_eq!(
            explicit.webhook.notification_url.as_deref(),
            Some("https://hooks.example.com/sq")
        );

        let from_env = build_with(
            "",
            &[
                ("SQUARE_WEBHOOK_SIGNATURE_KEY", "k"),
                ("SQUARE_WEBHOOK_NOTIFICATION_URL", "https://env.example.com/hook"),
            ],
        )
        .unwrap();
        assert_eq!(
            from_env.webhook.notification_url.as_deref(),
            Some("https://env.example.com/hook")
        );

        let none = build_with("", &key).unwrap();
        assert_eq!(none.webhook.notification_url, None);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let key = [("SQUARE_WEBHOOK_SIGNATURE_KEY", "k")];
        assert!(matches!(
            build_with("[webhook]\nnotification_url = \"not a url\"\n", &key),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(matches!(
            build_with("[webhook]\npath = \"webhook\"\n", &key),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_debug_flag_and_listen_override() {
        let file_config: FileConfig = toml::from_str("").unwrap();
        let listen: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let loaded = ConfigLoader::new("unused.toml", Some(listen))
            .build(file_config, |name| match name {
                "SQUARE_WEBHOOK_SIGNATURE_KEY" => Some("k".to_string()),
                "WEBHOOK_DEBUG" => Some("TRUE".to_string()),
                _ => None,
            })
            .unwrap();
        assert!(loaded.webhook.debug);
        assert_eq!(loaded.server.listen, listen);
    }
}

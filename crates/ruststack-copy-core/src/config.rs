//! Server-side copy configuration.
//!
//! Provides [`CopyConfig`] for configuring the copy pipeline and the server that
//! hosts it. Values are loaded from environment variables. The legacy
//! `object_post_as_copy` option can additionally be recovered from an old proxy
//! configuration file through [`crate::legacy`].

use serde::{Deserialize, Serialize};
use tracing::debug;
use typed_builder::TypedBuilder;

use crate::legacy;

/// Largest object the storage cluster accepts, in bytes (5 GiB + 2).
pub const MAX_OBJECT_SIZE: u64 = 5 * 1024 * 1024 * 1024 + 2;

/// Copy pipeline configuration.
///
/// The configuration is read once at startup and never mutated afterwards.
///
/// # Examples
///
/// ```
/// use ruststack_copy_core::config::{CopyConfig, MAX_OBJECT_SIZE};
///
/// let config = CopyConfig::default();
/// assert!(config.object_post_as_copy);
/// assert_eq!(config.max_object_size, MAX_OBJECT_SIZE);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct CopyConfig {
    /// Bind address for the server (e.g. `"0.0.0.0:8080"`).
    #[builder(default = String::from("0.0.0.0:8080"))]
    pub gateway_listen: String,

    /// Whether object POSTs are translated into a copy of the object onto itself.
    #[builder(default = true)]
    pub object_post_as_copy: bool,

    /// Maximum size (in bytes) of a source object that may be copied.
    #[builder(default = MAX_OBJECT_SIZE)]
    pub max_object_size: u64,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,

    /// Path of a legacy proxy configuration file or directory.
    #[builder(default)]
    pub proxy_config_path: Option<String>,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            gateway_listen: String::from("0.0.0.0:8080"),
            object_post_as_copy: true,
            max_object_size: MAX_OBJECT_SIZE,
            log_level: String::from("info"),
            proxy_config_path: None,
        }
    }
}

impl CopyConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables (falling back to defaults):
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `GATEWAY_LISTEN` | `0.0.0.0:8080` |
    /// | `OBJECT_POST_AS_COPY` | *(unset)* |
    /// | `PROXY_CONFIG_PATH` | *(unset)* |
    /// | `MAX_OBJECT_SIZE` | `5368709122` |
    /// | `LOG_LEVEL` | `info` |
    ///
    /// When `OBJECT_POST_AS_COPY` is unset and `PROXY_CONFIG_PATH` names a
    /// readable proxy configuration, the option is taken from the proxy app
    /// section of that file. Otherwise post-as-copy stays enabled.
    ///
    /// # Examples
    ///
    /// ```
    /// use ruststack_copy_core::config::CopyConfig;
    ///
    /// let config = CopyConfig::from_env();
    /// assert!(!config.gateway_listen.is_empty());
    /// ```
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("GATEWAY_LISTEN") {
            config.gateway_listen = v;
        }
        if let Ok(v) = std::env::var("MAX_OBJECT_SIZE") {
            if let Ok(n) = v.parse::<u64>() {
                config.max_object_size = n;
            }
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Ok(v) = std::env::var("PROXY_CONFIG_PATH") {
            config.proxy_config_path = Some(v);
        }

        let explicit = std::env::var("OBJECT_POST_AS_COPY").ok();
        config.object_post_as_copy =
            resolve_post_as_copy(explicit.as_deref(), config.proxy_config_path.as_deref());

        config
    }
}

/// Decide the post-as-copy toggle.
///
/// An explicit value always wins. Without one, the legacy proxy configuration is
/// consulted; an unreadable file or a missing option leaves the default (`true`).
#[must_use]
pub fn resolve_post_as_copy(explicit: Option<&str>, proxy_config_path: Option<&str>) -> bool {
    if let Some(value) = explicit {
        return parse_bool(value);
    }

    let Some(path) = proxy_config_path else {
        return true;
    };

    match legacy::load_object_post_as_copy(path) {
        Ok(Some(value)) => {
            debug!(path, value = %value, "object_post_as_copy read from proxy config");
            parse_bool(&value)
        }
        Ok(None) => true,
        Err(err) => {
            debug!(path, error = %err, "could not read legacy proxy config");
            true
        }
    }
}

/// Parse a string as a boolean.
///
/// Accepts `true`, `1`, `yes`, `on`, `t` and `y` (case-insensitive); anything else
/// is `false`.
#[must_use]
pub fn parse_bool(value: &str) -> bool {
    const TRUE_VALUES: [&str; 6] = ["true", "1", "yes", "on", "t", "y"];
    let value = value.trim();
    TRUE_VALUES.iter().any(|t| value.eq_ignore_ascii_case(t))
}

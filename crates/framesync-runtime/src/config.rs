//! Bootstrap configuration rendered by the server into the page.
//!
//! # Example
//!
//! ```
//! use framesync_runtime::config::SyncConfig;
//!
//! let config = SyncConfig::from_json(r#"{
//!     "csrf": "abc123",
//!     "settings": {"structure": false},
//!     "urls": {"settings": "/admin/cms/usersettings/"},
//!     "request": {"url": "/admin/cms/page/resolve/", "model": "cms.page", "pk": 12}
//! }"#).unwrap();
//!
//! assert_eq!(config.request.pk, "12");
//! assert_eq!(config.storage_key, "cms_cookie");
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer};

use crate::settings::Settings;

/// Default local storage key for the settings string.
pub const DEFAULT_STORAGE_KEY: &str = "cms_cookie";

/// Errors raised while reading the bootstrap configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The bootstrap JSON is malformed or missing required fields.
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(e) => write!(f, "invalid bootstrap config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Parse(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Endpoint URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Urls {
    /// Remote settings endpoint (`GET` to read, `POST` to write).
    pub settings: String,
}

/// Identity of the resource being edited, plus the endpoint that resolves its
/// canonical path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResourceRequest {
    /// Confirmation endpoint.
    pub url: String,
    /// Resource type, e.g. `cms.page`.
    #[serde(default)]
    pub model: String,
    /// Primary key; numbers are accepted and kept in their decimal form.
    #[serde(default, deserialize_with = "string_or_number")]
    pub pk: String,
}

/// Configuration shared by the settings store and navigation coordinator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SyncConfig {
    /// CSRF token posted with every settings write.
    pub csrf: String,
    /// Server-supplied default settings.
    #[serde(default)]
    pub settings: Settings,
    pub urls: Urls,
    #[serde(default)]
    pub request: ResourceRequest,
    /// Local storage key holding the settings string.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_owned()
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(serde_json::Number),
        Null(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Num(n) => n.to_string(),
        Raw::Null(()) => String::new(),
    })
}

impl SyncConfig {
    /// Minimal configuration: CSRF token and settings endpoint.
    #[must_use]
    pub fn new(csrf: impl Into<String>, settings_url: impl Into<String>) -> Self {
        Self {
            csrf: csrf.into(),
            settings: Settings::new(),
            urls: Urls {
                settings: settings_url.into(),
            },
            request: ResourceRequest::default(),
            storage_key: default_storage_key(),
        }
    }

    /// Parse the server-rendered bootstrap object.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn with_defaults(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_resource(
        mut self,
        url: impl Into<String>,
        model: impl Into<String>,
        pk: impl Into<String>,
    ) -> Self {
        self.request = ResourceRequest {
            url: url.into(),
            model: model.into(),
            pk: pk.into(),
        };
        self
    }

    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }
}

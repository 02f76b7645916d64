//! Settings store: one JSON object mirrored to local storage or to the
//! remote session.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      SettingsStore                            │
//! │   - merges partial updates onto the canonical object          │
//! │   - publishes the backend-confirmed result to AppContext      │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │             SettingsBackend (chosen once at startup)          │
//! │   - Local:  LocalStore, single fixed key                      │
//! │   - Remote: Transport, GET/POST settings URL, holds LockFlag  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Invariants
//!
//! 1. **Backend-confirmed**: the returned object is what the backend accepted,
//!    never just the locally intended update.
//! 2. **Single copy**: every successful call replaces the canonical object in
//!    [`AppContext`] before returning it.
//! 3. **Lock released**: the lock flag is cleared on every remote exit path.
//! 4. **Last writer wins**: concurrent writers are not serialized.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Transport error on write | Reported; candidate object returned |
//! | Transport error on read | Reported; defaults written and returned |
//! | Empty or `null` payload | Treated as absent |
//! | Malformed payload | `SettingsError::Corruption`, canonical object untouched |
//! | Local write failure | `SettingsError::Storage` |

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::capability::StorageSelector;
use crate::config::SyncConfig;
use crate::context::AppContext;
use crate::storage::{LocalStore, StorageError, StorageResult};
use crate::transport::{Transport, TransportResult};

// ─────────────────────────────────────────────────────────────────────────────
// Settings Object
// ─────────────────────────────────────────────────────────────────────────────

/// Opaque JSON object of user settings.
///
/// Keys are agreed on by callers; the store enforces no schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(Map<String, Value>);

impl Settings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value; anything but an object is rejected.
    pub fn from_value(value: Value) -> Result<Self, SettingsCorruptionError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(SettingsCorruptionError::new(
                "value",
                format!("expected a JSON object, found {}", json_kind(&other)),
            )),
        }
    }

    /// Parse a payload read from `source`.
    ///
    /// An empty payload or JSON `null` means "nothing stored" and yields
    /// `Ok(None)`.
    pub fn parse(source: &str, text: &str) -> Result<Option<Self>, SettingsCorruptionError> {
        if text.is_empty() {
            return Ok(None);
        }
        let value: Value = serde_json::from_str(text)
            .map_err(|e| SettingsCorruptionError::new(source, e.to_string()))?;
        match value {
            Value::Null => Ok(None),
            Value::Object(map) => Ok(Some(Self(map))),
            other => Err(SettingsCorruptionError::new(
                source,
                format!("expected a JSON object, found {}", json_kind(&other)),
            )),
        }
    }

    /// Serialize to the JSON string stored by the backends.
    #[must_use]
    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    /// Shallow merge: keys in `partial` override, all other keys are kept.
    #[must_use]
    pub fn merged(&self, partial: &Settings) -> Settings {
        let mut out = self.0.clone();
        for (key, value) in &partial.0 {
            out.insert(key.clone(), value.clone());
        }
        Self(out)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Settings {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// A backend returned a payload that is not a settings object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsCorruptionError {
    /// Backend the payload came from.
    pub source_name: String,
    pub detail: String,
}

impl SettingsCorruptionError {
    #[must_use]
    pub fn new(source_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for SettingsCorruptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "corrupt settings from {}: {}", self.source_name, self.detail)
    }
}

impl std::error::Error for SettingsCorruptionError {}

/// Errors returned by [`SettingsStore`].
///
/// Transport failures never appear here: they are reported to the messaging
/// collaborator and the store falls back to a best-effort object.
#[derive(Debug)]
pub enum SettingsError {
    /// Local storage refused a read or write.
    Storage(StorageError),
    /// A backend returned malformed settings.
    Corruption(SettingsCorruptionError),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Storage(e) => write!(f, "settings storage failed: {e}"),
            SettingsError::Corruption(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsError::Storage(e) => Some(e),
            SettingsError::Corruption(e) => Some(e),
        }
    }
}

impl From<StorageError> for SettingsError {
    fn from(e: StorageError) -> Self {
        SettingsError::Storage(e)
    }
}

impl From<SettingsCorruptionError> for SettingsError {
    fn from(e: SettingsCorruptionError) -> Self {
        SettingsError::Corruption(e)
    }
}

/// Result type for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;

// ─────────────────────────────────────────────────────────────────────────────
// Backends
// ─────────────────────────────────────────────────────────────────────────────

/// Settings mirrored under one key of a [`LocalStore`].
pub struct LocalBackend {
    store: Rc<dyn LocalStore>,
    key: String,
}

impl LocalBackend {
    #[must_use]
    pub fn new(store: Rc<dyn LocalStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.store.name()
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    fn read(&self) -> StorageResult<Option<String>> {
        self.store.get_item(&self.key)
    }

    fn write(&self, body: &str) -> StorageResult<()> {
        self.store.set_item(&self.key, body)
    }
}

/// Settings held in the server-side session.
pub struct RemoteBackend {
    transport: Rc<dyn Transport>,
    url: String,
    csrf: String,
}

impl RemoteBackend {
    #[must_use]
    pub fn new(transport: Rc<dyn Transport>, url: impl Into<String>, csrf: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
            csrf: csrf.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        "RemoteSession"
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn fetch(&self) -> TransportResult<String> {
        self.transport.get(&self.url, &[])
    }

    fn store(&self, body: &str) -> TransportResult<String> {
        self.transport.post_form(
            &self.url,
            &[("csrfmiddlewaretoken", self.csrf.as_str()), ("settings", body)],
        )
    }
}

/// Where settings are persisted, chosen once per process.
pub enum SettingsBackend {
    Local(LocalBackend),
    Remote(RemoteBackend),
}

impl SettingsBackend {
    /// Local storage if the selector says it is usable, the remote session
    /// otherwise.
    #[must_use]
    pub fn select(
        selector: &StorageSelector,
        transport: Rc<dyn Transport>,
        config: &SyncConfig,
    ) -> Self {
        let backend = if selector.is_persistent_storage_available() {
            Self::Local(LocalBackend::new(selector.store(), config.storage_key.clone()))
        } else {
            Self::Remote(RemoteBackend::new(
                transport,
                config.urls.settings.clone(),
                config.csrf.clone(),
            ))
        };
        tracing::debug!(backend = backend.name(), "selected settings backend");
        backend
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Local(local) => local.name(),
            Self::Remote(remote) => remote.name(),
        }
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl fmt::Debug for SettingsBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(local) => f
                .debug_struct("Local")
                .field("store", &local.name())
                .field("key", &local.key)
                .finish(),
            Self::Remote(remote) => f
                .debug_struct("Remote")
                .field("url", &remote.url)
                .finish(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings Store
// ─────────────────────────────────────────────────────────────────────────────

/// Reads and writes the settings object through the selected backend.
///
/// Both operations block until the backend answers.
pub struct SettingsStore {
    ctx: Rc<AppContext>,
    backend: SettingsBackend,
}

impl SettingsStore {
    #[must_use]
    pub fn new(ctx: Rc<AppContext>, backend: SettingsBackend) -> Self {
        Self { ctx, backend }
    }

    /// Probe `selector` and build the store on the matching backend.
    #[must_use]
    pub fn select(
        ctx: Rc<AppContext>,
        selector: &StorageSelector,
        transport: Rc<dyn Transport>,
    ) -> Self {
        let backend = SettingsBackend::select(selector, transport, ctx.config());
        Self::new(ctx, backend)
    }

    /// Merge `partial` onto the canonical object and persist the result.
    ///
    /// Returns the object as confirmed by the backend, which is also the new
    /// canonical object.
    pub fn set_settings(&self, partial: &Settings) -> SettingsResult<Settings> {
        let candidate = self.ctx.settings().merged(partial);
        self.persist(candidate)
    }

    /// Write `candidate` as the whole object and adopt the backend's answer.
    fn persist(&self, candidate: Settings) -> SettingsResult<Settings> {
        let body = candidate.to_json();
        let _loader = self.ctx.loader_guard();

        let confirmed = match &self.backend {
            SettingsBackend::Local(local) => {
                local.write(&body)?;
                tracing::debug!(store = local.name(), keys = candidate.len(), "settings saved");
                candidate
            }
            SettingsBackend::Remote(remote) => {
                let _lock = self.ctx.lock().hold();
                match remote.store(&body) {
                    Ok(text) => parse_payload(remote.name(), &text)?
                        .unwrap_or_else(|| self.ctx.defaults().clone()),
                    Err(e) => {
                        self.ctx.report(&e);
                        candidate
                    }
                }
            }
        };

        self.ctx.replace_settings(confirmed.clone());
        Ok(confirmed)
    }

    /// Read the persisted object, initializing it from the defaults when the
    /// backend has nothing.
    ///
    /// The defaults are written as they are, without keys set earlier in the
    /// session.
    pub fn get_settings(&self) -> SettingsResult<Settings> {
        let fetched = {
            let _loader = self.ctx.loader_guard();
            match &self.backend {
                SettingsBackend::Local(local) => match local.read()? {
                    Some(text) => parse_payload(local.name(), &text)?,
                    None => None,
                },
                SettingsBackend::Remote(remote) => {
                    let _lock = self.ctx.lock().hold();
                    match remote.fetch() {
                        Ok(text) => parse_payload(remote.name(), &text)?,
                        Err(e) => {
                            self.ctx.report(&e);
                            None
                        }
                    }
                }
            }
        };

        let settings = match fetched {
            Some(settings) => settings,
            None => {
                tracing::debug!(backend = self.backend.name(), "no stored settings, writing defaults");
                self.persist(self.ctx.defaults().clone())?
            }
        };

        self.ctx.replace_settings(settings.clone());
        Ok(settings)
    }

    /// The canonical object, without I/O.
    #[must_use]
    pub fn current(&self) -> Settings {
        self.ctx.settings().clone()
    }

    #[must_use]
    pub fn backend(&self) -> &SettingsBackend {
        &self.backend
    }

    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    #[must_use]
    pub fn context(&self) -> &Rc<AppContext> {
        &self.ctx
    }
}

fn parse_payload(source: &str, text: &str) -> SettingsResult<Option<Settings>> {
    Settings::parse(source, text).map_err(|e| {
        tracing::warn!(source, detail = %e.detail, "corrupt settings payload");
        SettingsError::Corruption(e)
    })
}

impl fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsStore")
            .field("backend", &self.backend)
            .field("ctx", &self.ctx)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn settings(value: Value) -> Settings {
        Settings::from_value(value).unwrap()
    }

    #[test]
    fn merge_is_shallow_and_partial_wins() {
        let base = settings(json!({"a": 1, "nested": {"x": 1, "y": 2}}));
        let merged = base.merged(&settings(json!({"b": 2, "nested": {"x": 9}})));
        assert_eq!(merged, settings(json!({"a": 1, "b": 2, "nested": {"x": 9}})));
    }

    #[test]
    fn parse_treats_empty_and_null_as_absent() {
        assert_eq!(Settings::parse("t", "").unwrap(), None);
        assert_eq!(Settings::parse("t", "null").unwrap(), None);
        assert_eq!(
            Settings::parse("t", r#"{"k":"v"}"#).unwrap(),
            Some(settings(json!({"k": "v"})))
        );
    }

    #[test]
    fn parse_rejects_non_objects_and_garbage() {
        let err = Settings::parse("LocalStore", "[1,2]").unwrap_err();
        assert_eq!(err.source_name, "LocalStore");
        assert!(err.detail.contains("an array"));
        assert!(Settings::parse("LocalStore", "{not json").is_err());
    }

    #[test]
    fn to_json_round_trips() {
        let s = settings(json!({"toolbar": {"open": true}, "n": 3}));
        assert_eq!(Settings::parse("t", &s.to_json()).unwrap(), Some(s));
    }

    #[test]
    fn select_prefers_local_when_available() {
        let selector = StorageSelector::new(Rc::new(MemoryStorage::new()));
        let transport: Rc<dyn Transport> = Rc::new(NeverTransport);
        let backend = SettingsBackend::select(&selector, transport, &SyncConfig::new("t", "/s/"));
        assert!(backend.is_local());
        assert_eq!(backend.name(), "MemoryStorage");
    }

    #[test]
    fn corrupt_local_payload_leaves_canonical_untouched() {
        let store = Rc::new(MemoryStorage::new());
        store.set_item("cms_cookie", "{oops").unwrap();
        let config = SyncConfig::new("t", "/s/").with_defaults(settings(json!({"d": 1})));
        let ctx = AppContext::new(config).shared();
        let settings_store = SettingsStore::new(
            ctx.clone(),
            SettingsBackend::Local(LocalBackend::new(store, "cms_cookie")),
        );

        let err = settings_store.get_settings().unwrap_err();
        assert!(matches!(err, SettingsError::Corruption(_)));
        assert_eq!(*ctx.settings(), settings(json!({"d": 1})));
    }

    struct NeverTransport;

    impl Transport for NeverTransport {
        fn get(&self, _url: &str, _query: &[(&str, &str)]) -> TransportResult<String> {
            panic!("local backend must not touch the network")
        }

        fn post_form(&self, _url: &str, _fields: &[(&str, &str)]) -> TransportResult<String> {
            panic!("local backend must not touch the network")
        }
    }
}

#![forbid(unsafe_code)]

//! framesync runtime
//!
//! Settings persistence and navigation coordination for an editing UI that
//! lives in nested frames.
//!
//! # Key Components
//!
//! - [`AppContext`] - Configuration, canonical settings, lock flag, collaborators
//! - [`StorageSelector`] - One-shot probe of local storage usability
//! - [`SettingsStore`] - Blocking read/write of the settings object
//! - [`NavigationCoordinator`] - Server-confirmed reload or redirect
//! - [`Transport`] - Blocking request primitive used by both
//!
//! # How it fits in the system
//! Hosts (the browser adapters in `framesync-web`, or a native embedder)
//! supply a [`LocalStore`], a [`Transport`] and a [`WindowHost`]. UI code
//! calls the store and the coordinator directly, wrapping chatty call sites
//! in the rate limiters from `framesync-core`.

pub mod capability;
pub mod collaborators;
pub mod config;
pub mod context;
#[cfg(feature = "tracing-json")]
pub mod logging;
pub mod navigation;
pub mod settings;
pub mod storage;
pub mod transport;

pub use capability::{PROBE_KEY, StorageSelector};
pub use collaborators::{Loader, LoaderGuard, Message, Messages, TracingMessages};
pub use config::{ConfigError, DEFAULT_STORAGE_KEY, ResourceRequest, SyncConfig, Urls};
pub use context::{AppContext, LockFlag, LockGuard, LockState};
pub use navigation::{
    NavigationCoordinator, NavigationError, NavigationOutcome, NavigationRequest,
    NavigationResult, NavigationTask, REFRESH_PAGE, WindowHost, top_window,
};
pub use settings::{
    LocalBackend, RemoteBackend, Settings, SettingsBackend, SettingsCorruptionError,
    SettingsError, SettingsResult, SettingsStore,
};
#[cfg(feature = "state-persistence")]
pub use storage::FileStorage;
pub use storage::{
    LocalStore, MemoryStorage, StorageError, StorageResult, UnavailableStorage,
};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::{Transport, TransportError, TransportResult};

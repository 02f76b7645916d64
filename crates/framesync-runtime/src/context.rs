//! Application context: the process-wide state shared by the settings store
//! and the navigation coordinator.
//!
//! One context exists per frame. Contexts in sibling frames share the
//! top-level window's [`LockFlag`].

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::collaborators::{Loader, LoaderGuard, Message, Messages, TracingMessages};
use crate::config::SyncConfig;
use crate::settings::Settings;
use crate::transport::TransportError;

// ─────────────────────────────────────────────────────────────────────────────
// Lock Flag
// ─────────────────────────────────────────────────────────────────────────────

/// Backing cell of a [`LockFlag`].
///
/// Hosts implement this to store the flag where every frame can see it.
pub trait LockState {
    fn get(&self) -> bool;
    fn set(&self, locked: bool);
}

impl LockState for Cell<bool> {
    fn get(&self) -> bool {
        Cell::get(self)
    }

    fn set(&self, locked: bool) {
        Cell::set(self, locked);
    }
}

/// Advisory "remote call in flight" flag owned by the top-level window.
///
/// Nothing blocks on it; UI components poll [`is_locked`](Self::is_locked)
/// to avoid issuing conflicting operations.
#[derive(Clone)]
pub struct LockFlag {
    state: Rc<dyn LockState>,
}

impl LockFlag {
    /// An unlocked flag backed by a plain cell.
    #[must_use]
    pub fn new() -> Self {
        Self::with_state(Rc::new(Cell::new(false)))
    }

    #[must_use]
    pub fn with_state(state: Rc<dyn LockState>) -> Self {
        Self { state }
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state.get()
    }

    pub fn lock(&self) {
        self.state.set(true);
    }

    pub fn unlock(&self) {
        self.state.set(false);
    }

    /// Set the flag until the returned guard is dropped.
    pub fn hold(&self) -> LockGuard {
        self.lock();
        LockGuard { flag: self.clone() }
    }
}

impl Default for LockFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LockFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFlag")
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Clears its [`LockFlag`] on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LockGuard {
    flag: LockFlag,
}

impl LockGuard {
    /// Clear the flag now.
    pub fn release(self) {}
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.flag.unlock();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Application Context
// ─────────────────────────────────────────────────────────────────────────────

/// Explicit replacement for the page-global application namespace.
///
/// Holds the bootstrap configuration, the single authoritative copy of the
/// settings object, the shared lock flag and the UI collaborators.
pub struct AppContext {
    config: SyncConfig,
    settings: RefCell<Settings>,
    lock: LockFlag,
    messages: Rc<dyn Messages>,
    loader: Option<Rc<dyn Loader>>,
}

impl AppContext {
    /// Context seeded with the configured defaults, a private lock flag and
    /// log-only messaging.
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        let settings = config.settings.clone();
        Self {
            config,
            settings: RefCell::new(settings),
            lock: LockFlag::new(),
            messages: Rc::new(TracingMessages),
            loader: None,
        }
    }

    /// Share `lock` with other frames (normally the top window's flag).
    #[must_use]
    pub fn with_lock(mut self, lock: LockFlag) -> Self {
        self.lock = lock;
        self
    }

    #[must_use]
    pub fn with_messages(mut self, messages: Rc<dyn Messages>) -> Self {
        self.messages = messages;
        self
    }

    #[must_use]
    pub fn with_loader(mut self, loader: Rc<dyn Loader>) -> Self {
        self.loader = Some(loader);
        self
    }

    #[must_use]
    pub fn shared(self) -> Rc<Self> {
        Rc::new(self)
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The server-supplied default settings.
    #[must_use]
    pub fn defaults(&self) -> &Settings {
        &self.config.settings
    }

    /// Borrow the canonical settings object.
    pub fn settings(&self) -> Ref<'_, Settings> {
        self.settings.borrow()
    }

    /// Replace the canonical settings object.
    pub fn replace_settings(&self, settings: Settings) {
        *self.settings.borrow_mut() = settings;
    }

    #[must_use]
    pub fn lock(&self) -> &LockFlag {
        &self.lock
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// Show the loader (if any) until the guard drops.
    pub fn loader_guard(&self) -> LoaderGuard {
        LoaderGuard::show(self.loader.clone())
    }

    /// Report a failed remote call to the messaging collaborator.
    pub fn report(&self, error: &TransportError) {
        tracing::warn!(
            status = error.status,
            status_text = %error.status_text,
            "remote call failed"
        );
        self.messages.open(&Message::error(error.to_string()));
    }

    #[must_use]
    pub fn messages(&self) -> Rc<dyn Messages> {
        Rc::clone(&self.messages)
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("settings_keys", &self.settings.borrow().len())
            .field("locked", &self.lock.is_locked())
            .field("has_loader", &self.loader.is_some())
            .finish()
    }
}

//! One-shot probe of local storage usability.
//!
//! The probe writes a sentinel pair and deletes it again. Any failure
//! (quota, disabled storage, sandboxing) means the local backend is unusable.
//! The answer is cached on first query and never recomputed, even if the
//! backend later changes behavior.

use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use crate::storage::LocalStore;

/// Sentinel key written and removed by the probe.
pub const PROBE_KEY: &str = "framesync_probe";

/// Caches whether a [`LocalStore`] is usable for the lifetime of the process.
pub struct StorageSelector {
    store: Rc<dyn LocalStore>,
    available: OnceCell<bool>,
}

impl StorageSelector {
    #[must_use]
    pub fn new(store: Rc<dyn LocalStore>) -> Self {
        Self {
            store,
            available: OnceCell::new(),
        }
    }

    /// Whether the local persistent backend is usable.
    ///
    /// The first call probes; every later call returns the cached answer.
    pub fn is_persistent_storage_available(&self) -> bool {
        *self.available.get_or_init(|| probe(self.store.as_ref()))
    }

    /// Whether the probe has already run.
    #[must_use]
    pub fn is_probed(&self) -> bool {
        self.available.get().is_some()
    }

    /// The probed store.
    #[must_use]
    pub fn store(&self) -> Rc<dyn LocalStore> {
        Rc::clone(&self.store)
    }
}

impl fmt::Debug for StorageSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageSelector")
            .field("store", &self.store.name())
            .field("available", &self.available.get())
            .finish()
    }
}

fn probe(store: &dyn LocalStore) -> bool {
    let result = store
        .set_item(PROBE_KEY, PROBE_KEY)
        .and_then(|()| store.remove_item(PROBE_KEY));
    match result {
        Ok(()) => {
            tracing::debug!(store = store.name(), "local storage available");
            true
        }
        Err(e) => {
            tracing::debug!(store = store.name(), error = %e, "local storage unavailable");
            false
        }
    }
}

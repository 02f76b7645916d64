//! Interfaces to the UI collaborators the runtime reports to.
//!
//! The runtime never renders anything itself. Failures are handed to a
//! [`Messages`] sink and storage round trips are bracketed by an optional
//! [`Loader`].

use std::rc::Rc;

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub message: String,
    pub error: bool,
}

impl Message {
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error: true,
        }
    }

    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error: false,
        }
    }
}

/// Notification sink ("open message").
pub trait Messages {
    fn open(&self, message: &Message);
}

/// Sink that writes messages to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMessages;

impl Messages for TracingMessages {
    fn open(&self, message: &Message) {
        if message.error {
            tracing::error!(message = %message.message, "framesync error");
        } else {
            tracing::info!(message = %message.message, "framesync message");
        }
    }
}

/// Busy indicator shown while a storage operation is in flight.
pub trait Loader {
    fn show_loader(&self);
    fn hide_loader(&self);
}

/// Shows the loader on creation and hides it on drop.
///
/// A missing loader makes both ends no-ops.
#[must_use = "the loader is hidden as soon as the guard is dropped"]
pub struct LoaderGuard {
    loader: Option<Rc<dyn Loader>>,
}

impl LoaderGuard {
    pub fn show(loader: Option<Rc<dyn Loader>>) -> Self {
        if let Some(loader) = &loader {
            loader.show_loader();
        }
        Self { loader }
    }
}

impl Drop for LoaderGuard {
    fn drop(&mut self) {
        if let Some(loader) = &self.loader {
            loader.hide_loader();
        }
    }
}

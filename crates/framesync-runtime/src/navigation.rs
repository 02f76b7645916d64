//! Navigation coordinator: reload, redirect, or stay put after an edit.
//!
//! # Decision Rule
//!
//! 1) Resolve the effective target: the top-level window of the frame tree.
//! 2) With server confirmation, hold the target's lock flag and ask the
//!    confirmation endpoint for the resource's canonical path `R`:
//!    - `R` empty and no url: **abort** (resource has no canonical path).
//!    - `R` non-empty and different from the current path: redirect to `R`.
//!    - url is [`REFRESH_PAGE`]: reload.
//!    - url given: redirect to it.
//!    - otherwise: nothing to do.
//!
//!    Every branch re-enters without confirmation, so the depth is at most one.
//! 3) Without confirmation, schedule a [`NavigationTask`] on the target after
//!    the requested delay. When it runs it assigns the url if it differs from
//!    the current location, and reloads otherwise.
//!
//! Confirmation blocks: the page issuing it may be torn down right after, so
//! the decision must be complete before this call returns.

use core::time::Duration;
use std::fmt;
use std::rc::Rc;

use crate::context::{AppContext, LockFlag};
use crate::transport::{Transport, TransportError};

/// Sentinel url meaning "reload, do not redirect".
pub const REFRESH_PAGE: &str = "REFRESH_PAGE";

/// A browsing context (window or frame) the coordinator can drive.
pub trait WindowHost {
    /// Containing window, `None` for the top-level window.
    fn parent(&self) -> Option<Rc<dyn WindowHost>>;

    /// The lock flag owned by this window.
    fn lock(&self) -> LockFlag;

    /// Path component of the current location.
    fn pathname(&self) -> String;

    /// Full current location.
    fn href(&self) -> String;

    /// Navigate to `url`.
    fn assign(&self, url: &str);

    /// Reload the current location as a user refresh would.
    fn reload(&self);

    /// Run `task` against this window after `delay`.
    fn set_timeout(&self, delay: Duration, task: NavigationTask);
}

/// Walk up the frame tree to the top-level window.
pub fn top_window(window: Rc<dyn WindowHost>) -> Rc<dyn WindowHost> {
    let mut current = window;
    while let Some(parent) = current.parent() {
        current = parent;
    }
    current
}

/// Deferred navigation scheduled on the target window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationTask {
    url: Option<String>,
}

impl NavigationTask {
    #[must_use]
    pub fn new(url: Option<String>) -> Self {
        Self { url }
    }

    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Assign the url if it differs from the window's location, reload
    /// otherwise.
    pub fn run(self, window: &dyn WindowHost) {
        match self.url {
            Some(url) if url != window.href() => {
                tracing::debug!(%url, "navigating");
                window.assign(&url);
            }
            _ => {
                tracing::debug!("reloading");
                window.reload();
            }
        }
    }
}

/// Per-call navigation request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationRequest {
    pub target_url: Option<String>,
    pub delay: Duration,
    pub confirm_via_server: bool,
}

impl NavigationRequest {
    /// Reload the current page.
    #[must_use]
    pub fn reload() -> Self {
        Self::default()
    }

    /// Go to `url`. [`REFRESH_PAGE`] only means "reload" on a confirmed
    /// request.
    #[must_use]
    pub fn redirect(url: impl Into<String>) -> Self {
        Self {
            target_url: Some(url.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Ask the server for the canonical location first.
    #[must_use]
    pub fn confirmed(mut self) -> Self {
        self.confirm_via_server = true;
        self
    }

    /// The target url; an empty string counts as absent.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.target_url.as_deref().filter(|u| !u.is_empty())
    }
}

/// What a call to [`NavigationCoordinator::reload_or_redirect`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// A task was scheduled; `url: None` means reload.
    Scheduled {
        url: Option<String>,
        delay: Duration,
    },
    /// Confirmation returned no canonical path and no fallback was given.
    Aborted,
    /// Confirmation matched the current path; nothing to do.
    Unchanged,
}

/// Navigation failures.
#[derive(Debug)]
pub enum NavigationError {
    /// The confirmation request failed; the lock flag has been cleared.
    Confirmation(TransportError),
}

impl fmt::Display for NavigationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationError::Confirmation(e) => write!(f, "navigation confirmation failed: {e}"),
        }
    }
}

impl std::error::Error for NavigationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NavigationError::Confirmation(e) => Some(e),
        }
    }
}

/// Result type for navigation operations.
pub type NavigationResult<T> = Result<T, NavigationError>;

/// Decides between redirect, reload and no-op for the frame tree's top window.
pub struct NavigationCoordinator {
    ctx: Rc<AppContext>,
    window: Rc<dyn WindowHost>,
    transport: Rc<dyn Transport>,
}

impl NavigationCoordinator {
    /// `window` is the caller's own window; the coordinator acts on its top.
    #[must_use]
    pub fn new(ctx: Rc<AppContext>, window: Rc<dyn WindowHost>, transport: Rc<dyn Transport>) -> Self {
        Self {
            ctx,
            window,
            transport,
        }
    }

    /// The window navigation is applied to.
    #[must_use]
    pub fn target(&self) -> Rc<dyn WindowHost> {
        top_window(Rc::clone(&self.window))
    }

    pub fn reload_or_redirect(&self, request: NavigationRequest) -> NavigationResult<NavigationOutcome> {
        let target = self.target();
        let url = request.url().map(str::to_owned);

        if !request.confirm_via_server {
            return Ok(schedule(target.as_ref(), url, request.delay));
        }

        let canonical = self.confirm(target.as_ref())?;

        let next = if canonical.is_empty() && url.is_none() {
            // TODO: confirm with product whether an empty canonical path should
            // surface to the user instead of aborting silently.
            tracing::debug!("no canonical path and no fallback url, aborting");
            return Ok(NavigationOutcome::Aborted);
        } else if !canonical.is_empty() && canonical != target.pathname() {
            NavigationRequest::redirect(canonical)
        } else if url.as_deref() == Some(REFRESH_PAGE) {
            NavigationRequest::reload()
        } else if let Some(url) = url {
            NavigationRequest::redirect(url)
        } else {
            return Ok(NavigationOutcome::Unchanged);
        };

        self.reload_or_redirect(next)
    }

    fn confirm(&self, target: &dyn WindowHost) -> NavigationResult<String> {
        let resource = &self.ctx.config().request;
        let response = {
            let lock = target.lock();
            let _guard = lock.hold();
            self.transport.get(
                &resource.url,
                &[("model", resource.model.as_str()), ("pk", resource.pk.as_str())],
            )
        };
        response.map_err(|e| {
            self.ctx.report(&e);
            NavigationError::Confirmation(e)
        })
    }
}

fn schedule(target: &dyn WindowHost, url: Option<String>, delay: Duration) -> NavigationOutcome {
    target.set_timeout(delay, NavigationTask::new(url.clone()));
    NavigationOutcome::Scheduled { url, delay }
}

impl fmt::Debug for NavigationCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationCoordinator")
            .field("target_href", &self.target().href())
            .finish()
    }
}

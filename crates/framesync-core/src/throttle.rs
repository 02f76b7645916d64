#![forbid(unsafe_code)]

//! At-most-once-per-window throttling.
//!
//! # Decision Rule
//!
//! On each `call(now, args)`:
//!
//! 1) A trailing deadline that elapsed without a `tick` is dropped; this call
//!    supersedes it with its own arguments.
//! 2) With `leading = false` and no open window, the window opens at `now`.
//! 3) If no window is open, the window has elapsed (`now - previous ≥ wait`),
//!    or the clock went backwards, **run now** and restart the window.
//! 4) Otherwise keep `args` as the latest coalesced arguments and, with
//!    `trailing`, arm a single deadline at the window end.
//!
//! `leading = false, trailing = false` never runs `action`.
//!
//! # Invariants
//!
//! - `action` runs at most once per `wait` window.
//! - A trailing execution always uses the most recent coalesced arguments.
//! - `call` returns the result of the most recent execution, which stays
//!   stale until the next one.

use core::time::Duration;

/// Options for [`throttle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleOptions {
    /// Run on the leading edge of a window.
    pub leading: bool,
    /// Run once on the trailing edge with the latest coalesced arguments.
    pub trailing: bool,
}

impl Default for ThrottleOptions {
    fn default() -> Self {
        Self {
            leading: true,
            trailing: true,
        }
    }
}

impl ThrottleOptions {
    #[must_use]
    pub fn with_leading(mut self, leading: bool) -> Self {
        self.leading = leading;
        self
    }

    #[must_use]
    pub fn with_trailing(mut self, trailing: bool) -> Self {
        self.trailing = trailing;
        self
    }

    /// Both edges disabled: the wrapper is inert.
    #[must_use]
    pub const fn is_inert(&self) -> bool {
        !self.leading && !self.trailing
    }
}

/// Throttled wrapper around `action`. See [`throttle`].
pub struct Throttled<F, A, R> {
    action: F,
    wait: Duration,
    opts: ThrottleOptions,
    /// Start of the current window.
    previous: Option<Duration>,
    deadline: Option<Duration>,
    pending: Option<A>,
    result: Option<R>,
    executions: u64,
}

/// Wrap `action` so it runs at most once per `wait`.
pub fn throttle<F, A, R>(action: F, wait: Duration, opts: ThrottleOptions) -> Throttled<F, A, R>
where
    F: FnMut(A) -> R,
{
    Throttled {
        action,
        wait,
        opts,
        previous: None,
        deadline: None,
        pending: None,
        result: None,
        executions: 0,
    }
}

impl<F, A, R> Throttled<F, A, R>
where
    F: FnMut(A) -> R,
    R: Clone,
{
    /// Invoke the wrapper at monotonic time `now`.
    ///
    /// Returns the result of the most recent actual execution, `None` if
    /// `action` has never run.
    pub fn call(&mut self, now: Duration, args: A) -> Option<R> {
        if self.opts.is_inert() {
            return None;
        }

        // A trailing edge the host never ticked is superseded by this call.
        if self.deadline.is_some_and(|deadline| deadline <= now) {
            self.deadline = None;
            self.pending = None;
        }

        if self.previous.is_none() && !self.opts.leading {
            self.previous = Some(now);
        }

        let run_now = match self.previous {
            None => true,
            Some(previous) => now < previous || now - previous >= self.wait,
        };

        if run_now {
            self.deadline = None;
            self.pending = None;
            self.previous = Some(now);
            self.execute(args);
        } else if self.opts.trailing {
            self.pending = Some(args);
            if self.deadline.is_none() {
                let start = self.previous.unwrap_or(now);
                self.deadline = Some(start.saturating_add(self.wait));
            }
        }

        self.result.clone()
    }

    /// Fire the trailing execution if its deadline has been reached.
    ///
    /// Returns `true` if `action` ran.
    pub fn tick(&mut self, now: Duration) -> bool {
        let Some(deadline) = self.deadline else {
            return false;
        };
        if deadline > now {
            return false;
        }

        self.previous = if self.opts.leading {
            Some(deadline)
        } else {
            None
        };
        self.deadline = None;

        match self.pending.take() {
            Some(args) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(deadline_ms = deadline.as_millis() as u64, "throttle trailing edge");
                self.execute(args);
                true
            }
            None => false,
        }
    }

    fn execute(&mut self, args: A) {
        self.result = Some((self.action)(args));
        self.executions += 1;
    }

    /// Result of the most recent execution.
    #[must_use]
    pub fn last_result(&self) -> Option<&R> {
        self.result.as_ref()
    }

    /// Number of times `action` has run.
    #[must_use]
    pub fn executions(&self) -> u64 {
        self.executions
    }

    /// Drop the trailing execution and close the current window.
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.pending = None;
        self.previous = None;
    }

    /// When the host must call [`tick`](Self::tick) next.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.deadline
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }
}

impl<F, A, R> core::fmt::Debug for Throttled<F, A, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Throttled")
            .field("wait", &self.wait)
            .field("opts", &self.opts)
            .field("previous", &self.previous)
            .field("deadline", &self.deadline)
            .field("executions", &self.executions)
            .finish()
    }
}

#![forbid(unsafe_code)]

//! Trailing-edge (or leading-edge with `immediate`) debouncing.
//!
//! # Usage
//!
//! ```
//! use core::time::Duration;
//! use framesync_core::debounce::{DebounceOptions, debounce};
//!
//! let mut seen = Vec::new();
//! let mut save = debounce(
//!     |value: u32| seen.push(value),
//!     Duration::from_millis(30),
//!     DebounceOptions::default(),
//! );
//!
//! save.call(Duration::from_millis(0), 1);
//! save.call(Duration::from_millis(10), 2);
//! save.call(Duration::from_millis(20), 3);
//!
//! assert!(!save.tick(Duration::from_millis(49)));
//! assert!(save.tick(Duration::from_millis(50)));
//! drop(save);
//! assert_eq!(seen, vec![3]);
//! ```
//!
//! # Invariants
//!
//! - Every `call` cancels the pending deadline and schedules `now + wait`.
//! - Without `immediate`, only the last call of a burst runs, with its own
//!   arguments, when its deadline is reached.
//! - With `immediate`, the first call of a quiet window runs synchronously.
//!   Later calls in the window only push the deadline out; reaching the
//!   deadline reopens the window and runs nothing.

use core::time::Duration;

/// Options for [`debounce`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebounceOptions {
    /// Run on the leading edge of a quiet window instead of the trailing edge.
    pub immediate: bool,
}

impl DebounceOptions {
    /// Leading-edge debouncing.
    #[must_use]
    pub const fn immediate() -> Self {
        Self { immediate: true }
    }
}

/// Debounced wrapper around `action`. See [`debounce`].
pub struct Debounced<F, A> {
    action: F,
    wait: Duration,
    immediate: bool,
    deadline: Option<Duration>,
    pending: Option<A>,
}

/// Wrap `action` so that a burst of calls closer than `wait` apart collapses
/// into a single execution.
pub fn debounce<F, A>(action: F, wait: Duration, opts: DebounceOptions) -> Debounced<F, A>
where
    F: FnMut(A),
{
    Debounced {
        action,
        wait,
        immediate: opts.immediate,
        deadline: None,
        pending: None,
    }
}

impl<F, A> Debounced<F, A>
where
    F: FnMut(A),
{
    /// Invoke the wrapper at monotonic time `now`.
    ///
    /// Returns `true` if `action` ran synchronously (only possible with
    /// `immediate`). A deadline that already elapsed is honored first, so a
    /// host that ticks late still observes the same sequence of executions.
    pub fn call(&mut self, now: Duration, args: A) -> bool {
        self.tick(now);

        let call_now = self.immediate && self.deadline.is_none();
        self.deadline = Some(now.saturating_add(self.wait));

        if call_now {
            (self.action)(args);
            return true;
        }
        if !self.immediate {
            self.pending = Some(args);
        }
        false
    }

    /// Fire the scheduled execution if its deadline has been reached.
    ///
    /// Returns `true` if `action` ran.
    pub fn tick(&mut self, now: Duration) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                match self.pending.take() {
                    Some(args) => {
                        #[cfg(feature = "tracing")]
                        tracing::trace!(deadline_ms = deadline.as_millis() as u64, "debounce fired");
                        (self.action)(args);
                        true
                    }
                    None => false,
                }
            }
            _ => false,
        }
    }

    /// Drop the pending execution, if any.
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.pending = None;
    }

    /// When the host must call [`tick`](Self::tick) next.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Whether a deadline is armed.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    #[must_use]
    pub fn wait(&self) -> Duration {
        self.wait
    }
}

impl<F, A> core::fmt::Debug for Debounced<F, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Debounced")
            .field("wait", &self.wait)
            .field("immediate", &self.immediate)
            .field("deadline", &self.deadline)
            .field("has_pending_args", &self.pending.is_some())
            .finish()
    }
}

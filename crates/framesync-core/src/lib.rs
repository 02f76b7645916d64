#![forbid(unsafe_code)]

//! Core: monotonic clocks and rate limiters.
//!
//! The rate limiters in this crate never own a real timer. Each wrapper keeps
//! its own deadline and the host drives it:
//!
//! - [`Debounced::call`] / [`Throttled::call`] take the current monotonic time.
//! - [`Debounced::tick`] / [`Throttled::tick`] fire a due trailing execution.
//! - `next_deadline()` tells the host when the next `tick` is needed.
//!
//! This keeps every wrapper deterministic and usable on `wasm32-unknown-unknown`,
//! where the host maps deadlines onto `setTimeout`.

pub mod clock;
pub mod debounce;
pub mod throttle;

pub use clock::{DeterministicClock, MonotonicClock, SystemClock};
pub use debounce::{DebounceOptions, Debounced, debounce};
pub use throttle::{ThrottleOptions, Throttled, throttle};

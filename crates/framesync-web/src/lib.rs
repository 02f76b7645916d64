#![forbid(unsafe_code)]

//! Browser bindings for framesync.
//!
//! This crate is host-specific (web/WASM). It adapts the browser to the
//! runtime's seams and exports a small `wasm-bindgen` surface:
//! - `BrowserStorage`: `window.localStorage` as a `LocalStore`,
//! - `XhrTransport`: synchronous `XMLHttpRequest` as a `Transport`,
//! - `BrowserWindow`: a window or frame as a `WindowHost`,
//! - `FrameSync`: the JS-facing facade over the settings store, the
//!   navigation coordinator and a debounced settings queue.

pub mod request;

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::{BrowserStorage, BrowserWindow, FrameSync, XhrTransport};

/// Native builds compile this crate as a stub so `cargo check --workspace` stays
/// green on non-wasm targets.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default)]
pub struct FrameSync;

#[cfg(not(target_arch = "wasm32"))]
impl FrameSync {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}

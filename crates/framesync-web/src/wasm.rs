#![forbid(unsafe_code)]

use core::time::Duration;
use std::rc::Rc;

use framesync_core::{DebounceOptions, Debounced, MonotonicClock, SystemClock, debounce};
use framesync_runtime::{
    AppContext, LocalStore, LockFlag, LockState, Loader, Message, Messages, NavigationCoordinator,
    NavigationOutcome, NavigationRequest, NavigationTask, Settings, SettingsStore, StorageError,
    StorageResult, StorageSelector, SyncConfig, Transport, TransportError, TransportResult,
    WindowHost, top_window,
};
use js_sys::{Function, Object, Reflect};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Storage, Window, XmlHttpRequest};

use crate::request::{
    FORM_CONTENT_TYPE, REQUESTED_WITH, encode_pairs, is_success, timeout_millis, with_query,
};

/// Property on the top-level window holding the shared lock flag.
const LOCK_PROPERTY: &str = "__framesyncLocked";

/// Quiet period of [`FrameSync::queue_settings`].
const QUEUE_WAIT: Duration = Duration::from_millis(300);

fn describe(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    match value.dyn_ref::<js_sys::Error>() {
        Some(error) => String::from(error.message()),
        None => format!("{value:?}"),
    }
}

fn to_js(error: impl core::fmt::Display) -> JsValue {
    js_sys::Error::new(&error.to_string()).into()
}

fn encode_uri(text: &str) -> String {
    String::from(js_sys::encode_uri_component(text))
}

// ─────────────────────────────────────────────────────────────────────────────
// localStorage
// ─────────────────────────────────────────────────────────────────────────────

/// `window.localStorage` as a [`LocalStore`].
///
/// A window whose storage cannot be obtained (disabled, sandboxed iframe)
/// yields a store whose every operation fails, so the probe reports it
/// unusable.
pub struct BrowserStorage {
    storage: Option<Storage>,
}

impl BrowserStorage {
    pub fn local(window: &Window) -> Self {
        let storage = match window.local_storage() {
            Ok(storage) => storage,
            Err(e) => {
                tracing::debug!(error = %describe(&e), "localStorage access denied");
                None
            }
        };
        Self { storage }
    }

    fn storage(&self) -> StorageResult<&Storage> {
        self.storage
            .as_ref()
            .ok_or_else(|| StorageError::Unavailable("localStorage is not accessible".into()))
    }
}

fn unavailable(e: JsValue) -> StorageError {
    StorageError::Unavailable(describe(&e))
}

impl LocalStore for BrowserStorage {
    fn name(&self) -> &str {
        "LocalStorage"
    }

    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        self.storage()?.get_item(key).map_err(unavailable)
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.storage()?.set_item(key, value).map_err(unavailable)
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.storage()?.remove_item(key).map_err(unavailable)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Synchronous XHR
// ─────────────────────────────────────────────────────────────────────────────

/// Blocking [`Transport`] over synchronous `XMLHttpRequest`.
#[derive(Debug, Default, Clone, Copy)]
pub struct XhrTransport;

impl XhrTransport {
    pub fn new() -> Self {
        Self
    }

    fn send(&self, method: &str, url: &str, body: Option<&str>) -> TransportResult<String> {
        let network = |e: JsValue| TransportError::network(describe(&e));

        let xhr = XmlHttpRequest::new().map_err(network)?;
        xhr.open_with_async(method, url, false).map_err(network)?;
        xhr.set_request_header(REQUESTED_WITH.0, REQUESTED_WITH.1)
            .map_err(network)?;
        if body.is_some() {
            xhr.set_request_header("Content-Type", FORM_CONTENT_TYPE)
                .map_err(network)?;
        }
        xhr.send_with_opt_str(body).map_err(network)?;

        let status = xhr.status().map_err(network)?;
        let text = xhr.response_text().map_err(network)?.unwrap_or_default();
        if is_success(status) {
            Ok(text)
        } else {
            let status_text = xhr.status_text().unwrap_or_default();
            Err(TransportError::new(status, status_text, text))
        }
    }
}

impl Transport for XhrTransport {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> TransportResult<String> {
        let url = with_query(url, &encode_pairs(query, encode_uri));
        self.send("GET", &url, None)
    }

    fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> TransportResult<String> {
        let body = encode_pairs(fields, encode_uri);
        self.send("POST", url, Some(&body))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Windows
// ─────────────────────────────────────────────────────────────────────────────

/// Lock state stored as a property of a window, visible to every frame that
/// can reach that window.
struct WindowLockState {
    window: Window,
}

impl LockState for WindowLockState {
    fn get(&self) -> bool {
        Reflect::get(self.window.as_ref(), &JsValue::from_str(LOCK_PROPERTY))
            .ok()
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    fn set(&self, locked: bool) {
        let stored = Reflect::set(
            self.window.as_ref(),
            &JsValue::from_str(LOCK_PROPERTY),
            &JsValue::from_bool(locked),
        );
        if let Err(e) = stored {
            tracing::warn!(error = %describe(&e), locked, "failed to store lock flag");
        }
    }
}

/// A browser window or frame as a [`WindowHost`].
#[derive(Debug, Clone)]
pub struct BrowserWindow {
    window: Window,
}

impl BrowserWindow {
    pub fn new(window: Window) -> Self {
        Self { window }
    }
}

impl WindowHost for BrowserWindow {
    fn parent(&self) -> Option<Rc<dyn WindowHost>> {
        let parent = self.window.parent().ok().flatten()?;
        // The top-level window is its own parent.
        if Object::is(parent.as_ref(), self.window.as_ref()) {
            return None;
        }
        Some(Rc::new(BrowserWindow::new(parent)))
    }

    fn lock(&self) -> LockFlag {
        LockFlag::with_state(Rc::new(WindowLockState {
            window: self.window.clone(),
        }))
    }

    fn pathname(&self) -> String {
        self.window.location().pathname().unwrap_or_default()
    }

    fn href(&self) -> String {
        self.window.location().href().unwrap_or_default()
    }

    fn assign(&self, url: &str) {
        if let Err(e) = self.window.location().assign(url) {
            tracing::warn!(%url, error = %describe(&e), "navigation failed");
        }
    }

    fn reload(&self) {
        if let Err(e) = self.window.location().reload() {
            tracing::warn!(error = %describe(&e), "reload failed");
        }
    }

    fn set_timeout(&self, delay: Duration, task: NavigationTask) {
        let target = self.clone();
        let callback = Closure::once_into_js(move || task.run(&target));
        let scheduled = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                callback.unchecked_ref(),
                timeout_millis(delay),
            );
        if let Err(e) = scheduled {
            tracing::warn!(error = %describe(&e), "failed to schedule navigation");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Collaborators
// ─────────────────────────────────────────────────────────────────────────────

/// Forwards messages to `onMessage(text, isError)`.
struct JsMessages {
    callback: Function,
}

impl Messages for JsMessages {
    fn open(&self, message: &Message) {
        let called = self.callback.call2(
            &JsValue::NULL,
            &JsValue::from_str(&message.message),
            &JsValue::from_bool(message.error),
        );
        if let Err(e) = called {
            tracing::warn!(error = %describe(&e), "onMessage hook threw");
        }
    }
}

/// Forwards loader visibility to `showLoader()` / `hideLoader()`.
struct JsLoader {
    show: Function,
    hide: Function,
}

impl Loader for JsLoader {
    fn show_loader(&self) {
        if let Err(e) = self.show.call0(&JsValue::NULL) {
            tracing::warn!(error = %describe(&e), "showLoader hook threw");
        }
    }

    fn hide_loader(&self) {
        if let Err(e) = self.hide.call0(&JsValue::NULL) {
            tracing::warn!(error = %describe(&e), "hideLoader hook threw");
        }
    }
}

fn hook(hooks: &JsValue, name: &str) -> Option<Function> {
    if hooks.is_undefined() || hooks.is_null() {
        return None;
    }
    Reflect::get(hooks, &JsValue::from_str(name))
        .ok()?
        .dyn_into::<Function>()
        .ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// JS Facade
// ─────────────────────────────────────────────────────────────────────────────

type QueuedSave = Debounced<Box<dyn FnMut(Settings)>, Settings>;

/// Settings sync and navigation for one frame.
///
/// Every frame that constructs a `FrameSync` shares the lock flag of its
/// top-level window.
#[wasm_bindgen]
pub struct FrameSync {
    store: Rc<SettingsStore>,
    navigation: NavigationCoordinator,
    clock: SystemClock,
    queued: QueuedSave,
}

#[wasm_bindgen]
impl FrameSync {
    /// `config` is the server-rendered bootstrap JSON. `hooks` may carry
    /// `onMessage(text, isError)`, `showLoader()` and `hideLoader()`.
    #[wasm_bindgen(constructor)]
    pub fn new(config: &str, hooks: JsValue) -> Result<FrameSync, JsValue> {
        let window = web_sys::window().ok_or_else(|| to_js("no global window"))?;
        let config = SyncConfig::from_json(config).map_err(to_js)?;

        let host: Rc<dyn WindowHost> = Rc::new(BrowserWindow::new(window.clone()));
        let mut ctx = AppContext::new(config).with_lock(top_window(Rc::clone(&host)).lock());
        if let Some(callback) = hook(&hooks, "onMessage") {
            ctx = ctx.with_messages(Rc::new(JsMessages { callback }));
        }
        if let (Some(show), Some(hide)) = (hook(&hooks, "showLoader"), hook(&hooks, "hideLoader")) {
            ctx = ctx.with_loader(Rc::new(JsLoader { show, hide }));
        }
        let ctx = ctx.shared();

        let transport: Rc<dyn Transport> = Rc::new(XhrTransport::new());
        let selector = StorageSelector::new(Rc::new(BrowserStorage::local(&window)));
        let store = Rc::new(SettingsStore::select(
            Rc::clone(&ctx),
            &selector,
            Rc::clone(&transport),
        ));
        let navigation = NavigationCoordinator::new(ctx, host, transport);

        let queued_store = Rc::clone(&store);
        let save: Box<dyn FnMut(Settings)> = Box::new(move |partial: Settings| {
            if let Err(e) = queued_store.set_settings(&partial) {
                tracing::warn!(error = %e, "queued settings write failed");
            }
        });

        Ok(FrameSync {
            store,
            navigation,
            clock: SystemClock::new(),
            queued: debounce(save, QUEUE_WAIT, DebounceOptions::default()),
        })
    }

    /// Merge a partial settings object and persist it; returns the stored
    /// object as JSON.
    #[wasm_bindgen(js_name = setSettings)]
    pub fn set_settings(&self, partial: &str) -> Result<String, JsValue> {
        let partial = Settings::parse("setSettings", partial)
            .map_err(to_js)?
            .unwrap_or_default();
        let saved = self.store.set_settings(&partial).map_err(to_js)?;
        Ok(saved.to_json())
    }

    /// Read the persisted settings as JSON.
    #[wasm_bindgen(js_name = getSettings)]
    pub fn get_settings(&self) -> Result<String, JsValue> {
        Ok(self.store.get_settings().map_err(to_js)?.to_json())
    }

    /// Whether settings live in `localStorage` rather than the session.
    #[wasm_bindgen(js_name = isPersistentStorageAvailable)]
    pub fn is_persistent_storage_available(&self) -> bool {
        self.store.backend().is_local()
    }

    /// Whether a remote call is in flight anywhere in the frame tree.
    #[wasm_bindgen(js_name = isLocked)]
    pub fn is_locked(&self) -> bool {
        self.store.context().is_locked()
    }

    /// Reload, redirect or stay put. Returns `"scheduled"`, `"aborted"` or
    /// `"unchanged"`.
    #[wasm_bindgen(js_name = reloadOrRedirect)]
    pub fn reload_or_redirect(
        &self,
        url: Option<String>,
        delay_ms: u32,
        confirm: bool,
    ) -> Result<String, JsValue> {
        let mut request = NavigationRequest {
            target_url: url,
            ..NavigationRequest::default()
        }
        .with_delay(Duration::from_millis(u64::from(delay_ms)));
        if confirm {
            request = request.confirmed();
        }
        let outcome = self.navigation.reload_or_redirect(request).map_err(to_js)?;
        Ok(match outcome {
            NavigationOutcome::Scheduled { .. } => "scheduled",
            NavigationOutcome::Aborted => "aborted",
            NavigationOutcome::Unchanged => "unchanged",
        }
        .to_owned())
    }

    /// Debounced `setSettings`: only the last update of a burst is written.
    ///
    /// Returns the milliseconds until [`tick`](Self::tick) should be called.
    #[wasm_bindgen(js_name = queueSettings)]
    pub fn queue_settings(&mut self, partial: &str) -> Result<f64, JsValue> {
        let partial = Settings::parse("queueSettings", partial)
            .map_err(to_js)?
            .unwrap_or_default();
        let now = self.clock.now_mono();
        self.queued.call(now, partial);
        Ok(self.millis_until_tick(now))
    }

    /// Flush the queued update if its quiet period has elapsed. Returns `true`
    /// when a write happened.
    pub fn tick(&mut self) -> bool {
        self.queued.tick(self.clock.now_mono())
    }

    /// Milliseconds until the queued update is due, `-1` when nothing is
    /// queued.
    #[wasm_bindgen(js_name = nextTickIn)]
    pub fn next_tick_in(&self) -> f64 {
        self.millis_until_tick(self.clock.now_mono())
    }

    fn millis_until_tick(&self, now: Duration) -> f64 {
        match self.queued.next_deadline() {
            Some(deadline) => deadline.saturating_sub(now).as_secs_f64() * 1000.0,
            None => -1.0,
        }
    }
}

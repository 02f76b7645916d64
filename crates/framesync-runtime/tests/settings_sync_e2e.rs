#![forbid(unsafe_code)]

//! End-to-end tests for the settings store against recording backends.
//!
//! Covers both persistence paths, the lock flag protocol, failure reporting
//! and composition with the rate limiters.

mod common;

use core::time::Duration;
use std::rc::Rc;

use common::{CountingStore, RecordingLoader, RecordingMessages, RecordingTransport};
use framesync_core::{DebounceOptions, debounce};
use framesync_runtime::{
    AppContext, LocalStore, Settings, SettingsError, SettingsStore, StorageSelector, SyncConfig,
    TransportError, UnavailableStorage,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn settings(value: Value) -> Settings {
    Settings::from_value(value).unwrap()
}

fn config() -> SyncConfig {
    SyncConfig::new("csrf-token", "/admin/cms/usersettings/")
        .with_defaults(settings(json!({"mode": "edit", "sideframe": {}})))
}

struct Harness {
    ctx: Rc<AppContext>,
    store: SettingsStore,
    transport: Rc<RecordingTransport>,
    messages: Rc<RecordingMessages>,
    loader: Rc<RecordingLoader>,
}

fn harness(local: Rc<dyn LocalStore>) -> Harness {
    let messages = Rc::new(RecordingMessages::default());
    let loader = Rc::new(RecordingLoader::default());
    let ctx = AppContext::new(config())
        .with_messages(messages.clone())
        .with_loader(loader.clone())
        .shared();
    let transport = RecordingTransport::new();
    transport.observe_lock(ctx.lock().clone());
    let selector = StorageSelector::new(local);
    let store = SettingsStore::select(ctx.clone(), &selector, transport.clone());
    Harness {
        ctx,
        store,
        transport,
        messages,
        loader,
    }
}

fn remote_harness() -> Harness {
    harness(Rc::new(UnavailableStorage::new("private browsing")))
}

// ═══════════════════════════════════════════════════════════════════════════
// Local backend
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn local_round_trip_uses_one_key_and_no_network() {
    let local = Rc::new(CountingStore::default());
    let h = harness(local.clone());
    assert!(h.store.backend().is_local());
    local.reset_counts();

    let saved = h.store.set_settings(&settings(json!({"mode": "structure"}))).unwrap();
    assert_eq!(saved, settings(json!({"mode": "structure", "sideframe": {}})));
    assert_eq!(local.writes.get(), 1);

    let read = h.store.get_settings().unwrap();
    assert_eq!(read, saved);
    assert_eq!(local.reads.get(), 1);
    assert_eq!(local.writes.get(), 1);

    assert_eq!(
        local.inner.get_item("cms_cookie").unwrap().as_deref(),
        Some(saved.to_json().as_str())
    );
    assert!(h.transport.calls().is_empty());
    assert!(!h.ctx.is_locked());
}

#[test]
fn local_get_with_nothing_stored_writes_defaults() {
    let local = Rc::new(CountingStore::default());
    let h = harness(local.clone());
    local.reset_counts();

    let read = h.store.get_settings().unwrap();
    assert_eq!(read, config().settings);
    assert_eq!(local.reads.get(), 1);
    assert_eq!(local.writes.get(), 1);
    assert_eq!(*h.ctx.settings(), read);
}

#[test]
fn local_reinitialization_writes_pure_defaults() {
    let local = Rc::new(CountingStore::default());
    let h = harness(local.clone());
    h.store.set_settings(&settings(json!({"session_only": 1}))).unwrap();
    local.inner.remove_item("cms_cookie").unwrap();

    let read = h.store.get_settings().unwrap();

    assert_eq!(read, config().settings);
    assert!(!h.store.current().contains_key("session_only"));
    assert_eq!(
        local.inner.get_item("cms_cookie").unwrap().as_deref(),
        Some(config().settings.to_json().as_str())
    );
}

#[test]
fn local_updates_accumulate_on_canonical_object() {
    let h = harness(Rc::new(CountingStore::default()));

    h.store.set_settings(&settings(json!({"a": 1}))).unwrap();
    let second = h.store.set_settings(&settings(json!({"b": 2}))).unwrap();

    assert_eq!(
        second,
        settings(json!({"mode": "edit", "sideframe": {}, "a": 1, "b": 2}))
    );
    assert_eq!(h.store.current(), second);
}

// ═══════════════════════════════════════════════════════════════════════════
// Remote backend
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn remote_set_posts_form_and_adopts_server_answer() {
    let h = remote_harness();
    assert_eq!(h.store.backend_name(), "RemoteSession");
    h.transport
        .reply_body(r#"{"mode":"structure","sideframe":{},"server_added":true}"#);

    let saved = h.store.set_settings(&settings(json!({"mode": "structure"}))).unwrap();

    assert_eq!(
        saved,
        settings(json!({"mode": "structure", "sideframe": {}, "server_added": true}))
    );
    assert_eq!(*h.ctx.settings(), saved);

    let calls = h.transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, "POST");
    assert_eq!(calls[0].url, "/admin/cms/usersettings/");
    assert_eq!(calls[0].param("csrfmiddlewaretoken"), Some("csrf-token"));
    let posted: Value = serde_json::from_str(calls[0].param("settings").unwrap()).unwrap();
    assert_eq!(posted, json!({"mode": "structure", "sideframe": {}}));
}

#[test]
fn remote_calls_hold_lock_only_while_in_flight() {
    let h = remote_harness();
    h.transport.reply_body(r#"{"a":1}"#).reply_body(r#"{"a":1}"#);

    h.store.set_settings(&settings(json!({"a": 1}))).unwrap();
    h.store.get_settings().unwrap();

    let calls = h.transport.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.locked));
    assert!(!h.ctx.is_locked());
}

#[test]
fn remote_get_returns_server_object_with_one_request() {
    let h = remote_harness();
    h.transport.reply_body(r#"{"mode":"live"}"#);

    let read = h.store.get_settings().unwrap();

    assert_eq!(read, settings(json!({"mode": "live"})));
    let calls = h.transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, "GET");
    assert!(calls[0].params.is_empty());
}

#[test]
fn remote_empty_set_response_yields_defaults() {
    let h = remote_harness();
    h.transport.reply_body("");

    let saved = h.store.set_settings(&settings(json!({"mode": "structure"}))).unwrap();

    assert_eq!(saved, config().settings);
    assert_eq!(*h.ctx.settings(), config().settings);
}

#[test]
fn remote_empty_get_initializes_from_defaults() {
    let h = remote_harness();
    h.transport
        .reply_body("")
        .reply_body(r#"{"mode":"edit","sideframe":{}}"#);

    let read = h.store.get_settings().unwrap();

    assert_eq!(read, config().settings);
    let methods: Vec<_> = h.transport.calls().iter().map(|c| c.method).collect();
    assert_eq!(methods, vec!["GET", "POST"]);
}

#[test]
fn remote_empty_get_posts_pure_defaults() {
    let h = remote_harness();
    h.transport
        .reply_body(r#"{"mode":"structure","session_only":1}"#)
        .reply_body("")
        .reply_body("");
    h.store.set_settings(&settings(json!({"session_only": 1}))).unwrap();

    let read = h.store.get_settings().unwrap();

    assert_eq!(read, config().settings);
    let calls = h.transport.calls();
    assert_eq!(calls.len(), 3);
    let posted: Value = serde_json::from_str(calls[2].param("settings").unwrap()).unwrap();
    assert_eq!(posted, config().settings.into_value());
}

#[test]
fn remote_set_failure_is_reported_and_returns_candidate() {
    let h = remote_harness();
    h.transport.reply(Err(TransportError::new(
        500,
        "Internal Server Error",
        "boom",
    )));

    let saved = h.store.set_settings(&settings(json!({"mode": "structure"}))).unwrap();

    assert_eq!(saved, settings(json!({"mode": "structure", "sideframe": {}})));
    assert!(!h.ctx.is_locked());
    let opened = h.messages.opened.borrow();
    assert_eq!(opened.len(), 1);
    assert!(opened[0].error);
    assert_eq!(opened[0].message, "boom | 500 Internal Server Error");
}

#[test]
fn remote_get_failure_falls_back_to_defaults() {
    let h = remote_harness();
    h.transport
        .reply(Err(TransportError::new(403, "Forbidden", "denied")))
        .reply_body("");

    let read = h.store.get_settings().unwrap();

    assert_eq!(read, config().settings);
    assert_eq!(h.messages.opened.borrow()[0].message, "denied | 403 Forbidden");
    assert_eq!(h.transport.calls().len(), 2);
    assert!(!h.ctx.is_locked());
}

#[test]
fn remote_malformed_payload_is_corruption_and_unlocks() {
    let h = remote_harness();
    let before = h.store.current();
    h.transport.reply_body("<html>login</html>");

    let err = h.store.get_settings().unwrap_err();

    match err {
        SettingsError::Corruption(e) => assert_eq!(e.source_name, "RemoteSession"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!h.ctx.is_locked());
    assert_eq!(h.store.current(), before);
}

// ═══════════════════════════════════════════════════════════════════════════
// Collaborators
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn loader_brackets_every_operation() {
    let h = remote_harness();
    h.transport.reply_body(r#"{"a":1}"#).reply_body(r#"{"a":1}"#);

    h.store.set_settings(&settings(json!({"a": 1}))).unwrap();
    h.store.get_settings().unwrap();

    assert_eq!(
        *h.loader.events.borrow(),
        vec!["show", "hide", "show", "hide"]
    );
}

#[test]
fn loader_hides_after_corruption() {
    let local = Rc::new(CountingStore::default());
    local.inner.set_item("cms_cookie", "[]").unwrap();
    let h = harness(local);

    assert!(h.store.get_settings().is_err());
    assert_eq!(*h.loader.events.borrow(), vec!["show", "hide"]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Composition
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn debounced_writes_persist_last_update_once() {
    let local = Rc::new(CountingStore::default());
    let h = harness(local.clone());
    local.reset_counts();

    let mut saved = Vec::new();
    let mut save = debounce(
        |partial: Settings| saved.push(h.store.set_settings(&partial).unwrap()),
        Duration::from_millis(100),
        DebounceOptions::default(),
    );

    for (ms, width) in [(0, 300), (20, 320), (40, 340)] {
        save.call(
            Duration::from_millis(ms),
            settings(json!({"sideframe": {"width": width}})),
        );
    }
    assert!(save.tick(Duration::from_millis(140)));
    drop(save);

    assert_eq!(local.writes.get(), 1);
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].get("sideframe"), Some(&json!({"width": 340})));
}

#[test]
fn selection_is_fixed_after_first_probe() {
    let local = Rc::new(CountingStore::default());
    let selector = StorageSelector::new(local.clone());
    assert!(selector.is_persistent_storage_available());
    let probes = local.writes.get();

    for _ in 0..3 {
        assert!(selector.is_persistent_storage_available());
    }
    assert_eq!(local.writes.get(), probes);
}

//! Recording fakes shared by the end-to-end tests.

#![allow(dead_code)]

use core::time::Duration;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use framesync_runtime::{
    LocalStore, LockFlag, Loader, MemoryStorage, Message, Messages, NavigationTask, StorageResult,
    Transport, TransportResult, WindowHost,
};

// ============================================================================
// Transport
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub method: &'static str,
    pub url: String,
    pub params: Vec<(String, String)>,
    /// Lock flag state observed while the call was in flight.
    pub locked: bool,
}

impl Call {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Replies from a queue (empty body once exhausted) and records every call.
#[derive(Default)]
pub struct RecordingTransport {
    replies: RefCell<VecDeque<TransportResult<String>>>,
    calls: RefCell<Vec<Call>>,
    observed_lock: RefCell<Option<LockFlag>>,
}

impl RecordingTransport {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn reply(&self, reply: TransportResult<String>) -> &Self {
        self.replies.borrow_mut().push_back(reply);
        self
    }

    pub fn reply_body(&self, body: &str) -> &Self {
        self.reply(Ok(body.to_owned()))
    }

    pub fn observe_lock(&self, lock: LockFlag) {
        *self.observed_lock.borrow_mut() = Some(lock);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn record(&self, method: &'static str, url: &str, params: &[(&str, &str)]) -> TransportResult<String> {
        let locked = self
            .observed_lock
            .borrow()
            .as_ref()
            .is_some_and(LockFlag::is_locked);
        self.calls.borrow_mut().push(Call {
            method,
            url: url.to_owned(),
            params: params
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            locked,
        });
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

impl Transport for RecordingTransport {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> TransportResult<String> {
        self.record("GET", url, query)
    }

    fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> TransportResult<String> {
        self.record("POST", url, fields)
    }
}

// ============================================================================
// Collaborators
// ============================================================================

#[derive(Default)]
pub struct RecordingMessages {
    pub opened: RefCell<Vec<Message>>,
}

impl Messages for RecordingMessages {
    fn open(&self, message: &Message) {
        self.opened.borrow_mut().push(message.clone());
    }
}

#[derive(Default)]
pub struct RecordingLoader {
    pub events: RefCell<Vec<&'static str>>,
}

impl Loader for RecordingLoader {
    fn show_loader(&self) {
        self.events.borrow_mut().push("show");
    }

    fn hide_loader(&self) {
        self.events.borrow_mut().push("hide");
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Memory storage that counts operations.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStorage,
    pub reads: Cell<u32>,
    pub writes: Cell<u32>,
    pub removes: Cell<u32>,
}

impl CountingStore {
    pub fn reset_counts(&self) {
        self.reads.set(0);
        self.writes.set(0);
        self.removes.set(0);
    }
}

impl LocalStore for CountingStore {
    fn name(&self) -> &str {
        "CountingStore"
    }

    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        self.reads.set(self.reads.get() + 1);
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.writes.set(self.writes.get() + 1);
        self.inner.set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.removes.set(self.removes.get() + 1);
        self.inner.remove_item(key)
    }
}

// ============================================================================
// Windows
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    Assign(String),
    Reload,
}

/// Window that queues timers until [`run_timers`](Self::run_timers).
pub struct RecordingWindow {
    parent: Option<Rc<dyn WindowHost>>,
    pathname: String,
    href: String,
    lock: LockFlag,
    pub events: RefCell<Vec<WindowEvent>>,
    pub timers: RefCell<Vec<(Duration, NavigationTask)>>,
}

impl RecordingWindow {
    pub fn top(origin: &str, pathname: &str) -> Rc<Self> {
        Rc::new(Self {
            parent: None,
            pathname: pathname.to_owned(),
            href: format!("{origin}{pathname}"),
            lock: LockFlag::new(),
            events: RefCell::new(Vec::new()),
            timers: RefCell::new(Vec::new()),
        })
    }

    pub fn frame(parent: Rc<dyn WindowHost>, pathname: &str) -> Rc<Self> {
        Rc::new(Self {
            parent: Some(parent),
            pathname: pathname.to_owned(),
            href: format!("https://cms.example{pathname}"),
            lock: LockFlag::new(),
            events: RefCell::new(Vec::new()),
            timers: RefCell::new(Vec::new()),
        })
    }

    pub fn run_timers(&self) {
        let timers = self.timers.take();
        for (_, task) in timers {
            task.run(self);
        }
    }

    pub fn events(&self) -> Vec<WindowEvent> {
        self.events.borrow().clone()
    }

    pub fn lock_flag(&self) -> LockFlag {
        self.lock.clone()
    }
}

impl WindowHost for RecordingWindow {
    fn parent(&self) -> Option<Rc<dyn WindowHost>> {
        self.parent.clone()
    }

    fn lock(&self) -> LockFlag {
        self.lock.clone()
    }

    fn pathname(&self) -> String {
        self.pathname.clone()
    }

    fn href(&self) -> String {
        self.href.clone()
    }

    fn assign(&self, url: &str) {
        self.events
            .borrow_mut()
            .push(WindowEvent::Assign(url.to_owned()));
    }

    fn reload(&self) {
        self.events.borrow_mut().push(WindowEvent::Reload);
    }

    fn set_timeout(&self, delay: Duration, task: NavigationTask) {
        self.timers.borrow_mut().push((delay, task));
    }
}

//! Shared test helpers for autopilot-core integration tests.
//!
//! Provides a scriptable mock UI, a sink that records every call, and a
//! harness that wires them into an action [`Context`].

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use autopilot_core::action::Context;
use autopilot_core::config::AutopilotConfig;
use autopilot_core::controls::{ControlHandle, ControlPath, ListInfo, UiControls};
use autopilot_core::geometry::Rect;
use autopilot_core::input::{InputEvent, TouchTracker};
use autopilot_core::session::{LogLevel, SessionSink};
use autopilot_core::store::{MemoryStore, SharedStore, StoreError};
use autopilot_core::sync::SyncClient;
use autopilot_core::transform::ScreenMetrics;

// ---------------------------------------------------------------------------
// Mock UI
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MockControl {
    pub rect: Rect,
    pub text: Option<String>,
    pub list: Option<ListInfo>,
}

/// Controls keyed by their full path string. Records every injected event.
#[derive(Debug, Default)]
pub struct MockControls {
    pub metrics: ScreenMetrics,
    pub screen: Option<String>,
    pub controls: Vec<(String, MockControl)>,
    pub events: Vec<InputEvent>,
}

impl MockControls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_control(mut self, path: &str, rect: Rect, text: Option<&str>) -> Self {
        self.controls.push((
            path.to_string(),
            MockControl {
                rect,
                text: text.map(str::to_string),
                list: None,
            },
        ));
        self
    }

    pub fn with_list(mut self, path: &str, rect: Rect, list: ListInfo) -> Self {
        self.controls.push((
            path.to_string(),
            MockControl {
                rect,
                text: None,
                list: Some(list),
            },
        ));
        self
    }

    pub fn remove(&mut self, path: &str) {
        self.controls.retain(|(p, _)| p != path);
    }

    fn get(&self, handle: ControlHandle) -> Option<&MockControl> {
        self.controls.get(handle.0 as usize).map(|(_, c)| c)
    }
}

impl UiControls for MockControls {
    fn screen_metrics(&self) -> ScreenMetrics {
        self.metrics
    }

    fn current_screen(&self) -> Option<String> {
        self.screen.clone()
    }

    fn find_control(&self, path: &ControlPath) -> Option<ControlHandle> {
        let key = path.to_string();
        self.controls
            .iter()
            .position(|(p, _)| *p == key)
            .map(|i| ControlHandle(i as u64))
    }

    fn control_rect(&self, handle: ControlHandle) -> Option<Rect> {
        self.get(handle).map(|c| c.rect)
    }

    fn text(&self, handle: ControlHandle) -> Option<String> {
        self.get(handle).and_then(|c| c.text.clone())
    }

    fn set_text(&mut self, handle: ControlHandle, text: &str) -> bool {
        match self.controls.get_mut(handle.0 as usize) {
            Some((_, control)) => {
                control.text = Some(text.to_string());
                true
            }
            None => false,
        }
    }

    fn list_info(&self, handle: ControlHandle) -> Option<ListInfo> {
        self.get(handle).and_then(|c| c.list.clone())
    }

    fn process_input(&mut self, event: &InputEvent) {
        self.events.push(event.clone());
    }

    fn screenshot(&mut self) -> Option<Vec<u8>> {
        Some(b"frame".to_vec())
    }
}

// ---------------------------------------------------------------------------
// Recording sink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    TestStart(String),
    StepStart(String),
    TestStep {
        name: String,
        passed: bool,
        detail: Option<String>,
    },
    Message(LogLevel, String),
    Error(String),
    Screenshot(String, usize),
    Finished,
    ForceQuit(String),
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub calls: Vec<SinkCall>,
}

impl RecordingSink {
    pub fn errors(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                SinkCall::Error(m) => Some(m.as_str()),
                _ => None,
            })
            .collect()
    }

    /// `(name, passed)` of every recorded test step.
    pub fn steps(&self) -> Vec<(&str, bool)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                SinkCall::TestStep { name, passed, .. } => Some((name.as_str(), *passed)),
                _ => None,
            })
            .collect()
    }

    pub fn quit(&self) -> bool {
        self.calls.iter().any(|c| matches!(c, SinkCall::ForceQuit(_)))
    }
}

impl SessionSink for RecordingSink {
    fn on_test_start(&mut self, name: &str) {
        self.calls.push(SinkCall::TestStart(name.to_string()));
    }

    fn on_step_start(&mut self, name: &str) {
        self.calls.push(SinkCall::StepStart(name.to_string()));
    }

    fn on_test_step(&mut self, name: &str, passed: bool, detail: Option<&str>) {
        self.calls.push(SinkCall::TestStep {
            name: name.to_string(),
            passed,
            detail: detail.map(str::to_string),
        });
    }

    fn on_message(&mut self, level: LogLevel, message: &str) {
        self.calls.push(SinkCall::Message(level, message.to_string()));
    }

    fn on_error(&mut self, message: &str) {
        self.calls.push(SinkCall::Error(message.to_string()));
    }

    fn error_count(&self) -> usize {
        self.errors().len()
    }

    fn on_screenshot(&mut self, name: &str, image: &[u8]) {
        self.calls.push(SinkCall::Screenshot(name.to_string(), image.len()));
    }

    fn on_tests_finished(&mut self) {
        self.calls.push(SinkCall::Finished);
    }

    fn force_quit(&mut self, reason: &str) {
        self.calls.push(SinkCall::ForceQuit(reason.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Store that counts round trips
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    pub reads: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl SharedStore for CountingStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.write(key, value)
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.scan(prefix)
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Owns everything a [`Context`] borrows.
pub struct Harness {
    pub controls: MockControls,
    pub touches: TouchTracker,
    pub sink: RecordingSink,
    pub store: MemoryStore,
    pub sync: SyncClient,
    pub config: AutopilotConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_controls(MockControls::new())
    }

    pub fn with_controls(controls: MockControls) -> Self {
        let store = MemoryStore::new();
        let sync = SyncClient::new(Arc::new(store.clone()), "test-run", "master");
        Self {
            controls,
            touches: TouchTracker::new(),
            sink: RecordingSink::default(),
            store,
            sync,
            config: AutopilotConfig::default(),
        }
    }

    pub fn ctx(&mut self) -> Context<'_> {
        Context::new(
            &mut self.controls,
            &mut self.touches,
            &mut self.sink,
            &self.sync,
            &self.config,
        )
    }
}

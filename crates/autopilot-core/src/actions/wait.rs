//! Waiting: fixed delays and condition waits bounded by a timeout.

use crate::action::{lifecycle_accessors, Action, Context, Lifecycle};
use crate::controls::ControlPath;

/// Elapsed-time counter against a limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deadline {
    limit: f32,
    elapsed: f32,
}

impl Deadline {
    pub fn new(limit: f32) -> Self {
        Self {
            limit,
            elapsed: 0.0,
        }
    }

    pub fn advance(&mut self, dt: f32) {
        self.elapsed += dt;
    }

    pub fn expired(&self) -> bool {
        self.elapsed >= self.limit
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn limit(&self) -> f32 {
        self.limit
    }
}

/// Completes once the accumulated tick time reaches the duration.
#[derive(Debug)]
pub struct WaitAction {
    lifecycle: Lifecycle,
    deadline: Deadline,
}

impl WaitAction {
    pub fn new(seconds: f32) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            deadline: Deadline::new(seconds),
        }
    }
}

impl Action for WaitAction {
    fn name(&self) -> &'static str {
        "Wait"
    }

    lifecycle_accessors!();

    fn describe(&self) -> String {
        format!("Wait time={:.2}", self.deadline.limit())
    }

    fn on_update(&mut self, _ctx: &mut Context<'_>, dt: f32) {
        self.deadline.advance(dt);
    }

    fn test_condition(&mut self, _ctx: &mut Context<'_>) -> bool {
        self.deadline.expired()
    }
}

/// A condition polled every tick by [`WaitUntilAction`].
pub trait WaitCondition {
    fn check(&mut self, ctx: &mut Context<'_>) -> bool;

    /// Text used in the timeout report, e.g. `WaitForUI Main/Play`.
    fn label(&self) -> String;
}

/// Completes when its condition holds; on timeout reports
/// `"<label> timeout"` and completes anyway.
#[derive(Debug)]
pub struct WaitUntilAction<C> {
    lifecycle: Lifecycle,
    deadline: Deadline,
    condition: C,
}

impl<C: WaitCondition> WaitUntilAction<C> {
    pub fn new(condition: C, timeout: f32) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            deadline: Deadline::new(timeout),
            condition,
        }
    }
}

impl<C: WaitCondition> Action for WaitUntilAction<C> {
    fn name(&self) -> &'static str {
        "WaitUntil"
    }

    lifecycle_accessors!();

    fn describe(&self) -> String {
        format!("{} timeout={:.2}", self.condition.label(), self.deadline.limit())
    }

    fn on_update(&mut self, _ctx: &mut Context<'_>, dt: f32) {
        self.deadline.advance(dt);
    }

    fn test_condition(&mut self, ctx: &mut Context<'_>) -> bool {
        if self.condition.check(ctx) {
            return true;
        }
        if self.deadline.expired() {
            ctx.report_timeout(&format!("{} timeout", self.condition.label()));
            return true;
        }
        false
    }
}

/// The control at `path` resolves.
#[derive(Debug, Clone)]
pub struct ControlAppears(pub ControlPath);

impl WaitCondition for ControlAppears {
    fn check(&mut self, ctx: &mut Context<'_>) -> bool {
        ctx.controls.find_control(&self.0).is_some()
    }

    fn label(&self) -> String {
        format!("WaitForUI {}", self.0)
    }
}

/// The active screen has the given name.
#[derive(Debug, Clone)]
pub struct ScreenIs(pub String);

impl WaitCondition for ScreenIs {
    fn check(&mut self, ctx: &mut Context<'_>) -> bool {
        ctx.controls.current_screen().as_deref() == Some(self.0.as_str())
    }

    fn label(&self) -> String {
        format!("WaitForScreen {}", self.0)
    }
}

pub type WaitForUiAction = WaitUntilAction<ControlAppears>;
pub type WaitForScreenAction = WaitUntilAction<ScreenIs>;

//! Actions that only talk to the session report.

use crate::action::{lifecycle_accessors, Action, Context, Lifecycle};
use crate::session::LogLevel;

/// Opens a named step; later checks are attributed to it.
#[derive(Debug)]
pub struct StepAction {
    lifecycle: Lifecycle,
    step: String,
}

impl StepAction {
    pub fn new(step: impl Into<String>) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            step: step.into(),
        }
    }
}

impl Action for StepAction {
    fn name(&self) -> &'static str {
        "Step"
    }

    lifecycle_accessors!();

    fn describe(&self) -> String {
        format!("Step {:?}", self.step)
    }

    fn on_execute(&mut self, ctx: &mut Context<'_>) {
        ctx.session.on_step_start(&self.step);
    }
}

#[derive(Debug)]
pub struct LogAction {
    lifecycle: Lifecycle,
    level: LogLevel,
    message: String,
}

impl LogAction {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            level,
            message: message.into(),
        }
    }
}

impl Action for LogAction {
    fn name(&self) -> &'static str {
        "Log"
    }

    lifecycle_accessors!();

    fn on_execute(&mut self, ctx: &mut Context<'_>) {
        ctx.session.on_message(self.level, &self.message);
    }
}

/// Captures the current frame into the report.
#[derive(Debug)]
pub struct ScreenshotAction {
    lifecycle: Lifecycle,
    label: String,
}

impl ScreenshotAction {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            label: label.into(),
        }
    }
}

impl Action for ScreenshotAction {
    fn name(&self) -> &'static str {
        "Screenshot"
    }

    lifecycle_accessors!();

    fn describe(&self) -> String {
        format!("Screenshot {:?}", self.label)
    }

    fn on_execute(&mut self, ctx: &mut Context<'_>) {
        match ctx.controls.screenshot() {
            Some(image) => ctx.session.on_screenshot(&self.label, &image),
            None => ctx.session.on_message(
                LogLevel::Warning,
                &format!("screenshot {:?} not supported by this UI", self.label),
            ),
        }
    }
}

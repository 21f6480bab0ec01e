//! Keyboard input and direct text assignment.

use crate::action::{lifecycle_accessors, Action, Context, Lifecycle};
use crate::controls::ControlPath;
use crate::input::InputEvent;

/// Sends one key-char event.
#[derive(Debug)]
pub struct KeyPressAction {
    lifecycle: Lifecycle,
    key: char,
}

impl KeyPressAction {
    pub fn new(key: char) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            key,
        }
    }
}

impl Action for KeyPressAction {
    fn name(&self) -> &'static str {
        "KeyPress"
    }

    lifecycle_accessors!();

    fn describe(&self) -> String {
        format!("KeyPress key={:?}", self.key)
    }

    fn on_execute(&mut self, ctx: &mut Context<'_>) {
        ctx.submit(InputEvent::key(self.key));
    }
}

/// Replaces the text of the control at `path`.
#[derive(Debug)]
pub struct SetTextAction {
    lifecycle: Lifecycle,
    path: ControlPath,
    text: String,
}

impl SetTextAction {
    pub fn new(path: ControlPath, text: impl Into<String>) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            path,
            text: text.into(),
        }
    }
}

impl Action for SetTextAction {
    fn name(&self) -> &'static str {
        "SetText"
    }

    lifecycle_accessors!();

    fn describe(&self) -> String {
        format!("SetText controlPath={} text={:?}", self.path, self.text)
    }

    fn on_execute(&mut self, ctx: &mut Context<'_>) {
        let Some(handle) = ctx.controls.find_control(&self.path) else {
            ctx.report_error(&format!("SetText: control {} not found", self.path));
            return;
        };
        if !ctx.controls.set_text(handle, &self.text) {
            ctx.report_error(&format!("SetText: control {} does not hold text", self.path));
        }
    }
}

//! Value getters and equality assertions.
//!
//! A getter captures one [`Value`] when it executes. An assertion runs two
//! getters and records a named pass/fail step. A failed comparison is a
//! result, not an error.

use std::fmt;

use tracing::debug;

use crate::action::{lifecycle_accessors, Action, Context, Lifecycle};
use crate::controls::ControlPath;
use crate::session::LogLevel;

/// What a getter produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Bool(bool),
    /// The source had nothing to read, e.g. a control without text.
    Missing,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Missing => f.write_str("<missing>"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Where a getter reads from.
#[derive(Debug, Clone, PartialEq)]
pub enum GetterSource {
    Literal(Value),
    /// Text of a control.
    ControlText(ControlPath),
    /// Whether a control resolves.
    ControlPresent(ControlPath),
    /// Announced state of a device.
    RemoteState(String),
    /// Pending command of a device.
    RemoteCommand(String),
    /// Auxiliary string in the shared store.
    RemoteString(String),
}

impl fmt::Display for GetterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GetterSource::Literal(v) => write!(f, "{}", v),
            GetterSource::ControlText(p) => write!(f, "GetText({})", p),
            GetterSource::ControlPresent(p) => write!(f, "FindControl({})", p),
            GetterSource::RemoteState(d) => write!(f, "ReadState({})", d),
            GetterSource::RemoteCommand(d) => write!(f, "ReadCommand({})", d),
            GetterSource::RemoteString(n) => write!(f, "ReadString({})", n),
        }
    }
}

/// One-shot action that captures a value.
#[derive(Debug)]
pub struct GetterAction {
    lifecycle: Lifecycle,
    source: GetterSource,
    value: Option<Value>,
}

impl GetterAction {
    pub fn new(source: GetterSource) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            source,
            value: None,
        }
    }

    pub fn source(&self) -> &GetterSource {
        &self.source
    }

    /// Captured value, executing the getter first if it has not run.
    pub fn get(&mut self, ctx: &mut Context<'_>) -> Value {
        if self.lifecycle.is_pending() {
            self.execute(ctx);
            self.update(ctx, 0.0);
        }
        self.value.clone().unwrap_or(Value::Missing)
    }

    fn read(&self, ctx: &mut Context<'_>) -> Value {
        match &self.source {
            GetterSource::Literal(v) => v.clone(),
            GetterSource::ControlText(path) => {
                let Some(handle) = ctx.controls.find_control(path) else {
                    debug!(path = %path, "getter: control not found");
                    ctx.session
                        .on_message(LogLevel::Debug, &format!("Control {} not found", path));
                    return Value::Missing;
                };
                ctx.controls
                    .text(handle)
                    .map(Value::Text)
                    .unwrap_or(Value::Missing)
            }
            GetterSource::ControlPresent(path) => {
                Value::Bool(ctx.controls.find_control(path).is_some())
            }
            GetterSource::RemoteState(device) => Value::Text(ctx.sync.read_state(device)),
            GetterSource::RemoteCommand(device) => Value::Text(ctx.sync.read_command(device)),
            GetterSource::RemoteString(name) => Value::Text(ctx.sync.read_string(name)),
        }
    }
}

impl Action for GetterAction {
    fn name(&self) -> &'static str {
        "Getter"
    }

    lifecycle_accessors!();

    fn describe(&self) -> String {
        format!("Getter {}", self.source)
    }

    fn on_execute(&mut self, ctx: &mut Context<'_>) {
        self.value = Some(self.read(ctx));
    }
}

/// Compares an expected and an actual getter and records a test step.
#[derive(Debug)]
pub struct AssertAction {
    lifecycle: Lifecycle,
    message: String,
    expected: GetterAction,
    actual: GetterAction,
}

impl AssertAction {
    pub fn new(message: impl Into<String>, expected: GetterSource, actual: GetterSource) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            message: message.into(),
            expected: GetterAction::new(expected),
            actual: GetterAction::new(actual),
        }
    }
}

impl Action for AssertAction {
    fn name(&self) -> &'static str {
        "Assert"
    }

    lifecycle_accessors!();

    fn describe(&self) -> String {
        format!(
            "Assert {:?} expected={} actual={}",
            self.message,
            self.expected.source(),
            self.actual.source()
        )
    }

    fn on_execute(&mut self, ctx: &mut Context<'_>) {
        let expected = self.expected.get(ctx);
        let actual = self.actual.get(ctx);
        let passed = expected == actual;
        let detail = (!passed).then(|| {
            format!(
                "{}: expected {} ({}), actual {} ({})",
                self.message,
                expected,
                self.expected.source(),
                actual,
                self.actual.source()
            )
        });
        ctx.session
            .on_test_step(&self.message, passed, detail.as_deref());
        if !passed && ctx.config.stop_on_failed_step {
            ctx.force_quit(&format!("step failed: {}", self.message));
        }
    }
}

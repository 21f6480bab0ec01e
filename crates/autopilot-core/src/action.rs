//! The action abstraction and the context actions run against.
//!
//! Every scripted unit of behavior implements [`Action`]. An action moves
//! through three states, forward only:
//!
//! ```text
//! Pending --execute--> Executing --update*--> Done
//! ```
//!
//! `execute` runs once and performs whatever happens at the start of the
//! action. `update` is then called once per tick; after each call the
//! action's [`Action::test_condition`] decides whether it is done. The default
//! condition is "always", so instantaneous actions complete on their first
//! update. An action that cannot do its job reports through the session sink
//! on the [`Context`] and calls [`Lifecycle::finish`]; nothing is returned to
//! the scheduler.

use tracing::debug;

use crate::config::AutopilotConfig;
use crate::controls::{ControlPath, UiControls};
use crate::geometry::Point;
use crate::input::{InputEvent, InputPhase, TouchTracker};
use crate::session::{LogLevel, SessionSink};
use crate::sync::SyncClient;
use crate::transform;

/// Lifecycle position of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionState {
    /// Not yet executed.
    #[default]
    Pending,
    /// Executed; updated every tick until its condition holds.
    Executing,
    Done,
}

/// Forward-only state holder embedded in every action.
#[derive(Debug, Default)]
pub struct Lifecycle {
    state: ActionState,
}

impl Lifecycle {
    /// A lifecycle in [`ActionState::Pending`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == ActionState::Pending
    }

    pub fn is_executing(&self) -> bool {
        self.state == ActionState::Executing
    }

    pub fn is_done(&self) -> bool {
        self.state == ActionState::Done
    }

    fn begin(&mut self) {
        if self.state == ActionState::Pending {
            self.state = ActionState::Executing;
        }
    }

    /// Marks the action done. Done is terminal.
    pub fn finish(&mut self) {
        self.state = ActionState::Done;
    }
}

/// Everything an action may touch during one tick.
pub struct Context<'a> {
    pub controls: &'a mut dyn UiControls,
    pub touches: &'a mut TouchTracker,
    pub session: &'a mut dyn SessionSink,
    pub sync: &'a SyncClient,
    pub config: &'a AutopilotConfig,
    quit: Option<String>,
}

impl<'a> Context<'a> {
    pub fn new(
        controls: &'a mut dyn UiControls,
        touches: &'a mut TouchTracker,
        session: &'a mut dyn SessionSink,
        sync: &'a SyncClient,
        config: &'a AutopilotConfig,
    ) -> Self {
        Self {
            controls,
            touches,
            session,
            sync,
            config,
            quit: None,
        }
    }

    /// Records an error, followed by a screenshot named `error_<n>` when the
    /// UI can take one.
    pub fn report_error(&mut self, message: &str) {
        self.session.on_error(message);
        self.error_screenshot();
    }

    /// Reports an elapsed wait; ends the session when timeouts are fatal.
    pub fn report_timeout(&mut self, message: &str) {
        self.report_error(message);
        if self.config.fatal_on_timeout {
            self.force_quit(message);
        }
    }

    fn error_screenshot(&mut self) {
        if let Some(image) = self.controls.screenshot() {
            let name = format!("error_{}", self.session.error_count());
            self.session.on_screenshot(&name, &image);
        }
    }

    pub fn report_warning(&mut self, message: &str) {
        self.session.on_message(LogLevel::Warning, message);
    }

    pub fn force_quit(&mut self, reason: &str) {
        if self.quit.is_none() {
            self.session.force_quit(reason);
            self.quit = Some(reason.to_string());
        }
    }

    /// Reason given to [`Context::force_quit`], if it was called.
    pub fn quit_reason(&self) -> Option<&str> {
        self.quit.as_deref()
    }

    pub fn to_physical(&self, point: Point) -> Point {
        transform::to_physical(&self.controls.screen_metrics(), point)
    }

    pub fn to_virtual(&self, point: Point) -> Point {
        transform::to_virtual(&self.controls.screen_metrics(), point)
    }

    /// Updates touch bookkeeping, then hands the event to the UI.
    pub fn submit(&mut self, event: InputEvent) {
        debug!(phase = ?event.phase, id = event.touch_id, point = %event.point, "inject");
        self.touches.record(&event);
        self.controls.process_input(&event);
    }

    /// Builds a touch event at a virtual point. The stored virtual point is the
    /// round trip through physical space, matching what the device would report.
    pub fn touch_event(&self, phase: InputPhase, id: i32, point: Point) -> InputEvent {
        let physical = self.to_physical(point);
        InputEvent::touch(phase, id, self.to_virtual(physical), physical)
    }

    /// Center of the control at `path` plus `offset`; reports an error when it
    /// does not resolve.
    pub fn control_point(&mut self, path: &ControlPath, offset: Point) -> Option<Point> {
        match self.controls.find_control_position(path) {
            Some(p) => Some(p + offset),
            None => {
                self.report_error(&format!("Control {} not found", path));
                None
            }
        }
    }

    pub fn touch_down(&mut self, id: i32, point: Point) {
        let event = self.touch_event(InputPhase::Began, id, point);
        self.submit(event);
    }

    /// Drag when `id` is down, hover otherwise (or nothing without hover support).
    pub fn touch_move(&mut self, id: i32, point: Point) {
        let phase = if self.touches.is_down(id) {
            InputPhase::Drag
        } else if self.config.hover_supported {
            InputPhase::Move
        } else {
            debug!(id, point = %point, "hover not supported");
            self.report_warning("TouchAction::TouchMove no touch down, move ignored");
            return;
        };
        let event = self.touch_event(phase, id, point);
        self.submit(event);
    }

    /// Lifts `id`. Without a matching down the event is still sent from the
    /// last pointer position.
    pub fn touch_up(&mut self, id: i32) {
        let mut event = match self.touches.find(id) {
            Some(record) => InputEvent::touch(InputPhase::Ended, id, record.point, record.physical),
            None => {
                debug!(id, "touch up without record");
                self.report_warning("TouchAction::TouchUp touch down not found");
                let point = self.touches.pointer();
                self.touch_event(InputPhase::Ended, id, point)
            }
        };
        event.phase = InputPhase::Ended;
        self.submit(event);
    }
}

/// A scripted unit of behavior.
pub trait Action {
    /// Short static name for logs.
    fn name(&self) -> &'static str;

    fn lifecycle(&self) -> &Lifecycle;

    fn lifecycle_mut(&mut self) -> &mut Lifecycle;

    /// Side effects at the start of the action.
    fn on_execute(&mut self, _ctx: &mut Context<'_>) {}

    /// Per-tick progress, before the completion check.
    fn on_update(&mut self, _ctx: &mut Context<'_>, _dt: f32) {}

    fn test_condition(&mut self, _ctx: &mut Context<'_>) -> bool {
        true
    }

    /// Name plus parameters, for logs and reports.
    fn describe(&self) -> String {
        self.name().to_string()
    }

    /// Runs the start of the action. Has no effect unless pending.
    fn execute(&mut self, ctx: &mut Context<'_>) {
        if !self.lifecycle().is_pending() {
            return;
        }
        debug!(action = %self.describe(), "execute");
        self.lifecycle_mut().begin();
        self.on_execute(ctx);
    }

    /// Advances the action by `dt` seconds. Has no effect unless executing.
    fn update(&mut self, ctx: &mut Context<'_>, dt: f32) {
        if !self.lifecycle().is_executing() {
            return;
        }
        self.on_update(ctx, dt);
        if self.lifecycle().is_executing() && self.test_condition(ctx) {
            debug!(action = self.name(), "done");
            self.lifecycle_mut().finish();
        }
    }

    fn is_executed(&self) -> bool {
        self.lifecycle().is_done()
    }
}

/// Actions that drive one touch id and may take part in a multitouch gesture.
pub trait TouchAction: Action {
    fn touch_id(&self) -> i32;
}

/// Implements the two lifecycle accessors for a struct with a `lifecycle` field.
macro_rules! lifecycle_accessors {
    () => {
        fn lifecycle(&self) -> &$crate::action::Lifecycle {
            &self.lifecycle
        }

        fn lifecycle_mut(&mut self) -> &mut $crate::action::Lifecycle {
            &mut self.lifecycle
        }
    };
}

pub(crate) use lifecycle_accessors;

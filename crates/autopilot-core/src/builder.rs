//! The scripting surface: turns primitive calls into queued actions.
//!
//! Script front ends (the YAML loader, or code embedding the engine) call
//! these methods in script order. Problems with a statement are collected as
//! issues and the statement is skipped; the engine reports the issues when the
//! run starts.
//!
//! Between [`ScriptBuilder::begin_multitouch`] and
//! [`ScriptBuilder::end_multitouch`], touch statements are collected into one
//! [`MultitouchAction`] instead of being queued one by one.

use tracing::debug;

use crate::action::{Action, TouchAction};
use crate::actions::{
    AssertAction, ControlAppears, GetterSource, HelperSet, KeyPressAction, LogAction, MoveTarget,
    MultitouchAction, PublishAction, RendezvousAction, RendezvousCondition, ScreenIs,
    ScreenshotAction, ScrollControlAction, SetTextAction, StepAction, SyncTarget, TouchDownAction,
    TouchMoveAction, TouchTarget, TouchUpAction, Value, WaitAction, WaitUntilAction,
};
use crate::config::AutopilotConfig;
use crate::controls::ControlPath;
use crate::geometry::Point;
use crate::session::LogLevel;
use crate::sync::READY;

/// Pause after a screen switch so the first frame of the new screen is skipped.
const SCREEN_SETTLE: f32 = 0.01;

/// Finished list of actions plus the problems found while building it.
pub struct Script {
    pub actions: Vec<Box<dyn Action>>,
    pub issues: Vec<String>,
}

impl std::fmt::Debug for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.actions.iter().map(|a| a.name()).collect();
        f.debug_struct("Script")
            .field("actions", &names)
            .field("issues", &self.issues)
            .finish()
    }
}

pub struct ScriptBuilder {
    device: String,
    default_timeout: f32,
    click_hold: f32,
    scroll_step_time: f32,
    poll_interval: f32,
    rendezvous_timeout: f32,
    actions: Vec<Box<dyn Action>>,
    multitouch: Option<MultitouchAction>,
    issues: Vec<String>,
}

impl ScriptBuilder {
    /// Creates an empty builder.
    ///
    /// # Arguments
    ///
    /// * `config` - Supplies the device id and the default timeouts, hold
    ///   and poll intervals baked into the actions built from here on
    pub fn new(config: &AutopilotConfig) -> Self {
        Self {
            device: config.device.clone(),
            default_timeout: config.default_timeout,
            click_hold: config.click_hold,
            scroll_step_time: config.scroll_step_time,
            poll_interval: config.poll_interval,
            rendezvous_timeout: config.rendezvous_timeout,
            actions: Vec::new(),
            multitouch: None,
            issues: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Records a problem with a statement that was skipped.
    pub fn issue(&mut self, message: impl Into<String>) -> &mut Self {
        let message = message.into();
        debug!(issue = %message, "script issue");
        self.issues.push(message);
        self
    }

    /// Queues any action. Non-touch actions are rejected inside a multitouch block.
    pub fn push(&mut self, action: impl Action + 'static) -> &mut Self {
        if self.multitouch.is_some() {
            let name = action.name();
            return self.issue(format!("{} cannot be part of a multitouch gesture", name));
        }
        self.actions.push(Box::new(action));
        self
    }

    fn push_touch<T: TouchAction + 'static>(&mut self, action: T) -> &mut Self {
        match self.multitouch.as_mut() {
            Some(group) => group.push(Box::new(action)),
            None => self.actions.push(Box::new(action)),
        }
        self
    }

    // ------------------------------------------------------------------
    // Touch
    // ------------------------------------------------------------------

    pub fn touch_down(&mut self, point: Point, id: i32) -> &mut Self {
        self.push_touch(TouchDownAction::new(TouchTarget::Point(point), id))
    }

    /// Touch down on the center of the control at `path`, shifted by `offset`.
    /// The control is resolved when the action executes.
    pub fn touch_down_control(
        &mut self,
        path: impl Into<ControlPath>,
        offset: Point,
        id: i32,
    ) -> &mut Self {
        let target = TouchTarget::Control {
            path: path.into(),
            offset,
        };
        self.push_touch(TouchDownAction::new(target, id))
    }

    pub fn touch_up(&mut self, id: i32) -> &mut Self {
        self.push_touch(TouchUpAction::new(id))
    }

    /// Moves `id` to `point` over `time` seconds; a zero time jumps.
    pub fn touch_move(&mut self, point: Point, time: f32, id: i32) -> &mut Self {
        self.push_touch(TouchMoveAction::to_point(point, time, id))
    }

    pub fn touch_move_control(
        &mut self,
        path: impl Into<ControlPath>,
        offset: Point,
        time: f32,
        id: i32,
    ) -> &mut Self {
        let target = MoveTarget::To(TouchTarget::Control {
            path: path.into(),
            offset,
        });
        self.push_touch(TouchMoveAction::new(target, time, id))
    }

    /// Moves `id` along `direction` at `speed` virtual units per second.
    ///
    /// # Arguments
    ///
    /// * `direction` - Normalized when the action executes
    /// * `speed` - Virtual units per second
    /// * `time` - Seconds the move lasts
    /// * `id` - Touch id
    pub fn touch_move_dir(&mut self, direction: Point, speed: f32, time: f32, id: i32) -> &mut Self {
        self.push_touch(TouchMoveAction::new(
            MoveTarget::Direction { direction, speed },
            time,
            id,
        ))
    }

    /// Down, hold, up at a point.
    pub fn click(&mut self, point: Point, id: i32) -> &mut Self {
        self.click_target(TouchTarget::Point(point), id)
    }

    pub fn click_control(&mut self, path: impl Into<ControlPath>, offset: Point, id: i32) -> &mut Self {
        self.click_target(
            TouchTarget::Control {
                path: path.into(),
                offset,
            },
            id,
        )
    }

    fn click_target(&mut self, target: TouchTarget, id: i32) -> &mut Self {
        if self.multitouch.is_some() {
            return self.issue("Click cannot be part of a multitouch gesture");
        }
        self.push_touch(TouchDownAction::new(target, id));
        self.push(WaitAction::new(self.click_hold));
        self.push_touch(TouchUpAction::new(id))
    }

    /// Opens a gesture; touch actions queue into it until
    /// [`ScriptBuilder::end_multitouch`].
    pub fn begin_multitouch(&mut self) -> &mut Self {
        if self.multitouch.is_some() {
            return self.issue("nested multitouch gesture");
        }
        self.multitouch = Some(MultitouchAction::new());
        self
    }

    pub fn end_multitouch(&mut self) -> &mut Self {
        match self.multitouch.take() {
            Some(group) if group.is_empty() => self.issue("empty multitouch gesture"),
            Some(group) => {
                self.actions.push(Box::new(group));
                self
            }
            None => self.issue("multitouch end without begin"),
        }
    }

    // ------------------------------------------------------------------
    // Keyboard and text
    // ------------------------------------------------------------------

    pub fn key_press(&mut self, key: char) -> &mut Self {
        self.push(KeyPressAction::new(key))
    }

    /// One key press per character.
    pub fn keyboard_input(&mut self, text: &str) -> &mut Self {
        for key in text.chars() {
            self.key_press(key);
        }
        self
    }

    pub fn set_text(&mut self, path: impl Into<ControlPath>, text: &str) -> &mut Self {
        self.push(SetTextAction::new(path.into(), text))
    }

    // ------------------------------------------------------------------
    // Waiting
    // ------------------------------------------------------------------

    pub fn wait(&mut self, seconds: f32) -> &mut Self {
        self.push(WaitAction::new(seconds))
    }

    /// Waits until the control resolves.
    ///
    /// # Returns
    ///
    /// The builder. A timeout is reported when it elapses and the script
    /// continues unless timeouts are fatal.
    pub fn wait_for_ui(&mut self, path: impl Into<ControlPath>, timeout: Option<f32>) -> &mut Self {
        let timeout = timeout.unwrap_or(self.default_timeout);
        self.push(WaitUntilAction::new(ControlAppears(path.into()), timeout))
    }

    /// Waits for the screen, then skips its first frame.
    pub fn wait_for_screen(&mut self, name: &str, timeout: Option<f32>) -> &mut Self {
        let timeout = timeout.unwrap_or(self.default_timeout);
        self.push(WaitUntilAction::new(ScreenIs(name.to_string()), timeout));
        self.wait(SCREEN_SETTLE)
    }

    /// Scrolls the list holding `path` until that cell resolves.
    pub fn scroll(&mut self, path: impl Into<ControlPath>, id: i32, timeout: Option<f32>) -> &mut Self {
        let timeout = timeout.unwrap_or(self.default_timeout);
        self.push(ScrollControlAction::new(
            path.into(),
            id,
            timeout,
            self.scroll_step_time,
        ))
    }

    // ------------------------------------------------------------------
    // Assertions
    // ------------------------------------------------------------------

    /// Compares two getters and records the outcome as a test step named
    /// `message`. A mismatch is a failed step, not an error.
    pub fn assert(&mut self, message: &str, expected: GetterSource, actual: GetterSource) -> &mut Self {
        self.push(AssertAction::new(message, expected, actual))
    }

    /// Literal text against a control's text.
    pub fn assert_text(&mut self, message: &str, expected: &str, path: impl Into<ControlPath>) -> &mut Self {
        self.assert(
            message,
            GetterSource::Literal(Value::from(expected)),
            GetterSource::ControlText(path.into()),
        )
    }

    /// Text of one control against another's.
    pub fn assert_same_text(
        &mut self,
        message: &str,
        expected: impl Into<ControlPath>,
        actual: impl Into<ControlPath>,
    ) -> &mut Self {
        self.assert(
            message,
            GetterSource::ControlText(expected.into()),
            GetterSource::ControlText(actual.into()),
        )
    }

    /// Literal presence against whether a control resolves.
    pub fn assert_bool(&mut self, message: &str, expected: bool, path: impl Into<ControlPath>) -> &mut Self {
        self.assert(
            message,
            GetterSource::Literal(Value::Bool(expected)),
            GetterSource::ControlPresent(path.into()),
        )
    }

    /// Presence of one control against another's.
    pub fn assert_same_presence(
        &mut self,
        message: &str,
        expected: impl Into<ControlPath>,
        actual: impl Into<ControlPath>,
    ) -> &mut Self {
        self.assert(
            message,
            GetterSource::ControlPresent(expected.into()),
            GetterSource::ControlPresent(actual.into()),
        )
    }

    // ------------------------------------------------------------------
    // Cross-device
    // ------------------------------------------------------------------

    /// Publishes `value` as `device`'s state in the shared store.
    pub fn write_state(&mut self, device: &str, value: &str) -> &mut Self {
        self.push(PublishAction::new(SyncTarget::State(device.to_string()), value))
    }

    pub fn write_command(&mut self, device: &str, value: &str) -> &mut Self {
        self.push(PublishAction::new(SyncTarget::Command(device.to_string()), value))
    }

    pub fn write_string(&mut self, name: &str, value: &str) -> &mut Self {
        self.push(PublishAction::new(SyncTarget::Aux(name.to_string()), value))
    }

    /// Announces this device's own state.
    pub fn announce(&mut self, value: &str) -> &mut Self {
        let device = self.device.clone();
        self.write_state(&device, value)
    }

    /// Blocks the script until `device` announces `value`.
    ///
    /// # Arguments
    ///
    /// * `device` - Device whose state entry is polled
    /// * `value` - Exact value to wait for
    /// * `timeout` - Seconds before the run is ended, or the configured default
    pub fn wait_for_state(&mut self, device: &str, value: &str, timeout: Option<f32>) -> &mut Self {
        self.rendezvous(
            RendezvousCondition::Equals {
                target: SyncTarget::State(device.to_string()),
                value: value.to_string(),
            },
            timeout,
        )
    }

    pub fn wait_for_command(&mut self, device: &str, value: &str, timeout: Option<f32>) -> &mut Self {
        self.rendezvous(
            RendezvousCondition::Equals {
                target: SyncTarget::Command(device.to_string()),
                value: value.to_string(),
            },
            timeout,
        )
    }

    /// Master side of the handshake: opens a generation and waits until
    /// every named helper has joined it.
    pub fn wait_for_helpers(&mut self, helpers: Vec<String>, timeout: Option<f32>) -> &mut Self {
        if helpers.is_empty() {
            return self.issue("WaitForHelpers needs at least one helper");
        }
        self.rendezvous(
            RendezvousCondition::HelpersJoined(HelperSet::Named(helpers)),
            timeout,
        )
    }

    /// Master side of the handshake for anonymous helpers.
    ///
    /// # Arguments
    ///
    /// * `count` - Exact number of helpers expected; more than this fails the run
    /// * `timeout` - Seconds before giving up, or the configured default
    pub fn wait_for_helper_count(&mut self, count: usize, timeout: Option<f32>) -> &mut Self {
        if count == 0 {
            return self.issue("WaitForHelpers needs at least one helper");
        }
        self.rendezvous(
            RendezvousCondition::HelpersJoined(HelperSet::Count(count)),
            timeout,
        )
    }

    /// Helper side of the handshake: announce ready, join `master`'s open
    /// generation and wait for it to start.
    pub fn wait_for_master(&mut self, master: &str, timeout: Option<f32>) -> &mut Self {
        self.announce(READY);
        self.rendezvous(RendezvousCondition::MasterStarted(master.to_string()), timeout)
    }

    fn rendezvous(&mut self, condition: RendezvousCondition, timeout: Option<f32>) -> &mut Self {
        let timeout = timeout.unwrap_or(self.rendezvous_timeout);
        self.push(RendezvousAction::new(condition, timeout, self.poll_interval))
    }

    // ------------------------------------------------------------------
    // Reporting
    // ------------------------------------------------------------------

    pub fn step(&mut self, name: &str) -> &mut Self {
        self.push(StepAction::new(name))
    }

    pub fn log(&mut self, level: LogLevel, message: &str) -> &mut Self {
        self.push(LogAction::new(level, message))
    }

    pub fn screenshot(&mut self, name: &str) -> &mut Self {
        self.push(ScreenshotAction::new(name))
    }

    /// Closes an unterminated multitouch block and returns the script.
    pub fn finish(mut self) -> Script {
        if self.multitouch.is_some() {
            self.issue("multitouch gesture was not closed");
            self.end_multitouch();
        }
        Script {
            actions: self.actions,
            issues: self.issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(script: &Script) -> Vec<&'static str> {
        script.actions.iter().map(|a| a.name()).collect()
    }

    #[test]
    fn click_expands_to_down_wait_up() {
        let mut b = ScriptBuilder::new(&AutopilotConfig::default());
        b.click(Point::new(1.0, 2.0), 1);
        assert_eq!(names(&b.finish()), vec!["TouchDown", "Wait", "TouchUp"]);
    }

    #[test]
    fn wait_for_screen_adds_settle_wait() {
        let mut b = ScriptBuilder::new(&AutopilotConfig::default());
        b.wait_for_screen("Game", None);
        assert_eq!(names(&b.finish()), vec!["WaitUntil", "Wait"]);
    }

    #[test]
    fn multitouch_collects_touches_into_one_action() {
        let mut b = ScriptBuilder::new(&AutopilotConfig::default());
        b.begin_multitouch()
            .touch_down(Point::new(0.0, 0.0), 1)
            .touch_down(Point::new(5.0, 5.0), 2)
            .wait(1.0)
            .end_multitouch()
            .touch_up(1);
        let script = b.finish();
        assert_eq!(names(&script), vec!["Multitouch", "TouchUp"]);
        assert_eq!(script.issues.len(), 1, "wait inside multitouch is an issue");
    }

    #[test]
    fn unclosed_multitouch_is_flushed_with_issue() {
        let mut b = ScriptBuilder::new(&AutopilotConfig::default());
        b.begin_multitouch().touch_up(3);
        let script = b.finish();
        assert_eq!(names(&script), vec!["Multitouch"]);
        assert_eq!(script.issues, vec!["multitouch gesture was not closed"]);
    }

    #[test]
    fn keyboard_input_is_one_press_per_char() {
        let mut b = ScriptBuilder::new(&AutopilotConfig::default());
        b.keyboard_input("héllo");
        assert_eq!(b.len(), 5);
    }

    #[test]
    fn wait_for_master_announces_then_waits() {
        let mut b = ScriptBuilder::new(&AutopilotConfig::default());
        b.wait_for_master("master", None);
        assert_eq!(names(&b.finish()), vec!["Publish", "Rendezvous"]);
    }

    #[test]
    fn zero_helper_count_is_an_issue() {
        let mut b = ScriptBuilder::new(&AutopilotConfig::default());
        b.wait_for_helper_count(0, None);
        let script = b.finish();
        assert!(script.actions.is_empty());
        assert_eq!(script.issues, vec!["WaitForHelpers needs at least one helper"]);
    }
}

//! Single-finger touch actions.

use crate::action::{lifecycle_accessors, Action, Context, Lifecycle, TouchAction};
use crate::controls::ControlPath;
use crate::geometry::Point;

/// Where a touch lands: a fixed point or a control's center plus an offset.
/// Controls are resolved when the action executes.
#[derive(Debug, Clone, PartialEq)]
pub enum TouchTarget {
    Point(Point),
    Control { path: ControlPath, offset: Point },
}

impl TouchTarget {
    pub fn control(path: impl Into<ControlPath>) -> Self {
        TouchTarget::Control {
            path: path.into(),
            offset: Point::ZERO,
        }
    }

    fn resolve(&self, ctx: &mut Context<'_>) -> Option<Point> {
        match self {
            TouchTarget::Point(p) => Some(*p),
            TouchTarget::Control { path, offset } => ctx.control_point(path, *offset),
        }
    }
}

impl std::fmt::Display for TouchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TouchTarget::Point(p) => write!(f, "point={}", p),
            TouchTarget::Control { path, offset } => {
                write!(f, "controlPath={} offset={}", path, offset)
            }
        }
    }
}

/// Presses touch `id`.
#[derive(Debug)]
pub struct TouchDownAction {
    lifecycle: Lifecycle,
    id: i32,
    target: TouchTarget,
}

impl TouchDownAction {
    pub fn new(target: TouchTarget, id: i32) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            id,
            target,
        }
    }
}

impl Action for TouchDownAction {
    fn name(&self) -> &'static str {
        "TouchDown"
    }

    lifecycle_accessors!();

    fn describe(&self) -> String {
        format!("TouchDown id={} {}", self.id, self.target)
    }

    fn on_execute(&mut self, ctx: &mut Context<'_>) {
        match self.target.resolve(ctx) {
            Some(point) => ctx.touch_down(self.id, point),
            None => self.lifecycle.finish(),
        }
    }
}

impl TouchAction for TouchDownAction {
    fn touch_id(&self) -> i32 {
        self.id
    }
}

/// Lifts touch `id`.
#[derive(Debug)]
pub struct TouchUpAction {
    lifecycle: Lifecycle,
    id: i32,
}

impl TouchUpAction {
    pub fn new(id: i32) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            id,
        }
    }
}

impl Action for TouchUpAction {
    fn name(&self) -> &'static str {
        "TouchUp"
    }

    lifecycle_accessors!();

    fn describe(&self) -> String {
        format!("TouchUp id={}", self.id)
    }

    fn on_execute(&mut self, ctx: &mut Context<'_>) {
        ctx.touch_up(self.id);
    }
}

impl TouchAction for TouchUpAction {
    fn touch_id(&self) -> i32 {
        self.id
    }
}

/// End point of a timed move.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveTarget {
    To(TouchTarget),
    /// `origin + direction * speed * duration`, origin being the touch's
    /// position at execute time.
    Direction { direction: Point, speed: f32 },
}

/// Moves touch `id` linearly to a target over `duration` seconds.
#[derive(Debug)]
pub struct TouchMoveAction {
    lifecycle: Lifecycle,
    id: i32,
    target: MoveTarget,
    duration: f32,
    remaining: f32,
    end: Option<Point>,
}

impl TouchMoveAction {
    pub fn new(target: MoveTarget, duration: f32, id: i32) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            id,
            target,
            duration,
            remaining: duration,
            end: None,
        }
    }

    pub fn to_point(point: Point, duration: f32, id: i32) -> Self {
        Self::new(MoveTarget::To(TouchTarget::Point(point)), duration, id)
    }
}

impl Action for TouchMoveAction {
    fn name(&self) -> &'static str {
        "TouchMove"
    }

    lifecycle_accessors!();

    fn describe(&self) -> String {
        match &self.target {
            MoveTarget::To(target) => {
                format!("TouchMove id={} {} time={:.2}", self.id, target, self.duration)
            }
            MoveTarget::Direction { direction, speed } => format!(
                "TouchMoveDir id={} direction={} speed={:.2} time={:.2}",
                self.id, direction, speed, self.duration
            ),
        }
    }

    fn on_execute(&mut self, ctx: &mut Context<'_>) {
        self.end = match &self.target {
            MoveTarget::To(target) => target.resolve(ctx),
            MoveTarget::Direction { direction, speed } => {
                let origin = ctx.touches.position_of(self.id);
                Some(origin + *direction * (*speed * self.duration))
            }
        };
        if self.end.is_none() {
            self.lifecycle.finish();
        }
    }

    fn on_update(&mut self, ctx: &mut Context<'_>, dt: f32) {
        let Some(end) = self.end else {
            return;
        };
        let before = self.remaining;
        self.remaining -= dt;
        let next = if self.remaining <= 0.0 || before <= 0.0 {
            end
        } else {
            let from = ctx.touches.position_of(self.id);
            from + (end - from) * (dt / before)
        };
        ctx.touch_move(self.id, next);
    }

    fn test_condition(&mut self, _ctx: &mut Context<'_>) -> bool {
        self.remaining <= 0.0
    }
}

impl TouchAction for TouchMoveAction {
    fn touch_id(&self) -> i32 {
        self.id
    }
}

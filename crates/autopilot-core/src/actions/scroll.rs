//! Scroll a list until a cell resolves.
//!
//! The target path ends in the cell index; its parent must be a list. On
//! execute the action picks a drag that moves the list toward the index. Each
//! pass with no drag in flight checks whether the cell resolves with its
//! center inside the list's frame. A miss queues
//! another down, move, up drag. A hit is only accepted on the pass after it
//! was first seen, so a cell that flickers into view mid-drag does not count.

use tracing::debug;

use crate::action::{lifecycle_accessors, Action, Context, Lifecycle};
use crate::actions::touch::{TouchDownAction, TouchMoveAction, TouchTarget, TouchUpAction};
use crate::actions::wait::Deadline;
use crate::controls::{ControlPath, ListOrientation};
use crate::geometry::Point;
use crate::scheduler::ActionQueue;

pub struct ScrollControlAction {
    lifecycle: Lifecycle,
    path: ControlPath,
    id: i32,
    deadline: Deadline,
    step_time: f32,
    drag: Option<(Point, Point)>,
    queue: ActionQueue,
    was_found: bool,
    found: bool,
}

impl ScrollControlAction {
    pub fn new(path: ControlPath, id: i32, timeout: f32, step_time: f32) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            path,
            id,
            deadline: Deadline::new(timeout),
            step_time,
            drag: None,
            queue: ActionQueue::new(),
            was_found: false,
            found: false,
        }
    }

    /// Drag endpoints, or an error message when the parent is not a list.
    fn find_scroll_points(&self, ctx: &mut Context<'_>) -> Result<(Point, Point), String> {
        let parent_path = self.path.parent();
        if parent_path.is_empty() {
            return Err(format!("ScrollControlAction {} unable to scroll screen", self.path));
        }
        let list = ctx
            .controls
            .find_control(&parent_path)
            .and_then(|h| Some((ctx.controls.list_info(h)?, ctx.controls.control_rect(h)?)));
        let Some((info, rect)) = list else {
            return Err(format!("ScrollControlAction {} unable to scroll control", self.path));
        };

        let index = self.path.last_index();
        let forward = info.max_visible().unwrap_or(0) < index;
        let (near, far) = if forward { (0.55, 0.45) } else { (0.45, 0.55) };
        let points = match info.orientation {
            ListOrientation::Horizontal => (rect.at(near, 0.5), rect.at(far, 0.5)),
            ListOrientation::Vertical => (rect.at(0.5, near), rect.at(0.5, far)),
        };
        debug!(path = %self.path, from = %points.0, to = %points.1, "scroll points");
        Ok(points)
    }

    /// The cell resolves and its center lies inside the list's frame.
    fn cell_in_view(&self, ctx: &Context<'_>) -> bool {
        let Some(cell) = ctx.controls.find_control(&self.path) else {
            return false;
        };
        ctx.controls
            .find_control(&self.path.parent())
            .is_some_and(|list| ctx.controls.is_center_inside(list, cell))
    }

    fn queue_drag(&mut self, (down, up): (Point, Point)) {
        self.queue
            .push(Box::new(TouchDownAction::new(TouchTarget::Point(down), self.id)));
        self.queue
            .push(Box::new(TouchMoveAction::to_point(up, self.step_time, self.id)));
        self.queue.push(Box::new(TouchUpAction::new(self.id)));
    }
}

impl std::fmt::Debug for ScrollControlAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrollControlAction")
            .field("path", &self.path)
            .field("id", &self.id)
            .field("was_found", &self.was_found)
            .field("found", &self.found)
            .finish()
    }
}

impl Action for ScrollControlAction {
    fn name(&self) -> &'static str {
        "ScrollControl"
    }

    lifecycle_accessors!();

    fn describe(&self) -> String {
        format!(
            "ScrollControl controlPath={} id={} timeout={:.2}",
            self.path,
            self.id,
            self.deadline.limit()
        )
    }

    fn on_execute(&mut self, ctx: &mut Context<'_>) {
        match self.find_scroll_points(ctx) {
            Ok(points) => self.drag = Some(points),
            Err(message) => {
                ctx.report_error(&message);
                self.lifecycle.finish();
            }
        }
    }

    fn on_update(&mut self, ctx: &mut Context<'_>, dt: f32) {
        self.deadline.advance(dt);
        if !self.queue.is_idle() {
            self.queue.step(ctx, dt);
            return;
        }
        if self.cell_in_view(ctx) {
            self.found = self.was_found;
            self.was_found = true;
        } else {
            self.was_found = false;
            if let Some(points) = self.drag {
                self.queue_drag(points);
            }
        }
    }

    fn test_condition(&mut self, ctx: &mut Context<'_>) -> bool {
        if self.found {
            return true;
        }
        if self.deadline.expired() {
            if ctx.touches.is_down(self.id) {
                ctx.touch_up(self.id);
            }
            self.queue.clear();
            ctx.report_timeout(&format!("ScrollControlAction {} timeout", self.path));
            return true;
        }
        false
    }
}

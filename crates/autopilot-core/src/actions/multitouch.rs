//! Simultaneous multi-finger gestures.
//!
//! Children are stepped in declaration order within each tick; there is no
//! real parallelism. The group is done once every child is done, and a child
//! that finishes early is no longer updated.

use crate::action::{lifecycle_accessors, Action, Context, Lifecycle, TouchAction};

#[derive(Default)]
pub struct MultitouchAction {
    lifecycle: Lifecycle,
    children: Vec<Box<dyn TouchAction>>,
}

impl MultitouchAction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, child: Box<dyn TouchAction>) {
        self.children.push(child);
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Completion state of each child, in declaration order.
    pub fn children_done(&self) -> Vec<bool> {
        self.children.iter().map(|c| c.is_executed()).collect()
    }
}

impl std::fmt::Debug for MultitouchAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultitouchAction")
            .field("lifecycle", &self.lifecycle)
            .field("children", &self.children.len())
            .finish()
    }
}

impl Action for MultitouchAction {
    fn name(&self) -> &'static str {
        "Multitouch"
    }

    lifecycle_accessors!();

    fn describe(&self) -> String {
        let ids: Vec<String> = self
            .children
            .iter()
            .map(|c| format!("{}#{}", c.name(), c.touch_id()))
            .collect();
        format!("Multitouch [{}]", ids.join(", "))
    }

    fn on_execute(&mut self, ctx: &mut Context<'_>) {
        for child in &mut self.children {
            child.execute(ctx);
        }
    }

    fn on_update(&mut self, ctx: &mut Context<'_>, dt: f32) {
        for child in self.children.iter_mut().filter(|c| !c.is_executed()) {
            child.update(ctx, dt);
        }
    }

    fn test_condition(&mut self, _ctx: &mut Context<'_>) -> bool {
        self.children.iter().all(|c| c.is_executed())
    }
}

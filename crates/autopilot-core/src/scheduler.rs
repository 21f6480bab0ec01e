//! FIFO action queue advanced once per tick.
//!
//! On each tick the queue makes the front action current if nothing is in
//! flight, executes it, and updates the current action once. A finished
//! action is dropped in the tick it finishes, and the next one starts on the
//! following tick. Two queued actions are never current at the same time.

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::action::{Action, Context};

/// Owns a sequence of actions and steps them strictly in order.
#[derive(Default)]
pub struct ActionQueue {
    pending: VecDeque<Box<dyn Action>>,
    current: Option<Box<dyn Action>>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Box<dyn Action>) {
        self.pending.push_back(action);
    }

    pub fn extend(&mut self, actions: impl IntoIterator<Item = Box<dyn Action>>) {
        self.pending.extend(actions);
    }

    /// Nothing in flight and nothing waiting.
    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.pending.is_empty()
    }

    /// Actions not yet finished, including the current one.
    pub fn len(&self) -> usize {
        self.pending.len() + usize::from(self.current.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.is_idle()
    }

    /// Name of the action in flight.
    pub fn current_name(&self) -> Option<&'static str> {
        self.current.as_ref().map(|a| a.name())
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.current = None;
    }

    /// Advances by one tick of `dt` seconds.
    pub fn step(&mut self, ctx: &mut Context<'_>, dt: f32) {
        if self.current.is_none() {
            self.current = self.pending.pop_front();
            if let Some(action) = self.current.as_mut() {
                action.execute(ctx);
            }
        }
        let finished = match self.current.as_mut() {
            Some(action) => {
                action.update(ctx, dt);
                action.is_executed()
            }
            None => false,
        };
        if finished {
            if let Some(action) = self.current.take() {
                debug!(action = %action.describe(), "released");
            }
        }
    }
}

impl std::fmt::Debug for ActionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionQueue")
            .field("pending", &self.pending.len())
            .field("current", &self.current.as_ref().map(|a| a.name()))
            .finish()
    }
}

/// Result of one scheduler tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Actions remain.
    Running,
    /// The queue is exhausted.
    Finished,
    /// An action requested the end of the session.
    Aborted(String),
}

impl TickOutcome {
    /// Whether the run has ended, either way.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TickOutcome::Running)
    }
}

/// Top-level queue of a test session.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: ActionQueue,
    ticks: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, action: Box<dyn Action>) {
        self.queue.push(action);
    }

    pub fn enqueue_all(&mut self, actions: impl IntoIterator<Item = Box<dyn Action>>) {
        self.queue.extend(actions);
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Runs one tick. An empty queue reports [`TickOutcome::Finished`]; a
    /// force quit during the tick discards the remaining actions.
    pub fn tick(&mut self, ctx: &mut Context<'_>, dt: f32) -> TickOutcome {
        if let Some(reason) = ctx.quit_reason() {
            return TickOutcome::Aborted(reason.to_string());
        }
        if self.queue.is_idle() {
            info!(ticks = self.ticks, "action queue exhausted");
            return TickOutcome::Finished;
        }
        self.ticks += 1;
        self.queue.step(ctx, dt);
        match ctx.quit_reason() {
            Some(reason) => {
                info!(remaining = self.queue.len(), reason, "session aborted");
                self.queue.clear();
                TickOutcome::Aborted(reason.to_string())
            }
            None => TickOutcome::Running,
        }
    }
}

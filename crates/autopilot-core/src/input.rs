//! Synthetic input events and the session-wide touch bookkeeping.
//!
//! Every event an action injects goes through [`TouchTracker::record`] before it
//! reaches the UI collaborator, so later actions can find where a finger is,
//! interpolate from there, and check that an "up" matches an earlier "down".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::geometry::Point;

/// Phase of a synthetic input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputPhase {
    /// A finger went down.
    Began,
    /// A pressed finger moved.
    Drag,
    /// The pointer moved with nothing pressed (hover).
    Move,
    /// A finger was lifted.
    Ended,
    /// A typed character.
    KeyChar,
}

/// One synthetic event submitted to the input pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    pub phase: InputPhase,
    /// Touch id; zero for key events.
    pub touch_id: i32,
    /// Position in virtual coordinates.
    pub point: Point,
    /// Position in physical input coordinates.
    pub physical: Point,
    pub tap_count: u32,
    /// Character for [`InputPhase::KeyChar`] events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_char: Option<char>,
}

impl InputEvent {
    pub fn touch(phase: InputPhase, touch_id: i32, point: Point, physical: Point) -> Self {
        Self {
            phase,
            touch_id,
            point,
            physical,
            tap_count: 1,
            key_char: None,
        }
    }

    pub fn key(key_char: char) -> Self {
        Self {
            phase: InputPhase::KeyChar,
            touch_id: 0,
            point: Point::ZERO,
            physical: Point::ZERO,
            tap_count: 0,
            key_char: Some(key_char),
        }
    }
}

/// Last known state of a pressed touch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchRecord {
    pub point: Point,
    pub physical: Point,
    pub phase: InputPhase,
}

/// Active touches keyed by touch id, plus the last pointer position.
#[derive(Debug, Default)]
pub struct TouchTracker {
    touches: BTreeMap<i32, TouchRecord>,
    pointer: Point,
}

impl TouchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the bookkeeping for an event that is about to be injected.
    pub fn record(&mut self, event: &InputEvent) {
        let id = event.touch_id;
        let record = TouchRecord {
            point: event.point,
            physical: event.physical,
            phase: event.phase,
        };
        match event.phase {
            InputPhase::Began => {
                self.pointer = event.point;
                if self.touches.contains_key(&id) {
                    warn!(id, "duplicate touch down");
                } else {
                    self.touches.insert(id, record);
                }
            }
            InputPhase::Drag => {
                self.pointer = event.point;
                match self.touches.get_mut(&id) {
                    Some(existing) => *existing = record,
                    None => warn!(id, "drag without touch down"),
                }
            }
            InputPhase::Move => {
                self.pointer = event.point;
                if self.touches.contains_key(&id) {
                    warn!(id, "hover move while touch is down");
                }
            }
            InputPhase::Ended => {
                self.pointer = event.point;
                if self.touches.remove(&id).is_none() {
                    warn!(id, "touch up without touch down");
                }
            }
            InputPhase::KeyChar => {}
        }
    }

    pub fn find(&self, id: i32) -> Option<&TouchRecord> {
        self.touches.get(&id)
    }

    pub fn is_down(&self, id: i32) -> bool {
        self.touches.contains_key(&id)
    }

    /// Last position reported by any touch or hover event.
    pub fn pointer(&self) -> Point {
        self.pointer
    }

    /// Where touch `id` is now, falling back to the pointer when it is not down.
    pub fn position_of(&self, id: i32) -> Point {
        self.find(id).map(|t| t.point).unwrap_or(self.pointer)
    }

    pub fn active_ids(&self) -> Vec<i32> {
        self.touches.keys().copied().collect()
    }

    pub fn clear(&mut self) {
        self.touches.clear();
    }
}

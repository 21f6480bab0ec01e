//! The boundary to the UI being driven.
//!
//! The engine never touches control internals. It locates controls by
//! [`ControlPath`], reads and assigns their text, asks lists which cells are
//! visible, and injects synthetic input, all through the [`UiControls`] trait.
//! [`crate::scene::Scene`] is the in-tree implementation used for headless
//! replay and tests.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};
use crate::input::InputEvent;
use crate::transform::ScreenMetrics;

/// Slash-separated path of names or indices, relative to the active screen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ControlPath(Vec<String>);

impl ControlPath {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Splits on `/`, ignoring empty segments.
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split('/')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Path without its last segment. The parent of a one-segment path is empty (the screen).
    pub fn parent(&self) -> ControlPath {
        match self.0.split_last() {
            Some((_, rest)) => ControlPath(rest.to_vec()),
            None => ControlPath::default(),
        }
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Last segment read as a list index; non-numeric segments read as 0.
    pub fn last_index(&self) -> usize {
        self.last().and_then(|s| s.parse().ok()).unwrap_or(0)
    }
}

impl fmt::Display for ControlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl FromStr for ControlPath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ControlPath::parse(s))
    }
}

impl From<&str> for ControlPath {
    fn from(s: &str) -> Self {
        ControlPath::parse(s)
    }
}

impl From<ControlPath> for String {
    fn from(path: ControlPath) -> String {
        path.to_string()
    }
}

impl TryFrom<String> for ControlPath {
    type Error = std::convert::Infallible;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Ok(ControlPath::parse(&s))
    }
}

/// Opaque reference to a resolved control. Valid only for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListOrientation {
    #[default]
    Vertical,
    Horizontal,
}

/// Scroll state of a list control.
#[derive(Debug, Clone, PartialEq)]
pub struct ListInfo {
    pub orientation: ListOrientation,
    /// Indices of the cells currently inside the list's frame.
    pub visible: Vec<usize>,
}

impl ListInfo {
    pub fn min_visible(&self) -> Option<usize> {
        self.visible.iter().copied().min()
    }

    pub fn max_visible(&self) -> Option<usize> {
        self.visible.iter().copied().max()
    }
}

/// Operations the engine needs from the UI being automated.
pub trait UiControls {
    /// Screen parameters for the coordinate transform, read on every touch.
    fn screen_metrics(&self) -> ScreenMetrics;

    /// Name of the active screen, if any.
    fn current_screen(&self) -> Option<String>;

    fn find_control(&self, path: &ControlPath) -> Option<ControlHandle>;

    /// Absolute frame of a control in virtual coordinates.
    fn control_rect(&self, handle: ControlHandle) -> Option<Rect>;

    fn text(&self, handle: ControlHandle) -> Option<String>;

    /// Assigns text; returns false when the control holds no text.
    fn set_text(&mut self, handle: ControlHandle, text: &str) -> bool;

    /// Visible-cell state when the control is a list.
    fn list_info(&self, handle: ControlHandle) -> Option<ListInfo>;

    /// Delivers a synthetic event to the application's input pipeline.
    fn process_input(&mut self, event: &InputEvent);

    /// Encoded image of the current frame, when the backend can produce one.
    fn screenshot(&mut self) -> Option<Vec<u8>> {
        None
    }

    /// Center of the control at `path`.
    fn find_control_position(&self, path: &ControlPath) -> Option<Point> {
        let handle = self.find_control(path)?;
        self.control_rect(handle).map(|r| r.center())
    }

    /// Whether `child`'s center lies inside `parent`'s frame.
    fn is_center_inside(&self, parent: ControlHandle, child: ControlHandle) -> bool {
        match (self.control_rect(parent), self.control_rect(child)) {
            (Some(p), Some(c)) => p.contains(c.center()),
            _ => false,
        }
    }
}

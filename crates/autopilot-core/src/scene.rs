//! A JSON-described control tree that implements [`UiControls`].
//!
//! Scenes let scripts run headless: every injected event is recorded, taps
//! switch screens or focus text fields, typed characters land in the focused
//! field, and drags across a list shift its window of visible cells.
//!
//! ```json
//! {
//!   "metrics": { "physical_width": 1024, "physical_height": 768,
//!                "virtual_width": 1024, "virtual_height": 768 },
//!   "screens": [
//!     { "name": "Main", "children": [
//!       { "name": "Play", "type": "button", "frame": {"x": 10, "y": 10, "width": 100, "height": 40},
//!         "on_tap": "Game" }
//!     ] }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::controls::{ControlHandle, ControlPath, ListInfo, ListOrientation, UiControls};
use crate::geometry::{Point, Rect};
use crate::input::{InputEvent, InputPhase};
use crate::transform::ScreenMetrics;

/// Movement below this distance between down and up counts as a tap.
const TAP_SLOP: f32 = 10.0;

/// Fraction of a list's extent a drag must cover to scroll it by one cell.
const SCROLL_THRESHOLD: f32 = 0.05;

#[derive(Error, Debug)]
pub enum SceneError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid scene description: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Scene has no screens")]
    Empty,

    #[error("Unknown screen: {0}")]
    UnknownScreen(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    #[default]
    View,
    Text,
    Button,
    TextField,
    List,
}

/// One control in a scene file. Frames are relative to the parent; list
/// cells are stacked along the list's axis and only their size is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Path segment that resolves this control.
    pub name: String,
    /// Control type, `type` in the file.
    #[serde(rename = "type", default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub frame: Rect,
    /// Initial text for text, button and text field controls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Screen to switch to when tapped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_tap: Option<String>,
    /// Scroll axis; lists only.
    #[serde(default)]
    pub orientation: ListOrientation,
    /// Number of list cells visible at once; all of them when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<usize>,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

/// A named screen and its root controls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenSpec {
    pub name: String,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSpec {
    #[serde(default)]
    pub metrics: ScreenMetrics,
    /// Initial screen; the first one when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    pub screens: Vec<ScreenSpec>,
}

#[derive(Debug)]
struct Node {
    name: String,
    kind: NodeKind,
    frame: Rect,
    text: Option<String>,
    on_tap: Option<String>,
    orientation: ListOrientation,
    window: usize,
    first_visible: usize,
    parent: Option<usize>,
    slot: usize,
    children: Vec<usize>,
}

impl Node {
    fn visible_range(&self) -> std::ops::Range<usize> {
        let end = (self.first_visible + self.window).min(self.children.len());
        self.first_visible.min(end)..end
    }
}

#[derive(Debug)]
struct Screen {
    name: String,
    roots: Vec<usize>,
}

#[derive(Debug, Serialize)]
struct Snapshot<'a> {
    screen: &'a str,
    focused: Option<&'a str>,
    texts: BTreeMap<&'a str, &'a str>,
}

/// In-memory UI driven by synthetic input.
#[derive(Debug)]
pub struct Scene {
    metrics: ScreenMetrics,
    nodes: Vec<Node>,
    screens: Vec<Screen>,
    active: usize,
    focused: Option<usize>,
    presses: HashMap<i32, Point>,
    events: Vec<InputEvent>,
}

impl Scene {
    pub fn load(path: &Path) -> Result<Self, SceneError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, SceneError> {
        let spec: SceneSpec = serde_json::from_str(json)?;
        Self::from_spec(spec)
    }

    pub fn from_spec(spec: SceneSpec) -> Result<Self, SceneError> {
        if spec.screens.is_empty() {
            return Err(SceneError::Empty);
        }
        let mut nodes = Vec::new();
        let mut screens = Vec::with_capacity(spec.screens.len());
        for screen in spec.screens {
            let roots = screen
                .children
                .into_iter()
                .enumerate()
                .map(|(slot, child)| add_node(&mut nodes, child, None, slot))
                .collect();
            screens.push(Screen {
                name: screen.name,
                roots,
            });
        }
        let active = match spec.start {
            Some(name) => screens
                .iter()
                .position(|s| s.name == name)
                .ok_or(SceneError::UnknownScreen(name))?,
            None => 0,
        };
        Ok(Self {
            metrics: spec.metrics,
            nodes,
            screens,
            active,
            focused: None,
            presses: HashMap::new(),
            events: Vec::new(),
        })
    }

    pub fn active_screen(&self) -> &str {
        &self.screens[self.active].name
    }

    /// Every event delivered through [`UiControls::process_input`], in order.
    pub fn events(&self) -> &[InputEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<InputEvent> {
        std::mem::take(&mut self.events)
    }

    /// Name of the focused text field.
    pub fn focused(&self) -> Option<&str> {
        self.focused.map(|i| self.nodes[i].name.as_str())
    }

    pub fn switch_screen(&mut self, name: &str) -> Result<(), SceneError> {
        let index = self
            .screens
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| SceneError::UnknownScreen(name.to_string()))?;
        self.active = index;
        self.focused = None;
        Ok(())
    }

    fn resolve(&self, path: &ControlPath) -> Option<usize> {
        let mut segments = path.segments().iter();
        let first = segments.next()?;
        let mut current = pick(&self.nodes, &self.screens[self.active].roots, first)?;
        for segment in segments {
            let node = &self.nodes[current];
            current = if node.kind == NodeKind::List {
                let range = node.visible_range();
                let visible = &node.children[range.clone()];
                match segment.parse::<usize>() {
                    Ok(index) if range.contains(&index) => node.children[index],
                    _ => visible
                        .iter()
                        .copied()
                        .find(|&c| self.nodes[c].name == *segment)?,
                }
            } else {
                pick(&self.nodes, &node.children, segment)?
            };
        }
        Some(current)
    }

    fn absolute_rect(&self, index: usize) -> Rect {
        let node = &self.nodes[index];
        let Some(parent_index) = node.parent else {
            return node.frame;
        };
        let parent = &self.nodes[parent_index];
        let base = self.absolute_rect(parent_index);
        if parent.kind != NodeKind::List {
            return node.frame.translated(base.origin());
        }
        let slot = node.slot as f32 - parent.first_visible as f32;
        let offset = match parent.orientation {
            ListOrientation::Vertical => Point::new(0.0, slot * node.frame.height),
            ListOrientation::Horizontal => Point::new(slot * node.frame.width, 0.0),
        };
        Rect::new(
            base.x + offset.x,
            base.y + offset.y,
            node.frame.width,
            node.frame.height,
        )
    }

    /// Deepest visible control under `point` on the active screen.
    fn hit_test(&self, point: Point) -> Option<usize> {
        self.screens[self.active]
            .roots
            .iter()
            .rev()
            .find_map(|&root| self.hit_node(root, point))
    }

    fn hit_node(&self, index: usize, point: Point) -> Option<usize> {
        if !self.absolute_rect(index).contains(point) {
            return None;
        }
        let node = &self.nodes[index];
        let children: &[usize] = if node.kind == NodeKind::List {
            &node.children[node.visible_range()]
        } else {
            &node.children
        };
        children
            .iter()
            .rev()
            .find_map(|&c| self.hit_node(c, point))
            .or(Some(index))
    }

    fn ancestors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(Some(index), move |&i| self.nodes[i].parent)
    }

    fn tap(&mut self, point: Point) {
        let Some(hit) = self.hit_test(point) else {
            self.focused = None;
            return;
        };
        let field = self
            .ancestors(hit)
            .find(|&i| self.nodes[i].kind == NodeKind::TextField);
        if field.is_some() {
            self.focused = field;
            return;
        }
        let target = self
            .ancestors(hit)
            .find_map(|i| self.nodes[i].on_tap.clone());
        if let Some(screen) = target {
            debug!(screen = %screen, "scene tap switches screen");
            if self.switch_screen(&screen).is_err() {
                debug!(screen = %screen, "tap target screen does not exist");
            }
        }
    }

    fn drag(&mut self, start: Point, delta: Point) {
        let Some(hit) = self.hit_test(start) else {
            return;
        };
        let Some(list) = self
            .ancestors(hit)
            .find(|&i| self.nodes[i].kind == NodeKind::List)
        else {
            return;
        };
        let rect = self.absolute_rect(list);
        let node = &mut self.nodes[list];
        let (along, extent) = match node.orientation {
            ListOrientation::Vertical => (delta.y, rect.height),
            ListOrientation::Horizontal => (delta.x, rect.width),
        };
        if along.abs() < SCROLL_THRESHOLD * extent {
            return;
        }
        let last_first = node.children.len().saturating_sub(node.window);
        node.first_visible = if along < 0.0 {
            (node.first_visible + 1).min(last_first)
        } else {
            node.first_visible.saturating_sub(1)
        };
        debug!(list = %node.name, first_visible = node.first_visible, "scene list scrolled");
    }

    fn type_char(&mut self, c: char) {
        let Some(index) = self.focused else {
            return;
        };
        let text = self.nodes[index].text.get_or_insert_with(String::new);
        if c == '\u{8}' {
            text.pop();
        } else {
            text.push(c);
        }
    }
}

fn add_node(nodes: &mut Vec<Node>, spec: NodeSpec, parent: Option<usize>, slot: usize) -> usize {
    let index = nodes.len();
    let window = spec.window.unwrap_or(spec.children.len());
    nodes.push(Node {
        name: spec.name,
        kind: spec.kind,
        frame: spec.frame,
        text: spec.text,
        on_tap: spec.on_tap,
        orientation: spec.orientation,
        window,
        first_visible: 0,
        parent,
        slot,
        children: Vec::new(),
    });
    let children: Vec<usize> = spec
        .children
        .into_iter()
        .enumerate()
        .map(|(i, child)| add_node(nodes, child, Some(index), i))
        .collect();
    nodes[index].children = children;
    index
}

/// Child by name, or by position when the segment is numeric.
fn pick(nodes: &[Node], candidates: &[usize], segment: &str) -> Option<usize> {
    candidates
        .iter()
        .copied()
        .find(|&c| nodes[c].name == segment)
        .or_else(|| {
            segment
                .parse::<usize>()
                .ok()
                .and_then(|i| candidates.get(i).copied())
        })
}

impl UiControls for Scene {
    fn screen_metrics(&self) -> ScreenMetrics {
        self.metrics
    }

    fn current_screen(&self) -> Option<String> {
        Some(self.active_screen().to_string())
    }

    fn find_control(&self, path: &ControlPath) -> Option<ControlHandle> {
        self.resolve(path).map(|i| ControlHandle(i as u64))
    }

    fn control_rect(&self, handle: ControlHandle) -> Option<Rect> {
        let index = handle.0 as usize;
        (index < self.nodes.len()).then(|| self.absolute_rect(index))
    }

    fn text(&self, handle: ControlHandle) -> Option<String> {
        self.nodes.get(handle.0 as usize)?.text.clone()
    }

    fn set_text(&mut self, handle: ControlHandle, text: &str) -> bool {
        match self.nodes.get_mut(handle.0 as usize) {
            Some(node) if matches!(node.kind, NodeKind::Text | NodeKind::TextField | NodeKind::Button) => {
                node.text = Some(text.to_string());
                true
            }
            _ => false,
        }
    }

    fn list_info(&self, handle: ControlHandle) -> Option<ListInfo> {
        let node = self.nodes.get(handle.0 as usize)?;
        (node.kind == NodeKind::List).then(|| ListInfo {
            orientation: node.orientation,
            visible: node.visible_range().collect(),
        })
    }

    fn process_input(&mut self, event: &InputEvent) {
        self.events.push(event.clone());
        match event.phase {
            InputPhase::Began => {
                self.presses.insert(event.touch_id, event.point);
            }
            InputPhase::Ended => {
                if let Some(start) = self.presses.remove(&event.touch_id) {
                    let delta = event.point - start;
                    if delta.distance(Point::ZERO) < TAP_SLOP {
                        self.tap(event.point);
                    } else {
                        self.drag(start, delta);
                    }
                }
            }
            InputPhase::KeyChar => {
                if let Some(c) = event.key_char {
                    self.type_char(c);
                }
            }
            InputPhase::Drag | InputPhase::Move => {}
        }
    }

    fn screenshot(&mut self) -> Option<Vec<u8>> {
        let screen = &self.screens[self.active];
        let mut texts = BTreeMap::new();
        let mut stack: Vec<usize> = screen.roots.clone();
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if let Some(text) = &node.text {
                texts.insert(node.name.as_str(), text.as_str());
            }
            if node.kind == NodeKind::List {
                stack.extend(&node.children[node.visible_range()]);
            } else {
                stack.extend(&node.children);
            }
        }
        let snapshot = Snapshot {
            screen: &screen.name,
            focused: self.focused.map(|i| self.nodes[i].name.as_str()),
            texts,
        };
        serde_json::to_vec(&snapshot).ok()
    }
}

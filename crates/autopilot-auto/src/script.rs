//! YAML script loading.
//!
//! A script file is a mapping with an optional `testName` and an `actions`
//! sequence. Every entry in `actions` is a mapping whose `action` key names
//! the action; the remaining keys are its parameters:
//!
//! ```yaml
//! testName: login
//! actions:
//!   - action: Click
//!     controlPath: Login
//!   - action: KeyboardInput
//!     text: bob
//!   - action: Assert
//!     message: name typed
//!     expected: bob
//!     actual: { getter: GetText, controlPath: Login }
//! ```
//!
//! Points are `[x, y]` or `{x: .., y: ..}`. Control paths are a `/`-joined
//! string or a sequence of segments. An action that cannot be built is
//! recorded as a script issue and skipped; the run still starts and reports
//! it. Only an unreadable or malformed top-level file stops loading.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_yaml::Value as Yaml;
use tracing::{debug, info};

use autopilot_core::actions::{GetterSource, Value};
use autopilot_core::builder::{Script, ScriptBuilder};
use autopilot_core::config::AutopilotConfig;
use autopilot_core::controls::ControlPath;
use autopilot_core::geometry::Point;
use autopilot_core::session::LogLevel;

use crate::error::AutoError;

const DEFAULT_TOUCH_ID: i32 = 1;

/// A built script plus the name declared in the file.
#[derive(Debug)]
pub struct LoadedScript {
    pub test_name: Option<String>,
    pub script: Script,
}

/// Loads the script at `path`. Includes resolve relative to the including file.
pub fn load_file(path: &Path, config: &AutopilotConfig) -> Result<LoadedScript, AutoError> {
    let canonical = path.canonicalize()?;
    let source = std::fs::read_to_string(&canonical)?;
    let mut loader = ScriptLoader::new(config, parent_dir(&canonical));
    loader.include_stack.insert(canonical);
    loader.load_root(&source, path)
}

/// Loads a script from memory. Includes resolve relative to `base_dir`.
pub fn load_str(
    source: &str,
    base_dir: &Path,
    config: &AutopilotConfig,
) -> Result<LoadedScript, AutoError> {
    let loader = ScriptLoader::new(config, base_dir.to_path_buf());
    loader.load_root(source, Path::new("<script>"))
}

struct ScriptLoader {
    builder: ScriptBuilder,
    base_dir: PathBuf,
    include_stack: HashSet<PathBuf>,
}

impl ScriptLoader {
    fn new(config: &AutopilotConfig, base_dir: PathBuf) -> Self {
        Self {
            builder: ScriptBuilder::new(config),
            base_dir,
            include_stack: HashSet::new(),
        }
    }

    fn load_root(mut self, source: &str, path: &Path) -> Result<LoadedScript, AutoError> {
        let parse_error = |message: String| AutoError::Parse {
            message,
            path: path.to_path_buf(),
        };
        let root: Yaml = serde_yaml::from_str(source).map_err(|e| parse_error(e.to_string()))?;
        if !root.is_mapping() {
            return Err(parse_error("script must be a mapping".to_string()));
        }
        let actions = root
            .get("actions")
            .ok_or_else(|| parse_error("no actions".to_string()))?;
        let test_name = root.get("testName").and_then(scalar_string);

        self.add_actions(actions);
        let script = self.builder.finish();
        info!(
            actions = script.actions.len(),
            issues = script.issues.len(),
            "script loaded"
        );
        Ok(LoadedScript { test_name, script })
    }

    fn add_actions(&mut self, actions: &Yaml) {
        let Some(list) = actions.as_sequence() else {
            self.builder.issue("actions must be a sequence");
            return;
        };
        for node in list {
            self.add_action(node);
        }
    }

    fn add_action(&mut self, node: &Yaml) {
        let Some(name) = node.get("action").and_then(Yaml::as_str) else {
            self.builder.issue("entry without an action name");
            return;
        };
        debug!(action = name, "parsing action");
        let result = match name {
            "ExecuteYaml" => required_str(node, "path").and_then(|path| self.include(&path)),
            "MultiTouch" => self.multitouch(node),
            _ => add_simple(&mut self.builder, name, node),
        };
        if let Err(message) = result {
            self.builder.issue(format!("{}: {}", name, message));
        }
    }

    fn multitouch(&mut self, node: &Yaml) -> Result<(), String> {
        let touches = node.get("touches").ok_or("missing touches")?;
        self.builder.begin_multitouch();
        self.add_actions(touches);
        self.builder.end_multitouch();
        Ok(())
    }

    fn include(&mut self, raw: &str) -> Result<(), String> {
        let resolved = self.base_dir.join(raw);
        let canonical = resolved
            .canonicalize()
            .map_err(|e| format!("cannot resolve include path '{}': {}", raw, e))?;
        if self.include_stack.contains(&canonical) {
            return Err(format!("circular include detected: {}", canonical.display()));
        }
        let source = std::fs::read_to_string(&canonical)
            .map_err(|e| format!("cannot read '{}': {}", canonical.display(), e))?;
        let root: Yaml = serde_yaml::from_str(&source)
            .map_err(|e| format!("in included file '{}': {}", raw, e))?;
        let actions = root
            .get("actions")
            .ok_or_else(|| format!("included file '{}' has no actions", raw))?;

        info!(path = %canonical.display(), "including file");
        let prev_base = std::mem::replace(&mut self.base_dir, parent_dir(&canonical));
        self.include_stack.insert(canonical.clone());
        self.add_actions(actions);
        self.include_stack.remove(&canonical);
        self.base_dir = prev_base;
        Ok(())
    }
}

/// Every action that maps onto one builder call.
fn add_simple(b: &mut ScriptBuilder, name: &str, node: &Yaml) -> Result<(), String> {
    match name {
        "Click" => {
            let id = touch_id(node)?;
            match opt_point(node, "point")? {
                Some(point) => b.click(point, id),
                None => b.click_control(required_path(node)?, offset(node)?, id),
            };
        }
        "TouchDown" => {
            let id = touch_id(node)?;
            match opt_point(node, "point")? {
                Some(point) => b.touch_down(point, id),
                None => b.touch_down_control(required_path(node)?, offset(node)?, id),
            };
        }
        "TouchUp" => {
            b.touch_up(touch_id(node)?);
        }
        "TouchMove" => {
            let id = touch_id(node)?;
            let time = opt_f32(node, "time")?.unwrap_or(0.0);
            if let Some(direction) = opt_point(node, "direction")? {
                let speed = opt_f32(node, "speed")?.unwrap_or(1.0);
                b.touch_move_dir(direction, speed, time, id);
            } else if let Some(point) = opt_point(node, "point")? {
                b.touch_move(point, time, id);
            } else {
                let path = opt_path(node, "controlPath")?.ok_or("no point")?;
                b.touch_move_control(path, offset(node)?, time, id);
            }
        }
        "SetText" => {
            let text = opt_str(node, "text")?.unwrap_or_default();
            b.set_text(required_path(node)?, &text);
        }
        "Wait" => {
            b.wait(required(opt_f32(node, "time")?, "time")?);
        }
        "WaitForUI" => {
            b.wait_for_ui(required_path(node)?, opt_f32(node, "timeout")?);
        }
        "WaitForScreen" => {
            let screen = required_str(node, "screenName")?;
            b.wait_for_screen(&screen, opt_f32(node, "timeout")?);
        }
        "KeyPress" => {
            let key = required_str(node, "key")?;
            let c = key.chars().next().ok_or("empty key")?;
            b.key_press(c);
        }
        "KeyboardInput" => {
            b.keyboard_input(&required_str(node, "text")?);
        }
        "Assert" => {
            let message = opt_str(node, "message")?.unwrap_or_default();
            let expected = operand(node, "expected")?;
            let actual = operand(node, "actual")?;
            b.assert(&message, expected, actual);
        }
        "Scroll" => {
            let id = touch_id(node)?;
            b.scroll(required_path(node)?, id, opt_f32(node, "timeout")?);
        }
        "Step" => {
            b.step(&required_str(node, "name")?);
        }
        "Log" => {
            let level = match opt_str(node, "level")? {
                Some(raw) => raw.parse::<LogLevel>()?,
                None => LogLevel::Info,
            };
            b.log(level, &required_str(node, "message")?);
        }
        "Screenshot" => {
            let label = opt_str(node, "name")?.unwrap_or_else(|| "screenshot".to_string());
            b.screenshot(&label);
        }
        "WriteState" => {
            b.write_state(&required_str(node, "device")?, &required_str(node, "value")?);
        }
        "WriteCommand" => {
            b.write_command(&required_str(node, "device")?, &required_str(node, "value")?);
        }
        "WriteString" => {
            b.write_string(&required_str(node, "name")?, &required_str(node, "value")?);
        }
        "Announce" => {
            b.announce(&required_str(node, "value")?);
        }
        "WaitForState" => {
            b.wait_for_state(
                &required_str(node, "device")?,
                &required_str(node, "value")?,
                opt_f32(node, "timeout")?,
            );
        }
        "WaitForCommand" => {
            b.wait_for_command(
                &required_str(node, "device")?,
                &required_str(node, "value")?,
                opt_f32(node, "timeout")?,
            );
        }
        "WaitForHelpers" => {
            let timeout = opt_f32(node, "timeout")?;
            match node.get("helpers") {
                Some(Yaml::Sequence(items)) => {
                    let helpers = items
                        .iter()
                        .map(|h| scalar_string(h).ok_or("helper ids must be strings"))
                        .collect::<Result<Vec<_>, _>>()?;
                    b.wait_for_helpers(helpers, timeout);
                }
                Some(Yaml::Number(n)) => {
                    let count = n.as_u64().ok_or("helpers count must be a whole number")?;
                    b.wait_for_helper_count(count as usize, timeout);
                }
                Some(_) => return Err("helpers must be a list of ids or a count".into()),
                None => return Err("missing helpers".into()),
            }
        }
        "WaitForMaster" => {
            let master = opt_str(node, "master")?.unwrap_or_else(|| "master".to_string());
            b.wait_for_master(&master, opt_f32(node, "timeout")?);
        }
        other => return Err(format!("unknown action {}", other)),
    }
    Ok(())
}

/// One side of an `Assert`: a literal scalar or a `{getter: ..}` mapping.
fn operand(node: &Yaml, key: &str) -> Result<GetterSource, String> {
    let value = node.get(key).ok_or_else(|| format!("missing {}", key))?;
    let Some(getter) = value.get("getter") else {
        return match value {
            Yaml::Bool(b) => Ok(GetterSource::Literal(Value::Bool(*b))),
            other => scalar_string(other)
                .map(|s| GetterSource::Literal(Value::Text(s)))
                .ok_or_else(|| format!("{} must be a literal or a getter", key)),
        };
    };
    let getter = getter.as_str().ok_or("getter must be a string")?;
    match getter {
        "GetText" => Ok(GetterSource::ControlText(required_path(value)?)),
        "FindControl" => Ok(GetterSource::ControlPresent(required_path(value)?)),
        "ReadState" => Ok(GetterSource::RemoteState(required_str(value, "device")?)),
        "ReadCommand" => Ok(GetterSource::RemoteCommand(required_str(value, "device")?)),
        "ReadString" => Ok(GetterSource::RemoteString(required_str(value, "name")?)),
        other => Err(format!("unknown getter {}", other)),
    }
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

fn required<T>(value: Option<T>, key: &str) -> Result<T, String> {
    value.ok_or_else(|| format!("missing {}", key))
}

fn scalar_string(value: &Yaml) -> Option<String> {
    match value {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn opt_str(node: &Yaml, key: &str) -> Result<Option<String>, String> {
    match node.get(key) {
        None | Some(Yaml::Null) => Ok(None),
        Some(value) => scalar_string(value)
            .map(Some)
            .ok_or_else(|| format!("{} must be a scalar", key)),
    }
}

fn required_str(node: &Yaml, key: &str) -> Result<String, String> {
    required(opt_str(node, key)?, key)
}

fn opt_f32(node: &Yaml, key: &str) -> Result<Option<f32>, String> {
    match node.get(key) {
        None | Some(Yaml::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(|f| Some(f as f32))
            .ok_or_else(|| format!("{} must be a number", key)),
    }
}

fn touch_id(node: &Yaml) -> Result<i32, String> {
    match node.get("id") {
        None | Some(Yaml::Null) => Ok(DEFAULT_TOUCH_ID),
        Some(value) => value
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .ok_or_else(|| "id must be an integer".to_string()),
    }
}

fn opt_point(node: &Yaml, key: &str) -> Result<Option<Point>, String> {
    let Some(value) = node.get(key) else {
        return Ok(None);
    };
    let coords = match value {
        Yaml::Sequence(items) if items.len() == 2 => (items[0].as_f64(), items[1].as_f64()),
        Yaml::Mapping(_) => (
            value.get("x").and_then(Yaml::as_f64),
            value.get("y").and_then(Yaml::as_f64),
        ),
        _ => (None, None),
    };
    match coords {
        (Some(x), Some(y)) => Ok(Some(Point::new(x as f32, y as f32))),
        _ => Err(format!("{} must be [x, y] or {{x, y}}", key)),
    }
}

fn offset(node: &Yaml) -> Result<Point, String> {
    Ok(opt_point(node, "offset")?.unwrap_or(Point::ZERO))
}

fn opt_path(node: &Yaml, key: &str) -> Result<Option<ControlPath>, String> {
    match node.get(key) {
        None | Some(Yaml::Null) => Ok(None),
        Some(Yaml::Sequence(parts)) => parts
            .iter()
            .map(|p| scalar_string(p).ok_or_else(|| format!("{} segments must be scalars", key)))
            .collect::<Result<Vec<_>, _>>()
            .map(|segments| Some(ControlPath::new(segments))),
        Some(value) => scalar_string(value)
            .map(|raw| Some(ControlPath::parse(&raw)))
            .ok_or_else(|| format!("{} must be a string or a sequence", key)),
    }
}

fn required_path(node: &Yaml) -> Result<ControlPath, String> {
    let path = required(opt_path(node, "controlPath")?, "controlPath")?;
    if path.is_empty() {
        return Err("empty controlPath".to_string());
    }
    Ok(path)
}

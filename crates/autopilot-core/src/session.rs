//! Test session reporting.
//!
//! Actions never return errors to the scheduler. Everything they have to say
//! (test steps, errors, log messages, screenshots, a request to end the run)
//! goes through the [`SessionSink`] trait. [`Session`] is the standard sink:
//!
//! - Entries are kept in a ring buffer of the last 1000 entries
//! - Entries are persisted to a JSON Lines report when a report directory is set
//! - Entries can be mirrored into the shared store under `<run>/log/<device>/<n>`
//! - Step and error counters decide whether the run passed
//!
//! # Example
//!
//! ```
//! use autopilot_core::session::{Session, SessionSink};
//!
//! let mut session = Session::new("smoke", "master");
//! session.on_test_start("smoke");
//! session.on_test_step("title shown", true, None);
//! session.on_tests_finished();
//! assert!(session.summary().passed());
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::sync::SyncClient;

/// Maximum number of report entries retained in memory.
const MAX_REPORT_SIZE: usize = 1000;

/// Name of the step that is open before the script declares one.
pub const PRECONDITION_STEP: &str = "Precondition";

/// Where actions report what happened.
pub trait SessionSink {
    fn on_test_start(&mut self, name: &str);

    /// Closes the current step and opens `name`.
    fn on_step_start(&mut self, name: &str);

    /// Records a named pass/fail outcome.
    fn on_test_step(&mut self, name: &str, passed: bool, detail: Option<&str>);

    fn on_message(&mut self, level: LogLevel, message: &str);

    fn on_error(&mut self, message: &str);

    /// Errors recorded so far.
    fn error_count(&self) -> usize;

    fn on_screenshot(&mut self, name: &str, image: &[u8]);

    fn on_tests_finished(&mut self);

    /// Ends the session without running the remaining actions.
    fn force_quit(&mut self, reason: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Running,
    Finished,
    ForceQuit,
}

/// Body of one report entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportEvent {
    TestStart {
        name: String,
    },
    StepStart {
        name: String,
    },
    TestStep {
        step: String,
        name: String,
        passed: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    Message {
        level: LogLevel,
        message: String,
    },
    Error {
        step: String,
        message: String,
    },
    /// Base64-encoded image bytes.
    Screenshot {
        name: String,
        image: Arc<String>,
    },
    ForceQuit {
        reason: String,
    },
    Finished {
        summary: SessionSummary,
    },
}

/// One line of the JSON Lines report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub device: String,
    #[serde(flatten)]
    pub event: ReportEvent,
}

/// Counters that decide the run's outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub test_name: String,
    pub steps_passed: usize,
    pub steps_failed: usize,
    pub errors: usize,
    pub status: SessionStatus,
}

impl SessionSummary {
    /// A run passes when it finished normally with no failed step and no error.
    pub fn passed(&self) -> bool {
        self.status == SessionStatus::Finished && self.steps_failed == 0 && self.errors == 0
    }
}

/// The standard [`SessionSink`]: in-memory ring buffer plus optional report
/// file and store mirror.
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    device: String,
    current_step: String,
    summary: SessionSummary,
    entries: VecDeque<ReportEntry>,
    writer: Option<BufWriter<File>>,
    report_path: Option<PathBuf>,
    mirror: Option<SyncClient>,
    mirrored: u64,
}

impl Session {
    pub fn new(test_name: &str, device: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            device: device.to_string(),
            current_step: PRECONDITION_STEP.to_string(),
            summary: SessionSummary {
                test_name: test_name.to_string(),
                ..SessionSummary::default()
            },
            entries: VecDeque::with_capacity(64),
            writer: None,
            report_path: None,
            mirror: None,
            mirrored: 0,
        }
    }

    /// Persists entries to `<dir>/<test>_<device>_<timestamp>.jsonl`.
    pub fn with_report_dir(mut self, dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let timestamp = self.created_at.format("%Y%m%d_%H%M%S");
        let path = dir.join(format!(
            "{}_{}_{}.jsonl",
            sanitize(&self.summary.test_name),
            sanitize(&self.device),
            timestamp
        ));
        let file = File::create(&path)?;
        self.writer = Some(BufWriter::new(file));
        self.report_path = Some(path);
        Ok(self)
    }

    /// Mirrors every entry except screenshots into the shared store.
    pub fn with_mirror(mut self, sync: SyncClient) -> Self {
        self.mirror = Some(sync);
        self
    }

    pub fn report_path(&self) -> Option<&Path> {
        self.report_path.as_deref()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter()
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    pub fn current_step(&self) -> &str {
        &self.current_step
    }

    fn push(&mut self, event: ReportEvent) {
        let entry = ReportEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            device: self.device.clone(),
            event,
        };

        if let Some(writer) = self.writer.as_mut() {
            if let Ok(json) = serde_json::to_string(&entry) {
                let _ = writeln!(writer, "{}", json);
                let _ = writer.flush();
            }
        }

        if let Some(sync) = &self.mirror {
            if !matches!(entry.event, ReportEvent::Screenshot { .. }) {
                if let Ok(json) = serde_json::to_string(&entry) {
                    let key = sync.log_key(self.mirrored);
                    match sync.write_key(&key, &json) {
                        Ok(()) => self.mirrored += 1,
                        Err(e) => warn!(error = %e, "failed to mirror report entry"),
                    }
                }
            }
        }

        if self.entries.len() >= MAX_REPORT_SIZE {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("device", &self.device)
            .field("summary", &self.summary)
            .field("entries", &self.entries.len())
            .field("report_path", &self.report_path)
            .finish()
    }
}

impl SessionSink for Session {
    fn on_test_start(&mut self, name: &str) {
        info!(test = name, device = %self.device, "test started");
        self.summary.test_name = name.to_string();
        self.push(ReportEvent::TestStart {
            name: name.to_string(),
        });
    }

    fn on_step_start(&mut self, name: &str) {
        debug!(step = name, previous = %self.current_step, "step started");
        self.current_step = name.to_string();
        self.push(ReportEvent::StepStart {
            name: name.to_string(),
        });
    }

    fn on_test_step(&mut self, name: &str, passed: bool, detail: Option<&str>) {
        if passed {
            self.summary.steps_passed += 1;
            info!(step = %self.current_step, name, "check passed");
        } else {
            self.summary.steps_failed += 1;
            warn!(step = %self.current_step, name, detail = detail.unwrap_or(""), "check failed");
        }
        self.push(ReportEvent::TestStep {
            step: self.current_step.clone(),
            name: name.to_string(),
            passed,
            detail: detail.map(str::to_string),
        });
    }

    fn on_message(&mut self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => debug!("{}", message),
            LogLevel::Info => info!("{}", message),
            LogLevel::Warning => warn!("{}", message),
            LogLevel::Error => error!("{}", message),
        }
        self.push(ReportEvent::Message {
            level,
            message: message.to_string(),
        });
    }

    fn on_error(&mut self, message: &str) {
        error!(step = %self.current_step, "{}", message);
        self.summary.errors += 1;
        self.push(ReportEvent::Error {
            step: self.current_step.clone(),
            message: message.to_string(),
        });
    }

    fn error_count(&self) -> usize {
        self.summary.errors
    }

    fn on_screenshot(&mut self, name: &str, image: &[u8]) {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        debug!(name, bytes = image.len(), "screenshot captured");
        self.push(ReportEvent::Screenshot {
            name: name.to_string(),
            image: Arc::new(encoded),
        });
    }

    fn on_tests_finished(&mut self) {
        if self.summary.status == SessionStatus::Running {
            self.summary.status = SessionStatus::Finished;
        }
        info!(
            test = %self.summary.test_name,
            passed = self.summary.steps_passed,
            failed = self.summary.steps_failed,
            errors = self.summary.errors,
            "tests finished"
        );
        self.push(ReportEvent::Finished {
            summary: self.summary.clone(),
        });
    }

    fn force_quit(&mut self, reason: &str) {
        error!(reason, "session force quit");
        self.summary.status = SessionStatus::ForceQuit;
        self.push(ReportEvent::ForceQuit {
            reason: reason.to_string(),
        });
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

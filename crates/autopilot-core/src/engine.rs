//! The session object that owns everything a run needs.
//!
//! The embedding application feeds [`Engine::tick`] one time delta per frame.
//! The first tick announces the test to the session sink and reports any
//! script issues; the tick that ends the run calls `on_tests_finished`
//! exactly once.

use tracing::info;

use crate::action::Context;
use crate::builder::Script;
use crate::config::AutopilotConfig;
use crate::controls::UiControls;
use crate::input::TouchTracker;
use crate::scheduler::{Scheduler, TickOutcome};
use crate::session::SessionSink;
use crate::sync::SyncClient;

/// Drives one device's script against its UI, one frame at a time.
pub struct Engine<C: UiControls, S: SessionSink> {
    test_name: String,
    controls: C,
    session: S,
    touches: TouchTracker,
    sync: SyncClient,
    config: AutopilotConfig,
    scheduler: Scheduler,
    issues: Vec<String>,
    started: bool,
    elapsed: f64,
    outcome: Option<TickOutcome>,
}

impl<C: UiControls, S: SessionSink> Engine<C, S> {
    /// Creates an engine with an empty queue.
    ///
    /// # Arguments
    ///
    /// * `test_name` - Name reported when the session starts
    /// * `controls` - The UI the script drives
    /// * `session` - Receives every report entry
    /// * `sync` - This device's view of the shared store
    /// * `config` - Runtime settings such as `fatal_on_timeout`
    pub fn new(
        test_name: impl Into<String>,
        controls: C,
        session: S,
        sync: SyncClient,
        config: AutopilotConfig,
    ) -> Self {
        Self {
            test_name: test_name.into(),
            controls,
            session,
            touches: TouchTracker::new(),
            sync,
            config,
            scheduler: Scheduler::new(),
            issues: Vec::new(),
            started: false,
            elapsed: 0.0,
            outcome: None,
        }
    }

    /// Appends a built script to the queue. Its issues are reported as
    /// errors when the session starts.
    pub fn load(&mut self, script: Script) {
        self.issues.extend(script.issues);
        self.scheduler.enqueue_all(script.actions);
    }

    /// Advances the run by `dt` seconds. After the run ends, returns the
    /// final outcome without doing anything.
    pub fn tick(&mut self, dt: f32) -> TickOutcome {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }
        if !self.started {
            self.started = true;
            self.session.on_test_start(&self.test_name);
            for issue in std::mem::take(&mut self.issues) {
                self.session.on_error(&format!("script error: {}", issue));
            }
        }
        self.elapsed += f64::from(dt);

        let outcome = {
            let mut ctx = Context::new(
                &mut self.controls,
                &mut self.touches,
                &mut self.session,
                &self.sync,
                &self.config,
            );
            self.scheduler.tick(&mut ctx, dt)
        };

        if outcome.is_terminal() {
            info!(
                test = %self.test_name,
                ticks = self.scheduler.ticks(),
                seconds = self.elapsed,
                outcome = ?outcome,
                "run ended"
            );
            self.session.on_tests_finished();
            self.outcome = Some(outcome.clone());
        }
        outcome
    }

    /// Ticks with a fixed delta until the run ends or `max_ticks` pass.
    pub fn run_fixed(&mut self, dt: f32, max_ticks: u64) -> TickOutcome {
        let mut outcome = TickOutcome::Running;
        for _ in 0..max_ticks {
            outcome = self.tick(dt);
            if outcome.is_terminal() {
                break;
            }
        }
        outcome
    }

    /// Ends the run from outside, e.g. on an interrupt.
    pub fn abort(&mut self, reason: &str) -> TickOutcome {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }
        self.session.force_quit(reason);
        self.session.on_tests_finished();
        let outcome = TickOutcome::Aborted(reason.to_string());
        self.outcome = Some(outcome.clone());
        outcome
    }

    pub fn outcome(&self) -> Option<&TickOutcome> {
        self.outcome.as_ref()
    }

    /// Seconds of tick time fed in so far.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn remaining(&self) -> usize {
        self.scheduler.remaining()
    }

    pub fn controls(&self) -> &C {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut C {
        &mut self.controls
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn touches(&self) -> &TouchTracker {
        &self.touches
    }

    pub fn sync(&self) -> &SyncClient {
        &self.sync
    }

    pub fn into_parts(self) -> (C, S) {
        (self.controls, self.session)
    }
}

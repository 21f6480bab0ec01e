//! Cross-device actions: publishing values and waiting on other devices.
//!
//! A rendezvous never blocks the tick. It polls the shared store at the
//! configured interval and stays in [`PollPhase::Blocked`] between polls.
//! Giving up on another device ends the whole session, since the devices can
//! no longer be assumed to agree on where they are in the script. So does a
//! master conflict or an unexpected number of helpers.

use std::fmt;

use tracing::{debug, info, warn};

use crate::action::{lifecycle_accessors, Action, Context, Lifecycle};
use crate::sync::SyncClient;
use crate::store::StoreError;

/// One shared-store entry, addressed by role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncTarget {
    /// A device's announced state.
    State(String),
    /// A device's pending command.
    Command(String),
    /// A free-form auxiliary string.
    Aux(String),
}

impl SyncTarget {
    pub fn read(&self, sync: &SyncClient) -> String {
        match self {
            SyncTarget::State(device) => sync.read_state(device),
            SyncTarget::Command(device) => sync.read_command(device),
            SyncTarget::Aux(name) => sync.read_string(name),
        }
    }

    pub fn write(&self, sync: &SyncClient, value: &str) -> Result<(), StoreError> {
        match self {
            SyncTarget::State(device) => sync.write_state(device, value),
            SyncTarget::Command(device) => sync.write_command(device, value),
            SyncTarget::Aux(name) => sync.write_string(name, value),
        }
    }
}

impl fmt::Display for SyncTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncTarget::State(d) => write!(f, "state({})", d),
            SyncTarget::Command(d) => write!(f, "command({})", d),
            SyncTarget::Aux(n) => write!(f, "string({})", n),
        }
    }
}

/// Writes a value to the shared store.
#[derive(Debug)]
pub struct PublishAction {
    lifecycle: Lifecycle,
    target: SyncTarget,
    value: String,
}

impl PublishAction {
    pub fn new(target: SyncTarget, value: impl Into<String>) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            target,
            value: value.into(),
        }
    }
}

impl Action for PublishAction {
    fn name(&self) -> &'static str {
        "Publish"
    }

    lifecycle_accessors!();

    fn describe(&self) -> String {
        format!("Publish {}={:?}", self.target, self.value)
    }

    fn on_execute(&mut self, ctx: &mut Context<'_>) {
        if let Err(e) = self.target.write(ctx.sync, &self.value) {
            ctx.report_error(&format!("failed to write {}: {}", self.target, e));
        }
    }
}

/// Helpers a master waits for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelperSet {
    /// Exactly this many devices, whatever their ids.
    Count(usize),
    /// At least these devices, by id.
    Named(Vec<String>),
}

/// What a rendezvous waits for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendezvousCondition {
    /// The entry holds exactly this value.
    Equals { target: SyncTarget, value: String },
    /// Master side: open a fresh generation and wait for helpers to join it.
    HelpersJoined(HelperSet),
    /// Helper side: join the named master's open generation and wait for it
    /// to start.
    MasterStarted(String),
}

impl fmt::Display for RendezvousCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RendezvousCondition::Equals { target, value } => write!(f, "{} == {:?}", target, value),
            RendezvousCondition::HelpersJoined(HelperSet::Count(n)) => write!(f, "helpers({})", n),
            RendezvousCondition::HelpersJoined(HelperSet::Named(helpers)) => {
                write!(f, "ready({})", helpers.join(", "))
            }
            RendezvousCondition::MasterStarted(master) => write!(f, "started({})", master),
        }
    }
}

/// Result of one poll.
enum Check {
    Waiting,
    Met,
    Failed(String),
}

fn master_check(sync: &SyncClient, set: &HelperSet, generation: &mut Option<u64>) -> Check {
    let mine = match *generation {
        Some(g) => g,
        None => match sync.register_master() {
            Ok(g) => {
                info!(generation = g, "master registered");
                *generation = Some(g);
                g
            }
            Err(e) => {
                warn!(error = %e, "master registration failed");
                return Check::Waiting;
            }
        },
    };
    if let Some(current) = sync.read_generation(sync.device()) {
        if current != mine {
            return Check::Failed("Multiplayer Master Conflict".to_string());
        }
    }
    let joined = match sync.joined_helpers(sync.device(), mine) {
        Ok(joined) => joined,
        Err(e) => {
            warn!(error = %e, "cannot list joined helpers");
            return Check::Waiting;
        }
    };
    let complete = match set {
        HelperSet::Count(n) if joined.len() > *n => {
            return Check::Failed(format!(
                "Multiplayer Master wrong Helpers count: expected {}, joined {}",
                n,
                joined.len()
            ));
        }
        HelperSet::Count(n) => joined.len() == *n,
        HelperSet::Named(names) => names.iter().all(|n| joined.contains(n)),
    };
    if !complete {
        return Check::Waiting;
    }
    match sync.start_generation(mine) {
        Ok(()) => Check::Met,
        Err(e) => {
            warn!(error = %e, "cannot start generation");
            Check::Waiting
        }
    }
}

fn helper_check(sync: &SyncClient, master: &str, joined: &mut Option<u64>) -> Check {
    let Some(current) = sync.read_generation(master) else {
        return Check::Waiting;
    };
    if *joined == Some(current) {
        return if sync.is_started(master, current) {
            Check::Met
        } else {
            Check::Waiting
        };
    }
    if sync.is_started(master, current) {
        debug!(master, generation = current, "generation already started");
        return Check::Waiting;
    }
    if let Some(previous) = *joined {
        info!(master, previous, current, "master generation changed");
    }
    match sync.register_helper(master, current) {
        Ok(()) => {
            info!(master, generation = current, "joined master");
            *joined = Some(current);
        }
        Err(e) => warn!(error = %e, "cannot join master"),
    }
    Check::Waiting
}

/// Where a rendezvous stands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollPhase {
    /// Waiting; the store is read again once `until_poll` reaches zero.
    Blocked { until_poll: f32 },
    Satisfied,
    TimedOut,
    /// A conflict the devices cannot recover from.
    Failed,
}

/// Polls the shared store until a condition holds.
#[derive(Debug)]
pub struct RendezvousAction {
    lifecycle: Lifecycle,
    condition: RendezvousCondition,
    timeout: f32,
    poll_interval: f32,
    elapsed: f32,
    phase: PollPhase,
    /// Generation this device registered or joined.
    generation: Option<u64>,
}

impl RendezvousAction {
    pub fn new(condition: RendezvousCondition, timeout: f32, poll_interval: f32) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            condition,
            timeout,
            poll_interval,
            elapsed: 0.0,
            phase: PollPhase::Blocked { until_poll: 0.0 },
            generation: None,
        }
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    /// Generation registered (master) or joined (helper) so far.
    pub fn generation(&self) -> Option<u64> {
        self.generation
    }

    fn poll(&mut self, ctx: &mut Context<'_>) {
        let check = match &self.condition {
            RendezvousCondition::Equals { target, value } => {
                if target.read(ctx.sync) == *value {
                    Check::Met
                } else {
                    Check::Waiting
                }
            }
            RendezvousCondition::HelpersJoined(set) => {
                master_check(ctx.sync, set, &mut self.generation)
            }
            RendezvousCondition::MasterStarted(master) => {
                helper_check(ctx.sync, master, &mut self.generation)
            }
        };
        self.phase = match check {
            Check::Met => {
                debug!(condition = %self.condition, elapsed = self.elapsed, "rendezvous satisfied");
                PollPhase::Satisfied
            }
            Check::Waiting => PollPhase::Blocked {
                until_poll: self.poll_interval,
            },
            Check::Failed(message) => {
                ctx.report_error(&message);
                ctx.force_quit(&message);
                PollPhase::Failed
            }
        };
    }
}

impl Action for RendezvousAction {
    fn name(&self) -> &'static str {
        "Rendezvous"
    }

    lifecycle_accessors!();

    fn describe(&self) -> String {
        format!("Rendezvous {} timeout={:.2}", self.condition, self.timeout)
    }

    fn on_execute(&mut self, ctx: &mut Context<'_>) {
        self.poll(ctx);
    }

    fn on_update(&mut self, ctx: &mut Context<'_>, dt: f32) {
        let PollPhase::Blocked { until_poll } = self.phase else {
            return;
        };
        self.elapsed += dt;
        if self.elapsed >= self.timeout {
            self.phase = PollPhase::TimedOut;
            let message = format!("Multiplayer wait timeout: {}", self.condition);
            ctx.report_error(&message);
            ctx.force_quit(&message);
            return;
        }
        let until_poll = until_poll - dt;
        if until_poll <= 0.0 {
            self.poll(ctx);
        } else {
            self.phase = PollPhase::Blocked { until_poll };
        }
    }

    fn test_condition(&mut self, _ctx: &mut Context<'_>) -> bool {
        !matches!(self.phase, PollPhase::Blocked { .. })
    }
}

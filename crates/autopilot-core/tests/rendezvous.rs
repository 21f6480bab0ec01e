//! Cross-device coordination through a shared store.

mod common;

use std::sync::Arc;

use autopilot_core::action::Action;
use autopilot_core::actions::{
    HelperSet, PollPhase, RendezvousAction, RendezvousCondition, SyncTarget,
};
use autopilot_core::builder::{Script, ScriptBuilder};
use autopilot_core::config::AutopilotConfig;
use autopilot_core::engine::Engine;
use autopilot_core::scheduler::TickOutcome;
use autopilot_core::store::{MemoryStore, SharedStore};
use autopilot_core::sync::{SyncClient, READY};

use common::{CountingStore, Harness, MockControls, RecordingSink};

fn device_config(device: &str) -> AutopilotConfig {
    AutopilotConfig {
        device: device.to_string(),
        poll_interval: 0.1,
        rendezvous_timeout: 5.0,
        ..AutopilotConfig::default()
    }
}

fn client(store: &MemoryStore, device: &str) -> SyncClient {
    SyncClient::new(Arc::new(store.clone()), "duo", device)
}

fn device(
    store: &MemoryStore,
    config: AutopilotConfig,
    build: impl FnOnce(&mut ScriptBuilder),
) -> Engine<MockControls, RecordingSink> {
    let mut b = ScriptBuilder::new(&config);
    build(&mut b);
    let script: Script = b.finish();
    let sync = client(store, &config.device);
    let mut engine = Engine::new(
        "duo",
        MockControls::new(),
        RecordingSink::default(),
        sync,
        config,
    );
    engine.load(script);
    engine
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

#[test]
fn master_and_helper_complete_a_handshake() {
    let store = MemoryStore::new();
    let mut master = device(&store, device_config("master"), |b| {
        b.wait_for_helpers(vec!["helper1".into()], None)
            .announce(READY)
            .write_command("helper1", "jump")
            .wait_for_state("helper1", "jumped", None);
    });
    let mut helper = device(&store, device_config("helper1"), |b| {
        b.wait_for_master("master", None)
            .wait_for_command("helper1", "jump", None)
            .announce("jumped");
    });

    let mut frames = 0;
    let (m, h) = loop {
        let m = master.tick(0.05);
        let h = helper.tick(0.05);
        if m.is_terminal() && h.is_terminal() {
            break (m, h);
        }
        frames += 1;
        assert!(frames < 1000, "devices never met");
    };

    assert_eq!(m, TickOutcome::Finished);
    assert_eq!(h, TickOutcome::Finished);
    assert!(master.session().errors().is_empty());
    assert!(helper.session().errors().is_empty());
    assert_eq!(master.sync().read_state("helper1"), "jumped");
    assert_eq!(helper.sync().read_state("master"), READY);
}

#[test]
fn helper_waits_while_master_is_absent() {
    let store = MemoryStore::new();
    let mut helper = device(&store, device_config("helper1"), |b| {
        b.wait_for_master("master", None);
    });
    for _ in 0..20 {
        assert_eq!(helper.tick(0.05), TickOutcome::Running);
    }
    assert_eq!(
        store.read("duo/multiplayer/helper1").unwrap().as_deref(),
        Some(READY)
    );

    let master = client(&store, "master");
    let generation = master.register_master().unwrap();
    assert_eq!(helper.run_fixed(0.05, 4), TickOutcome::Running);
    assert_eq!(
        master.joined_helpers("master", generation).unwrap(),
        vec!["helper1".to_string()]
    );

    master.start_generation(generation).unwrap();
    let outcome = helper.run_fixed(0.05, 10);
    assert_eq!(outcome, TickOutcome::Finished);
}

#[test]
fn anonymous_helpers_satisfy_a_helper_count() {
    let store = MemoryStore::new();
    let mut master = device(&store, device_config("master"), |b| {
        b.wait_for_helper_count(2, None).announce("go");
    });
    let mut helpers: Vec<_> = ["phone-a", "phone-b"]
        .iter()
        .map(|id| {
            device(&store, device_config(id), |b| {
                b.wait_for_master("master", None);
            })
        })
        .collect();

    let mut frames = 0;
    loop {
        let m = master.tick(0.05);
        let outcomes: Vec<TickOutcome> = helpers.iter_mut().map(|h| h.tick(0.05)).collect();
        let done = outcomes.iter().all(TickOutcome::is_terminal);
        if m.is_terminal() && done {
            assert_eq!(m, TickOutcome::Finished);
            break;
        }
        frames += 1;
        assert!(frames < 1000, "devices never met");
    }
    assert_eq!(master.sync().read_state("master"), "go");
}

#[test]
fn a_started_generation_from_an_earlier_run_is_not_joined() {
    let store = MemoryStore::new();
    let earlier = client(&store, "master");
    let old = earlier.register_master().unwrap();
    client(&store, "helper1").register_helper("master", old).unwrap();
    earlier.start_generation(old).unwrap();
    assert_eq!(earlier.read_state("master"), READY);

    let mut helper = device(&store, device_config("helper1"), |b| {
        b.wait_for_master("master", None);
    });
    for _ in 0..20 {
        assert_eq!(helper.tick(0.05), TickOutcome::Running);
    }

    let mut master = device(&store, device_config("master"), |b| {
        b.wait_for_helper_count(1, None);
    });
    for _ in 0..10 {
        assert_eq!(
            master.tick(0.05),
            TickOutcome::Running,
            "a join from the earlier generation does not count"
        );
    }
    assert_eq!(master.sync().read_generation("master"), Some(old + 1));

    let mut frames = 0;
    let (m, h) = loop {
        let m = master.tick(0.05);
        let h = helper.tick(0.05);
        if m.is_terminal() && h.is_terminal() {
            break (m, h);
        }
        frames += 1;
        assert!(frames < 1000, "devices never met");
    };
    assert_eq!(m, TickOutcome::Finished);
    assert_eq!(h, TickOutcome::Finished);
}

// ---------------------------------------------------------------------------
// Master failures
// ---------------------------------------------------------------------------

#[test]
fn second_master_registration_is_a_conflict() {
    let store = MemoryStore::new();
    let mut master = device(&store, device_config("master"), |b| {
        b.wait_for_helper_count(1, None);
    });
    assert_eq!(master.tick(0.05), TickOutcome::Running);
    assert_eq!(master.sync().read_generation("master"), Some(1));

    client(&store, "master").register_master().unwrap();
    let outcome = master.run_fixed(0.05, 20);
    let reason = "Multiplayer Master Conflict";
    assert_eq!(outcome, TickOutcome::Aborted(reason.to_string()));
    assert_eq!(master.session().errors(), vec![reason]);
    assert!(master.session().quit());
}

#[test]
fn too_many_helpers_fail_the_count() {
    let store = MemoryStore::new();
    let mut master = device(&store, device_config("master"), |b| {
        b.wait_for_helper_count(1, None);
    });
    assert_eq!(master.tick(0.05), TickOutcome::Running);
    client(&store, "helper1").register_helper("master", 1).unwrap();
    client(&store, "helper2").register_helper("master", 1).unwrap();

    let outcome = master.run_fixed(0.05, 20);
    let reason = "Multiplayer Master wrong Helpers count: expected 1, joined 2";
    assert_eq!(outcome, TickOutcome::Aborted(reason.to_string()));
    assert_eq!(master.session().errors(), vec![reason]);
}

// ---------------------------------------------------------------------------
// Timeout
// ---------------------------------------------------------------------------

#[test]
fn timeout_ends_the_session() {
    let store = MemoryStore::new();
    let config = AutopilotConfig {
        rendezvous_timeout: 0.5,
        ..device_config("helper1")
    };
    let mut helper = device(&store, config, |b| {
        b.wait_for_state("master", READY, None).announce("after");
    });

    let outcome = helper.run_fixed(0.1, 100);
    let reason = "Multiplayer wait timeout: state(master) == \"ready\"";
    assert_eq!(outcome, TickOutcome::Aborted(reason.to_string()));
    assert_eq!(helper.session().errors(), vec![reason]);
    assert!(helper.session().quit());
    assert_eq!(
        helper.sync().read_state("helper1"),
        autopilot_core::store::NOT_FOUND,
        "actions after the timeout never run"
    );
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

#[test]
fn store_is_polled_at_the_configured_interval() {
    let store = CountingStore::default();
    let mut h = Harness::new();
    h.sync = SyncClient::new(Arc::new(store.clone()), "poll", "helper1");

    let condition = RendezvousCondition::Equals {
        target: SyncTarget::State("master".into()),
        value: READY.into(),
    };
    let mut wait = RendezvousAction::new(condition, 1.0, 0.25);
    let mut ctx = h.ctx();
    wait.execute(&mut ctx);
    assert_eq!(store.reads(), 1, "first poll happens on execute");

    for _ in 0..8 {
        wait.update(&mut ctx, 0.125);
    }
    assert_eq!(store.reads(), 4, "one read per elapsed poll interval");
    assert_eq!(wait.phase(), PollPhase::TimedOut);
    assert!(wait.is_executed());
    assert!(ctx.quit_reason().is_some());
}

#[test]
fn named_helpers_complete_on_the_next_poll() {
    let mut h = Harness::new();
    let helper1 = SyncClient::new(Arc::new(h.store.clone()), "test-run", "helper1");
    let helper2 = SyncClient::new(Arc::new(h.store.clone()), "test-run", "helper2");

    let mut wait = RendezvousAction::new(
        RendezvousCondition::HelpersJoined(HelperSet::Named(vec![
            "helper1".into(),
            "helper2".into(),
        ])),
        1.0,
        0.25,
    );
    let mut ctx = h.ctx();
    wait.execute(&mut ctx);
    assert_eq!(wait.generation(), Some(1));
    assert!(matches!(wait.phase(), PollPhase::Blocked { .. }));

    helper1.register_helper("master", 1).unwrap();
    helper2.register_helper("master", 1).unwrap();
    wait.update(&mut ctx, 0.25);
    assert_eq!(wait.phase(), PollPhase::Satisfied);
    assert!(wait.is_executed());
    assert!(ctx.sync.is_started("master", 1));
    assert_eq!(ctx.sync.read_state("master"), READY);
}

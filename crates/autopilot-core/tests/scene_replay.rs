//! End-to-end runs of built scripts against a scene with a real session.

use std::sync::Arc;

use autopilot_core::builder::ScriptBuilder;
use autopilot_core::config::AutopilotConfig;
use autopilot_core::engine::Engine;
use autopilot_core::geometry::Point;
use autopilot_core::scene::Scene;
use autopilot_core::scheduler::TickOutcome;
use autopilot_core::session::{ReportEntry, ReportEvent, Session, SessionStatus};
use autopilot_core::store::MemoryStore;
use autopilot_core::sync::SyncClient;

const SCENE: &str = r#"{
    "screens": [
        { "name": "Main", "children": [
            { "name": "Play", "type": "button", "on_tap": "Game",
              "frame": {"x": 0, "y": 100, "width": 200, "height": 50} },
            { "name": "Login", "type": "text_field",
              "frame": {"x": 300, "y": 0, "width": 200, "height": 50} }
        ] },
        { "name": "Game", "children": [
            { "name": "Score", "type": "text", "text": "0",
              "frame": {"x": 0, "y": 0, "width": 100, "height": 30} }
        ] }
    ]
}"#;

fn engine(session: Session, store: &MemoryStore) -> Engine<Scene, Session> {
    let scene = Scene::from_json(SCENE).unwrap();
    let sync = SyncClient::new(Arc::new(store.clone()), "replay", "master");
    Engine::new("login", scene, session, sync, AutopilotConfig::default())
}

fn login_script() -> ScriptBuilder {
    let mut b = ScriptBuilder::new(&AutopilotConfig::default());
    b.step("Login")
        .click_control("Login", Point::ZERO, 1)
        .keyboard_input("bob")
        .assert_text("name typed", "bob", "Login")
        .step("Play")
        .click_control("Play", Point::ZERO, 1)
        .wait_for_screen("Game", Some(2.0))
        .assert_text("score reset", "0", "Score")
        .screenshot("end");
    b
}

// ---------------------------------------------------------------------------
// Full run
// ---------------------------------------------------------------------------

#[test]
fn login_flow_passes_and_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let session = Session::new("login", "master")
        .with_report_dir(dir.path())
        .unwrap();
    let store = MemoryStore::new();
    let mut engine = engine(session, &store);
    engine.load(login_script().finish());

    assert_eq!(engine.run_fixed(1.0 / 30.0, 1000), TickOutcome::Finished);
    assert_eq!(engine.controls().active_screen(), "Game");

    let summary = engine.session().summary().clone();
    assert_eq!(summary.steps_passed, 2);
    assert_eq!(summary.errors, 0);
    assert_eq!(summary.status, SessionStatus::Finished);
    assert!(summary.passed());

    let path = engine.session().report_path().unwrap().to_path_buf();
    let text = std::fs::read_to_string(path).unwrap();
    let entries: Vec<ReportEntry> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert!(matches!(entries.first().unwrap().event, ReportEvent::TestStart { .. }));
    assert!(matches!(entries.last().unwrap().event, ReportEvent::Finished { .. }));
    let checks: Vec<(&str, &str)> = entries
        .iter()
        .filter_map(|e| match &e.event {
            ReportEvent::TestStep { step, name, .. } => Some((step.as_str(), name.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(checks, vec![("Login", "name typed"), ("Play", "score reset")]);
    assert!(entries
        .iter()
        .any(|e| matches!(&e.event, ReportEvent::Screenshot { name, .. } if name == "end")));
}

#[test]
fn mirrored_entries_land_in_the_store() {
    let store = MemoryStore::new();
    let mirror = SyncClient::new(Arc::new(store.clone()), "replay", "master");
    let session = Session::new("login", "master").with_mirror(mirror);
    let mut engine = engine(session, &store);
    engine.load(login_script().finish());

    assert_eq!(engine.run_fixed(1.0 / 30.0, 1000), TickOutcome::Finished);
    let first = engine.sync().read_key("replay/log/master/0");
    let entry: ReportEntry = serde_json::from_str(&first).unwrap();
    assert!(matches!(entry.event, ReportEvent::TestStart { .. }));
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn script_issues_fail_the_run() {
    let store = MemoryStore::new();
    let mut engine = engine(Session::new("login", "master"), &store);
    let mut b = login_script();
    b.issue("unknown action Shake");
    engine.load(b.finish());

    assert_eq!(engine.run_fixed(1.0 / 30.0, 1000), TickOutcome::Finished);
    let session = engine.session();
    assert_eq!(session.summary().errors, 1);
    assert!(!session.summary().passed());
    assert!(session.entries().any(|e| matches!(
        &e.event,
        ReportEvent::Error { message, .. } if message == "script error: unknown action Shake"
    )));
}

#[test]
fn wrong_screen_times_out_without_aborting() {
    let store = MemoryStore::new();
    let mut engine = engine(Session::new("login", "master"), &store);
    let mut b = ScriptBuilder::new(&AutopilotConfig::default());
    b.wait_for_screen("Settings", Some(0.5))
        .assert_bool("play visible", true, "Play");
    engine.load(b.finish());

    assert_eq!(engine.run_fixed(0.1, 100), TickOutcome::Finished);
    let summary = engine.session().summary();
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.steps_passed, 1, "later actions still run");
}

#[test]
fn failed_wait_is_followed_by_an_error_screenshot() {
    let store = MemoryStore::new();
    let mut engine = engine(Session::new("login", "master"), &store);
    let mut b = ScriptBuilder::new(&AutopilotConfig::default());
    b.wait_for_ui("Settings", Some(0.3))
        .wait_for_ui("Missing", Some(0.3));
    engine.load(b.finish());

    assert_eq!(engine.run_fixed(0.1, 100), TickOutcome::Finished);
    let events: Vec<&ReportEvent> = engine.session().entries().map(|e| &e.event).collect();
    let shots: Vec<(usize, &str)> = events
        .iter()
        .enumerate()
        .filter_map(|(i, e)| match e {
            ReportEvent::Screenshot { name, image } => {
                assert!(!image.is_empty());
                Some((i, name.as_str()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(shots.len(), 2);
    assert_eq!(shots[0].1, "error_1");
    assert_eq!(shots[1].1, "error_2");
    for (i, _) in shots {
        assert!(
            matches!(events[i - 1], ReportEvent::Error { message, .. } if message.ends_with("timeout")),
            "screenshot follows the error"
        );
    }
}

#[test]
fn abort_ends_the_run_once() {
    let store = MemoryStore::new();
    let mut engine = engine(Session::new("login", "master"), &store);
    engine.load(login_script().finish());
    assert_eq!(engine.tick(0.016), TickOutcome::Running);

    let outcome = engine.abort("interrupted");
    assert_eq!(outcome, TickOutcome::Aborted("interrupted".into()));
    assert_eq!(engine.tick(0.016), outcome, "ticks after the end are no-ops");
    assert_eq!(engine.session().summary().status, SessionStatus::ForceQuit);
}

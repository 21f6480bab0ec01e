//! Getter and assertion behavior against the mock UI and the shared store.

mod common;

use autopilot_core::action::Action;
use autopilot_core::actions::{AssertAction, GetterAction, GetterSource, SetTextAction, Value};
use autopilot_core::geometry::Rect;
use autopilot_core::session::LogLevel;
use autopilot_core::store::NOT_FOUND;

use common::{Harness, MockControls, SinkCall};

fn run(h: &mut Harness, action: &mut dyn Action) {
    let mut ctx = h.ctx();
    action.execute(&mut ctx);
    action.update(&mut ctx, 0.016);
    assert!(action.is_executed(), "{} should finish in one tick", action.name());
}

fn ui() -> MockControls {
    MockControls::new()
        .with_control("Main/Title", Rect::new(0.0, 0.0, 100.0, 20.0), Some("Welcome"))
        .with_control("Main/Subtitle", Rect::new(0.0, 20.0, 100.0, 20.0), Some("Welcome"))
        .with_control("Main/Score", Rect::new(0.0, 40.0, 100.0, 20.0), Some("10"))
        .with_control("Main/Icon", Rect::new(0.0, 60.0, 20.0, 20.0), None)
}

// ---------------------------------------------------------------------------
// Getters
// ---------------------------------------------------------------------------

#[test]
fn getter_reads_once_and_keeps_its_value() {
    let mut h = Harness::with_controls(ui());
    let mut getter = GetterAction::new(GetterSource::ControlText("Main/Score".into()));
    {
        let mut ctx = h.ctx();
        assert_eq!(getter.get(&mut ctx), Value::from("10"));
    }
    assert!(getter.is_executed());

    h.controls.controls[2].1.text = Some("20".into());
    let mut ctx = h.ctx();
    assert_eq!(getter.get(&mut ctx), Value::from("10"), "value is captured at execute");
}

#[test]
fn getter_on_control_without_text_is_missing() {
    let mut h = Harness::with_controls(ui());
    let mut getter = GetterAction::new(GetterSource::ControlText("Main/Icon".into()));
    {
        let mut ctx = h.ctx();
        assert_eq!(getter.get(&mut ctx), Value::Missing);
    }
    assert!(h.sink.calls.is_empty(), "the control resolved");
}

#[test]
fn getter_on_missing_control_logs_the_path() {
    let mut h = Harness::with_controls(ui());
    let mut getter = GetterAction::new(GetterSource::ControlText("Main/Popup/Label".into()));
    {
        let mut ctx = h.ctx();
        assert_eq!(getter.get(&mut ctx), Value::Missing);
    }
    assert_eq!(
        h.sink.calls,
        vec![SinkCall::Message(
            LogLevel::Debug,
            "Control Main/Popup/Label not found".into()
        )]
    );
    assert!(h.sink.errors().is_empty(), "a missing value is not an error");
}

#[test]
fn remote_command_reads_sentinel_when_absent() {
    let mut h = Harness::new();
    let mut getter = GetterAction::new(GetterSource::RemoteCommand("helper1".into()));
    let mut ctx = h.ctx();
    assert_eq!(getter.get(&mut ctx), Value::from(NOT_FOUND));
}

// ---------------------------------------------------------------------------
// Assertions
// ---------------------------------------------------------------------------

#[test]
fn assert_bool_on_present_and_absent_controls() {
    let mut h = Harness::with_controls(ui());
    let mut present = AssertAction::new(
        "title shown",
        GetterSource::Literal(Value::Bool(true)),
        GetterSource::ControlPresent("Main/Title".into()),
    );
    let mut absent = AssertAction::new(
        "popup hidden",
        GetterSource::Literal(Value::Bool(false)),
        GetterSource::ControlPresent("Main/Popup".into()),
    );
    run(&mut h, &mut present);
    run(&mut h, &mut absent);
    assert_eq!(h.sink.steps(), vec![("title shown", true), ("popup hidden", true)]);
    assert!(h.sink.errors().is_empty());
}

#[test]
fn assert_text_failure_is_a_step_not_an_error() {
    let mut h = Harness::with_controls(ui());
    let mut check = AssertAction::new(
        "score",
        GetterSource::Literal(Value::from("99")),
        GetterSource::ControlText("Main/Score".into()),
    );
    run(&mut h, &mut check);

    assert_eq!(h.sink.steps(), vec![("score", false)]);
    assert!(h.sink.errors().is_empty());
    assert!(!h.sink.quit(), "failed steps do not stop the run by default");
    let detail = h.sink.calls.iter().find_map(|c| match c {
        SinkCall::TestStep { detail, .. } => detail.clone(),
        _ => None,
    });
    let detail = detail.expect("failed step carries detail");
    assert!(detail.contains("\"99\""), "{}", detail);
    assert!(detail.contains("\"10\""), "{}", detail);
}

#[test]
fn assert_same_text_compares_two_controls() {
    let mut h = Harness::with_controls(ui());
    let mut same = AssertAction::new(
        "headers match",
        GetterSource::ControlText("Main/Title".into()),
        GetterSource::ControlText("Main/Subtitle".into()),
    );
    let mut different = AssertAction::new(
        "title is score",
        GetterSource::ControlText("Main/Title".into()),
        GetterSource::ControlText("Main/Score".into()),
    );
    run(&mut h, &mut same);
    run(&mut h, &mut different);
    assert_eq!(
        h.sink.steps(),
        vec![("headers match", true), ("title is score", false)]
    );
}

#[test]
fn remote_command_matches_after_write() {
    let mut h = Harness::new();
    h.sync.write_command("helper1", "jump").unwrap();
    let mut check = AssertAction::new(
        "helper told to jump",
        GetterSource::Literal(Value::from("jump")),
        GetterSource::RemoteCommand("helper1".into()),
    );
    run(&mut h, &mut check);
    assert_eq!(h.sink.steps(), vec![("helper told to jump", true)]);
}

#[test]
fn failed_step_stops_the_run_when_configured() {
    let mut h = Harness::with_controls(ui());
    h.config.stop_on_failed_step = true;
    let mut check = AssertAction::new(
        "score",
        GetterSource::Literal(Value::from("0")),
        GetterSource::ControlText("Main/Score".into()),
    );
    let quit = {
        let mut ctx = h.ctx();
        check.execute(&mut ctx);
        ctx.quit_reason().map(str::to_string)
    };
    assert_eq!(quit.as_deref(), Some("step failed: score"));
    assert!(h.sink.quit());
}

// ---------------------------------------------------------------------------
// SetText
// ---------------------------------------------------------------------------

#[test]
fn set_text_replaces_control_text() {
    let mut h = Harness::with_controls(ui());
    let mut set = SetTextAction::new("Main/Score".into(), "42");
    run(&mut h, &mut set);
    assert_eq!(h.controls.controls[2].1.text.as_deref(), Some("42"));
}

#[test]
fn set_text_on_missing_control_reports_error() {
    let mut h = Harness::with_controls(ui());
    let mut set = SetTextAction::new("Main/Nope".into(), "42");
    run(&mut h, &mut set);
    assert_eq!(h.sink.errors().len(), 1);
}

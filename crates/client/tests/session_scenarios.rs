//! End-to-end client sessions without network or timers
//!
//! Each test plays the host: it feeds server frames and user input into a
//! `FarmApp`, records the returned actions, and resolves pacing waits by
//! hand.

use std::time::Duration;

use cyberfarm_client::{
    drive, Action, AckTicket, ExecState, FarmApp, ImageSize, Point, Viewport,
};
use cyberfarm_protocol::{Bootstrap, ClientMessage};
use proptest::prelude::*;

fn bootstrap(grid: usize, gold: i64) -> Bootstrap {
    let row = vec![serde_json::Value::Null; grid];
    let body = serde_json::json!({
        "config": {
            "grid": grid,
            "background": "assets/farm_bg.webp",
            "field_ratio": {
                "topLeft": [0.0, 0.0],
                "topRight": [1.0, 0.0],
                "bottomLeft": [0.0, 1.0],
                "bottomRight": [1.0, 1.0]
            },
            "exec_interval": 100
        },
        "farm": {"type": "snapshot", "grid": vec![row; grid], "gold": gold, "time": 0.0}
    });
    Bootstrap::from_json(&body.to_string()).unwrap()
}

fn laid_out_app(grid: usize, gold: i64) -> FarmApp {
    let mut app = FarmApp::from_bootstrap(bootstrap(grid, gold)).unwrap();
    app.animation_frame(
        0.0,
        Viewport {
            width: 500.0,
            height: 500.0,
        },
        Some(ImageSize {
            width: 500.0,
            height: 500.0,
        }),
    );
    app
}

fn event(line: u32, x: i64, y: i64, gold: i64) -> String {
    format!(r#"{{"type":"event","event":{{"line":{line},"x":{x},"y":{y},"gold":{gold}}}}}"#)
}

fn sent(actions: &[Action]) -> Vec<ClientMessage> {
    actions
        .iter()
        .filter_map(|a| match a {
            Action::Send(msg) => Some(msg.clone()),
            _ => None,
        })
        .collect()
}

fn scheduled(actions: &[Action]) -> Option<(AckTicket, Duration)> {
    actions.iter().find_map(|a| match a {
        Action::ScheduleAck { ticket, after } => Some((*ticket, *after)),
        _ => None,
    })
}

#[test]
fn test_auto_step_event_floats_gold_and_acks_after_interval() {
    let mut app = laid_out_app(6, 100);
    app.toggle_run("plant('wheat')");

    let actions = app.on_text(&event(3, 0, 0, 105));
    assert!(actions.contains(&Action::HighlightLine(3)));
    assert!(sent(&actions).is_empty());

    let particles = app.scene.overlay.particles();
    assert_eq!(particles.len(), 1);
    assert_eq!(particles[0].text, "+5 💰");
    let anchor = app
        .scene
        .projector()
        .cell_center(0, 0, app.scene.field().unwrap());
    assert!((particles[0].x - anchor.x).abs() < 1e-9);
    assert!((particles[0].y - (anchor.y - 20.0)).abs() < 1e-9);

    let (ticket, after) = scheduled(&actions).unwrap();
    assert_eq!(after, Duration::from_millis(100));
    assert_eq!(sent(&app.pacing_elapsed(ticket)), vec![ClientMessage::Ack]);

    // the label rises and fades out over one second
    drive(&mut app, [0.25; 4]);
    assert!(app.scene.overlay.is_empty());
}

#[test]
fn test_pause_holds_ack_until_resume() {
    let mut app = laid_out_app(6, 100);
    app.toggle_run("");
    let (ticket, _) = scheduled(&app.on_text(&event(1, 0, 0, 100))).unwrap();
    assert_eq!(sent(&app.pacing_elapsed(ticket)), vec![ClientMessage::Ack]);

    app.toggle_run("");
    assert_eq!(app.controller.state(), ExecState::PausedAuto);

    let actions = app.on_text(&event(2, 1, 0, 100));
    assert!(scheduled(&actions).is_none());
    assert!(sent(&actions).is_empty());

    let resumed = app.toggle_run("");
    assert_eq!(sent(&resumed), vec![ClientMessage::Ack]);
    assert_eq!(app.controller.state(), ExecState::RunningAuto);
}

#[test]
fn test_new_record_result_omits_best_roi_line() {
    let mut app = laid_out_app(6, 100);
    app.toggle_run("");
    let actions = app.on_text(
        r#"{"type":"done","result":{"cost":20,"gain":35,"roi":0.75,"best_roi":0.75,"new_record":true}}"#,
    );
    let logs: Vec<&str> = actions
        .iter()
        .filter_map(|a| match a {
            Action::Log(text) => Some(text.as_str()),
            _ => None,
        })
        .collect();

    assert!(logs[0].contains("🏆 New Best ROI!"));
    assert!(logs[0].contains("📈 ROI: 75%"));
    assert!(!logs[0].contains("Best ROI:"));
    assert_eq!(logs[1], "[system] done");
    assert_eq!(app.controller.state(), ExecState::Idle);
    assert!(actions.contains(&Action::ClearHighlight));
}

#[test]
fn test_shared_boundary_resolves_to_first_scanned_cell() {
    let mut app = laid_out_app(5, 0);
    // cells are 125px; x = 375 is the edge between columns 2 and 3
    let hit = app.pointer_moved(Point::new(375.0, 187.5)).unwrap();
    assert_eq!((hit.x, hit.y), (2, 1));

    let hit = app.pointer_moved(Point::new(375.5, 187.5)).unwrap();
    assert_eq!((hit.x, hit.y), (3, 1));

    app.pointer_left();
    assert!(app.scene.hovered().is_none());
}

#[test]
fn test_idle_snapshot_updates_hud() {
    let mut app = laid_out_app(3, 0);
    app.on_text(r#"{"type":"farm_state","farm":{"grid":[],"gold":42,"time":9.0}}"#);
    let frame = app.animation_frame(16.0, Viewport::default(), None);
    assert_eq!(frame.hud, "💰 42 | 🕒 9");
}

#[derive(Debug, Clone)]
enum Input {
    Run,
    Step,
    Event(i64),
    Snapshot,
    Done,
    Elapsed,
}

fn input() -> impl Strategy<Value = Input> {
    prop_oneof![
        Just(Input::Run),
        Just(Input::Step),
        (0i64..200).prop_map(Input::Event),
        Just(Input::Snapshot),
        Just(Input::Done),
        Just(Input::Elapsed),
    ]
}

fn feed(app: &mut FarmApp, input: &Input, tickets: &mut Vec<AckTicket>) {
    let actions = match input {
        Input::Run => app.toggle_run(""),
        Input::Step => app.step(""),
        Input::Event(gold) => app.on_text(&event(1, 0, 0, *gold)),
        Input::Snapshot => app.on_text(r#"{"type":"farm_state","farm":{"grid":[],"gold":1}}"#),
        Input::Done => app.on_text(r#"{"type":"done"}"#),
        Input::Elapsed => tickets
            .pop()
            .map(|t| app.pacing_elapsed(t))
            .unwrap_or_default(),
    };
    if let Some((ticket, _)) = scheduled(&actions) {
        tickets.push(ticket);
    }
}

proptest! {
    #[test]
    fn test_abort_always_returns_to_idle(inputs in prop::collection::vec(input(), 0..24)) {
        let mut app = laid_out_app(4, 0);
        let mut tickets = Vec::new();
        // start a session so the abort has something to cancel
        app.toggle_run("");
        for input in &inputs {
            feed(&mut app, input, &mut tickets);
        }
        if app.controller.state() == ExecState::Idle {
            app.step("");
        }

        let aborted = app.abort();
        prop_assert_eq!(sent(&aborted), vec![ClientMessage::Abort]);
        prop_assert_eq!(app.controller.state(), ExecState::Idle);

        // nothing is acknowledged or stepped until a new start
        for ticket in tickets.drain(..) {
            prop_assert!(sent(&app.pacing_elapsed(ticket)).is_empty());
        }
        let actions = app.on_text(&event(2, 0, 0, 5));
        prop_assert!(scheduled(&actions).is_none());
        prop_assert!(sent(&actions).is_empty());
    }
}

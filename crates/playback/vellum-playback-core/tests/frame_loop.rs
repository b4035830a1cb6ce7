use std::cell::RefCell;
use std::rc::Rc;

use vellum_playback::{
    AnimationSelection, ControllerConfig, LoopEvent, LoopMode, LoopState, PlaybackEvent,
    PlaybackOptions,
};
use vellum_test_fixtures::{Harness, MockCanvas};

fn start(h: &mut Harness, src: &str, animations: &[&str]) -> Rc<RefCell<Vec<LoopEvent>>> {
    let loops = Rc::new(RefCell::new(Vec::new()));
    let sink = loops.clone();
    let mut options = PlaybackOptions::new(src);
    options.autoplay = true;
    if !animations.is_empty() {
        let names: Vec<String> = animations.iter().map(|s| s.to_string()).collect();
        options.animations = Some(AnimationSelection::from(names));
    }
    let config = ControllerConfig::new(options, MockCanvas::new(800.0, 600.0).target())
        .on_loop(move |e: &PlaybackEvent| {
            if let PlaybackEvent::Loop(ev) = e {
                sink.borrow_mut().push(ev.clone());
            }
        });
    let controller = h.controller(config);
    h.settle();
    assert_eq!(controller.playback_state(), LoopState::Running);
    loops
}

fn loops_for(loops: &Rc<RefCell<Vec<LoopEvent>>>, name: &str) -> Vec<LoopMode> {
    loops
        .borrow()
        .iter()
        .filter(|e| e.animation_name == name)
        .map(|e| e.loop_mode)
        .collect()
}

#[test]
fn first_frame_draws_in_order_with_zero_elapsed() {
    let mut h = Harness::new();
    let _loops = start(&mut h, "basic.riv", &[]);
    h.journal.clear();

    h.frame(1_000.0);
    assert_eq!(
        h.journal.entries(),
        vec![
            "advance idle 0.000",
            "apply idle Main 1.0",
            "artboard.advance 0.000",
            "clear",
            "save",
            "align Contain Center 800x600 400x300",
            "draw Main",
            "restore",
        ]
    );
    assert_eq!(h.pending_frames(), 1);

    h.journal.clear();
    h.frame(1_016.0);
    assert_eq!(h.journal.entries()[0], "advance idle 0.016");
    assert_eq!(h.journal.count("artboard.advance 0.016"), 1);
}

#[test]
fn every_instance_advances_before_the_artboard() {
    let mut h = Harness::new();
    let _loops = start(&mut h, "basic.riv", &["idle", "bounce"]);
    h.journal.clear();

    h.frame(0.0);
    let entries = h.journal.entries();
    assert_eq!(&entries[..5], &[
        "advance idle 0.000",
        "apply idle Main 1.0",
        "advance bounce 0.000",
        "apply bounce Main 1.0",
        "artboard.advance 0.000",
    ]);
}

#[test]
fn loop_and_ping_pong_report_full_cycles() {
    let mut h = Harness::new();
    let loops = start(&mut h, "basic.riv", &["idle", "bounce"]);

    // 0, 250, 500, 750, 1000 ms
    h.frames(0.0, 250.0, 5);
    assert_eq!(loops_for(&loops, "idle"), vec![LoopMode::Loop]);
    // bounce reverses at 500ms and returns at 1000ms: two raw signals, one event
    assert_eq!(loops_for(&loops, "bounce"), vec![LoopMode::PingPong]);

    h.frames(1_250.0, 250.0, 4);
    assert_eq!(loops_for(&loops, "idle").len(), 2);
    assert_eq!(loops_for(&loops, "bounce").len(), 2);
}

#[test]
fn one_shot_never_reports_loops() {
    let mut h = Harness::new();
    let loops = start(&mut h, "basic.riv", &["intro"]);

    h.frames(0.0, 500.0, 10);
    assert!(loops.borrow().is_empty());
    assert_eq!(h.pending_frames(), 1);
}

#[test]
fn unrecognised_loop_value_is_suppressed() {
    let mut h = Harness::new();
    let loops = start(&mut h, "invalid-loop.riv", &[]);

    h.frames(0.0, 100.0, 5);
    assert!(loops.borrow().is_empty());
    assert_eq!(h.pending_frames(), 1, "playback keeps running");
}

#[test]
fn engine_error_halts_the_loop() {
    let mut h = Harness::new();
    let loops = start(&mut h, "basic.riv", &[]);

    h.frame(0.0);
    assert_eq!(h.pending_frames(), 1);

    h.journal.fail_on("draw");
    h.frame(16.0);
    assert_eq!(h.pending_frames(), 0);

    h.frame(32.0);
    assert_eq!(h.journal.count("advance idle 0.016"), 1);
    assert!(loops.borrow().is_empty());
}

#[test]
fn loop_event_payload_serializes_camel_case() {
    let mut h = Harness::new();
    let loops = start(&mut h, "multi-artboard.riv", &[]);
    // default artboard Main, idle lasts one second
    h.frames(0.0, 500.0, 3);

    let event = loops.borrow()[0].clone();
    let json = serde_json::to_value(PlaybackEvent::Loop(event)).unwrap();
    assert_eq!(json["type"], "loop");
    assert_eq!(json["animationName"], "idle");
    assert_eq!(json["loopMode"], "loop");
}

//! Integration tests for the event-to-track pipeline.
//!
//! A synthetic square of ON events drifts across a 64x64 sensor. The filter
//! bank holds a single centre tap, so the activation map is the blurred
//! centre frame of the window and detections lag the input by half the
//! window depth.

use gabor_tracker::prelude::*;
use gabor_tracker::{AssignmentStrategy, FusionScoreMode, PixelBox, ReportPolicy};
use ndarray::Array3;
use std::sync::atomic::AtomicBool;

const SIZE: usize = 64;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("gabor_tracker=debug")
        .with_test_writer()
        .try_init();
}

fn centre_tap_bank() -> FilterBank {
    let mut k = Array3::<f32>::zeros((7, 3, 3));
    k[[3, 1, 1]] = 1.0;
    FilterBank::from_prepared(vec![k]).unwrap()
}

/// 6x6 block of ON events with its top-left corner at `(row, col)`.
fn square(ts: i64, row: u16, col: u16) -> Vec<Event> {
    (0..6)
        .flat_map(|r| (0..6).map(move |c| Event::new(ts, col + c, row + r, Polarity::On)))
        .collect()
}

fn config() -> GaborTrackerConfig {
    GaborTrackerConfig::builder()
        .frame_window_depth(9)
        .activation_threshold(0.5)
        .build()
        .unwrap()
}

fn run(session: &mut GaborTracker, ticks: i64, drift: bool) -> Vec<TickOutput> {
    (0..ticks)
        .map(|t| {
            let col = if drift { 10 + t as u16 } else { 20 };
            session.process_tick(&square(t * 1000, 20, col)).unwrap()
        })
        .collect()
}

#[test]
fn drifting_square_keeps_one_identity() {
    init_tracing();
    let mut session = GaborTracker::new(config(), centre_tap_bank(), SIZE, SIZE).unwrap();
    let outputs = run(&mut session, 20, true);

    // nothing reaches the window centre before tick 5
    assert!(outputs[..4].iter().all(|o| o.detections.is_empty()));
    assert_eq!(outputs[4].detections.len(), 1);
    assert_eq!(outputs[4].frame_number, Some(1));

    // confirmed on the third consecutive hit
    assert!(outputs[5].tracks.is_empty());
    assert_eq!(outputs[6].tracks.len(), 1);
    assert_eq!(outputs[6].tracks[0].state, TrackState::Confirmed);
    assert_eq!(outputs[6].tracks[0].hits_in_a_row, 3);

    let last = outputs.last().unwrap();
    assert_eq!(last.tracks.len(), 1);
    assert_eq!(last.tracks[0].track_id.get(), 1);
    assert_eq!(last.tracks[0].hits_in_a_row, 16);

    // centre frame at tick 20 is the one pushed at tick 16 (col 10 + 15)
    assert_eq!(
        last.tracks[0].bbox,
        PixelBox { x_min: 25, y_min: 20, x_max: 30, y_max: 25 }
    );
}

#[test]
fn vanished_object_is_lost_then_deleted() {
    let cfg = GaborTrackerConfig::builder()
        .frame_window_depth(9)
        .activation_threshold(0.5)
        .hit_counter_max(5)
        .build()
        .unwrap();
    let mut session = GaborTracker::new(cfg, centre_tap_bank(), SIZE, SIZE).unwrap();
    run(&mut session, 10, false);

    // detections continue until the last square leaves the centre (tick 14)
    let mut states = Vec::new();
    for t in 10..20 {
        let out = session.process_tick(&[Event::new(t * 1000, 0, 0, Polarity::Off)]).unwrap();
        states.push(out.tracks.first().map(|s| s.state));
    }
    assert_eq!(states[3], Some(TrackState::Confirmed));
    assert_eq!(states[4], Some(TrackState::Lost));
    assert_eq!(states[8], Some(TrackState::Lost));
    assert_eq!(states[9], None);
    assert_eq!(session.tracker().track_count(), 0);

    // the same place later gets a brand-new identity
    for t in 20..27 {
        session.process_tick(&square(t * 1000, 20, 20)).unwrap();
    }
    let ids: Vec<u64> = session
        .tracker()
        .all_tracks()
        .iter()
        .map(|t| t.id.get())
        .collect();
    assert_eq!(ids, vec![2]);
}

#[test]
fn identical_runs_are_deterministic() {
    let mut a = GaborTracker::new(config(), centre_tap_bank(), SIZE, SIZE).unwrap();
    let mut b = GaborTracker::new(config(), centre_tap_bank(), SIZE, SIZE).unwrap();
    assert_eq!(run(&mut a, 15, true), run(&mut b, 15, true));
}

#[test]
fn fusion_mode_tracks_across_strides() {
    init_tracing();
    let cfg = GaborTrackerConfig::builder()
        .frame_window_depth(15)
        .temporal_strides(vec![1, 2])
        .activation_threshold(0.5)
        .multi_channel_fusion(true)
        .fusion_score_mode(FusionScoreMode::Average)
        .worker_threads(2)
        .assignment(AssignmentStrategy::Optimal)
        .build()
        .unwrap();
    let mut session = GaborTracker::new(cfg, centre_tap_bank(), SIZE, SIZE).unwrap();

    let outputs = run(&mut session, 14, false);
    let first = outputs
        .iter()
        .find(|o| !o.detections.is_empty())
        .unwrap();
    // centre of a 15-frame window is reached on tick 8
    assert_eq!(first.tick, 8);
    assert_eq!(first.detections.len(), 1);
    // both channels see the same blob at the same peak
    assert!((first.detections[0].score - 1.0).abs() < 1e-5);

    let last = outputs.last().unwrap();
    assert_eq!(last.tracks.len(), 1);
    assert_eq!(
        last.tracks[0].bbox,
        PixelBox { x_min: 20, y_min: 20, x_max: 25, y_max: 25 }
    );
}

#[test]
fn cancelled_tick_does_not_touch_tracker() {
    let mut session = GaborTracker::new(config(), centre_tap_bank(), SIZE, SIZE).unwrap();
    run(&mut session, 7, false);
    let before = session.tracker().reported_tracks();
    assert_eq!(before.len(), 1);

    let flag = AtomicBool::new(true);
    let err = session
        .process_tick_cancellable(&square(7000, 20, 20), &flag)
        .unwrap_err();
    assert!(matches!(err, TrackerError::Cancelled));
    assert!(err.is_recoverable());
    assert_eq!(session.tracker().reported_tracks(), before);

    let flag = AtomicBool::new(false);
    let out = session
        .process_tick_cancellable(&square(8000, 20, 20), &flag)
        .unwrap();
    assert_eq!(out.tracks[0].hits_in_a_row, before[0].hits_in_a_row + 1);
}

#[test]
fn confirmed_only_policy_drops_lost_tracks() {
    let cfg = GaborTrackerConfig::builder()
        .frame_window_depth(9)
        .activation_threshold(0.5)
        .report_policy(ReportPolicy::ConfirmedOnly)
        .build()
        .unwrap();
    let mut session = GaborTracker::new(cfg, centre_tap_bank(), SIZE, SIZE).unwrap();
    run(&mut session, 10, false);
    for t in 10..15 {
        session.process_tick(&[Event::new(t * 1000, 0, 0, Polarity::Off)]).unwrap();
    }
    let out = session.process_tick(&[]).unwrap();
    assert!(out.tracks.is_empty());
    assert_eq!(session.tracker().track_count(), 1);
}

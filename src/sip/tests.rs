use std::{sync::Arc, time::Duration};

use chrono::{NaiveDate, Utc};
use serde_json::Map;

use super::*;
use crate::{
    clock::{Clock, ManualClock, SharedClock},
    db::models::{CupProfile, EventSource, SipEvent},
    error::ValidationError,
    models::DetectionResult,
};

fn sip_detection(clock: &ManualClock, confidence: f64) -> DetectionResult {
    DetectionResult {
        has_sip: true,
        confidence,
        head_tilt_angle: Some(30.0),
        hand_face_distance: Some(70.0),
        face_center: None,
        hand_center: None,
        detection_data: Map::new(),
        timestamp: clock.now(),
        gesture_duration: None,
    }
}

fn aggregator(clock: &ManualClock) -> SipAggregator {
    SipAggregator::new(AggregatorConfig::default(), Arc::new(clock.clone()))
}

/// Holds a sip for `held` (ticking every 100ms), then reports the gesture ended.
fn feed_sip(aggregator: &mut SipAggregator, clock: &ManualClock, held: Duration) -> Option<SipEvent> {
    let step = Duration::from_millis(100);
    let mut elapsed = Duration::ZERO;
    if let Some(event) = aggregator.process_detection(sip_detection(clock, 0.8)) {
        return Some(event);
    }
    while elapsed + step <= held {
        clock.advance(step);
        elapsed += step;
        if let Some(event) = aggregator.process_detection(sip_detection(clock, 0.8)) {
            return Some(event);
        }
    }
    clock.advance(held - elapsed);
    aggregator.process_detection(DetectionResult::gesture_ended(clock.now()))
}

// ---- aggregator ----

#[test]
fn aggregator_finalizes_when_gesture_ends() {
    let clock = ManualClock::new(Utc::now());
    let mut aggregator = aggregator(&clock);
    let started_at = clock.now();

    let event = feed_sip(&mut aggregator, &clock, Duration::from_millis(1500)).expect("sip event");

    assert_eq!(event.source, EventSource::Auto);
    assert_eq!(event.profile_id, DEFAULT_PROFILE_ID);
    assert!((event.confidence.unwrap() - 0.8).abs() < 1e-9);
    assert_eq!(event.timestamp, started_at);
    // 20 * (0.5 + 0.4) * (1.5 / 2)
    assert!((event.ml_estimate - 13.5).abs() < 1e-9);

    let data = event.detection_data.unwrap();
    assert_eq!(data["detection_count"], 16);
    assert_eq!(data["avg_head_tilt"], 30.0);
    assert_eq!(data["detections"].as_array().unwrap().len(), 16);
    assert!(!aggregator.in_progress());
}

#[test]
fn aggregator_ignores_everything_during_cooldown() {
    let clock = ManualClock::new(Utc::now());
    let mut aggregator = aggregator(&clock);

    assert!(feed_sip(&mut aggregator, &clock, Duration::from_secs(1)).is_some());

    // A full valid sip squeezed inside the one-second cooldown.
    for _ in 0..9 {
        clock.advance(Duration::from_millis(100));
        assert!(aggregator.process_detection(sip_detection(&clock, 0.9)).is_none());
        assert!(!aggregator.in_progress());
    }
    assert!(aggregator
        .process_detection(DetectionResult::gesture_ended(clock.now()))
        .is_none());

    clock.advance(Duration::from_millis(100));
    assert!(feed_sip(&mut aggregator, &clock, Duration::from_secs(1)).is_some());
}

#[test]
fn aggregator_discards_candidate_shorter_than_min() {
    let clock = ManualClock::new(Utc::now());
    let mut aggregator = aggregator(&clock);

    assert!(feed_sip(&mut aggregator, &clock, Duration::from_millis(799)).is_none());
    assert!(!aggregator.in_progress());

    // No cooldown was started by the discarded candidate.
    assert!(feed_sip(&mut aggregator, &clock, Duration::from_millis(800)).is_some());
}

#[test]
fn aggregator_gates_on_confidence() {
    let clock = ManualClock::new(Utc::now());
    let mut aggregator = aggregator(&clock);

    assert!(aggregator.process_detection(sip_detection(&clock, 0.49)).is_none());
    assert!(!aggregator.in_progress());

    assert!(aggregator
        .process_detection(sip_detection(&clock, f64::NAN))
        .is_none());
    assert!(!aggregator.in_progress());
}

#[test]
fn aggregator_closes_candidate_past_max() {
    let clock = ManualClock::new(Utc::now());
    let mut aggregator = aggregator(&clock);

    assert!(aggregator.process_detection(sip_detection(&clock, 0.8)).is_none());
    clock.advance(Duration::from_millis(3600));
    let event = aggregator
        .process_detection(sip_detection(&clock, 0.8))
        .expect("overdue candidate finalizes");
    // Duration factor saturates at 1.5.
    assert!((event.ml_estimate - 27.0).abs() < 1e-9);
}

#[test]
fn aggregator_backdates_engine_reported_gesture() {
    let clock = ManualClock::new(Utc::now());
    let mut aggregator = aggregator(&clock);
    let gesture_start = clock.now();

    clock.advance(Duration::from_millis(850));
    let mut detection = sip_detection(&clock, 0.7);
    detection.gesture_duration = Some(Duration::from_millis(850));
    assert!(aggregator.process_detection(detection).is_none());

    clock.advance(Duration::from_millis(33));
    let event = aggregator
        .process_detection(DetectionResult::gesture_ended(clock.now()))
        .expect("engine-reported gesture finalizes on the next quiet tick");
    assert_eq!(event.timestamp, gesture_start);
}

#[test]
fn aggregator_guards_missing_geometry() {
    let clock = ManualClock::new(Utc::now());
    let mut aggregator = aggregator(&clock);

    let mut detection = sip_detection(&clock, 0.9);
    detection.head_tilt_angle = None;
    detection.hand_face_distance = None;
    aggregator.process_detection(detection);
    clock.advance(Duration::from_secs(1));

    let event = aggregator
        .process_detection(DetectionResult::gesture_ended(clock.now()))
        .unwrap();
    let data = event.detection_data.unwrap();
    assert!(data["avg_head_tilt"].is_null());
    assert!(data["avg_hand_distance"].is_null());
}

#[test]
fn aggregator_abandon_and_reset() {
    let clock = ManualClock::new(Utc::now());
    let mut aggregator = aggregator(&clock);

    aggregator.process_detection(sip_detection(&clock, 0.9));
    assert!(aggregator.abandon());
    assert!(!aggregator.abandon());

    clock.advance(Duration::from_secs(1));
    assert!(aggregator
        .process_detection(DetectionResult::gesture_ended(clock.now()))
        .is_none());

    assert!(feed_sip(&mut aggregator, &clock, Duration::from_secs(1)).is_some());
    aggregator.reset();
    assert!(feed_sip(&mut aggregator, &clock, Duration::from_secs(1)).is_some());
}

#[test]
fn ml_estimate_scales_with_confidence_and_duration() {
    assert_eq!(estimate_ml(1.0, 2.0), 20.0);
    assert_eq!(estimate_ml(0.0, 0.5), 5.0);
    assert_eq!(estimate_ml(1.0, 10.0), 30.0);
    assert_eq!(estimate_ml(0.5, 1.0), 7.5);
}

// ---- converter ----

#[test]
fn converter_uses_default_profile() {
    let converter = CupConverter::default();
    assert_eq!(converter.sips_to_cups(20, None), 2.0);
    assert_eq!(converter.ml_to_cups(500.0, None), 2.0);
    assert_eq!(converter.cups_to_ml(1.5, None), 375.0);
}

#[test]
fn converter_round_trips_for_any_profile() {
    let converter = CupConverter::default();
    for size_ml in [1, 7, 180, 250, 333, 1999, 2000] {
        let profile = CupProfile::new("Cup", size_ml, 10, None).unwrap();
        for ml in [0.1, 1.0, 13.37, 250.0, 999.9, 12_345.678] {
            let back = converter.cups_to_ml(converter.ml_to_cups(ml, Some(&profile)), Some(&profile));
            assert!((back - ml).abs() < 1e-9 * ml.max(1.0), "{size_ml}ml: {ml} -> {back}");
        }
    }
}

#[test]
fn estimate_sip_ml_falls_back_to_profile() {
    let converter = CupConverter::default();
    let mut event = SipEvent::manual(Utc::now(), 1, 0.0).unwrap();
    assert_eq!(converter.estimate_sip_ml(&event, None), 25.0);

    let bottle = CupProfile::new("Bottle", 500, 20, None).unwrap();
    assert_eq!(converter.estimate_sip_ml(&event, Some(&bottle)), 25.0);

    event.ml_estimate = 18.0;
    assert_eq!(converter.estimate_sip_ml(&event, Some(&bottle)), 18.0);
}

// ---- tracker ----

fn tracker(clock: &ManualClock) -> SipTracker {
    let shared: SharedClock = Arc::new(clock.clone());
    SipTracker::new(
        SipAggregator::new(AggregatorConfig::default(), shared.clone()),
        CupConverter::default(),
        shared,
    )
}

fn noon_clock() -> ManualClock {
    ManualClock::at_local_noon(NaiveDate::from_ymd_opt(2024, 5, 20).unwrap())
}

#[test]
fn manual_sip_updates_totals() {
    let clock = noon_clock();
    let mut tracker = tracker(&clock);

    let event = tracker.add_manual_sip(50.0, None).unwrap();

    assert_eq!(event.ml_estimate, 50.0);
    assert_eq!(event.source, EventSource::Manual);
    assert_eq!(event.confidence, Some(1.0));
    assert_eq!(tracker.total_sips_today(), 1);
    assert_eq!(tracker.total_ml_today(), 50.0);
}

#[test]
fn manual_sip_rejects_invalid_volume() {
    let clock = noon_clock();
    let mut tracker = tracker(&clock);

    assert_eq!(
        tracker.add_manual_sip(-5.0, None).unwrap_err(),
        ValidationError::SipVolume(-5.0)
    );
    assert!(tracker.add_manual_sip(1000.5, None).is_err());
    assert_eq!(tracker.total_sips_today(), 0);
}

#[test]
fn manual_sip_uses_profile_id() {
    let clock = noon_clock();
    let mut tracker = tracker(&clock);
    let mut profile = CupProfile::new("Mug", 300, 12, None).unwrap();
    profile.id = Some(7);

    let event = tracker.add_manual_sip(25.0, Some(&profile)).unwrap();
    assert_eq!(event.profile_id, 7);
}

#[test]
fn detections_accumulate_into_daily_totals() {
    let clock = noon_clock();
    let mut tracker = tracker(&clock);
    let mut profile = CupProfile::new("Mug", 300, 12, None).unwrap();
    profile.id = Some(3);

    assert!(tracker
        .process_detection(sip_detection(&clock, 0.8), Some(&profile))
        .is_none());
    clock.advance(Duration::from_secs(2));
    let event = tracker
        .process_detection(DetectionResult::gesture_ended(clock.now()), Some(&profile))
        .expect("sip");

    assert_eq!(event.profile_id, 3);
    let stats = tracker.get_daily_stats();
    assert_eq!(stats.total_sips, 1);
    assert_eq!(stats.total_ml, event.ml_estimate);
    assert_eq!(stats.total_cups, event.ml_estimate / 250.0);
    assert_eq!(stats.sip_events.len(), 1);
}

#[test]
fn day_rollover_zeroes_before_new_contribution() {
    let clock = noon_clock();
    let mut tracker = tracker(&clock);
    tracker.add_manual_sip(120.0, None).unwrap();
    tracker.add_manual_sip(80.0, None).unwrap();
    assert_eq!(tracker.total_ml_today(), 200.0);

    clock.advance(Duration::from_secs(24 * 3600));
    tracker.add_manual_sip(30.0, None).unwrap();

    assert_eq!(tracker.total_sips_today(), 1);
    assert_eq!(tracker.total_ml_today(), 30.0);
    let stats = tracker.get_daily_stats();
    assert_eq!(stats.date, NaiveDate::from_ymd_opt(2024, 5, 21).unwrap());
    assert_eq!(stats.sip_events.len(), 1);
}

#[test]
fn day_rollover_applies_to_read_only_calls() {
    let clock = noon_clock();
    let mut tracker = tracker(&clock);
    tracker.add_manual_sip(120.0, None).unwrap();

    clock.advance(Duration::from_secs(24 * 3600));

    assert_eq!(tracker.get_sip_rate(60.0), 0.0);
    assert_eq!(tracker.total_ml_today(), 0.0);
}

#[test]
fn sip_rate_counts_trailing_window() {
    let clock = noon_clock();
    let mut tracker = tracker(&clock);

    tracker.add_manual_sip(20.0, None).unwrap();
    clock.advance(Duration::from_secs(40 * 60));
    tracker.add_manual_sip(20.0, None).unwrap();
    clock.advance(Duration::from_secs(10 * 60));
    tracker.add_manual_sip(20.0, None).unwrap();

    // Two sips in the last 30 minutes -> 4 per hour.
    assert_eq!(tracker.get_sip_rate(30.0), 4.0);
    assert_eq!(tracker.get_sip_rate(60.0), 3.0);
    assert_eq!(tracker.get_sip_rate(0.0), 0.0);
}

#[test]
fn sip_rate_with_unbounded_window_covers_today() {
    let clock = noon_clock();
    let mut tracker = tracker(&clock);
    tracker.add_manual_sip(50.0, None).unwrap();
    tracker.add_manual_sip(30.0, None).unwrap();

    let rate = tracker.get_sip_rate(1.0e12);
    assert_eq!(rate, 2.0 / (1.0e12 / 60.0));
    assert_eq!(tracker.get_sip_rate(f64::INFINITY), 0.0);
    assert_eq!(tracker.get_sip_rate(f64::NAN), 0.0);
}

#[test]
fn manual_reset_clears_totals() {
    let clock = noon_clock();
    let mut tracker = tracker(&clock);
    tracker.add_manual_sip(75.0, None).unwrap();

    tracker.reset_daily_stats();

    let stats = tracker.get_daily_stats();
    assert_eq!(stats.total_sips, 0);
    assert_eq!(stats.total_ml, 0.0);
    assert!(stats.sip_events.is_empty());
}

#[test]
fn abandon_pending_drops_partial_sip() {
    let clock = noon_clock();
    let mut tracker = tracker(&clock);

    tracker.process_detection(sip_detection(&clock, 0.9), None);
    clock.advance(Duration::from_secs(1));
    assert!(tracker.abandon_pending());

    assert!(tracker
        .process_detection(DetectionResult::gesture_ended(clock.now()), None)
        .is_none());
    assert_eq!(tracker.total_sips_today(), 0);
}

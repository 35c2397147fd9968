//! Per-frame sip gesture detection.
//!
//! Every engine variant runs the same state machine: `Idle` until the gesture
//! condition holds, `Candidate` while the gesture is being held, and a cooldown
//! timer after each emitted detection. Variants differ only in which features
//! drive the condition and how the final confidence is weighted.
//!
//! A candidate is finalized on the first tick where it has been open for at
//! least `sip_duration_min`, whether or not the condition still holds on that
//! tick. A candidate open longer than `sip_duration_max` is discarded.

mod config;
pub mod scoring;
mod state;


pub use config::{DetectionParams, EngineKind};
pub use state::{GesturePhase, GestureSample, GestureTracker};

use std::time::Duration;

use serde_json::{json, Map, Value};

use crate::{
    clock::SharedClock,
    models::{DetectionResult, FrameFeatures},
};

use scoring::{combine, distance_factor, duration_factor, frame_support, tilt_factor, ConfidenceFactors};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

pub struct DetectionEngine {
    kind: EngineKind,
    params: DetectionParams,
    clock: SharedClock,
    gesture: GestureTracker,
    available: bool,
}

impl DetectionEngine {
    pub fn new(kind: EngineKind, params: DetectionParams, clock: SharedClock) -> Self {
        Self {
            kind,
            params,
            clock,
            gesture: GestureTracker::default(),
            available: true,
        }
    }

    /// Builds an engine for a feature source. A landmark engine over a source
    /// that cannot produce landmarks reports itself unavailable.
    pub fn for_source(
        kind: EngineKind,
        params: DetectionParams,
        clock: SharedClock,
        source_supports_landmarks: bool,
    ) -> Self {
        let mut engine = Self::new(kind, params, clock);
        if kind.requires_landmarks() && !source_supports_landmarks {
            log_warn!("{kind} engine unavailable: feature source provides no landmarks");
            engine.available = false;
        }
        engine
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    pub fn params(&self) -> &DetectionParams {
        &self.params
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn in_candidate(&self) -> bool {
        self.gesture.in_candidate()
    }

    pub fn phase(&self) -> GesturePhase {
        self.gesture
            .phase(self.clock.instant(), self.params.cooldown)
    }

    /// Feeds one frame. Returns a detection only on the tick a gesture completes.
    pub fn detect(&mut self, features: &FrameFeatures) -> Option<DetectionResult> {
        if !self.available {
            return None;
        }

        let now = self.clock.instant();
        if self.gesture.in_cooldown(now, self.params.cooldown) {
            return None;
        }

        if let Some(sample) = self.evaluate(features, now) {
            if self.gesture.observe(sample) {
                log_debug!(
                    "{} candidate started (distance {:.1}px, tilt {:.1}deg)",
                    self.kind,
                    sample.distance,
                    sample.tilt
                );
            }
        }

        let elapsed = self.gesture.elapsed(now)?;
        if elapsed > self.params.sip_duration_max {
            log_debug!(
                "{} candidate discarded after {:.2}s (max {:.2}s)",
                self.kind,
                elapsed.as_secs_f64(),
                self.params.sip_duration_max.as_secs_f64()
            );
            self.gesture.abandon();
            return None;
        }
        if elapsed < self.params.sip_duration_min {
            return None;
        }

        let samples = self.gesture.finish(now);
        self.build_result(&samples, elapsed)
    }

    /// Drops any in-progress candidate and the cooldown timer. Safe to call repeatedly.
    pub fn cleanup(&mut self) {
        if self.gesture.in_candidate() {
            log_debug!("{} cleanup dropped an open candidate", self.kind);
        }
        self.gesture.reset();
    }

    fn evaluate(&self, features: &FrameFeatures, now: std::time::Instant) -> Option<GestureSample> {
        let face_center = features.face_center()?;
        let hand_center = features.hand?;
        let tilt = features.head_tilt?;
        let distance = face_center.distance_to(&hand_center);

        if !(distance < self.params.hand_face_distance_threshold
            && tilt.abs() > self.params.head_tilt_threshold)
        {
            return None;
        }
        if self.kind.requires_motion() && !features.motion {
            return None;
        }
        if self.kind.requires_landmarks()
            && features.hand_confidence.unwrap_or(0.0) < self.params.hand_confidence_threshold
        {
            return None;
        }

        Some(GestureSample {
            at: now,
            distance,
            tilt,
            face_center,
            hand_center,
            motion: features.motion,
            hand_confidence: features.hand_confidence,
        })
    }

    fn build_result(&self, samples: &[GestureSample], elapsed: Duration) -> Option<DetectionResult> {
        let last = samples.last()?;
        let duration_secs = elapsed.as_secs_f64();
        let motion_detected = samples.iter().any(|sample| sample.motion);
        let hand_confidence = mean(samples.iter().filter_map(|sample| sample.hand_confidence));

        let auxiliary = match self.kind {
            EngineKind::SkinColor | EngineKind::MultiCue => {
                if motion_detected {
                    1.0
                } else {
                    0.0
                }
            }
            EngineKind::Landmark => hand_confidence.unwrap_or(0.0),
        };
        let timing = match self.kind {
            EngineKind::SkinColor => frame_support(samples.len()),
            EngineKind::MultiCue | EngineKind::Landmark => duration_factor(
                duration_secs,
                self.params.optimal_duration.as_secs_f64(),
            ),
        };

        let factors = ConfidenceFactors {
            distance: distance_factor(last.distance, self.params.hand_face_distance_threshold),
            tilt: tilt_factor(last.tilt, self.params.head_tilt_threshold),
            auxiliary,
            timing,
        };
        let confidence = combine(factors, self.kind.weights());

        let mut detection_data = Map::new();
        detection_data.insert("engine".into(), json!(self.kind.as_str()));
        detection_data.insert("sip_duration".into(), json!(duration_secs));
        detection_data.insert("detection_frames".into(), json!(samples.len()));
        detection_data.insert("motion_detected".into(), json!(motion_detected));
        if let Some(value) = hand_confidence {
            detection_data.insert("hand_confidence".into(), json!(value));
        }
        detection_data.insert("factors".into(), factors_json(&factors));

        log_info!(
            "{} gesture complete: {:.2}s over {} frames, confidence {:.2}",
            self.kind,
            duration_secs,
            samples.len(),
            confidence
        );

        Some(DetectionResult {
            has_sip: true,
            confidence,
            head_tilt_angle: Some(last.tilt),
            hand_face_distance: Some(last.distance),
            face_center: Some(last.face_center),
            hand_center: Some(last.hand_center),
            detection_data,
            timestamp: self.clock.now(),
            gesture_duration: Some(elapsed),
        })
    }
}

fn factors_json(factors: &ConfidenceFactors) -> Value {
    json!({
        "distance": factors.distance,
        "tilt": factors.tilt,
        "auxiliary": factors.auxiliary,
        "timing": factors.timing,
    })
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

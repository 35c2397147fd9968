use std::time::{Duration, Instant};

use serde_json::{json, Value};

use crate::{
    clock::SharedClock,
    db::models::{EventSource, SipEvent},
    detection::DetectionParams,
    models::DetectionResult,
};

use super::DEFAULT_PROFILE_ID;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

const BASE_SIP_ML: f64 = 20.0;

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorConfig {
    pub sip_duration_min: Duration,
    pub sip_duration_max: Duration,
    pub cooldown: Duration,
    pub confidence_threshold: f64,
    /// Attributed to events until the tracker assigns a profile.
    pub default_profile_id: i64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self::from_params(&DetectionParams::default())
    }
}

impl AggregatorConfig {
    pub fn from_params(params: &DetectionParams) -> Self {
        Self {
            sip_duration_min: params.sip_duration_min,
            sip_duration_max: params.sip_duration_max,
            cooldown: Duration::from_secs(1),
            confidence_threshold: 0.5,
            default_profile_id: DEFAULT_PROFILE_ID,
        }
    }
}

struct PendingSip {
    started: Instant,
    detections: Vec<DetectionResult>,
}

/// Second debounce layer between engine detections and durable sip events.
/// Produces at most one event per physical sip.
pub struct SipAggregator {
    config: AggregatorConfig,
    clock: SharedClock,
    pending: Option<PendingSip>,
    last_sip: Option<Instant>,
}

impl SipAggregator {
    pub fn new(config: AggregatorConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            pending: None,
            last_sip: None,
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn in_progress(&self) -> bool {
        self.pending.is_some()
    }

    pub fn process_detection(&mut self, result: DetectionResult) -> Option<SipEvent> {
        let now = self.clock.instant();

        if self.in_cooldown(now) {
            return None;
        }
        if !(result.confidence >= self.config.confidence_threshold) {
            return None;
        }

        if result.has_sip {
            match self.pending.as_mut() {
                Some(pending) => pending.detections.push(result),
                None => {
                    // The engine reports a gesture once it has been held long
                    // enough; start the candidate where the gesture started.
                    let started = result
                        .gesture_duration
                        .and_then(|held| now.checked_sub(held))
                        .unwrap_or(now);
                    log_debug!("sip candidate started");
                    self.pending = Some(PendingSip {
                        started,
                        detections: vec![result],
                    });
                }
            }
        } else if self.pending.is_some() {
            return self.complete(now);
        }

        let overdue = self
            .pending
            .as_ref()
            .map(|pending| now.saturating_duration_since(pending.started) > self.config.sip_duration_max)
            .unwrap_or(false);
        if overdue {
            return self.complete(now);
        }

        None
    }

    /// Drops an in-progress candidate without producing an event.
    pub fn abandon(&mut self) -> bool {
        let dropped = self.pending.take().is_some();
        if dropped {
            log_debug!("sip candidate abandoned");
        }
        dropped
    }

    pub fn reset(&mut self) {
        self.pending = None;
        self.last_sip = None;
    }

    fn in_cooldown(&self, now: Instant) -> bool {
        self.last_sip
            .map(|last| now.saturating_duration_since(last) < self.config.cooldown)
            .unwrap_or(false)
    }

    fn complete(&mut self, now: Instant) -> Option<SipEvent> {
        let pending = self.pending.take()?;
        let elapsed = now.saturating_duration_since(pending.started);

        if elapsed < self.config.sip_duration_min {
            log_debug!("sip too short: {:.2}s", elapsed.as_secs_f64());
            return None;
        }

        let detections = &pending.detections;
        let avg_confidence = average(detections.iter().map(|d| Some(d.confidence)))?;
        let avg_head_tilt = average(detections.iter().map(|d| d.head_tilt_angle));
        let avg_hand_distance = average(detections.iter().map(|d| d.hand_face_distance));

        let duration_secs = elapsed.as_secs_f64();
        let ml_estimate = estimate_ml(avg_confidence, duration_secs);
        let started_at = self.clock.now()
            - chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());

        let detection_data = json!({
            "duration": duration_secs,
            "detection_count": detections.len(),
            "avg_head_tilt": avg_head_tilt,
            "avg_hand_distance": avg_hand_distance,
            "detections": detections.iter().map(detection_summary).collect::<Vec<Value>>(),
        });

        self.last_sip = Some(now);

        log_info!(
            "sip event created: {:.1}ml, confidence {:.2}, {:.2}s",
            ml_estimate,
            avg_confidence,
            duration_secs
        );

        Some(SipEvent {
            id: None,
            timestamp: started_at,
            profile_id: self.config.default_profile_id,
            ml_estimate,
            source: EventSource::Auto,
            confidence: Some(avg_confidence),
            detection_data: Some(detection_data),
        })
    }
}

/// `20 ml x confidence factor (0.5-1.0) x duration factor (0.5-1.5)`, to 0.1 ml.
pub fn estimate_ml(confidence: f64, duration_secs: f64) -> f64 {
    let confidence_factor = 0.5 + confidence.clamp(0.0, 1.0) * 0.5;
    let duration_factor = (duration_secs / 2.0).clamp(0.5, 1.5);
    (BASE_SIP_ML * confidence_factor * duration_factor * 10.0).round() / 10.0
}

/// Mean of the present values; `None` when nothing is present.
fn average(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .flatten()
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / count as f64)
}

fn detection_summary(detection: &DetectionResult) -> Value {
    json!({
        "timestamp": detection.timestamp.to_rfc3339(),
        "confidence": detection.confidence,
        "head_tilt": detection.head_tilt_angle,
        "hand_distance": detection.hand_face_distance,
    })
}

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::models::Point;

/// Where the engine's state machine currently sits. Cooldown is a timer
/// layered over `Idle`, reported separately for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GesturePhase {
    Idle,
    Candidate,
    Cooldown,
}

/// One tick on which the gesture condition held.
#[derive(Debug, Clone, Copy)]
pub struct GestureSample {
    pub at: Instant,
    pub distance: f64,
    pub tilt: f64,
    pub face_center: Point,
    pub hand_center: Point,
    pub motion: bool,
    pub hand_confidence: Option<f64>,
}

#[derive(Debug, Default)]
pub struct GestureTracker {
    candidate_start: Option<Instant>,
    samples: Vec<GestureSample>,
    last_emitted: Option<Instant>,
}

impl GestureTracker {
    pub fn in_candidate(&self) -> bool {
        self.candidate_start.is_some()
    }

    pub fn in_cooldown(&self, now: Instant, cooldown: Duration) -> bool {
        self.last_emitted
            .map(|emitted| now.saturating_duration_since(emitted) < cooldown)
            .unwrap_or(false)
    }

    pub fn phase(&self, now: Instant, cooldown: Duration) -> GesturePhase {
        if self.in_candidate() {
            GesturePhase::Candidate
        } else if self.in_cooldown(now, cooldown) {
            GesturePhase::Cooldown
        } else {
            GesturePhase::Idle
        }
    }

    /// Records a qualifying tick, opening a candidate if none is in progress.
    /// Returns true when this tick opened the candidate.
    pub fn observe(&mut self, sample: GestureSample) -> bool {
        let opened = self.candidate_start.is_none();
        if opened {
            self.candidate_start = Some(sample.at);
            self.samples.clear();
        }
        self.samples.push(sample);
        opened
    }

    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        self.candidate_start
            .map(|start| now.saturating_duration_since(start))
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Closes the candidate as emitted and starts the cooldown.
    pub fn finish(&mut self, now: Instant) -> Vec<GestureSample> {
        self.candidate_start = None;
        self.last_emitted = Some(now);
        std::mem::take(&mut self.samples)
    }

    /// Drops the candidate without emitting; cooldown is untouched.
    pub fn abandon(&mut self) {
        self.candidate_start = None;
        self.samples.clear();
    }

    pub fn reset(&mut self) {
        self.abandon();
        self.last_emitted = None;
    }
}

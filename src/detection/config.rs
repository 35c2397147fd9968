use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

/// Tunable thresholds shared by every engine variant.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionParams {
    /// A gesture must be held at least this long to count as a sip
    pub sip_duration_min: Duration,

    /// Gestures held longer than this are discarded
    pub sip_duration_max: Duration,

    /// Degrees; the absolute head tilt must exceed it
    pub head_tilt_threshold: f64,

    /// Pixels; the hand must be closer than this to the face center
    pub hand_face_distance_threshold: f64,

    /// Quiet period after each emitted detection
    pub cooldown: Duration,

    /// Landmark variant only
    pub hand_confidence_threshold: f64,

    /// Gesture length that scores the full duration factor
    pub optimal_duration: Duration,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            sip_duration_min: Duration::from_millis(800),
            sip_duration_max: Duration::from_millis(3500),
            head_tilt_threshold: 25.0,
            hand_face_distance_threshold: 100.0,
            cooldown: Duration::from_secs(1),
            hand_confidence_threshold: 0.7,
            optimal_duration: Duration::from_secs(2),
        }
    }
}

/// Detection backends selectable at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineKind {
    /// Skin-color blob next to the face.
    #[serde(rename = "skin-color")]
    SkinColor,
    /// Skin color plus face-region motion.
    #[serde(rename = "heuristics")]
    MultiCue,
    /// Facial and hand landmarks from a landmark model.
    #[serde(rename = "landmarks", alias = "mediapipe")]
    Landmark,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::SkinColor => "skin-color",
            EngineKind::MultiCue => "heuristics",
            EngineKind::Landmark => "landmarks",
        }
    }

    pub fn requires_landmarks(&self) -> bool {
        matches!(self, EngineKind::Landmark)
    }

    pub fn requires_motion(&self) -> bool {
        matches!(self, EngineKind::SkinColor | EngineKind::MultiCue)
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "skin-color" | "skin" => Ok(EngineKind::SkinColor),
            "heuristics" | "multi-cue" => Ok(EngineKind::MultiCue),
            "landmarks" | "mediapipe" => Ok(EngineKind::Landmark),
            other => Err(format!(
                "unknown detection engine '{other}', expected heuristics, skin-color or mediapipe"
            )),
        }
    }
}

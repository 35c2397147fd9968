//! Per-frame vision signals and the engine's per-gesture verdict.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Face bounding box in pixel coordinates, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FaceBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.x
            && point.x < self.x + self.width
            && point.y >= self.y
            && point.y < self.y + self.height
    }
}

/// One frame worth of extracted features. Every extraction strategy produces
/// this shape; fields a strategy cannot compute stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameFeatures {
    pub face: Option<FaceBox>,
    pub hand: Option<Point>,
    /// Degrees, signed.
    pub head_tilt: Option<f64>,
    pub motion: bool,
    /// Only landmark-capable sources fill this in.
    pub hand_confidence: Option<f64>,
}

impl FrameFeatures {
    pub fn face_center(&self) -> Option<Point> {
        self.face.map(|face| face.center())
    }

    pub fn hand_face_distance(&self) -> Option<f64> {
        let face = self.face_center()?;
        let hand = self.hand?;
        Some(face.distance_to(&hand))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub has_sip: bool,
    pub confidence: f64,
    pub head_tilt_angle: Option<f64>,
    pub hand_face_distance: Option<f64>,
    pub face_center: Option<Point>,
    pub hand_center: Option<Point>,
    pub detection_data: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
    /// How long the gesture had been held when the engine reported it.
    #[serde(skip)]
    pub gesture_duration: Option<Duration>,
}

impl DetectionResult {
    /// Observation that no gesture is in progress. Carries full confidence so
    /// that it passes the aggregator's gate and closes an open candidate.
    pub fn gesture_ended(timestamp: DateTime<Utc>) -> Self {
        Self {
            has_sip: false,
            confidence: 1.0,
            head_tilt_angle: None,
            hand_face_distance: None,
            face_center: None,
            hand_center: None,
            detection_data: Map::new(),
            timestamp,
            gesture_duration: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hand_face_distance_uses_face_center() {
        let features = FrameFeatures {
            face: Some(FaceBox::new(200.0, 200.0, 200.0, 200.0)),
            hand: Some(Point::new(250.0, 250.0)),
            ..FrameFeatures::default()
        };

        let distance = features.hand_face_distance().unwrap();
        assert!((distance - 70.7107).abs() < 1e-3);
    }

    #[test]
    fn missing_geometry_yields_no_distance() {
        let features = FrameFeatures {
            face: Some(FaceBox::new(0.0, 0.0, 10.0, 10.0)),
            ..FrameFeatures::default()
        };
        assert!(features.hand_face_distance().is_none());
    }
}

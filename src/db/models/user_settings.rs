//! Installation-wide user settings, stored as a single row.

use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    config::AppConfig,
    detection::{DetectionParams, EngineKind},
    error::ValidationError,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub detection_engine: EngineKind,
    pub sip_duration_min: f64,
    pub sip_duration_max: f64,
    pub head_tilt_threshold: f64,
    pub hand_face_distance_threshold: f64,
    pub enable_notifications: bool,
    pub goal_reminder_time: NaiveTime,
    pub default_cup_profile_id: Option<i64>,
    pub daily_goal_ml: u32,
    pub camera_index: u32,
    pub camera_width: u32,
    pub camera_height: u32,
    pub camera_fps: u32,
    pub updated_at: DateTime<Utc>,
}

impl UserSettings {
    /// First-run values, seeded from the process configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            detection_engine: config.detection_engine,
            sip_duration_min: config.sip_duration_min,
            sip_duration_max: config.sip_duration_max,
            head_tilt_threshold: config.head_tilt_threshold,
            hand_face_distance_threshold: config.hand_face_distance_threshold,
            enable_notifications: config.enable_notifications,
            goal_reminder_time: config.goal_reminder_time,
            default_cup_profile_id: None,
            daily_goal_ml: config.daily_goal_ml,
            camera_index: config.camera_index,
            camera_width: config.camera_width,
            camera_height: config.camera_height,
            camera_fps: config.camera_fps,
            updated_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.sip_duration_min > 0.0 && self.sip_duration_max > self.sip_duration_min) {
            return Err(ValidationError::config(
                "sip_duration".to_string(),
                format!(
                    "expected 0 < min < max, got min={} max={}",
                    self.sip_duration_min, self.sip_duration_max
                ),
            ));
        }
        if !(self.head_tilt_threshold > 0.0 && self.hand_face_distance_threshold > 0.0) {
            return Err(ValidationError::config(
                "thresholds".to_string(),
                "tilt and distance thresholds must be positive".to_string(),
            ));
        }
        if self.daily_goal_ml == 0 {
            return Err(ValidationError::DailyTarget);
        }
        check_range("camera_index", self.camera_index, 0, 10)?;
        check_range("camera_width", self.camera_width, 320, 1920)?;
        check_range("camera_height", self.camera_height, 240, 1080)?;
        check_range("camera_fps", self.camera_fps, 15, 60)?;
        Ok(())
    }

    pub fn detection_params(&self) -> DetectionParams {
        DetectionParams {
            sip_duration_min: Duration::from_secs_f64(self.sip_duration_min),
            sip_duration_max: Duration::from_secs_f64(self.sip_duration_max),
            head_tilt_threshold: self.head_tilt_threshold,
            hand_face_distance_threshold: self.hand_face_distance_threshold,
            ..DetectionParams::default()
        }
    }

    /// Frame period implied by the configured camera rate.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.camera_fps.max(1)))
    }
}

fn check_range(field: &str, value: u32, min: u32, max: u32) -> Result<(), ValidationError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::config(
            field.to_string(),
            format!("{value} outside {min}-{max}"),
        ))
    }
}

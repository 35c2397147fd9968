use std::{path::PathBuf, str::FromStr};

use chrono::NaiveTime;
use log::LevelFilter;

use crate::{
    detection::{DetectionParams, EngineKind},
    error::ValidationError,
};

const ENV_PREFIX: &str = "COUNTCUPS_";
const DB_FILE_NAME: &str = "count_cups.sqlite3";

/// Process-level configuration. Built from defaults, then `COUNTCUPS_*`
/// environment variables, then command-line overrides applied by the binary.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub log_level: LevelFilter,
    pub debug: bool,

    pub detection_engine: EngineKind,
    pub sip_duration_min: f64,
    pub sip_duration_max: f64,
    pub head_tilt_threshold: f64,
    pub hand_face_distance_threshold: f64,

    pub default_cup_size_ml: u32,
    pub default_sips_per_cup: u32,
    /// Target used when a day has no goal row yet. Four default cups unless set.
    pub daily_goal_ml: u32,

    pub enable_notifications: bool,
    pub goal_reminder_time: NaiveTime,

    pub camera_index: u32,
    pub camera_width: u32,
    pub camera_height: u32,
    pub camera_fps: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        let params = DetectionParams::default();
        Self {
            data_dir: default_data_dir(),
            log_level: LevelFilter::Info,
            debug: false,
            detection_engine: EngineKind::MultiCue,
            sip_duration_min: params.sip_duration_min.as_secs_f64(),
            sip_duration_max: params.sip_duration_max.as_secs_f64(),
            head_tilt_threshold: params.head_tilt_threshold,
            hand_face_distance_threshold: params.hand_face_distance_threshold,
            default_cup_size_ml: 250,
            default_sips_per_cup: 10,
            daily_goal_ml: 1000,
            enable_notifications: true,
            goal_reminder_time: NaiveTime::from_hms_opt(20, 0, 0).unwrap_or(NaiveTime::MIN),
            camera_index: 0,
            camera_width: 640,
            camera_height: 480,
            camera_fps: 30,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut config = Self::default();

        if let Some(dir) = var("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(level) = var("LOG_LEVEL") {
            config.log_level = parse_log_level(&level)?;
        }
        if let Some(debug) = var("DEBUG") {
            config.debug = parse_flag(&debug);
        }
        if let Some(engine) = var("DETECTION_ENGINE") {
            config.detection_engine = engine
                .parse()
                .map_err(|message: String| ValidationError::config("detection_engine".into(), message))?;
        }
        if let Some(value) = var("SIP_DURATION_MIN") {
            config.sip_duration_min = parse_value("sip_duration_min", &value)?;
        }
        if let Some(value) = var("SIP_DURATION_MAX") {
            config.sip_duration_max = parse_value("sip_duration_max", &value)?;
        }
        if let Some(value) = var("HEAD_TILT_THRESHOLD") {
            config.head_tilt_threshold = parse_value("head_tilt_threshold", &value)?;
        }
        if let Some(value) = var("HAND_FACE_DISTANCE_THRESHOLD") {
            config.hand_face_distance_threshold =
                parse_value("hand_face_distance_threshold", &value)?;
        }
        if let Some(value) = var("DEFAULT_CUP_SIZE_ML") {
            config.default_cup_size_ml = parse_value("default_cup_size_ml", &value)?;
            config.daily_goal_ml = config.default_cup_size_ml.saturating_mul(4);
        }
        if let Some(value) = var("DEFAULT_SIPS_PER_CUP") {
            config.default_sips_per_cup = parse_value("default_sips_per_cup", &value)?;
        }
        if let Some(value) = var("DAILY_GOAL_ML") {
            config.daily_goal_ml = parse_value("daily_goal_ml", &value)?;
        }
        if let Some(value) = var("ENABLE_NOTIFICATIONS") {
            config.enable_notifications = parse_flag(&value);
        }
        if let Some(value) = var("GOAL_REMINDER_TIME") {
            config.goal_reminder_time = NaiveTime::parse_from_str(&value, "%H:%M")
                .map_err(|err| ValidationError::config("goal_reminder_time".into(), err.to_string()))?;
        }
        if let Some(value) = var("CAMERA_INDEX") {
            config.camera_index = parse_value("camera_index", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.sip_duration_min > 0.0) {
            return Err(ValidationError::config(
                "sip_duration_min".into(),
                format!("must be positive, got {}", self.sip_duration_min),
            ));
        }
        if !(self.sip_duration_max > self.sip_duration_min) {
            return Err(ValidationError::config(
                "sip_duration_max".into(),
                format!(
                    "must exceed sip_duration_min ({}), got {}",
                    self.sip_duration_min, self.sip_duration_max
                ),
            ));
        }
        if !(self.head_tilt_threshold > 0.0) {
            return Err(ValidationError::config(
                "head_tilt_threshold".into(),
                format!("must be positive, got {}", self.head_tilt_threshold),
            ));
        }
        if !(self.hand_face_distance_threshold > 0.0) {
            return Err(ValidationError::config(
                "hand_face_distance_threshold".into(),
                format!("must be positive, got {}", self.hand_face_distance_threshold),
            ));
        }
        if !(1..=2000).contains(&self.default_cup_size_ml) {
            return Err(ValidationError::CupSize(self.default_cup_size_ml));
        }
        if !(1..=100).contains(&self.default_sips_per_cup) {
            return Err(ValidationError::SipsPerCup(self.default_sips_per_cup));
        }
        if self.daily_goal_ml == 0 {
            return Err(ValidationError::DailyTarget);
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn detection_params(&self) -> DetectionParams {
        DetectionParams {
            sip_duration_min: std::time::Duration::from_secs_f64(self.sip_duration_min),
            sip_duration_max: std::time::Duration::from_secs_f64(self.sip_duration_max),
            head_tilt_threshold: self.head_tilt_threshold,
            hand_face_distance_threshold: self.hand_face_distance_threshold,
            ..DetectionParams::default()
        }
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".count-cups")
        .join("data")
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes")
}

fn parse_value<T>(field: &str, value: &str) -> Result<T, ValidationError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|err| ValidationError::config(field.to_string(), format!("'{value}': {err}")))
}

pub fn parse_log_level(value: &str) -> Result<LevelFilter, ValidationError> {
    match value.to_ascii_uppercase().as_str() {
        "WARNING" => Ok(LevelFilter::Warn),
        "CRITICAL" => Ok(LevelFilter::Error),
        other => other.parse::<LevelFilter>().map_err(|_| {
            ValidationError::config("log_level".to_string(), format!("unknown level '{value}'"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_calibration_constants() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.detection_engine, EngineKind::MultiCue);
        assert_eq!(config.sip_duration_min, 0.8);
        assert_eq!(config.sip_duration_max, 3.5);
        assert_eq!(config.head_tilt_threshold, 25.0);
        assert_eq!(config.hand_face_distance_threshold, 100.0);
        assert_eq!(config.default_cup_size_ml, 250);
        assert_eq!(config.default_sips_per_cup, 10);
        assert_eq!(config.daily_goal_ml, 1000);
        assert_eq!(config.goal_reminder_time, NaiveTime::from_hms_opt(20, 0, 0).unwrap());
    }

    #[test]
    fn env_overrides_are_applied() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("COUNTCUPS_DETECTION_ENGINE", "mediapipe"),
            ("COUNTCUPS_SIP_DURATION_MIN", "1.2"),
            ("COUNTCUPS_DEFAULT_CUP_SIZE_ML", "300"),
            ("COUNTCUPS_LOG_LEVEL", "warning"),
            ("COUNTCUPS_GOAL_REMINDER_TIME", "19:30"),
        ]))
        .unwrap();

        assert_eq!(config.detection_engine, EngineKind::Landmark);
        assert_eq!(config.sip_duration_min, 1.2);
        assert_eq!(config.default_cup_size_ml, 300);
        assert_eq!(config.daily_goal_ml, 1200);
        assert_eq!(config.log_level, LevelFilter::Warn);
        assert_eq!(config.goal_reminder_time, NaiveTime::from_hms_opt(19, 30, 0).unwrap());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_engine = AppConfig::from_lookup(lookup_from(&[(
            "COUNTCUPS_DETECTION_ENGINE",
            "opencv",
        )]));
        assert!(matches!(bad_engine, Err(ValidationError::Config { .. })));

        let inverted = AppConfig::from_lookup(lookup_from(&[
            ("COUNTCUPS_SIP_DURATION_MIN", "4.0"),
            ("COUNTCUPS_SIP_DURATION_MAX", "3.5"),
        ]));
        assert!(inverted.is_err());

        let huge_cup = AppConfig::from_lookup(lookup_from(&[(
            "COUNTCUPS_DEFAULT_CUP_SIZE_ML",
            "5000",
        )]));
        assert_eq!(huge_cup.unwrap_err(), ValidationError::CupSize(5000));
    }
}

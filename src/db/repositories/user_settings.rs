use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{format_time, format_timestamp, parse_datetime, parse_engine, parse_time, to_u32},
    models::UserSettings,
};

const SETTINGS_COLUMNS: &str = "detection_engine, sip_duration_min, sip_duration_max, \
     head_tilt_threshold, hand_face_distance_threshold, enable_notifications, goal_reminder_time, \
     default_cup_profile_id, daily_goal_ml, camera_index, camera_width, camera_height, camera_fps, updated_at";

fn row_to_user_settings(row: &Row) -> Result<UserSettings> {
    let engine: String = row.get("detection_engine")?;
    let reminder: String = row.get("goal_reminder_time")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(UserSettings {
        detection_engine: parse_engine(&engine)?,
        sip_duration_min: row.get("sip_duration_min")?,
        sip_duration_max: row.get("sip_duration_max")?,
        head_tilt_threshold: row.get("head_tilt_threshold")?,
        hand_face_distance_threshold: row.get("hand_face_distance_threshold")?,
        enable_notifications: row.get("enable_notifications")?,
        goal_reminder_time: parse_time(&reminder, "goal_reminder_time")?,
        default_cup_profile_id: row.get("default_cup_profile_id")?,
        daily_goal_ml: to_u32(row.get("daily_goal_ml")?, "daily_goal_ml")?,
        camera_index: to_u32(row.get("camera_index")?, "camera_index")?,
        camera_width: to_u32(row.get("camera_width")?, "camera_width")?,
        camera_height: to_u32(row.get("camera_height")?, "camera_height")?,
        camera_fps: to_u32(row.get("camera_fps")?, "camera_fps")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn write_settings(conn: &Connection, settings: &UserSettings, replace: bool) -> Result<()> {
    let verb = if replace {
        "INSERT OR REPLACE"
    } else {
        "INSERT OR IGNORE"
    };
    conn.execute(
        &format!(
            "{verb} INTO user_settings (id, {SETTINGS_COLUMNS})
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        ),
        params![
            settings.detection_engine.as_str(),
            settings.sip_duration_min,
            settings.sip_duration_max,
            settings.head_tilt_threshold,
            settings.hand_face_distance_threshold,
            settings.enable_notifications,
            format_time(&settings.goal_reminder_time),
            settings.default_cup_profile_id,
            settings.daily_goal_ml,
            settings.camera_index,
            settings.camera_width,
            settings.camera_height,
            settings.camera_fps,
            format_timestamp(&settings.updated_at),
        ],
    )
    .with_context(|| "failed to write user settings")?;
    Ok(())
}

fn select_user_settings(conn: &Connection) -> Result<UserSettings> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SETTINGS_COLUMNS} FROM user_settings WHERE id = 1"
    ))?;
    let mut rows = stmt.query([])?;
    let row = rows
        .next()?
        .ok_or_else(|| anyhow!("user settings row missing"))?;
    row_to_user_settings(row)
}

impl Database {
    /// Returns the stored settings, seeding the row with `defaults` on first use.
    pub async fn get_user_settings(&self, defaults: &UserSettings) -> Result<UserSettings> {
        defaults.validate()?;
        let seed = defaults.clone();
        self.execute(move |conn| {
            write_settings(conn, &seed, false)?;
            select_user_settings(conn)
        })
        .await
    }

    /// Validates and stores `settings`, returning the persisted copy.
    pub async fn update_user_settings(&self, settings: &UserSettings) -> Result<UserSettings> {
        settings.validate()?;
        let mut record = settings.clone();
        record.updated_at = Utc::now();
        self.execute(move |conn| {
            write_settings(conn, &record, true)?;
            select_user_settings(conn)
        })
        .await
    }
}

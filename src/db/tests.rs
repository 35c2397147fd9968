use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use tempfile::TempDir;

use super::*;
use crate::{
    clock::local_day_bounds,
    config::AppConfig,
    db::models::{CupProfile, EventSource, SipEvent, UserSettings},
    detection::EngineKind,
};

fn open_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(temp_dir.path().join("nested").join("test.sqlite3")).unwrap();
    (db, temp_dir)
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

fn noon(date: NaiveDate) -> chrono::DateTime<Utc> {
    local_day_bounds(date).0 + Duration::hours(12)
}

fn auto_sip(date: NaiveDate, minutes: i64, ml: f64) -> SipEvent {
    SipEvent {
        id: None,
        timestamp: noon(date) + Duration::minutes(minutes),
        profile_id: 1,
        ml_estimate: ml,
        source: EventSource::Auto,
        confidence: Some(0.8),
        detection_data: Some(serde_json::json!({ "engine": "heuristics" })),
    }
}

#[tokio::test]
async fn migrations_seed_default_profile() {
    let (db, _temp_dir) = open_db();

    let default = db.get_default_cup_profile().await.unwrap().unwrap();
    assert_eq!(default.id, Some(1));
    assert_eq!(default.name, "Default");
    assert_eq!(default.size_ml, 250);
    assert_eq!(default.sips_per_cup, 10);
    assert!(db.path().ends_with("test.sqlite3"));
}

#[tokio::test]
async fn reopening_keeps_data_and_schema() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("reopen.sqlite3");
    {
        let db = Database::new(path.clone()).unwrap();
        db.insert_sip_event(&auto_sip(day(1), 0, 25.0)).await.unwrap();
    }
    let db = Database::new(path).unwrap();
    let events = db.get_sip_events(SipEventFilter::default()).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(db.get_all_cup_profiles().await.unwrap().len(), 1);
}

#[tokio::test]
async fn cup_profile_crud() {
    let (db, _temp_dir) = open_db();

    let bottle = CupProfile::new("Bottle", 750, 25, Some("#00aaff".into())).unwrap();
    let created = db.create_cup_profile(&bottle).await.unwrap();
    let bottle_id = created.id.unwrap();
    assert_eq!(created.name, "Bottle");

    let all = db.get_all_cup_profiles().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, Some(bottle_id));

    let mut edited = created.clone();
    edited.size_ml = 500;
    assert!(db.update_cup_profile(&edited).await.unwrap());
    let fetched = db.get_cup_profile(bottle_id).await.unwrap().unwrap();
    assert_eq!(fetched.size_ml, 500);

    assert!(db.delete_cup_profile(bottle_id).await.unwrap());
    assert!(!db.delete_cup_profile(bottle_id).await.unwrap());
    assert!(db.get_cup_profile(bottle_id).await.unwrap().is_none());

    let mut missing = edited;
    missing.id = Some(999);
    assert!(!db.update_cup_profile(&missing).await.unwrap());
}

#[tokio::test]
async fn invalid_records_are_rejected_before_writing() {
    let (db, _temp_dir) = open_db();

    let mut profile = CupProfile::default_profile();
    profile.size_ml = 5000;
    assert!(db.create_cup_profile(&profile).await.is_err());

    let mut sip = auto_sip(day(1), 0, 25.0);
    sip.ml_estimate = 1500.0;
    assert!(db.insert_sip_event(&sip).await.is_err());

    assert!(db
        .get_sip_events(SipEventFilter::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn sip_events_filter_by_range_and_order_newest_first() {
    let (db, _temp_dir) = open_db();

    let first = db.insert_sip_event(&auto_sip(day(1), 0, 20.0)).await.unwrap();
    let second = db.insert_sip_event(&auto_sip(day(1), 30, 25.0)).await.unwrap();
    db.insert_sip_event(&auto_sip(day(2), 0, 30.0)).await.unwrap();
    assert!(second > first);

    let (start, end) = local_day_bounds(day(1));
    let events = db
        .get_sip_events(SipEventFilter::between(start, end))
        .await
        .unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].id, Some(second));
    assert_eq!(events[0].detection_data.as_ref().unwrap()["engine"], "heuristics");

    let limited = db
        .get_sip_events(SipEventFilter {
            limit: Some(1),
            ..SipEventFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].ml_estimate, 30.0);
}

#[tokio::test]
async fn daily_goal_is_created_once_per_date() {
    let (db, _temp_dir) = open_db();

    let goal = db.get_or_create_daily_goal(day(3), 1000).await.unwrap();
    assert_eq!(goal.target_ml, 1000);
    assert_eq!(goal.achieved_ml, 0.0);

    // An existing row wins over a different default.
    let again = db.get_or_create_daily_goal(day(3), 2000).await.unwrap();
    assert_eq!(again.id, goal.id);
    assert_eq!(again.target_ml, 1000);

    let mut edited = again;
    edited.target_ml = 1500;
    assert!(db.update_daily_goal(&edited).await.unwrap());
    assert_eq!(db.get_daily_goal(day(3)).await.unwrap().unwrap().target_ml, 1500);
    assert!(db.get_daily_goal(day(4)).await.unwrap().is_none());
}

#[tokio::test]
async fn refresh_reports_achievement_once_and_counts_streak() {
    let (db, _temp_dir) = open_db();

    for date in [day(1), day(2)] {
        db.insert_sip_event(&auto_sip(date, 0, 600.0)).await.unwrap();
        let refreshed = db.refresh_daily_goal(date, 500).await.unwrap();
        assert!(refreshed.newly_achieved);
    }

    db.insert_sip_event(&auto_sip(day(3), 0, 300.0)).await.unwrap();
    let partial = db.refresh_daily_goal(day(3), 500).await.unwrap();
    assert!(!partial.newly_achieved);
    assert!(!partial.goal.is_achieved);
    assert_eq!(partial.goal.achieved_ml, 300.0);
    assert_eq!(partial.goal.streak_days, 2);

    db.insert_sip_event(&auto_sip(day(3), 10, 300.0)).await.unwrap();
    let achieved = db.refresh_daily_goal(day(3), 500).await.unwrap();
    assert!(achieved.newly_achieved);
    assert!(achieved.goal.is_achieved);

    db.insert_sip_event(&auto_sip(day(3), 20, 50.0)).await.unwrap();
    let repeat = db.refresh_daily_goal(day(3), 500).await.unwrap();
    assert!(!repeat.newly_achieved);
    assert_eq!(repeat.goal.achieved_ml, 650.0);

    // A missed day breaks the streak.
    let after_gap = db.refresh_daily_goal(day(5), 500).await.unwrap();
    assert_eq!(after_gap.goal.streak_days, 0);
}

#[tokio::test]
async fn daily_and_weekly_stats() {
    let (db, _temp_dir) = open_db();

    db.insert_sip_event(&auto_sip(day(6), 0, 25.0)).await.unwrap();
    db.insert_sip_event(&auto_sip(day(6), 5, 30.0)).await.unwrap();
    db.insert_sip_event(&auto_sip(day(8), 0, 1000.0)).await.unwrap();

    let daily = db.get_daily_stats(day(6), 1000).await.unwrap();
    assert_eq!(daily.total_ml, 55.0);
    assert_eq!(daily.total_sips, 2);
    assert!((daily.total_cups - 0.22).abs() < 1e-9);
    assert!(!daily.goal_achieved);
    assert_eq!(daily.events.len(), 2);

    let weekly = db.get_weekly_stats(day(6), 1000).await.unwrap();
    assert_eq!(weekly.daily_stats.len(), 7);
    assert_eq!(weekly.week_end, day(12));
    assert_eq!(weekly.total_ml, 1055.0);
    assert_eq!(weekly.total_sips, 3);
    assert_eq!(weekly.goal_achieved_days, 1);
    assert_eq!(weekly.streak_days, 0);
}

#[tokio::test]
async fn user_settings_seed_then_update() {
    let (db, _temp_dir) = open_db();
    let defaults = UserSettings::from_config(&AppConfig::default());

    let stored = db.get_user_settings(&defaults).await.unwrap();
    assert_eq!(stored.detection_engine, defaults.detection_engine);
    assert_eq!(stored.goal_reminder_time, defaults.goal_reminder_time);

    let mut changed = stored.clone();
    changed.detection_engine = EngineKind::Landmark;
    changed.goal_reminder_time = NaiveTime::from_hms_opt(18, 45, 0).unwrap();
    changed.default_cup_profile_id = Some(1);
    db.update_user_settings(&changed).await.unwrap();

    // Seeding again must not overwrite what the user saved.
    let reloaded = db.get_user_settings(&defaults).await.unwrap();
    assert_eq!(reloaded.detection_engine, EngineKind::Landmark);
    assert_eq!(
        reloaded.goal_reminder_time,
        NaiveTime::from_hms_opt(18, 45, 0).unwrap()
    );
    assert_eq!(reloaded.default_cup_profile_id, Some(1));

    let mut invalid = reloaded;
    invalid.camera_fps = 240;
    assert!(db.update_user_settings(&invalid).await.is_err());
}

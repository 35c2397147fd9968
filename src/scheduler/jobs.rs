use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveTime;

use crate::{
    clock::SharedClock, db::Database, notify::NotificationService,
    sensing::DetectionController, settings::SettingsStore,
};

use super::{callback, Scheduler};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

pub const DAILY_RESET_TASK_ID: &str = "daily_reset";
pub const GOAL_REMINDER_TASK_ID: &str = "goal_reminder";

/// Registers the midnight tracker reset and the evening goal reminder.
pub async fn install_default_jobs(
    scheduler: &Scheduler,
    controller: DetectionController,
    db: Database,
    settings: Arc<SettingsStore>,
    notifier: NotificationService,
    clock: SharedClock,
) {
    scheduler
        .schedule_daily(
            callback(move || {
                let controller = controller.clone();
                async move {
                    controller.reset_daily().await;
                    log_info!("daily sip totals reset");
                    Ok(())
                }
            }),
            NaiveTime::MIN,
            Some(DAILY_RESET_TASK_ID.to_string()),
        )
        .await;

    let reminder_time = settings.get().goal_reminder_time;
    scheduler
        .schedule_daily(
            callback(move || {
                let db = db.clone();
                let settings = Arc::clone(&settings);
                let notifier = notifier.clone();
                let clock = clock.clone();
                async move { send_goal_reminder(&db, &settings, &notifier, &clock).await }
            }),
            reminder_time,
            Some(GOAL_REMINDER_TASK_ID.to_string()),
        )
        .await;
}

async fn send_goal_reminder(
    db: &Database,
    settings: &SettingsStore,
    notifier: &NotificationService,
    clock: &SharedClock,
) -> Result<()> {
    let goal_ml = settings.get().daily_goal_ml;
    let stats = db.get_daily_stats(clock.today(), goal_ml).await?;
    if stats.goal_achieved {
        return Ok(());
    }
    notifier.goal_reminder(stats.remaining_ml(), stats.goal_ml);
    Ok(())
}

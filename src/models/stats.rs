use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::models::SipEvent;

/// Persisted view of one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub date: NaiveDate,
    pub total_ml: f64,
    pub total_sips: u32,
    pub total_cups: f64,
    pub goal_ml: u32,
    pub goal_achieved: bool,
    pub progress_percentage: f64,
    pub streak_days: u32,
    pub events: Vec<SipEvent>,
}

impl DailyStats {
    pub fn remaining_ml(&self) -> f64 {
        (f64::from(self.goal_ml) - self.total_ml).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyStats {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub total_ml: f64,
    pub total_sips: u32,
    pub total_cups: f64,
    pub average_daily_ml: f64,
    pub goal_achieved_days: u32,
    pub streak_days: u32,
    pub daily_stats: Vec<DailyStats>,
}

impl WeeklyStats {
    /// Percentage of days in the window whose goal was met.
    pub fn goal_achievement_rate(&self) -> f64 {
        if self.daily_stats.is_empty() {
            return 0.0;
        }
        f64::from(self.goal_achieved_days) / self.daily_stats.len() as f64 * 100.0
    }
}

/// In-memory running totals kept by the sip tracker for the current day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerStats {
    pub date: NaiveDate,
    pub total_sips: u32,
    pub total_ml: f64,
    pub total_cups: f64,
    pub sip_events: Vec<SipEvent>,
}

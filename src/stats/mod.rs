//! Daily and weekly rollups over persisted sip events.
//!
//! Cups in rollups are always `ml / 250`, independent of any cup profile, so
//! that totals stay comparable across profile changes.

use chrono::{Duration, NaiveDate};

use crate::{
    db::models::{DailyGoal, SipEvent},
    models::{DailyStats, WeeklyStats},
};

pub const ML_PER_CUP: f64 = 250.0;
pub const DAYS_PER_WEEK: u32 = 7;

pub fn total_cups(total_ml: f64) -> f64 {
    total_ml / ML_PER_CUP
}

/// `total/target x 100`, or 0 when the target is 0. Not capped.
pub fn progress_percentage(total_ml: f64, target_ml: u32) -> f64 {
    if target_ml == 0 {
        return 0.0;
    }
    total_ml / f64::from(target_ml) * 100.0
}

pub fn daily_stats(date: NaiveDate, events: Vec<SipEvent>, goal: &DailyGoal) -> DailyStats {
    let total_ml: f64 = events.iter().map(|event| event.ml_estimate).sum();
    let total_sips = u32::try_from(events.len()).unwrap_or(u32::MAX);

    DailyStats {
        date,
        total_ml,
        total_sips,
        total_cups: total_cups(total_ml),
        goal_ml: goal.target_ml,
        goal_achieved: total_ml >= f64::from(goal.target_ml),
        progress_percentage: progress_percentage(total_ml, goal.target_ml),
        streak_days: goal.streak_days,
        events,
    }
}

/// Rolls up consecutive days starting at `week_start`.
pub fn weekly_stats(week_start: NaiveDate, days: Vec<DailyStats>) -> WeeklyStats {
    let total_ml: f64 = days.iter().map(|day| day.total_ml).sum();
    let total_sips = days.iter().map(|day| day.total_sips).sum();
    let goal_achieved_days = days.iter().filter(|day| day.goal_achieved).count() as u32;
    let average_daily_ml = if days.is_empty() {
        0.0
    } else {
        total_ml / days.len() as f64
    };

    WeeklyStats {
        week_start,
        week_end: week_start + Duration::days(i64::from(DAYS_PER_WEEK) - 1),
        total_ml,
        total_sips,
        total_cups: total_cups(total_ml),
        average_daily_ml,
        goal_achieved_days,
        streak_days: trailing_streak(&days),
        daily_stats: days,
    }
}

/// Achieved days counted backwards from the last day, stopping at the first miss.
pub fn trailing_streak(days: &[DailyStats]) -> u32 {
    days.iter()
        .rev()
        .take_while(|day| day.goal_achieved)
        .count() as u32
}

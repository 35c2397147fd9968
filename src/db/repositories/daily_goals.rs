use anyhow::{anyhow, bail, Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{
    clock::local_day_bounds,
    db::{
        connection::Database,
        helpers::{format_date, format_timestamp, parse_date, parse_datetime, to_u32},
        models::DailyGoal,
        repositories::sip_events::sum_sip_ml,
    },
};

const GOAL_COLUMNS: &str =
    "id, date, target_ml, achieved_ml, is_achieved, streak_days, created_at, updated_at";

/// Longest history walked back when counting a streak.
const MAX_STREAK_LOOKBACK_DAYS: u32 = 3650;

/// Outcome of recomputing a day's goal from its events.
#[derive(Debug, Clone)]
pub struct GoalRefresh {
    pub goal: DailyGoal,
    /// True only on the refresh that first met the target.
    pub newly_achieved: bool,
}

fn row_to_daily_goal(row: &Row) -> Result<DailyGoal> {
    let date: String = row.get("date")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(DailyGoal {
        id: Some(row.get("id")?),
        date: parse_date(&date, "date")?,
        target_ml: to_u32(row.get("target_ml")?, "target_ml")?,
        achieved_ml: row.get("achieved_ml")?,
        is_achieved: row.get("is_achieved")?,
        streak_days: to_u32(row.get("streak_days")?, "streak_days")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn select_daily_goal(conn: &Connection, date: NaiveDate) -> Result<Option<DailyGoal>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {GOAL_COLUMNS} FROM daily_goals WHERE date = ?1"
    ))?;
    let mut rows = stmt.query(params![format_date(&date)])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_daily_goal(row)?)),
        None => Ok(None),
    }
}

/// Insert-or-ignore keyed by the unique date, then re-read, so concurrent
/// first queries for a day never create two rows.
pub(crate) fn get_or_create_goal(
    conn: &Connection,
    date: NaiveDate,
    default_target_ml: u32,
) -> Result<DailyGoal> {
    if let Some(goal) = select_daily_goal(conn, date)? {
        return Ok(goal);
    }
    if default_target_ml == 0 {
        bail!("daily target must be greater than zero");
    }

    let now = format_timestamp(&Utc::now());
    conn.execute(
        "INSERT OR IGNORE INTO daily_goals (date, target_ml, achieved_ml, is_achieved, streak_days, created_at, updated_at)
         VALUES (?1, ?2, 0.0, 0, 0, ?3, ?4)",
        params![format_date(&date), default_target_ml, now, now],
    )
    .with_context(|| format!("failed to create daily goal for {date}"))?;

    select_daily_goal(conn, date)?.ok_or_else(|| anyhow!("Daily goal for {date} not found after insert"))
}

/// Consecutive achieved days immediately before `date`.
fn streak_before(conn: &Connection, date: NaiveDate) -> Result<u32> {
    let mut streak = 0;
    let mut day = date;
    while streak < MAX_STREAK_LOOKBACK_DAYS {
        day = day - Duration::days(1);
        let achieved: Option<bool> = conn
            .query_row(
                "SELECT is_achieved FROM daily_goals WHERE date = ?1",
                params![format_date(&day)],
                |row| row.get(0),
            )
            .optional()?;
        if achieved != Some(true) {
            break;
        }
        streak += 1;
    }
    Ok(streak)
}

impl Database {
    pub async fn get_or_create_daily_goal(
        &self,
        date: NaiveDate,
        default_target_ml: u32,
    ) -> Result<DailyGoal> {
        self.execute(move |conn| get_or_create_goal(conn, date, default_target_ml))
            .await
    }

    pub async fn get_daily_goal(&self, date: NaiveDate) -> Result<Option<DailyGoal>> {
        self.execute(move |conn| select_daily_goal(conn, date))
            .await
    }

    pub async fn update_daily_goal(&self, goal: &DailyGoal) -> Result<bool> {
        if goal.target_ml == 0 {
            bail!("daily target must be greater than zero");
        }
        let record = goal.clone();
        self.execute(move |conn| {
            let rows_affected = conn
                .execute(
                    "UPDATE daily_goals
                     SET target_ml = ?1, achieved_ml = ?2, is_achieved = ?3, streak_days = ?4, updated_at = ?5
                     WHERE date = ?6",
                    params![
                        record.target_ml,
                        record.achieved_ml,
                        record.is_achieved,
                        record.streak_days,
                        format_timestamp(&Utc::now()),
                        format_date(&record.date),
                    ],
                )
                .with_context(|| "failed to update daily goal")?;
            Ok(rows_affected > 0)
        })
        .await
    }

    /// Recomputes `achieved_ml`, `is_achieved` and `streak_days` for a day from
    /// its persisted sip events.
    pub async fn refresh_daily_goal(
        &self,
        date: NaiveDate,
        default_target_ml: u32,
    ) -> Result<GoalRefresh> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let before = get_or_create_goal(&tx, date, default_target_ml)?;

            let (start, end) = local_day_bounds(date);
            let achieved_ml = sum_sip_ml(&tx, &start, &end)?;
            let is_achieved = achieved_ml >= f64::from(before.target_ml);
            let streak_days = streak_before(&tx, date)?;

            tx.execute(
                "UPDATE daily_goals
                 SET achieved_ml = ?1, is_achieved = ?2, streak_days = ?3, updated_at = ?4
                 WHERE date = ?5",
                params![
                    achieved_ml,
                    is_achieved,
                    streak_days,
                    format_timestamp(&Utc::now()),
                    format_date(&date),
                ],
            )
            .with_context(|| format!("failed to refresh daily goal for {date}"))?;

            let goal = select_daily_goal(&tx, date)?
                .ok_or_else(|| anyhow!("Daily goal for {date} vanished during refresh"))?;
            tx.commit()?;

            Ok(GoalRefresh {
                newly_achieved: is_achieved && !before.is_achieved,
                goal,
            })
        })
        .await
    }
}

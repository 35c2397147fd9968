use anyhow::Result;
use chrono::{Duration, NaiveDate};
use rusqlite::Connection;

use crate::{
    clock::local_day_bounds,
    db::{
        connection::Database,
        repositories::{
            daily_goals::get_or_create_goal,
            sip_events::{select_sip_events, SipEventFilter},
        },
    },
    models::{DailyStats, WeeklyStats},
    stats::{daily_stats, weekly_stats, DAYS_PER_WEEK},
};

fn collect_daily_stats(
    conn: &Connection,
    date: NaiveDate,
    default_target_ml: u32,
) -> Result<DailyStats> {
    let goal = get_or_create_goal(conn, date, default_target_ml)?;
    let (start, end) = local_day_bounds(date);
    let events = select_sip_events(conn, &SipEventFilter::between(start, end))?;
    Ok(daily_stats(date, events, &goal))
}

impl Database {
    /// Totals for one local day. Creates the day's goal row if it is missing.
    pub async fn get_daily_stats(
        &self,
        date: NaiveDate,
        default_target_ml: u32,
    ) -> Result<DailyStats> {
        self.execute(move |conn| collect_daily_stats(conn, date, default_target_ml))
            .await
    }

    pub async fn get_weekly_stats(
        &self,
        week_start: NaiveDate,
        default_target_ml: u32,
    ) -> Result<WeeklyStats> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let mut days = Vec::with_capacity(DAYS_PER_WEEK as usize);
            for offset in 0..DAYS_PER_WEEK {
                let date = week_start + Duration::days(i64::from(offset));
                days.push(collect_daily_stats(&tx, date, default_target_ml)?);
            }
            tx.commit()?;
            Ok(weekly_stats(week_start, days))
        })
        .await
    }
}

use std::{future::Future, pin::Pin, sync::Arc};

use anyhow::Result;
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, Utc};

pub type TaskFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
pub type TaskCallback = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// Wraps an async closure as a task callback.
pub fn callback<F, Fut>(f: F) -> TaskCallback
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move || -> TaskFuture { Box::pin(f()) })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Once { at: DateTime<Utc> },
    /// At most once per local calendar date, at or after `at`.
    Daily { at: NaiveTime, last_run: NaiveDate },
    Interval { every: Duration, last_run: DateTime<Utc> },
}

impl Schedule {
    pub fn once(at: DateTime<Utc>) -> Self {
        Schedule::Once { at }
    }

    /// A daily schedule created at `now`. Fires today when `at` is still ahead.
    pub fn daily(at: NaiveTime, now: DateTime<Utc>) -> Self {
        let local = now.with_timezone(&Local);
        let today = local.date_naive();
        let last_run = if local.time() >= at {
            today
        } else {
            today.pred_opt().unwrap_or(today)
        };
        Schedule::Daily { at, last_run }
    }

    pub fn interval(every: Duration, now: DateTime<Utc>) -> Self {
        Schedule::Interval {
            every,
            last_run: now,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self {
            Schedule::Once { at } => now >= *at,
            Schedule::Daily { at, last_run } => {
                let local = now.with_timezone(&Local);
                local.time() >= *at && local.date_naive() > *last_run
            }
            Schedule::Interval { every, last_run } => now - *last_run >= *every,
        }
    }

    pub fn mark_run(&mut self, now: DateTime<Utc>) {
        match self {
            Schedule::Once { .. } => {}
            Schedule::Daily { last_run, .. } => {
                *last_run = now.with_timezone(&Local).date_naive();
            }
            Schedule::Interval { last_run, .. } => *last_run = now,
        }
    }

    pub fn is_one_shot(&self) -> bool {
        matches!(self, Schedule::Once { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Schedule::Once { .. } => "once",
            Schedule::Daily { .. } => "daily",
            Schedule::Interval { .. } => "interval",
        }
    }
}

pub struct ScheduledTask {
    pub id: String,
    pub schedule: Schedule,
    pub callback: TaskCallback,
}

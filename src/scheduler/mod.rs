//! Best-effort periodic tasks: one-shot, daily and fixed-interval callbacks
//! polled once a second against the shared clock.

mod jobs;
mod task;

pub use jobs::{install_default_jobs, DAILY_RESET_TASK_ID, GOAL_REMINDER_TASK_ID};
pub use task::{callback, Schedule, ScheduledTask, TaskCallback, TaskFuture};

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, NaiveTime, Utc};
use tokio::{sync::Mutex, task::JoinHandle, time::Duration};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::clock::SharedClock;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

struct ActiveLoop {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

#[derive(Clone)]
pub struct Scheduler {
    tasks: Arc<Mutex<HashMap<String, ScheduledTask>>>,
    clock: SharedClock,
    poll_interval: Duration,
    active: Arc<Mutex<Option<ActiveLoop>>>,
}

impl Scheduler {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            clock,
            poll_interval: POLL_INTERVAL,
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub async fn schedule_once(
        &self,
        callback: TaskCallback,
        at: DateTime<Utc>,
        task_id: Option<String>,
    ) -> String {
        self.insert(Schedule::once(at), callback, task_id).await
    }

    pub async fn schedule_daily(
        &self,
        callback: TaskCallback,
        at: NaiveTime,
        task_id: Option<String>,
    ) -> String {
        self.insert(Schedule::daily(at, self.clock.now()), callback, task_id)
            .await
    }

    pub async fn schedule_interval(
        &self,
        callback: TaskCallback,
        every: chrono::Duration,
        task_id: Option<String>,
    ) -> String {
        self.insert(Schedule::interval(every, self.clock.now()), callback, task_id)
            .await
    }

    pub async fn cancel_task(&self, task_id: &str) -> bool {
        let removed = self.tasks.lock().await.remove(task_id).is_some();
        if removed {
            log_info!("cancelled task {task_id}");
        }
        removed
    }

    pub async fn task_count(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Runs every task that is due now and returns how many ran. One-shot
    /// tasks are removed afterwards.
    pub async fn run_pending(&self) -> usize {
        let now = self.clock.now();
        let due: Vec<(String, TaskCallback)> = {
            let mut tasks = self.tasks.lock().await;
            let mut due = Vec::new();
            for task in tasks.values_mut() {
                if task.schedule.is_due(now) {
                    task.schedule.mark_run(now);
                    due.push((task.id.clone(), Arc::clone(&task.callback)));
                }
            }
            tasks.retain(|_, task| !(task.schedule.is_one_shot() && task.schedule.is_due(now)));
            due
        };

        for (task_id, callback) in &due {
            match callback().await {
                Ok(()) => log_debug!("task {task_id} executed"),
                Err(err) => log_error!("task {task_id} failed: {err:?}"),
            }
        }
        due.len()
    }

    pub async fn start(&self) {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return;
        }

        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler.poll_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        scheduler.run_pending().await;
                    }
                    _ = token.cancelled() => break,
                }
            }
        });

        *active = Some(ActiveLoop {
            handle,
            cancel_token,
        });
        log_info!("scheduler started");
    }

    pub async fn stop(&self) {
        let Some(ActiveLoop {
            handle,
            cancel_token,
        }) = self.active.lock().await.take()
        else {
            return;
        };

        cancel_token.cancel();
        if let Err(err) = handle.await {
            log_warn!("scheduler task ended abnormally: {err:?}");
        }
        log_info!("scheduler stopped");
    }

    async fn insert(
        &self,
        schedule: Schedule,
        callback: TaskCallback,
        task_id: Option<String>,
    ) -> String {
        let id = task_id.unwrap_or_else(|| format!("{}_{}", schedule.kind(), Uuid::new_v4()));
        log_info!("scheduled {} task {id}: {:?}", schedule.kind(), schedule);
        self.tasks.lock().await.insert(
            id.clone(),
            ScheduledTask {
                id: id.clone(),
                schedule,
                callback,
            },
        );
        id
    }
}

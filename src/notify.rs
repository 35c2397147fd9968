//! Fire-and-forget user notifications. Delivery failures are logged and
//! reported as `false`, never propagated.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Result;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

pub trait NotificationSink: Send + Sync {
    fn show(&self, title: &str, message: &str) -> Result<()>;
}

/// Writes notifications to the log. Used when no desktop channel exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn show(&self, title: &str, message: &str) -> Result<()> {
        log::info!("[notification] {title}: {message}");
        Ok(())
    }
}

#[derive(Clone)]
pub struct NotificationService {
    sink: Arc<dyn NotificationSink>,
    enabled: Arc<AtomicBool>,
}

impl NotificationService {
    pub fn new(sink: Arc<dyn NotificationSink>, enabled: bool) -> Self {
        Self {
            sink,
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        log_info!("notifications {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn notify(&self, title: &str, message: &str) -> bool {
        if !self.is_enabled() {
            log_debug!("notifications disabled, skipping '{title}'");
            return false;
        }
        match self.sink.show(title, message) {
            Ok(()) => {
                log_debug!("notification shown: {title}");
                true
            }
            Err(err) => {
                log_error!("failed to show notification '{title}': {err:?}");
                false
            }
        }
    }

    pub fn goal_achieved(&self, goal_ml: u32) -> bool {
        self.notify(
            "Goal Achieved!",
            &format!("You've reached your daily goal of {goal_ml}ml! Great job!"),
        )
    }

    pub fn goal_reminder(&self, remaining_ml: f64, goal_ml: u32) -> bool {
        self.notify(
            "Hydration Reminder",
            &format!(
                "You have {remaining_ml:.0}ml left to reach your daily goal of {goal_ml}ml."
            ),
        )
    }

    pub fn sip_detected(&self, ml: f64) -> bool {
        self.notify(
            "Sip Detected",
            &format!("Detected {ml:.0}ml sip. Keep hydrating!"),
        )
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timing of one detection-loop tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickMetrics {
    pub timestamp: DateTime<Utc>,
    pub extract_ms: u64,
    pub detect_ms: u64,
    pub persist_ms: Option<u64>,
    pub total_ms: u64,
    pub detected: bool,
    pub sip_recorded: bool,
    /// The recorded sip reached the database.
    pub sip_persisted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineCounters {
    pub frames_processed: u64,
    pub frames_failed: u64,
    pub detections: u64,
    pub sips_recorded: u64,
    pub sips_persisted: u64,
    pub persist_failures: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub counters: PipelineCounters,
    pub recent_ticks: Vec<TickMetrics>,
}

impl MetricsSnapshot {
    /// Mean tick duration over the retained window.
    pub fn average_tick_ms(&self) -> f64 {
        if self.recent_ticks.is_empty() {
            return 0.0;
        }
        let total: u64 = self.recent_ticks.iter().map(|tick| tick.total_ms).sum();
        total as f64 / self.recent_ticks.len() as f64
    }
}

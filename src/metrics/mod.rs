mod types;

pub use types::{MetricsSnapshot, PipelineCounters, TickMetrics};

use std::sync::Arc;
use tokio::sync::Mutex;

const MAX_RECENT_TICKS: usize = 60;

pub struct PipelineMetrics {
    inner: Arc<Mutex<MetricsState>>,
}

struct MetricsState {
    recent_ticks: Vec<TickMetrics>,
    counters: PipelineCounters,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsState {
                recent_ticks: Vec::with_capacity(MAX_RECENT_TICKS),
                counters: PipelineCounters::default(),
            })),
        }
    }

    pub async fn record_tick(&self, metrics: TickMetrics) {
        let mut state = self.inner.lock().await;

        state.counters.frames_processed += 1;
        if metrics.detected {
            state.counters.detections += 1;
        }
        if metrics.sip_recorded {
            state.counters.sips_recorded += 1;
        }
        if metrics.sip_persisted {
            state.counters.sips_persisted += 1;
        }

        state.recent_ticks.push(metrics);
        if state.recent_ticks.len() > MAX_RECENT_TICKS {
            state.recent_ticks.remove(0);
        }
    }

    pub async fn record_frame_failure(&self) {
        self.inner.lock().await.counters.frames_failed += 1;
    }

    pub async fn record_persist_failure(&self) {
        self.inner.lock().await.counters.persist_failures += 1;
    }

    pub async fn get_snapshot(&self) -> MetricsSnapshot {
        let state = self.inner.lock().await;
        MetricsSnapshot {
            counters: state.counters.clone(),
            recent_ticks: state.recent_ticks.clone(),
        }
    }

    pub async fn reset(&self) {
        let mut state = self.inner.lock().await;
        state.recent_ticks.clear();
        state.counters = PipelineCounters::default();
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for PipelineMetrics {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

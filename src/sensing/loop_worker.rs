use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    clock::SharedClock,
    db::{models::{CupProfile, SipEvent}, Database, GoalRefresh},
    detection::{DetectionEngine, GesturePhase},
    metrics::{PipelineMetrics, TickMetrics},
    models::{DetectionResult, FrameFeatures},
    notify::NotificationService,
    sip::SipTracker,
};

use super::FeatureSource;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_debug, log_error, log_info, log_warn};

/// Everything one detection run shares with the rest of the app.
#[derive(Clone)]
pub struct PipelineContext {
    pub db: Database,
    pub tracker: Arc<Mutex<SipTracker>>,
    pub notifier: NotificationService,
    pub metrics: PipelineMetrics,
    pub clock: SharedClock,
    pub profile: Option<CupProfile>,
    pub daily_goal_ml: u32,
}

#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// The engine reported a completed gesture this tick.
    pub detected: bool,
    pub event: Option<SipEvent>,
    pub persisted: bool,
    pub detect_ms: u64,
    pub persist_ms: Option<u64>,
}

pub async fn detection_loop(
    ctx: PipelineContext,
    mut engine: DetectionEngine,
    mut source: Box<dyn FeatureSource>,
    frame_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!(
        "detection loop started ({} engine, {:.1} fps)",
        engine.kind(),
        1.0 / frame_interval.as_secs_f64().max(f64::EPSILON)
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let tick_start = Instant::now();
                let read = tokio::task::spawn_blocking(move || {
                    let result = source.next_features();
                    (source, result)
                })
                .await;

                let result = match read {
                    Ok((returned, result)) => {
                        source = returned;
                        result
                    }
                    Err(err) => {
                        log_error!("feature source worker failed: {err:?}");
                        break;
                    }
                };

                let features = match result {
                    Ok(Some(features)) => features,
                    Ok(None) => {
                        log_info!("feature source exhausted");
                        break;
                    }
                    Err(err) => {
                        log_warn!("frame skipped: {err:?}");
                        ctx.metrics.record_frame_failure().await;
                        continue;
                    }
                };
                let extract_ms = tick_start.elapsed().as_millis() as u64;

                let outcome = process_tick(&ctx, &mut engine, &features).await;

                ctx.metrics
                    .record_tick(TickMetrics {
                        timestamp: Utc::now(),
                        extract_ms,
                        detect_ms: outcome.detect_ms,
                        persist_ms: outcome.persist_ms,
                        total_ms: tick_start.elapsed().as_millis() as u64,
                        detected: outcome.detected,
                        sip_recorded: outcome.event.is_some(),
                        sip_persisted: outcome.persisted,
                    })
                    .await;
            }
            _ = cancel_token.cancelled() => {
                log_info!("detection loop shutting down");
                break;
            }
        }
    }

    engine.cleanup();
}

/// Runs one frame through the engine and the tracker, then persists and
/// announces any finalized sip.
pub async fn process_tick(
    ctx: &PipelineContext,
    engine: &mut DetectionEngine,
    features: &FrameFeatures,
) -> TickOutcome {
    let detect_start = Instant::now();
    let detection = engine.detect(features);
    let detected = detection.is_some();

    // The engine reports a gesture once; the aggregator closes its candidate
    // when the engine is back to idle.
    let observation = match detection {
        Some(result) => Some(result),
        None if engine.phase() == GesturePhase::Idle => {
            Some(DetectionResult::gesture_ended(ctx.clock.now()))
        }
        None => None,
    };
    let event = match observation {
        Some(observation) => ctx
            .tracker
            .lock()
            .await
            .process_detection(observation, ctx.profile.as_ref()),
        None => None,
    };
    let detect_ms = detect_start.elapsed().as_millis() as u64;

    let Some(mut event) = event else {
        return TickOutcome {
            detected,
            detect_ms,
            ..TickOutcome::default()
        };
    };

    let persist_start = Instant::now();
    let persisted = match persist_sip(&ctx.db, &ctx.notifier, &mut event, ctx.daily_goal_ml).await {
        Ok(refresh) => {
            log_debug!(
                "goal progress {:.0}/{}ml",
                refresh.goal.achieved_ml,
                refresh.goal.target_ml
            );
            true
        }
        Err(err) => {
            // Today's in-memory totals keep the event.
            log_error!("failed to persist sip event: {err:?}");
            ctx.metrics.record_persist_failure().await;
            false
        }
    };
    ctx.notifier.sip_detected(event.ml_estimate);

    TickOutcome {
        detected,
        event: Some(event),
        persisted,
        detect_ms,
        persist_ms: Some(persist_start.elapsed().as_millis() as u64),
    }
}

/// Stores a finalized sip, recomputes its day's goal and announces the goal
/// the first time it is reached.
pub(crate) async fn persist_sip(
    db: &Database,
    notifier: &NotificationService,
    event: &mut SipEvent,
    daily_goal_ml: u32,
) -> Result<GoalRefresh> {
    let id = db.insert_sip_event(event).await?;
    event.id = Some(id);

    let date = event.timestamp.with_timezone(&Local).date_naive();
    let refresh = db
        .refresh_daily_goal(date, daily_goal_ml)
        .await
        .with_context(|| format!("failed to refresh goal for {date}"))?;

    if refresh.newly_achieved {
        log_info!(
            "daily goal reached: {:.0}/{}ml",
            refresh.goal.achieved_ml,
            refresh.goal.target_ml
        );
        notifier.goal_achieved(refresh.goal.target_ml);
    }
    Ok(refresh)
}

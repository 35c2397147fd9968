use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::{
    clock::SharedClock,
    db::{
        models::{CupProfile, SipEvent, UserSettings},
        Database,
    },
    detection::DetectionEngine,
    metrics::PipelineMetrics,
    models::TrackerStats,
    notify::NotificationService,
    settings::SettingsStore,
    sip::{AggregatorConfig, CupConverter, SipAggregator, SipTracker},
};

use super::{
    loop_worker::{detection_loop, persist_sip, PipelineContext},
    FeatureSource,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

struct ActiveRun {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Owns the day's sip tracker and the background detection task. Manual sips
/// and daily resets go through here so the tracker has a single writer.
#[derive(Clone)]
pub struct DetectionController {
    db: Database,
    settings: Arc<SettingsStore>,
    notifier: NotificationService,
    metrics: PipelineMetrics,
    clock: SharedClock,
    tracker: Arc<Mutex<SipTracker>>,
    run: Arc<Mutex<Option<ActiveRun>>>,
}

impl DetectionController {
    pub fn new(
        db: Database,
        settings: Arc<SettingsStore>,
        notifier: NotificationService,
        metrics: PipelineMetrics,
        clock: SharedClock,
    ) -> Self {
        let params = settings.get().detection_params();
        let aggregator = SipAggregator::new(AggregatorConfig::from_params(&params), clock.clone());
        let tracker = SipTracker::new(aggregator, CupConverter::default(), clock.clone());

        Self {
            db,
            settings,
            notifier,
            metrics,
            clock,
            tracker: Arc::new(Mutex::new(tracker)),
            run: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.run
            .lock()
            .await
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
    }

    pub fn tracker(&self) -> Arc<Mutex<SipTracker>> {
        Arc::clone(&self.tracker)
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Starts detecting at the configured camera rate. Fails while a run is
    /// still active; a run whose source has run out is cleared first.
    pub async fn start_detection(&self, source: Box<dyn FeatureSource>) -> Result<()> {
        let frame_interval = self.settings.get().frame_interval();
        self.start_detection_with_interval(source, frame_interval)
            .await
    }

    pub async fn start_detection_with_interval(
        &self,
        source: Box<dyn FeatureSource>,
        frame_interval: Duration,
    ) -> Result<()> {
        let mut run = self.run.lock().await;
        if run
            .as_ref()
            .is_some_and(|active| !active.handle.is_finished())
        {
            bail!("detection already active");
        }
        if let Some(finished) = run.take() {
            // The previous loop ended on its own when its source ran out.
            if let Err(err) = finished.handle.await {
                log_warn!("previous detection loop ended abnormally: {err:?}");
            }
            if self.tracker.lock().await.abandon_pending() {
                log_info!("in-progress sip from the finished run discarded");
            }
        }

        let settings = self.settings.get();
        let engine = DetectionEngine::for_source(
            settings.detection_engine,
            settings.detection_params(),
            self.clock.clone(),
            source.supports_landmarks(),
        );
        if !engine.is_available() {
            log_warn!(
                "{} engine is unavailable; detection will report nothing",
                settings.detection_engine
            );
        }

        let profile = self.active_profile(&settings).await?;
        if let Some(profile) = &profile {
            self.tracker.lock().await.set_default_profile(profile.clone());
        }
        self.notifier.set_enabled(settings.enable_notifications);

        let ctx = PipelineContext {
            db: self.db.clone(),
            tracker: Arc::clone(&self.tracker),
            notifier: self.notifier.clone(),
            metrics: self.metrics.clone(),
            clock: self.clock.clone(),
            profile,
            daily_goal_ml: settings.daily_goal_ml,
        };

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(detection_loop(
            ctx,
            engine,
            source,
            frame_interval,
            cancel_token.clone(),
        ));

        *run = Some(ActiveRun {
            handle,
            cancel_token,
        });
        log_info!("detection started with {} engine", settings.detection_engine);
        Ok(())
    }

    /// Stops the loop and drops any half-finished sip. Safe to call when idle.
    pub async fn stop_detection(&self) -> Result<()> {
        let active = self.run.lock().await.take();
        if let Some(ActiveRun {
            handle,
            cancel_token,
        }) = active
        {
            cancel_token.cancel();
            handle
                .await
                .context("detection loop task failed to join")?;
            log_info!("detection stopped");
        }

        if self.tracker.lock().await.abandon_pending() {
            log_info!("in-progress sip discarded on stop");
        }
        Ok(())
    }

    pub async fn add_manual_sip(&self, ml: f64) -> Result<SipEvent> {
        let settings = self.settings.get();
        let profile = self.active_profile(&settings).await?;
        let mut event = self
            .tracker
            .lock()
            .await
            .add_manual_sip(ml, profile.as_ref())?;

        persist_sip(&self.db, &self.notifier, &mut event, settings.daily_goal_ml).await?;
        Ok(event)
    }

    pub async fn reset_daily(&self) {
        self.tracker.lock().await.reset_daily_stats();
    }

    pub async fn daily_totals(&self) -> TrackerStats {
        self.tracker.lock().await.get_daily_stats()
    }

    /// The configured default profile, falling back to the store's default.
    async fn active_profile(&self, settings: &UserSettings) -> Result<Option<CupProfile>> {
        if let Some(profile_id) = settings.default_cup_profile_id {
            if let Some(profile) = self.db.get_cup_profile(profile_id).await? {
                return Ok(Some(profile));
            }
            log_warn!("configured cup profile {profile_id} not found; using default");
        }
        self.db.get_default_cup_profile().await
    }
}

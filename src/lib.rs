pub mod clock;
pub mod config;
pub mod db;
pub mod detection;
pub mod error;
pub mod export;
pub mod metrics;
pub mod models;
pub mod notify;
pub mod scheduler;
pub mod sensing;
pub mod settings;
pub mod sip;
pub mod stats;
mod utils;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;

use clock::{SharedClock, SystemClock};
use config::{parse_log_level, AppConfig};
use db::{models::UserSettings, Database};
use detection::EngineKind;
use metrics::PipelineMetrics;
use notify::{LogSink, NotificationService};
use scheduler::{install_default_jobs, Scheduler};
use sensing::{
    DetectionController, FeatureSource, FixedFaceLocator, ImageDirSource, ImageFeatureExtractor,
    SyntheticFeed,
};
use settings::SettingsStore;

#[derive(Parser, Debug)]
#[command(name = "countcups")]
#[command(about = "Counts sips of water from a camera feed and tracks a daily hydration goal")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warning, error)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Detection engine: heuristics, skin-color or mediapipe
    #[arg(long, value_name = "ENGINE")]
    detection_engine: Option<EngineKind>,

    /// Directory holding the database
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Replay an ordered directory of images instead of the synthetic feed
    #[arg(long, value_name = "DIR")]
    frames_dir: Option<PathBuf>,

    /// Seed for the synthetic feed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long, value_name = "SECS")]
    run_for_secs: Option<u64>,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) -> Result<()> {
        if let Some(level) = &self.log_level {
            config.log_level = parse_log_level(level)?;
        }
        if self.debug {
            config.debug = true;
        }
        if config.debug {
            config.log_level = LevelFilter::Debug;
        }
        if let Some(engine) = self.detection_engine {
            config.detection_engine = engine;
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        Ok(())
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let mut config = AppConfig::from_env().context("invalid COUNTCUPS_* configuration")?;
    args.apply(&mut config)?;

    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(config.log_level)
        .init();

    log::info!("CountCups starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(run_app(config, args))
}

async fn run_app(config: AppConfig, args: Args) -> Result<()> {
    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!("failed to create data dir {}", config.data_dir.display())
    })?;
    let db = Database::new(config.db_path())?;

    let settings = Arc::new(SettingsStore::new(db.clone(), UserSettings::from_config(&config)).await?);
    if let Some(engine) = args.detection_engine {
        let mut current = settings.get();
        if current.detection_engine != engine {
            current.detection_engine = engine;
            settings.update(current).await?;
        }
    }
    let current = settings.get();

    let clock: SharedClock = Arc::new(SystemClock);
    let notifier = NotificationService::new(Arc::new(LogSink), current.enable_notifications);
    let controller = DetectionController::new(
        db.clone(),
        Arc::clone(&settings),
        notifier.clone(),
        PipelineMetrics::new(),
        clock.clone(),
    );

    let scheduler = Scheduler::new(clock.clone());
    install_default_jobs(
        &scheduler,
        controller.clone(),
        db.clone(),
        Arc::clone(&settings),
        notifier,
        clock.clone(),
    )
    .await;
    scheduler.start().await;

    let source = open_source(&args, &current)?;
    controller.start_detection(source).await?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                log::warn!("failed to listen for Ctrl-C: {err}");
            }
            log::info!("interrupted; shutting down");
        }
        _ = run_limit(args.run_for_secs) => {
            log::info!("run time limit reached");
        }
        _ = source_exhausted(&controller) => {
            log::info!("frame source exhausted");
        }
    }

    controller.stop_detection().await?;
    scheduler.stop().await;

    let snapshot = controller.metrics().get_snapshot().await;
    log::info!(
        "processed {} frames ({} failed), {} sips recorded ({} stored), avg tick {:.2}ms",
        snapshot.counters.frames_processed,
        snapshot.counters.frames_failed,
        snapshot.counters.sips_recorded,
        snapshot.counters.sips_persisted,
        snapshot.average_tick_ms()
    );

    let stats = db
        .get_daily_stats(clock.today(), settings.get().daily_goal_ml)
        .await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&stats).context("failed to serialise daily stats")?
    );
    Ok(())
}

fn open_source(args: &Args, settings: &UserSettings) -> Result<Box<dyn FeatureSource>> {
    match &args.frames_dir {
        Some(dir) => {
            let locator =
                FixedFaceLocator::for_resolution(settings.camera_width, settings.camera_height);
            let extractor = ImageFeatureExtractor::new(Box::new(locator));
            let source = ImageDirSource::open(dir, extractor)?;
            log::info!("replaying {} frames from {}", source.len(), dir.display());
            Ok(Box::new(source))
        }
        None => {
            log::info!("no frames directory given; using synthetic feed (seed {})", args.seed);
            Ok(Box::new(SyntheticFeed::new(
                args.seed,
                settings.camera_width,
                settings.camera_height,
            )))
        }
    }
}

async fn run_limit(limit_secs: Option<u64>) {
    match limit_secs {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => std::future::pending::<()>().await,
    }
}

async fn source_exhausted(controller: &DetectionController) {
    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    loop {
        ticker.tick().await;
        if !controller.is_running().await {
            return;
        }
    }
}

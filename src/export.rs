//! JSON snapshots of statistics and cup profiles.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    clock::SharedClock,
    db::{models::CupProfile, Database},
    models::DailyStats,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Longest range a single export may cover.
const MAX_EXPORT_DAYS: i64 = 366;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub daily_stats: Vec<DailyStats>,
    pub cup_profiles: Vec<CupProfile>,
    pub export_timestamp: DateTime<Utc>,
}

pub struct DataExporter {
    db: Database,
    clock: SharedClock,
}

impl DataExporter {
    pub fn new(db: Database, clock: SharedClock) -> Self {
        Self { db, clock }
    }

    /// Collects per-day stats for `start..=end` plus every cup profile.
    pub async fn collect(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        default_target_ml: u32,
    ) -> Result<ExportData> {
        if end < start {
            bail!("export range ends ({end}) before it starts ({start})");
        }
        let days = (end - start).num_days() + 1;
        if days > MAX_EXPORT_DAYS {
            bail!("export range of {days} days exceeds {MAX_EXPORT_DAYS}");
        }

        let mut daily_stats = Vec::with_capacity(days as usize);
        for date in start.iter_days().take(days as usize) {
            daily_stats.push(self.db.get_daily_stats(date, default_target_ml).await?);
        }

        Ok(ExportData {
            start_date: start,
            end_date: end,
            daily_stats,
            cup_profiles: self.db.get_all_cup_profiles().await?,
            export_timestamp: self.clock.now(),
        })
    }

    /// Writes `count_cups_export_<timestamp>.json` into `dir` and returns its path.
    pub async fn export_complete_data(
        &self,
        dir: &Path,
        start: NaiveDate,
        end: NaiveDate,
        default_target_ml: u32,
    ) -> Result<PathBuf> {
        let data = self.collect(start, end, default_target_ml).await?;

        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create export dir {}", dir.display()))?;
        let file_name = format!(
            "count_cups_export_{}.json",
            data.export_timestamp.format("%Y%m%d_%H%M%S")
        );
        let path = dir.join(file_name);

        let json = serde_json::to_string_pretty(&data).context("failed to serialise export")?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write export {}", path.display()))?;

        log_info!(
            "exported {} days and {} cup profiles to {}",
            data.daily_stats.len(),
            data.cup_profiles.len(),
            path.display()
        );
        Ok(path)
    }

    pub fn import_data(path: &Path) -> Result<ExportData> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read export {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse export {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        clock::{local_day_bounds, ManualClock},
        db::models::SipEvent,
    };

    fn setup() -> (DataExporter, Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(temp_dir.path().join("export.sqlite3")).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 4, 8).unwrap();
        let clock = ManualClock::at_local_noon(date);
        (DataExporter::new(db.clone(), Arc::new(clock)), db, temp_dir)
    }

    #[tokio::test]
    async fn export_writes_pretty_json_that_imports_back() {
        let (exporter, db, temp_dir) = setup();
        let start = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 4, 3).unwrap();

        let (day_start, _) = local_day_bounds(start + Duration::days(1));
        let mut sip = SipEvent::manual(day_start + Duration::hours(9), 1, 120.0).unwrap();
        sip.id = Some(db.insert_sip_event(&sip).await.unwrap());

        let export_dir = temp_dir.path().join("exports");
        let path = exporter
            .export_complete_data(&export_dir, start, end, 1000)
            .await
            .unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("count_cups_export_"));
        assert!(name.ends_with(".json"));
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n  \"startDate\": \"2024-04-01\""));

        let data = DataExporter::import_data(&path).unwrap();
        assert_eq!(data.daily_stats.len(), 3);
        assert_eq!(data.daily_stats[1].total_ml, 120.0);
        assert_eq!(data.daily_stats[1].events, vec![sip]);
        assert_eq!(data.daily_stats[0].total_sips, 0);
        assert_eq!(data.cup_profiles.len(), 1);
        assert_eq!(data.cup_profiles[0].name, "Default");
    }

    #[tokio::test]
    async fn rejects_inverted_range() {
        let (exporter, _db, temp_dir) = setup();
        let start = NaiveDate::from_ymd_opt(2024, 4, 3).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();

        let result = exporter
            .export_complete_data(temp_dir.path(), start, end, 1000)
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn import_reports_malformed_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(DataExporter::import_data(&path).is_err());
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyGoal {
    pub id: Option<i64>,
    pub date: NaiveDate,
    pub target_ml: u32,
    pub achieved_ml: f64,
    pub is_achieved: bool,
    /// Consecutive achieved days immediately before `date`.
    pub streak_days: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DailyGoal {
    /// Capped at 100.
    pub fn progress_percentage(&self) -> f64 {
        if self.target_ml == 0 {
            return 0.0;
        }
        (self.achieved_ml / f64::from(self.target_ml) * 100.0).min(100.0)
    }

    pub fn remaining_ml(&self) -> f64 {
        (f64::from(self.target_ml) - self.achieved_ml).max(0.0)
    }
}

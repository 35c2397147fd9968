pub mod detection;
pub mod stats;

pub use detection::{DetectionResult, FaceBox, FrameFeatures, Point};
pub use stats::{DailyStats, TrackerStats, WeeklyStats};

//! Frame sources, feature extraction and the background detection pipeline.

mod controller;
mod feed;
mod loop_worker;
mod skin;


use anyhow::Result;

use crate::models::FrameFeatures;

pub use controller::DetectionController;
pub use feed::SyntheticFeed;
pub use loop_worker::{PipelineContext, TickOutcome};
pub use skin::{FaceLocator, FixedFaceLocator, ImageDirSource, ImageFeatureExtractor};

/// Supplies one feature tuple per frame at whatever rate the caller polls.
pub trait FeatureSource: Send {
    /// `Ok(None)` once the source is exhausted. `Err` is a transient failure
    /// for this frame only.
    fn next_features(&mut self) -> Result<Option<FrameFeatures>>;

    /// Whether frames carry hand-landmark confidences.
    fn supports_landmarks(&self) -> bool {
        false
    }
}

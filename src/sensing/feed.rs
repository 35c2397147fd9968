use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::models::{FaceBox, FrameFeatures, Point};

use super::FeatureSource;

/// Frames per drinking cycle; each of the four phases takes a quarter.
const CYCLE_FRAMES: u64 = 200;
const PHASE_FRAMES: u64 = CYCLE_FRAMES / 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
    Idle,
    Approach,
    Drink,
    Leave,
}

/// Seeded generator of drinking-gesture features for camera-less runs.
pub struct SyntheticFeed {
    rng: StdRng,
    frame: u64,
    frame_limit: Option<u64>,
    face: FaceBox,
    rest: Point,
    mouth: Point,
}

impl SyntheticFeed {
    pub fn new(seed: u64, width: u32, height: u32) -> Self {
        let (width, height) = (f64::from(width), f64::from(height));
        let face_center = Point::new(width / 2.0, height / 3.0);
        Self {
            rng: StdRng::seed_from_u64(seed),
            frame: 0,
            frame_limit: None,
            face: FaceBox::new(face_center.x - 100.0, face_center.y - 125.0, 200.0, 250.0),
            rest: Point::new(width / 2.0 + 100.0, height / 2.0),
            mouth: Point::new(width / 2.0 + 20.0, height / 2.0 - 30.0),
        }
    }

    /// Stops the feed after `frames` frames.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    pub fn phase(&self) -> FeedPhase {
        phase_of(self.frame)
    }

    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    fn generate(&mut self) -> FrameFeatures {
        let offset = self.frame % CYCLE_FRAMES;
        let progress = (offset % PHASE_FRAMES) as f64 / PHASE_FRAMES as f64;

        let (hand, head_tilt, motion) = match phase_of(self.frame) {
            FeedPhase::Idle => (self.rest, self.rng.gen_range(0.0..5.0), false),
            FeedPhase::Approach => (lerp(self.rest, self.mouth, progress), self.rng.gen_range(0.0..5.0), true),
            FeedPhase::Drink => {
                let jitter = Point::new(
                    self.mouth.x + self.rng.gen_range(-3.0..3.0),
                    self.mouth.y + self.rng.gen_range(-3.0..3.0),
                );
                let tilt = 32.0 + 4.0 * ((offset - 2 * PHASE_FRAMES) as f64 * 0.2).sin();
                (jitter, tilt, true)
            }
            FeedPhase::Leave => (lerp(self.mouth, self.rest, progress), self.rng.gen_range(0.0..5.0), true),
        };

        FrameFeatures {
            face: Some(self.face),
            hand: Some(hand),
            head_tilt: Some(head_tilt),
            motion,
            hand_confidence: Some(self.rng.gen_range(0.85..0.95)),
        }
    }
}

impl FeatureSource for SyntheticFeed {
    fn next_features(&mut self) -> Result<Option<FrameFeatures>> {
        if self.frame_limit.is_some_and(|limit| self.frame >= limit) {
            return Ok(None);
        }
        let features = self.generate();
        self.frame += 1;
        Ok(Some(features))
    }

    fn supports_landmarks(&self) -> bool {
        true
    }
}

fn phase_of(frame: u64) -> FeedPhase {
    match (frame % CYCLE_FRAMES) / PHASE_FRAMES {
        0 => FeedPhase::Idle,
        1 => FeedPhase::Approach,
        2 => FeedPhase::Drink,
        _ => FeedPhase::Leave,
    }
}

fn lerp(from: Point, to: Point, t: f64) -> Point {
    Point::new(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t)
}

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use image::{imageops, GrayImage, Rgb, RgbImage};

use crate::models::{FaceBox, FrameFeatures, Point};

use super::FeatureSource;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = false;

use crate::{log_debug, log_info};

const SKIN_MAX_HUE_DEG: f64 = 40.0;
const SKIN_MIN_SATURATION: f64 = 20.0 / 255.0;
const SKIN_MIN_VALUE: f64 = 70.0 / 255.0;
const MIN_HAND_PIXELS: usize = 500;

const MOTION_PIXEL_THRESHOLD: u8 = 30;
/// Fraction of the face region that must change to count as motion.
const MOTION_AREA_FRACTION: f64 = 0.01;

/// Aspect ratio of an upright face box.
const NEUTRAL_FACE_ASPECT: f64 = 0.8;
const TILT_DEG_PER_ASPECT: f64 = 50.0;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

pub trait FaceLocator: Send {
    fn locate(&mut self, frame: &RgbImage) -> Option<FaceBox>;
}

/// A calibrated face region that never moves.
#[derive(Debug, Clone, Copy)]
pub struct FixedFaceLocator {
    face: FaceBox,
}

impl FixedFaceLocator {
    pub fn new(face: FaceBox) -> Self {
        Self { face }
    }

    /// Upper-center region sized for a seated user at the given resolution.
    pub fn for_resolution(width: u32, height: u32) -> Self {
        let (width, height) = (f64::from(width), f64::from(height));
        let face_width = width * 0.3;
        let face_height = face_width / NEUTRAL_FACE_ASPECT;
        Self::new(FaceBox::new(
            (width - face_width) / 2.0,
            height / 3.0 - face_height / 2.0,
            face_width,
            face_height,
        ))
    }
}

impl FaceLocator for FixedFaceLocator {
    fn locate(&mut self, _frame: &RgbImage) -> Option<FaceBox> {
        Some(self.face)
    }
}

/// Skin-colour heuristic over RGB frames. Keeps the previous grey frame for
/// motion detection, so one extractor serves one stream.
pub struct ImageFeatureExtractor {
    locator: Box<dyn FaceLocator>,
    previous_gray: Option<GrayImage>,
}

impl ImageFeatureExtractor {
    pub fn new(locator: Box<dyn FaceLocator>) -> Self {
        Self {
            locator,
            previous_gray: None,
        }
    }

    pub fn extract(&mut self, frame: &RgbImage) -> FrameFeatures {
        let gray = imageops::grayscale(frame);
        let face = self.locator.locate(frame);

        let features = match face {
            Some(face) => FrameFeatures {
                face: Some(face),
                hand: find_hand(frame, &face),
                head_tilt: Some(tilt_from_aspect(&face)),
                motion: self
                    .previous_gray
                    .as_ref()
                    .map(|previous| motion_in_region(previous, &gray, &face))
                    .unwrap_or(false),
                hand_confidence: None,
            },
            None => FrameFeatures::default(),
        };

        self.previous_gray = Some(gray);
        features
    }

    pub fn reset(&mut self) {
        self.previous_gray = None;
    }
}

/// `|w/h - 0.8| x 50` degrees.
pub fn tilt_from_aspect(face: &FaceBox) -> f64 {
    if !(face.height > 0.0) {
        return 0.0;
    }
    (face.width / face.height - NEUTRAL_FACE_ASPECT).abs() * TILT_DEG_PER_ASPECT
}

fn is_skin(pixel: &Rgb<u8>) -> bool {
    let [r, g, b] = pixel.0.map(|channel| f64::from(channel) / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    if max < SKIN_MIN_VALUE || max <= 0.0 || delta / max < SKIN_MIN_SATURATION {
        return false;
    }

    let hue = if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    hue <= SKIN_MAX_HUE_DEG
}

/// Centroid of skin-coloured pixels outside the face region.
fn find_hand(frame: &RgbImage, face: &FaceBox) -> Option<Point> {
    let (mut sum_x, mut sum_y, mut count) = (0.0, 0.0, 0usize);
    for (x, y, pixel) in frame.enumerate_pixels() {
        let point = Point::new(f64::from(x), f64::from(y));
        if face.contains(&point) || !is_skin(pixel) {
            continue;
        }
        sum_x += point.x;
        sum_y += point.y;
        count += 1;
    }

    if count < MIN_HAND_PIXELS {
        return None;
    }
    Some(Point::new(sum_x / count as f64, sum_y / count as f64))
}

fn motion_in_region(previous: &GrayImage, current: &GrayImage, face: &FaceBox) -> bool {
    if previous.dimensions() != current.dimensions() {
        return false;
    }
    let (width, height) = current.dimensions();
    let clamp = |value: f64, limit: u32| (value.max(0.0) as u32).min(limit);
    let (x0, x1) = (clamp(face.x, width), clamp(face.x + face.width, width));
    let (y0, y1) = (clamp(face.y, height), clamp(face.y + face.height, height));

    let total = u64::from(x1.saturating_sub(x0)) * u64::from(y1.saturating_sub(y0));
    if total == 0 {
        return false;
    }

    let mut changed = 0u64;
    for y in y0..y1 {
        for x in x0..x1 {
            let before = previous.get_pixel(x, y).0[0];
            let after = current.get_pixel(x, y).0[0];
            if before.abs_diff(after) > MOTION_PIXEL_THRESHOLD {
                changed += 1;
            }
        }
    }
    changed as f64 / total as f64 > MOTION_AREA_FRACTION
}

/// Replays a directory of still images, in file-name order, as camera frames.
pub struct ImageDirSource {
    frames: Vec<PathBuf>,
    position: usize,
    extractor: ImageFeatureExtractor,
}

impl ImageDirSource {
    pub fn open(dir: &Path, extractor: ImageFeatureExtractor) -> Result<Self> {
        let mut frames = Vec::new();
        for entry in fs::read_dir(dir)
            .with_context(|| format!("failed to read frame directory {}", dir.display()))?
        {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if is_image {
                frames.push(path);
            }
        }
        frames.sort();

        log_info!("replaying {} frames from {}", frames.len(), dir.display());
        Ok(Self {
            frames,
            position: 0,
            extractor,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FeatureSource for ImageDirSource {
    fn next_features(&mut self) -> Result<Option<FrameFeatures>> {
        let Some(path) = self.frames.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;

        let frame = image::open(path)
            .with_context(|| format!("failed to decode frame {}", path.display()))?
            .to_rgb8();
        let features = self.extractor.extract(&frame);
        log_debug!("{}: {:?}", path.display(), features);
        Ok(Some(features))
    }
}

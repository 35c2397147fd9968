//! Pure confidence scoring for completed gestures.

use super::EngineKind;

/// Relative weight of each factor. Weights of one variant sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceWeights {
    pub distance: f64,
    pub tilt: f64,
    pub auxiliary: f64,
    pub timing: f64,
}

/// Per-factor scores, each expected in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConfidenceFactors {
    pub distance: f64,
    pub tilt: f64,
    /// Motion present (flat) or hand-landmark confidence.
    pub auxiliary: f64,
    /// Closeness to the optimal duration, or frame support for the skin-color variant.
    pub timing: f64,
}

impl EngineKind {
    pub fn weights(&self) -> ConfidenceWeights {
        match self {
            EngineKind::SkinColor | EngineKind::MultiCue => ConfidenceWeights {
                distance: 0.3,
                tilt: 0.3,
                auxiliary: 0.2,
                timing: 0.2,
            },
            EngineKind::Landmark => ConfidenceWeights {
                distance: 0.3,
                tilt: 0.2,
                auxiliary: 0.3,
                timing: 0.2,
            },
        }
    }
}

/// `1 - distance/threshold`, floored at 0.
pub fn distance_factor(distance: f64, threshold: f64) -> f64 {
    if !(threshold > 0.0) {
        return 0.0;
    }
    unit(1.0 - distance / threshold)
}

/// `|tilt|/threshold`, capped at 1.
pub fn tilt_factor(tilt: f64, threshold: f64) -> f64 {
    if !(threshold > 0.0) {
        return 0.0;
    }
    unit(tilt.abs() / threshold)
}

/// Peaks at `optimal_secs` and falls off linearly to 0 at 0 and 2x optimal.
pub fn duration_factor(duration_secs: f64, optimal_secs: f64) -> f64 {
    if !(optimal_secs > 0.0) {
        return 0.0;
    }
    unit(1.0 - (duration_secs - optimal_secs).abs() / optimal_secs)
}

/// Ten qualifying frames give full support.
pub fn frame_support(frames: usize) -> f64 {
    unit(frames as f64 / 10.0)
}

/// Weighted sum clipped to [0, 1]. Non-finite input scores as 0.
pub fn combine(factors: ConfidenceFactors, weights: ConfidenceWeights) -> f64 {
    unit(
        weights.distance * unit(factors.distance)
            + weights.tilt * unit(factors.tilt)
            + weights.auxiliary * unit(factors.auxiliary)
            + weights.timing * unit(factors.timing),
    )
}

fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KINDS: [EngineKind; 3] = [
        EngineKind::SkinColor,
        EngineKind::MultiCue,
        EngineKind::Landmark,
    ];

    #[test]
    fn weights_sum_to_one() {
        for kind in KINDS {
            let w = kind.weights();
            assert!((w.distance + w.tilt + w.auxiliary + w.timing - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn confidence_stays_in_unit_interval() {
        let samples = [
            -1.0e9, -250.0, -1.0, 0.0, 0.5, 1.0, 25.0, 99.9, 100.0, 1.0e9, f64::MAX, f64::MIN,
        ];
        for kind in KINDS {
            for &distance in &samples {
                for &tilt in &samples {
                    for &duration in &samples {
                        let factors = ConfidenceFactors {
                            distance: distance_factor(distance, 100.0),
                            tilt: tilt_factor(tilt, 25.0),
                            auxiliary: distance,
                            timing: duration_factor(duration, 2.0),
                        };
                        let score = combine(factors, kind.weights());
                        assert!(
                            (0.0..=1.0).contains(&score),
                            "{kind} d={distance} t={tilt} dur={duration} -> {score}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn confidence_never_drops_as_hand_moves_closer() {
        for kind in KINDS {
            let mut previous = f64::NEG_INFINITY;
            let mut distance = 150.0;
            while distance >= 0.0 {
                let score = combine(
                    ConfidenceFactors {
                        distance: distance_factor(distance, 100.0),
                        tilt: tilt_factor(30.0, 25.0),
                        auxiliary: 1.0,
                        timing: duration_factor(1.5, 2.0),
                    },
                    kind.weights(),
                );
                assert!(score >= previous, "{kind}: {score} < {previous} at {distance}");
                previous = score;
                distance -= 2.5;
            }
        }
    }

    #[test]
    fn duration_factor_peaks_at_optimum() {
        assert_eq!(duration_factor(2.0, 2.0), 1.0);
        assert_eq!(duration_factor(1.0, 2.0), 0.5);
        assert_eq!(duration_factor(3.0, 2.0), 0.5);
        assert_eq!(duration_factor(5.0, 2.0), 0.0);
    }

    #[test]
    fn degenerate_thresholds_score_zero() {
        assert_eq!(distance_factor(10.0, 0.0), 0.0);
        assert_eq!(tilt_factor(10.0, -1.0), 0.0);
        assert_eq!(duration_factor(1.0, 0.0), 0.0);
        assert_eq!(frame_support(25), 1.0);
        assert_eq!(frame_support(5), 0.5);
    }
}

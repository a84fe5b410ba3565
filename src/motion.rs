//! Motion-direction analysis
//!
//! Tracks the face centre across the recording and checks that it moved in
//! the requested direction, far enough, and with organic (non-uniform)
//! frame-to-frame variation. A photo held still gives no displacement; a
//! photo panned by hand moves rigidly and gives almost no variability.

use tracing::debug;

use crate::config::MotionThresholds;
use crate::locator::FaceLocator;
use crate::stats::{mean, population_std};
use crate::types::{ChallengeKind, ChallengeSession, LayerFailure, LayerKind, LayerResult};

/// Mean displacement between the leading and trailing thirds of a track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Displacement {
    pub move_x: f64,
    pub move_y: f64,
    pub magnitude: f64,
}

/// Analyze face motion against the requested challenge
pub fn analyze_motion(
    session: &ChallengeSession,
    challenge: ChallengeKind,
    locator: &dyn FaceLocator,
    thresholds: &MotionThresholds,
) -> LayerResult {
    let centers: Vec<(f64, f64)> = session
        .frames()
        .iter()
        .step_by(thresholds.stride.max(1))
        .filter_map(|frame| locator.locate(frame))
        .map(|face| face.center())
        .collect();

    if centers.len() < thresholds.min_detections {
        debug!(
            found = centers.len(),
            required = thresholds.min_detections,
            "motion layer lacks face detections"
        );
        return LayerResult::insufficient(
            LayerKind::Motion,
            LayerFailure::InsufficientFaceDetections {
                found: centers.len(),
                required: thresholds.min_detections,
            },
        )
        .with_detail("frames_analyzed", centers.len());
    }

    let displacement = displacement(&centers);
    let variability = variability(&centers);
    let direction_matches = direction_matches(challenge, &displacement, thresholds);

    let passed = direction_matches
        && displacement.magnitude > thresholds.min_magnitude
        && variability > thresholds.min_variability;
    let score = (displacement.magnitude / 100.0 + variability / 10.0).min(1.0);

    debug!(
        challenge = %challenge,
        move_x = displacement.move_x,
        move_y = displacement.move_y,
        magnitude = displacement.magnitude,
        variability,
        passed,
        "motion layer evaluated"
    );

    LayerResult::new(LayerKind::Motion, passed, score)
        .with_detail("magnitude", displacement.magnitude)
        .with_detail("move_x", displacement.move_x)
        .with_detail("move_y", displacement.move_y)
        .with_detail("variability", variability)
        .with_detail("direction_matches", direction_matches)
        .with_detail("frames_analyzed", centers.len())
}

/// Displacement of the trailing third's mean centre from the leading third's.
///
/// The leading third takes `floor(n / 3)` centres and the trailing third
/// `ceil(n / 3)`, so their sizes differ by one when `n` is not a multiple of 3.
pub fn displacement(centers: &[(f64, f64)]) -> Displacement {
    let lead = centers.len() / 3;
    let tail = (centers.len() + 2) / 3;
    if lead == 0 {
        return Displacement {
            move_x: 0.0,
            move_y: 0.0,
            magnitude: 0.0,
        };
    }

    let axis_mean = |points: &[(f64, f64)], pick: fn(&(f64, f64)) -> f64| {
        let values: Vec<f64> = points.iter().map(pick).collect();
        mean(&values).unwrap_or(0.0)
    };

    let leading = &centers[..lead];
    let trailing = &centers[centers.len() - tail..];

    let move_x = axis_mean(trailing, |p| p.0) - axis_mean(leading, |p| p.0);
    let move_y = axis_mean(trailing, |p| p.1) - axis_mean(leading, |p| p.1);

    Displacement {
        move_x,
        move_y,
        magnitude: move_x.hypot(move_y),
    }
}

/// Standard deviation of the frame-to-frame step length
pub fn variability(centers: &[(f64, f64)]) -> f64 {
    let steps: Vec<f64> = centers
        .windows(2)
        .map(|pair| (pair[1].0 - pair[0].0).hypot(pair[1].1 - pair[0].1))
        .collect();
    population_std(&steps).unwrap_or(0.0)
}

/// Whether the displacement satisfies the challenge's direction predicate.
///
/// Smiles are direction-agnostic: any general movement counts.
pub fn direction_matches(
    challenge: ChallengeKind,
    displacement: &Displacement,
    thresholds: &MotionThresholds,
) -> bool {
    match challenge {
        ChallengeKind::MoveLeft => displacement.move_x < -thresholds.horizontal_px,
        ChallengeKind::MoveRight => displacement.move_x > thresholds.horizontal_px,
        ChallengeKind::MoveUp => displacement.move_y < -thresholds.vertical_px,
        ChallengeKind::MoveDown => displacement.move_y > thresholds.vertical_px,
        ChallengeKind::Smile => displacement.magnitude > thresholds.smile_magnitude,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::{FixedFaceLocator, ScriptedFaceLocator};
    use crate::types::{FaceBox, FrameSample};
    use image::RgbImage;

    const JITTER_X: [f64; 10] = [0.0, 4.5, -2.5, 5.0, -4.5, 2.0, -5.0, 3.0, -1.5, 4.0];
    const JITTER_Y: [f64; 10] = [1.5, -3.0, 4.0, -2.0, 2.5, -4.0, 0.5, 3.0, -2.5, -0.5];

    fn session(n: usize) -> ChallengeSession {
        let frames = (0..n)
            .map(|i| FrameSample::new(i as u64, RgbImage::new(8, 8)))
            .collect();
        ChallengeSession::from_frames(ChallengeKind::MoveLeft, frames)
    }

    fn face_at(cx: f64, cy: f64) -> FaceBox {
        FaceBox::new(cx - 50.0, cy - 50.0, 100.0, 100.0)
    }

    /// Face drifting `step` px per sampled frame along one axis (20 steps
    /// between the leading and trailing thirds), optionally with organic
    /// jitter of std-dev about 3 px
    fn drifting_locator(frames: usize, step: (f64, f64), jitter: bool) -> ScriptedFaceLocator {
        let mut locator = ScriptedFaceLocator::new();
        for seq in (0..frames).step_by(3) {
            let k = seq / 3;
            let (jx, jy) = match (jitter, step.0 != 0.0) {
                (false, _) => (0.0, 0.0),
                (true, true) => (JITTER_X[k % 10], JITTER_Y[k % 10]),
                (true, false) => (JITTER_Y[k % 10], JITTER_X[k % 10]),
            };
            let cx = 320.0 + step.0 * k as f64 + jx;
            let cy = 240.0 + step.1 * k as f64 + jy;
            locator.insert(seq as u64, face_at(cx, cy));
        }
        locator
    }

    #[test]
    fn test_static_face_fails() {
        let locator = FixedFaceLocator(Some(face_at(320.0, 240.0)));
        let result = analyze_motion(
            &session(90),
            ChallengeKind::MoveLeft,
            &locator,
            &MotionThresholds::default(),
        );
        assert!(!result.passed);
        assert_eq!(result.detail_f64("magnitude"), Some(0.0));
        assert_eq!(result.detail_f64("variability"), Some(0.0));
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_organic_left_movement_passes() {
        let locator = drifting_locator(90, (-2.0, 0.0), true);
        let result = analyze_motion(
            &session(90),
            ChallengeKind::MoveLeft,
            &locator,
            &MotionThresholds::default(),
        );
        assert!(result.passed, "details: {:?}", result.details);
        assert!((result.detail_f64("move_x").unwrap() + 40.0).abs() < 1e-9);
        assert!(result.detail_f64("move_y").unwrap().abs() < 1e-9);
        assert!(result.detail_f64("variability").unwrap() > 2.0);
        assert_eq!(result.detail_f64("frames_analyzed"), Some(30.0));
    }

    #[test]
    fn test_left_movement_fails_right_challenge() {
        let locator = drifting_locator(90, (-2.0, 0.0), true);
        let result = analyze_motion(
            &session(90),
            ChallengeKind::MoveRight,
            &locator,
            &MotionThresholds::default(),
        );
        assert!(!result.passed);
        assert_eq!(result.details["direction_matches"], serde_json::json!(false));
    }

    #[test]
    fn test_rigid_pan_fails_on_variability() {
        let locator = drifting_locator(90, (-2.0, 0.0), false);
        let result = analyze_motion(
            &session(90),
            ChallengeKind::MoveLeft,
            &locator,
            &MotionThresholds::default(),
        );
        assert!(!result.passed);
        assert_eq!(result.details["direction_matches"], serde_json::json!(true));
        assert!(result.detail_f64("variability").unwrap() < 1e-9);
    }

    #[test]
    fn test_smile_accepts_any_direction() {
        let locator = drifting_locator(90, (0.0, -2.0), true);
        let result = analyze_motion(
            &session(90),
            ChallengeKind::Smile,
            &locator,
            &MotionThresholds::default(),
        );
        assert!(result.passed, "details: {:?}", result.details);
    }

    #[test]
    fn test_move_up_uses_vertical_axis() {
        let locator = drifting_locator(90, (0.0, -2.0), true);
        let result = analyze_motion(
            &session(90),
            ChallengeKind::MoveUp,
            &locator,
            &MotionThresholds::default(),
        );
        assert!(result.passed, "details: {:?}", result.details);
        assert!((result.detail_f64("move_y").unwrap() + 40.0).abs() < 1e-9);
        let down = analyze_motion(
            &session(90),
            ChallengeKind::MoveDown,
            &locator,
            &MotionThresholds::default(),
        );
        assert!(!down.passed);
    }

    #[test]
    fn test_too_few_detections() {
        let mut locator = ScriptedFaceLocator::new();
        for seq in (0..27).step_by(3) {
            locator.insert(seq, face_at(300.0, 200.0));
        }
        let result = analyze_motion(
            &session(90),
            ChallengeKind::MoveLeft,
            &locator,
            &MotionThresholds::default(),
        );
        assert!(!result.passed);
        assert_eq!(
            result.failure,
            Some(LayerFailure::InsufficientFaceDetections {
                found: 9,
                required: 10
            })
        );
        assert_eq!(
            result.details["error"],
            serde_json::json!("insufficient face detections")
        );
    }

    #[test]
    fn test_only_every_third_frame_is_located() {
        // Boxes on off-stride frames are never consulted
        let mut locator = ScriptedFaceLocator::new();
        for seq in 0..90u64 {
            if seq % 3 != 0 {
                locator.insert(seq, face_at(300.0, 200.0));
            }
        }
        let result = analyze_motion(
            &session(90),
            ChallengeKind::MoveLeft,
            &locator,
            &MotionThresholds::default(),
        );
        assert!(result.failure.is_some());
    }

    #[test]
    fn test_trailing_third_rounds_up() {
        // 11 centres: leading third is 3, trailing third is 4
        let mut centers = vec![(0.0, 0.0); 8];
        centers.extend([(-25.0, 0.0); 3]);
        let d = displacement(&centers);
        assert_eq!(d.move_x, -18.75);
        assert_eq!(d.move_y, 0.0);
    }

    #[test]
    fn test_eleven_detections_short_of_left_threshold() {
        let mut locator = ScriptedFaceLocator::new();
        for k in 0..11u64 {
            let cx = if k < 8 { 320.0 } else { 295.0 };
            locator.insert(k * 3, face_at(cx, 240.0));
        }
        let result = analyze_motion(
            &session(33),
            ChallengeKind::MoveLeft,
            &locator,
            &MotionThresholds::default(),
        );
        assert_eq!(result.detail_f64("frames_analyzed"), Some(11.0));
        assert_eq!(result.detail_f64("move_x"), Some(-18.75));
        assert_eq!(result.details["direction_matches"], serde_json::json!(false));
        assert!(!result.passed);
    }

    #[test]
    fn test_displacement_of_short_track_is_zero() {
        let d = displacement(&[(1.0, 1.0), (5.0, 5.0)]);
        assert_eq!(d.magnitude, 0.0);
    }
}

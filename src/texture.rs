//! Skin texture and reflectance analysis
//!
//! Real skin shows moderate, irregular local variance with smooth gradients.
//! Printed photos are either texture-flat or carry print-artifact noise and
//! sharper edges. The cheek region is used because it avoids eye and mouth
//! motion and is usually exposed.

use ndarray::{s, ArrayView2};
use tracing::debug;

use crate::config::{CheekRegion, TextureThresholds};
use crate::locator::FaceLocator;
use crate::luma::{crop, luminance, mean_gradient};
use crate::stats::mean;
use crate::types::{ChallengeSession, FaceBox, LayerFailure, LayerKind, LayerResult};

/// Per-frame texture measurements
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureSample {
    /// Mean variance of the overlapping tiles; `None` when the crop is too
    /// small for a single tile
    pub texture: Option<f64>,
    /// Mean Sobel gradient magnitude of the crop
    pub gradient: f64,
}

/// Cheek rectangle `(x, y, width, height)` in pixels for a face box
pub fn cheek_rect(face: &FaceBox, cheek: &CheekRegion) -> (f64, f64, f64, f64) {
    (
        face.x.floor() + (face.width * cheek.x_offset).floor(),
        face.y.floor() + (face.height * cheek.y_offset).floor(),
        (face.width * cheek.width).floor(),
        (face.height * cheek.height).floor(),
    )
}

/// Mean variance of `tile x tile` windows stepped by `step`.
///
/// Tiles start at `0, step, ...` strictly before `len - tile`, so a crop no
/// larger than one tile yields `None`.
pub fn tile_variance(crop: ArrayView2<'_, f64>, tile: usize, step: usize) -> Option<f64> {
    let (rows, cols) = crop.dim();
    if rows <= tile || cols <= tile || step == 0 {
        return None;
    }

    let mut variances = Vec::new();
    for i in (0..rows - tile).step_by(step) {
        for j in (0..cols - tile).step_by(step) {
            let patch = crop.slice(s![i..i + tile, j..j + tile]);
            variances.push(patch.var(0.0));
        }
    }
    mean(&variances)
}

/// Measure one non-empty cheek crop
pub fn measure_crop(crop: ArrayView2<'_, f64>, thresholds: &TextureThresholds) -> TextureSample {
    TextureSample {
        texture: tile_variance(crop, thresholds.tile_size, thresholds.tile_step),
        gradient: mean_gradient(crop),
    }
}

/// Analyze skin texture over evenly spaced frames.
///
/// Only frames whose crop holds at least one tile count as valid, but every
/// non-empty crop contributes to the mean gradient.
pub fn analyze_texture(
    session: &ChallengeSession,
    locator: &dyn FaceLocator,
    thresholds: &TextureThresholds,
) -> LayerResult {
    let frames = session.frames();
    let stride = (frames.len() / thresholds.samples.max(1)).max(1);

    let samples: Vec<TextureSample> = frames
        .iter()
        .step_by(stride)
        .filter_map(|frame| {
            let face = locator.locate(frame)?;
            let plane = luminance(&frame.image);
            let (x, y, w, h) = cheek_rect(&face, &thresholds.cheek);
            let region = crop(&plane, x, y, w, h)?;
            Some(measure_crop(region, thresholds))
        })
        .collect();

    let textures: Vec<f64> = samples.iter().filter_map(|s| s.texture).collect();
    let gradients: Vec<f64> = samples.iter().map(|s| s.gradient).collect();

    if textures.len() < thresholds.min_valid_frames {
        debug!(
            valid_frames = textures.len(),
            required = thresholds.min_valid_frames,
            "texture layer lacks usable cheek crops"
        );
        return LayerResult::insufficient(
            LayerKind::Texture,
            LayerFailure::InsufficientData {
                valid_frames: textures.len(),
                required: thresholds.min_valid_frames,
            },
        )
        .with_detail("frames_analyzed", textures.len());
    }

    let texture = mean(&textures).unwrap_or(0.0);
    let gradient = mean(&gradients).unwrap_or(0.0);

    let passed = texture > thresholds.texture_min
        && texture < thresholds.texture_max
        && gradient < thresholds.gradient_max;
    let texture_score = (texture / 100.0).min(1.0);
    let gradient_score = (1.0 - gradient / 50.0).max(0.0);
    let score = (texture_score + gradient_score) / 2.0;

    debug!(texture, gradient, passed, "texture layer evaluated");

    LayerResult::new(LayerKind::Texture, passed, score)
        .with_detail("texture", texture)
        .with_detail("gradient", gradient)
        .with_detail("texture_min", thresholds.texture_min)
        .with_detail("texture_max", thresholds.texture_max)
        .with_detail("gradient_max", thresholds.gradient_max)
        .with_detail("frames_analyzed", textures.len())
        .with_detail("gradient_frames", gradients.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::{FixedFaceLocator, ScriptedFaceLocator};
    use crate::types::{ChallengeKind, FrameSample};
    use image::{Rgb, RgbImage};
    use ndarray::Array2;

    const FACE: FaceBox = FaceBox {
        x: 20.0,
        y: 20.0,
        width: 120.0,
        height: 120.0,
    };

    /// Sparse bright specks on a flat background: tile variance near 90,
    /// mean gradient near 22
    fn speckle_frame() -> RgbImage {
        RgbImage::from_fn(160, 160, |x, y| {
            let v = if x % 6 == 0 && y % 6 == 0 { 160 } else { 100 };
            Rgb([v, v, v])
        })
    }

    fn session_of(image: RgbImage, n: usize) -> ChallengeSession {
        let frames = (0..n)
            .map(|i| FrameSample::new(i as u64, image.clone()))
            .collect();
        ChallengeSession::from_frames(ChallengeKind::Smile, frames)
    }

    #[test]
    fn test_cheek_rect_defaults() {
        let rect = cheek_rect(&FACE, &CheekRegion::default());
        assert_eq!(rect, (92.0, 68.0, 36.0, 36.0));
    }

    #[test]
    fn test_tile_variance_of_flat_crop_is_zero() {
        let plane = Array2::from_elem((20, 20), 77.0);
        assert_eq!(tile_variance(plane.view(), 8, 4), Some(0.0));
    }

    #[test]
    fn test_tile_variance_needs_room_for_a_tile() {
        let plane = Array2::from_elem((8, 20), 77.0);
        assert_eq!(tile_variance(plane.view(), 8, 4), None);
    }

    #[test]
    fn test_tile_variance_checkerboard() {
        // Alternating 0/10 has variance 25 in every even-sized tile
        let plane = Array2::from_shape_fn((12, 12), |(y, x)| if (x + y) % 2 == 0 { 0.0 } else { 10.0 });
        assert_eq!(tile_variance(plane.view(), 8, 4), Some(25.0));
    }

    #[test]
    fn test_uniform_crop_fails() {
        let image = RgbImage::from_pixel(160, 160, Rgb([140, 110, 95]));
        let result = analyze_texture(
            &session_of(image, 60),
            &FixedFaceLocator(Some(FACE)),
            &TextureThresholds::default(),
        );
        assert!(!result.passed);
        assert_eq!(result.detail_f64("texture"), Some(0.0));
        assert_eq!(result.detail_f64("gradient"), Some(0.0));
        assert_eq!(result.failure, None);
    }

    #[test]
    fn test_speckle_texture_passes() {
        let result = analyze_texture(
            &session_of(speckle_frame(), 60),
            &FixedFaceLocator(Some(FACE)),
            &TextureThresholds::default(),
        );
        assert!(result.passed, "details: {:?}", result.details);
        let texture = result.detail_f64("texture").unwrap();
        let gradient = result.detail_f64("gradient").unwrap();
        assert!((texture - 90.0).abs() < 5.0, "texture {texture}");
        assert!((gradient - 22.0).abs() < 3.0, "gradient {gradient}");
        assert_eq!(result.detail_f64("frames_analyzed"), Some(10.0));
    }

    #[test]
    fn test_amplified_speckle_is_print_noise() {
        let image = RgbImage::from_fn(160, 160, |x, y| {
            let v = if x % 6 == 0 && y % 6 == 0 { 250 } else { 40 };
            Rgb([v, v, v])
        });
        let result = analyze_texture(
            &session_of(image, 60),
            &FixedFaceLocator(Some(FACE)),
            &TextureThresholds::default(),
        );
        assert!(!result.passed);
        assert!(result.detail_f64("texture").unwrap() > 150.0);
    }

    #[test]
    fn test_no_face_is_insufficient_data() {
        let result = analyze_texture(
            &session_of(speckle_frame(), 60),
            &FixedFaceLocator(None),
            &TextureThresholds::default(),
        );
        assert!(!result.passed);
        assert_eq!(
            result.failure,
            Some(LayerFailure::InsufficientData {
                valid_frames: 0,
                required: 3
            })
        );
    }

    #[test]
    fn test_face_outside_frame_is_skipped() {
        let far = FaceBox::new(500.0, 500.0, 120.0, 120.0);
        let result = analyze_texture(
            &session_of(speckle_frame(), 60),
            &FixedFaceLocator(Some(far)),
            &TextureThresholds::default(),
        );
        assert!(result.failure.is_some());
    }

    #[test]
    fn test_untiled_crops_still_count_toward_gradient() {
        // Sampled frames are 0, 6, ..., 54. The first three show speckle
        // under a full face; the rest show a flat frame under a face so
        // small that its 6x6 cheek crop holds no tile.
        let flat = RgbImage::from_pixel(160, 160, Rgb([100, 100, 100]));
        let frames = (0..60u64)
            .map(|i| {
                let image = if i < 18 { speckle_frame() } else { flat.clone() };
                FrameSample::new(i, image)
            })
            .collect();
        let session = ChallengeSession::from_frames(ChallengeKind::Smile, frames);

        let mut locator = ScriptedFaceLocator::new();
        for seq in (0..60u64).step_by(6) {
            let face = if seq < 18 {
                FACE
            } else {
                FaceBox::new(20.0, 20.0, 20.0, 20.0)
            };
            locator.insert(seq, face);
        }

        let thresholds = TextureThresholds::default();
        let mixed = analyze_texture(&session, &locator, &thresholds);
        let full = analyze_texture(
            &session_of(speckle_frame(), 60),
            &FixedFaceLocator(Some(FACE)),
            &thresholds,
        );

        assert_eq!(mixed.failure, None);
        assert_eq!(mixed.detail_f64("frames_analyzed"), Some(3.0));
        assert_eq!(mixed.detail_f64("gradient_frames"), Some(10.0));
        let texture_gap = mixed.detail_f64("texture").unwrap() - full.detail_f64("texture").unwrap();
        assert!(texture_gap.abs() < 1e-9);
        let expected = full.detail_f64("gradient").unwrap() * 3.0 / 10.0;
        assert!((mixed.detail_f64("gradient").unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_untiled_crops_do_not_make_frames_valid() {
        let tiny = FaceBox::new(20.0, 20.0, 20.0, 20.0);
        let result = analyze_texture(
            &session_of(speckle_frame(), 60),
            &FixedFaceLocator(Some(tiny)),
            &TextureThresholds::default(),
        );
        assert_eq!(
            result.failure,
            Some(LayerFailure::InsufficientData {
                valid_frames: 0,
                required: 3
            })
        );
    }

    #[test]
    fn test_score_blends_texture_and_gradient() {
        let result = analyze_texture(
            &session_of(speckle_frame(), 60),
            &FixedFaceLocator(Some(FACE)),
            &TextureThresholds::default(),
        );
        let texture = result.detail_f64("texture").unwrap();
        let gradient = result.detail_f64("gradient").unwrap();
        let expected = ((texture / 100.0).min(1.0) + (1.0 - gradient / 50.0).max(0.0)) / 2.0;
        assert!((result.score - expected).abs() < 1e-12);
    }
}

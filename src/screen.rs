//! Screen-replay (Moiré) detection
//!
//! A display re-sampled by a camera sensor produces periodic high-frequency
//! energy (Moiré fringing) that a direct view of skin does not. Three frames
//! spread across the recording are transformed to the frequency domain and
//! the energy in a high-frequency annulus is measured.
//!
//! `passed` means "genuine": the raw screen verdict is inverted here.

use image::RgbImage;
use tracing::debug;

use crate::config::ScreenThresholds;
use crate::luma::luminance;
use crate::spectrum::{band_statistics, magnitude_spectrum, BandStatistics};
use crate::stats::mean;
use crate::types::{ChallengeSession, LayerFailure, LayerKind, LayerResult};

/// Band statistics of a single frame
pub fn frame_moire(image: &RgbImage, peak_sigma: f64) -> BandStatistics {
    let plane = luminance(image);
    band_statistics(&magnitude_spectrum(&plane), peak_sigma)
}

/// Indices of the frames sampled at the configured relative positions
pub fn sample_indices(len: usize, positions: &[f64]) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    positions
        .iter()
        .map(|p| ((len as f64 * p).floor() as usize).min(len - 1))
        .collect()
}

/// Detect whether the recording shows a flat-panel replay
pub fn detect_screen(session: &ChallengeSession, thresholds: &ScreenThresholds) -> LayerResult {
    let frames = session.frames();
    let indices = sample_indices(frames.len(), &thresholds.sample_positions);
    if indices.is_empty() {
        return LayerResult::insufficient(
            LayerKind::Screen,
            LayerFailure::InsufficientData {
                valid_frames: 0,
                required: thresholds.sample_positions.len(),
            },
        );
    }

    let stats: Vec<BandStatistics> = indices
        .iter()
        .map(|&i| frame_moire(&frames[i].image, thresholds.peak_sigma))
        .collect();

    let ratios: Vec<f64> = stats.iter().map(|s| s.ratio).collect();
    let peaks: Vec<f64> = stats.iter().map(|s| s.peak_count as f64).collect();
    let moire_ratio = mean(&ratios).unwrap_or(0.0);
    let peak_count = mean(&peaks).unwrap_or(0.0);

    let is_screen =
        moire_ratio > thresholds.max_moire_ratio || peak_count > thresholds.max_peak_count;

    debug!(moire_ratio, peak_count, is_screen, "screen layer evaluated");

    LayerResult::new(LayerKind::Screen, !is_screen, 1.0 - moire_ratio)
        .with_detail("moire_ratio", moire_ratio)
        .with_detail("peak_count", peak_count)
        .with_detail("is_screen", is_screen)
        .with_detail("ratio_threshold", thresholds.max_moire_ratio)
        .with_detail("peak_threshold", thresholds.max_peak_count)
        .with_detail("frames_analyzed", stats.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChallengeKind, FrameSample};
    use image::Rgb;
    use std::f64::consts::PI;

    fn session_of(image: RgbImage, n: usize) -> ChallengeSession {
        let frames = (0..n)
            .map(|i| FrameSample::new(i as u64, image.clone()))
            .collect();
        ChallengeSession::from_frames(ChallengeKind::Smile, frames)
    }

    /// Vertical stripes at frequency bin 24 of 64: inside the 16..32 band
    fn stripe_grid() -> RgbImage {
        RgbImage::from_fn(64, 64, |x, _| {
            let v = 128.0 + 100.0 * (2.0 * PI * 24.0 * f64::from(x) / 64.0).cos();
            let v = v.round().clamp(0.0, 255.0) as u8;
            Rgb([v, v, v])
        })
    }

    /// Smooth diagonal ramp with no periodic component
    fn smooth_ramp() -> RgbImage {
        RgbImage::from_fn(64, 64, |x, y| {
            let v = (60 + x + y) as u8;
            Rgb([v, v, v])
        })
    }

    #[test]
    fn test_sample_indices_quartiles() {
        assert_eq!(sample_indices(90, &[0.25, 0.5, 0.75]), vec![22, 45, 67]);
        assert_eq!(sample_indices(1, &[0.25, 0.5, 0.75]), vec![0, 0, 0]);
        assert!(sample_indices(0, &[0.5]).is_empty());
    }

    #[test]
    fn test_periodic_grid_is_screen() {
        let result = detect_screen(&session_of(stripe_grid(), 60), &ScreenThresholds::default());
        assert!(!result.passed, "details: {:?}", result.details);
        assert_eq!(result.details["is_screen"], serde_json::json!(true));
        assert!(result.detail_f64("moire_ratio").unwrap() > 0.4);
    }

    #[test]
    fn test_smooth_gradient_is_genuine() {
        let result = detect_screen(&session_of(smooth_ramp(), 60), &ScreenThresholds::default());
        assert!(result.passed, "details: {:?}", result.details);
        let ratio = result.detail_f64("moire_ratio").unwrap();
        assert!(ratio < 0.18);
        assert!(result.detail_f64("peak_count").unwrap() < 80.0);
        assert!((result.score - (1.0 - ratio)).abs() < 1e-12);
    }

    #[test]
    fn test_uniform_frame_is_genuine() {
        let image = RgbImage::from_pixel(32, 24, Rgb([90, 120, 150]));
        let result = detect_screen(&session_of(image, 60), &ScreenThresholds::default());
        assert!(result.passed);
        assert_eq!(result.detail_f64("frames_analyzed"), Some(3.0));
    }

    #[test]
    fn test_tightened_ratio_flags_ramp() {
        let thresholds = ScreenThresholds {
            max_moire_ratio: 0.05,
            ..Default::default()
        };
        let result = detect_screen(&session_of(smooth_ramp(), 60), &thresholds);
        assert!(!result.passed);
    }

    #[test]
    fn test_empty_session_is_insufficient() {
        let session = ChallengeSession::from_frames(ChallengeKind::Smile, vec![]);
        let result = detect_screen(&session, &ScreenThresholds::default());
        assert!(!result.passed);
        assert!(matches!(
            result.failure,
            Some(LayerFailure::InsufficientData { .. })
        ));
    }
}

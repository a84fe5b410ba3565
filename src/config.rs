//! Liveness configuration
//!
//! All thresholds live in a single value object that is passed into the
//! capture controller and every analyzer. Every group is `#[serde(default)]`,
//! so a JSON file only needs the fields it overrides.

use crate::error::LivenessError;
use crate::fusion::DEFAULT_QUORUM;
use crate::types::ChallengeKind;
use serde::{Deserialize, Serialize};

/// Camera and capture-window settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Camera index handed to the frame source
    pub device_index: u32,
    /// Target frame width (pixels)
    pub width: u32,
    /// Target frame height (pixels)
    pub height: u32,
    /// Target frame rate
    pub fps: u32,
    /// Length of the capture window (milliseconds)
    pub window_ms: u64,
    /// Minimum number of frames the window must yield
    pub min_frames: usize,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            device_index: 1,
            width: 640,
            height: 480,
            fps: 30,
            window_ms: 10_000,
            min_frames: 60,
        }
    }
}

/// Motion-direction layer thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionThresholds {
    /// Analyze every n-th frame
    pub stride: usize,
    /// Minimum frames with a detected face
    pub min_detections: usize,
    /// Horizontal displacement required for left/right challenges (pixels)
    pub horizontal_px: f64,
    /// Vertical displacement required for up/down challenges (pixels)
    pub vertical_px: f64,
    /// Displacement magnitude accepted for a smile (pixels)
    pub smile_magnitude: f64,
    /// Overall displacement magnitude required (pixels)
    pub min_magnitude: f64,
    /// Std-dev of frame-to-frame step length required
    pub min_variability: f64,
}

impl Default for MotionThresholds {
    fn default() -> Self {
        Self {
            stride: 3,
            min_detections: 10,
            horizontal_px: 20.0,
            vertical_px: 15.0,
            smile_magnitude: 10.0,
            min_magnitude: 15.0,
            min_variability: 2.0,
        }
    }
}

/// Moiré detector thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenThresholds {
    /// Relative buffer positions of the sampled frames, each in [0, 1)
    pub sample_positions: Vec<f64>,
    /// Band-energy ratio above which the recording is a screen
    pub max_moire_ratio: f64,
    /// Average periodic-peak count above which the recording is a screen
    pub max_peak_count: f64,
    /// Peaks are band elements above `mean + peak_sigma * stddev`
    pub peak_sigma: f64,
}

impl Default for ScreenThresholds {
    fn default() -> Self {
        Self {
            sample_positions: vec![0.25, 0.5, 0.75],
            max_moire_ratio: 0.18,
            max_peak_count: 80.0,
            peak_sigma: 2.0,
        }
    }
}

/// Cheek region as fractions of the face box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheekRegion {
    pub x_offset: f64,
    pub width: f64,
    pub y_offset: f64,
    pub height: f64,
}

impl Default for CheekRegion {
    fn default() -> Self {
        Self {
            x_offset: 0.6,
            width: 0.3,
            y_offset: 0.4,
            height: 0.3,
        }
    }
}

/// Skin-texture layer thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureThresholds {
    /// Approximate number of frames sampled across the buffer
    pub samples: usize,
    /// Minimum frames yielding a usable cheek crop
    pub min_valid_frames: usize,
    /// Side of the square variance tile (pixels)
    pub tile_size: usize,
    /// Step between tiles (pixels)
    pub tile_step: usize,
    pub cheek: CheekRegion,
    /// Exclusive lower bound on mean tile variance
    pub texture_min: f64,
    /// Exclusive upper bound on mean tile variance
    pub texture_max: f64,
    /// Exclusive upper bound on mean gradient magnitude
    pub gradient_max: f64,
}

impl Default for TextureThresholds {
    fn default() -> Self {
        Self {
            samples: 10,
            min_valid_frames: 3,
            tile_size: 8,
            tile_step: 4,
            cheek: CheekRegion::default(),
            texture_min: 50.0,
            texture_max: 150.0,
            gradient_max: 35.0,
        }
    }
}

/// Complete liveness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    pub capture: CaptureSettings,
    /// Challenges the controller picks from uniformly
    pub challenge_pool: Vec<ChallengeKind>,
    pub motion: MotionThresholds,
    pub screen: ScreenThresholds,
    pub texture: TextureThresholds,
    /// Passed layers required to accept
    pub quorum: usize,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            capture: CaptureSettings::default(),
            challenge_pool: ChallengeKind::DEFAULT_POOL.to_vec(),
            motion: MotionThresholds::default(),
            screen: ScreenThresholds::default(),
            texture: TextureThresholds::default(),
            quorum: DEFAULT_QUORUM,
        }
    }
}

impl LivenessConfig {
    /// Load and validate configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, LivenessError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to pretty JSON
    pub fn to_json(&self) -> Result<String, LivenessError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check internal consistency of all groups
    pub fn validate(&self) -> Result<(), LivenessError> {
        let invalid = |msg: &str| Err(LivenessError::InvalidConfig(msg.to_string()));

        if self.capture.window_ms == 0 {
            return invalid("capture.window_ms must be positive");
        }
        if self.capture.fps == 0 {
            return invalid("capture.fps must be positive");
        }
        if self.challenge_pool.is_empty() {
            return invalid("challenge_pool must not be empty");
        }
        if !(1..=3).contains(&self.quorum) {
            return invalid("quorum must be between 1 and 3");
        }

        if self.motion.stride == 0 {
            return invalid("motion.stride must be positive");
        }
        if self.motion.min_detections < 2 {
            return invalid("motion.min_detections must be at least 2");
        }

        if self.screen.sample_positions.is_empty() {
            return invalid("screen.sample_positions must not be empty");
        }
        if self
            .screen
            .sample_positions
            .iter()
            .any(|p| !(0.0..1.0).contains(p))
        {
            return invalid("screen.sample_positions must lie in [0, 1)");
        }

        let texture = &self.texture;
        if texture.samples == 0 || texture.min_valid_frames == 0 {
            return invalid("texture.samples and texture.min_valid_frames must be positive");
        }
        if texture.tile_size == 0 || texture.tile_step == 0 {
            return invalid("texture tile size and step must be positive");
        }
        if texture.tile_step > texture.tile_size {
            return invalid("texture.tile_step must not exceed texture.tile_size");
        }
        if texture.texture_min >= texture.texture_max {
            return invalid("texture.texture_min must be below texture.texture_max");
        }
        let cheek = &texture.cheek;
        let fractions = [cheek.x_offset, cheek.width, cheek.y_offset, cheek.height];
        if fractions.iter().any(|f| !(0.0..=1.0).contains(f))
            || cheek.width == 0.0
            || cheek.height == 0.0
            || cheek.x_offset + cheek.width > 1.0
            || cheek.y_offset + cheek.height > 1.0
        {
            return invalid("texture.cheek must be a non-empty region inside the face box");
        }

        Ok(())
    }
}

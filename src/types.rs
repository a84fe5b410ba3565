//! Core types for the liveness pipeline
//!
//! This module defines the data structures that flow through each stage:
//! challenge selection, captured frames, per-layer analysis results and the
//! fused verdict.

use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Action the subject is asked to perform during capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChallengeKind {
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    Smile,
}

impl ChallengeKind {
    /// Challenges drawn from when no pool is configured
    pub const DEFAULT_POOL: [ChallengeKind; 3] = [
        ChallengeKind::MoveLeft,
        ChallengeKind::MoveRight,
        ChallengeKind::Smile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeKind::MoveLeft => "move-left",
            ChallengeKind::MoveRight => "move-right",
            ChallengeKind::MoveUp => "move-up",
            ChallengeKind::MoveDown => "move-down",
            ChallengeKind::Smile => "smile",
        }
    }

    /// Operator-facing instruction text.
    ///
    /// Directions are in image space, so "move-left" asks the subject to turn
    /// towards their own right (the camera image is not mirrored).
    pub fn instruction(&self) -> &'static str {
        match self {
            ChallengeKind::MoveLeft => "Slowly turn your head towards YOUR RIGHT",
            ChallengeKind::MoveRight => "Slowly turn your head towards YOUR LEFT",
            ChallengeKind::MoveUp => "Slowly raise your head",
            ChallengeKind::MoveDown => "Slowly lower your head",
            ChallengeKind::Smile => "Smile, then return to a neutral face",
        }
    }
}

impl fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChallengeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "move-left" | "left" => Ok(ChallengeKind::MoveLeft),
            "move-right" | "right" => Ok(ChallengeKind::MoveRight),
            "move-up" | "up" => Ok(ChallengeKind::MoveUp),
            "move-down" | "down" => Ok(ChallengeKind::MoveDown),
            "smile" => Ok(ChallengeKind::Smile),
            other => Err(format!("unknown challenge: {other}")),
        }
    }
}

/// One captured frame. Immutable once appended to a session.
#[derive(Debug, Clone)]
pub struct FrameSample {
    /// Position in the capture sequence (0-based)
    pub sequence: u64,
    /// When the frame was read from the source (UTC)
    pub captured_at: DateTime<Utc>,
    /// 3-channel raster
    pub image: RgbImage,
}

impl FrameSample {
    /// Wrap an image, stamping it with the current time
    pub fn new(sequence: u64, image: RgbImage) -> Self {
        Self::with_timestamp(sequence, Utc::now(), image)
    }

    pub fn with_timestamp(sequence: u64, captured_at: DateTime<Utc>, image: RgbImage) -> Self {
        Self {
            sequence,
            captured_at,
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Face bounding box in pixel coordinates (top-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FaceBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Centre point `(cx, cy)`
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Identifies one of the three analysis layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Motion,
    Screen,
    Texture,
}

impl LayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Motion => "motion",
            LayerKind::Screen => "screen",
            LayerKind::Texture => "texture",
        }
    }
}

/// Why a layer could not reach a decision from the recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerFailure {
    InsufficientFaceDetections { found: usize, required: usize },
    InsufficientData { valid_frames: usize, required: usize },
}

impl LayerFailure {
    pub fn message(&self) -> &'static str {
        match self {
            LayerFailure::InsufficientFaceDetections { .. } => "insufficient face detections",
            LayerFailure::InsufficientData { .. } => "insufficient data",
        }
    }
}

/// Outcome of a single analysis layer. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerResult {
    pub layer: LayerKind,
    /// Whether the layer judged the recording genuine
    pub passed: bool,
    /// Informational score in [0, 1]
    pub score: f64,
    /// Named numeric diagnostics (plus an `"error"` string on shortfall)
    pub details: BTreeMap<String, serde_json::Value>,
    /// Set when the layer could not gather enough valid samples
    pub failure: Option<LayerFailure>,
}

impl LayerResult {
    pub fn new(layer: LayerKind, passed: bool, score: f64) -> Self {
        Self {
            layer,
            passed,
            score: score.clamp(0.0, 1.0),
            details: BTreeMap::new(),
            failure: None,
        }
    }

    /// Failed result for a layer that lacked usable samples
    pub fn insufficient(layer: LayerKind, failure: LayerFailure) -> Self {
        let mut result = Self::new(layer, false, 0.0);
        result
            .details
            .insert("error".to_string(), failure.message().into());
        result.failure = Some(failure);
        result
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    /// Numeric diagnostic by name
    pub fn detail_f64(&self, key: &str) -> Option<f64> {
        self.details.get(key).and_then(|v| v.as_f64())
    }
}

/// The three layer outcomes of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerResults {
    pub motion: LayerResult,
    pub screen: LayerResult,
    pub texture: LayerResult,
}

impl LayerResults {
    pub fn iter(&self) -> impl Iterator<Item = &LayerResult> {
        [&self.motion, &self.screen, &self.texture].into_iter()
    }

    pub fn passed_count(&self) -> usize {
        self.iter().filter(|r| r.passed).count()
    }
}

/// A completed capture: challenge plus the immutable frame buffer
#[derive(Debug, Clone)]
pub struct ChallengeSession {
    session_id: Uuid,
    challenge: ChallengeKind,
    started_at: DateTime<Utc>,
    target_duration: Duration,
    frames: Vec<FrameSample>,
}

impl ChallengeSession {
    pub fn new(
        session_id: Uuid,
        challenge: ChallengeKind,
        started_at: DateTime<Utc>,
        target_duration: Duration,
        frames: Vec<FrameSample>,
    ) -> Self {
        Self {
            session_id,
            challenge,
            started_at,
            target_duration,
            frames,
        }
    }

    /// Session over an already-recorded buffer (replay, tests)
    pub fn from_frames(challenge: ChallengeKind, frames: Vec<FrameSample>) -> Self {
        Self::new(Uuid::new_v4(), challenge, Utc::now(), Duration::ZERO, frames)
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn challenge(&self) -> ChallengeKind {
        self.challenge
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn target_duration(&self) -> Duration {
        self.target_duration
    }

    pub fn frames(&self) -> &[FrameSample] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Most recently captured frame
    pub fn last_frame(&self) -> Option<&FrameSample> {
        self.frames.last()
    }
}

/// Operator-facing reason attached to a rejected verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    MovementInsufficient,
    ScreenDetected,
    TextureAbnormal,
}

impl RejectionReason {
    pub fn for_layer(layer: LayerKind) -> Self {
        match layer {
            LayerKind::Motion => RejectionReason::MovementInsufficient,
            LayerKind::Screen => RejectionReason::ScreenDetected,
            LayerKind::Texture => RejectionReason::TextureAbnormal,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            RejectionReason::MovementInsufficient => {
                "movement insufficient or in the wrong direction (static photo?)"
            }
            RejectionReason::ScreenDetected => "screen pattern detected",
            RejectionReason::TextureAbnormal => "abnormal skin texture (printed photo?)",
        }
    }
}

/// Fused decision for one session
#[derive(Debug, Clone)]
pub struct Verdict {
    pub session_id: Uuid,
    pub challenge: ChallengeKind,
    pub started_at: DateTime<Utc>,
    pub accepted: bool,
    /// Number of layers that passed (0..=3)
    pub total_score: u8,
    /// Layers required for acceptance
    pub quorum: u8,
    pub layer_results: LayerResults,
    /// Last captured frame, present only on acceptance
    pub representative_frame: Option<FrameSample>,
}

impl Verdict {
    /// One reason per failed layer, in layer order
    pub fn reasons(&self) -> Vec<RejectionReason> {
        self.layer_results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| RejectionReason::for_layer(r.layer))
            .collect()
    }

    /// Short machine-readable outcome label
    pub fn summary(&self) -> String {
        if self.accepted {
            format!("liveness_passed_score_{}_of_3", self.total_score)
        } else {
            format!("liveness_failed_score_{}_of_3", self.total_score)
        }
    }
}

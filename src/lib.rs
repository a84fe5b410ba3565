//! Liveness Gate - challenge-response anti-spoofing for face capture
//!
//! Before a face is enrolled or matched, the gate proves that a live person
//! is in front of the camera rather than a photo, a printed page or a replayed
//! screen. One session is: timed challenge capture → three independent
//! analyzers over the frozen buffer → 2-of-3 quorum fusion.
//!
//! ## Layers
//!
//! - **Motion**: the face must move in the requested direction, organically
//! - **Screen**: no periodic high-frequency (Moiré) energy in the spectrum
//! - **Texture**: cheek variance and gradients within the range of real skin
//!
//! Face detection is a seam: callers provide a [`FaceLocator`].

pub mod capture;
pub mod config;
pub mod error;
pub mod fusion;
pub mod locator;
pub mod luma;
pub mod motion;
pub mod pipeline;
pub mod replay;
pub mod report;
pub mod screen;
pub mod spectrum;
pub mod stats;
pub mod texture;
pub mod types;

pub use capture::{
    run_challenge, CancelToken, CaptureObserver, ChallengePicker, FixedPicker, FrameSource,
    NoopObserver, RandomPicker,
};
pub use config::LivenessConfig;
pub use error::LivenessError;
pub use fusion::fuse;
pub use locator::{FaceLocator, FixedFaceLocator, ScriptedFaceLocator};
pub use motion::analyze_motion;
pub use pipeline::{analyze_session, LivenessChecker};
pub use replay::{load_face_track, load_recording, DirectoryFrameSource};
pub use report::{ReportEncoder, VerdictReport};
pub use screen::detect_screen;
pub use texture::analyze_texture;
pub use types::{
    ChallengeKind, ChallengeSession, FaceBox, FrameSample, LayerFailure, LayerKind, LayerResult,
    RejectionReason, Verdict,
};

/// Crate version embedded in every report
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "liveness-gate";

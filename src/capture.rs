//! Challenge & capture controller
//!
//! Picks a challenge, announces it, then pulls frames from a [`FrameSource`]
//! for a fixed wall-clock window. Nothing is analyzed while capturing; the
//! finished buffer is frozen into a [`ChallengeSession`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use image::RgbImage;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{CaptureSettings, LivenessConfig};
use crate::error::LivenessError;
use crate::types::{ChallengeKind, ChallengeSession, FrameSample};

/// Camera or recording that yields RGB frames
pub trait FrameSource: Send {
    /// Acquire the device at the requested resolution and rate
    fn open(&mut self, settings: &CaptureSettings) -> Result<(), LivenessError>;

    /// Next frame, or `None` if none is ready yet
    fn read(&mut self) -> Option<RgbImage>;

    /// Release the device. Must be safe to call more than once.
    fn close(&mut self);
}

/// Chooses the challenge for a session
pub trait ChallengePicker: Send {
    fn pick(&mut self, pool: &[ChallengeKind]) -> ChallengeKind;
}

/// Uniform random choice over the pool
pub struct RandomPicker {
    rng: StdRng,
}

impl RandomPicker {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic picker for replay and tests
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomPicker {
    fn default() -> Self {
        Self::new()
    }
}

impl ChallengePicker for RandomPicker {
    fn pick(&mut self, pool: &[ChallengeKind]) -> ChallengeKind {
        pool.choose(&mut self.rng)
            .copied()
            .unwrap_or(ChallengeKind::Smile)
    }
}

/// Always returns the same challenge
#[derive(Debug, Clone, Copy)]
pub struct FixedPicker(pub ChallengeKind);

impl ChallengePicker for FixedPicker {
    fn pick(&mut self, _pool: &[ChallengeKind]) -> ChallengeKind {
        self.0
    }
}

/// Presentation hooks for the operator UI
pub trait CaptureObserver: Send {
    /// The challenge has been chosen; show its instruction
    fn on_instruction(&mut self, _challenge: ChallengeKind, _text: &str) {}

    /// Once per elapsed second of the window
    fn on_tick(&mut self, _remaining_secs: u64, _frames: usize) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl CaptureObserver for NoopObserver {}

/// Shared flag for aborting a capture from another thread
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Pause between polls of a source with no frame ready: a quarter of the
/// frame period, at least one millisecond
pub fn idle_interval(settings: &CaptureSettings) -> Duration {
    let period = Duration::from_secs(1) / settings.fps.max(1);
    (period / 4).max(Duration::from_millis(1))
}

/// Open source handle that closes itself when dropped
struct OpenSource<'a> {
    source: &'a mut dyn FrameSource,
}

impl<'a> OpenSource<'a> {
    fn open(
        source: &'a mut dyn FrameSource,
        settings: &CaptureSettings,
    ) -> Result<Self, LivenessError> {
        source.open(settings)?;
        Ok(Self { source })
    }

    fn read(&mut self) -> Option<RgbImage> {
        self.source.read()
    }
}

impl Drop for OpenSource<'_> {
    fn drop(&mut self) {
        self.source.close();
    }
}

/// Run one timed challenge and return the frozen session
pub fn run_challenge(
    config: &LivenessConfig,
    source: &mut dyn FrameSource,
    picker: &mut dyn ChallengePicker,
    observer: &mut dyn CaptureObserver,
    cancel: &CancelToken,
) -> Result<ChallengeSession, LivenessError> {
    let settings = &config.capture;
    let session_id = Uuid::new_v4();
    let challenge = picker.pick(&config.challenge_pool);

    let mut handle = OpenSource::open(source, settings).map_err(|e| {
        warn!(%session_id, error = %e, "frame source unavailable");
        match e {
            LivenessError::CaptureUnavailable(_) => e,
            other => LivenessError::CaptureUnavailable(other.to_string()),
        }
    })?;

    info!(%session_id, %challenge, "challenge started");
    observer.on_instruction(challenge, challenge.instruction());

    let window = Duration::from_millis(settings.window_ms);
    let started_at = Utc::now();
    let start = Instant::now();
    let mut frames: Vec<FrameSample> = Vec::new();
    let mut next_tick = 1u64;
    let idle = idle_interval(settings);

    loop {
        if cancel.is_cancelled() {
            warn!(%session_id, captured = frames.len(), "capture aborted");
            return Err(LivenessError::Aborted {
                captured: frames.len(),
            });
        }

        let elapsed = start.elapsed();
        if elapsed >= window {
            break;
        }
        if elapsed.as_secs() >= next_tick {
            let remaining = window.saturating_sub(elapsed).as_secs();
            observer.on_tick(remaining, frames.len());
            next_tick = elapsed.as_secs() + 1;
        }

        match handle.read() {
            Some(image) => {
                let sequence = frames.len() as u64;
                frames.push(FrameSample::new(sequence, image));
            }
            None => thread::sleep(idle.min(window.saturating_sub(elapsed))),
        }
    }
    drop(handle);

    debug!(%session_id, captured = frames.len(), "capture window closed");

    if frames.len() < settings.min_frames {
        warn!(
            %session_id,
            captured = frames.len(),
            required = settings.min_frames,
            "too few frames captured"
        );
        return Err(LivenessError::InsufficientFrames {
            captured: frames.len(),
            required: settings.min_frames,
        });
    }

    Ok(ChallengeSession::new(
        session_id, challenge, started_at, window, frames,
    ))
}

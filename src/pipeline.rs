//! Pipeline orchestration
//!
//! This module provides the public entry point of the liveness gate.
//! It runs the timed capture, then the three analyzers over the frozen
//! buffer, then fusion.
//!
//! Pipeline stages:
//! 1. `run_challenge` - pick a challenge and record the window
//! 2. `analyze_motion` / `detect_screen` / `analyze_texture` - in parallel
//! 3. `fuse` - quorum decision

use tracing::{info, warn};

use crate::capture::{
    run_challenge, CancelToken, CaptureObserver, ChallengePicker, FrameSource, NoopObserver,
    RandomPicker,
};
use crate::config::LivenessConfig;
use crate::error::LivenessError;
use crate::fusion::fuse;
use crate::locator::FaceLocator;
use crate::motion::analyze_motion;
use crate::screen::detect_screen;
use crate::texture::analyze_texture;
use crate::types::{ChallengeSession, Verdict};

/// Analyze a completed session and fuse the three layers.
///
/// The layers share the buffer read-only and run on the rayon pool.
pub fn analyze_session(
    session: &ChallengeSession,
    config: &LivenessConfig,
    locator: &dyn FaceLocator,
) -> Verdict {
    let (motion, (screen, texture)) = rayon::join(
        || analyze_motion(session, session.challenge(), locator, &config.motion),
        || {
            rayon::join(
                || detect_screen(session, &config.screen),
                || analyze_texture(session, locator, &config.texture),
            )
        },
    );

    for result in [&motion, &screen, &texture] {
        if let Some(failure) = &result.failure {
            warn!(
                session_id = %session.session_id(),
                layer = result.layer.as_str(),
                reason = failure.message(),
                "layer could not gather enough samples"
            );
        }
    }

    fuse(session, motion, screen, texture, config.quorum)
}

/// Liveness checker bound to one face locator
///
/// # Example
/// ```ignore
/// let mut checker = LivenessChecker::new(my_locator);
/// let verdict = checker.run_liveness_check(&mut camera)?;
/// if verdict.accepted {
///     enroll(verdict.representative_frame.unwrap());
/// }
/// ```
pub struct LivenessChecker<L: FaceLocator> {
    config: LivenessConfig,
    locator: L,
    picker: Box<dyn ChallengePicker>,
    observer: Box<dyn CaptureObserver>,
}

impl<L: FaceLocator> LivenessChecker<L> {
    /// Checker with default configuration and a random challenge picker
    pub fn new(locator: L) -> Self {
        Self {
            config: LivenessConfig::default(),
            locator,
            picker: Box::new(RandomPicker::new()),
            observer: Box::new(NoopObserver),
        }
    }

    /// Checker with a validated custom configuration
    pub fn with_config(locator: L, config: LivenessConfig) -> Result<Self, LivenessError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new(locator)
        })
    }

    pub fn with_picker(mut self, picker: impl ChallengePicker + 'static) -> Self {
        self.picker = Box::new(picker);
        self
    }

    pub fn with_observer(mut self, observer: impl CaptureObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }

    pub fn locator(&self) -> &L {
        &self.locator
    }

    /// Capture one challenge from `source` and decide
    pub fn run_liveness_check(
        &mut self,
        source: &mut dyn FrameSource,
    ) -> Result<Verdict, LivenessError> {
        self.run_liveness_check_with_cancel(source, &CancelToken::new())
    }

    /// Same as [`Self::run_liveness_check`], abortable through `cancel`
    pub fn run_liveness_check_with_cancel(
        &mut self,
        source: &mut dyn FrameSource,
        cancel: &CancelToken,
    ) -> Result<Verdict, LivenessError> {
        let session = run_challenge(
            &self.config,
            source,
            self.picker.as_mut(),
            self.observer.as_mut(),
            cancel,
        )?;

        info!(
            session_id = %session.session_id(),
            frames = session.len(),
            "analyzing session"
        );
        Ok(self.analyze_session(&session))
    }

    /// Analyze an already-captured session (replay)
    pub fn analyze_session(&self, session: &ChallengeSession) -> Verdict {
        analyze_session(session, &self.config, &self.locator)
    }
}

//! Quorum fusion of the three layer results
//!
//! Each layer is a weak detector with a known blind spot (a video replay
//! moves, a still photo has no Moiré, a good print has plausible texture),
//! so a single layer never decides alone.

use tracing::info;

use crate::types::{ChallengeSession, LayerResult, LayerResults, Verdict};

/// Default number of passed layers required for acceptance
pub const DEFAULT_QUORUM: usize = 2;

/// Combine layer results into a verdict
pub fn fuse(
    session: &ChallengeSession,
    motion: LayerResult,
    screen: LayerResult,
    texture: LayerResult,
    quorum: usize,
) -> Verdict {
    let layer_results = LayerResults {
        motion,
        screen,
        texture,
    };
    let total = layer_results.passed_count();
    let accepted = total >= quorum;

    let representative_frame = if accepted {
        session.last_frame().cloned()
    } else {
        None
    };

    info!(
        session_id = %session.session_id(),
        challenge = %session.challenge(),
        total,
        quorum,
        accepted,
        "liveness verdict"
    );

    Verdict {
        session_id: session.session_id(),
        challenge: session.challenge(),
        started_at: session.started_at(),
        accepted,
        total_score: total as u8,
        quorum: quorum.min(u8::MAX as usize) as u8,
        layer_results,
        representative_frame,
    }
}

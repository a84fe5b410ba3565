//! Replay of recorded sessions
//!
//! A recording is a directory of still frames (`.png`, `.jpg`, `.jpeg`)
//! ordered by file name, plus an optional JSON sidecar holding one face box
//! (or `null`) per frame. Replaying the same recording always gives the same
//! verdict.

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{debug, warn};

use crate::capture::FrameSource;
use crate::config::CaptureSettings;
use crate::error::LivenessError;
use crate::locator::ScriptedFaceLocator;
use crate::types::{ChallengeKind, ChallengeSession, FaceBox, FrameSample};

const FRAME_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Image files of a recording directory, sorted by name
pub fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, LivenessError> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    Ok(paths)
}

fn decode(path: &Path) -> Result<RgbImage, LivenessError> {
    Ok(image::open(path)?.to_rgb8())
}

/// Frame source backed by a recording directory
#[derive(Debug)]
pub struct DirectoryFrameSource {
    dir: PathBuf,
    pending: std::vec::IntoIter<PathBuf>,
}

impl DirectoryFrameSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pending: Vec::new().into_iter(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FrameSource for DirectoryFrameSource {
    fn open(&mut self, _settings: &CaptureSettings) -> Result<(), LivenessError> {
        if !self.dir.is_dir() {
            return Err(LivenessError::CaptureUnavailable(format!(
                "recording directory {} not found",
                self.dir.display()
            )));
        }
        let frames = list_frames(&self.dir)
            .map_err(|e| LivenessError::CaptureUnavailable(e.to_string()))?;
        debug!(dir = %self.dir.display(), frames = frames.len(), "recording opened");
        self.pending = frames.into_iter();
        Ok(())
    }

    fn read(&mut self) -> Option<RgbImage> {
        for path in self.pending.by_ref() {
            match decode(&path) {
                Ok(image) => return Some(image),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable frame"),
            }
        }
        None
    }

    fn close(&mut self) {
        self.pending = Vec::new().into_iter();
    }
}

/// Load a whole recording as a session, without the capture window.
///
/// Any unreadable frame is an error: a partial recording would shift the
/// sequence numbers that the face-box sidecar is keyed on.
pub fn load_recording(
    dir: &Path,
    challenge: ChallengeKind,
) -> Result<ChallengeSession, LivenessError> {
    if !dir.is_dir() {
        return Err(LivenessError::CaptureUnavailable(format!(
            "recording directory {} not found",
            dir.display()
        )));
    }
    let frames = list_frames(dir)?
        .iter()
        .enumerate()
        .map(|(i, path)| decode(path).map(|image| FrameSample::new(i as u64, image)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ChallengeSession::from_frames(challenge, frames))
}

/// Read a face-box sidecar: a JSON array with one box or `null` per frame
pub fn load_face_track(path: &Path) -> Result<ScriptedFaceLocator, LivenessError> {
    let json = fs::read_to_string(path)?;
    parse_face_track(&json)
}

pub fn parse_face_track(json: &str) -> Result<ScriptedFaceLocator, LivenessError> {
    let track: Vec<Option<FaceBox>> = serde_json::from_str(json)?;
    Ok(ScriptedFaceLocator::from_track(track))
}

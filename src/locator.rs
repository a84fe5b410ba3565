//! Face locator seam
//!
//! Detection itself is supplied by the caller (cascade, CNN, landmark model).
//! The analyzers only need the primary face box per frame.

use std::collections::HashMap;

use crate::types::{FaceBox, FrameSample};

/// Locates the primary (largest) face in a frame
pub trait FaceLocator: Send + Sync {
    /// Bounding box of the primary face, or `None` if no face was found
    fn locate(&self, frame: &FrameSample) -> Option<FaceBox>;
}

impl<F> FaceLocator for F
where
    F: Fn(&FrameSample) -> Option<FaceBox> + Send + Sync,
{
    fn locate(&self, frame: &FrameSample) -> Option<FaceBox> {
        self(frame)
    }
}

/// Reports the same box for every frame
#[derive(Debug, Clone, Copy)]
pub struct FixedFaceLocator(pub Option<FaceBox>);

impl FaceLocator for FixedFaceLocator {
    fn locate(&self, _frame: &FrameSample) -> Option<FaceBox> {
        self.0
    }
}

/// Replays precomputed boxes keyed by frame sequence number
#[derive(Debug, Clone, Default)]
pub struct ScriptedFaceLocator {
    boxes: HashMap<u64, FaceBox>,
}

impl ScriptedFaceLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a per-frame track where index `i` belongs to sequence `i`
    pub fn from_track(track: Vec<Option<FaceBox>>) -> Self {
        let boxes = track
            .into_iter()
            .enumerate()
            .filter_map(|(i, face)| face.map(|f| (i as u64, f)))
            .collect();
        Self { boxes }
    }

    pub fn insert(&mut self, sequence: u64, face: FaceBox) {
        self.boxes.insert(sequence, face);
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

impl FaceLocator for ScriptedFaceLocator {
    fn locate(&self, frame: &FrameSample) -> Option<FaceBox> {
        self.boxes.get(&frame.sequence).copied()
    }
}

//! Deterministic collaborators for tests and model-less runs.

use std::sync::atomic::{AtomicUsize, Ordering};

use moodchat_core::Emotion;

use crate::classifier::{EmotionClassifier, FaceTensor};
use crate::error::VisionError;
use crate::face::{DetectorParams, FaceBox, FaceLocator};
use crate::frame::GrayFrame;

/// Returns the same boxes for every frame.
pub struct StaticLocator {
    boxes: Vec<FaceBox>,
    calls: AtomicUsize,
}

impl StaticLocator {
    pub fn new(boxes: Vec<FaceBox>) -> Self {
        Self {
            boxes,
            calls: AtomicUsize::new(0),
        }
    }

    /// One face covering the middle of any frame at least 48px square.
    pub fn centered() -> Self {
        Self::new(vec![FaceBox::new(8, 8, 32, 32)])
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl FaceLocator for StaticLocator {
    fn locate(&self, _frame: &GrayFrame, _params: &DetectorParams) -> Result<Vec<FaceBox>, VisionError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.boxes.clone())
    }
}

/// Always scores the same class highest.
pub struct StaticClassifier {
    scores: Vec<f32>,
    calls: AtomicUsize,
}

impl StaticClassifier {
    pub fn new(scores: Vec<f32>) -> Self {
        Self {
            scores,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(emotion: Emotion) -> Self {
        let mut scores = vec![0.01; Emotion::COUNT];
        scores[emotion.index()] = 0.9;
        Self::new(scores)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl EmotionClassifier for StaticClassifier {
    fn classify(&self, _face: &FaceTensor) -> Result<Vec<f32>, VisionError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.scores.clone())
    }
}

/// Fails every call; exercises the error-swallowing paths.
pub struct FailingClassifier;

impl EmotionClassifier for FailingClassifier {
    fn classify(&self, _face: &FaceTensor) -> Result<Vec<f32>, VisionError> {
        Err(VisionError::Inference("classifier offline".into()))
    }
}

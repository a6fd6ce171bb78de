//! ONNX Runtime implementations of the face locator and expression classifier.
//!
//! Sessions sit behind a mutex since `Session::run` takes `&mut self`.
//! Loading is CPU-heavy and runs on the blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::imageops::{self, FilterType};
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use tracing::{debug, info};

use moodchat_core::Emotion;

use crate::classifier::{EmotionClassifier, FaceTensor, FACE_SIZE};
use crate::error::{ResultExt, VisionError};
use crate::face::{candidates_from_rows, group_candidates, pyramid_levels, DetectorParams, FaceBox, FaceLocator};
use crate::frame::GrayFrame;

const MAX_PYRAMID_LEVELS: usize = 6;
const MIN_SCORE: f32 = 0.5;
const GROUP_IOU: f32 = 0.3;

fn load_session(path: &Path, intra_threads: usize) -> Result<Session, VisionError> {
    if !path.is_file() {
        return Err(VisionError::ModelNotAvailable(format!(
            "{} does not exist",
            path.display()
        )));
    }
    Session::builder()
        .model("session builder")?
        .with_intra_threads(intra_threads.max(1))
        .model("set threads")?
        .commit_from_file(path)
        .model(&format!("load {}", path.display()))
}

async fn load_blocking(path: PathBuf, intra_threads: usize) -> Result<Session, VisionError> {
    tokio::task::spawn_blocking(move || load_session(&path, intra_threads))
        .await
        .model("load task join")?
}

/// Fully-convolutional face detector run over an image pyramid.
pub struct OnnxFaceLocator {
    session: Mutex<Session>,
}

impl OnnxFaceLocator {
    pub async fn load(path: PathBuf, intra_threads: usize) -> Result<Arc<Self>, VisionError> {
        info!(path = %path.display(), "loading face detector");
        let session = load_blocking(path, intra_threads).await?;
        Ok(Arc::new(Self {
            session: Mutex::new(session),
        }))
    }

    fn run_level(&self, level: &image::GrayImage) -> Result<Vec<f32>, VisionError> {
        let (w, h) = (level.width() as i64, level.height() as i64);
        let pixels: Vec<f32> = level.as_raw().iter().map(|&p| f32::from(p) / 255.0).collect();
        let input = Tensor::from_array(([1i64, 1, h, w], pixels)).inference("detector input tensor")?;

        let mut session = self.session.lock();
        let outputs = session.run(ort::inputs![input]).inference("detector run")?;
        let (_, rows) = outputs[0]
            .try_extract_tensor::<f32>()
            .inference("extract detections")?;
        Ok(rows.to_vec())
    }
}

impl FaceLocator for OnnxFaceLocator {
    fn locate(&self, frame: &GrayFrame, params: &DetectorParams) -> Result<Vec<FaceBox>, VisionError> {
        let levels = pyramid_levels(
            frame.width(),
            frame.height(),
            params.scale_factor,
            FACE_SIZE,
            MAX_PYRAMID_LEVELS,
        );

        let mut candidates = Vec::new();
        for (i, &(w, h)) in levels.iter().enumerate() {
            let rows = if i == 0 {
                self.run_level(frame.image())?
            } else {
                let scaled = imageops::resize(frame.image(), w, h, FilterType::Triangle);
                self.run_level(&scaled)?
            };
            candidates.extend(candidates_from_rows(&rows, frame.width(), frame.height(), MIN_SCORE));
        }

        let faces = group_candidates(&candidates, params.min_neighbors, GROUP_IOU);
        debug!(
            levels = levels.len(),
            raw = candidates.len(),
            faces = faces.len(),
            "face detection"
        );
        Ok(faces)
    }
}

/// 48×48 grayscale expression classifier with seven outputs.
pub struct OnnxEmotionClassifier {
    session: Mutex<Session>,
}

impl OnnxEmotionClassifier {
    pub async fn load(path: PathBuf, intra_threads: usize) -> Result<Arc<Self>, VisionError> {
        info!(path = %path.display(), "loading emotion classifier");
        let session = load_blocking(path, intra_threads).await?;
        Ok(Arc::new(Self {
            session: Mutex::new(session),
        }))
    }
}

impl EmotionClassifier for OnnxEmotionClassifier {
    fn classify(&self, face: &FaceTensor) -> Result<Vec<f32>, VisionError> {
        let input = Tensor::from_array((FaceTensor::SHAPE, face.as_slice().to_vec()))
            .inference("classifier input tensor")?;

        let mut session = self.session.lock();
        let outputs = session.run(ort::inputs![input]).inference("classifier run")?;
        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .inference("extract scores")?;

        if scores.len() != Emotion::COUNT {
            return Err(VisionError::InvalidOutput(format!(
                "classifier returned {} scores",
                scores.len()
            )));
        }
        Ok(scores.to_vec())
    }
}

use image::imageops::{self, FilterType};

use crate::error::VisionError;
use crate::face::FaceBox;
use crate::frame::GrayFrame;

/// Side length of the classifier input.
pub const FACE_SIZE: u32 = 48;

/// A `1 × 48 × 48 × 1` batch holding one face crop.
///
/// Values are raw 0–255 intensities; the expression model was trained on
/// unscaled pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceTensor {
    data: Vec<f32>,
}

impl FaceTensor {
    pub const SHAPE: [i64; 4] = [1, FACE_SIZE as i64, FACE_SIZE as i64, 1];
    pub const LEN: usize = (FACE_SIZE * FACE_SIZE) as usize;

    pub fn from_pixels(pixels: &[u8]) -> Option<Self> {
        (pixels.len() == Self::LEN).then(|| Self {
            data: pixels.iter().map(|&p| f32::from(p)).collect(),
        })
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

/// Crop `face` out of `frame` and resize it to the classifier input.
///
/// The box is clamped to the frame first; `None` if nothing remains.
pub fn crop_face(frame: &GrayFrame, face: &FaceBox) -> Option<FaceTensor> {
    let b = face.clamp_to(frame.width(), frame.height())?;
    let roi = imageops::crop_imm(frame.image(), b.x, b.y, b.width, b.height).to_image();
    let resized = imageops::resize(&roi, FACE_SIZE, FACE_SIZE, FilterType::Triangle);
    FaceTensor::from_pixels(resized.as_raw())
}

/// Scores a face crop against the seven expression classes.
///
/// Implementations return one score per class in `Emotion::ALL` order.
pub trait EmotionClassifier: Send + Sync {
    fn classify(&self, face: &FaceTensor) -> Result<Vec<f32>, VisionError>;
}

//! Webcam frame → emotion label.
//!
//! The pipeline decodes a browser frame, finds a face, and classifies its
//! expression. Face detection and classification sit behind traits; the ONNX
//! implementations are compiled with the `ort` feature.

pub mod classifier;
pub mod error;
pub mod face;
pub mod frame;
pub mod mock;
#[cfg(feature = "ort")]
pub mod onnx;
pub mod pipeline;

pub use classifier::{EmotionClassifier, FaceTensor, FACE_SIZE};
pub use error::{ResultExt, VisionError};
pub use face::{DetectorParams, FaceBox, FaceLocator};
pub use frame::{decode_frame, GrayFrame};
pub use pipeline::FramePipeline;

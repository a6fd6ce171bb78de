use std::sync::Arc;

use tracing::{debug, instrument, warn};

use moodchat_core::Emotion;

use crate::classifier::{crop_face, EmotionClassifier};
use crate::error::VisionError;
use crate::face::{DetectorParams, FaceLocator};
use crate::frame::decode_frame;

/// Decode → locate → crop → classify.
#[derive(Clone)]
pub struct FramePipeline {
    locator: Arc<dyn FaceLocator>,
    classifier: Arc<dyn EmotionClassifier>,
    params: DetectorParams,
}

impl FramePipeline {
    pub fn new(
        locator: Arc<dyn FaceLocator>,
        classifier: Arc<dyn EmotionClassifier>,
        params: DetectorParams,
    ) -> Self {
        Self {
            locator,
            classifier,
            params,
        }
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// Classify the expression of the first face in `encoded`.
    ///
    /// Never fails: bad payloads, missing faces and inference errors all
    /// come back as `None`. Runs on the blocking pool.
    #[instrument(skip_all, fields(payload_len = encoded.len()))]
    pub async fn process_frame(&self, encoded: String) -> Option<Emotion> {
        let pipeline = self.clone();
        match tokio::task::spawn_blocking(move || pipeline.run(&encoded)).await {
            Ok(Ok(emotion)) => emotion,
            Ok(Err(e @ VisionError::Decode(_))) => {
                debug!(error = %e, "dropping undecodable frame");
                None
            }
            Ok(Err(e)) => {
                warn!(error = %e, "frame processing failed");
                None
            }
            Err(e) => {
                warn!(error = %e, "frame task panicked or was cancelled");
                None
            }
        }
    }

    /// Synchronous body of [`process_frame`](Self::process_frame).
    pub fn run(&self, encoded: &str) -> Result<Option<Emotion>, VisionError> {
        let frame = decode_frame(encoded)?;
        let faces = self.locator.locate(&frame, &self.params)?;

        // First detection only, in locator order.
        let Some(face) = faces.first() else {
            return Ok(None);
        };
        let Some(tensor) = crop_face(&frame, face) else {
            debug!(?face, "face box outside frame");
            return Ok(None);
        };

        let scores = self.classifier.classify(&tensor)?;
        Emotion::from_scores(&scores).map(Some).ok_or_else(|| {
            VisionError::InvalidOutput(format!(
                "expected {} finite scores, got {:?}",
                Emotion::COUNT,
                scores
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::FaceTensor;
    use crate::face::FaceBox;
    use crate::frame::tests::encode_png;
    use crate::mock::{FailingClassifier, StaticClassifier, StaticLocator};
    use image::{DynamicImage, GrayImage, Luma};

    fn gray_frame_b64() -> String {
        encode_png(DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 64, Luma([128]))))
    }

    fn pipeline(locator: StaticLocator, classifier: impl EmotionClassifier + 'static) -> FramePipeline {
        FramePipeline::new(Arc::new(locator), Arc::new(classifier), DetectorParams::default())
    }

    /// Bright crops read as Happy, dark ones as Sad.
    struct BrightnessClassifier;

    impl EmotionClassifier for BrightnessClassifier {
        fn classify(&self, face: &FaceTensor) -> Result<Vec<f32>, VisionError> {
            let mean = face.as_slice().iter().sum::<f32>() / face.as_slice().len() as f32;
            let winner = if mean > 128.0 { Emotion::Happy } else { Emotion::Sad };
            let mut scores = vec![0.0; Emotion::COUNT];
            scores[winner.index()] = 1.0;
            Ok(scores)
        }
    }

    #[tokio::test]
    async fn detects_emotion_for_face() {
        let p = pipeline(StaticLocator::centered(), StaticClassifier::always(Emotion::Fearful));
        let encoded = format!("data:image/png;base64,{}", gray_frame_b64());
        assert_eq!(p.process_frame(encoded).await, Some(Emotion::Fearful));
    }

    #[tokio::test]
    async fn no_face_yields_none() {
        let classifier = Arc::new(StaticClassifier::always(Emotion::Happy));
        let p = FramePipeline::new(
            Arc::new(StaticLocator::empty()),
            classifier.clone(),
            DetectorParams::default(),
        );
        assert_eq!(p.process_frame(gray_frame_b64()).await, None);
        assert_eq!(classifier.calls(), 0);
    }

    #[tokio::test]
    async fn garbage_payload_yields_none() {
        let p = pipeline(StaticLocator::centered(), StaticClassifier::always(Emotion::Happy));
        assert_eq!(p.process_frame("data:image/jpeg;base64,%%%".into()).await, None);
        assert_eq!(p.process_frame(String::new()).await, None);
    }

    #[tokio::test]
    async fn classifier_failure_yields_none() {
        let p = pipeline(StaticLocator::centered(), FailingClassifier);
        assert_eq!(p.process_frame(gray_frame_b64()).await, None);
    }

    #[tokio::test]
    async fn wrong_score_count_yields_none() {
        let p = pipeline(StaticLocator::centered(), StaticClassifier::new(vec![0.5; 5]));
        assert_eq!(p.process_frame(gray_frame_b64()).await, None);
        assert!(matches!(p.run(&gray_frame_b64()), Err(VisionError::InvalidOutput(_))));
    }

    #[tokio::test]
    async fn only_first_face_is_classified() {
        let mut img = GrayImage::from_pixel(128, 64, Luma([20]));
        for y in 0..64 {
            for x in 64..128 {
                img.put_pixel(x, y, Luma([240]));
            }
        }
        let encoded = encode_png(DynamicImage::ImageLuma8(img));
        let bright = FaceBox::new(64, 0, 64, 64);
        let dark = FaceBox::new(0, 0, 64, 64);

        let bright_first = pipeline(StaticLocator::new(vec![bright, dark]), BrightnessClassifier);
        assert_eq!(bright_first.process_frame(encoded.clone()).await, Some(Emotion::Happy));

        let dark_first = pipeline(StaticLocator::new(vec![dark, bright]), BrightnessClassifier);
        assert_eq!(dark_first.process_frame(encoded).await, Some(Emotion::Sad));
    }

    #[tokio::test]
    async fn box_outside_frame_yields_none() {
        let p = pipeline(
            StaticLocator::new(vec![FaceBox::new(500, 500, 10, 10)]),
            StaticClassifier::always(Emotion::Happy),
        );
        assert_eq!(p.process_frame(gray_frame_b64()).await, None);
    }
}

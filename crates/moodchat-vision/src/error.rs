/// Errors raised inside the frame pipeline.
///
/// Per frame, these are logged and swallowed. At startup, a `ModelNotAvailable`
/// aborts the process.
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    /// Payload was not valid base64 or not a decodable image.
    #[error("frame decode error: {0}")]
    Decode(String),

    /// Model file missing or failed to load.
    #[error("model not available: {0}")]
    ModelNotAvailable(String),

    /// ONNX Runtime session or tensor failure.
    #[error("inference error: {0}")]
    Inference(String),

    /// Model produced output of an unexpected shape.
    #[error("unexpected model output: {0}")]
    InvalidOutput(String),
}

/// Extension trait for mapping foreign errors into [`VisionError`] with context.
pub trait ResultExt<T> {
    fn decode(self, context: &str) -> Result<T, VisionError>;
    fn inference(self, context: &str) -> Result<T, VisionError>;
    fn model(self, context: &str) -> Result<T, VisionError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn decode(self, context: &str) -> Result<T, VisionError> {
        self.map_err(|e| VisionError::Decode(format!("{context}: {e}")))
    }
    fn inference(self, context: &str) -> Result<T, VisionError> {
        self.map_err(|e| VisionError::Inference(format!("{context}: {e}")))
    }
    fn model(self, context: &str) -> Result<T, VisionError> {
        self.map_err(|e| VisionError::ModelNotAvailable(format!("{context}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_prefixed() {
        let r: Result<(), &str> = Err("bad padding");
        let e = r.decode("base64").unwrap_err();
        assert!(matches!(e, VisionError::Decode(_)));
        assert_eq!(e.to_string(), "frame decode error: base64: bad padding");
    }

    #[test]
    fn model_and_inference_variants() {
        let r: Result<(), String> = Err("no such file".into());
        assert!(matches!(r.clone().model("load"), Err(VisionError::ModelNotAvailable(_))));
        assert!(matches!(r.inference("run"), Err(VisionError::Inference(_))));
    }
}

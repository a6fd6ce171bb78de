use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::GrayImage;
use regex::Regex;

use crate::error::{ResultExt, VisionError};

/// Single-channel 8-bit frame.
#[derive(Clone, Debug)]
pub struct GrayFrame {
    image: GrayImage,
}

impl GrayFrame {
    pub fn new(image: GrayImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    /// Row-major pixel bytes, `width * height` long.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }
}

/// Remove a leading `data:image/<type>;base64,` if present.
pub fn strip_data_uri(payload: &str) -> &str {
    static PREFIX: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(re) = PREFIX.get_or_init(|| Regex::new(r"^data:image/.+;base64,").ok()) else {
        return payload;
    };
    match re.find(payload) {
        Some(m) => &payload[m.end()..],
        None => payload,
    }
}

/// Decode a browser frame payload into grayscale.
pub fn decode_frame(encoded: &str) -> Result<GrayFrame, VisionError> {
    let body = strip_data_uri(encoded.trim()).trim();
    if body.is_empty() {
        return Err(VisionError::Decode("empty payload".into()));
    }
    let bytes = STANDARD.decode(body).decode("base64")?;
    let image = image::load_from_memory(&bytes).decode("image")?;
    Ok(GrayFrame::new(image.to_luma8()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Luma, Rgb, RgbImage};
    use std::io::Cursor;

    pub(crate) fn encode_png(image: DynamicImage) -> String {
        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        STANDARD.encode(buf)
    }

    #[test]
    fn strips_data_uri_prefix() {
        assert_eq!(strip_data_uri("data:image/jpeg;base64,QUJD"), "QUJD");
        assert_eq!(strip_data_uri("data:image/webp;base64,QUJD"), "QUJD");
        assert_eq!(strip_data_uri("QUJD"), "QUJD");
        // Only image payloads are recognized.
        assert_eq!(
            strip_data_uri("data:text/plain;base64,QUJD"),
            "data:text/plain;base64,QUJD"
        );
    }

    #[test]
    fn decodes_with_and_without_prefix() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(6, 4, Luma([120])));
        let b64 = encode_png(gray);

        let plain = decode_frame(&b64).unwrap();
        assert_eq!((plain.width(), plain.height()), (6, 4));

        let prefixed = decode_frame(&format!("data:image/png;base64,{b64}")).unwrap();
        assert_eq!(prefixed.as_raw(), plain.as_raw());
        assert!(prefixed.as_raw().iter().all(|&p| p == 120));
    }

    #[test]
    fn color_is_converted_to_luma() {
        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([255, 255, 255])));
        let frame = decode_frame(&encode_png(rgb)).unwrap();
        assert_eq!(frame.as_raw().len(), 4);
        assert!(frame.as_raw().iter().all(|&p| p == 255));
    }

    #[test]
    fn bad_base64_is_decode_error() {
        let err = decode_frame("data:image/jpeg;base64,@@not base64@@").unwrap_err();
        assert!(matches!(err, VisionError::Decode(ref m) if m.starts_with("base64")));
    }

    #[test]
    fn non_image_bytes_are_decode_error() {
        let err = decode_frame(&STANDARD.encode(b"definitely not a jpeg")).unwrap_err();
        assert!(matches!(err, VisionError::Decode(ref m) if m.starts_with("image")));
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert!(decode_frame("").is_err());
        assert!(decode_frame("data:image/png;base64,").is_err());
    }
}

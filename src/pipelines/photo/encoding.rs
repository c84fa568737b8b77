// SPDX-License-Identifier: GPL-3.0-only

//! JPEG encoding for finished stills

use super::processing::ProcessedImage;
use crate::constants::DEFAULT_JPEG_QUALITY;
use crate::errors::PhotoError;
use tracing::debug;

/// Encoded image data ready for saving
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Photo encoder
#[derive(Debug, Clone, Copy)]
pub struct PhotoEncoder {
    quality: u8,
}

impl Default for PhotoEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl PhotoEncoder {
    /// JPEG encoder; quality is clamped to 1..=100
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode as JPEG (CPU-bound, call from a blocking task)
    pub fn encode(&self, processed: ProcessedImage) -> Result<EncodedImage, PhotoError> {
        let mut data = Vec::new();
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut data, self.quality);
        encoder
            .encode(
                processed.image.as_raw(),
                processed.width,
                processed.height,
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| PhotoError::EncodingFailed(e.to_string()))?;

        debug!(size = data.len(), quality = self.quality, "Encoding complete");
        Ok(EncodedImage {
            data,
            width: processed.width,
            height: processed.height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_quality_clamped() {
        assert_eq!(PhotoEncoder::new(0).quality(), 1);
        assert_eq!(PhotoEncoder::new(250).quality(), 100);
        assert_eq!(PhotoEncoder::default().quality(), DEFAULT_JPEG_QUALITY);
    }

    #[test]
    fn test_encode_produces_jpeg() {
        let image = RgbImage::from_pixel(48, 32, image::Rgb([10, 20, 30]));
        let encoded = PhotoEncoder::new(80)
            .encode(ProcessedImage {
                image,
                width: 48,
                height: 32,
            })
            .unwrap();
        assert_eq!(&encoded.data[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&encoded.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (48, 32));
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Still post-processing
//!
//! Decodes the device JPEG, turns it upright using the capture-time
//! orientation tag and re-applies the framing crop at pixel level. Sensor
//! crops are snapped to codec blocks by the device, so the pixel crop is what
//! guarantees the saved ratio matches the preview framing.

use crate::backends::camera::SensorRotation;
use crate::controls::AspectMode;
use crate::errors::PhotoError;
use image::{DynamicImage, RgbImage};
use tracing::debug;

/// Processed still ready for encoding
pub struct ProcessedImage {
    pub image: RgbImage,
    pub width: u32,
    pub height: u32,
}

/// Decode an encoded still
pub fn decode(jpeg: &[u8]) -> Result<DynamicImage, PhotoError> {
    image::load_from_memory(jpeg).map_err(|e| PhotoError::DecodeFailed(e.to_string()))
}

/// Rotate clockwise by the orientation tag
pub fn rotate(image: DynamicImage, orientation: SensorRotation) -> DynamicImage {
    match orientation {
        SensorRotation::None => image,
        SensorRotation::Rotate90 => image.rotate90(),
        SensorRotation::Rotate180 => image.rotate180(),
        SensorRotation::Rotate270 => image.rotate270(),
    }
}

/// Largest centered crop of a `width` x `height` image with the given
/// short/long ratio, oriented like the image
///
/// `portrait_ratio` is width/height of the framing held upright (3:4 is
/// 0.75). Landscape images use the inverse.
pub fn aspect_crop_size(width: u32, height: u32, portrait_ratio: f64) -> (u32, u32) {
    if width == 0 || height == 0 || portrait_ratio <= 0.0 {
        return (width, height);
    }
    let target = if height >= width {
        portrait_ratio
    } else {
        1.0 / portrait_ratio
    };
    let current = width as f64 / height as f64;
    if current > target {
        let w = (height as f64 * target).round() as u32;
        (w.clamp(1, width), height)
    } else {
        let h = (width as f64 / target).round() as u32;
        (width, h.clamp(1, height))
    }
}

/// Center-crop to the framing of `aspect`; full framing is left untouched
pub fn crop_to_aspect(image: DynamicImage, aspect: AspectMode) -> DynamicImage {
    let Some(ratio) = aspect.portrait_ratio() else {
        return image;
    };
    let (width, height) = (image.width(), image.height());
    let (w, h) = aspect_crop_size(width, height, ratio);
    if (w, h) == (width, height) {
        return image;
    }
    let x = (width - w) / 2;
    let y = (height - h) / 2;
    debug!(from = ?(width, height), to = ?(w, h), aspect = %aspect, "Re-cropping still");
    image.crop_imm(x, y, w, h)
}

/// Decode, rotate and re-crop one still (CPU-bound)
pub fn process_still(
    jpeg: &[u8],
    orientation: SensorRotation,
    aspect: AspectMode,
) -> Result<ProcessedImage, PhotoError> {
    let decoded = decode(jpeg)?;
    let upright = rotate(decoded, orientation);
    let framed = crop_to_aspect(upright, aspect);
    let image = framed.to_rgb8();
    Ok(ProcessedImage {
        width: image.width(),
        height: image.height(),
        image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let image: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_fn(width, height, |x, _| Rgb([(x % 256) as u8, 64, 192]));
        let mut bytes = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, 90)
            .encode(image.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
        bytes
    }

    #[test]
    fn test_aspect_crop_size_portrait() {
        assert_eq!(aspect_crop_size(1200, 1600, 0.75), (1200, 1600));
        assert_eq!(aspect_crop_size(1200, 1600, 1.0), (1200, 1200));
        assert_eq!(aspect_crop_size(1200, 1600, 9.0 / 16.0), (900, 1600));
    }

    #[test]
    fn test_aspect_crop_size_landscape_uses_inverse() {
        assert_eq!(aspect_crop_size(1600, 1200, 0.75), (1600, 1200));
        assert_eq!(aspect_crop_size(1920, 1200, 0.75), (1600, 1200));
        assert_eq!(aspect_crop_size(1600, 1200, 1.0), (1200, 1200));
    }

    #[test]
    fn test_rotation_swaps_dimensions() {
        let image = decode(&jpeg(64, 32)).unwrap();
        let rotated = rotate(image, SensorRotation::Rotate90);
        assert_eq!((rotated.width(), rotated.height()), (32, 64));
    }

    #[test]
    fn test_process_square_still() {
        let processed =
            process_still(&jpeg(160, 112), SensorRotation::Rotate90, AspectMode::Square).unwrap();
        assert_eq!(processed.width, processed.height);
        assert_eq!(processed.width, 112);
    }

    #[test]
    fn test_full_framing_is_not_cropped() {
        let processed =
            process_still(&jpeg(160, 112), SensorRotation::None, AspectMode::Full).unwrap();
        assert_eq!((processed.width, processed.height), (160, 112));
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        assert!(matches!(
            decode(b"not a jpeg"),
            Err(PhotoError::DecodeFailed(_))
        ));
    }
}

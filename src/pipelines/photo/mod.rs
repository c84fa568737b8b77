// SPDX-License-Identifier: GPL-3.0-only

//! Async still pipeline
//!
//! ```text
//! Device JPEG → Decode/Rotate/Re-crop → Encode → Image sink
//!      ↓
//! Preview resumes as soon as the device result arrives
//! ```
//!
//! The CPU-bound stages and the sink call run on blocking tasks, so the
//! session worker keeps draining commands and frame events meanwhile.

pub mod encoding;
pub mod processing;

pub use encoding::{EncodedImage, PhotoEncoder};
pub use processing::{ProcessedImage, aspect_crop_size, process_still};

use crate::backends::camera::SensorRotation;
use crate::controls::AspectMode;
use crate::errors::PhotoError;
use crate::storage::{ImageSink, photo_file_name};
use std::sync::Arc;
use tracing::{debug, info};

/// Device result plus the framing it was taken with
#[derive(Debug, Clone)]
pub struct StillJob {
    pub jpeg: Arc<[u8]>,
    pub orientation: SensorRotation,
    pub aspect: AspectMode,
}

/// A saved photo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoOutcome {
    /// Locator returned by the image sink
    pub locator: String,
    pub width: u32,
    pub height: u32,
}

/// Process → encode → save
#[derive(Clone)]
pub struct PhotoPipeline {
    encoder: PhotoEncoder,
    sink: Arc<dyn ImageSink>,
}

impl PhotoPipeline {
    pub fn new(encoder: PhotoEncoder, sink: Arc<dyn ImageSink>) -> Self {
        Self { encoder, sink }
    }

    /// Run one still through the pipeline
    pub async fn process(&self, job: StillJob) -> Result<PhotoOutcome, PhotoError> {
        info!(
            size = job.jpeg.len(),
            orientation = %job.orientation,
            aspect = %job.aspect,
            "Processing still"
        );

        let encoder = self.encoder;
        let encoded = tokio::task::spawn_blocking(move || {
            let processed = process_still(&job.jpeg, job.orientation, job.aspect)?;
            encoder.encode(processed)
        })
        .await
        .map_err(|e| PhotoError::EncodingFailed(format!("encoding task error: {}", e)))??;

        let (width, height) = (encoded.width, encoded.height);
        let sink = Arc::clone(&self.sink);
        let name = photo_file_name();
        debug!(name = %name, width, height, "Handing photo to sink");

        let locator = tokio::task::spawn_blocking(move || sink.save(&encoded.data, &name))
            .await
            .map_err(|e| PhotoError::SaveFailed(format!("save task error: {}", e)))??;

        info!(locator = %locator, width, height, "Photo saved successfully");
        Ok(PhotoOutcome {
            locator,
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySink;
    use image::{ImageBuffer, Rgb};

    fn device_jpeg(width: u32, height: u32) -> Arc<[u8]> {
        let image: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_fn(width, height, |_, y| Rgb([0, (y % 256) as u8, 255]));
        let mut bytes = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, 90)
            .encode(image.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
        bytes.into()
    }

    #[tokio::test]
    async fn test_pipeline_saves_framed_photo() {
        let sink = MemorySink::new();
        let pipeline = PhotoPipeline::new(PhotoEncoder::new(90), Arc::new(sink.clone()));
        let outcome = pipeline
            .process(StillJob {
                jpeg: device_jpeg(320, 240),
                orientation: SensorRotation::Rotate90,
                aspect: AspectMode::Tall9x16,
            })
            .await
            .unwrap();

        assert_eq!(outcome.height, 320);
        assert_eq!(outcome.width, 180);
        let images = sink.images();
        assert_eq!(images.len(), 1);
        assert!(outcome.locator.ends_with(&images[0].0));
        assert!(images[0].0.starts_with("IMG_"));
    }

    #[tokio::test]
    async fn test_pipeline_reports_decode_failure() {
        let sink = MemorySink::new();
        let pipeline = PhotoPipeline::new(PhotoEncoder::default(), Arc::new(sink.clone()));
        let result = pipeline
            .process(StillJob {
                jpeg: Arc::from(&b"broken"[..]),
                orientation: SensorRotation::None,
                aspect: AspectMode::Full,
            })
            .await;
        assert!(matches!(result, Err(PhotoError::DecodeFailed(_))));
        assert!(sink.images().is_empty());
    }
}

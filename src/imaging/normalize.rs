use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ImageError, ImageResult, RgbImage};
use thiserror::Error;

use crate::config::ImagingConfig;

/// Failure of [`normalize`], split by the step that produced it
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The upload bytes are not a readable image
    #[error("not a decodable image: {0}")]
    Decode(#[source] ImageError),

    #[error("failed to encode JPEG: {0}")]
    Encode(#[source] ImageError),
}

/// Upload converted to the working resolution
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub jpeg: Bytes,
    /// Decoded pixels of the resized image, kept for cropping
    pub pixels: RgbImage,
}

impl NormalizedImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Decode arbitrary image bytes, convert to RGB, resize to the working
/// resolution and re-encode as JPEG.
///
/// CPU-bound; call through `spawn_blocking` from async code.
pub fn normalize(raw: &[u8], config: &ImagingConfig) -> Result<NormalizedImage, NormalizeError> {
    let decoded = image::load_from_memory(raw).map_err(NormalizeError::Decode)?;
    let resized = decoded
        .resize_exact(config.width, config.height, FilterType::Triangle)
        .into_rgb8();

    let jpeg = encode_jpeg(&resized, config.jpeg_quality).map_err(NormalizeError::Encode)?;

    Ok(NormalizedImage {
        jpeg,
        pixels: resized,
    })
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> ImageResult<Bytes> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality).encode_image(image)?;
    Ok(Bytes::from(buffer))
}

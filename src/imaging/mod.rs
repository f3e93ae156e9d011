//! Image normalization and region cropping

mod crop;
mod normalize;

pub use crop::{Crop, CropBounds, crop_bounds, crop_region};
pub use normalize::{NormalizeError, NormalizedImage, encode_jpeg, normalize};

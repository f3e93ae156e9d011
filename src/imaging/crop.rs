use image::{RgbImage, imageops};

use crate::inference::DetectedRegion;

/// Half-open pixel rectangle `[x0, x1) x [y0, y1)`, always inside the source image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBounds {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl CropBounds {
    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// Sub-image cut from one detected region; empty when the region lies outside the frame
#[derive(Debug, Clone)]
pub struct Crop {
    pub bounds: CropBounds,
    pub image: RgbImage,
}

impl Crop {
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }
}

fn clamp_axis(value: f64, limit: u32) -> u32 {
    // NaN falls to 0 through f64::max
    value.floor().max(0.0).min(f64::from(limit)) as u32
}

/// Convert a center-based region into clamped pixel bounds
pub fn crop_bounds(region: &DetectedRegion, image_width: u32, image_height: u32) -> CropBounds {
    let half_w = region.width / 2.0;
    let half_h = region.height / 2.0;

    let x0 = clamp_axis(region.x - half_w, image_width);
    let x1 = clamp_axis(region.x + half_w, image_width);
    let y0 = clamp_axis(region.y - half_h, image_height);
    let y1 = clamp_axis(region.y + half_h, image_height);

    CropBounds {
        x0,
        y0,
        x1: x1.max(x0),
        y1: y1.max(y0),
    }
}

pub fn crop_region(image: &RgbImage, region: &DetectedRegion) -> Crop {
    let bounds = crop_bounds(region, image.width(), image.height());

    let image = if bounds.is_empty() {
        RgbImage::new(0, 0)
    } else {
        imageops::crop_imm(image, bounds.x0, bounds.y0, bounds.width(), bounds.height())
            .to_image()
    };

    Crop { bounds, image }
}

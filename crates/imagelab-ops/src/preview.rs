//! Preview derivation: bounded-size copies of working images.
//!
//! Reduces an image so its longest axis is at most `max_dimension`
//! pixels. Previews are what the UI displays after every operation, so
//! they favor smooth resampling over speed.
//!
//! If the image is already at or below the target size, it is returned
//! unchanged.

use std::fmt;

use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Default cap on the longest preview side, in pixels.
pub const DEFAULT_PREVIEW_MAX_SIZE: u32 = 600;

/// Resampling filter used when shrinking previews.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PreviewFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, averages the covered area on
    /// downscale.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest/best for photos.
    Lanczos3,
}

impl PreviewFilter {
    /// Convert to the `image` crate's `FilterType`.
    const fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            Self::Nearest => image::imageops::FilterType::Nearest,
            Self::Triangle => image::imageops::FilterType::Triangle,
            Self::CatmullRom => image::imageops::FilterType::CatmullRom,
            Self::Gaussian => image::imageops::FilterType::Gaussian,
            Self::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for PreviewFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Shrink `image` so the longest axis is at most `max_dimension` pixels,
/// preserving aspect ratio.
///
/// The short axis is `floor(short * max_dimension / long)`, at least 1px.
/// Returns the (possibly unchanged) image and whether it was resized.
#[must_use]
pub fn preview(image: &RgbImage, max_dimension: u32, filter: PreviewFilter) -> (RgbImage, bool) {
    let (w, h) = image.dimensions();
    let long_axis = w.max(h);

    if max_dimension == 0 || long_axis <= max_dimension {
        return (image.clone(), false);
    }

    let scale = |dim: u32| -> u32 {
        let scaled = u64::from(dim) * u64::from(max_dimension) / u64::from(long_axis);
        u32::try_from(scaled).unwrap_or(max_dimension).max(1)
    };
    let resized = image::imageops::resize(image, scale(w), scale(h), filter.to_image_filter());
    (resized, true)
}

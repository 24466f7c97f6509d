//! Geometric operations: percentage resize and canvas-expanding rotation.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};

/// Lower bound of the resize scale, in percent.
pub const MIN_SCALE_PERCENT: f64 = 10.0;

/// Upper bound of the resize scale, in percent.
pub const MAX_SCALE_PERCENT: f64 = 200.0;

/// Fill for canvas regions not covered by the rotated image.
pub const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Absorbs floating point noise in `sin`/`cos` of right angles before
/// flooring canvas dimensions.
const DIMENSION_EPSILON: f64 = 1e-9;

/// Resize by a percentage of the current dimensions.
///
/// The scale is clamped to `[MIN_SCALE_PERCENT, MAX_SCALE_PERCENT]`.
/// Output dimensions are `floor(dim * scale / 100)`, each at least 1px.
/// Uses bilinear interpolation.
#[must_use = "returns the resized image"]
pub fn resize(image: &RgbImage, scale_percent: f64) -> RgbImage {
    let scale = scale_percent.clamp(MIN_SCALE_PERCENT, MAX_SCALE_PERCENT);
    let (width, height) = scaled_dimensions(image.width(), image.height(), scale);
    if (width, height) == image.dimensions() {
        return image.clone();
    }
    imageops::resize(image, width, height, FilterType::Triangle)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn scaled_dimensions(width: u32, height: u32, scale_percent: f64) -> (u32, u32) {
    let scale = |dim: u32| -> u32 {
        let scaled = (f64::from(dim) * scale_percent / 100.0).floor();
        (scaled as u32).max(1)
    };
    (scale(width), scale(height))
}

/// Rotate counter-clockwise by `angle_degrees` about the image center.
///
/// The output canvas grows to the bounding box of the rotated rectangle,
/// `floor(h*|sin| + w*|cos|)` by `floor(h*|cos| + w*|sin|)`, so no pixels
/// are cut off. Corners not covered by the source are filled with
/// [`BACKGROUND`]. Whole turns return the input unchanged.
#[must_use = "returns the rotated image"]
pub fn rotate(image: &RgbImage, angle_degrees: f64) -> RgbImage {
    if angle_degrees.rem_euclid(360.0) == 0.0 {
        return image.clone();
    }

    let (width, height) = image.dimensions();
    let (out_width, out_height) = rotated_dimensions(width, height, angle_degrees);

    // Pad to a canvas large enough for both the source and the rotated
    // bounding box, rotate about its center, then crop to the box.
    let pad_width = width.max(out_width);
    let pad_height = height.max(out_height);
    let mut canvas = RgbImage::from_pixel(pad_width, pad_height, BACKGROUND);
    imageops::overlay(
        &mut canvas,
        image,
        i64::from((pad_width - width) / 2),
        i64::from((pad_height - height) / 2),
    );

    // imageproc rotates clockwise; negate for the counter-clockwise
    // convention.
    #[allow(clippy::cast_possible_truncation)]
    let theta = -angle_degrees.to_radians() as f32;
    let rotated = rotate_about_center(&canvas, theta, Interpolation::Bilinear, BACKGROUND);

    imageops::crop_imm(
        &rotated,
        (pad_width - out_width) / 2,
        (pad_height - out_height) / 2,
        out_width,
        out_height,
    )
    .to_image()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn rotated_dimensions(width: u32, height: u32, angle_degrees: f64) -> (u32, u32) {
    let theta = angle_degrees.to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let (w, h) = (f64::from(width), f64::from(height));
    let out_width = h.mul_add(sin, w * cos) + DIMENSION_EPSILON;
    let out_height = h.mul_add(cos, w * sin) + DIMENSION_EPSILON;
    (
        (out_width.floor() as u32).max(1),
        (out_height.floor() as u32).max(1),
    )
}

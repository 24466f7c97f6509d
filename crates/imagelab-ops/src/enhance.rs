//! Tonal adjustments: histogram equalization, brightness, negative.

use image::imageops;
use image::{GrayImage, Luma, Rgb, RgbImage};

/// BT.601 luma weights of the analogue YUV transform.
const LUMA_R: f32 = 0.299;
const LUMA_G: f32 = 0.587;
const LUMA_B: f32 = 0.114;

/// Chroma scale factors of the analogue YUV transform.
const U_SCALE: f32 = 0.492;
const V_SCALE: f32 = 0.877;

/// Equalize the luminance histogram while leaving chroma untouched.
///
/// Each pixel is split into Y (BT.601 luma) and the U/V color
/// differences. Only Y is passed through
/// [`imageproc::contrast::equalize_histogram`]; U and V are carried
/// through unquantized and recombined with the new Y.
#[must_use = "returns the equalized image"]
pub fn equalize_histogram(image: &RgbImage) -> RgbImage {
    let luma = GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([to_u8(luminance(*image.get_pixel(x, y)))])
    });
    let equalized = imageproc::contrast::equalize_histogram(&luma);

    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let Rgb([r, g, b]) = *image.get_pixel(x, y);
        let y_old = luminance(Rgb([r, g, b]));
        let u = U_SCALE * (f32::from(b) - y_old);
        let v = V_SCALE * (f32::from(r) - y_old);
        let y_new = f32::from(equalized.get_pixel(x, y).0[0]);

        let r = v.mul_add(1.0 / V_SCALE, y_new);
        let b = u.mul_add(1.0 / U_SCALE, y_new);
        let g = (y_new - LUMA_R * r - LUMA_B * b) / LUMA_G;
        Rgb([to_u8(r), to_u8(g), to_u8(b)])
    })
}

/// BT.601 luma of an RGB pixel, unrounded.
pub(crate) fn luminance(Rgb([r, g, b]): Rgb<u8>) -> f32 {
    LUMA_R.mul_add(
        f32::from(r),
        LUMA_G.mul_add(f32::from(g), LUMA_B * f32::from(b)),
    )
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Add `delta` to every channel, saturating at 0 and 255.
///
/// A delta of zero returns a bit-identical copy.
#[must_use = "returns the adjusted image"]
pub fn brightness(image: &RgbImage, delta: i16) -> RgbImage {
    if delta == 0 {
        return image.clone();
    }
    imageops::brighten(image, i32::from(delta))
}

/// Replace every channel value `v` with `255 - v`.
///
/// Applying it twice yields the original image exactly.
#[must_use = "returns the inverted image"]
pub fn negative(image: &RgbImage) -> RgbImage {
    let mut inverted = image.clone();
    imageops::invert(&mut inverted);
    inverted
}

//! imagelab-ops: Pure image operations (sans-IO).
//!
//! Validates operation requests against per-operation parameter schemas
//! and runs the corresponding transform on an in-memory RGB image:
//! resize, rotate, histogram equalization, brightness, negative,
//! Gaussian blur, median denoise, Sobel edges, sharpen, and format
//! conversion (which leaves the pixels alone; the caller re-encodes).
//!
//! This crate has **no I/O dependencies** -- it operates on decoded
//! images and byte slices. Files, sessions and HTTP live in
//! `imagelab-session` and `imagelab-server`.

pub mod blur;
pub mod codec;
pub mod edge;
pub mod enhance;
pub mod geometry;
pub mod params;
pub mod preview;
pub mod types;

pub use codec::ImageKind;
pub use params::{OutOfRange, ParamKind, ParamSpec, ParamValue};
pub use preview::PreviewFilter;
pub use types::{Operation, OpsError, RgbImage, Transform};

/// Run a validated transform on `image`, returning a new image.
///
/// The input is never modified.
#[must_use = "returns the transformed image"]
pub fn apply(image: &RgbImage, transform: &Transform) -> RgbImage {
    match *transform {
        Transform::Resize { scale_percent } => geometry::resize(image, scale_percent),
        Transform::Rotate { angle_degrees } => geometry::rotate(image, angle_degrees),
        Transform::HistogramEqualization => enhance::equalize_histogram(image),
        Transform::Brightness { delta } => enhance::brightness(image, delta),
        Transform::Negative => enhance::negative(image),
        Transform::GaussianBlur { kernel_size } => blur::gaussian_blur(image, kernel_size),
        Transform::MedianDenoise { kernel_size } => blur::median_denoise(image, kernel_size),
        Transform::SobelEdge { kernel_size } => edge::sobel(image, kernel_size),
        Transform::Sharpen { strength } => edge::sharpen(image, strength),
        Transform::Convert { .. } => image.clone(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn checker(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                image::Rgb([20, 40, 60])
            } else {
                image::Rgb([220, 200, 180])
            }
        })
    }

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn every_operation_runs_with_valid_parameters() {
        let img = checker(24, 16);
        let requests = [
            ("resize", fields(&[("scale", "50")])),
            ("rotate", fields(&[("angle", "30")])),
            ("hist_eq", HashMap::new()),
            ("brightness", fields(&[("brightness_value", "20")])),
            ("negative", HashMap::new()),
            ("blur_gaussian", fields(&[("gaussian_kernel", "5")])),
            ("denoise_median", fields(&[("median_kernel", "3")])),
            ("edge_sobel", fields(&[("sobel_ksize", "3")])),
            ("sharpen", fields(&[("sharpen_strength", "1.0")])),
            ("convert", fields(&[("format", "bmp")])),
        ];
        for (name, params) in &requests {
            let transform = Transform::parse(name, params).unwrap();
            assert_eq!(transform.operation().name(), *name);
            let out = apply(&img, &transform);
            assert!(out.width() >= 1 && out.height() >= 1, "{name}");
        }
    }

    #[test]
    fn convert_keeps_pixels() {
        let img = checker(8, 8);
        let converted = apply(
            &img,
            &Transform::Convert {
                format: ImageKind::Gif,
            },
        );
        assert_eq!(converted, img);
    }

    #[test]
    fn apply_does_not_touch_input() {
        let img = checker(8, 8);
        let copy = img.clone();
        let _ = apply(&img, &Transform::Negative);
        assert_eq!(img, copy);
    }
}

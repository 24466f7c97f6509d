//! Derivative filters: Sobel edge magnitude and Laplacian sharpening.
//!
//! `imageproc::gradients` only ships fixed 3x3 Sobel kernels, so the
//! larger apertures are built here as the outer product of a smoothing
//! and a derivative row and run through [`imageproc::filter::filter`]
//! with `f32` accumulation. Borders are padded by continuity, which keeps
//! flat regions at zero response.

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use imageproc::filter::filter;
use imageproc::kernel::Kernel;

use crate::enhance::{luminance, to_u8};

type GradientImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Smoothing and derivative taps for a Sobel aperture.
///
/// Aperture 1 is the bare central difference with no smoothing.
/// Unlisted sizes fall back to the 3x3 kernel; [`crate::params`] only
/// lets 1, 3, 5 and 7 through.
const fn sobel_taps(kernel_size: u32) -> (&'static [f32], &'static [f32]) {
    match kernel_size {
        1 => (&[1.0], &[-1.0, 0.0, 1.0]),
        5 => (&[1.0, 4.0, 6.0, 4.0, 1.0], &[-1.0, -2.0, 0.0, 2.0, 1.0]),
        7 => (
            &[1.0, 6.0, 15.0, 20.0, 15.0, 6.0, 1.0],
            &[-1.0, -4.0, -5.0, 0.0, 5.0, 4.0, 1.0],
        ),
        _ => (&[1.0, 2.0, 1.0], &[-1.0, 0.0, 1.0]),
    }
}

/// Row-major kernel data for `column * row`: `rows.len()` high and
/// `cols.len()` wide.
fn outer(rows: &[f32], cols: &[f32]) -> Vec<f32> {
    rows.iter()
        .flat_map(|r| cols.iter().map(move |c| r * c))
        .collect()
}

/// BT.601 grey conversion, rounded to the nearest level.
fn luma(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([to_u8(luminance(*image.get_pixel(x, y)))])
    })
}

/// Detect edges with the Sobel operator.
///
/// The image is reduced to BT.601 luma, horizontal and vertical gradients
/// are computed with the given aperture, and their magnitude
/// `sqrt(gx^2 + gy^2)` is clamped to `[0, 255]` and written to all three
/// channels.
#[must_use = "returns the edge magnitude image"]
#[allow(clippy::cast_possible_truncation)]
pub fn sobel(image: &RgbImage, kernel_size: u32) -> RgbImage {
    let gray = luma(image);
    let (smooth, derive) = sobel_taps(kernel_size);
    let (smooth_len, derive_len) = (smooth.len() as u32, derive.len() as u32);

    let horizontal = outer(smooth, derive);
    let vertical = outer(derive, smooth);
    let gx: GradientImage = filter(
        &gray,
        Kernel::new(&horizontal, derive_len, smooth_len),
        |acc| acc,
    );
    let gy: GradientImage = filter(
        &gray,
        Kernel::new(&vertical, smooth_len, derive_len),
        |acc| acc,
    );

    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let v = to_u8(gx.get_pixel(x, y).0[0].hypot(gy.get_pixel(x, y).0[0]));
        Rgb([v, v, v])
    })
}

/// 3x3 Laplacian aperture with diagonal taps, row-major.
const LAPLACIAN: [f32; 9] = [2.0, 0.0, 2.0, 0.0, -8.0, 0.0, 2.0, 0.0, 2.0];

/// Sharpen by subtracting a scaled Laplacian: `out = in - strength * L`.
///
/// Computed per channel in `f32`, then clamped to `[0, 255]`. Flat
/// regions have zero Laplacian and pass through unchanged.
#[must_use = "returns the sharpened image"]
pub fn sharpen(image: &RgbImage, strength: f32) -> RgbImage {
    let laplacian: ImageBuffer<Rgb<f32>, Vec<f32>> =
        filter(image, Kernel::new(&LAPLACIAN, 3, 3), |acc| acc);

    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let source = image.get_pixel(x, y).0;
        let response = laplacian.get_pixel(x, y).0;
        Rgb(std::array::from_fn(|c| {
            to_u8((-strength).mul_add(response[c], f32::from(source[c])))
        }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 10x10 image with a vertical step from `left` to `right` at x = 5.
    fn step(left: u8, right: u8) -> RgbImage {
        RgbImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                Rgb([left, left, left])
            } else {
                Rgb([right, right, right])
            }
        })
    }

    #[test]
    fn uniform_image_has_no_edges() {
        let img = RgbImage::from_pixel(12, 12, Rgb([90, 90, 90]));
        for k in [1, 3, 5, 7] {
            let edges = sobel(&img, k);
            assert!(
                edges.pixels().all(|p| p.0 == [0, 0, 0]),
                "aperture {k} found edges in a flat image",
            );
        }
    }

    #[test]
    fn step_edge_is_detected_only_at_the_boundary() {
        let edges = sobel(&step(0, 255), 3);
        assert_eq!(edges.get_pixel(4, 5).0, [255, 255, 255]);
        assert_eq!(edges.get_pixel(5, 5).0, [255, 255, 255]);
        assert_eq!(edges.get_pixel(1, 5).0, [0, 0, 0]);
        assert_eq!(edges.get_pixel(8, 5).0, [0, 0, 0]);
    }

    #[test]
    fn unit_aperture_is_central_difference() {
        // Step of 40: gx = p(x+1) - p(x-1) = 40 on both sides of the boundary.
        let edges = sobel(&step(100, 140), 1);
        assert_eq!(edges.get_pixel(4, 5).0, [40, 40, 40]);
        assert_eq!(edges.get_pixel(5, 5).0, [40, 40, 40]);
        assert_eq!(edges.get_pixel(2, 5).0, [0, 0, 0]);
    }

    #[test]
    #[allow(clippy::cast_possible_truncation)]
    fn three_tap_aperture_matches_imageproc_sobel() {
        let img = RgbImage::from_fn(9, 7, |x, y| {
            Rgb([(x * 29 % 256) as u8, (y * 37 % 256) as u8, ((x + y) * 11) as u8])
        });
        let gray = luma(&img);
        let gx = imageproc::gradients::horizontal_sobel(&gray);
        let gy = imageproc::gradients::vertical_sobel(&gray);

        let edges = sobel(&img, 3);
        for (x, y, pixel) in edges.enumerate_pixels() {
            let expected = to_u8(
                f32::from(gx.get_pixel(x, y).0[0]).hypot(f32::from(gy.get_pixel(x, y).0[0])),
            );
            assert_eq!(pixel.0, [expected; 3], "mismatch at ({x}, {y})");
        }
    }

    #[test]
    fn gradients_use_bt601_luma() {
        // Pure red has BT.601 luma 76; Rec. 709 weights would give 54.
        let img = RgbImage::from_fn(10, 10, |x, _| {
            if x < 5 { Rgb([0, 0, 0]) } else { Rgb([255, 0, 0]) }
        });
        let edges = sobel(&img, 1);
        assert_eq!(edges.get_pixel(5, 5).0, [76, 76, 76]);
    }

    #[test]
    fn larger_apertures_respond_wider() {
        let edges = sobel(&step(100, 110), 7);
        // Three pixels from the boundary is inside the 7-tap support.
        assert!(edges.get_pixel(2, 5).0[0] > 0);
        let narrow = sobel(&step(100, 110), 3);
        assert_eq!(narrow.get_pixel(2, 5).0[0], 0);
    }

    #[test]
    fn sobel_preserves_dimensions() {
        let img = RgbImage::new(17, 31);
        assert_eq!(sobel(&img, 5).dimensions(), (17, 31));
    }

    #[test]
    fn sharpen_leaves_flat_regions_alone() {
        let img = RgbImage::from_pixel(8, 8, Rgb([10, 120, 240]));
        assert_eq!(sharpen(&img, 3.0), img);
    }

    #[test]
    fn sharpen_increases_contrast_across_an_edge() {
        let img = step(100, 200);
        let sharpened = sharpen(&img, 1.0);
        // Dark side gets darker, bright side gets brighter.
        assert!(sharpened.get_pixel(4, 5).0[0] < 100);
        assert!(sharpened.get_pixel(5, 5).0[0] > 200);
        // Away from the edge nothing changes.
        assert_eq!(sharpened.get_pixel(1, 5).0, [100, 100, 100]);
        assert_eq!(sharpened.get_pixel(8, 5).0, [200, 200, 200]);
    }
}

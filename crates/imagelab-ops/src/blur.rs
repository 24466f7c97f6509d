//! Restoration filters: Gaussian blur and median denoise.
//!
//! [`gaussian_blur`] wraps [`imageproc::filter::gaussian_blur_f32`], which
//! only accepts single-channel images, by blurring each R/G/B channel
//! independently and reassembling. [`median_denoise`] wraps
//! [`imageproc::filter::median_filter`], which handles RGB directly.
//!
//! Both take an odd kernel size; validation of that size happens in
//! [`crate::params`] before these functions are reached.

use image::{GrayImage, RgbImage};

/// Sigma matching a square Gaussian kernel of side `kernel_size`.
///
/// Uses the conventional derivation `0.3 * ((k - 1) / 2 - 1) + 0.8`, so
/// a 3x3 kernel maps to sigma 0.8 and a 5x5 kernel to 1.1.
#[must_use]
pub fn sigma_for_kernel(kernel_size: u32) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let k = kernel_size as f32;
    0.3f32.mul_add((k - 1.0).mul_add(0.5, -1.0), 0.8)
}

/// Apply Gaussian blur with a `kernel_size` x `kernel_size` kernel.
///
/// A 1x1 kernel is the identity and returns the image unchanged.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &RgbImage, kernel_size: u32) -> RgbImage {
    if kernel_size <= 1 {
        return image.clone();
    }
    let sigma = sigma_for_kernel(kernel_size);

    let (w, h) = (image.width(), image.height());

    // Split into three grayscale channels.
    let channels: [GrayImage; 3] = std::array::from_fn(|c| {
        GrayImage::from_fn(w, h, |x, y| image::Luma([image.get_pixel(x, y).0[c]]))
    });

    // Blur each channel independently.
    let blurred: [GrayImage; 3] =
        std::array::from_fn(|c| imageproc::filter::gaussian_blur_f32(&channels[c], sigma));

    RgbImage::from_fn(w, h, |x, y| {
        image::Rgb([
            blurred[0].get_pixel(x, y).0[0],
            blurred[1].get_pixel(x, y).0[0],
            blurred[2].get_pixel(x, y).0[0],
        ])
    })
}

/// Replace each pixel with the per-channel median of its
/// `kernel_size` x `kernel_size` neighbourhood.
///
/// Removes salt-and-pepper noise while keeping edges sharp.
#[must_use = "returns the denoised image"]
pub fn median_denoise(image: &RgbImage, kernel_size: u32) -> RgbImage {
    let radius = kernel_size / 2;
    if radius == 0 {
        return image.clone();
    }
    imageproc::filter::median_filter(image, radius, radius)
}

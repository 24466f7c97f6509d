//! Image decoding, format detection and encoding.
//!
//! Accepts raw image bytes in one of the whitelisted container formats
//! and produces an 8-bit RGB working image. Alpha is dropped on decode;
//! every operation works on three channels.

use std::io::Cursor;

use image::{ImageEncoder, ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};

use crate::types::OpsError;

/// JPEG quality used for previews.
pub const PREVIEW_JPEG_QUALITY: u8 = 85;

/// JPEG quality used for full-resolution working images.
pub const WORKING_JPEG_QUALITY: u8 = 95;

/// Container formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageKind {
    /// Portable Network Graphics.
    Png,
    /// JPEG (`.jpg` / `.jpeg`).
    Jpeg,
    /// Graphics Interchange Format (first frame only).
    Gif,
    /// Windows bitmap.
    Bmp,
    /// WebP.
    WebP,
}

impl ImageKind {
    /// All accepted formats.
    pub const ALL: [Self; 5] = [Self::Png, Self::Jpeg, Self::Gif, Self::Bmp, Self::WebP];

    /// Match a file extension, case-insensitively. Both `jpg` and `jpeg`
    /// map to [`ImageKind::Jpeg`].
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "bmp" => Some(Self::Bmp),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Canonical extension used when naming stored files.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::WebP => "webp",
        }
    }

    /// MIME type served for this format.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::WebP => "image/webp",
        }
    }

    /// Identify the format from the leading magic bytes.
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::EmptyInput`] for empty input and
    /// [`OpsError::UnsupportedFormat`] when the bytes are not one of the
    /// accepted formats.
    pub fn detect(bytes: &[u8]) -> Result<Self, OpsError> {
        if bytes.is_empty() {
            return Err(OpsError::EmptyInput);
        }
        let format = image::guess_format(bytes).map_err(|_| OpsError::UnsupportedFormat)?;
        Self::from_format(format).ok_or(OpsError::UnsupportedFormat)
    }

    /// The `image` crate format for this container.
    #[must_use]
    pub const fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Gif => ImageFormat::Gif,
            Self::Bmp => ImageFormat::Bmp,
            Self::WebP => ImageFormat::WebP,
        }
    }

    const fn from_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Gif => Some(Self::Gif),
            ImageFormat::Bmp => Some(Self::Bmp),
            ImageFormat::WebP => Some(Self::WebP),
            _ => None,
        }
    }
}

/// Decode raw image bytes into an RGB working image.
///
/// # Errors
///
/// Returns [`OpsError::EmptyInput`] if `bytes` is empty.
/// Returns [`OpsError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<RgbImage, OpsError> {
    if bytes.is_empty() {
        return Err(OpsError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

/// Encode a full-resolution image in `kind`.
///
/// JPEG uses [`WORKING_JPEG_QUALITY`]; WebP is written lossless and GIF
/// is quantized to a single 256-color frame.
///
/// # Errors
///
/// Returns [`OpsError::Encode`] if the encoder fails.
pub fn encode(image: &RgbImage, kind: ImageKind) -> Result<Vec<u8>, OpsError> {
    match kind {
        ImageKind::Png => encode_png(image),
        ImageKind::Jpeg => encode_jpeg(image, WORKING_JPEG_QUALITY),
        ImageKind::Gif | ImageKind::Bmp | ImageKind::WebP => {
            let mut buf = Cursor::new(Vec::new());
            image
                .write_to(&mut buf, kind.image_format())
                .map_err(|e| OpsError::Encode(e.to_string()))?;
            Ok(buf.into_inner())
        }
    }
}

/// Encode an RGB image as PNG.
///
/// # Errors
///
/// Returns [`OpsError::Encode`] if the encoder fails.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, OpsError> {
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| OpsError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Encode an RGB image as JPEG at the given quality (1-100).
///
/// # Errors
///
/// Returns [`OpsError::Encode`] if the encoder fails.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, OpsError> {
    let mut buf = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| OpsError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> RgbImage {
        RgbImage::from_fn(17, 31, |x, y| {
            image::Rgb([
                u8::try_from(x * 7).unwrap_or(0),
                u8::try_from(y * 5).unwrap_or(0),
                64,
            ])
        })
    }

    #[test]
    fn empty_input_returns_error() {
        assert!(matches!(decode(&[]), Err(OpsError::EmptyInput)));
        assert!(matches!(ImageKind::detect(&[]), Err(OpsError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(OpsError::ImageDecode(_))));
    }

    #[test]
    fn png_is_lossless() {
        let img = sample();
        let png = encode_png(&img).unwrap();
        assert_eq!(ImageKind::detect(&png).unwrap(), ImageKind::Png);
        assert_eq!(decode(&png).unwrap(), img);
    }

    #[test]
    fn jpeg_keeps_dimensions() {
        let jpeg = encode_jpeg(&sample(), PREVIEW_JPEG_QUALITY).unwrap();
        assert_eq!(ImageKind::detect(&jpeg).unwrap(), ImageKind::Jpeg);
        assert_eq!(decode(&jpeg).unwrap().dimensions(), (17, 31));
    }

    #[test]
    fn every_format_encodes_and_is_detected_back() {
        let img = sample();
        for kind in ImageKind::ALL {
            let bytes = encode(&img, kind).unwrap();
            assert_eq!(ImageKind::detect(&bytes).unwrap(), kind, "{kind:?}");
            assert_eq!(decode(&bytes).unwrap().dimensions(), (17, 31), "{kind:?}");
        }
    }

    #[test]
    fn lossless_formats_keep_pixels() {
        let img = sample();
        for kind in [ImageKind::Png, ImageKind::Bmp, ImageKind::WebP] {
            assert_eq!(decode(&encode(&img, kind).unwrap()).unwrap(), img, "{kind:?}");
        }
    }

    #[test]
    fn alpha_is_dropped_on_decode() {
        let rgba = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 40]));
        let mut buf = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buf)
            .write_image(rgba.as_raw(), 2, 2, image::ExtendedColorType::Rgba8)
            .unwrap();
        let rgb = decode(&buf).unwrap();
        assert_eq!(rgb.get_pixel(1, 1).0, [10, 20, 30]);
    }

    #[test]
    fn text_is_not_an_image() {
        let result = ImageKind::detect(b"hello, world");
        assert!(matches!(result, Err(OpsError::UnsupportedFormat)));
    }

    #[test]
    fn extensions_are_case_insensitive() {
        assert_eq!(ImageKind::from_extension("JPEG"), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_extension("jpg"), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_extension("WebP"), Some(ImageKind::WebP));
        assert_eq!(ImageKind::from_extension("tiff"), None);
        for kind in ImageKind::ALL {
            assert_eq!(ImageKind::from_extension(kind.extension()), Some(kind));
        }
    }
}

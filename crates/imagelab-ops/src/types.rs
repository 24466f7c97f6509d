//! Shared types for imagelab operations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::ImageKind;
use crate::geometry::{self, MAX_SCALE_PERCENT, MIN_SCALE_PERCENT};

/// Re-export `RgbImage` so downstream crates can hold decoded working
/// images without depending on `image` directly.
pub use image::RgbImage;

/// One member of the fixed set of supported operations.
///
/// The serialized names match the form values posted by the UI
/// (`resize`, `hist_eq`, `blur_gaussian`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Scale by a percentage.
    #[serde(rename = "resize")]
    Resize,
    /// Rotate counter-clockwise on an expanded canvas.
    #[serde(rename = "rotate")]
    Rotate,
    /// Equalize the luminance histogram.
    #[serde(rename = "hist_eq")]
    HistogramEqualization,
    /// Add a constant to every channel.
    #[serde(rename = "brightness")]
    Brightness,
    /// Invert every channel.
    #[serde(rename = "negative")]
    Negative,
    /// Gaussian smoothing with an odd kernel.
    #[serde(rename = "blur_gaussian")]
    GaussianBlur,
    /// Median filter with an odd kernel.
    #[serde(rename = "denoise_median")]
    MedianDenoise,
    /// Sobel gradient magnitude.
    #[serde(rename = "edge_sobel")]
    SobelEdge,
    /// Laplacian sharpening.
    #[serde(rename = "sharpen")]
    Sharpen,
    /// Re-encode in another container format.
    #[serde(rename = "convert")]
    Convert,
}

impl Operation {
    /// All operations, in the order the UI presents them.
    pub const ALL: [Self; 10] = [
        Self::Resize,
        Self::Rotate,
        Self::HistogramEqualization,
        Self::Brightness,
        Self::Negative,
        Self::GaussianBlur,
        Self::MedianDenoise,
        Self::SobelEdge,
        Self::Sharpen,
        Self::Convert,
    ];

    /// Wire name of the operation.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Resize => "resize",
            Self::Rotate => "rotate",
            Self::HistogramEqualization => "hist_eq",
            Self::Brightness => "brightness",
            Self::Negative => "negative",
            Self::GaussianBlur => "blur_gaussian",
            Self::MedianDenoise => "denoise_median",
            Self::SobelEdge => "edge_sobel",
            Self::Sharpen => "sharpen",
            Self::Convert => "convert",
        }
    }

    /// Human-readable title, used as the prefix of history labels.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Resize => "Resize",
            Self::Rotate => "Rotate",
            Self::HistogramEqualization => "Histogram Equalization",
            Self::Brightness => "Brightness",
            Self::Negative => "Negative",
            Self::GaussianBlur => "Gaussian Blur",
            Self::MedianDenoise => "Median Denoise",
            Self::SobelEdge => "Sobel Edge",
            Self::Sharpen => "Sharpen",
            Self::Convert => "Convert",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| OpsError::UnknownOperation(s.to_owned()))
    }
}

/// A validated, fully typed operation ready to run.
///
/// Built from raw form values by [`Transform::parse`], which enforces
/// each operation's parameter schema. Once constructed, every value is
/// inside its declared range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    /// Scale both axes by `scale_percent / 100`.
    Resize {
        /// Scale in percent, within `[10, 200]`.
        scale_percent: f64,
    },
    /// Rotate counter-clockwise by `angle_degrees`.
    Rotate {
        /// Angle in degrees, within `[0, 360]`.
        angle_degrees: f64,
    },
    /// Equalize the Y channel of a YUV transform.
    HistogramEqualization,
    /// Saturating per-channel addition.
    Brightness {
        /// Offset within `[-100, 100]`.
        delta: i16,
    },
    /// `255 - v` per channel.
    Negative,
    /// Gaussian blur.
    GaussianBlur {
        /// Odd kernel size.
        kernel_size: u32,
    },
    /// Median denoise.
    MedianDenoise {
        /// Odd kernel size.
        kernel_size: u32,
    },
    /// Sobel edge magnitude.
    SobelEdge {
        /// Aperture, one of 1, 3, 5, 7.
        kernel_size: u32,
    },
    /// Subtract a scaled Laplacian.
    Sharpen {
        /// Strength within `[0.5, 3.0]`.
        strength: f32,
    },
    /// Leave the pixels alone and store the result as `format`.
    Convert {
        /// Target container format.
        format: ImageKind,
    },
}

impl Transform {
    /// The operation this transform belongs to.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Resize { .. } => Operation::Resize,
            Self::Rotate { .. } => Operation::Rotate,
            Self::HistogramEqualization => Operation::HistogramEqualization,
            Self::Brightness { .. } => Operation::Brightness,
            Self::Negative => Operation::Negative,
            Self::GaussianBlur { .. } => Operation::GaussianBlur,
            Self::MedianDenoise { .. } => Operation::MedianDenoise,
            Self::SobelEdge { .. } => Operation::SobelEdge,
            Self::Sharpen { .. } => Operation::Sharpen,
            Self::Convert { .. } => Operation::Convert,
        }
    }

    /// Label recorded in a session's operation log, e.g. `Resize (50%)`.
    #[must_use]
    pub fn label(&self) -> String {
        let title = self.operation().title();
        match *self {
            Self::Resize { scale_percent } => format!("{title} ({scale_percent}%)"),
            Self::Rotate { angle_degrees } => format!("{title} ({angle_degrees}°)"),
            Self::Brightness { delta } => format!("{title} ({delta:+})"),
            Self::GaussianBlur { kernel_size }
            | Self::MedianDenoise { kernel_size }
            | Self::SobelEdge { kernel_size } => format!("{title} (k={kernel_size})"),
            Self::Sharpen { strength } => format!("{title} ({strength}x)"),
            Self::Convert { format } => {
                format!("{title} to {}", format.extension().to_ascii_uppercase())
            }
            Self::HistogramEqualization | Self::Negative => title.to_owned(),
        }
    }

    /// Container format the result must be stored in, if this transform
    /// dictates one.
    #[must_use]
    pub const fn target_format(&self) -> Option<ImageKind> {
        match self {
            Self::Convert { format } => Some(*format),
            _ => None,
        }
    }

    /// Dimensions of the result of running this transform on a
    /// `width` x `height` image.
    #[must_use]
    pub fn output_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        match *self {
            Self::Resize { scale_percent } => geometry::scaled_dimensions(
                width,
                height,
                scale_percent.clamp(MIN_SCALE_PERCENT, MAX_SCALE_PERCENT),
            ),
            Self::Rotate { angle_degrees } if angle_degrees.rem_euclid(360.0) != 0.0 => {
                geometry::rotated_dimensions(width, height, angle_degrees)
            }
            _ => (width, height),
        }
    }

    /// Refuse to grow a `width` x `height` image past `max_pixels`.
    ///
    /// Results no larger than the input always pass, so an image that is
    /// already over the limit can still be shrunk or filtered.
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::InvalidParameter`] naming the operation's
    /// field when the result would be too large.
    pub fn check_output(
        &self,
        width: u32,
        height: u32,
        max_pixels: u64,
    ) -> Result<(u32, u32), OpsError> {
        let (out_width, out_height) = self.output_dimensions(width, height);
        let pixels = u64::from(out_width) * u64::from(out_height);
        if pixels <= max_pixels || pixels <= u64::from(width) * u64::from(height) {
            return Ok((out_width, out_height));
        }
        let field = self
            .operation()
            .schema()
            .first()
            .map_or("operation", |spec| spec.name);
        Err(OpsError::InvalidParameter {
            field,
            reason: format!(
                "result would be {out_width}x{out_height}, over the {max_pixels} pixel limit"
            ),
        })
    }
}

/// Errors produced while validating or running an operation.
#[derive(Debug, thiserror::Error)]
pub enum OpsError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The bytes are not one of the accepted container formats.
    #[error("unsupported image format")]
    UnsupportedFormat,

    /// The operation name is not a member of [`Operation`].
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// A parameter was missing, non-numeric, or out of range.
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter {
        /// Name of the offending form field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Encoding the result failed.
    #[error("failed to encode image: {0}")]
    Encode(String),
}

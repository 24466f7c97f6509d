//! Parameter schemas and validation.
//!
//! Each [`Operation`] declares a small table of [`ParamSpec`]s. Raw form
//! values are checked against that table before any pixels are touched,
//! so a rejected request never reaches the transforms.
//!
//! Field names are the ones the UI form posts. Every operation reads its
//! own field, so one form can carry every control at once.
//!
//! Every value must be present. Numeric fields must parse as a finite
//! number; what happens when a number lies outside its bounds depends on
//! the field: resize scale is clamped, everything else is rejected.

use std::collections::HashMap;

use crate::codec::ImageKind;
use crate::types::{Operation, OpsError, Transform};

/// Treatment of a numeric value outside its declared bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutOfRange {
    /// Pull the value back to the nearest bound.
    Clamp,
    /// Fail with [`OpsError::InvalidParameter`].
    Reject,
}

/// Shape of a single parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    /// Any finite number within `[min, max]`.
    Number {
        /// Lower bound (inclusive).
        min: f64,
        /// Upper bound (inclusive).
        max: f64,
        /// Out-of-range policy.
        out_of_range: OutOfRange,
    },
    /// A whole number within `[min, max]`.
    Integer {
        /// Lower bound (inclusive).
        min: i64,
        /// Upper bound (inclusive).
        max: i64,
    },
    /// An odd whole number within `[min, max]`. Even values are rejected,
    /// never rounded.
    OddInteger {
        /// Lower bound (inclusive).
        min: i64,
        /// Upper bound (inclusive).
        max: i64,
    },
    /// One of a fixed set of whole numbers.
    OneOf(&'static [i64]),
    /// An accepted image format, named by file extension.
    Format,
}

/// A named parameter and its shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    /// Form field name.
    pub name: &'static str,
    /// Accepted values.
    pub kind: ParamKind,
}

/// A value that passed its [`ParamSpec`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    /// A number, already clamped where the field clamps.
    Number(f64),
    /// A target image format.
    Format(ImageKind),
}

impl ParamValue {
    /// The numeric value, or zero for a format.
    #[must_use]
    pub const fn number(self) -> f64 {
        match self {
            Self::Number(value) => value,
            Self::Format(_) => 0.0,
        }
    }

    /// The format, if this is one.
    #[must_use]
    pub const fn format(self) -> Option<ImageKind> {
        match self {
            Self::Format(format) => Some(format),
            Self::Number(_) => None,
        }
    }
}

/// Smallest and largest odd kernel accepted by blur and median denoise.
pub const MIN_KERNEL_SIZE: i64 = 1;
/// See [`MIN_KERNEL_SIZE`].
pub const MAX_KERNEL_SIZE: i64 = 31;

/// Sobel apertures.
pub const SOBEL_KERNEL_SIZES: &[i64] = &[1, 3, 5, 7];

const RESIZE: &[ParamSpec] = &[ParamSpec {
    name: "scale",
    kind: ParamKind::Number {
        min: 10.0,
        max: 200.0,
        out_of_range: OutOfRange::Clamp,
    },
}];

const ROTATE: &[ParamSpec] = &[ParamSpec {
    name: "angle",
    kind: ParamKind::Number {
        min: 0.0,
        max: 360.0,
        out_of_range: OutOfRange::Reject,
    },
}];

const BRIGHTNESS: &[ParamSpec] = &[ParamSpec {
    name: "brightness_value",
    kind: ParamKind::Integer {
        min: -100,
        max: 100,
    },
}];

const GAUSSIAN: &[ParamSpec] = &[ParamSpec {
    name: "gaussian_kernel",
    kind: ParamKind::OddInteger {
        min: MIN_KERNEL_SIZE,
        max: MAX_KERNEL_SIZE,
    },
}];

const MEDIAN: &[ParamSpec] = &[ParamSpec {
    name: "median_kernel",
    kind: ParamKind::OddInteger {
        min: MIN_KERNEL_SIZE,
        max: MAX_KERNEL_SIZE,
    },
}];

const SOBEL: &[ParamSpec] = &[ParamSpec {
    name: "sobel_ksize",
    kind: ParamKind::OneOf(SOBEL_KERNEL_SIZES),
}];

const SHARPEN: &[ParamSpec] = &[ParamSpec {
    name: "sharpen_strength",
    kind: ParamKind::Number {
        min: 0.5,
        max: 3.0,
        out_of_range: OutOfRange::Reject,
    },
}];

const CONVERT: &[ParamSpec] = &[ParamSpec {
    name: "format",
    kind: ParamKind::Format,
}];

impl Operation {
    /// The parameter table for this operation. Empty for operations that
    /// take no parameters.
    #[must_use]
    pub const fn schema(self) -> &'static [ParamSpec] {
        match self {
            Self::Resize => RESIZE,
            Self::Rotate => ROTATE,
            Self::HistogramEqualization | Self::Negative => &[],
            Self::Brightness => BRIGHTNESS,
            Self::GaussianBlur => GAUSSIAN,
            Self::MedianDenoise => MEDIAN,
            Self::SobelEdge => SOBEL,
            Self::Sharpen => SHARPEN,
            Self::Convert => CONVERT,
        }
    }
}

impl ParamSpec {
    /// Check a raw form value against this field and return the accepted
    /// (possibly clamped) value.
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::InvalidParameter`] naming this field when the
    /// value is missing, not an accepted format where one is required,
    /// not a finite number, not whole where a whole number is required,
    /// or outside its bounds under [`OutOfRange::Reject`].
    pub fn validate(&self, raw: Option<&str>) -> Result<ParamValue, OpsError> {
        let raw = raw.ok_or_else(|| self.invalid("missing value"))?;
        if matches!(self.kind, ParamKind::Format) {
            return ImageKind::from_extension(raw.trim())
                .map(ParamValue::Format)
                .ok_or_else(|| {
                    self.invalid(format!(
                        "`{raw}` is not one of png, jpg, jpeg, gif, bmp, webp"
                    ))
                });
        }
        self.validate_number(raw).map(ParamValue::Number)
    }

    fn validate_number(&self, raw: &str) -> Result<f64, OpsError> {
        let value: f64 = raw
            .trim()
            .parse()
            .map_err(|_| self.invalid(format!("`{raw}` is not a number")))?;
        if !value.is_finite() {
            return Err(self.invalid("must be a finite number"));
        }

        match self.kind {
            ParamKind::Number {
                min,
                max,
                out_of_range,
            } => {
                if (min..=max).contains(&value) {
                    Ok(value)
                } else {
                    match out_of_range {
                        OutOfRange::Clamp => Ok(value.clamp(min, max)),
                        OutOfRange::Reject => {
                            Err(self.invalid(format!("must be between {min} and {max}")))
                        }
                    }
                }
            }
            ParamKind::Integer { min, max } => {
                let whole = self.whole(value)?;
                self.within(whole, min, max)?;
                Ok(value)
            }
            ParamKind::OddInteger { min, max } => {
                let whole = self.whole(value)?;
                self.within(whole, min, max)?;
                if whole % 2 == 0 {
                    return Err(self.invalid(format!("must be odd, got {whole}")));
                }
                Ok(value)
            }
            ParamKind::OneOf(allowed) => {
                let whole = self.whole(value)?;
                if allowed.contains(&whole) {
                    Ok(value)
                } else {
                    Err(self.invalid(format!("must be one of {allowed:?}")))
                }
            }
            ParamKind::Format => Err(self.invalid("expected an image format")),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn whole(&self, value: f64) -> Result<i64, OpsError> {
        if value.fract() != 0.0 {
            return Err(self.invalid("must be a whole number"));
        }
        Ok(value as i64)
    }

    fn within(&self, value: i64, min: i64, max: i64) -> Result<(), OpsError> {
        if (min..=max).contains(&value) {
            Ok(())
        } else {
            Err(self.invalid(format!("must be between {min} and {max}")))
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> OpsError {
        OpsError::InvalidParameter {
            field: self.name,
            reason: reason.into(),
        }
    }
}

impl Transform {
    /// Validate a raw operation name and form fields into a [`Transform`].
    ///
    /// Fields not named by the operation's schema are ignored; the UI
    /// posts the value of every control regardless of which operation
    /// is selected.
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::UnknownOperation`] for a name outside the
    /// fixed set and [`OpsError::InvalidParameter`] for the first field
    /// that fails its spec.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn parse(operation: &str, params: &HashMap<String, String>) -> Result<Self, OpsError> {
        let operation: Operation = operation.trim().parse()?;
        let values = operation
            .schema()
            .iter()
            .map(|spec| spec.validate(params.get(spec.name).map(String::as_str)))
            .collect::<Result<Vec<ParamValue>, _>>()?;
        // Every schema has at most one entry.
        let param = values.first().copied();
        let value = param.map_or(0.0, ParamValue::number);

        Ok(match operation {
            Operation::Resize => Self::Resize {
                scale_percent: value,
            },
            Operation::Rotate => Self::Rotate {
                angle_degrees: value,
            },
            Operation::HistogramEqualization => Self::HistogramEqualization,
            Operation::Brightness => Self::Brightness {
                delta: value as i16,
            },
            Operation::Negative => Self::Negative,
            Operation::GaussianBlur => Self::GaussianBlur {
                kernel_size: value as u32,
            },
            Operation::MedianDenoise => Self::MedianDenoise {
                kernel_size: value as u32,
            },
            Operation::SobelEdge => Self::SobelEdge {
                kernel_size: value as u32,
            },
            Operation::Sharpen => Self::Sharpen {
                strength: value as f32,
            },
            Operation::Convert => Self::Convert {
                format: param.and_then(ParamValue::format).ok_or_else(|| {
                    OpsError::InvalidParameter {
                        field: "format",
                        reason: "missing value".into(),
                    }
                })?,
            },
        })
    }
}

//! Error type shared by the session layer.

use imagelab_ops::OpsError;

/// Errors surfaced by [`crate::ImageLab`] operations.
///
/// Variants line up with the classes a front end distinguishes:
/// rejected uploads, bad operation requests, an empty history, missing
/// sessions or files, and internal storage faults.
#[derive(Debug, thiserror::Error)]
pub enum LabError {
    /// The upload was rejected before anything was stored.
    #[error("invalid upload: {0}")]
    Validation(String),

    /// The upload is larger than the configured limit.
    #[error("upload exceeds the {limit} byte limit")]
    UploadTooLarge {
        /// Configured maximum, in bytes.
        limit: usize,
    },

    /// The requested operation name is not registered.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// A parameter is missing, malformed, or out of range.
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter {
        /// Parameter name.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// Undo was requested with nothing to undo.
    #[error("no operations to undo")]
    EmptyHistory,

    /// The session or file does not exist (or has expired).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Reading or writing the file store failed.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Decoding or encoding a stored image failed.
    #[error("image processing failed: {0}")]
    Image(OpsError),

    /// A session lock was poisoned by a panicking holder.
    #[error("session state is unavailable")]
    LockPoisoned,
}

impl From<OpsError> for LabError {
    fn from(err: OpsError) -> Self {
        match err {
            OpsError::UnknownOperation(name) => Self::UnknownOperation(name),
            OpsError::InvalidParameter { field, reason } => Self::InvalidParameter { field, reason },
            other => Self::Image(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_errors_keep_their_class() {
        let unknown = LabError::from(OpsError::UnknownOperation("warp".into()));
        assert!(matches!(unknown, LabError::UnknownOperation(ref n) if n == "warp"));

        let invalid = LabError::from(OpsError::InvalidParameter {
            field: "angle",
            reason: "must be at most 360".into(),
        });
        assert!(matches!(invalid, LabError::InvalidParameter { field: "angle", .. }));
        assert_eq!(
            invalid.to_string(),
            "invalid parameter `angle`: must be at most 360"
        );
    }

    #[test]
    fn codec_errors_become_image_errors() {
        assert!(matches!(
            LabError::from(OpsError::EmptyInput),
            LabError::Image(OpsError::EmptyInput)
        ));
    }
}

//! Runs one operation against a session's current image.
//!
//! Reads and decodes the current working file, applies the transform,
//! and stores the result as a new working file plus a JPEG preview.
//! Nothing is stored unless the whole chain succeeds.
//!
//! Results derived from an upload are stored as PNG. A `convert` result
//! is stored in its target format, and later results keep the format of
//! the working file they were made from.

use std::collections::HashMap;
use std::io;

use imagelab_ops::codec::{self, PREVIEW_JPEG_QUALITY};
use imagelab_ops::preview::{self, DEFAULT_PREVIEW_MAX_SIZE};
use imagelab_ops::{ImageKind, PreviewFilter, RgbImage, Transform};
use tracing::debug;

use crate::error::LabError;
use crate::file_store::{FileKind, FileName, FileStore};
use crate::session::ImageRef;

/// Default ceiling on the pixel count an operation may grow an image to.
pub const DEFAULT_MAX_OUTPUT_PIXELS: u64 = 50_000_000;

// RGB8 results under the default must fit the decoder's 512 MiB
// allocation limit.
const _: () = assert!(DEFAULT_MAX_OUTPUT_PIXELS * 3 < 512 * 1024 * 1024);

/// How previews are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewSettings {
    /// Longest preview side, in pixels.
    pub max_size: u32,
    /// Resampling filter used when shrinking.
    pub filter: PreviewFilter,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_PREVIEW_MAX_SIZE,
            filter: PreviewFilter::default(),
        }
    }
}

/// A stored operation result.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// The new working image and its preview.
    pub image: ImageRef,
    /// The validated transform that produced it.
    pub transform: Transform,
}

/// Applies operations and persists their results.
#[derive(Debug, Clone, Copy)]
pub struct Executor {
    preview: PreviewSettings,
    max_output_pixels: u64,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(PreviewSettings::default())
    }
}

impl Executor {
    /// An executor deriving previews with `preview` and the default
    /// output size limit.
    #[must_use]
    pub const fn new(preview: PreviewSettings) -> Self {
        Self {
            preview,
            max_output_pixels: DEFAULT_MAX_OUTPUT_PIXELS,
        }
    }

    /// Refuse operations whose result would exceed `max_output_pixels`
    /// and be larger than their input.
    #[must_use]
    pub const fn with_max_output_pixels(mut self, max_output_pixels: u64) -> Self {
        self.max_output_pixels = max_output_pixels;
        self
    }

    /// Validate `operation` with `params`, run it on `current` and store
    /// the result.
    ///
    /// Parameters are validated before any file is read, and the result
    /// size is checked before any pixels are produced.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::UnknownOperation`] or
    /// [`LabError::InvalidParameter`] for bad requests (including results
    /// over the output pixel limit),
    /// [`LabError::NotFound`] if the current file is missing, and
    /// storage or codec errors otherwise.
    pub fn apply(
        &self,
        files: &FileStore,
        current: &ImageRef,
        operation: &str,
        params: &HashMap<String, String>,
    ) -> Result<Applied, LabError> {
        let transform = Transform::parse(operation, params)?;
        let bytes = files.read(&current.image).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                LabError::NotFound("working image")
            } else {
                LabError::Storage(err)
            }
        })?;
        let input = codec::decode(&bytes)?;
        transform.check_output(input.width(), input.height(), self.max_output_pixels)?;
        let output = imagelab_ops::apply(&input, &transform);
        let format = transform
            .target_format()
            .unwrap_or_else(|| working_format(&current.image));
        debug!(
            operation = %transform.operation(),
            input = ?input.dimensions(),
            output = ?output.dimensions(),
            format = format.extension(),
            "applied operation"
        );
        let image = self.store(files, &output, format)?;
        Ok(Applied { image, transform })
    }

    /// Store `image` as a working file in `format`, with a preview.
    ///
    /// If the preview cannot be written the working file is removed
    /// again.
    ///
    /// # Errors
    ///
    /// Returns encode or storage errors.
    pub fn store(
        &self,
        files: &FileStore,
        image: &RgbImage,
        format: ImageKind,
    ) -> Result<ImageRef, LabError> {
        let encoded = codec::encode(image, format)?;
        let working = files.write(FileKind::Working, format, &encoded)?;
        match self.store_preview(files, image) {
            Ok(preview) => Ok(ImageRef {
                image: working,
                preview,
            }),
            Err(err) => {
                files.discard(&working);
                Err(err)
            }
        }
    }

    /// Store a bounded-size JPEG preview of `image`.
    ///
    /// # Errors
    ///
    /// Returns encode or storage errors.
    pub fn store_preview(&self, files: &FileStore, image: &RgbImage) -> Result<FileName, LabError> {
        let (small, _) = preview::preview(image, self.preview.max_size, self.preview.filter);
        let jpeg = codec::encode_jpeg(&small, PREVIEW_JPEG_QUALITY)?;
        Ok(files.write(FileKind::Preview, ImageKind::Jpeg, &jpeg)?)
    }
}

/// Format for results derived from `current`: uploads go to PNG,
/// working files keep theirs.
fn working_format(current: &FileName) -> ImageKind {
    match current.kind() {
        FileKind::Working => current.format(),
        FileKind::Original | FileKind::Preview => ImageKind::Png,
    }
}

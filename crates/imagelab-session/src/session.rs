//! Per-session edit history.
//!
//! A [`Session`] tracks the original upload, the current working image
//! and a stack of superseded images, each tagged with the operation that
//! replaced it. It only moves references around; callers own the files
//! and delete whatever a transition hands back.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LabError;
use crate::file_store::FileName;

/// Opaque, unguessable session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// A fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A full-resolution image paired with its preview.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ImageRef {
    /// The full-resolution file.
    pub image: FileName,
    /// The downscaled display copy.
    pub preview: FileName,
}

impl ImageRef {
    /// Both file names.
    #[must_use]
    pub const fn files(&self) -> [&FileName; 2] {
        [&self.image, &self.preview]
    }
}

/// A superseded image and the operation that superseded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// The image as it was before `operation` ran.
    pub image: ImageRef,
    /// Label of the operation that was applied to `image`.
    pub operation: String,
}

/// Outcome of a successful [`Session::undo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Undone {
    /// Label of the operation that was reverted.
    pub operation: String,
    /// The abandoned image, now unreferenced.
    pub discarded: Option<ImageRef>,
}

/// One user's editing state.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    original: ImageRef,
    current: ImageRef,
    history: Vec<HistoryEntry>,
    last_access: Instant,
}

impl Session {
    /// Start a session whose original and current image are `upload`.
    #[must_use]
    pub fn start(id: SessionId, upload: ImageRef, now: Instant) -> Self {
        Self {
            id,
            current: upload.clone(),
            original: upload,
            history: Vec::new(),
            last_access: now,
        }
    }

    /// The session's identifier.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// The upload the session started from.
    #[must_use]
    pub const fn original(&self) -> &ImageRef {
        &self.original
    }

    /// The latest result, or the original if nothing is applied.
    #[must_use]
    pub const fn current(&self) -> &ImageRef {
        &self.current
    }

    /// Superseded images, oldest first.
    #[must_use]
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Applied operation labels, oldest first.
    #[must_use]
    pub fn operations(&self) -> Vec<String> {
        self.history.iter().map(|e| e.operation.clone()).collect()
    }

    /// Whether there is an operation to undo.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    /// When the session was last used.
    #[must_use]
    pub const fn last_access(&self) -> Instant {
        self.last_access
    }

    /// Mark the session as used at `now`.
    pub const fn touch(&mut self, now: Instant) {
        self.last_access = now;
    }

    /// Make `next` the current image, pushing the old one with `operation`.
    pub fn record(&mut self, next: ImageRef, operation: String) {
        let previous = std::mem::replace(&mut self.current, next);
        self.history.push(HistoryEntry {
            image: previous,
            operation,
        });
    }

    /// Restore the image from before the last operation.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::EmptyHistory`] if nothing has been applied.
    pub fn undo(&mut self) -> Result<Undone, LabError> {
        let entry = self.history.pop().ok_or(LabError::EmptyHistory)?;
        let abandoned = std::mem::replace(&mut self.current, entry.image);
        Ok(Undone {
            operation: entry.operation,
            discarded: (abandoned != self.original).then_some(abandoned),
        })
    }

    /// Go back to the original upload and empty the history.
    ///
    /// Returns every image that is no longer referenced.
    pub fn reset(&mut self) -> Vec<ImageRef> {
        let current = std::mem::replace(&mut self.current, self.original.clone());
        let mut discarded: Vec<ImageRef> = self
            .history
            .drain(..)
            .map(|e| e.image)
            .chain(std::iter::once(current))
            .filter(|r| *r != self.original)
            .collect();
        discarded.dedup();
        discarded
    }

    /// Every distinct image this session references.
    #[must_use]
    pub fn images(&self) -> Vec<&ImageRef> {
        let mut refs = vec![&self.original];
        for r in self
            .history
            .iter()
            .map(|e| &e.image)
            .chain(std::iter::once(&self.current))
        {
            if !refs.contains(&r) {
                refs.push(r);
            }
        }
        refs
    }

    /// Whether `name` belongs to this session.
    #[must_use]
    pub fn owns(&self, name: &FileName) -> bool {
        self.images()
            .into_iter()
            .any(|r| r.files().contains(&name))
    }
}

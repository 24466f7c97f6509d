//! The editing sandbox: uploads, operations, undo, reset and clear over
//! a shared file store and session registry.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use imagelab_ops::{ImageKind, RgbImage, codec};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::LabError;
use crate::executor::{DEFAULT_MAX_OUTPUT_PIXELS, Executor, PreviewSettings};
use crate::file_store::{FileKind, FileName, FileStore};
use crate::session::{ImageRef, Session, SessionId};
use crate::store::SessionStore;

/// Default upload size limit: 16 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Default idle lifetime of a session.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// URL prefix under which stored images are served inline.
pub const FILES_ROUTE: &str = "/files";

/// URL prefix under which stored images are served as attachments.
pub const DOWNLOAD_ROUTE: &str = "/download";

/// Runtime settings for an [`ImageLab`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabSettings {
    /// Directory holding every stored image.
    pub storage_dir: PathBuf,
    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: usize,
    /// Preview derivation settings.
    pub preview: PreviewSettings,
    /// Largest image, in pixels, an operation may grow a result to.
    pub max_output_pixels: u64,
    /// Idle time after which a session expires.
    pub session_ttl: Duration,
}

impl Default for LabSettings {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("imagelab-data"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            preview: PreviewSettings::default(),
            max_output_pixels: DEFAULT_MAX_OUTPUT_PIXELS,
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }
}

/// URLs for one image and its preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageUrls {
    /// Full-resolution image, served inline.
    pub image_url: String,
    /// Downscaled JPEG preview.
    pub preview_url: String,
}

impl From<&ImageRef> for ImageUrls {
    fn from(image: &ImageRef) -> Self {
        Self {
            image_url: file_url(&image.image),
            preview_url: file_url(&image.preview),
        }
    }
}

/// What a front end needs to render a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    /// The upload as received.
    pub original: ImageUrls,
    /// The latest result.
    pub current: ImageUrls,
    /// Applied operation labels, oldest first.
    pub operations: Vec<String>,
    /// Whether undo would succeed.
    pub can_undo: bool,
    /// Attachment URL of the current full-resolution image.
    pub download_url: String,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            original: ImageUrls::from(session.original()),
            current: ImageUrls::from(session.current()),
            operations: session.operations(),
            can_undo: session.can_undo(),
            download_url: format!("{DOWNLOAD_ROUTE}/{}", session.current().image),
        }
    }
}

fn file_url(name: &FileName) -> String {
    format!("{FILES_ROUTE}/{name}")
}

/// A stored file that a session is allowed to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Location on disk.
    pub path: PathBuf,
    /// The validated name, also used as the download file name.
    pub name: FileName,
}

impl ResolvedFile {
    /// MIME type derived from the stored format.
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        self.name.format().mime_type()
    }
}

/// The image editing sandbox.
///
/// Every method is synchronous and may block on disk I/O and image
/// processing; async callers should run them on a blocking pool.
#[derive(Debug)]
pub struct ImageLab {
    files: FileStore,
    sessions: SessionStore,
    executor: Executor,
    max_upload_bytes: usize,
}

impl ImageLab {
    /// Open the sandbox, creating the storage directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::Storage`] if the directory cannot be created.
    pub fn open(settings: &LabSettings) -> Result<Self, LabError> {
        let files = FileStore::open(&settings.storage_dir)?;
        info!(
            storage = %settings.storage_dir.display(),
            max_upload_bytes = settings.max_upload_bytes,
            preview_max_size = settings.preview.max_size,
            preview_filter = %settings.preview.filter,
            max_output_pixels = settings.max_output_pixels,
            ttl_secs = settings.session_ttl.as_secs(),
            "image lab ready"
        );
        Ok(Self {
            files,
            sessions: SessionStore::new(settings.session_ttl),
            executor: Executor::new(settings.preview)
                .with_max_output_pixels(settings.max_output_pixels),
            max_upload_bytes: settings.max_upload_bytes,
        })
    }

    /// Start a new session from an uploaded file.
    ///
    /// The upload is validated first; a rejected upload leaves any
    /// `previous` session untouched. Otherwise `previous` is cleared,
    /// the bytes are stored unchanged as the original, and a preview is
    /// derived.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::Validation`] or [`LabError::UploadTooLarge`]
    /// for rejected uploads and storage errors otherwise.
    pub fn upload(
        &self,
        previous: Option<SessionId>,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<(SessionId, SessionView), LabError> {
        let (format, image) = self.validate_upload(file_name, bytes)?;

        if let Some(previous) = previous {
            match self.clear(previous) {
                Ok(()) | Err(LabError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }

        let original = self.files.write(FileKind::Original, format, bytes)?;
        let preview = match self.executor.store_preview(&self.files, &image) {
            Ok(preview) => preview,
            Err(err) => {
                self.files.discard(&original);
                return Err(err);
            }
        };

        let session = Session::start(
            SessionId::generate(),
            ImageRef {
                image: original,
                preview,
            },
            Instant::now(),
        );
        let id = session.id();
        let view = SessionView::from(&session);
        self.sessions.insert(session)?;
        info!(
            session = %id,
            format = format.extension(),
            width = image.width(),
            height = image.height(),
            "session started"
        );
        Ok((id, view))
    }

    fn validate_upload(&self, file_name: &str, bytes: &[u8]) -> Result<(ImageKind, RgbImage), LabError> {
        if file_name.is_empty() || bytes.is_empty() {
            return Err(LabError::Validation("no file provided".into()));
        }
        if bytes.len() > self.max_upload_bytes {
            return Err(LabError::UploadTooLarge {
                limit: self.max_upload_bytes,
            });
        }
        let extension = Path::new(file_name)
            .extension()
            .and_then(OsStr::to_str)
            .unwrap_or_default();
        if ImageKind::from_extension(extension).is_none() {
            return Err(LabError::Validation(format!(
                "unsupported file type `{file_name}`; expected one of png, jpg, jpeg, gif, bmp, webp"
            )));
        }
        let format = ImageKind::detect(bytes)
            .map_err(|_| LabError::Validation("file content is not a supported image".into()))?;
        let image = codec::decode(bytes)
            .map_err(|err| LabError::Validation(format!("image could not be decoded: {err}")))?;
        Ok((format, image))
    }

    /// Apply `operation` with `params` to the session's current image.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::NotFound`] for unknown or expired sessions,
    /// request errors for bad operations, and storage errors otherwise.
    /// The session is unchanged on any error.
    pub fn process(
        &self,
        id: SessionId,
        operation: &str,
        params: &HashMap<String, String>,
    ) -> Result<SessionView, LabError> {
        self.with_session(id, |session| {
            let applied = self
                .executor
                .apply(&self.files, session.current(), operation, params)?;
            let label = applied.transform.label();
            info!(session = %id, operation = %label, "operation applied");
            session.record(applied.image, label);
            Ok(SessionView::from(&*session))
        })
    }

    /// Revert the last operation.
    ///
    /// Returns the new view and the label of the reverted operation.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::EmptyHistory`] if nothing has been applied.
    pub fn undo(&self, id: SessionId) -> Result<(SessionView, String), LabError> {
        self.with_session(id, |session| {
            let undone = session.undo()?;
            if let Some(abandoned) = &undone.discarded {
                self.discard(abandoned);
            }
            info!(session = %id, operation = %undone.operation, "operation undone");
            Ok((SessionView::from(&*session), undone.operation))
        })
    }

    /// Return to the original upload, dropping every intermediate result.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::NotFound`] for unknown or expired sessions.
    pub fn reset(&self, id: SessionId) -> Result<SessionView, LabError> {
        self.with_session(id, |session| {
            let discarded = session.reset();
            for image in &discarded {
                self.discard(image);
            }
            info!(session = %id, discarded = discarded.len(), "session reset");
            Ok(SessionView::from(&*session))
        })
    }

    /// End the session and delete every file it references.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::NotFound`] if there is no such session.
    pub fn clear(&self, id: SessionId) -> Result<(), LabError> {
        let slot = self
            .sessions
            .remove(id)?
            .ok_or(LabError::NotFound("session"))?;
        let session = slot.lock().map_err(|_| LabError::LockPoisoned)?;
        self.discard_session(&session);
        info!(session = %id, "session cleared");
        Ok(())
    }

    /// Current view of a session.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::NotFound`] for unknown or expired sessions.
    pub fn view(&self, id: SessionId) -> Result<SessionView, LabError> {
        self.with_session(id, |session| Ok(SessionView::from(&*session)))
    }

    /// Resolve a requested file name to a path, if the session owns it.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::NotFound`] for malformed names, names owned by
    /// other sessions, and unknown or expired sessions.
    pub fn resolve_file(&self, id: SessionId, name: &str) -> Result<ResolvedFile, LabError> {
        let name = FileName::parse(name).ok_or(LabError::NotFound("file"))?;
        self.with_session(id, |session| {
            if !session.owns(&name) {
                return Err(LabError::NotFound("file"));
            }
            Ok(ResolvedFile {
                path: self.files.path(&name),
                name: name.clone(),
            })
        })
    }

    /// Remove sessions idle past the TTL and delete their files.
    ///
    /// Returns how many sessions were removed.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::LockPoisoned`] if the registry is poisoned.
    pub fn sweep_expired(&self) -> Result<usize, LabError> {
        let expired = self.sessions.sweep_expired(Instant::now())?;
        for session in &expired {
            debug!(session = %session.id(), "session expired");
            self.discard_session(session);
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "expired sessions removed");
        }
        Ok(expired.len())
    }

    /// Delete stored files older than `max_age` that no live session
    /// references, e.g. leftovers from a previous run.
    ///
    /// Returns how many files were removed.
    ///
    /// # Errors
    ///
    /// Returns storage errors if the directory cannot be listed.
    pub fn purge_stale_files(&self, max_age: Duration) -> Result<usize, LabError> {
        let keep = self.sessions.referenced_files()?;
        let removed = self.files.purge_older_than(max_age, &keep)?;
        if removed > 0 {
            info!(removed, "stale files purged");
        }
        Ok(removed)
    }

    /// Largest accepted upload, in bytes.
    #[must_use]
    pub const fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Number of live sessions.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::LockPoisoned`] if the registry is poisoned.
    pub fn session_count(&self) -> Result<usize, LabError> {
        self.sessions.len()
    }

    /// Run `f` on a live session under its lock, refreshing its idle
    /// timer.
    fn with_session<T>(
        &self,
        id: SessionId,
        f: impl FnOnce(&mut Session) -> Result<T, LabError>,
    ) -> Result<T, LabError> {
        let now = Instant::now();
        let slot = self.sessions.get(id)?;
        let mut session = slot.lock().map_err(|_| LabError::LockPoisoned)?;
        if self.sessions.is_expired(&session, now) {
            return Err(LabError::NotFound("session"));
        }
        session.touch(now);
        f(&mut *session)
    }

    fn discard(&self, image: &ImageRef) {
        for name in image.files() {
            self.files.discard(name);
        }
    }

    fn discard_session(&self, session: &Session) {
        for image in session.images() {
            self.discard(image);
        }
    }
}

//! imagelab-session: Per-user editing sessions over a shared file store.
//!
//! Ties the pure operations in `imagelab-ops` to disk: uploads are
//! validated and stored, every operation produces a new working file and
//! preview, and each session keeps an undo stack of superseded images.
//! All calls are synchronous; the HTTP layer runs them on a blocking
//! pool.

pub mod error;
pub mod executor;
pub mod file_store;
pub mod lab;
pub mod session;
pub mod store;

pub use error::LabError;
pub use executor::{Applied, Executor, PreviewSettings};
pub use file_store::{FileKind, FileName, FileStore};
pub use lab::{ImageLab, ImageUrls, LabSettings, ResolvedFile, SessionView};
pub use session::{HistoryEntry, ImageRef, Session, SessionId, Undone};
pub use store::SessionStore;

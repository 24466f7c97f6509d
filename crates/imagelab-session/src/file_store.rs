//! Flat on-disk storage for uploaded, working and preview images.
//!
//! Every stored file gets a server-generated name of the form
//! `{kind}-{32 hex digits}.{ext}`. Names are never derived from
//! user-supplied file names, and [`FileName::parse`] rejects anything
//! outside that grammar, so a name taken from a URL can be joined onto
//! the storage root without path traversal.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use imagelab_ops::ImageKind;
use serde::{Serialize, Serializer};
use tracing::{debug, warn};
use uuid::Uuid;

/// Role of a stored file, encoded as the name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// The bytes exactly as uploaded.
    Original,
    /// A full-resolution result of an operation.
    Working,
    /// A downscaled copy for display.
    Preview,
}

impl FileKind {
    const ALL: [Self; 3] = [Self::Original, Self::Working, Self::Preview];

    const fn prefix(self) -> &'static str {
        match self {
            Self::Original => "orig",
            Self::Working => "work",
            Self::Preview => "prev",
        }
    }
}

/// A validated, server-generated file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileName {
    name: String,
    kind: FileKind,
    format: ImageKind,
}

impl FileName {
    fn generate(kind: FileKind, format: ImageKind) -> Self {
        let name = format!(
            "{}-{}.{}",
            kind.prefix(),
            Uuid::new_v4().simple(),
            format.extension()
        );
        Self { name, kind, format }
    }

    /// Parse a name produced by this store.
    ///
    /// Returns `None` for anything else: unknown prefixes, non-hex
    /// tokens, unsupported extensions, separators, or `..`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let (stem, extension) = name.split_once('.')?;
        let (prefix, token) = stem.split_once('-')?;
        let kind = FileKind::ALL.into_iter().find(|k| k.prefix() == prefix)?;
        let format = ImageKind::from_extension(extension)?;
        // Only canonical lowercase extensions are ever generated.
        if extension != format.extension() {
            return None;
        }
        let token_ok = token.len() == 32
            && token
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        token_ok.then(|| Self {
            name: name.to_owned(),
            kind,
            format,
        })
    }

    /// The file name as stored on disk.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Role of the file.
    #[must_use]
    pub const fn kind(&self) -> FileKind {
        self.kind
    }

    /// Container format, from the extension.
    #[must_use]
    pub const fn format(&self) -> ImageKind {
        self.format
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Serialize for FileName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

/// A directory of stored images.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of `name` inside the store.
    #[must_use]
    pub fn path(&self, name: &FileName) -> PathBuf {
        self.root.join(name.as_str())
    }

    /// Write `bytes` under a fresh unique name.
    ///
    /// The file is created exclusively; a failed write removes whatever
    /// was partially written before returning the error.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from creating or writing the file.
    pub fn write(&self, kind: FileKind, format: ImageKind, bytes: &[u8]) -> io::Result<FileName> {
        let name = FileName::generate(kind, format);
        let path = self.path(&name);
        let result = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .and_then(|mut file| file.write_all(bytes));
        if let Err(err) = result {
            match fs::remove_file(&path) {
                Ok(()) => debug!(file = %name, "removed partial file"),
                Err(cleanup) if cleanup.kind() == io::ErrorKind::NotFound => {}
                Err(cleanup) => {
                    warn!(file = %name, error = %cleanup, "failed to remove partial file");
                }
            }
            return Err(err);
        }
        debug!(file = %name, bytes = bytes.len(), "stored file");
        Ok(name)
    }

    /// Read a stored file.
    ///
    /// # Errors
    ///
    /// Returns the I/O error, `NotFound` if the file is gone.
    pub fn read(&self, name: &FileName) -> io::Result<Vec<u8>> {
        fs::read(self.path(name))
    }

    /// Delete a stored file. Failures are logged, never returned.
    pub fn discard(&self, name: &FileName) {
        match fs::remove_file(self.path(name)) {
            Ok(()) => debug!(file = %name, "discarded file"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(file = %name, "file already gone");
            }
            Err(err) => warn!(file = %name, error = %err, "failed to discard file"),
        }
    }

    /// Delete store files last modified more than `max_age` ago, except
    /// those in `keep`. Entries that are not store file names are left
    /// alone.
    ///
    /// Returns how many files were removed.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the root directory cannot be listed.
    pub fn purge_older_than(&self, max_age: Duration, keep: &HashSet<FileName>) -> io::Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().and_then(FileName::parse) else {
                continue;
            };
            if keep.contains(&name) {
                continue;
            }
            let age = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok());
            if age.is_some_and(|age| age > max_age) {
                self.discard(&name);
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn generated_names_parse_back() {
        for kind in FileKind::ALL {
            for format in ImageKind::ALL {
                let name = FileName::generate(kind, format);
                let parsed = FileName::parse(name.as_str()).unwrap();
                assert_eq!(parsed, name);
                assert_eq!(parsed.kind(), kind);
                assert_eq!(parsed.format(), format);
            }
        }
    }

    #[test]
    fn generated_names_are_unique() {
        let a = FileName::generate(FileKind::Working, ImageKind::Png);
        let b = FileName::generate(FileKind::Working, ImageKind::Png);
        assert_ne!(a, b);
    }

    #[test]
    fn hostile_names_are_rejected() {
        for name in [
            "",
            "../etc/passwd",
            "work-0123456789abcdef0123456789abcdef.png/../x",
            "work-0123456789abcdef0123456789abcdef.exe",
            "work-0123456789ABCDEF0123456789ABCDEF.png",
            "work-0123456789abcdef.png",
            "evil-0123456789abcdef0123456789abcdef.png",
            "work-0123456789abcdef0123456789abcdef.PNG",
            "work-0123456789abcdef0123456789abcdef.jpeg",
        ] {
            assert!(FileName::parse(name).is_none(), "accepted {name:?}");
        }
        assert!(FileName::parse("work-0123456789abcdef0123456789abcdef.png").is_some());
    }

    #[test]
    fn write_read_discard() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("data")).unwrap();
        let name = store
            .write(FileKind::Original, ImageKind::Png, b"pixels")
            .unwrap();
        assert_eq!(store.read(&name).unwrap(), b"pixels");
        store.discard(&name);
        assert_eq!(
            store.read(&name).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
        // Discarding twice is harmless.
        store.discard(&name);
    }

    #[test]
    fn failed_write_leaves_no_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("data");
        let store = FileStore::open(&root).unwrap();
        fs::remove_dir(&root).unwrap();

        let err = store
            .write(FileKind::Working, ImageKind::Png, b"pixels")
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!root.exists());
    }

    #[test]
    fn purge_removes_only_old_unkept_store_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let kept = store.write(FileKind::Working, ImageKind::Png, b"a").unwrap();
        let stale = store.write(FileKind::Preview, ImageKind::Jpeg, b"b").unwrap();
        fs::write(dir.path().join("notes.txt"), b"not ours").unwrap();

        let keep: HashSet<FileName> = std::iter::once(kept.clone()).collect();
        std::thread::sleep(Duration::from_millis(20));
        let removed = store.purge_older_than(Duration::ZERO, &keep).unwrap();

        assert_eq!(removed, 1);
        assert!(store.read(&kept).is_ok());
        assert!(store.read(&stale).is_err());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn purge_keeps_young_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let name = store.write(FileKind::Working, ImageKind::Png, b"a").unwrap();
        let removed = store
            .purge_older_than(Duration::from_secs(3600), &HashSet::new())
            .unwrap();
        assert_eq!(removed, 0);
        assert!(store.read(&name).is_ok());
    }
}

//! Temporary working directory lifecycle
//!
//! A [`TempWorkdir`] is an outer, uniquely named directory holding a single
//! inner working directory. Closing it first moves the inner directory under
//! a fresh random path, so anything still holding the old path stops
//! resolving, and then deletes everything with the resolved deletion mode.

use crate::archive::{self, ArchiveFormat};
use crate::deletion::{self, ResolvedDeletion};
use crate::error::{ArchiveResult, DeletionResult, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Inner directory name for fresh directories
pub const DEFAULT_INNER_NAME: &str = "tmp";

/// Prefix of every outer directory
const OUTER_PREFIX: &str = "tmpdir-";

/// Random characters after [`OUTER_PREFIX`]
const OUTER_RAND_LEN: usize = 8;

/// A temporary directory that is deleted on [`close`](TempWorkdir::close) or drop
#[derive(Debug)]
pub struct TempWorkdir {
    base: PathBuf,
    outer: PathBuf,
    path: PathBuf,
    inner_name: String,
    deletion: ResolvedDeletion,
    closed: bool,
}

impl TempWorkdir {
    /// Create an empty working directory under the system temp directory.
    pub fn create(inner_name: Option<&str>, deletion: ResolvedDeletion) -> io::Result<Self> {
        Self::create_in(&std::env::temp_dir(), inner_name, deletion)
    }

    /// Create an empty working directory under `base`.
    pub fn create_in(
        base: &Path,
        inner_name: Option<&str>,
        deletion: ResolvedDeletion,
    ) -> io::Result<Self> {
        let inner_name = inner_name
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_INNER_NAME)
            .to_string();

        let outer = create_unique_dir(base)?;
        let path = outer.join(&inner_name);
        if let Err(e) = fs::create_dir(&path) {
            if let Err(cleanup) = fs::remove_dir_all(&outer) {
                warn!(path = %outer.display(), error = %cleanup, "Failed to remove directory");
            }
            return Err(e);
        }

        info!(path = %path.display(), deletion = %deletion, "Created temporary directory");

        Ok(Self {
            base: base.to_path_buf(),
            outer,
            path,
            inner_name,
            deletion,
            closed: false,
        })
    }

    /// Create a working directory under `base` and fill it from `archive`.
    ///
    /// The inner directory is named after the archive. When `format` is
    /// `None` it is sniffed, defaulting to plain tar. A failed extraction
    /// deletes the directory before returning the error.
    pub fn load_in(
        base: &Path,
        archive_path: &Path,
        format: Option<ArchiveFormat>,
        deletion: ResolvedDeletion,
    ) -> Result<Self> {
        let format =
            format.unwrap_or_else(|| ArchiveFormat::sniff(archive_path, ArchiveFormat::Tar));
        let inner_name = archive::archive_stem(archive_path);

        let mut workdir = Self::create_in(base, inner_name.as_deref(), deletion)?;
        if let Err(e) = archive::extract(archive_path, format, &workdir.path) {
            if let Err(close_err) = workdir.close() {
                warn!(error = %close_err, "Failed to clean up after extraction error");
            }
            return Err(e.into());
        }

        Ok(workdir)
    }

    /// [`load_in`](Self::load_in) under the system temp directory.
    pub fn load(
        archive_path: &Path,
        format: Option<ArchiveFormat>,
        deletion: ResolvedDeletion,
    ) -> Result<Self> {
        Self::load_in(&std::env::temp_dir(), archive_path, format, deletion)
    }

    /// Archive the directory's contents to `out`. When `format` is `None` it
    /// is sniffed from `out`, defaulting to gzip-compressed tar.
    pub fn dump(&self, out: &Path, format: Option<ArchiveFormat>) -> ArchiveResult<()> {
        let format = format.unwrap_or_else(|| ArchiveFormat::sniff(out, ArchiveFormat::TarGz));
        archive::create(out, format, &self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn inner_name(&self) -> &str {
        &self.inner_name
    }

    pub fn deletion(&self) -> &ResolvedDeletion {
        &self.deletion
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Move the directory out of the way and delete it. Idempotent.
    pub fn close(&mut self) -> DeletionResult<()> {
        if self.closed {
            return Ok(());
        }

        let holding = create_unique_dir(&self.base)?;
        if self.path.exists() {
            let moved = holding.join(deletion::random_name());
            if let Err(e) = fs::rename(&self.path, &moved) {
                if let Err(cleanup) = fs::remove_dir(&holding) {
                    warn!(path = %holding.display(), error = %cleanup, "Failed to remove directory");
                }
                return Err(e.into());
            }
            debug!(from = %self.path.display(), to = %moved.display(), "Moved directory aside");
            self.path = moved;
        } else {
            warn!(path = %self.path.display(), "Working directory vanished before teardown");
        }
        self.closed = true;

        // Try both so a failure on one does not leak the other.
        let first = self.deletion.delete(&holding);
        let second = self.deletion.delete(&self.outer);
        first.and(second)
    }
}

impl Drop for TempWorkdir {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.close() {
            warn!(error = %e, "Failed to close temporary directory");
            if self.outer.exists() {
                deletion::delete_logged(&self.deletion, &self.outer);
            }
        }
    }
}

/// Create a fresh, private (0700 on Unix) directory directly under `base`.
///
/// Ownership is taken from `tempfile` immediately; deletion is ours.
fn create_unique_dir(base: &Path) -> io::Result<PathBuf> {
    let dir = tempfile::Builder::new()
        .prefix(OUTER_PREFIX)
        .rand_bytes(OUTER_RAND_LEN)
        .tempdir_in(base)?;
    Ok(dir.keep())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn entries(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_create_layout() {
        let base = TempDir::new().unwrap();
        let workdir = TempWorkdir::create_in(base.path(), None, ResolvedDeletion::NotSecure).unwrap();

        assert!(workdir.path().is_dir());
        assert_eq!(workdir.inner_name(), DEFAULT_INNER_NAME);
        assert_eq!(workdir.path().file_name().unwrap(), DEFAULT_INNER_NAME);
        assert!(workdir
            .path()
            .parent()
            .unwrap()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(OUTER_PREFIX));
    }

    #[cfg(unix)]
    #[test]
    fn test_outer_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let base = TempDir::new().unwrap();
        let workdir = TempWorkdir::create_in(base.path(), None, ResolvedDeletion::NotSecure).unwrap();
        let outer = workdir.path().parent().unwrap();
        assert_eq!(fs::metadata(outer).unwrap().permissions().mode() & 0o777, 0o700);
    }

    #[test]
    fn test_unique_dirs_are_kept_and_distinct() {
        let base = TempDir::new().unwrap();
        let a = create_unique_dir(base.path()).unwrap();
        let b = create_unique_dir(base.path()).unwrap();

        assert_ne!(a, b);
        for dir in [&a, &b] {
            assert!(dir.is_dir());
            let name = dir.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with(OUTER_PREFIX));
            assert_eq!(name.len(), OUTER_PREFIX.len() + OUTER_RAND_LEN);
        }
        assert_eq!(entries(base.path()), 2);
    }

    #[test]
    fn test_close_removes_everything() {
        let base = TempDir::new().unwrap();
        let mut workdir =
            TempWorkdir::create_in(base.path(), Some("project"), ResolvedDeletion::NotSecure)
                .unwrap();
        let original = workdir.path().to_path_buf();
        fs::write(original.join("file.txt"), "data").unwrap();

        workdir.close().unwrap();

        assert!(workdir.is_closed());
        assert!(!original.exists());
        assert_ne!(workdir.path(), original.as_path());
        assert_eq!(entries(base.path()), 0);
    }

    #[test]
    fn test_close_is_idempotent() {
        let base = TempDir::new().unwrap();
        let mut workdir =
            TempWorkdir::create_in(base.path(), None, ResolvedDeletion::PseudoSecure).unwrap();
        workdir.close().unwrap();
        workdir.close().unwrap();
        assert_eq!(entries(base.path()), 0);
    }

    #[test]
    fn test_close_after_directory_vanished() {
        let base = TempDir::new().unwrap();
        let mut workdir =
            TempWorkdir::create_in(base.path(), None, ResolvedDeletion::NotSecure).unwrap();
        fs::remove_dir(workdir.path()).unwrap();

        workdir.close().unwrap();
        assert_eq!(entries(base.path()), 0);
    }

    #[test]
    fn test_drop_cleans_up() {
        let base = TempDir::new().unwrap();
        {
            let workdir =
                TempWorkdir::create_in(base.path(), None, ResolvedDeletion::NotSecure).unwrap();
            fs::write(workdir.path().join("x"), "y").unwrap();
        }
        assert_eq!(entries(base.path()), 0);
    }

    #[test]
    fn test_failed_load_cleans_up() {
        let base = TempDir::new().unwrap();
        let bogus = base.path().join("broken.zip");
        fs::write(&bogus, "not a zip").unwrap();

        let scratch = base.path().join("scratch");
        fs::create_dir(&scratch).unwrap();
        let result = TempWorkdir::load_in(&scratch, &bogus, None, ResolvedDeletion::NotSecure);

        assert!(result.is_err());
        assert_eq!(entries(&scratch), 0);
    }
}

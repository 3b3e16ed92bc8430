//! Deletion modes and teardown strategies
//!
//! A [`DeletionMode`] is what the user asked for. Before the working directory
//! is created it is resolved into a [`ResolvedDeletion`], which is what will
//! actually run at teardown:
//!
//! - `secure` requires the secure-remove utility and fails fast without it
//! - `attempt-secure` becomes `secure` when the utility exists, `pseudo-secure` otherwise
//! - `pseudo-secure` zeroes file contents, scrambles names, then removes everything
//! - `not-secure` is an ordinary recursive delete

use crate::error::{DeletionError, DeletionResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Size of each zero-fill write during pseudo-secure deletion
const OVERWRITE_CHUNK: usize = 1024;

/// Length of the random names used when scrambling paths
const RANDOM_NAME_LEN: usize = 8;

/// Requested deletion method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DeletionMode {
    /// Delete with the external secure-remove utility, failing if it is missing
    Secure,
    /// Overwrite file contents with zeros, rename, then delete
    PseudoSecure,
    /// Secure if possible, pseudo-secure otherwise
    AttemptSecure,
    /// Plain recursive delete
    NotSecure,
}

impl DeletionMode {
    pub const ALL: [DeletionMode; 4] = [
        DeletionMode::Secure,
        DeletionMode::PseudoSecure,
        DeletionMode::AttemptSecure,
        DeletionMode::NotSecure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionMode::Secure => "secure",
            DeletionMode::PseudoSecure => "pseudo-secure",
            DeletionMode::AttemptSecure => "attempt-secure",
            DeletionMode::NotSecure => "not-secure",
        }
    }

    /// Resolve into the strategy that will run at teardown.
    ///
    /// `locate` is only called for the modes that need the secure-remove
    /// utility, so `not-secure` and `pseudo-secure` never probe `PATH`.
    pub fn resolve<F>(self, locate: F) -> DeletionResult<ResolvedDeletion>
    where
        F: FnOnce() -> DeletionResult<SecureRemover>,
    {
        let resolved = match self {
            DeletionMode::Secure => ResolvedDeletion::Secure(locate()?),
            DeletionMode::AttemptSecure => match locate() {
                Ok(srm) => ResolvedDeletion::Secure(srm),
                Err(e) => {
                    info!(reason = %e, "Secure removal unavailable, falling back to pseudo-secure");
                    ResolvedDeletion::PseudoSecure
                }
            },
            DeletionMode::PseudoSecure => ResolvedDeletion::PseudoSecure,
            DeletionMode::NotSecure => ResolvedDeletion::NotSecure,
        };

        debug!(requested = %self, resolved = %resolved, "Resolved deletion mode");
        Ok(resolved)
    }
}

impl fmt::Display for DeletionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeletionMode {
    type Err = DeletionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeletionMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| DeletionError::UnknownMode(s.to_string()))
    }
}

/// The external secure-remove utility (`srm`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureRemover {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl SecureRemover {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Find `program` on `PATH` (or accept it as-is when it is a path).
    pub fn locate(program: &str, args: &[String]) -> DeletionResult<Self> {
        match which::which(program) {
            Ok(path) => {
                debug!(path = %path.display(), "Found secure remove utility");
                Ok(Self::new(path, args.to_vec()))
            }
            Err(_) => Err(DeletionError::SecureRemoveUnavailable {
                program: program.to_string(),
            }),
        }
    }

    /// Run `<program> <args> -- <path>`.
    pub fn remove(&self, path: &Path) -> DeletionResult<()> {
        let program = self.program.display().to_string();
        debug!(program = %program, path = %path.display(), "Running secure remove");

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg("--")
            .arg(path)
            .status()
            .map_err(|source| DeletionError::SecureRemoveSpawn {
                program: program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(DeletionError::SecureRemoveFailed {
                program,
                path: path.to_path_buf(),
                status: crate::command::status_code(status),
            })
        }
    }
}

/// Deletion strategy after probing for the secure-remove utility
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedDeletion {
    Secure(SecureRemover),
    PseudoSecure,
    NotSecure,
}

impl ResolvedDeletion {
    pub fn mode(&self) -> DeletionMode {
        match self {
            ResolvedDeletion::Secure(_) => DeletionMode::Secure,
            ResolvedDeletion::PseudoSecure => DeletionMode::PseudoSecure,
            ResolvedDeletion::NotSecure => DeletionMode::NotSecure,
        }
    }

    /// Delete `path` and everything below it.
    pub fn delete(&self, path: &Path) -> DeletionResult<()> {
        info!(path = %path.display(), mode = %self, "Deleting directory");
        match self {
            ResolvedDeletion::Secure(srm) => srm.remove(path),
            ResolvedDeletion::PseudoSecure => pseudo_secure_delete(path),
            ResolvedDeletion::NotSecure => Ok(fs::remove_dir_all(path)?),
        }
    }
}

impl fmt::Display for ResolvedDeletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mode().as_str())
    }
}

/// Zero every regular file, give every entry a random name, then delete
/// bottom-up. Symlinks are removed but never followed.
pub fn pseudo_secure_delete(path: &Path) -> DeletionResult<()> {
    let entries = walk_bottom_up(path)?;

    for (entry_path, is_file) in &entries {
        if *is_file {
            overwrite_with_zeros(entry_path)?;
        }
    }

    // Children come before their parents, so each rename happens while the
    // parent still has its original name.
    for (entry_path, is_file) in &entries {
        let Some(parent) = entry_path.parent() else {
            continue;
        };
        let mut name = random_name();
        if *is_file {
            name.push_str(".tmp");
        }
        fs::rename(entry_path, parent.join(name))?;
    }

    for entry in WalkDir::new(path).min_depth(1).contents_first(true) {
        let entry = entry.map_err(|e| DeletionError::Walk {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if entry.file_type().is_dir() {
            fs::remove_dir(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }

    fs::remove_dir(path)?;
    Ok(())
}

/// Every entry under `path` (excluding `path`), children first, tagged with
/// whether it is a regular file.
fn walk_bottom_up(path: &Path) -> DeletionResult<Vec<(PathBuf, bool)>> {
    WalkDir::new(path)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .map(|entry| {
            entry
                .map(|e| {
                    let is_file = e.file_type().is_file();
                    (e.into_path(), is_file)
                })
                .map_err(|e| DeletionError::Walk {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
        })
        .collect()
}

/// Overwrite the whole file with zero bytes, syncing after every chunk.
pub fn overwrite_with_zeros(path: &Path) -> DeletionResult<()> {
    let metadata = fs::metadata(path)?;
    let mut remaining = metadata.len();

    if metadata.permissions().readonly() {
        let mut permissions = metadata.permissions();
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
        fs::set_permissions(path, permissions)?;
    }

    let mut file = OpenOptions::new().write(true).open(path)?;
    let zeros = [0u8; OVERWRITE_CHUNK];

    while remaining > 0 {
        let n = remaining.min(OVERWRITE_CHUNK as u64) as usize;
        file.write_all(&zeros[..n])?;
        file.flush()?;
        file.sync_all()?;
        remaining -= n as u64;
    }

    if metadata.len() > 0 {
        debug!(path = %path.display(), bytes = metadata.len(), "Overwrote file");
    }
    Ok(())
}

/// Random alphanumeric name used for scrambling and holding directories
pub fn random_name() -> String {
    let mut name = uuid::Uuid::new_v4().simple().to_string();
    name.truncate(RANDOM_NAME_LEN);
    name
}

/// Best-effort delete used from `Drop`, where errors can only be logged.
pub(crate) fn delete_logged(deletion: &ResolvedDeletion, path: &Path) {
    if let Err(e) = deletion.delete(path) {
        warn!(path = %path.display(), error = %e, "Failed to delete directory");
    }
}

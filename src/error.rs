//! `tmpdir` Error Types
//!
//! Centralized error handling using thiserror for type-safe errors.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for `tmpdir`
#[derive(Error, Debug)]
pub enum TmpDirError {
    #[error("Deletion error: {0}")]
    Deletion(#[from] DeletionError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Directory teardown errors
#[derive(Error, Debug)]
pub enum DeletionError {
    #[error("Secure deletion requested but '{program}' was not found")]
    SecureRemoveUnavailable { program: String },

    #[error("'{program}' exited with status {status} while deleting '{path}'")]
    SecureRemoveFailed {
        program: String,
        path: PathBuf,
        status: i32,
    },

    #[error("Failed to run '{program}': {source}")]
    SecureRemoveSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown deletion mode '{0}'")]
    UnknownMode(String),

    #[error("Failed to walk '{path}': {reason}")]
    Walk { path: PathBuf, reason: String },

    #[error("Deletion I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Archive load/save errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Illegal (external) path in archive: {path}")]
    IllegalPath { path: PathBuf },

    #[error("Unknown archive format '{0}'")]
    UnknownFormat(String),

    #[error("Failed to open archive '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Failed to walk '{path}': {reason}")]
    Walk { path: PathBuf, reason: String },

    #[error("Archive I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Subcommand errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to parse command line '{0}'")]
    Parse(String),

    #[error("Command is empty")]
    Empty,

    #[error("Failed to spawn '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for input: {0}")]
    Prompt(#[source] std::io::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Failed to expand '{input}': {reason}")]
    Expand { input: String, reason: String },
}

/// Result type alias for `tmpdir` operations
pub type Result<T> = std::result::Result<T, TmpDirError>;

/// Result type alias for deletion operations
pub type DeletionResult<T> = std::result::Result<T, DeletionError>;

/// Result type alias for archive operations
pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;

/// Result type alias for command operations
pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// Result type alias for config operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

//! tmpdir Library
//!
//! This library provides the pieces behind the `tmpdir` command:
//! - Temporary working directory lifecycle (create, load, dump, close)
//! - Deletion modes, from plain removal to `srm`
//! - Archive load/save for tar, tgz, tbz2 and zip
//! - Running a command inside the directory under an error policy

pub mod archive;
pub mod cli;
pub mod command;
pub mod config;
pub mod deletion;
pub mod error;
pub mod logging;
pub mod policy;
pub mod session;
pub mod workdir;

pub use archive::ArchiveFormat;
pub use command::CommandSpec;
pub use config::AppConfig;
pub use deletion::{DeletionMode, ResolvedDeletion, SecureRemover};
pub use error::{Result, TmpDirError};
pub use policy::ErrorPolicy;
pub use session::{Session, SessionConfig, SessionOutcome};
pub use workdir::TempWorkdir;

//! Session pipeline
//!
//! One run of the tool: resolve the deletion mode, create (or load) the
//! directory, run the command, optionally save, then always tear down.

use crate::command::{CommandRunner, CommandSpec};
use crate::config::AppConfig;
use crate::deletion::{DeletionMode, SecureRemover};
use crate::error::{DeletionResult, Result};
use crate::policy::ErrorPolicy;
use crate::workdir::TempWorkdir;
use std::path::PathBuf;
use tracing::{info, warn};

const SEPARATOR: &str = "----------------";

/// Everything the user asked for, fixed once parsed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Archive to load into the directory
    pub archive: Option<PathBuf>,
    /// Archive to save the directory to afterwards
    pub out: Option<PathBuf>,
    pub command: CommandSpec,
    /// Requested deletion mode; `None` picks the default for the situation
    pub deletion: Option<DeletionMode>,
    pub on_error: ErrorPolicy,
}

impl SessionConfig {
    /// Explicit mode if given, else the loaded/fresh default from `defaults`.
    pub fn effective_deletion(&self, defaults: &crate::config::DeletionConfig) -> DeletionMode {
        self.deletion.unwrap_or(if self.archive.is_some() {
            defaults.default_loaded
        } else {
            defaults.default_fresh
        })
    }
}

/// Result of a completed session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Raw exit status of the subcommand
    pub status: i32,
    /// Exit code after applying the error policy
    pub exit_code: i32,
    /// Whether the output archive was written
    pub saved: bool,
    /// Deletion mode that actually ran
    pub deletion: DeletionMode,
}

pub struct Session {
    config: SessionConfig,
    settings: AppConfig,
}

impl Session {
    pub fn new(config: SessionConfig, settings: AppConfig) -> Self {
        Self { config, settings }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run the whole pipeline. Teardown happens even when loading succeeded
    /// but the command or the save step failed; that error is returned after
    /// the directory is gone.
    pub fn run(&self) -> Result<SessionOutcome> {
        let deletion_settings = &self.settings.deletion;
        let requested = self.config.effective_deletion(deletion_settings);
        let resolved = requested.resolve(|| {
            SecureRemover::locate(&deletion_settings.srm_program, &deletion_settings.srm_args)
        })?;

        let base = self.settings.general.base_dir();
        let created: Result<TempWorkdir> = match &self.config.archive {
            None => {
                eprint!("Initializing temporary directory... ");
                TempWorkdir::create_in(&base, None, resolved).map_err(Into::into)
            }
            Some(archive) => {
                eprint!("Loading archive to temporary directory... ");
                TempWorkdir::load_in(&base, archive, None, resolved)
            }
        };
        let mut workdir = match created {
            Ok(workdir) => workdir,
            Err(e) => {
                eprintln!();
                return Err(e);
            }
        };

        let deletion = workdir.deletion().mode();
        eprintln!("(deletion: {deletion})");
        println!("{}", workdir.path().display());

        let result = self.run_inside(&workdir);

        eprintln!("Deleting temporary directory... (deletion: {deletion})");
        let closed = workdir.close();

        let (status, saved) = finish(result, closed)?;

        let exit_code = self.config.on_error.exit_code(status);
        info!(status, exit_code, saved, deletion = %deletion, "Session finished");

        Ok(SessionOutcome {
            status,
            exit_code,
            saved,
            deletion,
        })
    }

    /// Command and save steps; returns the status and whether we saved.
    fn run_inside(&self, workdir: &TempWorkdir) -> Result<(i32, bool)> {
        let runner = CommandRunner::new(&self.settings.general);

        eprintln!("{SEPARATOR}");
        let status = runner.run(&self.config.command, workdir.path())?;
        eprintln!("{SEPARATOR}");

        let Some(out) = &self.config.out else {
            return Ok((status, false));
        };

        if !self.config.on_error.should_save(status) {
            warn!(status, out = %out.display(), "Command failed, not saving archive");
            eprintln!("Command exited with status {status}; not archiving.");
            return Ok((status, false));
        }

        eprintln!("Archiving directory contents...");
        workdir.dump(out, None)?;
        Ok((status, true))
    }
}

/// The step error wins; a teardown error alongside it is still reported.
fn finish<T>(result: Result<T>, closed: DeletionResult<()>) -> Result<T> {
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(teardown)) => Err(teardown.into()),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(teardown)) => {
            warn!(error = %teardown, "Teardown failed after an earlier error");
            eprintln!("error: {teardown}");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeletionConfig;
    use crate::error::{CommandError, DeletionError, TmpDirError};

    fn srm_failed() -> DeletionError {
        DeletionError::SecureRemoveFailed {
            program: "srm".to_string(),
            path: PathBuf::from("/tmp/x"),
            status: 1,
        }
    }

    #[test]
    fn test_finish_prefers_step_error() {
        let result: Result<i32> = Err(CommandError::Empty.into());
        assert!(matches!(
            finish(result, Err(srm_failed())),
            Err(TmpDirError::Command(CommandError::Empty))
        ));
    }

    #[test]
    fn test_finish_surfaces_teardown_error() {
        assert!(matches!(
            finish(Ok(0), Err(srm_failed())),
            Err(TmpDirError::Deletion(DeletionError::SecureRemoveFailed { .. }))
        ));
        assert_eq!(finish(Ok(5), Ok(())).unwrap(), 5);
    }

    #[test]
    fn test_default_deletion_for_fresh_directory() {
        let config = SessionConfig::default();
        assert_eq!(
            config.effective_deletion(&DeletionConfig::default()),
            DeletionMode::AttemptSecure
        );
    }

    #[test]
    fn test_default_deletion_after_load() {
        let config = SessionConfig {
            archive: Some(PathBuf::from("data.tgz")),
            ..Default::default()
        };
        assert_eq!(
            config.effective_deletion(&DeletionConfig::default()),
            DeletionMode::NotSecure
        );
    }

    #[test]
    fn test_explicit_deletion_wins() {
        let config = SessionConfig {
            archive: Some(PathBuf::from("data.tgz")),
            deletion: Some(DeletionMode::PseudoSecure),
            ..Default::default()
        };
        assert_eq!(
            config.effective_deletion(&DeletionConfig::default()),
            DeletionMode::PseudoSecure
        );
    }
}

//! Command-line interface

use crate::command::CommandSpec;
use crate::config::expand_path;
use crate::deletion::DeletionMode;
use crate::error::Result;
use crate::policy::ErrorPolicy;
use crate::session::SessionConfig;
use clap::Parser;
use std::path::PathBuf;

/// Creates a temporary directory, optionally loading the contents of an
/// archive (tar, tgz, tbz2 or zip). If run from a terminal, opens a bash login
/// shell inside the directory. Otherwise by default waits for a newline then
/// exits, but any other command can be specified.
///
/// If an empty directory is created, secure deletion is attempted
/// automatically. In other cases, use --delete.
#[derive(Debug, Parser)]
#[command(name = "tmpdir", version, about, long_about)]
pub struct Cli {
    /// Loads an archive into the directory
    #[arg(value_name = "$ARCHIVE")]
    pub archive: Option<String>,

    /// Saves directory as an archive
    #[arg(short, long, value_name = "$ARCHIVE")]
    pub out: Option<String>,

    /// Run this command in directory instead of default
    #[arg(short, long, value_name = "$COMMAND", conflicts_with = "shell")]
    pub command: Option<String>,

    /// As --command, but run in /bin/sh
    #[arg(short, long, value_name = "$COMMAND")]
    pub shell: Option<String>,

    /// Specifies the deletion method/security
    #[arg(short, long = "delete", value_enum, value_name = "$SECURITY")]
    pub delete: Option<DeletionMode>,

    /// What a failing command does to the exit code and the --out archive
    #[arg(
        short = 'r',
        long = "on-error",
        value_enum,
        value_name = "$ON_ERROR",
        default_value_t = ErrorPolicy::Fail
    )]
    pub on_error: ErrorPolicy,

    /// Read settings from this file instead of the user config
    #[arg(long, value_name = "$FILE")]
    pub config: Option<String>,
}

impl Cli {
    pub fn config_path(&self) -> Result<Option<PathBuf>> {
        Ok(self.config.as_deref().map(expand_path).transpose()?)
    }

    pub fn command_spec(&self) -> Result<CommandSpec> {
        Ok(match (&self.command, &self.shell) {
            (Some(line), _) => CommandSpec::from_command_line(line)?,
            (None, Some(script)) => CommandSpec::Shell(script.clone()),
            (None, None) => CommandSpec::Default,
        })
    }

    pub fn session_config(&self) -> Result<SessionConfig> {
        Ok(SessionConfig {
            archive: self.archive.as_deref().map(expand_path).transpose()?,
            out: self.out.as_deref().map(expand_path).transpose()?,
            command: self.command_spec()?,
            deletion: self.delete,
            on_error: self.on_error,
        })
    }
}

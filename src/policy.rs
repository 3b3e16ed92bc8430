//! Error policy for the subcommand's exit status

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a nonzero subcommand status affects the session
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Exit 0 regardless of the subcommand's status
    Ignore,
    /// Exit with the subcommand's status
    #[default]
    Fail,
    /// Like `fail`, and skip saving the archive when the status is nonzero
    Abort,
}

impl ErrorPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorPolicy::Ignore => "ignore",
            ErrorPolicy::Fail => "fail",
            ErrorPolicy::Abort => "abort",
        }
    }

    /// Whether the archive-save step should run after `status`
    pub fn should_save(self, status: i32) -> bool {
        !(self == ErrorPolicy::Abort && status != 0)
    }

    /// Process exit code contributed by the subcommand
    pub fn exit_code(self, status: i32) -> i32 {
        match self {
            ErrorPolicy::Ignore => 0,
            ErrorPolicy::Fail | ErrorPolicy::Abort => status,
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

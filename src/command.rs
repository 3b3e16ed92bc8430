//! Subcommand execution
//!
//! Runs the user's command (or an interactive shell) with its working
//! directory set to the temporary directory and reports the exit status.

use crate::config::GeneralConfig;
use crate::error::{CommandError, CommandResult};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;
use std::process::{Command, ExitStatus};
use tracing::{debug, info};

/// What to run inside the directory
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CommandSpec {
    /// Interactive login shell on a terminal, otherwise wait for enter
    #[default]
    Default,
    /// Program and arguments, already split
    Argv(Vec<String>),
    /// Script passed to the POSIX shell with `-c`
    Shell(String),
}

impl CommandSpec {
    /// Split a command line with POSIX shell-word rules.
    pub fn from_command_line(line: &str) -> CommandResult<Self> {
        let argv = shlex::split(line).ok_or_else(|| CommandError::Parse(line.to_string()))?;
        if argv.is_empty() {
            return Err(CommandError::Empty);
        }
        Ok(CommandSpec::Argv(argv))
    }
}

/// Concrete action chosen for a [`CommandSpec`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Spawn(Vec<String>),
    /// Print the prompt and wait for a line on stdin
    Prompt(String),
}

/// Runs subcommands with the configured shells
#[derive(Debug, Clone)]
pub struct CommandRunner {
    shell: String,
    shell_args: Vec<String>,
    script_shell: String,
    clear_histfile: bool,
    prompt: String,
}

impl CommandRunner {
    pub fn new(config: &GeneralConfig) -> Self {
        Self {
            shell: config.shell.clone(),
            shell_args: config.shell_args.clone(),
            script_shell: config.script_shell.clone(),
            clear_histfile: config.clear_histfile,
            prompt: config.prompt.clone(),
        }
    }

    /// Decide what to run. Only [`CommandSpec::Default`] depends on whether
    /// stdin is a terminal.
    pub fn invocation(&self, spec: &CommandSpec, interactive: bool) -> Invocation {
        match spec {
            CommandSpec::Default if interactive => {
                let mut argv = vec![self.shell.clone()];
                argv.extend(self.shell_args.iter().cloned());
                Invocation::Spawn(argv)
            }
            CommandSpec::Default => Invocation::Prompt(self.prompt.clone()),
            CommandSpec::Argv(argv) => Invocation::Spawn(argv.clone()),
            CommandSpec::Shell(script) => Invocation::Spawn(vec![
                self.script_shell.clone(),
                "-c".to_string(),
                script.clone(),
            ]),
        }
    }

    /// Run `spec` in `cwd` and return its exit status.
    pub fn run(&self, spec: &CommandSpec, cwd: &Path) -> CommandResult<i32> {
        let interactive = io::stdin().is_terminal();

        match self.invocation(spec, interactive) {
            Invocation::Prompt(prompt) => {
                eprint!("{prompt}");
                io::stderr().flush().map_err(CommandError::Prompt)?;
                let mut line = String::new();
                io::stdin()
                    .lock()
                    .read_line(&mut line)
                    .map_err(CommandError::Prompt)?;
                Ok(0)
            }
            Invocation::Spawn(argv) => self.spawn(&argv, cwd),
        }
    }

    fn spawn(&self, argv: &[String], cwd: &Path) -> CommandResult<i32> {
        let (program, args) = argv.split_first().ok_or(CommandError::Empty)?;
        info!(program = %program, args = ?args, cwd = %cwd.display(), "Running command");

        let mut command = Command::new(program);
        command.args(args).current_dir(cwd);
        if self.clear_histfile {
            command.env("HISTFILE", "");
        }

        let status = command
            .status()
            .map_err(|source| CommandError::SpawnFailed {
                program: program.clone(),
                source,
            })?;

        let code = status_code(status);
        debug!(program = %program, status = code, "Command finished");
        Ok(code)
    }
}

/// Exit status as an integer; a signal death becomes `128 + signal`.
pub fn status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

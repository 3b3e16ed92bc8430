//! tmpdir - run a command inside a throwaway directory
//!
//! Optionally loads the directory from an archive first and saves it to
//! another archive afterwards, then deletes it with the chosen security.

use clap::Parser;
use std::process::ExitCode;
use tmpdir::cli::Cli;
use tmpdir::{logging, AppConfig, Session};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            tracing::error!(error = %err, "tmpdir failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> tmpdir::Result<i32> {
    let config_path = cli.config_path()?;
    let settings = AppConfig::load(config_path.as_deref())?;
    logging::init_logging(&settings.logging);

    let session_config = cli.session_config()?;
    tracing::debug!(?session_config, "Parsed session");

    let outcome = Session::new(session_config, settings).run()?;
    Ok(outcome.exit_code)
}

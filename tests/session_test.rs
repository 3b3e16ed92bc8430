//! Integration tests for the full session pipeline
//!
//! Each test points the session at its own base directory so we can check
//! that nothing is left behind after teardown.

#![cfg(unix)]

use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tmpdir::error::{CommandError, DeletionError, TmpDirError};
use tmpdir::{AppConfig, CommandSpec, DeletionMode, ErrorPolicy, Session, SessionConfig};

struct Fixture {
    base: TempDir,
    outputs: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            base: TempDir::new().unwrap(),
            outputs: TempDir::new().unwrap(),
        }
    }

    fn settings(&self) -> AppConfig {
        let mut settings = AppConfig::default();
        settings.general.base_dir = Some(self.base.path().to_path_buf());
        settings.deletion.srm_program = "tmpdir-test-no-such-srm".to_string();
        settings
    }

    fn output(&self, name: &str) -> PathBuf {
        self.outputs.path().join(name)
    }

    fn assert_clean(&self) {
        let leftovers: Vec<_> = fs::read_dir(self.base.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert!(leftovers.is_empty(), "left behind: {leftovers:?}");
    }
}

fn shell(script: &str) -> CommandSpec {
    CommandSpec::Shell(script.to_string())
}

fn read_archive_file(archive: &Path, relative: &str) -> String {
    let scratch = TempDir::new().unwrap();
    let loaded = tmpdir::TempWorkdir::load_in(
        scratch.path(),
        archive,
        None,
        tmpdir::ResolvedDeletion::NotSecure,
    )
    .unwrap();
    fs::read_to_string(loaded.path().join(relative)).unwrap()
}

#[test]
fn test_fresh_session_saves_output() {
    let fixture = Fixture::new();
    let out = fixture.output("result.tgz");

    let config = SessionConfig {
        out: Some(out.clone()),
        command: shell("echo built > artifact.txt"),
        deletion: Some(DeletionMode::NotSecure),
        ..Default::default()
    };
    let outcome = Session::new(config, fixture.settings()).run().unwrap();

    assert_eq!(outcome.status, 0);
    assert_eq!(outcome.exit_code, 0);
    assert!(outcome.saved);
    assert_eq!(read_archive_file(&out, "artifact.txt"), "built\n");
    fixture.assert_clean();
}

#[test]
fn test_abort_skips_save_on_failure() {
    let fixture = Fixture::new();
    let out = fixture.output("result.tgz");

    let config = SessionConfig {
        out: Some(out.clone()),
        command: shell("touch partial.txt; exit 3"),
        deletion: Some(DeletionMode::NotSecure),
        on_error: ErrorPolicy::Abort,
        ..Default::default()
    };
    let outcome = Session::new(config, fixture.settings()).run().unwrap();

    assert_eq!(outcome.status, 3);
    assert_eq!(outcome.exit_code, 3);
    assert!(!outcome.saved);
    assert!(!out.exists());
    fixture.assert_clean();
}

#[test]
fn test_abort_saves_on_success() {
    let fixture = Fixture::new();
    let out = fixture.output("result.zip");

    let config = SessionConfig {
        out: Some(out.clone()),
        command: shell("echo ok > done.txt"),
        deletion: Some(DeletionMode::NotSecure),
        on_error: ErrorPolicy::Abort,
        ..Default::default()
    };
    let outcome = Session::new(config, fixture.settings()).run().unwrap();

    assert!(outcome.saved);
    assert_eq!(read_archive_file(&out, "done.txt"), "ok\n");
}

#[test]
fn test_fail_saves_and_propagates_status() {
    let fixture = Fixture::new();
    let out = fixture.output("result.tar");

    let config = SessionConfig {
        out: Some(out.clone()),
        command: shell("echo partial > log.txt; exit 4"),
        deletion: Some(DeletionMode::NotSecure),
        on_error: ErrorPolicy::Fail,
        ..Default::default()
    };
    let outcome = Session::new(config, fixture.settings()).run().unwrap();

    assert_eq!(outcome.exit_code, 4);
    assert!(outcome.saved);
    assert_eq!(read_archive_file(&out, "log.txt"), "partial\n");
    fixture.assert_clean();
}

#[test]
fn test_ignore_saves_and_discards_status() {
    let fixture = Fixture::new();
    let out = fixture.output("result.tbz2");

    let config = SessionConfig {
        out: Some(out.clone()),
        command: shell("exit 9"),
        deletion: Some(DeletionMode::NotSecure),
        on_error: ErrorPolicy::Ignore,
        ..Default::default()
    };
    let outcome = Session::new(config, fixture.settings()).run().unwrap();

    assert_eq!(outcome.status, 9);
    assert_eq!(outcome.exit_code, 0);
    assert!(outcome.saved);
    assert!(out.is_file());
}

#[test]
fn test_load_modify_save() {
    let fixture = Fixture::new();

    // Build the input archive with a first session
    let input = fixture.output("input.tgz");
    let config = SessionConfig {
        out: Some(input.clone()),
        command: shell("mkdir docs && echo v1 > docs/version.txt"),
        deletion: Some(DeletionMode::NotSecure),
        ..Default::default()
    };
    Session::new(config, fixture.settings()).run().unwrap();

    let output = fixture.output("output.zip");
    let config = SessionConfig {
        archive: Some(input),
        out: Some(output.clone()),
        command: CommandSpec::from_command_line("sh -c 'test \"$(cat docs/version.txt)\" = v1 && echo v2 > docs/version.txt'").unwrap(),
        ..Default::default()
    };
    let outcome = Session::new(config, fixture.settings()).run().unwrap();

    assert_eq!(outcome.status, 0);
    assert_eq!(outcome.deletion, DeletionMode::NotSecure);
    assert_eq!(read_archive_file(&output, "docs/version.txt"), "v2\n");
    fixture.assert_clean();
}

#[test]
fn test_secure_without_srm_fails_before_creating_anything() {
    let fixture = Fixture::new();

    let config = SessionConfig {
        command: shell("true"),
        deletion: Some(DeletionMode::Secure),
        ..Default::default()
    };
    let result = Session::new(config, fixture.settings()).run();

    assert!(matches!(
        result,
        Err(TmpDirError::Deletion(DeletionError::SecureRemoveUnavailable { .. }))
    ));
    fixture.assert_clean();
}

#[test]
fn test_fresh_default_attempts_secure_then_falls_back() {
    let fixture = Fixture::new();

    let config = SessionConfig {
        command: shell("echo secret > key.txt"),
        ..Default::default()
    };
    let outcome = Session::new(config, fixture.settings()).run().unwrap();

    assert_eq!(outcome.deletion, DeletionMode::PseudoSecure);
    fixture.assert_clean();
}

/// Write an executable `srm` stand-in that logs its arguments to
/// `calls.log` and then runs `body`.
fn fake_srm(tools: &Path, body: &str) -> (PathBuf, PathBuf) {
    use std::os::unix::fs::PermissionsExt;

    let srm = tools.join("fake-srm");
    let calls = tools.join("calls.log");
    fs::write(
        &srm,
        format!("#!/bin/sh\necho \"$@\" >> '{}'\n{body}\n", calls.display()),
    )
    .unwrap();
    fs::set_permissions(&srm, fs::Permissions::from_mode(0o755)).unwrap();
    (srm, calls)
}

#[test]
fn test_secure_uses_srm() {
    let fixture = Fixture::new();
    let tools = TempDir::new().unwrap();
    let (srm, calls) = fake_srm(tools.path(), "for last; do :; done\nrm -rf -- \"$last\"");

    let mut settings = fixture.settings();
    settings.deletion.srm_program = srm.display().to_string();

    let config = SessionConfig {
        command: shell("echo secret > key.txt"),
        deletion: Some(DeletionMode::Secure),
        ..Default::default()
    };
    let outcome = Session::new(config, settings).run().unwrap();

    assert_eq!(outcome.deletion, DeletionMode::Secure);
    let log = fs::read_to_string(&calls).unwrap();
    assert_eq!(log.lines().count(), 2);
    assert!(log.lines().all(|line| line.starts_with("-rfs -- ")));
    fixture.assert_clean();
}

#[test]
fn test_spawn_failure_still_tears_down() {
    let fixture = Fixture::new();

    let config = SessionConfig {
        command: CommandSpec::Argv(vec!["tmpdir-test-no-such-program".to_string()]),
        deletion: Some(DeletionMode::NotSecure),
        ..Default::default()
    };
    let result = Session::new(config, fixture.settings()).run();

    assert!(matches!(
        result,
        Err(TmpDirError::Command(CommandError::SpawnFailed { .. }))
    ));
    fixture.assert_clean();
}

#[test]
fn test_missing_input_archive_is_an_error() {
    let fixture = Fixture::new();

    let config = SessionConfig {
        archive: Some(fixture.output("missing.tgz")),
        command: shell("true"),
        ..Default::default()
    };
    let result = Session::new(config, fixture.settings()).run();

    assert!(matches!(result, Err(TmpDirError::Archive(_))));
    fixture.assert_clean();
}

#[test]
fn test_command_error_wins_over_failed_teardown() {
    let fixture = Fixture::new();
    let tools = TempDir::new().unwrap();
    let (srm, calls) = fake_srm(tools.path(), "exit 2");

    let mut settings = fixture.settings();
    settings.deletion.srm_program = srm.display().to_string();

    let config = SessionConfig {
        command: CommandSpec::Argv(vec!["tmpdir-test-no-such-program".to_string()]),
        deletion: Some(DeletionMode::Secure),
        ..Default::default()
    };
    let result = Session::new(config, settings).run();

    assert!(matches!(
        result,
        Err(TmpDirError::Command(CommandError::SpawnFailed { .. }))
    ));
    // Both directories were still handed to srm
    let log = fs::read_to_string(&calls).unwrap();
    assert_eq!(log.lines().count(), 2);
}

#[test]
fn test_failed_teardown_is_an_error() {
    let fixture = Fixture::new();
    let tools = TempDir::new().unwrap();
    let (srm, _calls) = fake_srm(tools.path(), "exit 2");

    let mut settings = fixture.settings();
    settings.deletion.srm_program = srm.display().to_string();

    let config = SessionConfig {
        command: shell("true"),
        deletion: Some(DeletionMode::Secure),
        ..Default::default()
    };
    let result = Session::new(config, settings).run();

    assert!(matches!(
        result,
        Err(TmpDirError::Deletion(DeletionError::SecureRemoveFailed { status: 2, .. }))
    ));
}

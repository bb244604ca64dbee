mod common;

use std::io::Cursor;
use std::path::Path;

use backhaul::cleanup::{LockState, acquire_lockfile, lock_state, note_lock_contention};
use backhaul::cli::Command;
use backhaul::config::ConfigFile;
use backhaul::control::execute;
use backhaul::errors::BackhaulError;
use backhaul::types::ExitCode;
use backhaul_test_utils::builders::{ConfigFileBuilder, PhaseBuilder};

fn config(lock: Option<&Path>) -> ConfigFile {
    let mut builder = ConfigFileBuilder::new().with_phase(PhaseBuilder::new("p").cmd(&["true"]).build());
    if let Some(lock) = lock {
        builder = builder.with_lockfile(lock);
    }
    builder.build()
}

/// Run `command` with `input` as the operator's answers; returns the exit
/// code and everything printed.
fn run(command: Command, cfg: &ConfigFile, input: &str) -> (i32, String) {
    let mut out = Vec::new();
    let code = execute(&command, cfg, &mut Cursor::new(input), &mut out).unwrap();
    (code, String::from_utf8(out).unwrap())
}

#[test]
fn status_reports_each_lock_state() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let lock = dir.path().join("backhaul.lock");
    let cfg = config(Some(&lock));

    let (code, text) = run(Command::Status, &cfg, "");
    assert_eq!(code, ExitCode::OK);
    assert!(text.contains("No lock held"), "{text}");

    acquire_lockfile(&lock).unwrap();
    note_lock_contention(&lock);
    let (_, text) = run(Command::Status, &cfg, "");
    assert!(text.contains("Lock held"), "{text}");
    assert!(text.contains("prevented a new run"), "{text}");

    run(Command::Stop, &cfg, "");
    let (_, text) = run(Command::Status, &cfg, "");
    assert!(text.contains("disabled"), "{text}");
}

#[test]
fn status_without_lockfile_is_not_an_error() {
    let (code, text) = run(Command::Status, &config(None), "");
    assert_eq!(code, ExitCode::OK);
    assert!(text.contains("No lockfile configured"), "{text}");
}

#[test]
fn unlock_asks_before_removing() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let lock = dir.path().join("backhaul.lock");
    let cfg = config(Some(&lock));
    acquire_lockfile(&lock).unwrap();

    let (code, text) = run(Command::Unlock { yes: false }, &cfg, "n\n");
    assert_eq!(code, ExitCode::OK);
    assert!(text.contains("Continue (y/n)?"), "{text}");
    assert!(text.contains("Exiting."), "{text}");
    assert!(lock.exists());

    let (_, text) = run(Command::Unlock { yes: false }, &cfg, "y\n");
    assert!(text.contains("has been removed"), "{text}");
    assert_eq!(lock_state(&lock), LockState::Free);
}

#[test]
fn unlock_with_yes_skips_the_question() {
    let dir = tempfile::tempdir().unwrap();
    let lock = dir.path().join("backhaul.lock");
    let cfg = config(Some(&lock));
    acquire_lockfile(&lock).unwrap();

    let (_, text) = run(Command::Unlock { yes: true }, &cfg, "");
    assert!(!text.contains("Continue"), "{text}");
    assert!(!lock.exists());

    // Nothing left to remove.
    let err = execute(&Command::Unlock { yes: true }, &cfg, &mut Cursor::new(""), &mut Vec::new()).unwrap_err();
    assert!(matches!(err, BackhaulError::Control(msg) if msg.contains("already been removed")));
}

#[test]
fn stop_then_start_leaves_the_lock_for_unlock() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let lock = dir.path().join("backhaul.lock");
    let cfg = config(Some(&lock));

    let (_, text) = run(Command::Stop, &cfg, "");
    assert!(text.contains("Runs have been disabled"), "{text}");
    assert!(!text.contains("in progress"), "{text}");
    assert_eq!(lock_state(&lock), LockState::Disabled);

    let err = execute(&Command::Stop, &cfg, &mut Cursor::new(""), &mut Vec::new()).unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::STARTUP);

    let (_, text) = run(Command::Start, &cfg, "");
    assert!(text.contains("re-enabled"), "{text}");
    assert!(matches!(lock_state(&lock), LockState::Held { .. }));

    run(Command::Unlock { yes: true }, &cfg, "");
    assert_eq!(lock_state(&lock), LockState::Free);
}

#[test]
fn stop_during_a_run_says_so() {
    let dir = tempfile::tempdir().unwrap();
    let lock = dir.path().join("backhaul.lock");
    let cfg = config(Some(&lock));
    acquire_lockfile(&lock).unwrap();

    let (_, text) = run(Command::Stop, &cfg, "");
    assert!(text.contains("probably in progress"), "{text}");
}

#[test]
fn lock_commands_need_a_lockfile() {
    let cfg = config(None);
    for command in [Command::Unlock { yes: true }, Command::Stop, Command::Start] {
        let err = execute(&command, &cfg, &mut Cursor::new(""), &mut Vec::new()).unwrap_err();
        assert!(matches!(&err, BackhaulError::Control(msg) if msg.contains("lockfile")), "{command:?}: {err}");
    }
}

#[test]
fn run_is_not_an_operator_command() {
    let err = execute(&Command::Run, &config(None), &mut Cursor::new(""), &mut Vec::new()).unwrap_err();
    assert!(matches!(err, BackhaulError::Control(_)));
}

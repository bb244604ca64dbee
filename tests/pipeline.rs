mod common;

use std::future::pending;
use std::time::Duration;

use tokio::net::TcpListener;

use backhaul::alert::AlertChannel;
use backhaul::cleanup::{DISABLED_MARKER, LockState, disable_runs, lock_state};
use backhaul::config::ConfigFile;
use backhaul::engine::{PhaseOutcome, Runtime, ShutdownSignal, run_phases};
use backhaul::supervisor::{Supervisor, SupervisorOptions};
use backhaul::types::{EscalationPolicy, ExitCode};
use backhaul_test_utils::builders::{ConfigFileBuilder, PhaseBuilder, tunnel};
use backhaul_test_utils::fakes::{FakeBehavior, FakeLauncher, RecordingAlerter};

/// A port something is listening on, so the tunnel probe succeeds.
async fn open_port() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// A port nothing is listening on.
async fn closed_port() -> u16 {
    let (listener, port) = open_port().await;
    drop(listener);
    port
}

fn runtime(cfg: ConfigFile) -> (Runtime<FakeLauncher, RecordingAlerter>, FakeLauncher, RecordingAlerter) {
    common::init_tracing();
    let launcher = FakeLauncher::new();
    let alerter = RecordingAlerter::new();
    let options = SupervisorOptions {
        poll_interval: Duration::from_millis(50),
        ..SupervisorOptions::from_config(&cfg.config)
    };
    let supervisor = Supervisor::new(launcher.clone(), alerter.clone(), options);
    (Runtime::new(cfg, supervisor), launcher, alerter)
}

#[tokio::test]
async fn phases_run_in_order_and_tear_down() {
    let (_listener, port) = open_port().await;
    let cfg = ConfigFileBuilder::new()
        .with_tunnel("db", tunnel("db1", port, 3306))
        .with_remote("agent", "db1", "backup-agent --serve")
        .with_phase(PhaseBuilder::new("dump").tunnel("db").remote("agent").cmd(&["true"]).build())
        .with_phase(PhaseBuilder::new("sync").cmd(&["true"]).build())
        .build();
    let (mut rt, launcher, alerter) = runtime(cfg);

    let code = rt.run_until(None, pending()).await;

    assert_eq!(code, ExitCode::OK);
    assert_eq!(launcher.launched(), vec!["db", "agent"]);
    // Torn down most recent first, by the phase itself.
    assert_eq!(launcher.killed(), vec!["agent", "db"]);
    assert!(rt.supervisor().callbacks().is_drained());
    assert!(alerter.alerts().is_empty());
}

#[tokio::test]
async fn failing_phase_command_yields_phase_command_code() {
    let cfg = ConfigFileBuilder::new()
        .with_phase(PhaseBuilder::new("bad").cmd(&["sh", "-c", "exit 4"]).build())
        .with_phase(PhaseBuilder::new("good").cmd(&["true"]).build())
        .build();
    let (mut rt, _launcher, _alerter) = runtime(cfg);

    let code = rt.run_until(None, pending()).await;

    assert_eq!(code, ExitCode::PHASE_COMMAND);
}

#[tokio::test]
async fn phase_policy_aborts_only_the_failing_phase() {
    let dead = closed_port().await;
    let cfg = ConfigFileBuilder::new()
        .with_policy(EscalationPolicy::Phase)
        .with_tunnel("dead", tunnel("db1", dead, 3306))
        .with_remote("later", "db2", "sleep 60")
        .with_phase(PhaseBuilder::new("one").tunnel("dead").cmd(&["true"]).build())
        .with_phase(PhaseBuilder::new("two").remote("later").build())
        .build();
    let (mut rt, launcher, alerter) = runtime(cfg);
    launcher.behave("dead", FakeBehavior::ExitAfter { checks: 1, code: 255 });

    let code = rt.run_until(None, pending()).await;

    assert_eq!(code, ExitCode::SSH_TUNNEL);
    assert_eq!(launcher.launched(), vec!["dead", "later"]);
    let alerts = alerter.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].1, AlertChannel::Log);
}

#[tokio::test]
async fn exit_policy_ends_the_run() {
    let dead = closed_port().await;
    let cfg = ConfigFileBuilder::new()
        .with_tunnel("dead", tunnel("db1", dead, 3306))
        .with_remote("later", "db2", "sleep 60")
        .with_phase(PhaseBuilder::new("one").tunnel("dead").cmd(&["true"]).build())
        .with_phase(PhaseBuilder::new("two").remote("later").build())
        .build();
    let (mut rt, launcher, alerter) = runtime(cfg);
    launcher.behave("dead", FakeBehavior::ExitAfter { checks: 1, code: 255 });

    let code = rt.run_until(None, pending()).await;

    assert_eq!(code, ExitCode::SSH_TUNNEL);
    assert_eq!(launcher.launched(), vec!["dead"]);
    assert_eq!(alerter.alerts()[0].1, AlertChannel::Fatal);
}

#[tokio::test]
async fn termination_signal_drains_and_exits_with_signal_code() {
    let (_listener, port) = open_port().await;
    let cfg = ConfigFileBuilder::new()
        .with_tunnel("db", tunnel("db1", port, 3306))
        .with_remote("agent", "db1", "backup-agent --serve")
        .with_phase(
            PhaseBuilder::new("dump")
                .tunnel("db")
                .remote("agent")
                .cmd(&["sleep", "30"])
                .build(),
        )
        .build();
    let (mut rt, launcher, _alerter) = runtime(cfg);

    let shutdown = async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        ShutdownSignal::Terminate
    };
    let code = tokio::time::timeout(Duration::from_secs(10), rt.run_until(None, shutdown))
        .await
        .expect("run did not stop after the signal");

    assert_eq!(code, 143);
    assert_eq!(launcher.killed(), vec!["agent", "db"]);
    assert_eq!(rt.supervisor().pid("db"), None);
    assert_eq!(rt.supervisor().pid("agent"), None);
}

#[tokio::test]
async fn lockfile_is_held_for_the_run_only() {
    let dir = tempfile::tempdir().unwrap();
    let lock = dir.path().join("backhaul.lock");
    let cfg = ConfigFileBuilder::new()
        .with_lockfile(&lock)
        .with_phase(PhaseBuilder::new("check").cmd(&["test", "-d", lock.to_str().unwrap()]).build())
        .build();
    let (mut rt, _launcher, _alerter) = runtime(cfg);

    let code = rt.run_until(None, pending()).await;

    assert_eq!(code, ExitCode::OK);
    assert!(!lock.exists());
}

#[tokio::test]
async fn existing_lockfile_refuses_to_run() {
    let dir = tempfile::tempdir().unwrap();
    let lock = dir.path().join("backhaul.lock");
    std::fs::create_dir(&lock).unwrap();
    let (_listener, port) = open_port().await;
    let cfg = ConfigFileBuilder::new()
        .with_lockfile(&lock)
        .with_tunnel("db", tunnel("db1", port, 3306))
        .with_phase(PhaseBuilder::new("dump").tunnel("db").build())
        .build();
    let (mut rt, launcher, alerter) = runtime(cfg.clone());

    let code = rt.run_until(None, pending()).await;

    assert_eq!(code, ExitCode::LOCKFILE);
    assert!(launcher.events().is_empty());
    // Someone else's lock stays where it is.
    assert!(lock.exists());
    let alerts = alerter.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].1, AlertChannel::Log);
    assert!(alerts[0].0.contains("already exists"), "{}", alerts[0].0);

    // A second refusal of the same lock stays quiet.
    let (mut rt, _launcher, alerter) = runtime(cfg);
    assert_eq!(rt.run_until(None, pending()).await, ExitCode::LOCKFILE);
    assert!(alerter.alerts().is_empty());
}

#[tokio::test]
async fn disabled_runs_refuse_without_alerting() {
    let dir = tempfile::tempdir().unwrap();
    let lock = dir.path().join("backhaul.lock");
    disable_runs(&lock).unwrap();
    let cfg = ConfigFileBuilder::new()
        .with_lockfile(&lock)
        .with_phase(PhaseBuilder::new("check").cmd(&["true"]).build())
        .build();
    let (mut rt, _launcher, alerter) = runtime(cfg);

    assert_eq!(rt.run_until(None, pending()).await, ExitCode::LOCKFILE);
    assert!(alerter.alerts().is_empty());
    assert_eq!(lock_state(&lock), LockState::Disabled);
}

#[tokio::test]
async fn stop_during_a_run_keeps_the_lock() {
    let dir = tempfile::tempdir().unwrap();
    let lock = dir.path().join("backhaul.lock");
    let marker = lock.join(DISABLED_MARKER);
    let cfg = ConfigFileBuilder::new()
        .with_lockfile(&lock)
        .with_phase(
            PhaseBuilder::new("stop-midway")
                .cmd(&["touch", marker.to_str().unwrap()])
                .build(),
        )
        .build();
    let (mut rt, _launcher, _alerter) = runtime(cfg);

    assert_eq!(rt.run_until(None, pending()).await, ExitCode::OK);
    assert_eq!(lock_state(&lock), LockState::Disabled);
}

#[tokio::test]
async fn phase_failure_does_not_leak_into_the_next_phase() {
    let dead = closed_port().await;
    let cfg = ConfigFileBuilder::new()
        .with_policy(EscalationPolicy::Phase)
        .with_tunnel("dead", tunnel("db1", dead, 3306))
        .with_phase(PhaseBuilder::new("one").tunnel("dead").cmd(&["true"]).build())
        .with_phase(PhaseBuilder::new("two").cmd(&["true"]).build())
        .build();
    common::init_tracing();
    let launcher = FakeLauncher::new();
    launcher.behave("dead", FakeBehavior::ExitAfter { checks: 1, code: 255 });
    let options = SupervisorOptions {
        poll_interval: Duration::from_millis(50),
        ..SupervisorOptions::from_config(&cfg.config)
    };
    let mut sup = Supervisor::new(launcher, RecordingAlerter::new(), options);

    let summary = run_phases(&mut sup, &cfg, None).await.unwrap();

    assert_eq!(
        summary.phases,
        vec![
            ("one".to_string(), PhaseOutcome::Failed { code: ExitCode::SSH_TUNNEL }),
            ("two".to_string(), PhaseOutcome::Succeeded),
        ]
    );
    assert_eq!(sup.phase_error(), None);
}

#[tokio::test]
async fn single_phase_selection() {
    let cfg = ConfigFileBuilder::new()
        .with_remote("a", "h1", "one")
        .with_remote("b", "h2", "two")
        .with_phase(PhaseBuilder::new("first").remote("a").build())
        .with_phase(PhaseBuilder::new("second").remote("b").build())
        .build();
    let (mut rt, launcher, _alerter) = runtime(cfg);

    assert_eq!(rt.run_until(Some("second"), pending()).await, ExitCode::OK);
    assert_eq!(launcher.launched(), vec!["b"]);
}

#[tokio::test]
async fn unknown_phase_selection_is_a_startup_error() {
    let cfg = ConfigFileBuilder::new()
        .with_phase(PhaseBuilder::new("first").cmd(&["true"]).build())
        .build();
    let (mut rt, launcher, _alerter) = runtime(cfg);

    assert_eq!(rt.run_until(Some("nope"), pending()).await, ExitCode::STARTUP);
    assert!(launcher.events().is_empty());
}

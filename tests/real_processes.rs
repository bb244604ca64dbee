//! Supervisor driving real OS processes.

use std::time::Duration;

use tokio::net::TcpListener;

use backhaul::errors::BackhaulError;
use backhaul::exec::CommandSpec;
use backhaul::process::{ProcessLauncher, TcpProbe};
use backhaul::supervisor::{Supervisor, SupervisorOptions, TunnelRequest, TunnelState};
use backhaul::types::EscalationPolicy;
use backhaul_test_utils::fakes::RecordingAlerter;
use backhaul_test_utils::{init_tracing, with_timeout};

fn supervisor(policy: EscalationPolicy) -> (Supervisor<ProcessLauncher, RecordingAlerter>, RecordingAlerter) {
    init_tracing();
    let alerter = RecordingAlerter::new();
    let options = SupervisorOptions {
        ready_timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(100),
        policy,
        ..SupervisorOptions::default()
    };
    (Supervisor::new(ProcessLauncher::new(false), alerter.clone(), options), alerter)
}

#[tokio::test]
async fn open_and_close_a_long_running_process() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (mut sup, alerter) = supervisor(EscalationPolicy::Exit);
    let request = TunnelRequest::new(
        "sleeper",
        CommandSpec::new("sleep").arg("30"),
        TcpProbe::new("127.0.0.1", port),
    );

    with_timeout(sup.open("sleeper", &request, true)).await.unwrap();
    assert!(sup.pid("sleeper").is_some());
    assert_eq!(sup.tunnel_state("sleeper"), TunnelState::Ready);

    with_timeout(sup.close("sleeper", true)).await;
    assert_eq!(sup.pid("sleeper"), None);
    assert_eq!(sup.tunnel_state("sleeper"), TunnelState::Closed);
    assert!(sup.callbacks().is_empty());
    assert!(alerter.alerts().is_empty());
}

#[tokio::test]
async fn process_that_exits_early_is_reported_with_its_status() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let (mut sup, alerter) = supervisor(EscalationPolicy::Phase);
    let request = TunnelRequest::new(
        "broken",
        CommandSpec::new("sh").args(["-c", "exit 3"]),
        TcpProbe::new("127.0.0.1", port),
    );

    let err = with_timeout(sup.open("broken", &request, true)).await.unwrap_err();

    match err {
        BackhaulError::PhaseAborted { reason, .. } => assert!(reason.contains("exit status 3"), "{reason}"),
        other => panic!("expected PhaseAborted, got {other:?}"),
    }
    assert_eq!(sup.pid("broken"), None);
    assert_eq!(alerter.alerts().len(), 1);
}

#[tokio::test]
async fn unknown_program_fails_to_launch() {
    let (mut sup, _alerter) = supervisor(EscalationPolicy::Phase);

    let err = sup
        .launch("ghost", &CommandSpec::new("/nonexistent/backhaul-test-program"), true)
        .await
        .unwrap_err();

    assert!(matches!(err, BackhaulError::Launch { ref name, .. } if name == "ghost"));
    assert_eq!(sup.tunnel_state("ghost"), TunnelState::Failed);
    assert!(sup.callbacks().is_empty());
}

#[tokio::test]
async fn launch_and_terminate_background_command() {
    let (mut sup, _alerter) = supervisor(EscalationPolicy::Exit);

    sup.launch("ssh", &CommandSpec::new("sleep").arg("30"), true)
        .await
        .unwrap();
    assert!(sup.pid("ssh").is_some());

    with_timeout(sup.terminate("ssh", true)).await;
    assert_eq!(sup.pid("ssh"), None);

    // Second terminate takes the "already terminated" path.
    with_timeout(sup.terminate("ssh", true)).await;
    assert_eq!(sup.tunnel_state("ssh"), TunnelState::Closed);
}

#[tokio::test]
async fn drain_kills_real_processes() {
    let (mut sup, _alerter) = supervisor(EscalationPolicy::Exit);

    sup.launch("one", &CommandSpec::new("sleep").arg("30"), true).await.unwrap();
    sup.launch("two", &CommandSpec::new("sleep").arg("30"), true).await.unwrap();

    with_timeout(sup.drain_on_exit()).await;

    assert_eq!(sup.pid("one"), None);
    assert_eq!(sup.pid("two"), None);
}

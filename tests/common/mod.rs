#![allow(dead_code)]

use std::time::Duration;

use backhaul::supervisor::{Supervisor, SupervisorOptions};
use backhaul::types::EscalationPolicy;
use backhaul_test_utils::fakes::{FakeLauncher, RecordingAlerter};

pub use backhaul_test_utils::init_tracing;

pub type FakeSupervisor = Supervisor<FakeLauncher, RecordingAlerter>;

/// Supervisor over fakes, polling once per second like production.
///
/// Returns clones of the launcher and alerter for assertions.
pub fn fake_supervisor(
    policy: EscalationPolicy,
    timeout_secs: u64,
) -> (FakeSupervisor, FakeLauncher, RecordingAlerter) {
    init_tracing();
    let launcher = FakeLauncher::new();
    let alerter = RecordingAlerter::new();
    let options = SupervisorOptions {
        ready_timeout: Duration::from_secs(timeout_secs),
        policy,
        ..SupervisorOptions::default()
    };
    let supervisor = Supervisor::new(launcher.clone(), alerter.clone(), options);
    (supervisor, launcher, alerter)
}

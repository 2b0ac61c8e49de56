mod support;

use sensor_core::identity::IdentityStatus;
use sensor_core::repl::commands::{CommandError, CommandExecutor, CommandOutcome};
use sensor_core::{ControlId, PowerState, SensorError, StreamState};
use support::device;

#[test]
fn bring_up_script_runs_end_to_end() {
    let mut executor = CommandExecutor::new(device());

    let outcome = executor.execute("power on").expect("power on");
    assert_eq!(outcome, CommandOutcome::Power(PowerState::On));

    let outcome = executor.execute("identify").expect("identify");
    assert_eq!(outcome, CommandOutcome::Identity(IdentityStatus::Verified));

    let outcome = executor
        .execute("mode set width=4608 height=2592")
        .expect("mode set");
    match outcome {
        CommandOutcome::ModeSet(mode) => assert_eq!(mode.frame_rate, 14),
        other => panic!("unexpected outcome: {other:?}"),
    }

    let outcome = executor
        .execute("set exposure=100000")
        .expect("set exposure");
    assert_eq!(
        outcome,
        CommandOutcome::Control {
            id: ControlId::Exposure,
            value: 2669,
        }
    );

    let outcome = executor
        .execute("get exposure-shift")
        .expect("get shift");
    assert_eq!(
        outcome,
        CommandOutcome::Control {
            id: ControlId::ExposureShift,
            value: 6,
        }
    );

    let outcome = executor.execute("stream start").expect("stream start");
    assert_eq!(outcome, CommandOutcome::Stream(StreamState::Streaming));

    let outcome = executor.execute("stream stop").expect("stream stop");
    assert_eq!(outcome, CommandOutcome::Stream(StreamState::Idle));

    let outcome = executor.execute("power off").expect("power off");
    assert_eq!(outcome, CommandOutcome::Power(PowerState::Off));
}

#[test]
fn stream_before_identify_is_refused() {
    let mut executor = CommandExecutor::new(device());
    executor.execute("power on").expect("power on");

    let error = executor
        .execute("mode set width=2304 height=1296")
        .expect_err("identity not checked");
    assert_eq!(error, CommandError::Sensor(SensorError::IdentityUnverified));
}

#[test]
fn config_applies_on_next_activation() {
    let mut executor = CommandExecutor::new(device());
    executor.execute("config qbc=3").expect("qbc=3");
    executor.execute("power on").expect("power on");
    executor.execute("identify").expect("identify");
    executor
        .execute("mode set width=4608 height=2592 fps=10")
        .expect("full resolution");

    assert_eq!(executor.sensor().transport().byte(0xc429), Some(3));
}

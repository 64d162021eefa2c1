//! Glove publisher → mailbox → control loop, on real threads and clocks.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use teleop_core::acquisition::StopReason;
use teleop_core::config::{ControlCfg, FilterSpec, GestureCfg, PublisherCfg};
use teleop_core::control::ControlLoop;
use teleop_core::guard::SensorRange;
use teleop_core::mailbox::mailbox;
use teleop_core::mapper::RobotProfile;
use teleop_core::mocks::{GloveFrame, RecordingGripper, RecordingRobot, RobotCall, ScriptedGlove};
use teleop_core::publisher::run_publisher;
use teleop_core::telemetry::TelemetryMessage;
use teleop_traits::ServoParams;
use teleop_traits::clock::MonotonicClock;

fn ranges() -> [SensorRange; 3] {
    let r = |l, h| SensorRange::new(l, h).expect("range");
    [r(-22.5, 22.5), r(0.0, 45.0), r(-45.0, 0.0)]
}

fn publisher_cfg() -> PublisherCfg {
    PublisherCfg {
        period: Duration::from_millis(1),
        position_ranges: ranges(),
        position_filter: FilterSpec::Sma { window: 5 },
        gesture: GestureCfg {
            ranges: vec![SensorRange::new(5.0, 65.0).expect("range"); 5],
            window: 3,
            closed_offset: 10.0,
        },
        epsilon: 0.01,
    }
}

fn control_cfg() -> ControlCfg {
    ControlCfg {
        period: Duration::from_millis(2),
        sensor_ranges: ranges(),
        filter: FilterSpec::Passthrough,
        epsilon: 0.01,
        profile: RobotProfile::ur10e(),
        servo: ServoParams {
            velocity: 0.05,
            acceleration: 0.5,
            period: Duration::from_millis(2),
            lookahead: Duration::from_millis(200),
            gain: 100.0,
        },
        home_speed_factor: 10.0,
        liveness_timeout: Some(Duration::from_secs(5)),
    }
}

const SETTLE: Duration = Duration::from_millis(150);

#[test]
fn button_gesture_and_terminate_reach_the_robot() {
    let glove = Arc::new(ScriptedGlove::new(GloveFrame::default()));
    let (tx, mut rx) = mailbox::<TelemetryMessage>();
    let shutdown = Arc::new(AtomicBool::new(false));

    let publisher = {
        let glove = Arc::clone(&glove);
        let shutdown = Arc::clone(&shutdown);
        thread::spawn(move || {
            let mut tx = tx;
            run_publisher(glove, &mut tx, &publisher_cfg(), MonotonicClock::new(), &shutdown)
        })
    };
    let control = thread::spawn(move || {
        let start = RobotProfile::ur10e().home_pose();
        let mut ctl = ControlLoop::new(RecordingRobot::new(start), RecordingGripper::new(), control_cfg())
            .expect("control loop");
        let report = ctl.run(&mut rx, &MonotonicClock::new(), &AtomicBool::new(false), None);
        (report, ctl.robot().calls.clone(), ctl.gripper().commands.clone())
    });

    // Tap A: movement on.
    thread::sleep(SETTLE);
    glove.update(|f| f.buttons[0] = true);
    thread::sleep(SETTLE);
    glove.update(|f| f.buttons[0] = false);
    // Move X to a quarter deflection and close the hand.
    glove.update(|f| {
        f.position[0] = 11.25;
        f.fingers = [60.0; 5];
    });
    thread::sleep(SETTLE * 2);
    shutdown.store(true, Ordering::Relaxed);

    let pub_report = publisher.join().expect("publisher thread").expect("publisher");
    assert_eq!(pub_report.reason, StopReason::Cancelled);
    assert!(pub_report.published > 10, "{pub_report:?}");
    assert_eq!(pub_report.publish_errors, 0);

    let (report, calls, gripper) = control.join().expect("control thread");
    let report = report.expect("control");
    assert_eq!(report.reason, StopReason::Terminated);
    assert!(report.servo_commands > 0);

    assert!(matches!(calls.first(), Some(RobotCall::MoveLinear { .. })));
    assert_eq!(calls.last(), Some(&RobotCall::Stop));
    assert_eq!(calls.iter().filter(|c| **c == RobotCall::Stop).count(), 1);
    let last_servo = calls
        .iter()
        .rev()
        .find_map(|c| match c {
            RobotCall::Servo(p) => Some(*p),
            _ => None,
        })
        .expect("servo command");
    // 11.25 of ±22.5 is a quarter of the 760 mm workspace, direction -1.
    assert!((last_servo.position[0] + 0.19).abs() < 1e-6, "{last_servo:?}");
    assert_eq!(gripper, vec![true]);
}

#[test]
fn glove_fault_ends_both_sides() {
    let glove = Arc::new(ScriptedGlove::new(GloveFrame::default()));
    let (tx, mut rx) = mailbox::<TelemetryMessage>();

    let publisher = {
        let glove = Arc::clone(&glove);
        thread::spawn(move || {
            let mut tx = tx;
            run_publisher(
                glove,
                &mut tx,
                &publisher_cfg(),
                MonotonicClock::new(),
                &AtomicBool::new(false),
            )
        })
    };
    thread::sleep(Duration::from_millis(30));
    glove.fault();

    let pub_report = publisher.join().expect("publisher thread").expect("publisher");
    assert_eq!(pub_report.reason, StopReason::HardwareFault);

    let start = RobotProfile::ur10e().home_pose();
    let mut ctl = ControlLoop::new(RecordingRobot::new(start), RecordingGripper::new(), control_cfg())
        .expect("control loop");
    let report = ctl
        .run(&mut rx, &MonotonicClock::new(), &AtomicBool::new(false), None)
        .expect("control");
    // Only the terminate message is left in the slot.
    assert_eq!(report.reason, StopReason::Terminated);
    assert_eq!(report.messages, 1);
    assert_eq!(ctl.robot().stops(), 1);
}

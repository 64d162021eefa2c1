//! Robot-side consumer of the telemetry stream.
//!
//! Per received message: re-filter each sensor axis with the combined
//! filter, remap into the robot workspace, servo when movement is enabled,
//! and bring the gripper in line with the requested state. The robot is
//! stopped exactly once on every exit path.
use crate::acquisition::{LoopStats, Pacer, StopReason};
use crate::config::ControlCfg;
use crate::error::{Result, TeleopError};
use crate::filter::SignalFilter;
use crate::guard::LimitGuard;
use crate::hw_error::map_hw_error;
use crate::mapper::{RobotProfile, WorkspaceMapper};
use crate::recorder::{TrackSample, TrackSink};
use crate::telemetry::{Received, Subscribe, TelemetryMessage};
use eyre::WrapErr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use teleop_traits::clock::Clock;
use teleop_traits::{Gripper, Pose, Robot};

/// Upper bound on one blocking wait, so cancellation is seen promptly.
const POLL_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GripperAction {
    Opened,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// Message handled; `commanded` is false while movement is disabled.
    Applied {
        target: Pose,
        target_mm: [f64; 3],
        commanded: bool,
        gripper: Option<GripperAction>,
    },
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlReport {
    pub messages: u64,
    pub servo_commands: u64,
    pub gripper_actions: u64,
    pub stats: LoopStats,
    pub reason: StopReason,
}

pub struct ControlLoop<R: Robot, G: Gripper> {
    robot: R,
    gripper: G,
    filters: Vec<Box<dyn SignalFilter>>,
    mapper: WorkspaceMapper,
    cfg: ControlCfg,
    stopped: bool,
    messages: u64,
    servo_commands: u64,
    gripper_actions: u64,
}

impl<R: Robot, G: Gripper> ControlLoop<R, G> {
    pub fn new(robot: R, gripper: G, cfg: ControlCfg) -> Result<Self> {
        let guards = cfg
            .sensor_ranges
            .map(|r| LimitGuard::new(r, cfg.epsilon));
        Self::with_guards(robot, gripper, cfg, guards)
    }

    /// Build with explicit guards (deterministic glitch substitution).
    pub fn with_guards(robot: R, gripper: G, cfg: ControlCfg, guards: [LimitGuard; 3]) -> Result<Self> {
        let filters = guards
            .into_iter()
            .map(|g| cfg.filter.build(g))
            .collect::<std::result::Result<Vec<_>, _>>()
            .wrap_err("building control filters")?;
        let mapper = WorkspaceMapper::new(&cfg.profile, cfg.sensor_ranges)
            .wrap_err("building workspace mapper")?;
        Ok(Self {
            robot,
            gripper,
            filters,
            mapper,
            cfg,
            stopped: false,
            messages: 0,
            servo_commands: 0,
            gripper_actions: 0,
        })
    }

    #[inline]
    pub fn profile(&self) -> &RobotProfile {
        &self.cfg.profile
    }

    #[inline]
    pub fn robot(&self) -> &R {
        &self.robot
    }

    #[inline]
    pub fn gripper(&self) -> &G {
        &self.gripper
    }

    /// Move to the profile's home pose at the approach speed.
    pub fn start(&mut self) -> Result<()> {
        let home = self.cfg.profile.home_pose();
        let velocity = self.cfg.servo.velocity * self.cfg.home_speed_factor;
        tracing::info!(robot = self.cfg.profile.name, ?home, "moving to home");
        self.robot
            .move_linear(&home, velocity, self.cfg.servo.acceleration)
            .map_err(|e| map_hw_error(e.as_ref()))
            .wrap_err("move to home")?;
        Ok(())
    }

    /// Apply one message.
    pub fn step(&mut self, msg: &TelemetryMessage) -> Result<StepOutcome> {
        if self.stopped {
            return Err(TeleopError::State("control loop already stopped".into()).into());
        }
        self.messages += 1;
        if msg.terminate {
            tracing::info!("terminate received");
            self.shutdown()?;
            return Ok(StepOutcome::Terminated);
        }

        let raw = msg.position();
        let mut filtered = [0.0; 3];
        for (i, f) in self.filters.iter_mut().enumerate() {
            filtered[i] = f.compute(raw[i]);
        }
        let target_mm = self.mapper.map(filtered);
        let target = self.cfg.profile.to_pose(target_mm);

        if msg.movement_enabled {
            self.robot
                .servo_to(&target, &self.cfg.servo)
                .map_err(|e| map_hw_error(e.as_ref()))
                .wrap_err("servo command")?;
            self.servo_commands += 1;
        }

        let gripper = self.apply_gripper(msg.gripper_request)?;
        Ok(StepOutcome::Applied {
            target,
            target_mm,
            commanded: msg.movement_enabled,
            gripper,
        })
    }

    /// Close on a close request unless already closed; open likewise.
    fn apply_gripper(&mut self, close_requested: bool) -> Result<Option<GripperAction>> {
        let action = if close_requested && !self.gripper.is_closed() {
            self.gripper.close().map(|()| GripperAction::Closed)
        } else if !close_requested && !self.gripper.is_open() {
            self.gripper.open().map(|()| GripperAction::Opened)
        } else {
            return Ok(None);
        };
        let action = action
            .map_err(|e| map_hw_error(e.as_ref()))
            .wrap_err("gripper command")?;
        self.gripper_actions += 1;
        tracing::debug!(?action, "gripper");
        Ok(Some(action))
    }

    /// Stop the robot; later calls are no-ops.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        self.robot
            .stop()
            .map_err(|e| map_hw_error(e.as_ref()))
            .wrap_err("stop robot")?;
        tracing::info!(
            messages = self.messages,
            servo_commands = self.servo_commands,
            "robot stopped"
        );
        Ok(())
    }

    /// Home the robot, then consume messages until terminate, cancellation,
    /// publisher loss or liveness timeout.
    ///
    /// With a `tracker`, every handled message adds one desired-vs-actual
    /// sample (millimetres).
    pub fn run<S, C>(
        &mut self,
        sub: &mut S,
        clock: &C,
        shutdown: &AtomicBool,
        mut tracker: Option<&mut dyn TrackSink>,
    ) -> Result<ControlReport>
    where
        S: Subscribe + ?Sized,
        C: Clock + ?Sized,
    {
        self.start()?;
        let mut pacer = Pacer::new(clock, self.cfg.period);
        let mut last_message = clock.now();
        let outcome = loop {
            if shutdown.load(Ordering::Relaxed) {
                break Ok(StopReason::Cancelled);
            }
            let wait = match self.cfg.liveness_timeout {
                Some(limit) => limit
                    .saturating_sub(clock.elapsed_since(last_message))
                    .min(POLL_SLICE),
                None => POLL_SLICE,
            };
            let msg = match sub.recv_latest(Some(wait)) {
                Ok(Received::Message(m)) => m,
                Ok(Received::TimedOut) => {
                    if self
                        .cfg
                        .liveness_timeout
                        .is_some_and(|limit| clock.elapsed_since(last_message) >= limit)
                    {
                        tracing::warn!("no telemetry within liveness timeout");
                        break Ok(StopReason::LivenessTimeout);
                    }
                    continue;
                }
                Ok(Received::Closed) => break Ok(StopReason::PublisherClosed),
                Err(e) => break Err(e),
            };
            last_message = clock.now();
            let start = pacer.tick_start();
            match self.step(&msg) {
                Ok(StepOutcome::Terminated) => break Ok(StopReason::Terminated),
                Ok(StepOutcome::Applied { target_mm, .. }) => {
                    if let Some(t) = tracker.as_deref_mut() {
                        let actual = self
                            .robot
                            .current_pose()
                            .map_err(|e| map_hw_error(e.as_ref()))
                            .map(|p| self.cfg.profile.to_mm(&p));
                        match actual {
                            Ok(actual) => {
                                if let Err(e) = t.record(&TrackSample {
                                    desired: target_mm,
                                    actual,
                                }) {
                                    break Err(e);
                                }
                            }
                            Err(e) => tracing::debug!(error = %e, "pose readback failed"),
                        }
                    }
                }
                Err(e) => break Err(e),
            }
            if let Some(over) = pacer.finish(start) {
                tracing::trace!(overrun_us = over.as_micros() as u64, "control tick overran");
            }
        };

        // Stop on every path; the first error wins.
        let stop = self.shutdown();
        let reason = outcome?;
        stop?;
        if let Some(t) = tracker {
            t.flush()?;
        }
        Ok(ControlReport {
            messages: self.messages,
            servo_commands: self.servo_commands,
            gripper_actions: self.gripper_actions,
            stats: pacer.stats(),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterSpec;
    use crate::guard::SensorRange;
    use crate::mocks::{RecordingGripper, RecordingRobot, RobotCall};
    use std::collections::VecDeque;
    use teleop_traits::ServoParams;
    use teleop_traits::clock::test_clock::TestClock;

    fn cfg() -> ControlCfg {
        let r = |l, h| SensorRange::new(l, h).expect("range");
        ControlCfg {
            period: Duration::from_millis(4),
            sensor_ranges: [r(-22.5, 22.5), r(0.0, 45.0), r(-45.0, 0.0)],
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
            liveness_timeout: None,
        }
    }

    fn control() -> ControlLoop<RecordingRobot, RecordingGripper> {
        let start = RobotProfile::ur10e().home_pose();
        ControlLoop::new(RecordingRobot::new(start), RecordingGripper::new(), cfg())
            .expect("control loop")
    }

    /// Replays a fixed list, then reports the publisher gone.
    struct Script(VecDeque<TelemetryMessage>);

    impl Subscribe for Script {
        fn recv_latest(&mut self, _timeout: Option<Duration>) -> Result<Received> {
            Ok(self.0.pop_front().map_or(Received::Closed, Received::Message))
        }
    }

    /// Never delivers; burns the requested wait on the virtual clock.
    struct Silent(TestClock);

    impl Subscribe for Silent {
        fn recv_latest(&mut self, timeout: Option<Duration>) -> Result<Received> {
            self.0.advance(timeout.unwrap_or(POLL_SLICE));
            Ok(Received::TimedOut)
        }
    }

    #[test]
    fn start_moves_home_at_approach_speed() {
        let mut c = control();
        c.start().expect("start");
        assert_eq!(
            c.robot().calls,
            vec![RobotCall::MoveLinear {
                pose: RobotProfile::ur10e().home_pose(),
                velocity: 0.5,
                acceleration: 0.5,
            }]
        );
    }

    #[test]
    fn sensor_midpoints_servo_to_home() {
        let mut c = control();
        let out = c
            .step(&TelemetryMessage::new([0.0, 22.5, -22.5], false, true))
            .expect("step");
        let StepOutcome::Applied { target, commanded, .. } = out else {
            panic!("unexpected {out:?}");
        };
        assert!(commanded);
        assert_eq!(target.position, [0.0, -0.7, 0.515]);
        assert_eq!(c.robot().servo_targets(), vec![target]);
    }

    #[test]
    fn full_deflection_maps_half_a_workspace_away() {
        let mut c = control();
        let out = c
            .step(&TelemetryMessage::new([22.5, 22.5, -22.5], false, true))
            .expect("step");
        let StepOutcome::Applied { target_mm, .. } = out else {
            panic!("unexpected {out:?}");
        };
        assert_eq!(target_mm[0], -380.0);
    }

    #[test]
    fn movement_disabled_sends_no_motion() {
        let mut c = control();
        let out = c
            .step(&TelemetryMessage::new([5.0, 20.0, -20.0], false, false))
            .expect("step");
        assert!(matches!(out, StepOutcome::Applied { commanded: false, .. }));
        assert!(c.robot().calls.is_empty());
    }

    #[test]
    fn gripper_commands_only_on_change() {
        let mut c = control();
        let msg = |g| TelemetryMessage::new([0.0, 22.5, -22.5], g, false);
        let actions: Vec<_> = [false, true, true, false, false]
            .into_iter()
            .map(|g| match c.step(&msg(g)).expect("step") {
                StepOutcome::Applied { gripper, .. } => gripper,
                StepOutcome::Terminated => panic!("terminated"),
            })
            .collect();
        assert_eq!(
            actions,
            vec![None, Some(GripperAction::Closed), None, Some(GripperAction::Opened), None]
        );
        assert_eq!(c.gripper().commands, vec![true, false]);
    }

    #[test]
    fn terminate_stops_exactly_once() {
        let mut c = control();
        let out = c
            .step(&TelemetryMessage::terminate_at([0.0; 3]))
            .expect("step");
        assert_eq!(out, StepOutcome::Terminated);
        c.shutdown().expect("second shutdown");
        assert!(c.step(&TelemetryMessage::default()).is_err());
        assert_eq!(c.robot().stops(), 1);
    }

    #[test]
    fn run_consumes_until_terminate() {
        let mut c = control();
        let mut sub = Script(VecDeque::from(vec![
            TelemetryMessage::new([0.0, 22.5, -22.5], false, true),
            TelemetryMessage::new([1.0, 22.5, -22.5], true, true),
            TelemetryMessage::new([2.0, 22.5, -22.5], true, false),
            TelemetryMessage::terminate_at([2.0, 22.5, -22.5]),
            TelemetryMessage::new([9.0, 9.0, -9.0], false, true),
        ]));
        let clock = TestClock::new();
        let mut track: Vec<TrackSample> = Vec::new();
        let report = c
            .run(&mut sub, &clock, &AtomicBool::new(false), Some(&mut track))
            .expect("run");
        assert_eq!(report.reason, StopReason::Terminated);
        assert_eq!(report.messages, 4);
        assert_eq!(report.servo_commands, 2);
        assert_eq!(report.gripper_actions, 1);
        assert_eq!(track.len(), 3);
        assert_eq!(c.robot().stops(), 1);
        assert_eq!(sub.0.len(), 1);
    }

    #[test]
    fn publisher_loss_stops_robot() {
        let mut c = control();
        let mut sub = Script(VecDeque::new());
        let report = c
            .run(&mut sub, &TestClock::new(), &AtomicBool::new(false), None)
            .expect("run");
        assert_eq!(report.reason, StopReason::PublisherClosed);
        assert_eq!(c.robot().stops(), 1);
    }

    #[test]
    fn liveness_timeout_ends_silent_session() {
        let mut cfg = cfg();
        cfg.liveness_timeout = Some(Duration::from_millis(350));
        let start = RobotProfile::ur10e().home_pose();
        let mut c = ControlLoop::new(RecordingRobot::new(start), RecordingGripper::new(), cfg)
            .expect("control loop");
        let clock = TestClock::new();
        let mut sub = Silent(clock.clone());
        let report = c
            .run(&mut sub, &clock, &AtomicBool::new(false), None)
            .expect("run");
        assert_eq!(report.reason, StopReason::LivenessTimeout);
        assert_eq!(clock.offset(), Duration::from_millis(350));
        assert_eq!(c.robot().stops(), 1);
    }

    #[test]
    fn cancellation_still_stops_robot() {
        let mut c = control();
        let mut sub = Silent(TestClock::new());
        let report = c
            .run(&mut sub, &TestClock::new(), &AtomicBool::new(true), None)
            .expect("run");
        assert_eq!(report.reason, StopReason::Cancelled);
        assert_eq!(report.messages, 0);
        assert_eq!(c.robot().stops(), 1);
    }
}

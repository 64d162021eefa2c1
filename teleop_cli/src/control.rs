//! `teleop control`: UDP telemetry → simulated arm and gripper.

use eyre::WrapErr;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use teleop_config::Config;
use teleop_core::config::ControlCfg;
use teleop_core::control::ControlLoop;
use teleop_core::recorder::{TrackRecorder, TrackSink};
use teleop_core::telemetry::UdpSubscriber;
use teleop_hardware::{SimulatedGripper, SimulatedRobot};
use teleop_traits::clock::MonotonicClock;

pub fn run(
    cfg: &Config,
    listen: Option<&str>,
    track: Option<&Path>,
    shutdown: &AtomicBool,
    json: bool,
) -> eyre::Result<()> {
    let ccfg = ControlCfg::try_from(cfg)?;
    let addr = listen.unwrap_or(&cfg.telemetry.listen);
    let mut sub = UdpSubscriber::bind(addr).wrap_err_with(|| format!("telemetry listen {addr}"))?;

    let mut tracker = track
        .map(|p| TrackRecorder::create(p).wrap_err_with(|| format!("tracking CSV {}", p.display())))
        .transpose()?;

    let robot = SimulatedRobot::new(ccfg.profile.home_pose());
    let mut ctl = ControlLoop::new(robot, SimulatedGripper::new(), ccfg)?;
    let report = ctl.run(
        &mut sub,
        &MonotonicClock::new(),
        shutdown,
        tracker.as_mut().map(|t| t as &mut dyn TrackSink),
    )?;
    let tracked = match tracker {
        Some(t) => {
            let rows = t.rows();
            t.into_inner()?;
            Some(rows)
        }
        None => None,
    };

    if json {
        println!(
            "{}",
            serde_json::json!({
                "command": "control",
                "reason": report.reason.as_str(),
                "messages": report.messages,
                "servo_commands": report.servo_commands,
                "gripper_actions": report.gripper_actions,
                "malformed": sub.malformed(),
                "overruns": report.stats.overruns,
                "tracked_rows": tracked,
            })
        );
    } else {
        println!(
            "control stopped ({}): {} messages, {} servo commands, {} gripper actions, {} malformed datagrams",
            report.reason.as_str(),
            report.messages,
            report.servo_commands,
            report.gripper_actions,
            sub.malformed()
        );
        if let Some(rows) = tracked {
            println!("tracking: {rows} rows");
        }
    }
    Ok(())
}

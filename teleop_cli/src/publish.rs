//! `teleop publish`: simulated glove → UDP telemetry.

use eyre::WrapErr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use teleop_config::Config;
use teleop_core::acquisition::StopReason;
use teleop_core::config::PublisherCfg;
use teleop_core::publisher::run_publisher;
use teleop_core::telemetry::UdpPublisher;
use teleop_core::TeleopError;
use teleop_hardware::{GloveSim, SimulatedGlove};
use teleop_traits::clock::MonotonicClock;

pub fn run(
    cfg: &Config,
    to: Option<&str>,
    duration: Option<Duration>,
    shutdown: &Arc<AtomicBool>,
    json: bool,
) -> eyre::Result<()> {
    let pcfg = PublisherCfg::try_from(cfg)?;
    let addr = to.unwrap_or(&cfg.telemetry.publish_to);
    let mut publisher =
        UdpPublisher::connect(addr).wrap_err_with(|| format!("telemetry target {addr}"))?;

    if let Some(limit) = duration {
        let flag = Arc::clone(shutdown);
        std::thread::Builder::new()
            .name("publish-timer".into())
            .spawn(move || {
                std::thread::sleep(limit);
                flag.store(true, Ordering::Relaxed);
            })
            .wrap_err("spawning duration timer")?;
    }

    let glove = Arc::new(SimulatedGlove::new(GloveSim::default()));
    let report = run_publisher(glove, &mut publisher, &pcfg, MonotonicClock::new(), shutdown)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "command": "publish",
                "reason": report.reason.as_str(),
                "published": report.published,
                "publish_errors": report.publish_errors,
                "overruns": report.stats.overruns,
            })
        );
    } else {
        println!(
            "publish stopped ({}): {} messages to {addr}, {} send errors, {} overruns",
            report.reason.as_str(),
            report.published,
            report.publish_errors,
            report.stats.overruns
        );
    }
    if report.reason == StopReason::HardwareFault {
        return Err(TeleopError::HardwareFault("glove stopped responding".into()).into());
    }
    Ok(())
}

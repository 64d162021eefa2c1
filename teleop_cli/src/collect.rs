//! `teleop collect`: raw and filtered channels to CSV.

use eyre::WrapErr;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use teleop_config::Config;
use teleop_core::acquisition::StopReason;
use teleop_core::collect::run_collection;
use teleop_core::config::CollectionCfg;
use teleop_core::recorder::EvaluationRecorder;
use teleop_core::TeleopError;
use teleop_hardware::{GloveSim, SimulatedGlove};
use teleop_traits::clock::MonotonicClock;

pub fn run(
    cfg: &Config,
    out: &Path,
    fingers: Option<&Path>,
    samples: Option<u64>,
    shutdown: &AtomicBool,
    json: bool,
) -> eyre::Result<()> {
    let mut ccfg = CollectionCfg::try_from(cfg)?;
    if samples.is_some() {
        ccfg.max_samples = samples;
    }
    let mut positions = EvaluationRecorder::create_positions(out)
        .wrap_err_with(|| format!("position CSV {}", out.display()))?;
    let mut finger_rec = fingers
        .map(|p| {
            EvaluationRecorder::create_fingers(p)
                .wrap_err_with(|| format!("finger CSV {}", p.display()))
        })
        .transpose()?;

    let glove = SimulatedGlove::new(GloveSim::default());
    let report = run_collection(
        &glove,
        &ccfg,
        &MonotonicClock::new(),
        shutdown,
        &mut positions,
        finger_rec.as_mut(),
    )?;
    positions.flush()?;
    if let Some(f) = finger_rec.as_mut() {
        f.flush()?;
    }

    if json {
        println!(
            "{}",
            serde_json::json!({
                "command": "collect",
                "reason": report.reason.as_str(),
                "samples": report.stats.ticks,
                "overruns": report.stats.overruns,
                "out": out.display().to_string(),
            })
        );
    } else {
        println!(
            "collected {} samples ({}) -> {}",
            report.stats.ticks,
            report.reason.as_str(),
            out.display()
        );
    }
    if report.reason == StopReason::HardwareFault {
        return Err(TeleopError::HardwareFault("glove stopped responding".into()).into());
    }
    Ok(())
}

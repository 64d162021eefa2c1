//! `teleop`: glove publisher, robot controller and data collection.

mod cli;
mod collect;
mod control;
mod error_fmt;
mod logging;
mod publish;
mod rt;

use clap::Parser;
use cli::{Cli, Commands, JSON_MODE};
use eyre::WrapErr;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use teleop_config::Config;
use teleop_core::TeleopError;
use teleop_core::config::{CollectionCfg, ControlCfg, PublisherCfg};
use teleop_core::hw_error::map_hw_error;
use teleop_hardware::{GloveSim, SimulatedGlove, SimulatedGripper, SimulatedRobot};
use teleop_traits::{ChannelId, Glove, Gripper, Robot};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(err) = run(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", error_fmt::format_error_json(&err));
        } else {
            eprintln!("{}", error_fmt::humanize(&err));
        }
        tracing::debug!(error = ?err, "exiting with error");
        std::process::exit(error_fmt::exit_code_for_error(&err));
    }
}

fn run(cli: Cli) -> eyre::Result<()> {
    color_eyre::install()?;
    let cfg = load_config(cli.config.as_deref())?;
    logging::init(cli.json, &cli.log_level, &cfg.logging)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::Relaxed);
        })
        .wrap_err("installing ctrl-c handler")?;
    }

    match cli.cmd {
        Commands::Publish {
            rt: rt_args,
            to,
            duration_ms,
        } => {
            rt::setup_rt_once(&rt_args);
            publish::run(
                &cfg,
                to.as_deref(),
                duration_ms.map(Duration::from_millis),
                &shutdown,
                cli.json,
            )
        }
        Commands::Control {
            rt: rt_args,
            listen,
            track,
        } => {
            rt::setup_rt_once(&rt_args);
            control::run(
                &cfg,
                listen.as_deref(),
                track.as_deref(),
                &shutdown,
                cli.json,
            )
        }
        Commands::Collect {
            out,
            fingers,
            samples,
        } => collect::run(
            &cfg,
            &out,
            fingers.as_deref(),
            samples,
            &shutdown,
            cli.json,
        ),
        Commands::SelfCheck => self_check(&cfg, cli.json),
    }
}

/// Absent path means built-in defaults. Parse and validation failures are
/// configuration errors.
fn load_config(path: Option<&Path>) -> eyre::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text = std::fs::read_to_string(path).map_err(|e| {
        TeleopError::Config(format!("cannot read {}: {e}", path.display()))
    })?;
    let cfg = teleop_config::load_toml(&text)
        .wrap_err_with(|| format!("parsing {}", path.display()))?;
    cfg.validate()
        .map_err(|e| TeleopError::Config(format!("{}: {e}", path.display())))?;
    Ok(cfg)
}

/// Build every runtime config and exercise each simulated collaborator once.
fn self_check(cfg: &Config, json: bool) -> eyre::Result<()> {
    PublisherCfg::try_from(cfg)?;
    CollectionCfg::try_from(cfg)?;
    let ccfg = ControlCfg::try_from(cfg)?;

    let glove = SimulatedGlove::new(GloveSim::default());
    let fingers = cfg.fingers.ranges.len();
    if fingers > glove.finger_channels() {
        return Err(TeleopError::ChannelOutOfRange {
            kind: "finger",
            id: fingers - 1,
            count: glove.finger_channels(),
        }
        .into());
    }
    let ids = (0..glove.position_channels())
        .map(ChannelId::Position)
        .chain((0..fingers).map(ChannelId::Finger));
    for id in ids {
        glove
            .read_channel(id)
            .map_err(|e| map_hw_error(e.as_ref()))?;
    }
    for b in 0..glove.button_count() {
        glove.read_button(b).map_err(|e| map_hw_error(e.as_ref()))?;
    }

    let home = ccfg.profile.home_pose();
    let mut robot = SimulatedRobot::new(home);
    robot
        .move_linear(&home, ccfg.servo.velocity, ccfg.servo.acceleration)
        .map_err(|e| map_hw_error(e.as_ref()))?;
    robot.stop().map_err(|e| map_hw_error(e.as_ref()))?;
    let mut gripper = SimulatedGripper::new();
    gripper.open().map_err(|e| map_hw_error(e.as_ref()))?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "command": "self-check", "status": "ok", "home": home.position })
        );
    } else {
        println!("self-check ok (home {:?})", home.position);
    }
    Ok(())
}

//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "teleop", version, about = "Glove-to-robot teleoperation")]
pub struct Cli {
    /// Path to config TOML; built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and report errors as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    #[inline]
    pub fn os_default() -> Self {
        if cfg!(target_os = "linux") {
            RtLock::Current
        } else {
            RtLock::None
        }
    }
}

/// Real-time knobs shared by the long-running commands.
#[derive(Args, Debug, Clone, Copy)]
pub struct RtArgs {
    /// Enable real-time mode (SCHED_FIFO, affinity, mlockall)
    #[arg(
        long,
        action = ArgAction::SetTrue,
        long_help = "Enable real-time mode on supported OSes.\n\nLinux: SCHED_FIFO priority, pinning to one CPU and mlockall according to --rt-lock.\n\nmacOS: only mlockall is applied."
    )]
    pub rt: bool,
    /// SCHED_FIFO priority (Linux only); defaults to the system maximum
    #[arg(long, value_name = "PRIO")]
    pub rt_prio: Option<i32>,
    /// Memory locking mode for --rt: none, current, or all
    #[arg(
        long,
        value_enum,
        value_name = "MODE",
        long_help = "Memory locking mode when --rt is enabled.\n- none: do not lock memory.\n- current: mlockall(MCL_CURRENT).\n- all: mlockall(MCL_CURRENT|MCL_FUTURE), falling back to current.\nDefault: current on Linux, none elsewhere."
    )]
    pub rt_lock: Option<RtLock>,
    /// CPU index to pin the process to (Linux only, default 0)
    #[arg(long, value_name = "CPU")]
    pub rt_cpu: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sample the glove and stream telemetry to the robot side
    Publish {
        #[command(flatten)]
        rt: RtArgs,
        /// Destination address (overrides telemetry.publish_to)
        #[arg(long, value_name = "ADDR")]
        to: Option<String>,
        /// Stop on its own after this many milliseconds
        #[arg(long, value_name = "MS")]
        duration_ms: Option<u64>,
    },
    /// Receive telemetry and drive the robot and gripper
    Control {
        #[command(flatten)]
        rt: RtArgs,
        /// Bind address (overrides telemetry.listen)
        #[arg(long, value_name = "ADDR")]
        listen: Option<String>,
        /// Write desired vs actual TCP positions to this CSV
        #[arg(long, value_name = "FILE")]
        track: Option<PathBuf>,
    },
    /// Record raw and filtered glove channels for offline evaluation
    Collect {
        /// Position channels CSV
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
        /// Also record finger channels to this CSV
        #[arg(long, value_name = "FILE")]
        fingers: Option<PathBuf>,
        /// Sample count (overrides acquisition.max_samples)
        #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
        samples: Option<u64>,
    },
    /// Quick health check of the simulated collaborators and config
    SelfCheck,
}

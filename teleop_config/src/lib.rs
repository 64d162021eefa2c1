#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the glove teleoperation stack.
//!
//! - `Config` and its tables are deserialized from TOML; every table has
//!   defaults so an empty file describes the reference glove + UR deployment.
//! - `Config::validate` rejects values the runtime cannot honour before any
//!   thread is spawned.
use serde::Deserialize;
use std::net::SocketAddr;

/// Highest filter order accepted by the Butterworth designer.
pub const MAX_FILTER_ORDER: u32 = 8;
/// Longest servo lookahead the controller accepts (s).
pub const MAX_LOOKAHEAD_S: f64 = 10.0;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Acquisition {
    /// Tick period of every acquisition group and of the publisher (us).
    pub period_us: u64,
    /// Stop data collection after this many ticks (None = until cancelled).
    pub max_samples: Option<u64>,
}

impl Default for Acquisition {
    fn default() -> Self {
        Self {
            period_us: 4_000,
            max_samples: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Pass guarded samples through unchanged.
    None,
    #[default]
    Sma,
    Lpf,
    /// LPF fed by an SMA.
    Blpma,
}

/// One filter stage. Fields not used by `kind` are ignored.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FilterCfg {
    pub kind: FilterKind,
    /// History length of the SMA or of the LPF (outer stage for blpma).
    pub window: usize,
    /// Inner SMA window for blpma.
    pub sma_window: usize,
    pub cutoff_hz: f64,
    pub order: u32,
}

impl Default for FilterCfg {
    fn default() -> Self {
        Self {
            kind: FilterKind::Sma,
            window: 10,
            sma_window: 10,
            cutoff_hz: 2.5,
            order: 3,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Position {
    /// Valid sensor range `[low, high]` per axis x, y, z.
    pub ranges: [[f64; 2]; 3],
    /// Stage applied on the glove side before publishing.
    pub publish_filter: FilterCfg,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            ranges: [[-22.5, 22.5], [0.0, 45.0], [-45.0, 0.0]],
            publish_filter: FilterCfg::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Fingers {
    /// Valid bend range per finger, thumb first.
    pub ranges: [[f64; 2]; 5],
    /// SMA window of each finger channel.
    pub window: usize,
    /// A finger counts as bent when within this distance of its upper limit.
    pub closed_offset: f64,
}

impl Default for Fingers {
    fn default() -> Self {
        Self {
            ranges: [[5.0, 65.0]; 5],
            window: 25,
            closed_offset: 10.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LimitGuard {
    /// Magnitude of the offset added to the last accepted sample on a glitch.
    pub epsilon: f64,
}

impl Default for LimitGuard {
    fn default() -> Self {
        Self { epsilon: 0.01 }
    }
}

/// The three evaluation stages recorded by `teleop collect`.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Collection {
    pub sma_window: usize,
    pub lpf_window: usize,
    pub cutoff_hz: f64,
    pub order: u32,
    pub blpma_sma_window: usize,
}

impl Default for Collection {
    fn default() -> Self {
        Self {
            sma_window: 100,
            lpf_window: 100,
            cutoff_hz: 2.5,
            order: 3,
            blpma_sma_window: 50,
        }
    }
}

/// Robot-side combined filter and loop period.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Control {
    pub sma_window: usize,
    pub lpf_window: usize,
    pub cutoff_hz: f64,
    pub order: u32,
    pub period_us: u64,
}

impl Default for Control {
    fn default() -> Self {
        Self {
            sma_window: 20,
            lpf_window: 100,
            cutoff_hz: 1.95,
            order: 3,
            period_us: 4_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RobotTarget {
    /// Universal Robots UR10e over RTDE.
    #[default]
    Ur,
    /// ABB IRB 1200 over EGM.
    Abb,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Servo {
    pub velocity: f64,
    pub acceleration: f64,
    pub period_us: u64,
    pub lookahead_s: f64,
    pub gain: f64,
    /// Multiplier on `velocity` for the initial move to home.
    pub home_speed_factor: f64,
}

impl Default for Servo {
    fn default() -> Self {
        Self {
            velocity: 0.05,
            acceleration: 0.5,
            period_us: 2_000,
            lookahead_s: 0.2,
            gain: 100.0,
            home_speed_factor: 10.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Robot {
    pub target: RobotTarget,
    /// Overrides of the target preset (mm).
    pub home: Option<[f64; 3]>,
    pub workspace: Option<[f64; 3]>,
    /// Robot axis `i` is driven by sensor axis `axis_map[i]`.
    pub axis_map: Option<[usize; 3]>,
    pub direction: Option<[f64; 3]>,
    pub servo: Servo,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Telemetry {
    /// Where the glove side sends datagrams.
    pub publish_to: String,
    /// Where the robot side receives them.
    pub listen: String,
    /// Stop the control loop when nothing arrives for this long.
    pub liveness_timeout_ms: Option<u64>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            publish_to: "127.0.0.1:5555".to_string(),
            listen: "127.0.0.1:5555".to_string(),
            liveness_timeout_ms: None,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub acquisition: Acquisition,
    pub position: Position,
    pub fingers: Fingers,
    pub limit_guard: LimitGuard,
    pub collection: Collection,
    pub control: Control,
    pub robot: Robot,
    pub telemetry: Telemetry,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Sampling rate in Hz for a tick period in microseconds.
#[inline]
pub fn rate_hz(period_us: u64) -> f64 {
    1_000_000.0 / period_us.max(1) as f64
}

fn check_range(name: &str, r: [f64; 2]) -> eyre::Result<()> {
    if !r[0].is_finite() || !r[1].is_finite() {
        eyre::bail!("{name}: bounds must be finite");
    }
    if r[0] >= r[1] {
        eyre::bail!("{name}: low must be < high");
    }
    Ok(())
}

fn check_lowpass(name: &str, cutoff_hz: f64, order: u32, period_us: u64) -> eyre::Result<()> {
    if !(cutoff_hz.is_finite() && cutoff_hz > 0.0) {
        eyre::bail!("{name}.cutoff_hz must be > 0");
    }
    let nyquist = rate_hz(period_us) / 2.0;
    if cutoff_hz >= nyquist {
        eyre::bail!("{name}.cutoff_hz must be < Nyquist ({nyquist} Hz)");
    }
    if order == 0 || order > MAX_FILTER_ORDER {
        eyre::bail!("{name}.order must be in 1..={MAX_FILTER_ORDER}");
    }
    Ok(())
}

impl Config {
    /// Validate semantic constraints that serde cannot express.
    pub fn validate(&self) -> eyre::Result<()> {
        if self.acquisition.period_us == 0 {
            eyre::bail!("acquisition.period_us must be > 0");
        }
        if self.acquisition.max_samples == Some(0) {
            eyre::bail!("acquisition.max_samples must be > 0 when set");
        }
        let acq_period = self.acquisition.period_us;

        for (i, r) in self.position.ranges.iter().enumerate() {
            check_range(&format!("position.ranges[{i}]"), *r)?;
        }
        let pf = &self.position.publish_filter;
        match pf.kind {
            FilterKind::None => {}
            FilterKind::Sma => {
                if pf.window == 0 {
                    eyre::bail!("position.publish_filter.window must be >= 1");
                }
            }
            FilterKind::Lpf | FilterKind::Blpma => {
                if pf.window == 0 {
                    eyre::bail!("position.publish_filter.window must be >= 1");
                }
                if pf.kind == FilterKind::Blpma && pf.sma_window == 0 {
                    eyre::bail!("position.publish_filter.sma_window must be >= 1");
                }
                check_lowpass(
                    "position.publish_filter",
                    pf.cutoff_hz,
                    pf.order,
                    acq_period,
                )?;
            }
        }

        for (i, r) in self.fingers.ranges.iter().enumerate() {
            check_range(&format!("fingers.ranges[{i}]"), *r)?;
        }
        if self.fingers.window == 0 {
            eyre::bail!("fingers.window must be >= 1");
        }
        if !(self.fingers.closed_offset.is_finite() && self.fingers.closed_offset >= 0.0) {
            eyre::bail!("fingers.closed_offset must be >= 0");
        }

        if !(self.limit_guard.epsilon.is_finite() && self.limit_guard.epsilon >= 0.0) {
            eyre::bail!("limit_guard.epsilon must be >= 0");
        }

        let c = &self.collection;
        if c.sma_window == 0 || c.lpf_window == 0 || c.blpma_sma_window == 0 {
            eyre::bail!("collection windows must be >= 1");
        }
        check_lowpass("collection", c.cutoff_hz, c.order, acq_period)?;

        let k = &self.control;
        if k.period_us == 0 {
            eyre::bail!("control.period_us must be > 0");
        }
        if k.sma_window == 0 || k.lpf_window == 0 {
            eyre::bail!("control windows must be >= 1");
        }
        // The robot side filters at the publisher's rate, not its own.
        check_lowpass("control", k.cutoff_hz, k.order, acq_period)?;

        let r = &self.robot;
        if r
            .workspace
            .is_some_and(|ws| ws.iter().any(|v| !(v.is_finite() && *v > 0.0)))
        {
            eyre::bail!("robot.workspace sizes must be > 0");
        }
        if r.home.is_some_and(|h| h.iter().any(|v| !v.is_finite())) {
            eyre::bail!("robot.home must be finite");
        }
        if r
            .direction
            .is_some_and(|d| d.iter().any(|v| *v != 1.0 && *v != -1.0))
        {
            eyre::bail!("robot.direction components must be 1 or -1");
        }
        if let Some(map) = r.axis_map {
            let mut seen = [false; 3];
            for &a in &map {
                if a > 2 || seen[a] {
                    eyre::bail!("robot.axis_map must be a permutation of [0, 1, 2]");
                }
                seen[a] = true;
            }
        }
        let s = &r.servo;
        if !(s.velocity.is_finite() && s.velocity > 0.0) {
            eyre::bail!("robot.servo.velocity must be > 0");
        }
        if !(s.acceleration.is_finite() && s.acceleration > 0.0) {
            eyre::bail!("robot.servo.acceleration must be > 0");
        }
        if s.period_us == 0 {
            eyre::bail!("robot.servo.period_us must be > 0");
        }
        if !(s.lookahead_s > 0.0 && s.lookahead_s <= MAX_LOOKAHEAD_S) {
            eyre::bail!("robot.servo.lookahead_s must be in (0, {MAX_LOOKAHEAD_S}]");
        }
        if !(s.gain.is_finite() && s.gain > 0.0) {
            eyre::bail!("robot.servo.gain must be > 0");
        }
        if !(s.home_speed_factor.is_finite() && s.home_speed_factor > 0.0) {
            eyre::bail!("robot.servo.home_speed_factor must be > 0");
        }

        self.telemetry
            .publish_to
            .parse::<SocketAddr>()
            .map_err(|e| eyre::eyre!("telemetry.publish_to is not a socket address: {e}"))?;
        self.telemetry
            .listen
            .parse::<SocketAddr>()
            .map_err(|e| eyre::eyre!("telemetry.listen is not a socket address: {e}"))?;
        if self.telemetry.liveness_timeout_ms == Some(0) {
            eyre::bail!("telemetry.liveness_timeout_ms must be > 0 when set");
        }

        if self
            .logging
            .rotation
            .as_deref()
            .is_some_and(|rot| !matches!(rot, "never" | "daily" | "hourly"))
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }
        Ok(())
    }
}

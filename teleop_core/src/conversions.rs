//! Bridges from `teleop_config` schema types to the runtime structs in
//! [`crate::config`]. Run `Config::validate` first; these only re-check what
//! the runtime types themselves require.

use crate::config::{CollectionCfg, ControlCfg, FilterSpec, GestureCfg, PublisherCfg};
use crate::error::BuildError;
use crate::guard::SensorRange;
use crate::mapper::RobotProfile;
use std::time::Duration;
use teleop_config::{Config, FilterCfg, FilterKind, RobotTarget};
use teleop_traits::ServoParams;

fn ranges<const N: usize>(raw: &[[f64; 2]; N]) -> Result<[SensorRange; N], BuildError> {
    let mut out = [SensorRange { low: 0.0, high: 0.0 }; N];
    for (slot, &r) in out.iter_mut().zip(raw) {
        *slot = SensorRange::try_from(r)?;
    }
    Ok(out)
}

fn acquisition_period(c: &Config) -> Duration {
    Duration::from_micros(c.acquisition.period_us)
}

// ── FilterSpec ───────────────────────────────────────────────────────────────

impl FilterSpec {
    /// Publish-side filter for channels sampled at `sample_hz`.
    pub fn from_config(c: &FilterCfg, sample_hz: f64) -> Self {
        match c.kind {
            FilterKind::None => Self::Passthrough,
            FilterKind::Sma => Self::Sma { window: c.window },
            FilterKind::Lpf => Self::Lpf {
                window: c.window,
                order: c.order,
                cutoff_hz: c.cutoff_hz,
                sample_hz,
            },
            FilterKind::Blpma => Self::Blpma {
                sma_window: c.sma_window,
                lpf_window: c.window,
                order: c.order,
                cutoff_hz: c.cutoff_hz,
                sample_hz,
            },
        }
    }
}

// ── RobotProfile ─────────────────────────────────────────────────────────────

impl From<&teleop_config::Robot> for RobotProfile {
    fn from(c: &teleop_config::Robot) -> Self {
        let base = match c.target {
            RobotTarget::Ur => Self::ur10e(),
            RobotTarget::Abb => Self::abb_irb1200(),
        };
        Self {
            home: c.home.unwrap_or(base.home),
            workspace: c.workspace.unwrap_or(base.workspace),
            axis_map: c.axis_map.unwrap_or(base.axis_map),
            direction: c.direction.unwrap_or(base.direction),
            ..base
        }
    }
}

pub fn servo_params(c: &teleop_config::Servo) -> Result<ServoParams, BuildError> {
    let lookahead = Duration::try_from_secs_f64(c.lookahead_s)
        .map_err(|_| BuildError::InvalidConfig("robot.servo.lookahead_s out of range"))?;
    Ok(ServoParams {
        velocity: c.velocity,
        acceleration: c.acceleration,
        period: Duration::from_micros(c.period_us),
        lookahead,
        gain: c.gain,
    })
}

// ── PublisherCfg ─────────────────────────────────────────────────────────────

impl TryFrom<&Config> for PublisherCfg {
    type Error = BuildError;

    fn try_from(c: &Config) -> Result<Self, Self::Error> {
        let period = acquisition_period(c);
        Ok(Self {
            period,
            position_ranges: ranges(&c.position.ranges)?,
            position_filter: FilterSpec::from_config(
                &c.position.publish_filter,
                crate::util::rate_hz(period),
            ),
            gesture: GestureCfg {
                ranges: ranges(&c.fingers.ranges)?.to_vec(),
                window: c.fingers.window,
                closed_offset: c.fingers.closed_offset,
            },
            epsilon: c.limit_guard.epsilon,
        })
    }
}

// ── CollectionCfg ────────────────────────────────────────────────────────────

impl TryFrom<&Config> for CollectionCfg {
    type Error = BuildError;

    fn try_from(c: &Config) -> Result<Self, Self::Error> {
        Ok(Self {
            period: acquisition_period(c),
            max_samples: c.acquisition.max_samples,
            position_ranges: ranges(&c.position.ranges)?,
            finger_ranges: ranges(&c.fingers.ranges)?.to_vec(),
            sma_window: c.collection.sma_window,
            lpf_window: c.collection.lpf_window,
            blpma_sma_window: c.collection.blpma_sma_window,
            cutoff_hz: c.collection.cutoff_hz,
            order: c.collection.order,
            epsilon: c.limit_guard.epsilon,
        })
    }
}

// ── ControlCfg ───────────────────────────────────────────────────────────────

impl TryFrom<&Config> for ControlCfg {
    type Error = BuildError;

    fn try_from(c: &Config) -> Result<Self, Self::Error> {
        // Messages arrive at the acquisition rate; the filter runs at that rate.
        let sample_hz = crate::util::rate_hz(acquisition_period(c));
        if c.control.period_us == 0 {
            return Err(BuildError::InvalidConfig("control.period_us must be > 0"));
        }
        Ok(Self {
            period: Duration::from_micros(c.control.period_us),
            sensor_ranges: ranges(&c.position.ranges)?,
            filter: FilterSpec::Blpma {
                sma_window: c.control.sma_window,
                lpf_window: c.control.lpf_window,
                order: c.control.order,
                cutoff_hz: c.control.cutoff_hz,
                sample_hz,
            },
            epsilon: c.limit_guard.epsilon,
            profile: RobotProfile::from(&c.robot),
            servo: servo_params(&c.robot.servo)?,
            home_speed_factor: c.robot.servo.home_speed_factor,
            liveness_timeout: c.telemetry.liveness_timeout_ms.map(Duration::from_millis),
        })
    }
}

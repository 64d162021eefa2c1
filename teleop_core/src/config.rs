//! Immutable runtime configuration handed to components at construction.
//!
//! These are the validated, typed counterparts of the `teleop_config`
//! schema; see `conversions` for the mapping.
use crate::error::BuildError;
use crate::filter::{Blpma, Lpf, Passthrough, SignalFilter, Sma};
use crate::guard::{LimitGuard, SensorRange};
use crate::mapper::RobotProfile;
use std::time::Duration;
use teleop_traits::ServoParams;

/// Which smoothing stage a channel runs, with its parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterSpec {
    Passthrough,
    Sma {
        window: usize,
    },
    Lpf {
        window: usize,
        order: u32,
        cutoff_hz: f64,
        sample_hz: f64,
    },
    Blpma {
        sma_window: usize,
        lpf_window: usize,
        order: u32,
        cutoff_hz: f64,
        sample_hz: f64,
    },
}

impl FilterSpec {
    pub fn build(&self, guard: LimitGuard) -> Result<Box<dyn SignalFilter>, BuildError> {
        Ok(match *self {
            FilterSpec::Passthrough => Box::new(Passthrough::new(guard)),
            FilterSpec::Sma { window } => Box::new(Sma::new(window, guard)?),
            FilterSpec::Lpf {
                window,
                order,
                cutoff_hz,
                sample_hz,
            } => Box::new(Lpf::new(window, order, cutoff_hz, sample_hz, guard)?),
            FilterSpec::Blpma {
                sma_window,
                lpf_window,
                order,
                cutoff_hz,
                sample_hz,
            } => Box::new(Blpma::new(
                sma_window, lpf_window, order, cutoff_hz, sample_hz, guard,
            )?),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GestureCfg {
    pub ranges: Vec<SensorRange>,
    pub window: usize,
    pub closed_offset: f64,
}

/// Glove side: acquisition groups and publishing.
#[derive(Debug, Clone, PartialEq)]
pub struct PublisherCfg {
    pub period: Duration,
    pub position_ranges: [SensorRange; 3],
    pub position_filter: FilterSpec,
    pub gesture: GestureCfg,
    pub epsilon: f64,
}

/// Data-collection run: raw plus the three evaluated stages per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionCfg {
    pub period: Duration,
    pub max_samples: Option<u64>,
    pub position_ranges: [SensorRange; 3],
    pub finger_ranges: Vec<SensorRange>,
    pub sma_window: usize,
    pub lpf_window: usize,
    pub blpma_sma_window: usize,
    pub cutoff_hz: f64,
    pub order: u32,
    pub epsilon: f64,
}

impl CollectionCfg {
    pub fn sample_hz(&self) -> f64 {
        crate::util::rate_hz(self.period)
    }
}

/// Robot side: combined filter, mapping and servo settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlCfg {
    pub period: Duration,
    pub sensor_ranges: [SensorRange; 3],
    /// Combined filter applied per sensor axis.
    pub filter: FilterSpec,
    pub epsilon: f64,
    pub profile: RobotProfile,
    pub servo: ServoParams,
    pub home_speed_factor: f64,
    /// How long to wait for a message before giving up (None = forever).
    pub liveness_timeout: Option<Duration>,
}

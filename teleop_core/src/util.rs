//! Small numeric helpers shared by filters and the mapper.

use std::time::Duration;

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Sampling rate in Hz for a period, as used by filter design.
#[inline]
pub fn rate_hz(period: Duration) -> f64 {
    let us = period.as_micros().max(1) as f64;
    MICROS_PER_SEC as f64 / us
}

/// Round half away from zero to `decimals` places.
#[inline]
pub fn round_to(x: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals.min(15) as i32);
    (x * scale).round() / scale
}

//! Rejection of single-sample glitches before they reach filter state.
//!
//! A sample outside its channel's valid range is never stored. It is
//! replaced by the last accepted value nudged by `±epsilon`, sign chosen at
//! random, so the history stays continuous and the substitute is visibly
//! synthetic rather than a repeated exact value.
use crate::error::BuildError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorRange {
    pub low: f64,
    pub high: f64,
}

impl SensorRange {
    pub fn new(low: f64, high: f64) -> Result<Self, BuildError> {
        if !(low.is_finite() && high.is_finite()) || low >= high {
            return Err(BuildError::InvalidRange { low, high });
        }
        Ok(Self { low, high })
    }

    /// Inclusive bounds check; NaN is never contained.
    #[inline]
    pub fn contains(&self, v: f64) -> bool {
        self.low <= v && v <= self.high
    }

    #[inline]
    pub fn midpoint(&self) -> f64 {
        (self.low + self.high) / 2.0
    }

    #[inline]
    pub fn span(&self) -> f64 {
        (self.high - self.low).abs()
    }
}

impl TryFrom<[f64; 2]> for SensorRange {
    type Error = BuildError;

    fn try_from(r: [f64; 2]) -> Result<Self, Self::Error> {
        Self::new(r[0], r[1])
    }
}

#[derive(Debug, Clone)]
pub struct LimitGuard {
    range: SensorRange,
    epsilon: f64,
    rng: StdRng,
    rejected: u64,
}

impl LimitGuard {
    pub fn new(range: SensorRange, epsilon: f64) -> Self {
        Self::with_rng(range, epsilon, StdRng::from_entropy())
    }

    /// Deterministic sign sequence for reproducible runs.
    pub fn with_seed(range: SensorRange, epsilon: f64, seed: u64) -> Self {
        Self::with_rng(range, epsilon, StdRng::seed_from_u64(seed))
    }

    fn with_rng(range: SensorRange, epsilon: f64, rng: StdRng) -> Self {
        Self {
            range,
            epsilon: epsilon.abs(),
            rng,
            rejected: 0,
        }
    }

    #[inline]
    pub fn range(&self) -> SensorRange {
        self.range
    }

    #[inline]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Number of samples replaced so far.
    #[inline]
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Accept `value` if it lies in range, otherwise substitute
    /// `last ± epsilon` (or `±epsilon` with no history).
    pub fn check(&mut self, value: f64, last: Option<f64>) -> f64 {
        if self.range.contains(value) {
            return value;
        }
        self.rejected += 1;
        let offset = if self.rng.gen_bool(0.5) {
            self.epsilon
        } else {
            -self.epsilon
        };
        let substitute = last.unwrap_or(0.0) + offset;
        tracing::trace!(
            value,
            substitute,
            low = self.range.low,
            high = self.range.high,
            "out-of-range sample replaced"
        );
        substitute
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> SensorRange {
        SensorRange::new(-22.5, 22.5).expect("valid range")
    }

    #[test]
    fn in_range_passes_through() {
        let mut g = LimitGuard::with_seed(range(), 0.01, 1);
        assert_eq!(g.check(22.5, Some(3.0)), 22.5);
        assert_eq!(g.check(-22.5, None), -22.5);
        assert_eq!(g.rejected(), 0);
    }

    #[test]
    fn glitch_with_history_is_last_plus_minus_epsilon() {
        let mut g = LimitGuard::with_seed(range(), 0.01, 7);
        for _ in 0..64 {
            let v = g.check(999.0, Some(4.0));
            assert!((v - 3.99).abs() < 1e-12 || (v - 4.01).abs() < 1e-12, "{v}");
        }
        assert_eq!(g.rejected(), 64);
    }

    #[test]
    fn glitch_without_history_is_offset_alone() {
        let mut g = LimitGuard::with_seed(range(), 0.01, 3);
        let v = g.check(f64::NAN, None);
        assert!((v.abs() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn both_signs_occur() {
        let mut g = LimitGuard::with_seed(range(), 0.5, 11);
        let outs: Vec<f64> = (0..200).map(|_| g.check(-100.0, Some(0.0))).collect();
        assert!(outs.iter().any(|v| *v > 0.0));
        assert!(outs.iter().any(|v| *v < 0.0));
    }

    #[test]
    fn inverted_range_rejected() {
        assert_eq!(
            SensorRange::new(45.0, 0.0),
            Err(BuildError::InvalidRange {
                low: 45.0,
                high: 0.0
            })
        );
        assert!(SensorRange::try_from([0.0, f64::INFINITY]).is_err());
    }
}

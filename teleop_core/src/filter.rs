//! Per-channel smoothing stages.
//!
//! Every stage owns a bounded history and the [`LimitGuard`] of its channel.
//! Histories never exceed their window; the oldest sample is evicted when a
//! new one arrives on a full history.
use crate::butterworth::{self, Coefficients};
use crate::error::BuildError;
use crate::guard::LimitGuard;
use std::collections::VecDeque;

pub trait SignalFilter: Send {
    /// Feed one raw sample and return the filtered estimate.
    fn compute(&mut self, raw: f64) -> f64;
    /// Samples currently retained (outer stage for cascades).
    fn len(&self) -> usize;
    fn window(&self) -> usize;
    fn reset(&mut self);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Guard-only stage: forwards accepted samples unchanged.
#[derive(Debug, Clone)]
pub struct Passthrough {
    guard: LimitGuard,
    last: Option<f64>,
}

impl Passthrough {
    pub fn new(guard: LimitGuard) -> Self {
        Self { guard, last: None }
    }
}

impl SignalFilter for Passthrough {
    fn compute(&mut self, raw: f64) -> f64 {
        let v = self.guard.check(raw, self.last);
        self.last = Some(v);
        v
    }
    fn len(&self) -> usize {
        usize::from(self.last.is_some())
    }
    fn window(&self) -> usize {
        1
    }
    fn reset(&mut self) {
        self.last = None;
    }
}

/// Simple moving average over the last `window` accepted samples.
///
/// The mean is the newest sample plus the mean deviation from it; a window
/// full of one value yields exactly that value.
#[derive(Debug, Clone)]
pub struct Sma {
    guard: LimitGuard,
    history: VecDeque<f64>,
    window: usize,
}

impl Sma {
    pub fn new(window: usize, guard: LimitGuard) -> Result<Self, BuildError> {
        if window == 0 {
            return Err(BuildError::ZeroWindow);
        }
        Ok(Self {
            guard,
            history: VecDeque::with_capacity(window + 1),
            window,
        })
    }

    #[inline]
    pub fn history(&self) -> &VecDeque<f64> {
        &self.history
    }

    #[inline]
    pub fn guard(&self) -> &LimitGuard {
        &self.guard
    }
}

impl SignalFilter for Sma {
    fn compute(&mut self, raw: f64) -> f64 {
        let v = self.guard.check(raw, self.history.back().copied());
        self.history.push_back(v);
        if self.history.len() > self.window {
            self.history.pop_front();
        }
        let deviation: f64 = self.history.iter().map(|x| x - v).sum();
        v + deviation / self.history.len() as f64
    }
    fn len(&self) -> usize {
        self.history.len()
    }
    fn window(&self) -> usize {
        self.window
    }
    fn reset(&mut self) {
        self.history.clear();
    }
}

/// Butterworth low-pass recomputed from rest over the retained window.
///
/// No recursive state survives between calls except the raw history: each
/// `compute` filters the whole window with zero initial conditions and
/// returns the newest output. This is not equivalent to a streaming IIR.
#[derive(Debug, Clone)]
pub struct Lpf {
    guard: Option<LimitGuard>,
    coeffs: Coefficients,
    history: VecDeque<f64>,
    window: usize,
    scratch: Vec<f64>,
}

impl Lpf {
    pub fn new(
        window: usize,
        order: u32,
        cutoff_hz: f64,
        sample_hz: f64,
        guard: LimitGuard,
    ) -> Result<Self, BuildError> {
        let coeffs = butterworth::design_lowpass(
            order,
            butterworth::normalized_cutoff(cutoff_hz, sample_hz),
        )?;
        Self::from_coefficients(window, coeffs, Some(guard))
    }

    /// Build from precomputed coefficients; `guard = None` trusts the input.
    pub fn from_coefficients(
        window: usize,
        coeffs: Coefficients,
        guard: Option<LimitGuard>,
    ) -> Result<Self, BuildError> {
        if window == 0 {
            return Err(BuildError::ZeroWindow);
        }
        Ok(Self {
            guard,
            coeffs,
            history: VecDeque::with_capacity(window + 1),
            window,
            scratch: Vec::with_capacity(window),
        })
    }

    #[inline]
    pub fn coefficients(&self) -> &Coefficients {
        &self.coeffs
    }

    #[inline]
    pub fn history(&self) -> &VecDeque<f64> {
        &self.history
    }

    fn push(&mut self, v: f64) -> f64 {
        self.history.push_back(v);
        if self.history.len() > self.window {
            self.history.pop_front();
        }
        butterworth::filter_last(&self.coeffs, &self.history, &mut self.scratch)
    }
}

impl SignalFilter for Lpf {
    fn compute(&mut self, raw: f64) -> f64 {
        let last = self.history.back().copied();
        let v = match self.guard.as_mut() {
            Some(g) => g.check(raw, last),
            None => raw,
        };
        self.push(v)
    }
    fn len(&self) -> usize {
        self.history.len()
    }
    fn window(&self) -> usize {
        self.window
    }
    fn reset(&mut self) {
        self.history.clear();
        self.scratch.clear();
    }
}

/// LPF fed by an SMA, each with its own window.
#[derive(Debug, Clone)]
pub struct Blpma {
    sma: Sma,
    lpf: Lpf,
}

impl Blpma {
    pub fn new(
        sma_window: usize,
        lpf_window: usize,
        order: u32,
        cutoff_hz: f64,
        sample_hz: f64,
        guard: LimitGuard,
    ) -> Result<Self, BuildError> {
        let coeffs = butterworth::design_lowpass(
            order,
            butterworth::normalized_cutoff(cutoff_hz, sample_hz),
        )?;
        Ok(Self {
            sma: Sma::new(sma_window, guard)?,
            // The SMA stage already guarded the input.
            lpf: Lpf::from_coefficients(lpf_window, coeffs, None)?,
        })
    }

    #[inline]
    pub fn sma(&self) -> &Sma {
        &self.sma
    }

    #[inline]
    pub fn lpf(&self) -> &Lpf {
        &self.lpf
    }
}

impl SignalFilter for Blpma {
    fn compute(&mut self, raw: f64) -> f64 {
        let smoothed = self.sma.compute(raw);
        self.lpf.compute(smoothed)
    }
    fn len(&self) -> usize {
        self.lpf.len()
    }
    fn window(&self) -> usize {
        self.lpf.window()
    }
    fn reset(&mut self) {
        self.sma.reset();
        self.lpf.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::SensorRange;
    use rstest::rstest;

    fn guard() -> LimitGuard {
        LimitGuard::with_seed(SensorRange::new(-50.0, 50.0).expect("range"), 0.01, 42)
    }

    #[test]
    fn sma_is_mean_of_window() {
        let mut f = Sma::new(3, guard()).expect("sma");
        assert_eq!(f.compute(3.0), 3.0);
        assert_eq!(f.compute(6.0), 4.5);
        assert_eq!(f.compute(9.0), 6.0);
        assert_eq!(f.compute(12.0), 9.0);
        assert_eq!(f.len(), 3);
        assert_eq!(f.history().iter().copied().collect::<Vec<_>>(), vec![6.0, 9.0, 12.0]);
    }

    #[test]
    fn sma_settles_exactly_after_mixed_history() {
        let mut f = Sma::new(3, guard()).expect("sma");
        for v in [49.9, -33.3, 0.7, 12.1, -7.77] {
            f.compute(v);
        }
        let mut out = f64::NAN;
        for _ in 0..3 {
            out = f.compute(0.1);
        }
        assert_eq!(out, 0.1);
    }

    #[rstest]
    #[case(1, 5)]
    #[case(5, 3)]
    #[case(5, 5)]
    #[case(5, 12)]
    #[case(100, 250)]
    fn history_length_is_min_of_calls_and_window(#[case] window: usize, #[case] calls: usize) {
        let mut sma = Sma::new(window, guard()).expect("sma");
        let mut lpf = Lpf::new(window, 2, 10.0, 100.0, guard()).expect("lpf");
        for i in 0..calls {
            sma.compute(i as f64 * 0.1);
            lpf.compute(i as f64 * 0.1);
        }
        assert_eq!(sma.len(), calls.min(window));
        assert_eq!(lpf.len(), calls.min(window));
    }

    #[test]
    fn sma_glitch_does_not_enter_history() {
        let mut f = Sma::new(4, guard()).expect("sma");
        f.compute(10.0);
        let out = f.compute(500.0);
        let last = *f.history().back().expect("non-empty");
        assert!((last - 10.0).abs() <= 0.01 + 1e-12);
        assert!((out - 10.0).abs() <= 0.005 + 1e-12);
        assert_eq!(f.guard().rejected(), 1);
    }

    #[test]
    fn lpf_settles_on_constant_input() {
        // Wn = 0.2 settles within a few dozen samples.
        let mut f = Lpf::new(100, 2, 10.0, 100.0, guard()).expect("lpf");
        let mut out = 0.0;
        for _ in 0..150 {
            out = f.compute(5.0);
        }
        assert!((out - 5.0).abs() < 1e-9, "{out}");
    }

    #[test]
    fn lpf_restarts_from_rest_every_call() {
        // With a full-history recompute, the output for a constant window is
        // the step response at sample `len`, independent of earlier inputs.
        let mut a = Lpf::new(4, 2, 10.0, 100.0, guard()).expect("lpf");
        let mut b = Lpf::new(4, 2, 10.0, 100.0, guard()).expect("lpf");
        for v in [40.0, -40.0, 30.0, 1.0, 1.0, 1.0, 1.0] {
            a.compute(v);
        }
        let mut last = 0.0;
        for _ in 0..4 {
            last = b.compute(1.0);
        }
        assert!((a.compute(1.0) - b.compute(1.0)).abs() < 1e-12);
        assert!(last > 0.0 && last < 1.0);
    }

    #[test]
    fn blpma_keeps_two_histories() {
        let mut f = Blpma::new(3, 5, 2, 10.0, 100.0, guard()).expect("blpma");
        for i in 0..10 {
            f.compute(f64::from(i));
        }
        assert_eq!(f.sma().len(), 3);
        assert_eq!(f.lpf().len(), 5);
        assert_eq!(f.len(), 5);
        assert_eq!(f.window(), 5);
    }

    #[test]
    fn blpma_settles_on_constant_input() {
        let mut f = Blpma::new(10, 100, 2, 10.0, 100.0, guard()).expect("blpma");
        let mut out = 0.0;
        for _ in 0..200 {
            out = f.compute(-7.25);
        }
        assert!((out + 7.25).abs() < 1e-9, "{out}");
    }

    #[test]
    fn reset_clears_state() {
        let mut f = Blpma::new(3, 3, 1, 5.0, 100.0, guard()).expect("blpma");
        f.compute(1.0);
        f.reset();
        assert!(f.is_empty());
        assert!(f.sma().is_empty());
    }

    #[test]
    fn zero_window_rejected() {
        assert_eq!(Sma::new(0, guard()).err(), Some(BuildError::ZeroWindow));
        assert!(matches!(
            Lpf::new(10, 3, 200.0, 250.0, guard()),
            Err(BuildError::InvalidCutoff(_))
        ));
    }

    #[test]
    fn passthrough_only_guards() {
        let mut f = Passthrough::new(guard());
        assert_eq!(f.compute(12.5), 12.5);
        let v = f.compute(f64::INFINITY);
        assert!((v - 12.5).abs() <= 0.01 + 1e-12);
        assert_eq!(f.len(), 1);
    }
}

//! Digital Butterworth low-pass design and zero-state recursive filtering.
//!
//! Coefficients come from the analog prototype: poles on the unit circle in
//! the left half plane, frequency prewarping, then the bilinear transform
//! with all zeros at z = -1. The result matches the classic `butter(N, Wn)`
//! design (`a[0] == 1`, unity gain at DC).
use crate::error::BuildError;
use std::collections::VecDeque;
use std::f64::consts::PI;
use std::ops::{Add, Div, Mul, Sub};

/// Highest order accepted; beyond this the transfer-function form loses
/// too much precision to be useful.
pub const MAX_ORDER: u32 = teleop_config::MAX_FILTER_ORDER;

/// Transfer function `B(z) / A(z)` with `a[0] == 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficients {
    pub b: Vec<f64>,
    pub a: Vec<f64>,
}

impl Coefficients {
    #[inline]
    pub fn order(&self) -> usize {
        self.a.len().saturating_sub(1)
    }

    /// Gain at zero frequency, `sum(b) / sum(a)`.
    pub fn dc_gain(&self) -> f64 {
        self.b.iter().sum::<f64>() / self.a.iter().sum::<f64>()
    }
}

/// Cutoff normalised to Nyquist: `cutoff / (sample / 2)`.
#[inline]
pub fn normalized_cutoff(cutoff_hz: f64, sample_hz: f64) -> f64 {
    cutoff_hz / (sample_hz / 2.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Complex {
    re: f64,
    im: f64,
}

impl Complex {
    const ZERO: Self = Self { re: 0.0, im: 0.0 };
    const ONE: Self = Self { re: 1.0, im: 0.0 };

    fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }
    fn cis(theta: f64) -> Self {
        Self::new(theta.cos(), theta.sin())
    }
    fn scale(self, k: f64) -> Self {
        Self::new(self.re * k, self.im * k)
    }
}

impl Add for Complex {
    type Output = Self;
    fn add(self, o: Self) -> Self {
        Self::new(self.re + o.re, self.im + o.im)
    }
}

impl Sub for Complex {
    type Output = Self;
    fn sub(self, o: Self) -> Self {
        Self::new(self.re - o.re, self.im - o.im)
    }
}

impl Mul for Complex {
    type Output = Self;
    fn mul(self, o: Self) -> Self {
        Self::new(
            self.re * o.re - self.im * o.im,
            self.re * o.im + self.im * o.re,
        )
    }
}

impl Div for Complex {
    type Output = Self;
    fn div(self, o: Self) -> Self {
        let d = o.re * o.re + o.im * o.im;
        Self::new(
            (self.re * o.re + self.im * o.im) / d,
            (self.im * o.re - self.re * o.im) / d,
        )
    }
}

/// Monic polynomial coefficients (highest power first) with the given roots.
fn poly(roots: &[Complex]) -> Vec<Complex> {
    let mut c = vec![Complex::ONE];
    for &r in roots {
        let mut next = Vec::with_capacity(c.len() + 1);
        for i in 0..=c.len() {
            let keep = c.get(i).copied().unwrap_or(Complex::ZERO);
            let shifted = if i > 0 { r * c[i - 1] } else { Complex::ZERO };
            next.push(keep - shifted);
        }
        c = next;
    }
    c
}

/// Design an `order`-th order low-pass with cutoff `wn` in (0, 1), where 1
/// is Nyquist.
pub fn design_lowpass(order: u32, wn: f64) -> Result<Coefficients, BuildError> {
    if order == 0 || order > MAX_ORDER {
        return Err(BuildError::InvalidOrder {
            order,
            max: MAX_ORDER,
        });
    }
    if !(wn.is_finite() && wn > 0.0 && wn < 1.0) {
        return Err(BuildError::InvalidCutoff(wn));
    }
    let n = order as usize;
    let nf = f64::from(order);

    // Design at fs = 2 so that wn maps directly onto the digital axis.
    let fs2 = 4.0;
    let warped = fs2 * (PI * wn / 2.0).tan();

    let analog: Vec<Complex> = (1..=n)
        .map(|k| Complex::cis(PI * (2.0 * k as f64 + nf - 1.0) / (2.0 * nf)).scale(warped))
        .collect();

    let fs2c = Complex::new(fs2, 0.0);
    let mut den = Complex::ONE;
    let digital: Vec<Complex> = analog
        .iter()
        .map(|&p| {
            den = den * (fs2c - p);
            (fs2c + p) / (fs2c - p)
        })
        .collect();
    let gain = warped.powi(order as i32) / den.re;

    let zeros = vec![Complex::new(-1.0, 0.0); n];
    let b = poly(&zeros).into_iter().map(|c| c.re * gain).collect();
    let a = poly(&digital).into_iter().map(|c| c.re).collect();
    Ok(Coefficients { b, a })
}

/// Run the filter from rest over `input` and return the final output.
///
/// `scratch` receives every output sample; it is reused across calls to
/// keep the hot path allocation-free once warmed up.
pub fn filter_last(c: &Coefficients, input: &VecDeque<f64>, scratch: &mut Vec<f64>) -> f64 {
    scratch.clear();
    let a0 = c.a[0];
    for n in 0..input.len() {
        let mut acc = 0.0;
        for (k, bk) in c.b.iter().enumerate().take(n + 1) {
            acc += bk * input[n - k];
        }
        for (k, ak) in c.a.iter().enumerate().take(n + 1).skip(1) {
            acc -= ak * scratch[n - k];
        }
        scratch.push(acc / a0);
    }
    scratch.last().copied().unwrap_or(0.0)
}

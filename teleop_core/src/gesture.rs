//! Open/closed hand classification from finger bend sensors.
use crate::config::GestureCfg;
use crate::error::{BuildError, TeleopError};
use crate::filter::{SignalFilter, Sma};
use crate::guard::{LimitGuard, SensorRange};

#[derive(Debug, Clone)]
struct Finger {
    sma: Sma,
    upper: f64,
}

/// One SMA per finger; the hand is closed when every finger is bent to
/// within `closed_offset` of its upper limit.
#[derive(Debug, Clone)]
pub struct GestureRecognizer {
    fingers: Vec<Finger>,
    closed_offset: f64,
}

impl GestureRecognizer {
    pub fn new(cfg: &GestureCfg, epsilon: f64) -> Result<Self, BuildError> {
        let fingers = cfg
            .ranges
            .iter()
            .map(|&r| {
                Ok(Finger {
                    sma: Sma::new(cfg.window, LimitGuard::new(r, epsilon))?,
                    upper: r.high,
                })
            })
            .collect::<Result<Vec<_>, BuildError>>()?;
        Ok(Self {
            fingers,
            closed_offset: cfg.closed_offset,
        })
    }

    /// Deterministic variant for tests and replays.
    pub fn with_seed(cfg: &GestureCfg, epsilon: f64, seed: u64) -> Result<Self, BuildError> {
        let mut g = Self::new(cfg, epsilon)?;
        for (i, (f, r)) in g.fingers.iter_mut().zip(&cfg.ranges).enumerate() {
            f.sma = Sma::new(cfg.window, LimitGuard::with_seed(*r, epsilon, seed + i as u64))?;
        }
        Ok(g)
    }

    #[inline]
    pub fn finger_count(&self) -> usize {
        self.fingers.len()
    }

    /// Filter one raw bend sample per finger and classify the hand.
    ///
    /// Fingers are visited in order and the first finger outside its closed
    /// band ends the check: that finger reports the hand open and the
    /// fingers after it are not updated on this call.
    pub fn is_hand_closed(&mut self, bends: &[f64]) -> Result<bool, TeleopError> {
        if bends.len() != self.fingers.len() {
            return Err(TeleopError::ChannelOutOfRange {
                kind: "finger",
                id: bends.len(),
                count: self.fingers.len(),
            });
        }
        for (finger, &raw) in self.fingers.iter_mut().zip(bends) {
            let v = finger.sma.compute(raw);
            let band = SensorRange {
                low: finger.upper - self.closed_offset,
                high: finger.upper,
            };
            if !band.contains(v) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Samples held by each finger's filter, thumb first.
    pub fn history_lens(&self) -> Vec<usize> {
        self.fingers.iter().map(|f| f.sma.len()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(window: usize) -> GestureCfg {
        GestureCfg {
            ranges: vec![SensorRange::new(5.0, 65.0).expect("range"); 5],
            window,
            closed_offset: 10.0,
        }
    }

    #[test]
    fn fist_is_closed_flat_hand_is_open() {
        let mut g = GestureRecognizer::with_seed(&cfg(1), 0.01, 1).expect("build");
        assert!(g.is_hand_closed(&[60.0, 62.0, 64.0, 55.0, 65.0]).expect("bends"));
        assert!(!g.is_hand_closed(&[10.0; 5]).expect("bends"));
    }

    #[test]
    fn first_mismatch_short_circuits() {
        let mut g = GestureRecognizer::with_seed(&cfg(3), 0.01, 1).expect("build");
        // Index finger is straight: thumb and index get filtered, the rest do not.
        assert!(!g.is_hand_closed(&[60.0, 20.0, 60.0, 60.0, 60.0]).expect("bends"));
        assert_eq!(g.history_lens(), vec![1, 1, 0, 0, 0]);
    }

    #[test]
    fn smoothing_delays_closing() {
        let mut g = GestureRecognizer::with_seed(&cfg(4), 0.01, 1).expect("build");
        for _ in 0..4 {
            assert!(!g.is_hand_closed(&[10.0; 5]).expect("bends"));
        }
        // Thumb mean moves 10 -> 22.5 -> 35 -> 47.5 -> 60 as the fist forms.
        let seen: Vec<bool> = (0..4)
            .map(|_| g.is_hand_closed(&[60.0; 5]).expect("bends"))
            .collect();
        assert_eq!(seen, vec![false, false, false, true]);
    }

    #[test]
    fn wrong_finger_count_is_an_error() {
        let mut g = GestureRecognizer::with_seed(&cfg(1), 0.01, 1).expect("build");
        assert_eq!(
            g.is_hand_closed(&[60.0; 4]),
            Err(TeleopError::ChannelOutOfRange {
                kind: "finger",
                id: 4,
                count: 5
            })
        );
    }
}

//! Simulated data glove: slow sinusoidal hand motion with sensor noise,
//! occasional out-of-range glitches, a periodic grasp and a scripted tap on
//! button A.
use crate::error::HwError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use teleop_traits::{ChannelId, Glove, HwResult};

const POSITIONS: usize = 3;
const FINGERS: usize = 5;
const BUTTONS: usize = 4;
/// How long the scripted tap on button A is held.
const TAP: Duration = Duration::from_millis(150);
/// Reading reported for a glitched sample, far outside any sensor range.
pub const GLITCH_VALUE: f64 = 1.0e3;

#[derive(Debug, Clone)]
pub struct GloveSim {
    /// Resting position per axis (sensor units).
    pub centre: [f64; 3],
    pub amplitude: [f64; 3],
    pub frequency_hz: f64,
    /// Peak uniform noise added to every analog reading.
    pub noise: f64,
    /// Chance that an analog reading is replaced by [`GLITCH_VALUE`].
    pub glitch_probability: f64,
    /// Finger bend with the hand open and closed.
    pub bend_open: f64,
    pub bend_closed: f64,
    /// The hand closes for the second half of every cycle; `None` keeps it open.
    pub grasp_period: Option<Duration>,
    /// Time after start at which button A is tapped.
    pub tap_a_at: Option<Duration>,
    /// The device drops off the bus after this long.
    pub disconnect_after: Option<Duration>,
    pub seed: u64,
}

impl Default for GloveSim {
    fn default() -> Self {
        Self {
            centre: [0.0, 22.5, -22.5],
            amplitude: [10.0, 10.0, 10.0],
            frequency_hz: 0.2,
            noise: 0.2,
            glitch_probability: 0.001,
            bend_open: 15.0,
            bend_closed: 60.0,
            grasp_period: Some(Duration::from_secs(6)),
            tap_a_at: Some(Duration::from_millis(500)),
            disconnect_after: None,
            seed: 0x5EED,
        }
    }
}

pub struct SimulatedGlove {
    cfg: GloveSim,
    start: Instant,
    rng: Mutex<StdRng>,
    faulted: AtomicBool,
}

impl SimulatedGlove {
    pub fn new(cfg: GloveSim) -> Self {
        tracing::debug!(seed = cfg.seed, "simulated glove attached");
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(cfg.seed)),
            cfg,
            start: Instant::now(),
            faulted: AtomicBool::new(false),
        }
    }

    /// Simulate a cable pull.
    pub fn disconnect(&self) {
        self.faulted.store(true, Ordering::Release);
    }

    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn check_link(&self) -> Result<Duration, HwError> {
        let t = self.elapsed();
        if self.cfg.disconnect_after.is_some_and(|after| t >= after) {
            if !self.faulted.swap(true, Ordering::AcqRel) {
                tracing::warn!("simulated glove disconnected");
            }
        }
        if self.faulted.load(Ordering::Acquire) {
            return Err(HwError::Disconnected);
        }
        Ok(t)
    }

    /// Noise and glitch applied to a clean reading.
    fn corrupt(&self, clean: f64) -> f64 {
        let Ok(mut rng) = self.rng.lock() else {
            return clean;
        };
        if self.cfg.glitch_probability > 0.0 && rng.gen_bool(self.cfg.glitch_probability.min(1.0)) {
            return GLITCH_VALUE;
        }
        if self.cfg.noise > 0.0 {
            clean + rng.gen_range(-self.cfg.noise..=self.cfg.noise)
        } else {
            clean
        }
    }

    fn hand_closed(&self, t: Duration) -> bool {
        self.cfg.grasp_period.is_some_and(|p| {
            let p = p.as_secs_f64();
            p > 0.0 && (t.as_secs_f64() % p) >= p / 2.0
        })
    }
}

impl Glove for SimulatedGlove {
    fn read_channel(&self, id: ChannelId) -> HwResult<f64> {
        let t = self.check_link()?;
        let clean = match id {
            ChannelId::Position(i) if i < POSITIONS => {
                let phase = i as f64 * std::f64::consts::FRAC_PI_2;
                let w = std::f64::consts::TAU * self.cfg.frequency_hz;
                self.cfg.centre[i] + self.cfg.amplitude[i] * (w * t.as_secs_f64() + phase).sin()
            }
            ChannelId::Finger(i) if i < FINGERS => {
                if self.hand_closed(t) {
                    self.cfg.bend_closed
                } else {
                    self.cfg.bend_open
                }
            }
            ChannelId::Position(id) => {
                return Err(HwError::ChannelOutOfRange {
                    kind: "position",
                    id,
                    count: POSITIONS,
                }
                .into());
            }
            ChannelId::Finger(id) => {
                return Err(HwError::ChannelOutOfRange {
                    kind: "finger",
                    id,
                    count: FINGERS,
                }
                .into());
            }
        };
        Ok(self.corrupt(clean))
    }

    fn read_button(&self, id: usize) -> HwResult<bool> {
        let t = self.check_link()?;
        if id >= BUTTONS {
            return Err(HwError::ChannelOutOfRange {
                kind: "button",
                id,
                count: BUTTONS,
            }
            .into());
        }
        Ok(id == 0 && self.cfg.tap_a_at.is_some_and(|at| t >= at && t < at + TAP))
    }

    fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
            || self.cfg.disconnect_after.is_some_and(|after| self.elapsed() >= after)
    }

    fn position_channels(&self) -> usize {
        POSITIONS
    }

    fn finger_channels(&self) -> usize {
        FINGERS
    }

    fn button_count(&self) -> usize {
        BUTTONS
    }
}

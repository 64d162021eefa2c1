//! Data-collection variant of the acquisition loop.
//!
//! Runs the three evaluated stages side by side on every channel and appends
//! one CSV row per tick, until the sample limit, a hardware fault or
//! cancellation.
use crate::acquisition::{LoopReport, StopReason, Tick, run_periodic};
use crate::config::CollectionCfg;
use crate::error::{BuildError, Report, Result};
use crate::filter::{Blpma, Lpf, SignalFilter, Sma};
use crate::guard::{LimitGuard, SensorRange};
use crate::hw_error::{is_fatal, map_hw_error};
use crate::recorder::{EvaluationRecorder, StageSample};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use teleop_traits::clock::Clock;
use teleop_traits::{ChannelId, Glove};

/// SMA, LPF and LPF-of-SMA for one channel, each with its own history.
pub struct StageBank {
    sma: Sma,
    lpf: Lpf,
    blpma: Blpma,
}

impl StageBank {
    /// Each stage gets its own entropy-seeded guard.
    pub fn new(range: SensorRange, cfg: &CollectionCfg) -> std::result::Result<Self, BuildError> {
        Self::build(cfg, || LimitGuard::new(range, cfg.epsilon))
    }

    /// Deterministic guards seeded `seed`, `seed + 1` and `seed + 2` for the
    /// SMA, LPF and BLPMA stages.
    pub fn with_seed(
        range: SensorRange,
        cfg: &CollectionCfg,
        seed: u64,
    ) -> std::result::Result<Self, BuildError> {
        let mut next = seed;
        Self::build(cfg, || {
            let guard = LimitGuard::with_seed(range, cfg.epsilon, next);
            next = next.wrapping_add(1);
            guard
        })
    }

    fn build(
        cfg: &CollectionCfg,
        mut guard: impl FnMut() -> LimitGuard,
    ) -> std::result::Result<Self, BuildError> {
        let hz = cfg.sample_hz();
        Ok(Self {
            sma: Sma::new(cfg.sma_window, guard())?,
            lpf: Lpf::new(cfg.lpf_window, cfg.order, cfg.cutoff_hz, hz, guard())?,
            blpma: Blpma::new(
                cfg.blpma_sma_window,
                cfg.lpf_window,
                cfg.order,
                cfg.cutoff_hz,
                hz,
                guard(),
            )?,
        })
    }

    pub fn push(&mut self, raw: f64) -> StageSample {
        StageSample {
            raw,
            sma: self.sma.compute(raw),
            lpf: self.lpf.compute(raw),
            blpma: self.blpma.compute(raw),
        }
    }
}

fn banks(
    ranges: &[SensorRange],
    cfg: &CollectionCfg,
) -> std::result::Result<Vec<StageBank>, BuildError> {
    ranges.iter().map(|&r| StageBank::new(r, cfg)).collect()
}

fn read_all<G: Glove + ?Sized>(
    glove: &G,
    ids: impl Iterator<Item = ChannelId>,
    banks: &mut [StageBank],
    out: &mut Vec<StageSample>,
) -> std::result::Result<(), crate::TeleopError> {
    // Read every channel before touching any filter so a failed tick leaves
    // all histories untouched.
    let raw = ids
        .map(|id| glove.read_channel(id).map_err(|e| map_hw_error(e.as_ref())))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    out.clear();
    out.extend(banks.iter_mut().zip(raw).map(|(b, v)| b.push(v)));
    Ok(())
}

/// Sample positions (and optionally finger bends) every `cfg.period` for
/// up to `cfg.max_samples` ticks, writing raw + stage outputs per tick.
pub fn run_collection<G, C, W, F>(
    glove: &G,
    cfg: &CollectionCfg,
    clock: &C,
    shutdown: &AtomicBool,
    positions: &mut EvaluationRecorder<W>,
    mut fingers: Option<&mut EvaluationRecorder<F>>,
) -> Result<LoopReport>
where
    G: Glove + ?Sized,
    C: Clock + ?Sized,
    W: Write,
    F: Write,
{
    let mut position_banks = banks(&cfg.position_ranges, cfg)?;
    let mut finger_banks = if fingers.is_some() {
        banks(&cfg.finger_ranges, cfg)?
    } else {
        Vec::new()
    };
    let mut position_row = Vec::with_capacity(position_banks.len());
    let mut finger_row = Vec::with_capacity(finger_banks.len());
    let mut failure: Option<Report> = None;

    tracing::info!(
        period_us = cfg.period.as_micros() as u64,
        max_samples = ?cfg.max_samples,
        fingers = fingers.is_some(),
        "data collection started"
    );
    let report = run_periodic(
        clock,
        cfg.period,
        cfg.max_samples,
        || {
            if shutdown.load(Ordering::Relaxed) {
                Some(StopReason::Cancelled)
            } else if glove.is_faulted() {
                Some(StopReason::HardwareFault)
            } else {
                None
            }
        },
        |n| {
            let mut read = read_all(
                glove,
                (0..position_banks.len()).map(ChannelId::Position),
                &mut position_banks,
                &mut position_row,
            );
            if read.is_ok() && fingers.is_some() {
                read = read_all(
                    glove,
                    (0..finger_banks.len()).map(ChannelId::Finger),
                    &mut finger_banks,
                    &mut finger_row,
                );
            }
            match read {
                Ok(()) => {}
                Err(e) if is_fatal(&e) => {
                    tracing::warn!(tick = n, error = %e, "glove lost, ending collection");
                    return Tick::Stop(StopReason::HardwareFault);
                }
                Err(e) => {
                    tracing::debug!(tick = n, error = %e, "read failed, skipping tick");
                    return Tick::Continue;
                }
            }
            let mut written = positions.record(&position_row);
            if written.is_ok() {
                if let Some(rec) = fingers.as_deref_mut() {
                    written = rec.record(&finger_row);
                }
            }
            match written {
                Ok(()) => Tick::Continue,
                Err(e) => {
                    failure = Some(e);
                    Tick::Stop(StopReason::Cancelled)
                }
            }
        },
    );
    if let Some(e) = failure {
        return Err(e);
    }
    positions.flush()?;
    if let Some(rec) = fingers {
        rec.flush()?;
    }
    tracing::info!(
        reason = report.reason.as_str(),
        rows = positions.rows(),
        overruns = report.stats.overruns,
        "data collection finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{GloveFrame, ScriptedGlove};
    use std::time::Duration;
    use teleop_traits::clock::test_clock::TestClock;

    fn cfg(max: u64) -> CollectionCfg {
        let r = |l, h| SensorRange::new(l, h).expect("range");
        CollectionCfg {
            period: Duration::from_millis(10),
            max_samples: Some(max),
            position_ranges: [r(-22.5, 22.5), r(0.0, 45.0), r(-45.0, 0.0)],
            finger_ranges: vec![r(5.0, 65.0); 5],
            sma_window: 4,
            lpf_window: 20,
            blpma_sma_window: 2,
            cutoff_hz: 10.0,
            order: 2,
            epsilon: 0.01,
        }
    }

    #[test]
    fn stage_bank_settles_on_constant_input() {
        let c = cfg(1);
        let mut bank = StageBank::new(c.position_ranges[0], &c).expect("bank");
        let mut last = StageSample::default();
        for _ in 0..20 {
            last = bank.push(5.0);
        }
        assert_eq!(last.raw, 5.0);
        assert!((last.sma - 5.0).abs() < 1e-12);
        assert!((last.lpf - 5.0).abs() < 0.05, "{last:?}");
        assert!((last.blpma - 5.0).abs() < 0.1, "{last:?}");
    }

    #[test]
    fn stages_draw_substitution_signs_independently() {
        let c = cfg(1);
        let range = c.position_ranges[0];
        let mut bank = StageBank::with_seed(range, &c, 7).expect("bank");
        let mut sma = Sma::new(c.sma_window, LimitGuard::with_seed(range, c.epsilon, 7))
            .expect("sma");
        let mut blpma = Blpma::new(
            c.blpma_sma_window,
            c.lpf_window,
            c.order,
            c.cutoff_hz,
            c.sample_hz(),
            LimitGuard::with_seed(range, c.epsilon, 9),
        )
        .expect("blpma");

        bank.push(5.0);
        sma.compute(5.0);
        blpma.compute(5.0);
        let (mut sma_walk, mut lpf_walk, mut blpma_walk) = (Vec::new(), Vec::new(), Vec::new());
        for _ in 0..32 {
            bank.push(100.0);
            sma.compute(100.0);
            blpma.compute(100.0);
            sma_walk.push(*bank.sma.history().back().expect("sma"));
            lpf_walk.push(*bank.lpf.history().back().expect("lpf"));
            blpma_walk.push(*bank.blpma.sma().history().back().expect("blpma"));
        }

        assert_eq!(bank.sma.history(), sma.history());
        assert_eq!(bank.blpma.sma().history(), blpma.sma().history());
        assert_eq!(bank.sma.guard().rejected(), 32);
        assert_ne!(sma_walk, lpf_walk);
        assert_ne!(sma_walk, blpma_walk);
        assert_ne!(lpf_walk, blpma_walk);
    }

    #[test]
    fn writes_one_row_per_tick() {
        let glove = ScriptedGlove::new(GloveFrame::default());
        let clock = TestClock::new();
        let mut positions = EvaluationRecorder::positions(Vec::new()).expect("rec");
        let mut fingers = EvaluationRecorder::fingers(Vec::new()).expect("rec");
        let report = run_collection(
            &glove,
            &cfg(7),
            &clock,
            &AtomicBool::new(false),
            &mut positions,
            Some(&mut fingers),
        )
        .expect("collect");
        assert_eq!(report.reason, StopReason::SampleLimit);
        assert_eq!(positions.rows(), 7);
        assert_eq!(fingers.rows(), 7);
        let csv = String::from_utf8(positions.into_inner().expect("inner")).expect("utf8");
        assert_eq!(csv.lines().count(), 8);
        assert!(csv.lines().nth(1).expect("row").starts_with("0,0,0,0,22.5,22.5,"));
    }

    #[test]
    fn fault_flag_ends_collection() {
        let glove = ScriptedGlove::new(GloveFrame::default());
        glove.fault();
        let mut positions = EvaluationRecorder::positions(Vec::new()).expect("rec");
        let report = run_collection::<_, _, _, Vec<u8>>(
            &glove,
            &cfg(100),
            &TestClock::new(),
            &AtomicBool::new(false),
            &mut positions,
            None,
        )
        .expect("collect");
        assert_eq!(report.reason, StopReason::HardwareFault);
        assert_eq!(positions.rows(), 0);
    }
}

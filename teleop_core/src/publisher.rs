//! Glove side: acquisition groups feeding the telemetry stream.
//!
//! Three [`GroupSampler`]s (position, finger bends, buttons) each own their
//! filter state on their own thread. The publish task ticks at the same
//! period, folds the newest sample of each group into [`PublishState`] and
//! emits one [`TelemetryMessage`] per tick.
use crate::acquisition::{
    GroupConfig, GroupSampler, GroupState, LoopReport, LoopStats, StopReason, Tick, run_periodic,
};
use crate::config::PublisherCfg;
use crate::error::{Result, TeleopError};
use crate::gesture::GestureRecognizer;
use crate::guard::LimitGuard;
use crate::hw_error::map_hw_error;
use crate::latch::EdgeLatch;
use crate::telemetry::{Publish, TelemetryMessage};
use eyre::WrapErr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use teleop_traits::clock::Clock;
use teleop_traits::{ChannelId, Glove};

/// Index of the button that toggles movement.
pub const MOVEMENT_BUTTON: usize = 0;
pub const BUTTONS: usize = 4;
/// Copies of the terminate message sent at shutdown. Datagrams can be lost.
pub const TERMINATE_REPEATS: usize = 3;

/// Latches and the held position behind the outgoing messages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PublishState {
    movement: EdgeLatch,
    gripper: EdgeLatch,
    held: [f64; 3],
}

impl PublishState {
    /// Start with movement disabled, gripper open and `initial` held.
    pub fn new(initial: [f64; 3]) -> Self {
        Self {
            movement: EdgeLatch::new(false),
            gripper: EdgeLatch::new(false),
            held: initial,
        }
    }

    /// Fold in whatever arrived since the last tick. `None` means the group
    /// produced nothing new; its latch is left alone.
    pub fn next(
        &mut self,
        position: Option<[f64; 3]>,
        buttons: Option<[bool; BUTTONS]>,
        hand_closed: Option<bool>,
    ) -> TelemetryMessage {
        if let Some(b) = buttons {
            let was = self.movement.value();
            if self.movement.update(b[MOVEMENT_BUTTON]) != was {
                tracing::info!(enabled = self.movement.value(), "movement toggled");
            }
        }
        if let Some(closed) = hand_closed {
            self.gripper.update(closed);
        }
        if self.movement.value() {
            if let Some(p) = position {
                self.held = p;
            }
        }
        TelemetryMessage::new(self.held, self.gripper.value(), self.movement.value())
    }

    pub fn terminate(&self) -> TelemetryMessage {
        TelemetryMessage::terminate_at(self.held)
    }

    #[inline]
    pub fn movement_enabled(&self) -> bool {
        self.movement.value()
    }

    #[inline]
    pub fn gripper_request(&self) -> bool {
        self.gripper.value()
    }

    #[inline]
    pub fn held(&self) -> [f64; 3] {
        self.held
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherReport {
    pub published: u64,
    pub publish_errors: u64,
    pub stats: LoopStats,
    pub reason: StopReason,
    /// Per-group loop reports, `None` if the group thread panicked.
    pub groups: Vec<(&'static str, Option<LoopReport>)>,
}

fn spawn_groups<G, C>(
    glove: &Arc<G>,
    cfg: &PublisherCfg,
    clock: &C,
) -> Result<(
    GroupSampler<[f64; 3]>,
    GroupSampler<bool>,
    GroupSampler<[bool; BUTTONS]>,
)>
where
    G: Glove + 'static,
    C: Clock + Clone + Send + 'static,
{
    let group = |name| GroupConfig {
        name,
        period: cfg.period,
        max_ticks: None,
    };
    let faulted = |g: &Arc<G>| {
        let g = Arc::clone(g);
        move || g.is_faulted()
    };

    let mut filters = cfg
        .position_ranges
        .iter()
        .map(|&r| cfg.position_filter.build(LimitGuard::new(r, cfg.epsilon)))
        .collect::<std::result::Result<Vec<_>, _>>()
        .wrap_err("building position filters")?;
    let g = Arc::clone(glove);
    let position = GroupSampler::spawn(group("position"), clock.clone(), faulted(glove), move || {
        let mut raw = [0.0; 3];
        for (i, slot) in raw.iter_mut().enumerate() {
            *slot = g
                .read_channel(ChannelId::Position(i))
                .map_err(|e| map_hw_error(e.as_ref()))?;
        }
        let mut out = [0.0; 3];
        for ((o, f), v) in out.iter_mut().zip(filters.iter_mut()).zip(raw) {
            *o = f.compute(v);
        }
        Ok(out)
    });

    let mut gesture =
        GestureRecognizer::new(&cfg.gesture, cfg.epsilon).wrap_err("building gesture recognizer")?;
    let g = Arc::clone(glove);
    let mut bends = vec![0.0; gesture.finger_count()];
    let fingers = GroupSampler::spawn(group("fingers"), clock.clone(), faulted(glove), move || {
        for (i, slot) in bends.iter_mut().enumerate() {
            *slot = g
                .read_channel(ChannelId::Finger(i))
                .map_err(|e| map_hw_error(e.as_ref()))?;
        }
        gesture.is_hand_closed(&bends)
    });

    let g = Arc::clone(glove);
    let buttons = GroupSampler::spawn(group("buttons"), clock.clone(), faulted(glove), move || {
        let mut state = [false; BUTTONS];
        for (i, slot) in state.iter_mut().enumerate() {
            *slot = g.read_button(i).map_err(|e| map_hw_error(e.as_ref()))?;
        }
        Ok::<_, TeleopError>(state)
    });

    Ok((position, fingers, buttons))
}

/// Run the glove side until `shutdown` is raised or the glove fails, then
/// publish [`TERMINATE_REPEATS`] terminate messages carrying the last held
/// position. Fails only if none of them could be sent.
///
/// Publish failures are logged and counted; the stream continues.
pub fn run_publisher<G, P, C>(
    glove: Arc<G>,
    publisher: &mut P,
    cfg: &PublisherCfg,
    clock: C,
    shutdown: &AtomicBool,
) -> Result<PublisherReport>
where
    G: Glove + 'static,
    P: Publish + ?Sized,
    C: Clock + Clone + Send + 'static,
{
    let (position, fingers, buttons) = spawn_groups(&glove, cfg, &clock)?;
    let mut state = PublishState::new(cfg.position_ranges.map(|r| r.midpoint()));
    let mut published = 0u64;
    let mut publish_errors = 0u64;

    tracing::info!(
        period_us = cfg.period.as_micros() as u64,
        "glove publisher running"
    );
    let report = run_periodic(
        &clock,
        cfg.period,
        None,
        || {
            if shutdown.load(Ordering::Relaxed) {
                Some(StopReason::Cancelled)
            } else if glove.is_faulted()
                || [position.state(), fingers.state(), buttons.state()]
                    .contains(&GroupState::Stopped)
            {
                Some(StopReason::HardwareFault)
            } else {
                None
            }
        },
        |n| {
            let msg = state.next(position.latest(), buttons.latest(), fingers.latest());
            match publisher.publish(&msg) {
                Ok(()) => published += 1,
                Err(e) => {
                    publish_errors += 1;
                    tracing::warn!(tick = n, error = %e, "publish failed");
                }
            }
            Tick::Continue
        },
    );

    if report.reason == StopReason::HardwareFault {
        tracing::warn!("glove unavailable, terminating session");
    }
    let groups = vec![
        ("position", position.stop()),
        ("fingers", fingers.stop()),
        ("buttons", buttons.stop()),
    ];
    let terminate = state.terminate();
    let mut sent = 0u64;
    let mut last_error = None;
    for attempt in 0..TERMINATE_REPEATS {
        match publisher.publish(&terminate) {
            Ok(()) => sent += 1,
            Err(e) => {
                publish_errors += 1;
                tracing::warn!(attempt, error = %e, "terminate publish failed");
                last_error = Some(e);
            }
        }
    }
    published += sent;
    if sent == 0 {
        if let Some(e) = last_error {
            return Err(e.wrap_err("publishing terminate message"));
        }
    }
    tracing::info!(
        published,
        publish_errors,
        reason = report.reason.as_str(),
        overruns = report.stats.overruns,
        "glove publisher stopped"
    );
    Ok(PublisherReport {
        published,
        publish_errors,
        stats: report.stats,
        reason: report.reason,
        groups,
    })
}

//! Fixed-period acquisition loops.
//!
//! Each channel group (position, finger bends, buttons) runs on its own
//! thread that owns the group's filter state. A tick records its start,
//! reads and processes, then sleeps for whatever is left of the period. An
//! overrunning tick is followed immediately by the next one, with no
//! catch-up.
//!
//! Safety: Each `GroupSampler` spawns exactly one thread that is shut down
//! and joined when the sampler is stopped or dropped.
use crate::error::TeleopError;
use crate::hw_error::is_fatal;
use crate::mailbox::{MailboxReceiver, mailbox};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use teleop_traits::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GroupState {
    Idle = 0,
    Running = 1,
    Stopped = 2,
}

impl GroupState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => GroupState::Idle,
            1 => GroupState::Running,
            _ => GroupState::Stopped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Shutdown flag observed.
    Cancelled,
    /// The shared hardware-error flag went up.
    HardwareFault,
    /// `max_ticks` reached (data collection).
    SampleLimit,
    /// A terminate message was handled.
    Terminated,
    /// No message within the liveness timeout.
    LivenessTimeout,
    /// The publishing side went away.
    PublisherClosed,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::Cancelled => "cancelled",
            StopReason::HardwareFault => "hardware_fault",
            StopReason::SampleLimit => "sample_limit",
            StopReason::Terminated => "terminated",
            StopReason::LivenessTimeout => "liveness_timeout",
            StopReason::PublisherClosed => "publisher_closed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub overruns: u64,
    pub worst_tick: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopReport {
    pub stats: LoopStats,
    pub reason: StopReason,
}

/// Sleep-the-remainder pacing shared by every periodic loop.
#[derive(Debug)]
pub struct Pacer<'a, C: Clock + ?Sized> {
    clock: &'a C,
    period: Duration,
    stats: LoopStats,
}

impl<'a, C: Clock + ?Sized> Pacer<'a, C> {
    pub fn new(clock: &'a C, period: Duration) -> Self {
        Self {
            clock,
            period,
            stats: LoopStats::default(),
        }
    }

    #[inline]
    pub fn tick_start(&self) -> Instant {
        self.clock.now()
    }

    /// Close a tick that began at `start`. Sleeps out the period and returns
    /// `None`, or returns the overrun without sleeping.
    pub fn finish(&mut self, start: Instant) -> Option<Duration> {
        let elapsed = self.clock.elapsed_since(start);
        self.stats.ticks += 1;
        self.stats.worst_tick = self.stats.worst_tick.max(elapsed);
        if elapsed < self.period {
            self.clock.sleep(self.period - elapsed);
            None
        } else {
            self.stats.overruns += 1;
            Some(elapsed - self.period)
        }
    }

    #[inline]
    pub fn stats(&self) -> LoopStats {
        self.stats
    }
}

/// What a tick body asks the loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Stop(StopReason),
}

/// Run `tick` every `period` until `should_stop` reports a reason, a tick
/// asks to stop, or `max_ticks` ticks have run.
///
/// `should_stop` is polled at the top of every tick.
pub fn run_periodic<C, S, F>(
    clock: &C,
    period: Duration,
    max_ticks: Option<u64>,
    mut should_stop: S,
    mut tick: F,
) -> LoopReport
where
    C: Clock + ?Sized,
    S: FnMut() -> Option<StopReason>,
    F: FnMut(u64) -> Tick,
{
    let mut pacer = Pacer::new(clock, period);
    let reason = loop {
        if let Some(reason) = should_stop() {
            break reason;
        }
        let n = pacer.stats().ticks;
        if max_ticks.is_some_and(|max| n >= max) {
            break StopReason::SampleLimit;
        }
        let start = pacer.tick_start();
        if let Tick::Stop(reason) = tick(n) {
            break reason;
        }
        if let Some(over) = pacer.finish(start) {
            tracing::trace!(tick = n, overrun_us = over.as_micros() as u64, "tick overran period");
        }
    };
    LoopReport {
        stats: pacer.stats(),
        reason,
    }
}

/// Static description of one channel group.
#[derive(Debug, Clone, Copy)]
pub struct GroupConfig {
    pub name: &'static str,
    pub period: Duration,
    pub max_ticks: Option<u64>,
}

/// A channel group sampled on its own paced thread.
///
/// The read closure owns the group's filter state; each processed sample is
/// published to a single-slot mailbox, so `latest()` yields the newest value
/// not yet taken.
pub struct GroupSampler<T> {
    name: &'static str,
    latest: MailboxReceiver<T>,
    state: Arc<AtomicU8>,
    /// Shutdown flag for immediate response (atomic for lock-free check)
    shutdown: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<LoopReport>>,
}

impl<T: Send + 'static> GroupSampler<T> {
    /// Spawn the group thread.
    ///
    /// `faulted` is the shared hardware-error flag, read at the top of each
    /// tick. A read error that maps to a hardware fault also stops the group;
    /// other read errors skip the tick.
    pub fn spawn<C, P, R>(cfg: GroupConfig, clock: C, faulted: P, mut read: R) -> Self
    where
        C: Clock + Send + 'static,
        P: Fn() -> bool + Send + 'static,
        R: FnMut() -> Result<T, TeleopError> + Send + 'static,
    {
        let (tx, rx) = mailbox();
        let state = Arc::new(AtomicU8::new(GroupState::Idle as u8));
        let shutdown = Arc::new(AtomicBool::new(false));
        let state_t = state.clone();
        let shutdown_t = shutdown.clone();
        let name = cfg.name;

        let join_handle = std::thread::spawn(move || {
            state_t.store(GroupState::Running as u8, Ordering::Release);
            tracing::debug!(group = name, "acquisition group running");
            let report = run_periodic(
                &clock,
                cfg.period,
                cfg.max_ticks,
                || {
                    if shutdown_t.load(Ordering::Relaxed) {
                        Some(StopReason::Cancelled)
                    } else if faulted() {
                        Some(StopReason::HardwareFault)
                    } else {
                        None
                    }
                },
                |_| match read() {
                    Ok(v) => {
                        tx.publish(v);
                        Tick::Continue
                    }
                    Err(e) if is_fatal(&e) => {
                        tracing::warn!(group = name, error = %e, "hardware lost, stopping group");
                        Tick::Stop(StopReason::HardwareFault)
                    }
                    Err(e) => {
                        tracing::debug!(group = name, error = %e, "read failed, skipping tick");
                        Tick::Continue
                    }
                },
            );
            state_t.store(GroupState::Stopped as u8, Ordering::Release);
            tracing::debug!(
                group = name,
                reason = report.reason.as_str(),
                ticks = report.stats.ticks,
                overruns = report.stats.overruns,
                "acquisition group stopped"
            );
            report
        });

        Self {
            name,
            latest: rx,
            state,
            shutdown,
            join_handle: Some(join_handle),
        }
    }
}

impl<T> GroupSampler<T> {
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> GroupState {
        GroupState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Newest processed sample not yet taken, if any.
    pub fn latest(&self) -> Option<T> {
        self.latest.try_latest()
    }

    /// Block up to `timeout` for the next processed sample.
    pub fn wait(&self, timeout: Duration) -> Option<T> {
        match self.latest.recv_timeout(timeout) {
            crate::mailbox::Wait::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Stop the thread and return its report.
    pub fn stop(mut self) -> Option<LoopReport> {
        self.join()
    }

    fn join(&mut self) -> Option<LoopReport> {
        self.shutdown.store(true, Ordering::Relaxed);
        let handle = self.join_handle.take()?;
        match handle.join() {
            Ok(report) => Some(report),
            Err(e) => {
                // Thread panicked; log but don't propagate
                tracing::warn!(group = self.name, ?e, "acquisition thread panicked");
                None
            }
        }
    }
}

impl<T> Drop for GroupSampler<T> {
    fn drop(&mut self) {
        let _ = self.join();
    }
}

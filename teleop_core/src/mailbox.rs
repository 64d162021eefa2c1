//! Single-slot, most-recent-wins channel.
//!
//! Built on a bounded(1) crossbeam channel. The sender keeps a receiving
//! handle of its own so it can evict an unread value before storing a newer
//! one; a slow reader therefore only ever sees the latest value and a
//! missing reader never blocks the writer.
use crossbeam_channel as xch;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub struct MailboxSender<T> {
    tx: xch::Sender<T>,
    evict: xch::Receiver<T>,
    superseded: Arc<AtomicU64>,
}

pub struct MailboxReceiver<T> {
    rx: xch::Receiver<T>,
    superseded: Arc<AtomicU64>,
}

/// Outcome of a bounded wait on a mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait<T> {
    Value(T),
    TimedOut,
    /// Every sender is gone and the slot is empty.
    Closed,
}

pub fn mailbox<T>() -> (MailboxSender<T>, MailboxReceiver<T>) {
    let (tx, rx) = xch::bounded(1);
    let superseded = Arc::new(AtomicU64::new(0));
    (
        MailboxSender {
            tx,
            evict: rx.clone(),
            superseded: superseded.clone(),
        },
        MailboxReceiver { rx, superseded },
    )
}

impl<T> MailboxSender<T> {
    /// Store `value`, replacing any unread one. Returns true if a value was
    /// dropped unread.
    pub fn publish(&self, mut value: T) -> bool {
        let mut replaced = false;
        loop {
            match self.tx.try_send(value) {
                Ok(()) => return replaced,
                Err(xch::TrySendError::Full(back)) => {
                    value = back;
                    if self.evict.try_recv().is_ok() {
                        replaced = true;
                        self.superseded.fetch_add(1, Ordering::Relaxed);
                    }
                }
                // Unreachable while `evict` is alive; nothing to deliver to.
                Err(xch::TrySendError::Disconnected(_)) => return replaced,
            }
        }
    }
}

impl<T> MailboxReceiver<T> {
    /// Block until a value is available; `None` once every sender is gone.
    pub fn recv(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Wait<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(v) => Wait::Value(v),
            Err(xch::RecvTimeoutError::Timeout) => Wait::TimedOut,
            Err(xch::RecvTimeoutError::Disconnected) => Wait::Closed,
        }
    }

    /// Take the stored value without blocking.
    pub fn try_latest(&self) -> Option<T> {
        self.rx.try_iter().last()
    }

    /// Values overwritten before anyone read them.
    pub fn superseded(&self) -> u64 {
        self.superseded.load(Ordering::Relaxed)
    }
}

//! One-shot timers keyed by session.
//!
//! Expiry is delivered as a message rather than a callback: the owner of the
//! timers drains [`TimerExpiry`] values in its event loop and applies them
//! alongside channel deliveries, so state is never touched concurrently.

use crate::data::SessionId;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Identity of one scheduled timer. Never reused within a [`Timers`] instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A timer that fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerExpiry {
    pub session: SessionId,
    pub handle: TimerHandle,
}

pub trait Timers {
    /// Schedule an expiry for `session` after `delay`.
    fn schedule(&mut self, delay: Duration, session: SessionId) -> TimerHandle;

    /// Cancel a pending timer. Unknown or already fired handles are ignored.
    fn cancel(&mut self, handle: TimerHandle);
}

/// Timers backed by `tokio::time::sleep` tasks.
pub struct TokioTimers {
    next_handle: u64,
    pending: HashMap<TimerHandle, JoinHandle<()>>,
    tx: mpsc::UnboundedSender<TimerExpiry>,
}

impl TokioTimers {
    /// Create timers and the receiver their expiries arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerExpiry>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let timers = Self {
            next_handle: 0,
            pending: HashMap::new(),
            tx,
        };
        (timers, rx)
    }

    /// Number of sleep tasks that have not been cancelled yet.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl Timers for TokioTimers {
    fn schedule(&mut self, delay: Duration, session: SessionId) -> TimerHandle {
        self.next_handle += 1;
        let handle = TimerHandle(self.next_handle);
        let tx = self.tx.clone();
        let deadline = tokio::time::Instant::now() + delay;

        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = tx.send(TimerExpiry { session, handle });
        });

        // Drop bookkeeping for sleeps that already fired.
        self.pending.retain(|_, task| !task.is_finished());
        self.pending.insert(handle, task);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(task) = self.pending.remove(&handle) {
            task.abort();
        }
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        for (_, task) in self.pending.drain() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let (mut timers, mut rx) = TokioTimers::new();
        let start = tokio::time::Instant::now();
        let handle = timers.schedule(Duration::from_millis(100), SessionId::from("1"));

        let expiry = rx.recv().await.unwrap();
        assert_eq!(expiry.handle, handle);
        assert_eq!(expiry.session, SessionId::from("1"));
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let (mut timers, mut rx) = TokioTimers::new();
        let handle = timers.schedule(Duration::from_millis(100), SessionId::from("1"));
        timers.cancel(handle);
        assert_eq!(timers.pending(), 0);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handles_are_unique() {
        let (mut timers, _rx) = TokioTimers::new();
        let a = timers.schedule(Duration::from_millis(10), SessionId::from("1"));
        let b = timers.schedule(Duration::from_millis(10), SessionId::from("1"));
        assert_ne!(a, b);
    }
}

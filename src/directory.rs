//! Session directory synchronizer.
//!
//! Keeps an insertion-ordered view of the sessions announced on the
//! `/watch_list` channel and derives the short-lived activity pulse from
//! keystroke events.
//!
//! # Event handling
//!
//! ```text
//! session_add     insert, or replace in place on id collision
//! session_remove  delete if present (cancels its pulse timer)
//! session_state   replace state/kb of a known session
//! keystrokes      activate(id): pulse on, restart the expiry timer
//! timer expiry    deactivate(id) if the expiry is still the current timer
//! ```
//!
//! Unknown ids are absorbed silently: deltas are routinely reordered or
//! duplicated by the server.

use crate::channel::{Connector, Delivery, Subscription};
use crate::data::{LinkStatus, SessionId, SessionRecord};
use crate::error::ClientError;
use crate::protocol::{DirectoryEvent, WATCH_LIST_PATH};
use crate::timer::{TimerExpiry, TimerHandle, Timers, TokioTimers};
use std::time::Duration;
use tokio::sync::mpsc;

/// Default lifetime of an activity pulse.
pub const DEFAULT_PULSE_DELAY: Duration = Duration::from_millis(100);

struct Entry {
    record: SessionRecord,
    /// At most one pending expiry per record
    timer: Option<TimerHandle>,
}

pub struct DirectorySync<T: Timers> {
    entries: Vec<Entry>,
    timers: T,
    pulse_delay: Duration,
    channel: Option<Subscription>,
    link: LinkStatus,
}

/// Directory synchronizer running on tokio timers.
pub type LiveDirectory = DirectorySync<TokioTimers>;

impl LiveDirectory {
    /// Create a synchronizer with tokio timers; expiries arrive on the receiver
    /// and must be fed back through [`DirectorySync::on_timer_expired`].
    pub fn with_tokio_timers(
        pulse_delay: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<TimerExpiry>) {
        let (timers, expiries) = TokioTimers::new();
        (Self::new(timers, pulse_delay), expiries)
    }
}

impl<T: Timers> DirectorySync<T> {
    pub fn new(timers: T, pulse_delay: Duration) -> Self {
        Self {
            entries: Vec::new(),
            timers,
            pulse_delay,
            channel: None,
            link: LinkStatus::Idle,
        }
    }

    /// Open the directory channel.
    ///
    /// Starting twice without an intervening [`stop`](Self::stop) is a
    /// caller bug and is reported as [`ClientError::AlreadyStarted`]. A
    /// channel the server already closed counts as stopped.
    pub async fn start<C: Connector>(&mut self, connector: &C) -> Result<(), ClientError> {
        if let Some(channel) = &self.channel {
            if !channel.is_finished() {
                return Err(ClientError::AlreadyStarted);
            }
            self.stop();
        }
        let subscription = connector.open(WATCH_LIST_PATH).await?;
        tracing::info!("Watching session directory at {}", subscription.address());
        self.channel = Some(subscription);
        self.link = LinkStatus::Live;
        Ok(())
    }

    /// Close the channel, cancel every pending pulse timer and forget all
    /// sessions.
    pub fn stop(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
            tracing::info!("Stopped watching session directory");
        }
        for entry in self.entries.drain(..) {
            if let Some(handle) = entry.timer {
                self.timers.cancel(handle);
            }
        }
        self.link = LinkStatus::Idle;
    }

    pub fn is_started(&self) -> bool {
        self.channel.is_some()
    }

    pub fn link(&self) -> LinkStatus {
        self.link
    }

    pub fn pulse_delay(&self) -> Duration {
        self.pulse_delay
    }

    /// Wait for the next delivery from the directory channel.
    ///
    /// Never resolves while the synchronizer is stopped or after the channel
    /// ended, so it can sit in a `select!` next to other sources.
    pub async fn next_delivery(&mut self) -> Delivery {
        if let Some(channel) = self.channel.as_mut() {
            if let Some(delivery) = channel.recv().await {
                return delivery;
            }
        }
        std::future::pending().await
    }

    /// Apply one channel delivery. Returns true if the snapshot may have changed.
    pub fn on_delivery(&mut self, delivery: Delivery) -> bool {
        match delivery {
            Delivery::Message(payload) => self.on_message(&payload),
            Delivery::Closed { reason } => {
                tracing::warn!(
                    "Session directory channel closed: {}",
                    reason.as_deref().unwrap_or("no reason given")
                );
                self.link = LinkStatus::Disconnected;
                true
            }
        }
    }

    /// Decode and apply one payload line.
    pub fn on_message(&mut self, payload: &str) -> bool {
        self.on_event(DirectoryEvent::decode(payload))
    }

    /// Apply one decoded event. Returns true if the directory changed.
    pub fn on_event(&mut self, event: DirectoryEvent) -> bool {
        match event {
            DirectoryEvent::SessionAdd(record) => {
                self.upsert(record);
                true
            }
            DirectoryEvent::SessionRemove(id) => self.remove(&id),
            DirectoryEvent::SessionState(record) => self.replace_state(record),
            DirectoryEvent::KeystrokeActivity(id) => self.activate(&id),
            DirectoryEvent::Malformed { reason } => {
                tracing::warn!("Discarding malformed directory event: {}", reason);
                false
            }
        }
    }

    fn position(&self, id: &SessionId) -> Option<usize> {
        self.entries.iter().position(|e| &e.record.id == id)
    }

    fn upsert(&mut self, mut record: SessionRecord) {
        match self.position(&record.id) {
            Some(idx) => {
                // Duplicate add: last write wins, keep position and pulse.
                let entry = &mut self.entries[idx];
                record.activity_pulse = entry.record.activity_pulse;
                entry.record = record;
            }
            None => {
                record.activity_pulse = false;
                self.entries.push(Entry {
                    record,
                    timer: None,
                });
            }
        }
    }

    fn remove(&mut self, id: &SessionId) -> bool {
        let Some(idx) = self.position(id) else {
            tracing::debug!("Ignoring removal of unknown session {}", id);
            return false;
        };
        let entry = self.entries.remove(idx);
        if let Some(handle) = entry.timer {
            self.timers.cancel(handle);
        }
        true
    }

    fn replace_state(&mut self, record: SessionRecord) -> bool {
        let Some(idx) = self.position(&record.id) else {
            tracing::debug!("Ignoring state update for unknown session {}", record.id);
            return false;
        };
        let stored = &mut self.entries[idx].record;
        stored.state = record.state;
        stored.kb = record.kb;
        true
    }

    /// Turn the activity pulse on and restart its expiry.
    pub fn activate(&mut self, id: &SessionId) -> bool {
        let Some(idx) = self.position(id) else {
            tracing::debug!("Ignoring activity for unknown session {}", id);
            return false;
        };
        let entry = &mut self.entries[idx];
        if let Some(previous) = entry.timer.take() {
            self.timers.cancel(previous);
        }
        if entry.record.activity_pulse {
            tracing::trace!("Activity pulse refreshed for session {}", id);
        } else {
            tracing::trace!("Activity pulse started for session {}", id);
        }
        entry.record.activity_pulse = true;
        entry.timer = Some(self.timers.schedule(self.pulse_delay, id.clone()));
        true
    }

    /// Turn the activity pulse off and drop any pending expiry.
    pub fn deactivate(&mut self, id: &SessionId) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };
        let entry = &mut self.entries[idx];
        if let Some(handle) = entry.timer.take() {
            self.timers.cancel(handle);
        }
        let was_active = entry.record.activity_pulse;
        entry.record.activity_pulse = false;
        was_active
    }

    /// Apply a fired timer. Expiries superseded by a newer activation are ignored.
    pub fn on_timer_expired(&mut self, expiry: TimerExpiry) -> bool {
        let current = self
            .position(&expiry.session)
            .and_then(|idx| self.entries[idx].timer);
        if current != Some(expiry.handle) {
            tracing::trace!(
                "Ignoring stale pulse expiry {:?} for session {}",
                expiry.handle,
                expiry.session
            );
            return false;
        }
        self.deactivate(&expiry.session)
    }

    /// Sessions to show the user, in arrival order, without stopping ones.
    pub fn snapshot(&self) -> Vec<SessionRecord> {
        self.entries
            .iter()
            .filter(|e| e.record.is_listed())
            .map(|e| e.record.clone())
            .collect()
    }

    /// Look up a session, including hidden ones.
    pub fn get(&self, id: &SessionId) -> Option<&SessionRecord> {
        self.position(id).map(|idx| &self.entries[idx].record)
    }

    /// Number of known sessions, including hidden ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of sessions with a pending pulse expiry.
    pub fn pending_timers(&self) -> usize {
        self.entries.iter().filter(|e| e.timer.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SessionState;

    /// Records scheduling calls without running anything.
    #[derive(Default)]
    struct RecordingTimers {
        next: u64,
        scheduled: Vec<(TimerHandle, SessionId)>,
        cancelled: Vec<TimerHandle>,
    }

    impl Timers for RecordingTimers {
        fn schedule(&mut self, _delay: Duration, session: SessionId) -> TimerHandle {
            self.next += 1;
            let handle = TimerHandle::from_raw(self.next);
            self.scheduled.push((handle, session));
            handle
        }

        fn cancel(&mut self, handle: TimerHandle) {
            self.cancelled.push(handle);
        }
    }

    fn directory() -> DirectorySync<RecordingTimers> {
        DirectorySync::new(RecordingTimers::default(), DEFAULT_PULSE_DELAY)
    }

    fn add(dir: &mut DirectorySync<RecordingTimers>, id: &str, state: SessionState) {
        dir.on_event(DirectoryEvent::SessionAdd(SessionRecord::new(id, state)));
    }

    #[test]
    fn test_activate_cancels_previous_timer() {
        let mut dir = directory();
        add(&mut dir, "1", SessionState::Idle);

        assert!(dir.activate(&"1".into()));
        assert!(dir.activate(&"1".into()));

        let first = dir.timers.scheduled[0].0;
        assert_eq!(dir.timers.scheduled.len(), 2);
        assert_eq!(dir.timers.cancelled, vec![first]);
        assert_eq!(dir.pending_timers(), 1);
    }

    #[test]
    fn test_stale_expiry_is_ignored() {
        let mut dir = directory();
        add(&mut dir, "1", SessionState::Running);
        dir.activate(&"1".into());
        let stale = dir.timers.scheduled[0].0;
        dir.activate(&"1".into());

        let changed = dir.on_timer_expired(TimerExpiry {
            session: "1".into(),
            handle: stale,
        });
        assert!(!changed);
        assert!(dir.get(&"1".into()).unwrap().activity_pulse);
    }

    #[test]
    fn test_current_expiry_deactivates() {
        let mut dir = directory();
        add(&mut dir, "1", SessionState::Idle);
        dir.activate(&"1".into());
        let handle = dir.timers.scheduled[0].0;

        assert!(dir.on_timer_expired(TimerExpiry {
            session: "1".into(),
            handle,
        }));
        assert!(!dir.get(&"1".into()).unwrap().activity_pulse);
        assert_eq!(dir.pending_timers(), 0);
    }

    #[test]
    fn test_remove_cancels_pending_timer() {
        let mut dir = directory();
        add(&mut dir, "1", SessionState::Idle);
        dir.activate(&"1".into());
        let handle = dir.timers.scheduled[0].0;

        dir.on_event(DirectoryEvent::SessionRemove("1".into()));
        assert_eq!(dir.timers.cancelled, vec![handle]);
        assert!(dir.is_empty());
    }

    #[test]
    fn test_stop_cancels_every_timer() {
        let mut dir = directory();
        add(&mut dir, "1", SessionState::Idle);
        add(&mut dir, "2", SessionState::Running);
        dir.activate(&"1".into());
        dir.activate(&"2".into());

        dir.stop();
        assert_eq!(dir.timers.cancelled.len(), 2);
        assert_eq!(dir.pending_timers(), 0);
        assert!(dir.is_empty());
        assert_eq!(dir.link(), LinkStatus::Idle);
    }

    #[test]
    fn test_state_update_keeps_pulse() {
        let mut dir = directory();
        add(&mut dir, "1", SessionState::Idle);
        dir.activate(&"1".into());

        dir.on_event(DirectoryEvent::SessionState(SessionRecord::new(
            "1",
            SessionState::Running,
        )));
        let record = dir.get(&"1".into()).unwrap();
        assert_eq!(record.state, SessionState::Running);
        assert!(record.activity_pulse);
        assert_eq!(dir.pending_timers(), 1);
    }

    #[test]
    fn test_deactivate_unknown_is_noop() {
        let mut dir = directory();
        assert!(!dir.deactivate(&"missing".into()));
        assert!(!dir.activate(&"missing".into()));
        assert!(dir.timers.scheduled.is_empty());
    }

    #[test]
    fn test_closed_delivery_marks_disconnected() {
        let mut dir = directory();
        dir.on_delivery(Delivery::Closed { reason: None });
        assert_eq!(dir.link(), LinkStatus::Disconnected);
    }
}

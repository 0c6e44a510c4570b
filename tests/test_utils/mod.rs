//! Test utilities and payload fixtures for tidewatch tests

#![allow(dead_code)]

use serde_json::json;
use std::time::Duration;
use tidewatch::channel::Delivery;
use tidewatch::directory::LiveDirectory;
use tidewatch::timer::TimerExpiry;
use tokio::sync::mpsc;
use tokio::time::Instant;

pub fn session_add(id: u64, state: &str, kb: bool) -> String {
    json!({"command": "session_add", "session": {"id": id, "state": state, "kb": kb}}).to_string()
}

pub fn session_state(id: u64, state: &str, kb: bool) -> String {
    json!({"command": "session_state", "session": {"id": id, "state": state, "kb": kb}})
        .to_string()
}

pub fn session_remove(id: u64) -> String {
    json!({"command": "session_remove", "session": {"id": id}}).to_string()
}

pub fn keystrokes(id: u64) -> String {
    json!({"command": "keystrokes", "keystrokes": {"session": {"id": id}}}).to_string()
}

pub fn connected(terminal: &str, audio: &str, kb: bool) -> String {
    json!({
        "status": "connected",
        "ssh": {"url": terminal},
        "mp3": {"url": audio},
        "session": {"kb": kb}
    })
    .to_string()
}

pub fn status(status: &str) -> String {
    json!({"status": status}).to_string()
}

/// Snapshot as `(id, state, kb, pulse)` tuples for compact assertions.
pub fn rows(directory: &LiveDirectory) -> Vec<(String, String, bool, bool)> {
    directory
        .snapshot()
        .into_iter()
        .map(|s| {
            (
                s.id.to_string(),
                s.state.to_string(),
                s.kb,
                s.activity_pulse,
            )
        })
        .collect()
}

/// Apply every queued delivery without waiting for more.
pub async fn drain(directory: &mut LiveDirectory) -> usize {
    let mut applied = 0;
    while let Ok(delivery) =
        tokio::time::timeout(Duration::from_millis(1), directory.next_delivery()).await
    {
        let closed = matches!(delivery, Delivery::Closed { .. });
        directory.on_delivery(delivery);
        applied += 1;
        if closed {
            break;
        }
    }
    applied
}

/// Let the clock reach `deadline`, then apply every expiry due by then.
pub async fn run_timers_until(
    directory: &mut LiveDirectory,
    expiries: &mut mpsc::UnboundedReceiver<TimerExpiry>,
    deadline: Instant,
) {
    tokio::time::sleep_until(deadline).await;
    // Sleep tasks sharing the deadline need a turn to send.
    for _ in 0..3 {
        tokio::task::yield_now().await;
    }
    while let Ok(expiry) = expiries.try_recv() {
        directory.on_timer_expired(expiry);
    }
}

//! Observation of one session: from selection to live endpoints.
//!
//! ```text
//!   connect()        connected event          disconnect() / channel lost
//! ───────────► Connecting ───────────► Connected ─────────────► Closed
//!                  │                                              ▲
//!                  └──────────────────────────────────────────────┘
//! ```
//!
//! Nothing leaves `Closed`; observing again needs a fresh controller.

use crate::channel::{Connector, Delivery, Subscription};
use crate::data::{Endpoint, Selection};
use crate::error::ClientError;
use crate::protocol::{observe_path, ObservationEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservationState {
    /// Channel open, endpoints not known yet
    Connecting,
    Connected {
        terminal_endpoint: Endpoint,
        audio_endpoint: Endpoint,
        /// The selected session had a physical keyboard that is now gone
        keyboard_lost: bool,
    },
    Closed,
}

/// Why an observation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The user left
    Left,
    /// The server or network closed the channel
    ChannelLost { reason: Option<String> },
}

#[derive(Default)]
pub struct ObservationController {
    selection: Option<Selection>,
    state: Option<ObservationState>,
    channel: Option<Subscription>,
    last_status: Option<String>,
    close_reason: Option<CloseReason>,
}

impl ObservationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the observation channel for `selection`.
    pub async fn connect<C: Connector>(
        &mut self,
        connector: &C,
        selection: Selection,
    ) -> Result<(), ClientError> {
        match &self.state {
            None => {}
            Some(ObservationState::Closed) => return Err(ClientError::ObservationClosed),
            Some(_) => {
                return Err(ClientError::AlreadyConnected(
                    self.session_id().unwrap_or_default().to_string(),
                ))
            }
        }

        let subscription = connector.open(&observe_path(selection.path_id())).await?;
        tracing::info!("Observing {}", subscription.address());

        self.channel = Some(subscription);
        self.selection = Some(selection);
        self.state = Some(ObservationState::Connecting);
        Ok(())
    }

    /// Close the channel. Calling it again has no further effect.
    pub fn disconnect(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        if self.state != Some(ObservationState::Closed) {
            tracing::info!("Left observation of {}", self.session_id().unwrap_or("?"));
            self.state = Some(ObservationState::Closed);
            self.close_reason.get_or_insert(CloseReason::Left);
        }
    }

    /// Current state; `None` before [`connect`](Self::connect).
    pub fn state(&self) -> Option<&ObservationState> {
        self.state.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, Some(ObservationState::Closed))
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Path id of the observed session (`new` for a fresh one).
    pub fn session_id(&self) -> Option<&str> {
        self.selection.as_ref().map(Selection::path_id)
    }

    /// Most recent non-`connected` status sent by the server.
    pub fn last_status(&self) -> Option<&str> {
        self.last_status.as_deref()
    }

    pub fn close_reason(&self) -> Option<&CloseReason> {
        self.close_reason.as_ref()
    }

    /// Wait for the next delivery from the observation channel.
    ///
    /// Never resolves when no channel is open.
    pub async fn next_delivery(&mut self) -> Delivery {
        if let Some(channel) = self.channel.as_mut() {
            if let Some(delivery) = channel.recv().await {
                return delivery;
            }
        }
        std::future::pending().await
    }

    /// Apply one channel delivery. Returns true if the state may have changed.
    pub fn on_delivery(&mut self, delivery: Delivery) -> bool {
        match delivery {
            Delivery::Message(payload) => self.on_message(&payload),
            Delivery::Closed { reason } => {
                if self.is_closed() {
                    return false;
                }
                tracing::warn!(
                    "Observation channel for {} closed: {}",
                    self.session_id().unwrap_or("?"),
                    reason.as_deref().unwrap_or("no reason given")
                );
                self.channel = None;
                self.close_reason = Some(CloseReason::ChannelLost { reason });
                self.state = Some(ObservationState::Closed);
                true
            }
        }
    }

    /// Decode and apply one payload line.
    pub fn on_message(&mut self, payload: &str) -> bool {
        self.on_event(ObservationEvent::decode(payload))
    }

    /// Apply one decoded event. Returns true if the state changed.
    pub fn on_event(&mut self, event: ObservationEvent) -> bool {
        if !matches!(
            self.state,
            Some(ObservationState::Connecting | ObservationState::Connected { .. })
        ) {
            tracing::debug!("Ignoring observation event outside a live observation");
            return false;
        }

        match event {
            ObservationEvent::Connected {
                terminal_endpoint,
                audio_endpoint,
                kb,
            } => {
                let had_keyboard = self.selection.as_ref().is_some_and(Selection::had_keyboard);
                let keyboard_lost = had_keyboard && !kb;
                tracing::info!(
                    "Observation of {} connected: terminal {}, audio {}",
                    self.session_id().unwrap_or("?"),
                    terminal_endpoint,
                    audio_endpoint
                );
                self.state = Some(ObservationState::Connected {
                    terminal_endpoint,
                    audio_endpoint,
                    keyboard_lost,
                });
                true
            }
            ObservationEvent::Status(status) => {
                tracing::debug!("Observation status: {}", status);
                self.last_status = Some(status);
                true
            }
            ObservationEvent::Malformed { reason } => {
                tracing::warn!("Discarding malformed observation event: {}", reason);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryConnector;
    use crate::data::{SessionRecord, SessionState};

    const CONNECTED: &str = r#"{"status": "connected", "ssh": {"url": "http://h/ssh"}, "mp3": {"url": "http://h/a.mp3"}, "session": {"kb": true}}"#;

    async fn connected_controller(connector: &MemoryConnector) -> ObservationController {
        let mut controller = ObservationController::new();
        controller
            .connect(
                connector,
                Selection::Existing(SessionRecord::new("5", SessionState::Running)),
            )
            .await
            .unwrap();
        controller
    }

    #[tokio::test]
    async fn test_status_events_do_not_change_state() {
        let connector = MemoryConnector::new();
        let _feed = connector.route("/observe/5");
        let mut controller = connected_controller(&connector).await;

        assert!(controller.on_message(r#"{"status": "connecting", "id": 5}"#));
        assert_eq!(controller.state(), Some(&ObservationState::Connecting));
        assert_eq!(controller.last_status(), Some("connecting"));
    }

    #[tokio::test]
    async fn test_keyboard_not_lost_when_never_attached() {
        let connector = MemoryConnector::new();
        let _feed = connector.route("/observe/5");
        let mut controller = connected_controller(&connector).await;

        controller.on_message(CONNECTED);
        assert!(matches!(
            controller.state(),
            Some(ObservationState::Connected {
                keyboard_lost: false,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_events_after_close_are_ignored() {
        let connector = MemoryConnector::new();
        let _feed = connector.route("/observe/5");
        let mut controller = connected_controller(&connector).await;

        controller.disconnect();
        assert!(!controller.on_message(CONNECTED));
        assert_eq!(controller.state(), Some(&ObservationState::Closed));
        assert_eq!(controller.close_reason(), Some(&CloseReason::Left));
    }

    #[tokio::test]
    async fn test_channel_lost_closes_observation() {
        let connector = MemoryConnector::new();
        let _feed = connector.route("/observe/5");
        let mut controller = connected_controller(&connector).await;

        assert!(controller.on_delivery(Delivery::Closed {
            reason: Some("gone".into())
        }));
        assert!(controller.is_closed());
        assert_eq!(
            controller.close_reason(),
            Some(&CloseReason::ChannelLost {
                reason: Some("gone".into())
            })
        );

        // A later user disconnect keeps the original reason.
        controller.disconnect();
        assert!(matches!(
            controller.close_reason(),
            Some(CloseReason::ChannelLost { .. })
        ));
    }

    #[test]
    fn test_events_before_connect_are_ignored() {
        let mut controller = ObservationController::new();
        assert!(!controller.on_message(CONNECTED));
        assert!(controller.state().is_none());
    }
}

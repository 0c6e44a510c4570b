//! Wire protocol for the two push channels.
//!
//! Payloads are JSON objects, one per line. Each channel decodes into a
//! closed enum once, at the boundary; anything that does not decode becomes
//! the `Malformed` variant instead of an error.
//!
//! # Directory channel (`/watch_list`)
//! ```json
//! {"command": "session_add", "session": {"id": 1, "state": "idle", "kb": true}}
//! {"command": "session_remove", "session": {"id": 1}}
//! {"command": "session_state", "session": {"id": 1, "state": "running", "kb": false}}
//! {"command": "keystrokes", "keystrokes": {"session": {"id": 1}}}
//! ```
//!
//! # Observation channel (`/observe/{id}`)
//! ```json
//! {"status": "connected", "ssh": {"url": "http://..."}, "mp3": {"url": "http://..."}, "session": {"kb": false}}
//! {"status": "connecting", "id": 1}
//! ```

use crate::data::{Endpoint, SessionId, SessionRecord};
use serde::Deserialize;

/// Path of the directory channel.
pub const WATCH_LIST_PATH: &str = "/watch_list";

/// Path of the observation channel for a session (`new` asks for a fresh one).
pub fn observe_path(session_id: &str) -> String {
    format!("/observe/{}", urlencoding::encode(session_id))
}

/// Split a transport frame into its non-blank payload lines.
pub fn split_frame(frame: &str) -> impl Iterator<Item = &str> {
    frame.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// A decoded event from the directory channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryEvent {
    SessionAdd(SessionRecord),
    SessionRemove(SessionId),
    SessionState(SessionRecord),
    KeystrokeActivity(SessionId),
    Malformed { reason: String },
}

#[derive(Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum DirectoryWire {
    SessionAdd { session: SessionRecord },
    SessionRemove { session: SessionRef },
    SessionState { session: SessionRecord },
    Keystrokes { keystrokes: KeystrokesWire },
}

#[derive(Deserialize)]
struct SessionRef {
    id: SessionId,
}

#[derive(Deserialize)]
struct KeystrokesWire {
    session: SessionRef,
}

impl DirectoryEvent {
    pub fn decode(payload: &str) -> Self {
        match serde_json::from_str::<DirectoryWire>(payload) {
            Ok(DirectoryWire::SessionAdd { session }) => Self::SessionAdd(session),
            Ok(DirectoryWire::SessionRemove { session }) => Self::SessionRemove(session.id),
            Ok(DirectoryWire::SessionState { session }) => Self::SessionState(session),
            Ok(DirectoryWire::Keystrokes { keystrokes }) => {
                Self::KeystrokeActivity(keystrokes.session.id)
            }
            Err(e) => Self::Malformed {
                reason: e.to_string(),
            },
        }
    }

    /// Session the event refers to, if it decoded.
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::SessionAdd(record) | Self::SessionState(record) => Some(&record.id),
            Self::SessionRemove(id) | Self::KeystrokeActivity(id) => Some(id),
            Self::Malformed { .. } => None,
        }
    }
}

/// A decoded event from an observation channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservationEvent {
    /// The session is running and its endpoints are ready
    Connected {
        terminal_endpoint: Endpoint,
        audio_endpoint: Endpoint,
        /// Authoritative keyboard flag at connection time
        kb: bool,
    },
    /// Any other status (`connecting`, `disconnected`, `error`, ...)
    Status(String),
    Malformed { reason: String },
}

#[derive(Deserialize)]
struct ObservationWire {
    status: String,
    ssh: Option<EndpointWire>,
    mp3: Option<EndpointWire>,
    session: Option<KeyboardWire>,
}

#[derive(Deserialize)]
struct EndpointWire {
    url: String,
}

#[derive(Deserialize)]
struct KeyboardWire {
    #[serde(default)]
    kb: bool,
}

impl ObservationEvent {
    pub fn decode(payload: &str) -> Self {
        match serde_json::from_str::<ObservationWire>(payload) {
            Ok(wire) if wire.status == "connected" => Self::decode_connected(wire),
            Ok(wire) => Self::Status(wire.status),
            Err(e) => Self::Malformed {
                reason: e.to_string(),
            },
        }
    }

    fn decode_connected(wire: ObservationWire) -> Self {
        let (Some(ssh), Some(mp3), Some(session)) = (wire.ssh, wire.mp3, wire.session) else {
            return Self::Malformed {
                reason: "connected event without ssh, mp3 and session".to_string(),
            };
        };

        match (Endpoint::parse(&ssh.url), Endpoint::parse(&mp3.url)) {
            (Some(terminal_endpoint), Some(audio_endpoint)) => Self::Connected {
                terminal_endpoint,
                audio_endpoint,
                kb: session.kb,
            },
            (None, _) => Self::Malformed {
                reason: "blank terminal endpoint".to_string(),
            },
            (_, None) => Self::Malformed {
                reason: "blank audio endpoint".to_string(),
            },
        }
    }
}

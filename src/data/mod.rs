use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use url::Url;

/// Opaque session identifier, stable for the lifetime of a session.
///
/// The backend sends ids as JSON integers while other clients use strings,
/// so both are accepted and normalized to their string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(i64),
            Uint(u64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Int(n) => Self(n.to_string()),
            Raw::Uint(n) => Self(n.to_string()),
        })
    }
}

/// Lifecycle state of a remote session as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Stopping,
    Failed,
}

impl SessionState {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Failed => "failed",
        }
    }

    /// Whether a user may pick a session in this state to observe.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Idle | Self::Running)
    }

    /// Iterator over all states in lifecycle order
    pub fn all() -> impl Iterator<Item = Self> {
        [
            Self::Idle,
            Self::Starting,
            Self::Running,
            Self::Stopping,
            Self::Failed,
        ]
        .into_iter()
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One session as known to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub state: SessionState,
    /// A physical keyboard client is attached to the session
    #[serde(default)]
    pub kb: bool,
    /// Client-only: a keystroke was seen recently and has not expired yet
    #[serde(skip)]
    pub activity_pulse: bool,
}

impl SessionRecord {
    pub fn new(id: impl Into<SessionId>, state: SessionState) -> Self {
        Self {
            id: id.into(),
            state,
            kb: false,
            activity_pulse: false,
        }
    }

    pub fn with_keyboard(mut self, kb: bool) -> Self {
        self.kb = kb;
        self
    }

    pub fn is_joinable(&self) -> bool {
        self.state.is_joinable()
    }

    /// Stopping sessions are kept internally but hidden from the list.
    pub fn is_listed(&self) -> bool {
        self.state != SessionState::Stopping
    }
}

/// What the user picked on the directory screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// An existing session, as it looked in the directory when picked
    Existing(SessionRecord),
    /// Ask the backend to start a fresh session
    New,
}

impl Selection {
    /// Path segment the backend expects for this selection.
    pub fn path_id(&self) -> &str {
        match self {
            Self::Existing(record) => record.id.as_str(),
            Self::New => "new",
        }
    }

    /// Keyboard flag of the record the user originally selected.
    pub fn had_keyboard(&self) -> bool {
        match self {
            Self::Existing(record) => record.kb,
            Self::New => false,
        }
    }
}

/// A terminal or audio endpoint exactly as the backend handed it out.
///
/// Endpoints are often relative to the page that serves the playground, so
/// they are kept verbatim and only resolved when opened.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(String);

impl Endpoint {
    /// Accept any non-blank value.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Absolute address for a browser. Relative endpoints resolve against the
    /// http(s) origin of the WebSocket server.
    pub fn resolve(&self, server: &Url) -> Result<Url, url::ParseError> {
        let mut origin = server.clone();
        let scheme = if server.scheme() == "wss" { "https" } else { "http" };
        // ws/wss and http/https are all special schemes, so this cannot fail.
        let _ = origin.set_scheme(scheme);
        origin.join(&self.0)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a push channel from the client's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkStatus {
    /// Not opened yet, or torn down by the client
    #[default]
    Idle,
    /// Open and delivering events
    Live,
    /// Closed by the server or the network; no reconnect is attempted
    Disconnected,
}

impl LinkStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Live => "live",
            Self::Disconnected => "disconnected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_relative_value() {
        let endpoint = Endpoint::parse(" U1 ").unwrap();
        assert_eq!(endpoint.as_str(), "U1");
        assert!(Endpoint::parse("   ").is_none());
    }

    #[test]
    fn test_endpoint_resolves_against_server_origin() {
        let server = Url::parse("wss://play.example.com:3001/").unwrap();
        let relative = Endpoint::parse("/ssh/host/c1?port=22").unwrap();
        assert_eq!(
            relative.resolve(&server).unwrap().as_str(),
            "https://play.example.com:3001/ssh/host/c1?port=22"
        );

        let absolute = Endpoint::parse("http://h:8000/stream.mp3").unwrap();
        assert_eq!(
            absolute.resolve(&server).unwrap().as_str(),
            "http://h:8000/stream.mp3"
        );
    }

    #[test]
    fn test_session_id_from_integer() {
        let id: SessionId = serde_json::from_str("7").unwrap();
        assert_eq!(id, SessionId::from("7"));
    }

    #[test]
    fn test_session_id_from_string() {
        let id: SessionId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(id.as_str(), "abc");
    }

    #[test]
    fn test_session_state_rejects_numeric_legacy() {
        assert!(serde_json::from_str::<SessionState>("1").is_err());
    }

    #[test]
    fn test_session_state_rejects_unknown_string() {
        assert!(serde_json::from_str::<SessionState>("\"paused\"").is_err());
    }

    #[test]
    fn test_record_keyboard_defaults_to_false() {
        let record: SessionRecord =
            serde_json::from_str(r#"{"id": 3, "state": "running"}"#).unwrap();
        assert!(!record.kb);
        assert!(!record.activity_pulse);
    }

    #[test]
    fn test_joinable_states() {
        let joinable: Vec<_> = SessionState::all().filter(|s| s.is_joinable()).collect();
        assert_eq!(joinable, vec![SessionState::Idle, SessionState::Running]);
    }

    #[test]
    fn test_new_selection_path() {
        assert_eq!(Selection::New.path_id(), "new");
        assert!(!Selection::New.had_keyboard());
    }
}

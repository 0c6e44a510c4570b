use tokio_tungstenite::tungstenite;

/// Errors returned to callers of the directory and observation controllers.
///
/// Problems with individual events are never errors: malformed payloads and
/// unknown session ids are absorbed where they arrive.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("directory synchronizer is already started")]
    AlreadyStarted,

    #[error("observation is already connected to session {0}")]
    AlreadyConnected(String),

    #[error("observation was closed; start a new one to reconnect")]
    ObservationClosed,

    #[error("server is unavailable at {0}")]
    Unavailable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClientError {
    pub fn from_tungstenite(address: &str, err: tungstenite::Error) -> Self {
        let is_connect = match &err {
            tungstenite::Error::Io(io_err) => matches!(
                io_err.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        };
        if is_connect {
            Self::Unavailable(address.to_string())
        } else {
            Self::Other(anyhow::Error::new(err).context(format!("failed to open {}", address)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refused_connection_is_unavailable() {
        let io = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        let err = ClientError::from_tungstenite("ws://localhost:1/watch_list", io.into());
        assert!(matches!(err, ClientError::Unavailable(addr) if addr.ends_with("/watch_list")));
    }

    #[test]
    fn test_other_errors_keep_context() {
        let err = ClientError::from_tungstenite(
            "ws://localhost:1/watch_list",
            tungstenite::Error::ConnectionClosed,
        );
        assert!(matches!(err, ClientError::Other(_)));
        assert!(format!("{:#}", err).contains("ws://localhost:1/watch_list"));
    }
}

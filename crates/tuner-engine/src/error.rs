use thiserror::Error;

/// Why a source could not be played.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaybackError {
    /// Adaptive source with neither an engine nor native sink support.
    #[error("source unsupported: no adaptive-stream engine and no native playback")]
    SourceUnsupported,
    /// Fetch, parse or decode failure reported by the session.
    #[error("network or manifest error: {0}")]
    NetworkOrManifest(String),
    /// No ready signal inside the watchdog bound.
    #[error("media unavailable")]
    Timeout,
    /// Play-out refused by platform policy.  Never fatal.
    #[error("playback rejected: {0}")]
    PlaybackRejected(String),
}

impl PlaybackError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PlaybackError::PlaybackRejected(_))
    }

    /// Text carried by `PlaybackState::Error`.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Failure talking to a sink or fullscreen back-end.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("sink back-end is gone")]
    Closed,
    #[error("operation not supported by this player")]
    Unsupported,
    #[error("sink error: {0}")]
    Backend(String),
}

/// Result of asking a sink to start play-out.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlayError {
    /// Autoplay restriction or similar policy refusal.
    #[error("play-out rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        assert_eq!(PlaybackError::Timeout.message(), "media unavailable");
    }

    #[test]
    fn test_rejection_is_not_fatal() {
        assert!(!PlaybackError::PlaybackRejected("policy".into()).is_fatal());
        assert!(PlaybackError::SourceUnsupported.is_fatal());
        assert!(PlaybackError::NetworkOrManifest("404".into()).is_fatal());
    }
}

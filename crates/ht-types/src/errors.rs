use thiserror::Error;

/// Main error type for the Hypertune system
#[derive(Error, Debug)]
pub enum HtError {
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Transport-level errors raised by the message channel.
///
/// These never carry trial semantics: a transport failure is dropped at the
/// channel boundary and is never converted into an [`Observation`].
///
/// [`Observation`]: crate::observation::Observation
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("peer rejected authentication")]
    AuthRejected,

    #[error("channel disconnected")]
    Disconnected,

    #[error("malformed frame: {reason}")]
    Malformed { reason: String },

    #[error("bind failed on {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("connect failed to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },
}

/// Convenience result alias used throughout the workspace.
pub type HtResult<T> = Result<T, HtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_error_wraps_into_ht_error() {
        let err: HtError = ChannelError::Disconnected.into();
        assert!(matches!(err, HtError::Channel(ChannelError::Disconnected)));
        assert!(err.to_string().contains("disconnected"));
    }
}

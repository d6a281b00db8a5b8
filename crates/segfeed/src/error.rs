use std::time::Duration;

use crate::sink::SinkError;

pub type Result<T> = std::result::Result<T, FeederError>;

#[derive(Debug, thiserror::Error)]
pub enum FeederError {
    #[error("invalid endpoint `{input}`: {reason}")]
    InvalidEndpoint { input: String, reason: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("connection to {url} timed out after {timeout:?}")]
    ConnectTimeout { url: String, timeout: Duration },

    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("stream `{stream_id}` closed before the initialization segment arrived")]
    StreamUnavailable { stream_id: String },

    #[error("session made no progress for {timeout:?}")]
    IdleTimeout { timeout: Duration },

    #[error("sink rejected format `{mime}`: {source}")]
    Negotiation {
        mime: String,
        #[source]
        source: SinkError,
    },

    #[error("sink rejected segment #{sequence}: {source}")]
    SinkRejected {
        sequence: u64,
        #[source]
        source: SinkError,
    },

    #[error("sink reported an error: {reason}")]
    SinkFailed { reason: String },

    #[error("segment queue overflow: {queued} segments pending (limit {limit})")]
    QueueOverflow { queued: usize, limit: usize },

    #[error("invalid feeder state: expected {expected}, found {found}")]
    InvalidState {
        expected: &'static str,
        found: &'static str,
    },
}

impl FeederError {
    pub fn invalid_endpoint(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn sink_failed(reason: impl Into<String>) -> Self {
        Self::SinkFailed {
            reason: reason.into(),
        }
    }

    /// Failures of the duplex channel to the publisher.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. }
                | Self::ConnectTimeout { .. }
                | Self::Transport { .. }
                | Self::StreamUnavailable { .. }
                | Self::IdleTimeout { .. }
        )
    }

    /// Failures raised by the playback sink. The sink's decode state is
    /// undefined afterwards, so the session cannot continue.
    pub fn is_sink(&self) -> bool {
        matches!(
            self,
            Self::Negotiation { .. } | Self::SinkRejected { .. } | Self::SinkFailed { .. }
        )
    }
}

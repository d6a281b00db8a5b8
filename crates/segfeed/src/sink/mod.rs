//! Playback sink contract.
//!
//! A sink accepts one segment at a time. `append_buffer` only starts the
//! work; the sink reports completion asynchronously with
//! [`SinkEvent::UpdateEnd`] on its event channel, and answers
//! [`MediaSink::is_updating`] with `true` until then.

mod writer;

pub use writer::WriterSink;

use crate::config::MediaProfile;
use crate::segment::Segment;

/// Signals emitted by a sink, in the order they occur.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    /// The sink can accept a format declaration. Fired once.
    SourceOpen,
    /// The previous append finished and the sink is idle again.
    UpdateEnd,
    /// The previous append failed; the sink's buffer state is undefined.
    Error { reason: String },
    /// The sink went away (element detached, output closed).
    SourceClosed,
}

/// Synchronous refusals from a sink.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("sink is still processing the previous segment")]
    Busy,

    #[error("no source buffer has been declared")]
    NotConfigured,

    #[error("a source buffer is already declared")]
    AlreadyConfigured,

    #[error("unsupported media type `{mime}`")]
    UnsupportedType { mime: String },

    #[error("sink is closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

pub trait MediaSink {
    /// `true` while an append is in progress.
    fn is_updating(&self) -> bool;

    /// Declare the session's only media format.
    fn add_source_buffer(&mut self, profile: &MediaProfile) -> Result<(), SinkError>;

    /// Start consuming one segment.
    fn append_buffer(&mut self, segment: Segment) -> Result<(), SinkError>;

    /// Called once when the session ends.
    fn end_of_stream(&mut self) {}
}

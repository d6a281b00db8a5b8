//! # segfeed-engine
//!
//! Client side of a fragmented-MP4 live stream: segments pushed by a publisher
//! over a WebSocket are queued in arrival order and fed to a playback sink one
//! at a time, each only after the sink signals it has finished the previous
//! one.
//!
//! ## Components
//!
//! - [`SegmentQueue`]: unbounded FIFO of opaque segments
//! - [`BufferFeeder`]: the busy/idle handshake with the sink and the session
//!   state machine
//! - [`PlaybackSession`]: single-task driver owning one feeder and one
//!   connection
//! - [`MediaSink`]: the sink contract, with [`WriterSink`] as a built-in
//!   implementation over any `AsyncWrite`
//!
//! ## Example
//!
//! ```no_run
//! use segfeed_engine::{Endpoint, PlaybackSession, SessionConfig, WebSocketConnector, WriterSink};
//!
//! # async fn run() {
//! let config = SessionConfig::new("demo", Endpoint::new("127.0.0.1", 8083));
//! let (sink, events) = WriterSink::spawn(tokio::io::stdout());
//! let report = PlaybackSession::new(config, sink, events, WebSocketConnector)
//!     .run()
//!     .await;
//! println!("{:?}", report.end);
//! # }
//! ```
//!
//! ## License
//!
//! MIT License
//!
//! ## Authors
//!
//! - hua0512
//!

pub mod config;
pub mod connection;
pub mod error;
pub mod feeder;
pub mod queue;
pub mod segment;
pub mod session;
pub mod sink;

#[cfg(test)]
mod test_support;

pub use config::{AppendMode, Endpoint, MediaProfile, SessionConfig};
pub use connection::{Connector, SegmentSource, WebSocketConnector, WebSocketSource};
pub use error::{FeederError, Result};
pub use feeder::{BufferFeeder, DrainOutcome, FeederState, FeederStats};
pub use queue::SegmentQueue;
pub use segment::Segment;
pub use session::{PlaybackSession, SessionEnd, SessionReport};
pub use sink::{MediaSink, SinkError, SinkEvent, WriterSink};

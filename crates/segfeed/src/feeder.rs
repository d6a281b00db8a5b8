//! # Buffer Feeder
//!
//! Bridges segments arriving from the network to a [`MediaSink`] that accepts
//! one segment at a time.
//!
//! Segments are queued in arrival order and leave the queue only through
//! [`BufferFeeder::attempt_drain`], which feeds the head segment when the sink
//! is idle and nothing is outstanding. The drain is attempted after every
//! arrival and after every completion signal from the sink, so the pipeline is
//! a level-triggered pull loop: bursts accumulate in the queue and the sink is
//! never fed faster than it completes.
//!
//! ## States
//!
//! `Uninitialized -> SinkReady -> Streaming -> Closed`
//!
//! - `Uninitialized`: the sink has not signalled readiness; arrivals are
//!   queued but never fed.
//! - `SinkReady`: the media profile has been declared to the sink.
//! - `Streaming`: the connection is open and segments flow.
//! - `Closed`: terminal; the queue has been discarded.
//!
//! All methods take `&mut self`; the feeder is driven from a single task and
//! holds no locks.

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, error, info, trace, warn};

use crate::config::MediaProfile;
use crate::error::{FeederError, Result};
use crate::queue::SegmentQueue;
use crate::segment::Segment;
use crate::sink::MediaSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeederState {
    Uninitialized,
    SinkReady,
    Streaming,
    Closed,
}

impl FeederState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeederState::Uninitialized => "uninitialized",
            FeederState::SinkReady => "sink-ready",
            FeederState::Streaming => "streaming",
            FeederState::Closed => "closed",
        }
    }

    /// Whether the profile has been negotiated and the session is still live.
    pub fn can_feed(&self) -> bool {
        matches!(self, FeederState::SinkReady | FeederState::Streaming)
    }
}

/// What a single drain attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The head segment was handed to the sink.
    Fed { sequence: u64, len: usize },
    /// A feed is outstanding or the sink reports busy; the queue is untouched.
    SinkBusy,
    QueueEmpty,
    /// The media profile has not been negotiated yet.
    NotReady,
    Closed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeederStats {
    pub segments_received: u64,
    pub bytes_received: u64,
    pub segments_fed: u64,
    pub bytes_fed: u64,
    pub segments_discarded: u64,
    pub peak_queue_len: usize,
}

pub struct BufferFeeder<S> {
    sink: S,
    profile: MediaProfile,
    queue: SegmentQueue,
    state: FeederState,
    /// Sequence of the segment the sink is consuming, until it signals completion.
    in_flight: Option<u64>,
    next_sequence: u64,
    max_queued: Option<usize>,
    stats: FeederStats,
}

impl<S: MediaSink> BufferFeeder<S> {
    pub fn new(sink: S, profile: MediaProfile) -> Self {
        Self {
            sink,
            profile,
            queue: SegmentQueue::new(),
            state: FeederState::Uninitialized,
            in_flight: None,
            next_sequence: 0,
            max_queued: None,
            stats: FeederStats::default(),
        }
    }

    /// Fail the session once more than `limit` segments are pending.
    pub fn with_queue_limit(mut self, limit: Option<usize>) -> Self {
        self.max_queued = limit;
        self
    }

    pub fn state(&self) -> FeederState {
        self.state
    }

    pub fn profile(&self) -> &MediaProfile {
        &self.profile
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn queued_bytes(&self) -> usize {
        self.queue.total_bytes()
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    pub fn stats(&self) -> FeederStats {
        FeederStats {
            peak_queue_len: self.queue.peak_len(),
            ..self.stats.clone()
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Handle the sink's readiness signal by declaring the media profile.
    ///
    /// Only the first signal negotiates; later ones are ignored. Segments
    /// queued before readiness start flowing once negotiation succeeds.
    pub fn on_sink_ready(&mut self) -> Result<()> {
        match self.state {
            FeederState::Uninitialized => {}
            FeederState::SinkReady | FeederState::Streaming => {
                debug!("Sink signalled readiness again, profile already negotiated");
                return Ok(());
            }
            FeederState::Closed => {
                return Err(FeederError::InvalidState {
                    expected: FeederState::Uninitialized.as_str(),
                    found: self.state.as_str(),
                });
            }
        }

        if let Err(source) = self.sink.add_source_buffer(&self.profile) {
            let mime = self.profile.mime_type();
            error!(mime = %mime, error = %source, "Sink rejected media profile");
            self.close();
            return Err(FeederError::Negotiation { mime, source });
        }

        info!(profile = %self.profile, "Media profile negotiated");
        self.state = FeederState::SinkReady;
        self.attempt_drain().map(|_| ())
    }

    /// The connection is open; segments are now expected.
    pub fn mark_streaming(&mut self) -> Result<()> {
        match self.state {
            FeederState::SinkReady => {
                self.state = FeederState::Streaming;
                Ok(())
            }
            FeederState::Streaming => Ok(()),
            FeederState::Uninitialized | FeederState::Closed => Err(FeederError::InvalidState {
                expected: FeederState::SinkReady.as_str(),
                found: self.state.as_str(),
            }),
        }
    }

    /// Queue one transport payload and try to feed the sink.
    pub fn on_segment_arrived(&mut self, data: impl Into<Bytes>) -> Result<DrainOutcome> {
        let data = data.into();
        if self.state == FeederState::Closed {
            trace!(len = data.len(), "Dropping segment for closed session");
            self.stats.segments_discarded += 1;
            return Ok(DrainOutcome::Closed);
        }

        let segment = Segment::new(self.next_sequence, data);
        self.next_sequence += 1;
        self.stats.segments_received += 1;
        self.stats.bytes_received += segment.len() as u64;

        if let Some(limit) = self.max_queued
            && self.queue.len() >= limit
        {
            let queued = self.queue.len() + 1;
            error!(queued, limit, "Segment queue exceeded its limit");
            self.stats.segments_discarded += 1;
            self.close();
            return Err(FeederError::QueueOverflow { queued, limit });
        }

        trace!(
            sequence = segment.sequence(),
            len = segment.len(),
            queued = self.queue.len(),
            "Segment arrived"
        );
        self.queue.enqueue(segment);
        self.attempt_drain()
    }

    /// Feed the head of the queue if the sink can take it.
    ///
    /// Does nothing, and leaves the queue untouched, when the profile is not
    /// negotiated, a feed is outstanding, the sink reports busy or the queue is
    /// empty. A synchronous refusal from the sink closes the session.
    pub fn attempt_drain(&mut self) -> Result<DrainOutcome> {
        if !self.state.can_feed() {
            return Ok(match self.state {
                FeederState::Closed => DrainOutcome::Closed,
                _ => DrainOutcome::NotReady,
            });
        }
        if self.in_flight.is_some() || self.sink.is_updating() {
            return Ok(DrainOutcome::SinkBusy);
        }
        let Some(segment) = self.queue.dequeue() else {
            return Ok(DrainOutcome::QueueEmpty);
        };

        let sequence = segment.sequence();
        let len = segment.len();
        match self.sink.append_buffer(segment) {
            Ok(()) => {
                self.in_flight = Some(sequence);
                self.stats.segments_fed += 1;
                self.stats.bytes_fed += len as u64;
                trace!(sequence, len, queued = self.queue.len(), "Segment fed to sink");
                Ok(DrainOutcome::Fed { sequence, len })
            }
            Err(source) => {
                error!(sequence, error = %source, "Sink rejected segment");
                self.close();
                Err(FeederError::SinkRejected { sequence, source })
            }
        }
    }

    /// Completion signal from the sink: the outstanding segment is consumed.
    pub fn on_update_end(&mut self) -> Result<DrainOutcome> {
        match self.in_flight.take() {
            Some(sequence) => trace!(sequence, "Sink finished segment"),
            None if self.state != FeederState::Closed => {
                debug!("Completion signal without an outstanding segment")
            }
            None => {}
        }
        self.attempt_drain()
    }

    /// Asynchronous failure reported by the sink. Closes the session.
    pub fn on_sink_error(&mut self, reason: impl Into<String>) -> FeederError {
        let reason = reason.into();
        error!(in_flight = ?self.in_flight, reason = %reason, "Sink reported an error");
        self.close();
        FeederError::sink_failed(reason)
    }

    /// Tear down: discard pending segments and notify the sink. Returns how
    /// many segments were discarded. Idempotent.
    pub fn close(&mut self) -> usize {
        if self.state == FeederState::Closed {
            return 0;
        }
        let discarded = self.queue.clear();
        self.stats.segments_discarded += discarded as u64;
        self.state = FeederState::Closed;
        self.in_flight = None;
        self.sink.end_of_stream();
        if discarded > 0 {
            warn!(discarded, "Discarded pending segments on close");
        }
        debug!(
            fed = self.stats.segments_fed,
            received = self.stats.segments_received,
            "Feeder closed"
        );
        discarded
    }
}

//! One playback session: sink readiness, negotiation, connection, streaming,
//! teardown.
//!
//! The session owns exactly one [`BufferFeeder`] and one connection and runs
//! every event (sink signals, incoming frames, idle timer, cancellation) on a
//! single task, so the feeder and its queue need no synchronization.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::SessionConfig;
use crate::connection::{Connector, SegmentSource};
use crate::error::FeederError;
use crate::feeder::{BufferFeeder, FeederStats};
use crate::sink::{MediaSink, SinkEvent};

/// Why a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// Cancelled by the caller.
    Stopped,
    /// The publisher closed the connection after streaming.
    StreamEnded,
    /// The sink went away.
    SinkClosed,
    Failed(FeederError),
}

impl SessionEnd {
    pub fn is_failure(&self) -> bool {
        matches!(self, SessionEnd::Failed(_))
    }
}

#[derive(Debug)]
pub struct SessionReport {
    pub session_id: String,
    pub stream_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub end: SessionEnd,
    pub stats: FeederStats,
}

impl SessionReport {
    pub fn duration(&self) -> Duration {
        (self.ended_at - self.started_at).to_std().unwrap_or_default()
    }

    /// The stats, or the error that ended the session.
    pub fn into_result(self) -> Result<FeederStats, FeederError> {
        match self.end {
            SessionEnd::Failed(e) => Err(e),
            _ => Ok(self.stats),
        }
    }
}

pub struct PlaybackSession<S, C> {
    id: String,
    config: SessionConfig,
    feeder: BufferFeeder<S>,
    sink_events: mpsc::UnboundedReceiver<SinkEvent>,
    connector: C,
    cancel: CancellationToken,
}

impl<S, C> PlaybackSession<S, C>
where
    S: MediaSink,
    C: Connector,
{
    pub fn new(
        config: SessionConfig,
        sink: S,
        sink_events: mpsc::UnboundedReceiver<SinkEvent>,
        connector: C,
    ) -> Self {
        let feeder = BufferFeeder::new(sink, config.profile.clone())
            .with_queue_limit(config.max_queued_segments);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            config,
            feeder,
            sink_events,
            connector,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run the session to completion. Every failure is terminal and reported
    /// in [`SessionReport::end`]; nothing is retried.
    pub async fn run(mut self) -> SessionReport {
        let started_at = Utc::now();
        let span = info_span!("session", id = %self.id, stream = %self.config.stream_id);
        let end = self.drive().instrument(span.clone()).await;

        let stats = self.feeder.stats();
        span.in_scope(|| match &end {
            SessionEnd::Failed(e) => error!(error = %e, ?stats, "Session failed"),
            other => info!(end = ?other, ?stats, "Session ended"),
        });

        SessionReport {
            session_id: self.id,
            stream_id: self.config.stream_id,
            started_at,
            ended_at: Utc::now(),
            end,
            stats,
        }
    }

    async fn drive(&mut self) -> SessionEnd {
        if let Err(e) = self.config.validate() {
            self.feeder.close();
            return SessionEnd::Failed(e);
        }

        if let Some(end) = self.wait_for_sink_ready().await {
            self.feeder.close();
            return end;
        }
        if let Err(e) = self.feeder.on_sink_ready() {
            return SessionEnd::Failed(e);
        }

        let connected = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = self.connector.connect(&self.config) => Some(result),
        };
        let mut source = match connected {
            Some(Ok(source)) => source,
            Some(Err(e)) => {
                self.feeder.close();
                return SessionEnd::Failed(e);
            }
            None => {
                self.feeder.close();
                return SessionEnd::Stopped;
            }
        };

        let end = match self.feeder.mark_streaming() {
            Ok(()) => {
                info!("Streaming");
                self.pump(&mut source).await
            }
            Err(e) => SessionEnd::Failed(e),
        };

        if let Err(e) = source.close().await {
            debug!(error = %e, "Error while closing connection");
        }
        self.feeder.close();
        end
    }

    /// Wait for the sink's first readiness signal. `Some` means the session
    /// ended before it arrived.
    async fn wait_for_sink_ready(&mut self) -> Option<SessionEnd> {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Some(SessionEnd::Stopped),
                event = self.sink_events.recv() => match event {
                    Some(SinkEvent::SourceOpen) => return None,
                    Some(SinkEvent::Error { reason }) => {
                        return Some(SessionEnd::Failed(self.feeder.on_sink_error(reason)));
                    }
                    Some(SinkEvent::UpdateEnd) => {
                        debug!("Ignoring completion signal before readiness");
                    }
                    Some(SinkEvent::SourceClosed) | None => return Some(SessionEnd::SinkClosed),
                },
            }
        }
    }

    /// Everything queued has been consumed by the sink.
    fn drained(&self) -> bool {
        self.feeder.queued() == 0 && self.feeder.in_flight().is_none()
    }

    async fn pump(&mut self, source: &mut C::Source) -> SessionEnd {
        let (idle_enabled, idle_timeout) = match self.config.idle_timeout() {
            Some(timeout) => (true, timeout),
            None => (false, Duration::ZERO),
        };
        let idle = tokio::time::sleep(idle_timeout);
        tokio::pin!(idle);

        // Set once the publisher has closed; queued segments still drain.
        let mut source_ended = false;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("Session stopped");
                    return SessionEnd::Stopped;
                }
                event = self.sink_events.recv() => match event {
                    Some(SinkEvent::UpdateEnd) => {
                        if let Err(e) = self.feeder.on_update_end() {
                            return SessionEnd::Failed(e);
                        }
                        if source_ended {
                            if self.drained() {
                                info!("Publisher ended the stream, all segments fed");
                                return SessionEnd::StreamEnded;
                            }
                            if idle_enabled {
                                idle.as_mut().reset(Instant::now() + idle_timeout);
                            }
                        }
                    }
                    Some(SinkEvent::Error { reason }) => {
                        return SessionEnd::Failed(self.feeder.on_sink_error(reason));
                    }
                    Some(SinkEvent::SourceOpen) => {
                        debug!("Ignoring repeated readiness signal");
                    }
                    Some(SinkEvent::SourceClosed) | None => {
                        info!("Sink closed");
                        return SessionEnd::SinkClosed;
                    }
                },
                frame = source.next_segment(), if !source_ended => match frame {
                    Ok(Some(data)) => {
                        if idle_enabled {
                            idle.as_mut().reset(Instant::now() + idle_timeout);
                        }
                        if let Err(e) = self.feeder.on_segment_arrived(data) {
                            return SessionEnd::Failed(e);
                        }
                    }
                    Ok(None) => {
                        if self.feeder.stats().segments_received == 0 {
                            warn!("Connection closed before any segment arrived");
                            return SessionEnd::Failed(FeederError::StreamUnavailable {
                                stream_id: self.config.stream_id.clone(),
                            });
                        }
                        source_ended = true;
                        if let Err(e) = source.close().await {
                            debug!(error = %e, "Error while closing connection");
                        }
                        if self.drained() {
                            info!("Publisher ended the stream");
                            return SessionEnd::StreamEnded;
                        }
                        info!(
                            queued = self.feeder.queued(),
                            "Publisher ended the stream, draining pending segments"
                        );
                        if idle_enabled {
                            idle.as_mut().reset(Instant::now() + idle_timeout);
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Connection failed");
                        return SessionEnd::Failed(e);
                    }
                },
                _ = &mut idle, if idle_enabled => {
                    warn!(timeout = ?idle_timeout, "Sink or publisher idle beyond timeout");
                    return SessionEnd::Failed(FeederError::IdleTimeout {
                        timeout: idle_timeout,
                    });
                }
            }
        }
    }
}

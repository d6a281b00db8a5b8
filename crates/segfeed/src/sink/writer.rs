//! A sink that appends segments to an async byte writer.
//!
//! Appending an fMP4 init segment followed by its media fragments yields a
//! playable file, or a stream that can be piped into a player.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::{MediaSink, SinkError, SinkEvent};
use crate::config::{DEFAULT_CONTAINER, MediaProfile};
use crate::segment::Segment;

pub struct WriterSink {
    updating: Arc<AtomicBool>,
    segment_tx: Option<mpsc::Sender<Segment>>,
    profile: Option<MediaProfile>,
    task: Option<JoinHandle<io::Result<u64>>>,
}

impl WriterSink {
    /// Spawn the writer task on the current runtime.
    ///
    /// [`SinkEvent::SourceOpen`] is queued on the returned channel immediately.
    pub fn spawn<W>(writer: W) -> (Self, mpsc::UnboundedReceiver<SinkEvent>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let updating = Arc::new(AtomicBool::new(false));
        let (segment_tx, segment_rx) = mpsc::channel(1);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let _ = event_tx.send(SinkEvent::SourceOpen);
        let task = tokio::spawn(write_loop(writer, segment_rx, updating.clone(), event_tx));

        let sink = Self {
            updating,
            segment_tx: Some(segment_tx),
            profile: None,
            task: Some(task),
        };
        (sink, event_rx)
    }

    pub fn profile(&self) -> Option<&MediaProfile> {
        self.profile.as_ref()
    }

    /// Take the writer task handle. It resolves with the number of bytes
    /// written once the sink is dropped or the stream has ended.
    pub fn take_task(&mut self) -> Option<JoinHandle<io::Result<u64>>> {
        self.task.take()
    }
}

impl MediaSink for WriterSink {
    fn is_updating(&self) -> bool {
        self.updating.load(Ordering::Acquire)
    }

    fn add_source_buffer(&mut self, profile: &MediaProfile) -> Result<(), SinkError> {
        if self.profile.is_some() {
            return Err(SinkError::AlreadyConfigured);
        }
        if !profile.container().eq_ignore_ascii_case(DEFAULT_CONTAINER) {
            return Err(SinkError::UnsupportedType {
                mime: profile.mime_type(),
            });
        }
        debug!(
            mime = %profile.mime_type(),
            mode = profile.mode().as_str(),
            "Source buffer declared"
        );
        self.profile = Some(profile.clone());
        Ok(())
    }

    fn append_buffer(&mut self, segment: Segment) -> Result<(), SinkError> {
        if self.profile.is_none() {
            return Err(SinkError::NotConfigured);
        }
        if self.is_updating() {
            return Err(SinkError::Busy);
        }
        let tx = self.segment_tx.as_ref().ok_or(SinkError::Closed)?;

        self.updating.store(true, Ordering::Release);
        if tx.try_send(segment).is_err() {
            self.updating.store(false, Ordering::Release);
            return Err(SinkError::Closed);
        }
        Ok(())
    }

    fn end_of_stream(&mut self) {
        // Dropping the sender lets the task finish its current write and exit.
        self.segment_tx.take();
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut segment_rx: mpsc::Receiver<Segment>,
    updating: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<SinkEvent>,
) -> io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written: u64 = 0;

    while let Some(segment) = segment_rx.recv().await {
        let sequence = segment.sequence();
        let result = async {
            writer.write_all(segment.data()).await?;
            writer.flush().await
        }
        .await;

        // Idle before the signal goes out so the feeder sees a consistent state.
        updating.store(false, Ordering::Release);

        match result {
            Ok(()) => {
                written += segment.len() as u64;
                trace!(sequence, len = segment.len(), written, "Segment written");
                let _ = events.send(SinkEvent::UpdateEnd);
            }
            Err(e) => {
                warn!(sequence, error = %e, "Failed to write segment");
                let _ = events.send(SinkEvent::Error {
                    reason: e.to_string(),
                });
                return Err(e);
            }
        }
    }

    writer.shutdown().await?;
    debug!(written, "Writer sink finished");
    Ok(written)
}

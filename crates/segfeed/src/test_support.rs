//! Test doubles shared by the unit tests.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::config::{MediaProfile, SessionConfig};
use crate::connection::{Connector, SegmentSource};
use crate::error::{FeederError, Result};
use crate::segment::Segment;
use crate::sink::{MediaSink, SinkError};

/// Calls observed by a [`RecordingSink`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    IsUpdating(bool),
    AddSourceBuffer(String),
    Append(u64),
    EndOfStream,
}

#[derive(Debug, Default)]
pub struct SinkState {
    pub busy: bool,
    pub calls: Vec<SinkCall>,
    pub appended: Vec<Segment>,
    pub reject_sequence: Option<u64>,
    pub reject_profile: bool,
}

/// Sink whose busy flag is driven by the test. Every append marks it busy;
/// the test calls [`RecordingSink::complete`] to mimic the end of an update.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    state: Rc<RefCell<SinkState>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Rc<RefCell<SinkState>> {
        self.state.clone()
    }
}

pub fn complete(state: &Rc<RefCell<SinkState>>) {
    state.borrow_mut().busy = false;
}

pub fn appended_sequences(state: &Rc<RefCell<SinkState>>) -> Vec<u64> {
    state
        .borrow()
        .appended
        .iter()
        .map(Segment::sequence)
        .collect()
}

impl MediaSink for RecordingSink {
    fn is_updating(&self) -> bool {
        let mut state = self.state.borrow_mut();
        let busy = state.busy;
        state.calls.push(SinkCall::IsUpdating(busy));
        busy
    }

    fn add_source_buffer(&mut self, profile: &MediaProfile) -> std::result::Result<(), SinkError> {
        let mut state = self.state.borrow_mut();
        state
            .calls
            .push(SinkCall::AddSourceBuffer(profile.mime_type()));
        if state.reject_profile {
            return Err(SinkError::UnsupportedType {
                mime: profile.mime_type(),
            });
        }
        Ok(())
    }

    fn append_buffer(&mut self, segment: Segment) -> std::result::Result<(), SinkError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(SinkCall::Append(segment.sequence()));
        if state.reject_sequence == Some(segment.sequence()) {
            return Err(SinkError::Other("malformed fragment".to_string()));
        }
        if state.busy {
            return Err(SinkError::Busy);
        }
        state.busy = true;
        state.appended.push(segment);
        Ok(())
    }

    fn end_of_stream(&mut self) {
        self.state.borrow_mut().calls.push(SinkCall::EndOfStream);
    }
}

/// Connector handing out a source fed by the test through a channel.
pub struct ScriptedConnector {
    frames: Mutex<Option<mpsc::Receiver<Result<Bytes>>>>,
    closed: Arc<AtomicBool>,
}

impl ScriptedConnector {
    pub fn channel() -> (mpsc::Sender<Result<Bytes>>, Self) {
        let (tx, rx) = mpsc::channel(16);
        let connector = Self {
            frames: Mutex::new(Some(rx)),
            closed: Arc::new(AtomicBool::new(false)),
        };
        (tx, connector)
    }

    /// A connector whose every attempt times out.
    pub fn failing() -> Self {
        Self {
            frames: Mutex::new(None),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set once the session closes the source.
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Source = ScriptedSource;

    async fn connect(&self, config: &SessionConfig) -> Result<ScriptedSource> {
        let frames = self.frames.lock().unwrap().take();
        match frames {
            Some(frames) => Ok(ScriptedSource {
                frames,
                closed: self.closed.clone(),
            }),
            None => Err(FeederError::ConnectTimeout {
                url: config.connection_uri()?.to_string(),
                timeout: config.connect_timeout(),
            }),
        }
    }
}

pub struct ScriptedSource {
    frames: mpsc::Receiver<Result<Bytes>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl SegmentSource for ScriptedSource {
    async fn next_segment(&mut self) -> Result<Option<Bytes>> {
        match self.frames.recv().await {
            Some(frame) => frame.map(Some),
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.frames.close();
        Ok(())
    }
}

//! FIFO of segments waiting for the sink.

use std::collections::VecDeque;

use crate::segment::Segment;

/// Arrival-ordered segment queue.
///
/// The queue enforces no bound of its own; the feeder decides whether a
/// high-water mark applies.
#[derive(Debug, Default)]
pub struct SegmentQueue {
    segments: VecDeque<Segment>,
    total_bytes: usize,
    peak_len: usize,
}

impl SegmentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail.
    pub fn enqueue(&mut self, segment: Segment) {
        self.total_bytes += segment.len();
        self.segments.push_back(segment);
        self.peak_len = self.peak_len.max(self.segments.len());
    }

    /// Remove the head, or `None` when empty. Never waits.
    pub fn dequeue(&mut self) -> Option<Segment> {
        let segment = self.segments.pop_front()?;
        self.total_bytes -= segment.len();
        Some(segment)
    }

    pub fn front(&self) -> Option<&Segment> {
        self.segments.front()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Bytes currently held.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Highest length reached since creation.
    pub fn peak_len(&self) -> usize {
        self.peak_len
    }

    /// Drop every pending segment, returning how many were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.segments.len();
        self.segments.clear();
        self.total_bytes = 0;
        discarded
    }
}

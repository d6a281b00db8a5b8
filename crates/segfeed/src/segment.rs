use bytes::Bytes;

/// One opaque fragment of a fragmented MP4 stream, as delivered by a single
/// transport message.
///
/// The payload is never inspected. The sequence number is the arrival index
/// within the session; the publisher always sends the initialization segment
/// first, so sequence `0` is the initialization segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    sequence: u64,
    data: Bytes,
}

impl Segment {
    pub fn new(sequence: u64, data: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            data: data.into(),
        }
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_initialization(&self) -> bool {
        self.sequence == 0
    }

    pub fn into_data(self) -> Bytes {
        self.data
    }
}

//! Fixed-capacity ring of audio slots shared by the reader worker and the
//! real-time consumer.
//!
//! A [`Slot`] is one period of already-decoded audio together with its state
//! tag and stream position. [`SlotBuffer::new`] allocates every slot up front
//! and splits the ring into a [`SlotWriter`] for the producer and a
//! [`SlotReader`] for the consumer. After that no operation allocates or
//! blocks: free and filled slots are pure index arithmetic.
//!
//! The write index is advanced only by the writer and the read index only by
//! the reader; each side merely observes the other's index. A slot belongs to
//! the writer until [`WriteRegion::commit`] and to the reader from then until
//! [`ReadRegion::commit`].

use std::fmt;

use rtrb::chunks::{ReadChunk, WriteChunk};
use rtrb::{Consumer, Producer, RingBuffer};

use crate::constants::SLOT_BYTES;
use crate::FrameCount;

/// What the consumer should do after playing a slot.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum SlotState {
    /// Output the payload and keep going.
    Playing,
    /// End of stream. The payload is silence.
    #[default]
    Stopped,
}

/// One period of interleaved samples plus metadata.
#[derive(Clone)]
pub struct Slot {
    /// Tag set by the writer.
    pub state: SlotState,
    /// Absolute frame position of the first frame in the payload.
    pub position: FrameCount,
    payload: [u8; SLOT_BYTES],
}

impl Slot {
    /// Raw sample bytes. Only the first `period_bytes` are meaningful.
    pub fn payload(&self) -> &[u8; SLOT_BYTES] {
        &self.payload
    }

    /// Mutable access for the writer.
    pub fn payload_mut(&mut self) -> &mut [u8; SLOT_BYTES] {
        &mut self.payload
    }
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            state: SlotState::default(),
            position: 0,
            payload: [0; SLOT_BYTES],
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("state", &self.state)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

/// Constructor for the two halves of a slot ring.
pub struct SlotBuffer;

impl SlotBuffer {
    /// Allocates `slot_count` slots and returns the producer and consumer
    /// halves.
    pub fn new(slot_count: usize) -> (SlotWriter, SlotReader) {
        let (producer, consumer) = RingBuffer::new(slot_count);
        (SlotWriter { producer }, SlotReader { consumer })
    }
}

/// Producer half of the ring, owned by the reader worker.
pub struct SlotWriter {
    producer: Producer<Slot>,
}

impl SlotWriter {
    /// Number of slots that can currently be written.
    pub fn write_available(&self) -> usize {
        self.producer.slots()
    }

    /// Total number of slots in the ring.
    pub fn capacity(&self) -> usize {
        self.producer.buffer().capacity()
    }

    /// Returns a contiguous region of up to `n` free slots.
    ///
    /// The region may be shorter than requested, an empty region means the
    /// ring is full and the caller should try again later. Nothing becomes
    /// visible to the reader until the region is committed.
    pub fn write_region(&mut self, n: usize) -> WriteRegion<'_> {
        let n = n.min(self.producer.slots());
        match self.producer.write_chunk(n) {
            Ok(mut chunk) => WriteRegion {
                contiguous: chunk.as_mut_slices().0.len(),
                chunk: Some(chunk),
            },
            Err(_) => WriteRegion {
                contiguous: 0,
                chunk: None,
            },
        }
    }
}

/// Writable slots borrowed from a [`SlotWriter`].
pub struct WriteRegion<'a> {
    chunk: Option<WriteChunk<'a, Slot>>,
    contiguous: usize,
}

impl WriteRegion<'_> {
    /// Number of contiguous slots in this region.
    pub fn len(&self) -> usize {
        self.contiguous
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The slots to fill.
    pub fn slots_mut(&mut self) -> &mut [Slot] {
        match self.chunk.as_mut() {
            Some(chunk) => chunk.as_mut_slices().0,
            None => &mut [],
        }
    }

    /// Hands the first `n` slots over to the reader.
    ///
    /// # Panics
    /// If `n` is larger than [`len`](WriteRegion::len).
    pub fn commit(self, n: usize) {
        assert!(n <= self.len(), "committed more slots than were written");
        if let Some(chunk) = self.chunk {
            chunk.commit(n);
        }
    }
}

/// Consumer half of the ring, owned by the real-time consumer.
pub struct SlotReader {
    consumer: Consumer<Slot>,
}

impl SlotReader {
    /// Number of committed slots that have not been read yet.
    pub fn read_available(&self) -> usize {
        self.consumer.slots()
    }

    /// Total number of slots in the ring.
    pub fn capacity(&self) -> usize {
        self.consumer.buffer().capacity()
    }

    /// Returns a contiguous region of up to `n` committed slots, possibly
    /// empty.
    pub fn read_region(&mut self, n: usize) -> ReadRegion<'_> {
        let n = n.min(self.consumer.slots());
        ReadRegion {
            chunk: self.consumer.read_chunk(n).ok(),
        }
    }

    /// Discards every readable slot and returns how many there were.
    ///
    /// Only meaningful while nothing is writing; a running writer may commit
    /// again right after.
    pub fn flush(&mut self) -> usize {
        let n = self.consumer.slots();
        if let Ok(chunk) = self.consumer.read_chunk(n) {
            chunk.commit_all();
        }
        n
    }
}

/// Readable slots borrowed from a [`SlotReader`].
pub struct ReadRegion<'a> {
    chunk: Option<ReadChunk<'a, Slot>>,
}

impl ReadRegion<'_> {
    /// Number of contiguous slots in this region.
    pub fn len(&self) -> usize {
        self.chunk.as_ref().map_or(0, |chunk| chunk.as_slices().0.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The committed slots.
    pub fn slots(&self) -> &[Slot] {
        match self.chunk.as_ref() {
            Some(chunk) => chunk.as_slices().0,
            None => &[],
        }
    }

    /// Releases the first `n` slots back to the writer.
    ///
    /// # Panics
    /// If `n` is larger than [`len`](ReadRegion::len).
    pub fn commit(self, n: usize) {
        assert!(n <= self.len(), "released more slots than were read");
        if let Some(chunk) = self.chunk {
            chunk.commit(n);
        }
    }
}

//! Elastic FIFO that decouples producers from the drain loop.
//!
//! Records live in a slot array between two cursors: `head` is the next
//! record to hand out and `tail` the next free slot, so `[head, tail)` is the
//! live window. Before every insert the array is compacted, grown or shrunk
//! depending on where the cursors sit relative to the compaction and growth
//! thresholds. All thresholds belong to the instance, so sinks never disturb
//! each other's sizing.

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Default (and minimum) number of slots.
pub const DEFAULT_MIN_CAPACITY: usize = 1024;

/// Default `head` position from which consumed slots are reclaimed.
pub const DEFAULT_COMPACT_THRESHOLD: usize = 100;

/// Default `tail` position at which the buffer grows.
pub const DEFAULT_GROWTH_THRESHOLD: usize = 800;

/// Default factor applied when growing or shrinking.
pub const DEFAULT_GROWTH_FACTOR: usize = 2;

/// Sizing parameters for a [`Buffer`].
///
/// The thresholds describe the smallest configuration; every growth step
/// multiplies all three by `growth_factor` and every shrink step divides them
/// again, so their ratios stay fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    /// Number of slots the buffer never shrinks below.
    pub min_capacity: usize,
    /// `head` position at which consumed slots are reclaimed.
    pub compact_threshold: usize,
    /// `tail` position at which capacity grows.
    pub growth_threshold: usize,
    /// Multiplier used for growing and divisor used for shrinking.
    pub growth_factor: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            min_capacity: DEFAULT_MIN_CAPACITY,
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
            growth_threshold: DEFAULT_GROWTH_THRESHOLD,
            growth_factor: DEFAULT_GROWTH_FACTOR,
        }
    }
}

impl BufferConfig {
    /// Check that the thresholds are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the growth factor is below 2, the
    /// thresholds are not ordered `0 < compact < growth <= min_capacity`, or the
    /// growth threshold is below half the minimum capacity (which would let a
    /// growth step be undone by the shrink rule on the same insert).
    pub fn validate(&self) -> Result<()> {
        if self.growth_factor < 2 {
            return Err(Error::Configuration(format!(
                "buffer growth factor must be at least 2, got {}",
                self.growth_factor
            )));
        }

        if self.compact_threshold == 0
            || self.compact_threshold >= self.growth_threshold
            || self.growth_threshold > self.min_capacity
        {
            return Err(Error::Configuration(format!(
                "buffer thresholds must satisfy 0 < compact ({}) < growth ({}) <= min capacity ({})",
                self.compact_threshold, self.growth_threshold, self.min_capacity
            )));
        }

        if self.growth_threshold.saturating_mul(2) < self.min_capacity {
            return Err(Error::Configuration(format!(
                "buffer growth threshold ({}) must be at least half the min capacity ({})",
                self.growth_threshold, self.min_capacity
            )));
        }

        Ok(())
    }
}

/// Mutex-protected elastic queue of owned byte records.
#[derive(Debug)]
pub struct Buffer {
    slots: Mutex<Slots>,
}

#[derive(Debug)]
struct Slots {
    data: Vec<Option<Bytes>>,
    head: usize,
    tail: usize,
    capacity: usize,
    compact_threshold: usize,
    growth_threshold: usize,
    min_capacity: usize,
    growth_factor: usize,
    closed: bool,
}

impl Buffer {
    /// Create an empty buffer sized by `config`.
    ///
    /// The config is expected to have passed [`BufferConfig::validate`].
    #[must_use]
    pub fn new(config: BufferConfig) -> Self {
        Self {
            slots: Mutex::new(Slots {
                data: vec![None; config.min_capacity],
                head: 0,
                tail: 0,
                capacity: config.min_capacity,
                compact_threshold: config.compact_threshold,
                growth_threshold: config.growth_threshold,
                min_capacity: config.min_capacity,
                growth_factor: config.growth_factor,
                closed: false,
            }),
        }
    }

    /// Copy `record` into the queue.
    ///
    /// Returns `false` only once the buffer has been closed, in which case the
    /// record is discarded.
    pub fn put(&self, record: &[u8]) -> bool {
        let record = Bytes::copy_from_slice(record);

        let mut slots = self.slots.lock();
        if slots.closed {
            return false;
        }

        slots.resize();
        let tail = slots.tail;
        slots.data[tail] = Some(record);
        slots.tail += 1;
        true
    }

    /// Take the oldest record, or `None` when the live window is empty.
    ///
    /// Finding the window empty rewinds both cursors to the start.
    pub fn get(&self) -> Option<Bytes> {
        let mut slots = self.slots.lock();

        if slots.head == slots.tail {
            slots.head = 0;
            slots.tail = 0;
            return None;
        }

        let head = slots.head;
        slots.head += 1;
        slots.data[head].take()
    }

    /// Refuse further records. Records already queued can still be taken.
    pub fn close(&self) {
        self.slots.lock().closed = true;
    }

    /// Whether [`Buffer::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.slots.lock().closed
    }

    /// Number of records waiting to be taken.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock();
        slots.tail - slots.head
    }

    /// Whether no records are waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current number of slots in the backing store.
    pub fn capacity(&self) -> usize {
        self.slots.lock().capacity
    }

    #[cfg(test)]
    fn cursors(&self) -> (usize, usize) {
        let slots = self.slots.lock();
        (slots.head, slots.tail)
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new(BufferConfig::default())
    }
}

impl Slots {
    fn resize(&mut self) {
        if self.head >= self.compact_threshold && self.tail >= self.growth_threshold {
            self.relocate();
        }

        if self.tail >= self.growth_threshold {
            self.capacity *= self.growth_factor;
            self.growth_threshold *= self.growth_factor;
            self.compact_threshold *= self.growth_factor;
            self.relocate();
        }

        if self.tail - self.head < self.capacity / (2 * self.growth_factor)
            && self.capacity > self.min_capacity
        {
            self.capacity /= self.growth_factor;
            self.growth_threshold /= self.growth_factor;
            self.compact_threshold /= self.growth_factor;
            self.relocate();
        }

        debug_assert!(self.head <= self.tail && self.tail < self.capacity);
    }

    /// Move the live window to the front of a fresh store of `capacity` slots.
    fn relocate(&mut self) {
        let mut data: Vec<Option<Bytes>> = Vec::with_capacity(self.capacity);
        data.extend(self.data.drain(self.head..self.tail));
        data.resize(self.capacity, None);

        self.tail -= self.head;
        self.head = 0;
        self.data = data;
    }
}

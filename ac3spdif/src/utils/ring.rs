//! Fixed-capacity ring of burst slots shared with the playback consumer.
//!
//! The producer fills the slot at its write index without touching the index
//! lock, then takes the lock only to advance the write index and wake the
//! consumer. The consumer mirrors this with the read index. Each slot has its
//! own lock, which is never contended because the producer never writes a
//! slot the consumer has not released.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::utils::clock::Mtime;
use crate::utils::errors::DeviceError;

/// One burst and its presentation date.
#[derive(Debug, Clone)]
pub struct BurstSlot {
    pub payload: Box<[u8]>,
    pub timestamp: Mtime,
}

#[derive(Debug)]
struct RingIndices {
    start: usize,
    end: usize,
    closed: bool,
}

#[derive(Debug)]
struct RingShared {
    slots: Box<[Mutex<BurstSlot>]>,
    indices: Mutex<RingIndices>,
    data_wait: Condvar,
    mask: usize,
    slot_size: usize,
    sample_rate: u32,
}

#[inline]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RingShared {
    fn indices(&self) -> MutexGuard<'_, RingIndices> {
        lock(&self.indices)
    }

    fn shutdown(&self) {
        let mut indices = self.indices();
        indices.closed = true;
        self.data_wait.notify_all();
    }
}

/// Result of waiting for a free slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    Free,
    Full,
    Closed,
}

/// Creates a ring of `capacity` slots of `slot_size` bytes.
///
/// `capacity` must be a power of two; one slot is kept empty to tell a full
/// ring from an empty one.
pub fn channel(
    capacity: usize,
    slot_size: usize,
    sample_rate: u32,
) -> Result<(RingProducer, RingConsumer), DeviceError> {
    if capacity < 2 || !capacity.is_power_of_two() {
        return Err(DeviceError::InvalidRingCapacity(capacity));
    }
    if slot_size == 0 || slot_size % 2 != 0 {
        return Err(DeviceError::InvalidSlotSize(slot_size));
    }

    let slots = (0..capacity)
        .map(|_| {
            Mutex::new(BurstSlot {
                payload: vec![0u8; slot_size].into_boxed_slice(),
                timestamp: 0,
            })
        })
        .collect::<Vec<_>>()
        .into_boxed_slice();

    let shared = Arc::new(RingShared {
        slots,
        indices: Mutex::new(RingIndices {
            start: 0,
            end: 0,
            closed: false,
        }),
        data_wait: Condvar::new(),
        mask: capacity - 1,
        slot_size,
        sample_rate,
    });

    Ok((
        RingProducer {
            shared: shared.clone(),
            write: 0,
        },
        RingConsumer { shared, read: 0 },
    ))
}

/// Writing side, owned by the session worker.
#[derive(Debug)]
pub struct RingProducer {
    shared: Arc<RingShared>,
    write: usize,
}

impl RingProducer {
    pub fn capacity(&self) -> usize {
        self.shared.mask + 1
    }

    pub fn slot_size(&self) -> usize {
        self.shared.slot_size
    }

    pub fn sample_rate(&self) -> u32 {
        self.shared.sample_rate
    }

    /// Index of the slot the next burst goes to.
    pub fn write_index(&self) -> usize {
        self.write
    }

    pub fn is_closed(&self) -> bool {
        self.shared.indices().closed
    }

    /// Number of published slots the consumer has not released yet.
    pub fn pending(&self) -> usize {
        let indices = self.shared.indices();
        indices.end.wrapping_sub(indices.start) & self.shared.mask
    }

    /// Waits up to `timeout` for the consumer to release a slot.
    pub fn wait_for_space(&self, timeout: Duration) -> Space {
        let mut indices = self.shared.indices();

        if !indices.closed && (indices.end + 1) & self.shared.mask == indices.start {
            indices = self
                .shared
                .data_wait
                .wait_timeout(indices, timeout)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }

        if indices.closed {
            Space::Closed
        } else if (indices.end + 1) & self.shared.mask == indices.start {
            Space::Full
        } else {
            Space::Free
        }
    }

    /// Fills the slot at the write index. The index lock is not taken.
    pub fn write_slot<F>(&mut self, timestamp: Mtime, fill: F)
    where
        F: FnOnce(&mut [u8]),
    {
        let mut slot = lock(&self.shared.slots[self.write]);
        slot.timestamp = timestamp;
        fill(&mut slot.payload);
    }

    /// Publishes the slot at the write index and wakes the consumer.
    pub fn advance(&mut self) -> usize {
        let next = (self.write + 1) & self.shared.mask;

        let mut indices = self.shared.indices();
        debug_assert_ne!(next, indices.start, "advancing into an unread slot");
        indices.end = next;
        self.shared.data_wait.notify_all();
        drop(indices);

        self.write = next;
        next
    }

    /// Marks the ring closed and wakes every waiter.
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }
}

/// Reading side, owned by the playback thread.
#[derive(Debug)]
pub struct RingConsumer {
    shared: Arc<RingShared>,
    read: usize,
}

impl RingConsumer {
    pub fn capacity(&self) -> usize {
        self.shared.mask + 1
    }

    pub fn slot_size(&self) -> usize {
        self.shared.slot_size
    }

    pub fn sample_rate(&self) -> u32 {
        self.shared.sample_rate
    }

    pub fn read_index(&self) -> usize {
        self.read
    }

    /// Waits for the next published burst and copies it into `dest`.
    ///
    /// Slots published before shutdown are still delivered; `None` means the
    /// ring is closed and drained.
    pub fn recv(&mut self, dest: &mut [u8]) -> Option<Mtime> {
        {
            let mut indices = self.shared.indices();
            while indices.start == indices.end && !indices.closed {
                indices = self
                    .shared
                    .data_wait
                    .wait(indices)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            if indices.start == indices.end {
                return None;
            }
        }

        Some(self.release(dest))
    }

    /// Like [`recv`](Self::recv) but never waits.
    pub fn try_recv(&mut self, dest: &mut [u8]) -> Option<Mtime> {
        {
            let indices = self.shared.indices();
            if indices.start == indices.end {
                return None;
            }
        }

        Some(self.release(dest))
    }

    fn release(&mut self, dest: &mut [u8]) -> Mtime {
        let timestamp = {
            let slot = lock(&self.shared.slots[self.read]);
            let len = dest.len().min(slot.payload.len());
            dest[..len].copy_from_slice(&slot.payload[..len]);
            slot.timestamp
        };

        let next = (self.read + 1) & self.shared.mask;
        let mut indices = self.shared.indices();
        indices.start = next;
        self.shared.data_wait.notify_all();
        drop(indices);

        self.read = next;
        timestamp
    }

    pub fn is_closed(&self) -> bool {
        self.shared.indices().closed
    }

    /// Closes the ring from the playback side, releasing a waiting producer.
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }
}

//! Lock-free single-producer/single-consumer ring of fixed-width event slots.
//!
//! Head is written only by the producer. Tail is normally advanced by the
//! consumer, but a drop-oldest producer may also advance it to make room, so
//! the consumer commits every pop with a compare-and-swap and retries when the
//! producer got there first. Slot bytes are atomics: a slot overwritten while
//! it was being copied is never handed out because the tail CAS fails.
//!
//! Head and tail are free-running counters and a slot is `index % SLOTS`, so
//! a displaced tail never returns to a value the consumer may still hold.

use std::sync::atomic::{fence, AtomicU8, AtomicUsize, Ordering};

use thiserror::Error;

use crate::config::MAX_EVENT_SIZE;
use crate::events::EventFrame;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("ring buffer full")]
pub struct RingFull;

/// Cache-line aligned index so head and tail never share a line.
#[repr(align(64))]
struct AlignedIndex(AtomicUsize);

impl AlignedIndex {
    const fn new() -> Self {
        Self(AtomicUsize::new(0))
    }
}

struct Slot {
    len: AtomicU8,
    bytes: [AtomicU8; MAX_EVENT_SIZE],
}

impl Slot {
    const fn new() -> Self {
        Self {
            len: AtomicU8::new(0),
            bytes: [const { AtomicU8::new(0) }; MAX_EVENT_SIZE],
        }
    }

    fn write(&self, data: &[u8]) {
        for (cell, byte) in self.bytes.iter().zip(data) {
            cell.store(*byte, Ordering::Relaxed);
        }
        self.len.store(data.len() as u8, Ordering::Relaxed);
    }

    fn read(&self) -> EventFrame {
        let mut bytes = [0u8; MAX_EVENT_SIZE];
        for (out, cell) in bytes.iter_mut().zip(&self.bytes) {
            *out = cell.load(Ordering::Relaxed);
        }
        EventFrame::from_parts(bytes, self.len.load(Ordering::Relaxed) as usize)
    }

    fn clear(&mut self) {
        *self.len.get_mut() = 0;
        for cell in &mut self.bytes {
            *cell.get_mut() = 0;
        }
    }
}

/// Circular buffer of `SLOTS` slots holding at most `SLOTS - 1` events.
pub struct RingQueue<const SLOTS: usize> {
    slots: [Slot; SLOTS],
    head: AlignedIndex,
    tail: AlignedIndex,
}

impl<const SLOTS: usize> RingQueue<SLOTS> {
    const VALID: () = assert!(SLOTS >= 2, "a ring needs at least two slots");

    /// Events the ring can hold at once.
    pub const CAPACITY: usize = SLOTS - 1;

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID;
        Self {
            slots: [const { Slot::new() }; SLOTS],
            head: AlignedIndex::new(),
            tail: AlignedIndex::new(),
        }
    }

    #[inline]
    const fn slot(index: usize) -> usize {
        index % SLOTS
    }

    /// Appends `data`, or reports the ring as full. Producer side only.
    #[inline]
    pub fn try_push(&self, data: &[u8]) -> Result<(), RingFull> {
        debug_assert!(data.len() <= MAX_EVENT_SIZE);
        let head = self.head.0.load(Ordering::Relaxed);
        let tail = self.tail.0.load(Ordering::Acquire);

        if head.wrapping_sub(tail) >= Self::CAPACITY {
            return Err(RingFull);
        }

        self.slots[Self::slot(head)].write(data);
        self.head.0.store(head.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Appends `data`, discarding the oldest entry when the ring is full.
    ///
    /// Returns `true` if an entry was displaced. Producer side only.
    pub fn force_push(&self, data: &[u8]) -> bool {
        debug_assert!(data.len() <= MAX_EVENT_SIZE);
        let head = self.head.0.load(Ordering::Relaxed);
        let tail = self.tail.0.load(Ordering::Acquire);

        // A failed CAS means the consumer freed a slot in the meantime.
        let displaced = head.wrapping_sub(tail) >= Self::CAPACITY
            && self
                .tail
                .0
                .compare_exchange(
                    tail,
                    tail.wrapping_add(1),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok();

        self.slots[Self::slot(head)].write(data);
        self.head.0.store(head.wrapping_add(1), Ordering::Release);
        displaced
    }

    /// Removes the oldest entry. Consumer side only.
    #[inline]
    pub fn try_pop(&self) -> Option<EventFrame> {
        let mut tail = self.tail.0.load(Ordering::Acquire);
        loop {
            if tail == self.head.0.load(Ordering::Acquire) {
                return None;
            }

            let frame = self.slots[Self::slot(tail)].read();
            fence(Ordering::Acquire);

            match self.tail.0.compare_exchange(
                tail,
                tail.wrapping_add(1),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(frame),
                Err(moved) => tail = moved,
            }
        }
    }

    pub fn len(&self) -> usize {
        let tail = self.tail.0.load(Ordering::Acquire);
        let head = self.head.0.load(Ordering::Acquire);
        head.wrapping_sub(tail).min(Self::CAPACITY)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == Self::CAPACITY
    }

    /// Empties the ring and zeroes every slot.
    pub fn reset(&mut self) {
        *self.head.0.get_mut() = 0;
        *self.tail.0.get_mut() = 0;
        for slot in &mut self.slots {
            slot.clear();
        }
    }
}

impl<const SLOTS: usize> Default for RingQueue<SLOTS> {
    fn default() -> Self {
        Self::new()
    }
}

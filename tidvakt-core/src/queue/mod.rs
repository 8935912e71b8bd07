//! ## tidvakt-core::queue
//! **One bounded ring per priority level, with a per-level overflow policy**
//!
//! Level 0 is the most urgent. Each level keeps its own dropped-event
//! counter. A push into a full level is resolved by that level's
//! [`OverflowPolicy`]; the `Panic` policy escalates to the platform's
//! [`FaultHandler`] instead of queueing.

pub mod ring;

pub use ring::{RingFull, RingQueue};

use std::sync::atomic::{AtomicU32, Ordering};

use tracing::warn;

use crate::config::{OverflowPolicy, EVENT_PRIORITIES, EVENT_QUEUE_SIZE, MAX_EVENT_SIZE};
use crate::error::QueueError;
use crate::events::EventFrame;
use crate::port::{Fault, FaultHandler};

/// Point-in-time view of every level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueStats<const LEVELS: usize> {
    pub depths: [usize; LEVELS],
    pub dropped: [u32; LEVELS],
}

impl<const LEVELS: usize> QueueStats<LEVELS> {
    pub fn total_depth(&self) -> usize {
        self.depths.iter().sum()
    }

    pub fn total_dropped(&self) -> u64 {
        self.dropped.iter().map(|&n| u64::from(n)).sum()
    }
}

pub struct PriorityQueues<
    'a,
    const LEVELS: usize = EVENT_PRIORITIES,
    const SLOTS: usize = EVENT_QUEUE_SIZE,
> {
    rings: [RingQueue<SLOTS>; LEVELS],
    policies: [OverflowPolicy; LEVELS],
    dropped: [AtomicU32; LEVELS],
    faults: &'a dyn FaultHandler,
}

impl<'a, const LEVELS: usize, const SLOTS: usize> PriorityQueues<'a, LEVELS, SLOTS> {
    pub fn new(policies: [OverflowPolicy; LEVELS], faults: &'a dyn FaultHandler) -> Self {
        Self {
            rings: std::array::from_fn(|_| RingQueue::new()),
            policies,
            dropped: std::array::from_fn(|_| AtomicU32::new(0)),
            faults,
        }
    }

    /// Events a single level can hold.
    pub const fn capacity(&self) -> usize {
        RingQueue::<SLOTS>::CAPACITY
    }

    pub const fn levels(&self) -> usize {
        LEVELS
    }

    /// Copies `bytes` into the ring for `level`.
    ///
    /// Only one producer may push into a given level at a time.
    pub fn push(&self, level: usize, bytes: &[u8]) -> Result<(), QueueError> {
        let ring = self.rings.get(level).ok_or(QueueError::InvalidLevel {
            level,
            levels: LEVELS,
        })?;
        if bytes.is_empty() {
            return Err(QueueError::EmptyPayload);
        }
        if bytes.len() > MAX_EVENT_SIZE {
            return Err(QueueError::OversizedPayload {
                len: bytes.len(),
                max: MAX_EVENT_SIZE,
            });
        }

        match ring.try_push(bytes) {
            Ok(()) => Ok(()),
            Err(RingFull) => self.overflow(level, ring, bytes),
        }
    }

    fn overflow(
        &self,
        level: usize,
        ring: &RingQueue<SLOTS>,
        bytes: &[u8],
    ) -> Result<(), QueueError> {
        match self.policies[level] {
            OverflowPolicy::DropOldest => {
                if ring.force_push(bytes) {
                    self.record_drop(level, "oldest");
                }
                Ok(())
            }
            OverflowPolicy::DropNewest => {
                self.record_drop(level, "newest");
                Err(QueueError::QueueFull { level })
            }
            OverflowPolicy::Panic => {
                let fault = Fault::QueueOverflow { level };
                self.faults.on_fault(&fault);
                self.faults.enter_safe_state(&fault);
                Err(QueueError::Overrun { level })
            }
        }
    }

    fn record_drop(&self, level: usize, which: &'static str) {
        let dropped = self.dropped[level].fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        warn!(level, dropped, which, "event queue full, dropping event");
    }

    /// Removes the oldest event of `level`. Consumer side only.
    pub fn pop(&self, level: usize) -> Option<EventFrame> {
        self.rings.get(level)?.try_pop()
    }

    /// Queued events on `level`; zero for a level that does not exist.
    pub fn depth(&self, level: usize) -> usize {
        self.rings.get(level).map_or(0, RingQueue::len)
    }

    pub fn dropped(&self, level: usize) -> u32 {
        self.dropped
            .get(level)
            .map_or(0, |count| count.load(Ordering::Relaxed))
    }

    pub fn policy(&self, level: usize) -> Option<OverflowPolicy> {
        self.policies.get(level).copied()
    }

    pub fn stats(&self) -> QueueStats<LEVELS> {
        QueueStats {
            depths: std::array::from_fn(|level| self.depth(level)),
            dropped: std::array::from_fn(|level| self.dropped(level)),
        }
    }

    /// Empties every level and clears the drop counters.
    pub fn reset(&mut self) {
        for ring in &mut self.rings {
            ring.reset();
        }
        for count in &mut self.dropped {
            *count.get_mut() = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::RecordingFaultHandler;
    use tracing_test::traced_test;

    fn event(seq: u8) -> [u8; 8] {
        [1, 1, 8, 0, seq, 0, 0, 0]
    }

    fn drain(queues: &PriorityQueues<'_, 1, 5>) -> Vec<u8> {
        std::iter::from_fn(|| queues.pop(0))
            .map(|frame| frame.as_bytes()[4])
            .collect()
    }

    #[test]
    fn drop_oldest_keeps_newest_events() {
        let faults = RecordingFaultHandler::new();
        let queues = PriorityQueues::<1, 5>::new([OverflowPolicy::DropOldest], &faults);
        assert_eq!(queues.capacity(), 4);

        for seq in 1..=5 {
            queues.push(0, &event(seq)).unwrap();
        }
        assert_eq!(queues.dropped(0), 1);
        assert_eq!(drain(&queues), vec![2, 3, 4, 5]);
        assert!(faults.faults().is_empty());
    }

    #[test]
    fn drop_newest_rejects_incoming_event() {
        let faults = RecordingFaultHandler::new();
        let queues = PriorityQueues::<1, 5>::new([OverflowPolicy::DropNewest], &faults);

        for seq in 1..=4 {
            queues.push(0, &event(seq)).unwrap();
        }
        assert_eq!(
            queues.push(0, &event(5)),
            Err(QueueError::QueueFull { level: 0 })
        );
        assert_eq!(queues.dropped(0), 1);
        assert_eq!(drain(&queues), vec![1, 2, 3, 4]);
    }

    #[test]
    fn panic_policy_escalates_without_inserting() {
        let faults = RecordingFaultHandler::new();
        let queues = PriorityQueues::<1, 5>::new([OverflowPolicy::Panic], &faults);

        for seq in 1..=4 {
            queues.push(0, &event(seq)).unwrap();
        }
        assert_eq!(
            queues.push(0, &event(5)),
            Err(QueueError::Overrun { level: 0 })
        );
        assert_eq!(faults.faults(), vec![Fault::QueueOverflow { level: 0 }]);
        assert_eq!(faults.safe_state_requests(), 1);
        assert_eq!(queues.dropped(0), 0);
        assert_eq!(drain(&queues), vec![1, 2, 3, 4]);
    }

    #[test]
    fn rejects_bad_input() {
        let faults = RecordingFaultHandler::new();
        let queues = PriorityQueues::<2, 4>::new([OverflowPolicy::DropOldest; 2], &faults);

        assert_eq!(
            queues.push(2, &event(1)),
            Err(QueueError::InvalidLevel { level: 2, levels: 2 })
        );
        assert_eq!(queues.push(0, &[]), Err(QueueError::EmptyPayload));
        assert_eq!(
            queues.push(0, &[0; MAX_EVENT_SIZE + 1]),
            Err(QueueError::OversizedPayload {
                len: MAX_EVENT_SIZE + 1,
                max: MAX_EVENT_SIZE
            })
        );
        assert_eq!(queues.depth(0), 0);
        assert_eq!(queues.depth(9), 0);
        assert!(queues.pop(9).is_none());
    }

    #[test]
    fn levels_are_independent() {
        let faults = RecordingFaultHandler::new();
        let queues = PriorityQueues::<3, 4>::new([OverflowPolicy::DropNewest; 3], &faults);

        queues.push(2, &event(1)).unwrap();
        queues.push(0, &event(2)).unwrap();
        queues.push(0, &event(3)).unwrap();

        let stats = queues.stats();
        assert_eq!(stats.depths, [2, 0, 1]);
        assert_eq!(stats.total_depth(), 3);
        assert_eq!(queues.pop(2).map(|f| f.as_bytes()[4]), Some(1));
        assert_eq!(queues.pop(0).map(|f| f.as_bytes()[4]), Some(2));
    }

    #[test]
    fn reset_clears_depth_and_counters() {
        let faults = RecordingFaultHandler::new();
        let mut queues = PriorityQueues::<1, 5>::new([OverflowPolicy::DropOldest], &faults);
        for seq in 0..10 {
            queues.push(0, &event(seq)).unwrap();
        }
        assert_eq!(queues.dropped(0), 6);

        queues.reset();
        assert_eq!(
            queues.stats(),
            QueueStats {
                depths: [0],
                dropped: [0]
            }
        );
    }

    #[traced_test]
    #[test]
    fn drops_are_logged() {
        let faults = RecordingFaultHandler::new();
        let queues = PriorityQueues::<1, 2>::new([OverflowPolicy::DropNewest], &faults);
        queues.push(0, &event(1)).unwrap();
        let _ = queues.push(0, &event(2));
        assert!(logs_contain("event queue full, dropping event"));
    }
}

//! ## tidvakt-core::bus
//! **Priority-queued publish/subscribe with a per-cycle deadline monitor**
//!
//! Producers publish encoded events; the bus stamps them, runs the filter
//! engine and queues them by priority. The application calls
//! [`EventBus::process`] once per cycle to drain the queues and fan each event
//! out to the subscribers registered for its id.
//!
//! ### Scheduling
//! Levels are drained from 0 (most urgent) upward. Each level dispatches at
//! most its `max_events_per_cycle` events per call, so a flooded urgent level
//! cannot starve the others.
//!
//! ### Contexts
//! Publishing needs only `&self` and may run from another thread through a
//! [`Publisher`] (one producer per level). Subscribing, loading filter rules
//! and [`EventBus::init`] need `&mut self` and therefore never overlap
//! processing.

use std::cell::Cell;
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::debug;

use crate::config::{
    BusSettings, DeadlineAction, EVENT_PRIORITIES, EVENT_QUEUE_SIZE, MAX_EVENT_TYPES,
    MAX_SUBSCRIBERS,
};
use crate::error::BusError;
use crate::events::{BusEvent, EventFrame, Priority};
use crate::filter::FilterEngine;
use crate::port::{Clock, Fault, FaultHandler};
use crate::queue::{PriorityQueues, QueueStats};

/// Receives dispatched events.
///
/// Callbacks run synchronously inside [`EventBus::process`] and may publish
/// follow-up events through `bus`.
pub trait Subscriber {
    fn on_event(&self, frame: &EventFrame, bus: &dyn Publish);
}

impl<F> Subscriber for F
where
    F: Fn(&EventFrame, &dyn Publish),
{
    fn on_event(&self, frame: &EventFrame, bus: &dyn Publish) {
        self(frame, bus)
    }
}

/// Admission side of the bus.
pub trait Publish {
    /// Validates, stamps, filters and queues an already encoded frame.
    fn publish_frame(&self, frame: EventFrame) -> Result<Admission, BusError>;
}

impl dyn Publish + '_ {
    pub fn publish<E: BusEvent>(&self, event: &E, priority: Priority) -> Result<Admission, BusError> {
        self.publish_frame(EventFrame::encode(event, priority))
    }

    pub fn publish_raw(&self, bytes: &[u8]) -> Result<Admission, BusError> {
        self.publish_frame(EventFrame::from_bytes(bytes)?)
    }
}

/// What happened to a successfully published event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Queued,
    /// Rejected by a filter rule. Nothing was queued.
    Filtered,
}

/// Result of one [`EventBus::process`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleReport<const LEVELS: usize> {
    /// Events dispatched per level.
    pub dispatched: [usize; LEVELS],
    pub elapsed_ms: u32,
    pub overrun: bool,
}

impl<const LEVELS: usize> CycleReport<LEVELS> {
    pub fn total_dispatched(&self) -> usize {
        self.dispatched.iter().sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusStats<const LEVELS: usize> {
    pub queues: QueueStats<LEVELS>,
    pub cycles: u32,
    pub overruns: u32,
    pub published: u32,
    pub filtered: u32,
}

/// Everything a producer touches: queues, filter, settings and the clock.
struct Intake<'a, const LEVELS: usize, const SLOTS: usize> {
    queues: PriorityQueues<'a, LEVELS, SLOTS>,
    filter: FilterEngine,
    settings: BusSettings<LEVELS>,
    clock: &'a dyn Clock,
    published: AtomicU32,
    filtered: AtomicU32,
}

impl<const LEVELS: usize, const SLOTS: usize> Intake<'_, LEVELS, SLOTS> {
    fn level_for(&self, frame: &EventFrame) -> Result<usize, BusError> {
        let id = frame.id();
        if id as usize >= MAX_EVENT_TYPES {
            return Err(BusError::InvalidEventId(id));
        }
        if !self.settings.priority_enabled {
            return Ok(0);
        }
        let priority = frame.priority();
        if priority as usize >= LEVELS {
            return Err(BusError::InvalidPriority(priority));
        }
        Ok(priority as usize)
    }
}

impl<const LEVELS: usize, const SLOTS: usize> Publish for Intake<'_, LEVELS, SLOTS> {
    fn publish_frame(&self, mut frame: EventFrame) -> Result<Admission, BusError> {
        let level = self.level_for(&frame)?;
        frame.stamp(self.clock.now_ms());

        if self.settings.filters_enabled && !self.filter.check(&frame.header()) {
            self.filtered.fetch_add(1, Ordering::Relaxed);
            debug!(id = frame.id(), priority = frame.priority(), "event filtered");
            return Ok(Admission::Filtered);
        }

        self.queues.push(level, frame.as_bytes())?;
        self.published.fetch_add(1, Ordering::Relaxed);
        Ok(Admission::Queued)
    }
}

/// Publishing handle for a producer running outside the processing loop.
///
/// Borrows only the admission side of the bus, so it can be moved into a
/// scoped thread while the owner keeps calling [`EventBus::process`].
#[derive(Clone, Copy)]
pub struct Publisher<'b, 'a, const LEVELS: usize, const SLOTS: usize> {
    intake: &'b Intake<'a, LEVELS, SLOTS>,
}

impl<const LEVELS: usize, const SLOTS: usize> Publisher<'_, '_, LEVELS, SLOTS> {
    pub fn publish<E: BusEvent>(&self, event: &E, priority: Priority) -> Result<Admission, BusError> {
        self.intake.publish_frame(EventFrame::encode(event, priority))
    }

    pub fn publish_raw(&self, bytes: &[u8]) -> Result<Admission, BusError> {
        self.intake.publish_frame(EventFrame::from_bytes(bytes)?)
    }
}

impl<const LEVELS: usize, const SLOTS: usize> Publish for Publisher<'_, '_, LEVELS, SLOTS> {
    fn publish_frame(&self, frame: EventFrame) -> Result<Admission, BusError> {
        self.intake.publish_frame(frame)
    }
}

#[derive(Clone, Copy)]
struct Subscription<'a> {
    event_id: u8,
    subscriber: &'a dyn Subscriber,
}

pub struct EventBus<'a, const LEVELS: usize = EVENT_PRIORITIES, const SLOTS: usize = EVENT_QUEUE_SIZE>
{
    intake: Intake<'a, LEVELS, SLOTS>,
    subscribers: [Option<Subscription<'a>>; MAX_SUBSCRIBERS],
    faults: &'a dyn FaultHandler,
    cycles: Cell<u32>,
    overruns: Cell<u32>,
}

impl<'a, const LEVELS: usize, const SLOTS: usize> EventBus<'a, LEVELS, SLOTS> {
    pub fn new(
        settings: BusSettings<LEVELS>,
        clock: &'a dyn Clock,
        faults: &'a dyn FaultHandler,
    ) -> Self {
        let policies = settings.levels.map(|level| level.overflow);
        Self {
            intake: Intake {
                queues: PriorityQueues::new(policies, faults),
                filter: FilterEngine::new(),
                settings,
                clock,
                published: AtomicU32::new(0),
                filtered: AtomicU32::new(0),
            },
            subscribers: [None; MAX_SUBSCRIBERS],
            faults,
            cycles: Cell::new(0),
            overruns: Cell::new(0),
        }
    }

    /// Drops every subscriber, queued event and filter rule, and zeroes the counters.
    pub fn init(&mut self) {
        self.subscribers = [None; MAX_SUBSCRIBERS];
        self.intake.queues.reset();
        self.intake.filter.init();
        *self.intake.published.get_mut() = 0;
        *self.intake.filtered.get_mut() = 0;
        self.cycles.set(0);
        self.overruns.set(0);
    }

    /// Registers `subscriber` for events with `event_id`.
    ///
    /// The same subscriber may be registered for several ids, or several
    /// times for one id, in which case it is called once per registration.
    pub fn subscribe(
        &mut self,
        event_id: u8,
        subscriber: &'a dyn Subscriber,
    ) -> Result<(), BusError> {
        if event_id as usize >= MAX_EVENT_TYPES {
            return Err(BusError::InvalidEventId(event_id));
        }
        let slot = self
            .subscribers
            .iter_mut()
            .find(|slot| slot.is_none())
            .ok_or(BusError::SubscriberTableFull {
                capacity: MAX_SUBSCRIBERS,
            })?;
        *slot = Some(Subscription {
            event_id,
            subscriber,
        });
        Ok(())
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.iter().flatten().count()
    }

    pub fn publish<E: BusEvent>(&self, event: &E, priority: Priority) -> Result<Admission, BusError> {
        self.intake.publish_frame(EventFrame::encode(event, priority))
    }

    /// Publishes an already encoded event.
    ///
    /// The header's size and timestamp are overwritten by the bus.
    pub fn publish_raw(&self, bytes: &[u8]) -> Result<Admission, BusError> {
        self.intake.publish_frame(EventFrame::from_bytes(bytes)?)
    }

    pub fn publisher(&self) -> Publisher<'_, 'a, LEVELS, SLOTS> {
        Publisher {
            intake: &self.intake,
        }
    }

    /// Runs one processing cycle.
    pub fn process(&self) -> CycleReport<LEVELS> {
        let started = self.intake.clock.now_ms();
        let mut dispatched = [0usize; LEVELS];

        for (level, count) in dispatched.iter_mut().enumerate() {
            let budget = self.intake.settings.levels[level].max_events_per_cycle;
            while *count < budget {
                let Some(frame) = self.intake.queues.pop(level) else {
                    break;
                };
                self.dispatch(&frame);
                *count += 1;
            }
        }

        let elapsed_ms = self.intake.clock.now_ms().wrapping_sub(started);
        let budget_ms = self.intake.settings.max_process_time_ms;
        let overrun = elapsed_ms > budget_ms;
        if overrun {
            self.overruns.set(self.overruns.get().wrapping_add(1));
            let fault = Fault::DeadlineOverrun {
                elapsed_ms,
                budget_ms,
            };
            self.faults.on_fault(&fault);
            if self.intake.settings.deadline_action == DeadlineAction::Halt {
                self.faults.enter_safe_state(&fault);
            }
        }
        self.cycles.set(self.cycles.get().wrapping_add(1));

        CycleReport {
            dispatched,
            elapsed_ms,
            overrun,
        }
    }

    fn dispatch(&self, frame: &EventFrame) {
        let id = frame.id();
        for subscription in self
            .subscribers
            .iter()
            .flatten()
            .filter(|subscription| subscription.event_id == id)
        {
            subscription.subscriber.on_event(frame, &self.intake);
        }
    }

    pub fn queue_depth(&self, level: usize) -> usize {
        self.intake.queues.depth(level)
    }

    pub fn stats(&self) -> BusStats<LEVELS> {
        BusStats {
            queues: self.intake.queues.stats(),
            cycles: self.cycles.get(),
            overruns: self.overruns.get(),
            published: self.intake.published.load(Ordering::Relaxed),
            filtered: self.intake.filtered.load(Ordering::Relaxed),
        }
    }

    pub fn settings(&self) -> &BusSettings<LEVELS> {
        &self.intake.settings
    }

    pub fn filter(&self) -> &FilterEngine {
        &self.intake.filter
    }

    pub fn filter_mut(&mut self) -> &mut FilterEngine {
        &mut self.intake.filter
    }
}

//! # tidvakt-core
//!
//! Deterministic event-processing core for control software running with a
//! fixed memory budget and a bounded processing time per cycle.
//!
//! ### Expectations:
//! - No heap allocation after construction; every table and queue is sized at compile time
//! - Lock-free producer/consumer hand-off between an interrupt-like producer and the main loop
//! - Strict priority ordering across levels, bounded by per-level anti-starvation caps
//!
//! ### Key Submodules:
//! - `events`: Event header, typed bus events and state-machine events
//! - `filter`: Ordered admission rules evaluated on publish
//! - `queue`: Per-priority SPSC rings with configurable overflow policies
//! - `bus`: Publish/subscribe with cycle processing and a deadline monitor
//! - `hsm`: Hierarchical state machine dispatcher
//! - `port`: Clock and fault-handler collaborators supplied by the platform

#![deny(unsafe_code)]

pub mod bus;
pub mod config;
pub mod error;
pub mod events;
pub mod filter;
pub mod hsm;
pub mod port;
pub mod queue;

pub mod prelude {
    pub use crate::bus::{Admission, BusStats, CycleReport, EventBus, Publish, Publisher, Subscriber};
    pub use crate::config::{BusSettings, DeadlineAction, LevelPolicy, OverflowPolicy};
    pub use crate::error::*;
    pub use crate::events::*;
    pub use crate::filter::{FilterEngine, FilterRule, RuleKind};
    pub use crate::hsm::{DispatchOutcome, MachineSubscriber, Outcome, State, StateMachine, StateRef};
    pub use crate::port::*;
}

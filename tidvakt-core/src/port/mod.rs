//! ## tidvakt-core::port
//! **Platform collaborators injected into the bus and state machines**
//!
//! The core never reads a hardware timer or halts the CPU itself. It asks a
//! [`Clock`] for ticks and hands fatal conditions to a [`FaultHandler`].

pub mod clock;
pub mod fault;

pub use clock::{Clock, SystemClock, VirtualClock};
pub use fault::{Fault, FaultHandler, RecordingFaultHandler, TracingFaultHandler};

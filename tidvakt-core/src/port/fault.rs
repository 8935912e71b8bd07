//! ## tidvakt-core::port::fault
//! **Fatal-condition reporting and the safe-state request**

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::error;

use crate::error::{ErrorKind, HsmError};

/// A structural violation detected by the core.
///
/// Faults are never returned as ordinary errors to the producer that
/// triggered them. They go to the platform's [`FaultHandler`] and the
/// detecting call returns early.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("state machine depth {depth} exceeds the maximum of {max}")]
    DepthExceeded { depth: usize, max: usize },

    #[error("no state installed at active depth {depth}")]
    NullHandler { depth: usize },

    #[error("transition requested without a target state")]
    NullTransition,

    #[error("event queue overflow on level {level}")]
    QueueOverflow { level: usize },

    #[error("event processing took {elapsed_ms} ms (budget {budget_ms} ms)")]
    DeadlineOverrun { elapsed_ms: u32, budget_ms: u32 },
}

impl Fault {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DepthExceeded { .. } | Self::NullHandler { .. } | Self::NullTransition => {
                ErrorKind::ProtocolViolation
            }
            Self::QueueOverflow { .. } | Self::DeadlineOverrun { .. } => ErrorKind::Overrun,
        }
    }
}

impl From<HsmError> for Fault {
    fn from(err: HsmError) -> Self {
        match err {
            HsmError::DepthExceeded { depth, max } => Self::DepthExceeded { depth, max },
            HsmError::NullHandler { depth } => Self::NullHandler { depth },
            HsmError::NullTransition => Self::NullTransition,
        }
    }
}

/// Platform hook for fatal conditions.
///
/// `on_fault` is called for every fault. `enter_safe_state` follows it when
/// the fault is unrecoverable (panic overflow policy, halting deadline
/// action). Implementations on a target typically never return from
/// `enter_safe_state`; test doubles record the request instead.
pub trait FaultHandler: Send + Sync {
    fn on_fault(&self, fault: &Fault);

    fn enter_safe_state(&self, fault: &Fault);
}

/// Logs faults through `tracing` and latches a halted flag on safe-state requests.
#[derive(Debug, Default)]
pub struct TracingFaultHandler {
    halted: AtomicBool,
}

impl TracingFaultHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a safe-state request has been received. The main loop should stop.
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }
}

impl FaultHandler for TracingFaultHandler {
    fn on_fault(&self, fault: &Fault) {
        error!(kind = ?fault.kind(), "{fault}");
    }

    fn enter_safe_state(&self, fault: &Fault) {
        error!(%fault, "entering safe state");
        self.halted.store(true, Ordering::Release);
    }
}

/// Stores every fault it receives; for harnesses that assert on fault paths.
#[derive(Debug, Default)]
pub struct RecordingFaultHandler {
    faults: Mutex<Vec<Fault>>,
    safe_state_requests: AtomicUsize,
}

impl RecordingFaultHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> Vec<Fault> {
        self.faults.lock().clone()
    }

    pub fn last(&self) -> Option<Fault> {
        self.faults.lock().last().copied()
    }

    pub fn safe_state_requests(&self) -> usize {
        self.safe_state_requests.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.faults.lock().clear();
        self.safe_state_requests.store(0, Ordering::Release);
    }
}

impl FaultHandler for RecordingFaultHandler {
    fn on_fault(&self, fault: &Fault) {
        self.faults.lock().push(*fault);
    }

    fn enter_safe_state(&self, _fault: &Fault) {
        self.safe_state_requests.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn faults_classify() {
        assert_eq!(Fault::NullTransition.kind(), ErrorKind::ProtocolViolation);
        assert_eq!(Fault::QueueOverflow { level: 0 }.kind(), ErrorKind::Overrun);
        let overrun = Fault::DeadlineOverrun {
            elapsed_ms: 12,
            budget_ms: 10,
        };
        assert_eq!(overrun.kind(), ErrorKind::Overrun);
        assert_eq!(
            overrun.to_string(),
            "event processing took 12 ms (budget 10 ms)"
        );
    }

    #[test]
    fn hsm_errors_convert() {
        let fault = Fault::from(HsmError::DepthExceeded { depth: 4, max: 4 });
        assert_eq!(fault, Fault::DepthExceeded { depth: 4, max: 4 });
    }

    #[test]
    fn recorder_keeps_order() {
        let recorder = RecordingFaultHandler::new();
        recorder.on_fault(&Fault::NullTransition);
        recorder.on_fault(&Fault::QueueOverflow { level: 1 });
        recorder.enter_safe_state(&Fault::QueueOverflow { level: 1 });

        assert_eq!(
            recorder.faults(),
            vec![Fault::NullTransition, Fault::QueueOverflow { level: 1 }]
        );
        assert_eq!(recorder.safe_state_requests(), 1);

        recorder.clear();
        assert!(recorder.faults().is_empty());
        assert_eq!(recorder.safe_state_requests(), 0);
    }

    #[traced_test]
    #[test]
    fn tracing_handler_logs_and_latches() {
        let handler = TracingFaultHandler::new();
        handler.on_fault(&Fault::NullTransition);
        assert!(!handler.is_halted());
        assert!(logs_contain("transition requested without a target state"));

        handler.enter_safe_state(&Fault::QueueOverflow { level: 0 });
        assert!(handler.is_halted());
        assert!(logs_contain("entering safe state"));
    }
}

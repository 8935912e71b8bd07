//! ## tidvakt-core::hsm
//! **Hierarchical state machine dispatcher**
//!
//! A machine holds a stack of up to `DEPTH` active states. Level 0 is the
//! top-level state; deeper levels are substates entered with
//! [`StateMachine::enter_substate`]. An event is offered to the deepest
//! state first and bubbles towards level 0 for as long as each state answers
//! [`Outcome::Super`].
//!
//! A transition exits every active level from the deepest one up to level 0,
//! installs the target as the new top-level state and enters it. Transitions
//! always land at depth 0; nesting is rebuilt by the target itself.
//!
//! Handlers receive the bus that delivered the event and may publish
//! follow-up events through it. A machine driven directly with
//! [`StateMachine::dispatch`] has no bus; publishing there fails with
//! [`BusError::Detached`].

use std::cell::{Ref, RefCell, RefMut};

use tracing::{trace, warn};

use crate::bus::{Admission, Publish, Subscriber};
use crate::config::MAX_HSM_DEPTH;
use crate::error::{BusError, HsmError};
use crate::events::{EventFrame, Signal, SmEvent};
use crate::port::{Clock, Fault, FaultHandler};

/// Reply of a state to one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Consumed; stop here.
    Handled,
    /// Not handled at this level; offer it to the parent.
    Super,
    /// Switch to the state written to `next`.
    Transition,
}

impl Outcome {
    /// Writes `target` into `next` and requests the transition.
    pub fn transition<C: 'static>(next: &mut Option<StateRef<C>>, target: StateRef<C>) -> Self {
        *next = Some(target);
        Self::Transition
    }
}

pub type StateRef<C> = &'static dyn State<C>;

/// One state of a machine whose shared context is `C`.
///
/// ENTRY and EXIT arrive as ordinary events with [`Signal::Entry`] and
/// [`Signal::Exit`]; whatever a state returns for them is ignored.
pub trait State<C: 'static> {
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn handle(
        &self,
        ctx: &mut C,
        event: &SmEvent,
        next: &mut Option<StateRef<C>>,
        bus: &dyn Publish,
    ) -> Outcome;
}

/// Bus stand-in for machines driven outside a bus.
struct Detached;

impl Publish for Detached {
    fn publish_frame(&self, _frame: EventFrame) -> Result<Admission, BusError> {
        Err(BusError::Detached)
    }
}

/// How a dispatched event was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    Transitioned,
    /// Every active level answered `Super`.
    Absorbed,
    /// A structural violation was reported to the fault handler.
    Faulted(HsmError),
}

pub struct StateMachine<'a, C: 'static, const DEPTH: usize = MAX_HSM_DEPTH> {
    levels: [Option<StateRef<C>>; DEPTH],
    depth: usize,
    ctx: C,
    name: &'static str,
    clock: &'a dyn Clock,
    faults: &'a dyn FaultHandler,
}

impl<'a, C: 'static, const DEPTH: usize> StateMachine<'a, C, DEPTH> {
    const VALID: () = assert!(DEPTH >= 1, "a state machine needs at least one level");

    /// Creates a machine resting in `top` at depth 0. No ENTRY is sent.
    pub fn new(
        top: StateRef<C>,
        ctx: C,
        name: &'static str,
        clock: &'a dyn Clock,
        faults: &'a dyn FaultHandler,
    ) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID;

        let mut levels = [None; DEPTH];
        levels[0] = Some(top);
        Self {
            levels,
            depth: 0,
            ctx,
            name,
            clock,
            faults,
        }
    }

    /// Offers `event` to the active states, deepest first.
    ///
    /// The event's timestamp is replaced with the current tick.
    pub fn dispatch(&mut self, event: &SmEvent) -> DispatchOutcome {
        self.dispatch_with(event, &Detached)
    }

    /// Like [`dispatch`](Self::dispatch), with handlers publishing through `bus`.
    pub fn dispatch_with(&mut self, event: &SmEvent, bus: &dyn Publish) -> DispatchOutcome {
        if self.depth >= DEPTH {
            return self.fault(HsmError::DepthExceeded {
                depth: self.depth,
                max: DEPTH,
            });
        }

        let event = event.stamped(self.clock.now_ms());
        for level in (0..=self.depth).rev() {
            let Some(state) = self.levels[level] else {
                return self.fault(HsmError::NullHandler { depth: level });
            };

            let mut next = None;
            match state.handle(&mut self.ctx, &event, &mut next, bus) {
                Outcome::Handled => return DispatchOutcome::Handled,
                Outcome::Super => {}
                Outcome::Transition => {
                    let Some(target) = next else {
                        return self.fault(HsmError::NullTransition);
                    };
                    self.transition(state, target, bus);
                    return DispatchOutcome::Transitioned;
                }
            }
        }
        DispatchOutcome::Absorbed
    }

    fn transition(&mut self, source: StateRef<C>, target: StateRef<C>, bus: &dyn Publish) {
        trace!(
            machine = self.name,
            from = source.name(),
            to = target.name(),
            depth = self.depth,
            "state transition"
        );
        for level in (0..=self.depth).rev() {
            self.deliver(level, Signal::Exit, bus);
        }
        self.levels = [None; DEPTH];
        self.levels[0] = Some(target);
        self.depth = 0;
        self.deliver(0, Signal::Entry, bus);
    }

    fn fault(&self, err: HsmError) -> DispatchOutcome {
        self.faults.on_fault(&Fault::from(err));
        DispatchOutcome::Faulted(err)
    }

    /// Pushes `state` as a child of the deepest active state and enters it.
    pub fn enter_substate(&mut self, state: StateRef<C>) -> Result<(), HsmError> {
        let child = self.depth + 1;
        if child >= DEPTH {
            let err = HsmError::DepthExceeded {
                depth: child,
                max: DEPTH,
            };
            self.faults.on_fault(&Fault::from(err));
            return Err(err);
        }

        trace!(machine = self.name, state = state.name(), depth = child, "enter substate");
        self.levels[child] = Some(state);
        self.depth = child;
        self.deliver(child, Signal::Entry, &Detached);
        Ok(())
    }

    /// Exits and pops the deepest substate. Returns `false` at depth 0.
    pub fn exit_substate(&mut self) -> bool {
        if self.depth == 0 {
            return false;
        }

        self.deliver(self.depth, Signal::Exit, &Detached);
        self.levels[self.depth] = None;
        self.depth -= 1;
        trace!(machine = self.name, depth = self.depth, "exit substate");
        true
    }

    /// Delivers ENTRY to the state at `level`.
    pub fn send_entry(&mut self, level: usize) {
        self.deliver(level, Signal::Entry, &Detached);
    }

    /// Delivers EXIT to the state at `level`.
    pub fn send_exit(&mut self, level: usize) {
        self.deliver(level, Signal::Exit, &Detached);
    }

    #[cfg(feature = "entry-exit")]
    fn deliver(&mut self, level: usize, signal: Signal, bus: &dyn Publish) {
        let Some(state) = self.levels.get(level).copied().flatten() else {
            return;
        };
        let event = SmEvent::new(signal).stamped(self.clock.now_ms());
        // Transitions requested from ENTRY/EXIT are not followed.
        let mut ignored = None;
        let _ = state.handle(&mut self.ctx, &event, &mut ignored, bus);
    }

    #[cfg(not(feature = "entry-exit"))]
    fn deliver(&mut self, _level: usize, _signal: Signal, _bus: &dyn Publish) {}

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The deepest active state.
    pub fn current(&self) -> Option<StateRef<C>> {
        self.levels.get(self.depth).copied().flatten()
    }

    pub fn state_at(&self, level: usize) -> Option<StateRef<C>> {
        self.levels.get(level).copied().flatten()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn context(&self) -> &C {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.ctx
    }
}

/// Drives a [`StateMachine`] from bus events.
///
/// `translate` maps each delivered frame to a machine event; frames it
/// returns `None` for are ignored.
pub struct MachineSubscriber<'a, C: 'static, F, const DEPTH: usize = MAX_HSM_DEPTH> {
    machine: RefCell<StateMachine<'a, C, DEPTH>>,
    translate: F,
}

impl<'a, C: 'static, F, const DEPTH: usize> MachineSubscriber<'a, C, F, DEPTH>
where
    F: Fn(&EventFrame) -> Option<SmEvent>,
{
    pub fn new(machine: StateMachine<'a, C, DEPTH>, translate: F) -> Self {
        Self {
            machine: RefCell::new(machine),
            translate,
        }
    }

    pub fn machine(&self) -> Ref<'_, StateMachine<'a, C, DEPTH>> {
        self.machine.borrow()
    }

    pub fn machine_mut(&self) -> RefMut<'_, StateMachine<'a, C, DEPTH>> {
        self.machine.borrow_mut()
    }

    pub fn into_inner(self) -> StateMachine<'a, C, DEPTH> {
        self.machine.into_inner()
    }
}

impl<C: 'static, F, const DEPTH: usize> Subscriber for MachineSubscriber<'_, C, F, DEPTH>
where
    F: Fn(&EventFrame) -> Option<SmEvent>,
{
    fn on_event(&self, frame: &EventFrame, bus: &dyn Publish) {
        let Some(event) = (self.translate)(frame) else {
            return;
        };
        match self.machine.try_borrow_mut() {
            Ok(mut machine) => {
                machine.dispatch_with(&event, bus);
            }
            Err(_) => warn!(id = frame.id(), "state machine busy, event dropped"),
        }
    }
}

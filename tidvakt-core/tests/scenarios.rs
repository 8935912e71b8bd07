//! End-to-end workloads: typed producers, filter rules loaded from a buffer,
//! and a state machine driven through the bus.

use std::cell::RefCell;

use tidvakt_core::prelude::*;

struct EmergencyStop {
    source: u8,
    code: u16,
}

impl BusEvent for EmergencyStop {
    const ID: u8 = 0;
    const PAYLOAD_LEN: usize = 3;

    fn encode_payload(&self, out: &mut [u8]) {
        out[0] = self.source;
        out[1..3].copy_from_slice(&self.code.to_le_bytes());
    }

    fn decode_payload(payload: &[u8]) -> Option<Self> {
        Some(Self {
            source: payload[0],
            code: u16::from_le_bytes([payload[1], payload[2]]),
        })
    }
}

struct ButtonPress {
    pin: u8,
}

impl BusEvent for ButtonPress {
    const ID: u8 = 1;
    const PAYLOAD_LEN: usize = 1;

    fn encode_payload(&self, out: &mut [u8]) {
        out[0] = self.pin;
    }

    fn decode_payload(payload: &[u8]) -> Option<Self> {
        Some(Self { pin: payload[0] })
    }
}

const LOG_INFO: u8 = 2;

#[test]
fn emergency_is_dispatched_before_standard_in_one_cycle() {
    let clock = VirtualClock::default();
    let faults = RecordingFaultHandler::new();
    let order = RefCell::new(Vec::new());
    let record = |frame: &EventFrame, _: &dyn Publish| order.borrow_mut().push(frame.id());

    let mut bus: EventBus = EventBus::new(BusSettings::DEFAULT, &clock, &faults);
    bus.subscribe(EmergencyStop::ID, &record).unwrap();
    bus.subscribe(ButtonPress::ID, &record).unwrap();

    bus.publish(&ButtonPress { pin: 5 }, Priority::STANDARD).unwrap();
    bus.publish(
        &EmergencyStop {
            source: 1,
            code: 0x0BAD,
        },
        Priority::EMERGENCY,
    )
    .unwrap();

    let report = bus.process();

    assert_eq!(*order.borrow(), vec![EmergencyStop::ID, ButtonPress::ID]);
    assert_eq!(report.dispatched, [1, 1, 0]);
    assert!(!report.overrun);
}

#[test]
fn rule_buffer_gates_the_priority_workload() {
    let clock = VirtualClock::default();
    let faults = RecordingFaultHandler::new();
    let received = RefCell::new(Vec::new());
    let record = |frame: &EventFrame, _: &dyn Publish| received.borrow_mut().push(frame.id());

    let mut bus: EventBus = EventBus::new(BusSettings::DEFAULT, &clock, &faults);
    for id in [EmergencyStop::ID, ButtonPress::ID, LOG_INFO] {
        bus.subscribe(id, &record).unwrap();
    }

    // ALLOW emergency, ALLOW button, then reject anything shorter than 10 bytes.
    let rules = [1, 0, 0, 0, 1, 0, 1, 0, 1, 2, 0, 10];
    bus.filter_mut().load_rules_from_buffer(&rules).unwrap();

    assert_eq!(
        bus.publish(&EmergencyStop { source: 2, code: 7 }, Priority::EMERGENCY),
        Ok(Admission::Queued)
    );
    // The size rule comes last, so a 9-byte button press is rejected after all.
    assert_eq!(
        bus.publish(&ButtonPress { pin: 3 }, Priority::STANDARD),
        Ok(Admission::Filtered)
    );
    assert_eq!(
        bus.publish_raw(&EventFrame::signal(LOG_INFO, Priority::LOW).as_bytes()[..]),
        Ok(Admission::Filtered)
    );

    bus.process();
    assert_eq!(*received.borrow(), vec![EmergencyStop::ID]);
    assert_eq!(bus.stats().filtered, 2);
}

#[test]
fn oversized_raw_event_is_rejected() {
    let clock = VirtualClock::default();
    let faults = RecordingFaultHandler::new();
    let bus: EventBus = EventBus::new(BusSettings::DEFAULT, &clock, &faults);

    let mut oversized = [0u8; tidvakt_core::config::MAX_EVENT_SIZE + 1];
    oversized[1] = 1;
    let err = bus.publish_raw(&oversized).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(bus.stats().queues.total_depth(), 0);
}

#[derive(Default)]
struct Led {
    on: bool,
    toggles: u32,
}

const TOGGLE: Signal = Signal::User(0);

struct LedOff;
struct LedOn;

impl State<Led> for LedOff {
    fn name(&self) -> &'static str {
        "off"
    }

    fn handle(
        &self,
        led: &mut Led,
        event: &SmEvent,
        next: &mut Option<StateRef<Led>>,
        _: &dyn Publish,
    ) -> Outcome {
        match event.signal {
            Signal::Entry => {
                led.on = false;
                Outcome::Handled
            }
            TOGGLE => Outcome::transition(next, &LedOn),
            _ => Outcome::Super,
        }
    }
}

impl State<Led> for LedOn {
    fn name(&self) -> &'static str {
        "on"
    }

    fn handle(
        &self,
        led: &mut Led,
        event: &SmEvent,
        next: &mut Option<StateRef<Led>>,
        _: &dyn Publish,
    ) -> Outcome {
        match event.signal {
            Signal::Entry => {
                led.on = true;
                led.toggles += 1;
                Outcome::Handled
            }
            TOGGLE => Outcome::transition(next, &LedOff),
            _ => Outcome::Super,
        }
    }
}

#[cfg(feature = "entry-exit")]
#[test]
fn state_machine_follows_bus_events() {
    let clock = VirtualClock::default();
    let faults = RecordingFaultHandler::new();
    let machine: StateMachine<'_, Led> =
        StateMachine::new(&LedOff, Led::default(), "led", &clock, &faults);
    let led = MachineSubscriber::new(machine, |frame: &EventFrame| {
        frame
            .decode::<ButtonPress>()
            .map(|press| SmEvent::with_data(TOGGLE, SmData::U32(u32::from(press.pin))))
    });

    let mut bus: EventBus = EventBus::new(BusSettings::DEFAULT, &clock, &faults);
    bus.subscribe(ButtonPress::ID, &led).unwrap();

    for _ in 0..3 {
        bus.publish(&ButtonPress { pin: 5 }, Priority::STANDARD).unwrap();
    }
    bus.process();

    let machine = led.machine();
    assert!(machine.context().on);
    assert_eq!(machine.context().toggles, 2);
    assert_eq!(machine.current().map(|s| s.name()), Some("on"));
    assert!(faults.faults().is_empty());
}

const ARMED_ACK: u8 = 6;

type Acks = Vec<Result<Admission, BusError>>;

struct Idle;
struct Armed;

impl State<Acks> for Idle {
    fn handle(
        &self,
        _: &mut Acks,
        event: &SmEvent,
        next: &mut Option<StateRef<Acks>>,
        _: &dyn Publish,
    ) -> Outcome {
        match event.signal {
            TOGGLE => Outcome::transition(next, &Armed),
            _ => Outcome::Super,
        }
    }
}

impl State<Acks> for Armed {
    fn handle(
        &self,
        acks: &mut Acks,
        event: &SmEvent,
        _: &mut Option<StateRef<Acks>>,
        bus: &dyn Publish,
    ) -> Outcome {
        match event.signal {
            Signal::Entry => {
                acks.push(bus.publish_frame(EventFrame::signal(ARMED_ACK, Priority::LOW)));
                Outcome::Handled
            }
            _ => Outcome::Super,
        }
    }
}

#[cfg(feature = "entry-exit")]
#[test]
fn state_entry_publishes_follow_up_dispatched_in_the_same_cycle() {
    let clock = VirtualClock::default();
    let faults = RecordingFaultHandler::new();
    let machine: StateMachine<'_, Acks> =
        StateMachine::new(&Idle, Vec::new(), "arming", &clock, &faults);
    let arming = MachineSubscriber::new(machine, |frame: &EventFrame| {
        (frame.id() == ButtonPress::ID).then(|| SmEvent::new(TOGGLE))
    });
    let acks = RefCell::new(Vec::new());
    let on_ack = |frame: &EventFrame, _: &dyn Publish| acks.borrow_mut().push(frame.priority());

    let mut bus: EventBus = EventBus::new(BusSettings::DEFAULT, &clock, &faults);
    bus.subscribe(ButtonPress::ID, &arming).unwrap();
    bus.subscribe(ARMED_ACK, &on_ack).unwrap();

    bus.publish(&ButtonPress { pin: 3 }, Priority::STANDARD).unwrap();
    let report = bus.process();

    assert_eq!(report.dispatched, [0, 1, 1]);
    assert_eq!(*acks.borrow(), vec![Priority::LOW.get()]);
    assert_eq!(arming.machine().context(), &vec![Ok(Admission::Queued)]);
    assert_eq!(bus.stats().queues.total_depth(), 0);
}

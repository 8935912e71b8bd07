//! Reference workloads.
//!
//! `basic` runs one queue with filtering off: a button press toggles an LED
//! state machine through the bus. `priority` publishes emergency, standard
//! and low-priority traffic through a rule table and logs queue depths
//! every cycle.

use std::cell::Cell;

use anyhow::Context;
use tidvakt_config::TidvaktConfig;
use tidvakt_core::bus::{BusStats, EventBus, Publish};
use tidvakt_core::config::{BusSettings, EVENT_PRIORITIES};
use tidvakt_core::events::{BusEvent, EventFrame, Priority, Signal, SmEvent};
use tidvakt_core::filter::FilterEngine;
use tidvakt_core::hsm::{MachineSubscriber, Outcome, State, StateMachine, StateRef};
use tidvakt_core::port::{Clock, TracingFaultHandler, VirtualClock};
use tidvakt_telemetry::MetricsRecorder;
use tracing::{debug, info, warn};

use crate::commands::{RunArgs, Scenario};

pub const EMERGENCY_STOP: u8 = 0;
pub const BUTTON_PRESS: u8 = 1;
pub const LOG_INFO: u8 = 2;
pub const LED_TOGGLE: u8 = 3;

/// Rule table used when the configuration has none: allow emergency stops
/// and button presses, then drop anything shorter than four bytes.
pub const DEFAULT_RULE_BUFFER: [u8; 12] = [
    1, 0, EMERGENCY_STOP, 0, //
    1, 0, BUTTON_PRESS, 0, //
    1, 2, 0, 4,
];

const BASIC_PERIOD_MS: u32 = 2_000;
const PRIORITY_PERIOD_MS: u32 = 1_000;

pub struct ButtonPressed {
    pub pin: u8,
}

impl BusEvent for ButtonPressed {
    const ID: u8 = BUTTON_PRESS;
    const PAYLOAD_LEN: usize = 1;

    fn encode_payload(&self, out: &mut [u8]) {
        out[0] = self.pin;
    }

    fn decode_payload(payload: &[u8]) -> Option<Self> {
        Some(Self { pin: payload[0] })
    }
}

pub struct EmergencyStop {
    pub source_id: u8,
    pub error_code: u16,
}

impl BusEvent for EmergencyStop {
    const ID: u8 = EMERGENCY_STOP;
    const PAYLOAD_LEN: usize = 3;

    fn encode_payload(&self, out: &mut [u8]) {
        out[0] = self.source_id;
        out[1..3].copy_from_slice(&self.error_code.to_le_bytes());
    }

    fn decode_payload(payload: &[u8]) -> Option<Self> {
        Some(Self {
            source_id: payload[0],
            error_code: u16::from_le_bytes([payload[1], payload[2]]),
        })
    }
}

#[derive(Debug, Default)]
pub struct Led {
    pub on: bool,
    pub toggles: u32,
}

const TOGGLE: Signal = Signal::User(0);

struct LedOff;
struct LedOn;

impl State<Led> for LedOff {
    fn name(&self) -> &'static str {
        "led_off"
    }

    fn handle(
        &self,
        led: &mut Led,
        event: &SmEvent,
        next: &mut Option<StateRef<Led>>,
        _: &dyn Publish,
    ) -> Outcome {
        match event.signal {
            Signal::Init | Signal::Entry => {
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
        "led_on"
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

pub struct RunSummary {
    pub cycles: u32,
    pub dispatched: usize,
    pub stats: BusStats<EVENT_PRIORITIES>,
    pub halted: bool,
    pub led: Option<Led>,
    pub metrics: Option<String>,
}

/// Publishes once per `period`, starting with the first cycle.
struct Schedule {
    period: u32,
    last: Option<u32>,
}

impl Schedule {
    fn new(period: u32) -> Self {
        Self { period, last: None }
    }

    fn due(&mut self, now: u32) -> bool {
        let due = self
            .last
            .map_or(true, |last| now.wrapping_sub(last) >= self.period);
        if due {
            self.last = Some(now);
        }
        due
    }
}

pub fn run(config: &TidvaktConfig, args: &RunArgs) -> anyhow::Result<RunSummary> {
    let settings = config
        .bus
        .to_settings::<EVENT_PRIORITIES>()
        .context("bus configuration does not fit the built-in priority levels")?;
    let metrics = if args.metrics || config.telemetry.metrics {
        Some(MetricsRecorder::new()?)
    } else {
        None
    };

    let mut summary = match args.scenario {
        Scenario::Basic => run_basic(settings, args, metrics.as_ref())?,
        Scenario::Priority => run_priority(settings, config, args, metrics.as_ref())?,
    };
    summary.metrics = metrics.map(|m| m.gather_metrics()).transpose()?;
    Ok(summary)
}

fn run_basic(
    settings: BusSettings<EVENT_PRIORITIES>,
    args: &RunArgs,
    metrics: Option<&MetricsRecorder>,
) -> anyhow::Result<RunSummary> {
    let clock = VirtualClock::default();
    let faults = TracingFaultHandler::new();

    let mut machine: StateMachine<'_, Led> =
        StateMachine::new(&LedOff, Led::default(), "led", &clock, &faults);
    machine.dispatch(&SmEvent::new(Signal::Init));
    let led = MachineSubscriber::new(machine, |frame: &EventFrame| {
        (frame.id() == LED_TOGGLE).then(|| SmEvent::new(TOGGLE))
    });
    let on_button = |frame: &EventFrame, _: &dyn Publish| {
        if let Some(press) = frame.decode::<ButtonPressed>() {
            info!(pin = press.pin, "button pressed");
        }
    };

    let mut bus: EventBus = EventBus::new(
        settings.with_priority(false).with_filters(false),
        &clock,
        &faults,
    );
    bus.subscribe(BUTTON_PRESS, &on_button)?;
    bus.subscribe(LED_TOGGLE, &led)?;

    let mut schedule = Schedule::new(BASIC_PERIOD_MS);
    let mut summary = drive(&bus, &clock, &faults, args, metrics, |bus, now| {
        if schedule.due(now) {
            bus.publish(&ButtonPressed { pin: 5 }, Priority::STANDARD)?;
            bus.publish_raw(EventFrame::signal(LED_TOGGLE, Priority::STANDARD).as_bytes())?;
        }
        Ok(())
    })?;

    drop(bus);
    let mut machine = led.into_inner();
    info!(
        state = machine.current().map_or("none", |state| state.name()),
        "led state machine"
    );
    summary.led = Some(std::mem::take(machine.context_mut()));
    Ok(summary)
}

fn run_priority(
    settings: BusSettings<EVENT_PRIORITIES>,
    config: &TidvaktConfig,
    args: &RunArgs,
    metrics: Option<&MetricsRecorder>,
) -> anyhow::Result<RunSummary> {
    let clock = VirtualClock::default();
    let faults = TracingFaultHandler::new();

    let emergencies = Cell::new(0u32);
    let on_emergency = |frame: &EventFrame, _: &dyn Publish| {
        emergencies.set(emergencies.get() + 1);
        if let Some(stop) = frame.decode::<EmergencyStop>() {
            warn!(
                source = stop.source_id,
                code = stop.error_code,
                "emergency stop"
            );
        }
    };
    let on_button = |frame: &EventFrame, _: &dyn Publish| {
        info!(timestamp = frame.timestamp(), "button pressed");
    };
    let on_log = |frame: &EventFrame, _: &dyn Publish| {
        debug!(timestamp = frame.timestamp(), "log record");
    };

    let mut bus: EventBus = EventBus::new(settings, &clock, &faults);
    bus.subscribe(EMERGENCY_STOP, &on_emergency)?;
    bus.subscribe(BUTTON_PRESS, &on_button)?;
    bus.subscribe(LOG_INFO, &on_log)?;
    load_rules(bus.filter_mut(), config)?;

    let mut schedule = Schedule::new(PRIORITY_PERIOD_MS);
    let summary = drive(&bus, &clock, &faults, args, metrics, |bus, now| {
        if schedule.due(now) {
            bus.publish(
                &EmergencyStop {
                    source_id: 1,
                    error_code: 0x0100,
                },
                Priority::EMERGENCY,
            )?;
            bus.publish(&ButtonPressed { pin: 2 }, Priority::STANDARD)?;
            bus.publish_raw(EventFrame::signal(LOG_INFO, Priority::LOW).as_bytes())?;
        }
        Ok(())
    })?;

    info!(emergencies = emergencies.get(), "priority workload finished");
    Ok(summary)
}

fn load_rules(filter: &mut FilterEngine, config: &TidvaktConfig) -> anyhow::Result<()> {
    if config.filters.rules.is_empty() {
        filter.load_rules_from_buffer(&DEFAULT_RULE_BUFFER)?;
    } else {
        filter.init();
        for rule in config.filters.to_rules() {
            filter.add_rule(rule)?;
        }
    }
    info!(rules = filter.len(), "filter rules loaded");
    Ok(())
}

/// Runs the cycle loop: process, let the workload publish, log, advance the clock.
fn drive<F>(
    bus: &EventBus<'_>,
    clock: &VirtualClock,
    faults: &TracingFaultHandler,
    args: &RunArgs,
    metrics: Option<&MetricsRecorder>,
    mut workload: F,
) -> anyhow::Result<RunSummary>
where
    F: FnMut(&EventBus<'_>, u32) -> anyhow::Result<()>,
{
    let mut dispatched = 0;
    let mut cycles = 0;

    for _ in 0..args.cycles {
        if faults.is_halted() {
            warn!(cycle = cycles, "safe state requested, stopping");
            break;
        }

        let report = bus.process();
        dispatched += report.total_dispatched();
        workload(bus, clock.now_ms())?;

        let stats = bus.stats();
        let [emergency, standard, low] = stats.queues.depths;
        info!(
            tick = clock.now_ms(),
            emergency, standard, low, "queue depths"
        );
        if let Some(metrics) = metrics {
            metrics.observe_cycle(&report);
            metrics.record_stats(&stats);
        }

        clock.advance(args.tick_ms);
        cycles += 1;
    }

    Ok(RunSummary {
        cycles,
        dispatched,
        stats: bus.stats(),
        halted: faults.is_halted(),
        led: None,
        metrics: None,
    })
}

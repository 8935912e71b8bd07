#[macro_use]
extern crate criterion;

use std::cell::Cell;

use criterion::Criterion;

use tidvakt_core::bus::{EventBus, Publish};
use tidvakt_core::config::{BusSettings, LevelPolicy, OverflowPolicy};
use tidvakt_core::events::{EventFrame, Priority};
use tidvakt_core::filter::FilterRule;
use tidvakt_core::port::{RecordingFaultHandler, VirtualClock};

fn bench_publish_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_bus_throughput");

    for batch in [1usize, 8, 31] {
        group.throughput(criterion::Throughput::Elements(batch as u64));
        group.bench_function(format!("batch_{}", batch), |b| {
            let clock = VirtualClock::default();
            let faults = RecordingFaultHandler::new();
            let seen = Cell::new(0u64);
            let sink = |_: &EventFrame, _: &dyn Publish| seen.set(seen.get() + 1);
            let settings = BusSettings::DEFAULT
                .with_level(1, LevelPolicy::new(OverflowPolicy::DropOldest, batch));
            let mut bus: EventBus = EventBus::new(settings, &clock, &faults);
            bus.subscribe(1, &sink).unwrap();

            let event = EventFrame::signal(1, Priority::STANDARD);
            b.iter(|| {
                for _ in 0..batch {
                    bus.publish_raw(event.as_bytes()).unwrap();
                }
                bus.process();
            });
        });
    }
    group.finish();
}

fn bench_filter_check(c: &mut Criterion) {
    let clock = VirtualClock::default();
    let faults = RecordingFaultHandler::new();
    let mut bus: EventBus = EventBus::new(BusSettings::DEFAULT, &clock, &faults);
    for id in 0..7 {
        bus.filter_mut().add_rule(FilterRule::deny(id + 2)).unwrap();
    }
    bus.filter_mut().add_rule(FilterRule::size_max(16)).unwrap();
    let header = EventFrame::signal(1, Priority::LOW).header();

    c.bench_function("filter_check_full_table", |b| {
        b.iter(|| criterion::black_box(bus.filter().check(&header)));
    });
}

criterion_group!(benches, bench_publish_process, bench_filter_check);
criterion_main!(benches);

//! ## tidvakt-telemetry::metrics
//! **Prometheus view of the event bus**
//!
//! Queue gauges are refreshed from [`BusStats`] snapshots; cycle counters and
//! the duration histogram are fed from each [`CycleReport`].

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGaugeVec, Opts, Registry, TextEncoder,
};
use tidvakt_core::bus::{BusStats, CycleReport};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub queue_depth: IntGaugeVec,
    pub dropped_events: IntGaugeVec,
    pub cycles: IntCounter,
    pub dispatched: IntCounter,
    pub deadline_overruns: IntCounter,
    pub cycle_duration: Histogram,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let queue_depth = IntGaugeVec::new(
            Opts::new("tidvakt_queue_depth", "Events waiting per priority level"),
            &["level"],
        )?;
        let dropped_events = IntGaugeVec::new(
            Opts::new(
                "tidvakt_dropped_events",
                "Events dropped by the overflow policy per priority level",
            ),
            &["level"],
        )?;
        let cycles = IntCounter::new("tidvakt_cycles_total", "Processing cycles run")?;
        let dispatched =
            IntCounter::new("tidvakt_dispatched_total", "Events dispatched to subscribers")?;
        let deadline_overruns = IntCounter::new(
            "tidvakt_deadline_overruns_total",
            "Cycles that exceeded the processing deadline",
        )?;
        let cycle_duration = Histogram::with_opts(
            HistogramOpts::new("tidvakt_cycle_duration_ms", "Processing cycle duration")
                .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0]),
        )?;

        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(dropped_events.clone()))?;
        registry.register(Box::new(cycles.clone()))?;
        registry.register(Box::new(dispatched.clone()))?;
        registry.register(Box::new(deadline_overruns.clone()))?;
        registry.register(Box::new(cycle_duration.clone()))?;

        Ok(Self {
            registry,
            queue_depth,
            dropped_events,
            cycles,
            dispatched,
            deadline_overruns,
            cycle_duration,
        })
    }

    pub fn observe_cycle<const LEVELS: usize>(&self, report: &CycleReport<LEVELS>) {
        self.cycles.inc();
        self.dispatched.inc_by(report.total_dispatched() as u64);
        if report.overrun {
            self.deadline_overruns.inc();
        }
        self.cycle_duration.observe(f64::from(report.elapsed_ms));
    }

    pub fn record_stats<const LEVELS: usize>(&self, stats: &BusStats<LEVELS>) {
        for (level, (depth, dropped)) in stats
            .queues
            .depths
            .iter()
            .zip(stats.queues.dropped.iter())
            .enumerate()
        {
            let label = level.to_string();
            self.queue_depth
                .with_label_values(&[label.as_str()])
                .set(*depth as i64);
            self.dropped_events
                .with_label_values(&[label.as_str()])
                .set(i64::from(*dropped));
        }
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        let families = self.registry.gather();
        encoder.encode(&families, &mut buffer)?;
        debug!(families = families.len(), bytes = buffer.len(), "metrics gathered");
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}

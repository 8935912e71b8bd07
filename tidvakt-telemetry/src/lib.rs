//! # Tidvakt Telemetry
//!
//! Log subscriber setup and Prometheus metrics for the event bus.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LoggingError};
pub use metrics::MetricsRecorder;

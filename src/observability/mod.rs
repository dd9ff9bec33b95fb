//! Observability subsystem
//!
//! Structured JSON logging, counters and begin/complete scopes. Observation
//! is read-only: it never changes what an operation does or returns.
//!
//! ```ignore
//! use aerodoc::observability::{log_event_with_fields, Event, MetricsRegistry};
//!
//! log_event_with_fields(Event::TableCreated, &[("table", "users")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_queries_executed();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log an event with fields at its own severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        log_event_with_fields(Event::TxBegin, &[]);
        log_event_with_fields(Event::TableCreated, &[("table", "users")]);
    }
}

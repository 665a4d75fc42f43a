//! Observability subsystem
//!
//! - Structured logging (JSON lines)
//! - Typed lifecycle events
//! - Begin/complete scopes
//! - Atomic counters
//!
//! Logging never fails the caller: write errors are swallowed.
//!
//! ```ignore
//! use replwatch::observability::{log_event_with_fields, Event, ObservationScope};
//!
//! log_event_with_fields(Event::ProbeFailed, &[("url", "db1:3306")]);
//!
//! let scope = ObservationScope::with_fields("REJOIN", &[("url", "db1:3306")]);
//! // ... do work ...
//! scope.complete();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::{ObservationScope, Timer};

/// Log a lifecycle event at its own severity.
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields at its own severity.
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

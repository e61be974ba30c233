//! Observability
//!
//! - Structured one-line JSON logs with deterministic key order
//! - A closed catalog of lifecycle events
//! - Timed scopes around executor operations
//!
//! Logging is synchronous and read-only: nothing here changes a result or
//! an error.
//!
//! ```ignore
//! use aeroquery::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::ConfigLoaded, &[("path", "aeroquery.json")]);
//! ```

mod events;
mod logger;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use scope::ObservationScope;

/// Log a lifecycle event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

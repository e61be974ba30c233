//! Timed scope around one executor operation
//!
//! - `complete*` logs the success event with `operation` and `duration_ms`
//! - `fail` logs `QUERY_FAILED` with the error code and reason
//! - `finish` logs any other outcome event
//! - Dropping an unfinished scope logs `QUERY_ABANDONED`

use std::cell::Cell;
use std::time::Instant;

use super::events::Event;
use super::logger::Logger;

/// Measures one operation and logs its outcome exactly once.
///
/// ```ignore
/// let scope = ObservationScope::new("list", Event::QueryExecuted)
///     .with_field("content_type", "article");
/// // ... run the operation ...
/// scope.complete_with_fields(&[("rows", "20")]);
/// ```
pub struct ObservationScope<'a> {
    operation: &'a str,
    event: Event,
    completed: Cell<bool>,
    fields: Vec<(&'a str, String)>,
    timer: Timer,
}

impl<'a> ObservationScope<'a> {
    /// Starts timing `operation`; `event` is logged on success.
    pub fn new(operation: &'a str, event: Event) -> Self {
        Self {
            operation,
            event,
            completed: Cell::new(false),
            fields: Vec::new(),
            timer: Timer::new(),
        }
    }

    /// Attaches a field to every record this scope logs.
    pub fn with_field(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.fields.push((key, value.into()));
        self
    }

    pub fn complete(self) {
        let event = self.event;
        self.finish(event, &[]);
    }

    pub fn complete_with_fields(self, extra_fields: &[(&str, &str)]) {
        let event = self.event;
        self.finish(event, extra_fields);
    }

    /// Logs the failure with its machine-readable code.
    pub fn fail(self, code: &str, reason: &str) {
        self.finish(Event::QueryFailed, &[("code", code), ("reason", reason)]);
    }

    /// Ends the scope by logging `event` instead of the success event.
    pub fn finish(self, event: Event, extra_fields: &[(&str, &str)]) {
        self.completed.set(true);
        let duration = self.timer.elapsed_ms();
        let mut fields = self.base_fields(&duration);
        fields.extend(extra_fields.iter().copied());
        Logger::log(event.severity(), event.as_str(), &fields);
    }

    pub fn is_completed(&self) -> bool {
        self.completed.get()
    }

    pub fn elapsed_ms(&self) -> String {
        self.timer.elapsed_ms()
    }

    fn base_fields<'f>(&'f self, duration: &'f str) -> Vec<(&'f str, &'f str)> {
        let mut fields: Vec<(&str, &str)> = self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        fields.push(("operation", self.operation));
        fields.push(("duration_ms", duration));
        fields
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.completed.get() {
            Logger::log(
                Event::QueryAbandoned.severity(),
                Event::QueryAbandoned.as_str(),
                &[("operation", self.operation)],
            );
        }
    }
}

/// Wall-clock timer for `duration_ms` fields
struct Timer {
    start: Instant,
}

impl Timer {
    fn new() -> Self {
        Self { start: Instant::now() }
    }

    fn elapsed_ms(&self) -> String {
        self.start.elapsed().as_millis().to_string()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

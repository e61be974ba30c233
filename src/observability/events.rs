//! Loggable lifecycle events
//!
//! Every log record the engine emits is named by one of these events.

use std::fmt;

use super::logger::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Startup
    /// Engine configuration loaded
    ConfigLoaded,
    /// Field schemas registered
    SchemasLoaded,
    /// Store seeded from a fixtures file
    FixturesLoaded,
    /// HTTP listener bound and serving
    ServerStarted,

    // Query lifecycle
    /// Request body or query string parsed into a query
    QueryParsed,
    /// Query rejected by schema validation
    QueryValidationFailed,
    /// Executor operation finished
    QueryExecuted,
    /// Executor operation failed after validation
    QueryFailed,
    /// Executor operation abandoned without reporting an outcome
    QueryAbandoned,
    /// Grouped aggregate finished
    AggregateExecuted,
    /// Relation population finished
    PopulateCompleted,
    /// Full-text search finished
    SearchExecuted,
}

impl Event {
    /// Returns the event name as it appears in log records
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::SchemasLoaded => "SCHEMAS_LOADED",
            Event::FixturesLoaded => "FIXTURES_LOADED",
            Event::ServerStarted => "SERVER_STARTED",
            Event::QueryParsed => "QUERY_PARSED",
            Event::QueryValidationFailed => "QUERY_VALIDATION_FAILED",
            Event::QueryExecuted => "QUERY_EXECUTED",
            Event::QueryFailed => "QUERY_FAILED",
            Event::QueryAbandoned => "QUERY_ABANDONED",
            Event::AggregateExecuted => "AGGREGATE_EXECUTED",
            Event::PopulateCompleted => "POPULATE_COMPLETED",
            Event::SearchExecuted => "SEARCH_EXECUTED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::QueryParsed => Severity::Trace,
            Event::QueryValidationFailed | Event::QueryAbandoned => Severity::Warn,
            Event::QueryFailed => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &[Event] = &[
        Event::ConfigLoaded,
        Event::SchemasLoaded,
        Event::FixturesLoaded,
        Event::ServerStarted,
        Event::QueryParsed,
        Event::QueryValidationFailed,
        Event::QueryExecuted,
        Event::QueryFailed,
        Event::QueryAbandoned,
        Event::AggregateExecuted,
        Event::PopulateCompleted,
        Event::SearchExecuted,
    ];

    #[test]
    fn test_event_names_are_screaming_snake_case() {
        for event in ALL {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_ascii_uppercase() || c == '_'), "{}", s);
        }
    }

    #[test]
    fn test_failures_log_above_info() {
        assert_eq!(Event::QueryFailed.severity(), Severity::Error);
        assert_eq!(Event::QueryValidationFailed.severity(), Severity::Warn);
        assert_eq!(Event::QueryExecuted.severity(), Severity::Info);
        assert!(Event::QueryParsed.severity() < Severity::Info);
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::PopulateCompleted), "POPULATE_COMPLETED");
    }
}

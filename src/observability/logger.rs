//! Structured JSON logger
//!
//! Each record is a single line: `event` and `severity` lead, the remaining
//! fields follow in key order. Records below the process-wide minimum
//! severity are dropped before formatting.

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU8, Ordering};

static MIN_SEVERITY: AtomicU8 = AtomicU8::new(Severity::Info as u8);

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Per-query parse detail
    Trace = 0,
    Info = 1,
    /// Rejected or abandoned queries
    Warn = 2,
    /// Store failures
    Error = 3,
    /// Process exits
    Fatal = 4,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    /// Case-insensitive level name, as written in the config file
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Severity::Trace),
            "info" => Some(Severity::Info),
            "warn" | "warning" => Some(Severity::Warn),
            "error" => Some(Severity::Error),
            "fatal" => Some(Severity::Fatal),
            _ => None,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Severity::Trace,
            1 => Severity::Info,
            2 => Severity::Warn,
            3 => Severity::Error,
            _ => Severity::Fatal,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Process-wide JSON log sink
pub struct Logger;

impl Logger {
    /// Drops every later record below `severity`.
    pub fn set_min_severity(severity: Severity) {
        MIN_SEVERITY.store(severity as u8, Ordering::Relaxed);
    }

    pub fn min_severity() -> Severity {
        Severity::from_u8(MIN_SEVERITY.load(Ordering::Relaxed))
    }

    pub fn enabled(severity: Severity) -> bool {
        severity >= Self::min_severity()
    }

    /// ERROR and FATAL go to stderr, the rest to stdout.
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if !Self::enabled(severity) {
            return;
        }
        let line = format_record(severity, event, fields);
        if severity >= Severity::Error {
            write_line(&mut io::stderr().lock(), &line);
        } else {
            write_line(&mut io::stdout().lock(), &line);
        }
    }
}

fn write_line<W: Write>(writer: &mut W, line: &str) {
    // A failed log write is not a query failure
    let _ = writer.write_all(line.as_bytes());
    let _ = writer.flush();
}

/// One record, newline-terminated
fn format_record(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let mut ordered: Vec<&(&str, &str)> = fields.iter().collect();
    ordered.sort_by_key(|(key, _)| *key);

    let mut line = String::with_capacity(64 + fields.len() * 24);
    line.push_str("{\"event\":");
    push_quoted(&mut line, event);
    line.push_str(",\"severity\":");
    push_quoted(&mut line, severity.as_str());
    for (key, value) in ordered {
        line.push(',');
        push_quoted(&mut line, key);
        line.push(':');
        push_quoted(&mut line, value);
    }
    line.push_str("}\n");
    line
}

fn push_quoted(line: &mut String, raw: &str) {
    match serde_json::to_string(raw) {
        Ok(quoted) => line.push_str(&quoted),
        Err(_) => line.push_str("\"\""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> serde_json::Value {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn test_severity_ordering_and_names() {
        assert!(Severity::Trace < Severity::Info);
        assert!(Severity::Warn < Severity::Error);
        assert!(Severity::Error < Severity::Fatal);
        assert_eq!(Severity::Warn.as_str(), "WARN");
    }

    #[test]
    fn test_parse_level_names() {
        assert_eq!(Severity::parse(" Warning "), Some(Severity::Warn));
        assert_eq!(Severity::parse("TRACE"), Some(Severity::Trace));
        assert_eq!(Severity::parse("verbose"), None);
        for raw in 0..5u8 {
            assert_eq!(Severity::from_u8(raw) as u8, raw);
        }
    }

    #[test]
    fn test_record_is_one_json_line() {
        let output = format_record(Severity::Info, "QUERY_EXECUTED", &[("operation", "list"), ("rows", "3")]);
        assert_eq!(output.matches('\n').count(), 1);

        let parsed = parse(&output);
        assert_eq!(parsed["event"], "QUERY_EXECUTED");
        assert_eq!(parsed["severity"], "INFO");
        assert_eq!(parsed["rows"], "3");
    }

    #[test]
    fn test_field_order_is_deterministic() {
        let a = format_record(Severity::Info, "E", &[("zeta", "1"), ("alpha", "2"), ("mid", "3")]);
        let b = format_record(Severity::Info, "E", &[("mid", "3"), ("zeta", "1"), ("alpha", "2")]);
        assert_eq!(a, b);
        assert!(a.find("\"event\"").unwrap() < a.find("\"severity\"").unwrap());
        assert!(a.find("alpha").unwrap() < a.find("mid").unwrap());
        assert!(a.find("mid").unwrap() < a.find("zeta").unwrap());
    }

    #[test]
    fn test_values_are_escaped() {
        let reason = "unknown field \"colour\"\n\tat filter";
        let output = format_record(Severity::Warn, "QUERY_VALIDATION_FAILED", &[("reason", reason)]);
        assert_eq!(parse(&output)["reason"], reason);
    }
}

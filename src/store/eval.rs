//! In-memory condition evaluation
//!
//! Evaluates compiled condition trees with SQL three-valued logic: every
//! predicate yields `Some(true)`, `Some(false)`, or `None` (unknown), and
//! only rows evaluating to `Some(true)` match.
//!
//! Value semantics follow the PostgreSQL rendering:
//! - Document values are compared as text unless the column carries a cast
//! - A value that does not survive its cast is NULL, so it matches nothing
//! - `IsNull` on a document path matches missing, JSON null, and `""`
//! - Containment follows `@>`: objects by key subset, arrays by element
//!   subset, and an array contains a bare primitive element

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::{Map, Value};

use crate::builder::{Cast, Column, CompareOp, Condition};

use super::document::Document;

/// Something a condition can be evaluated against
pub(crate) trait RowSource {
    /// Raw value of a column; `None` when absent
    fn value(&self, column: &Column) -> Option<Value>;

    /// Searchable text of the given columns, or of the whole row when empty
    fn text(&self, columns: &[Column]) -> String;
}

impl RowSource for Document {
    fn value(&self, column: &Column) -> Option<Value> {
        self.column_value(column)
    }

    fn text(&self, columns: &[Column]) -> String {
        if columns.is_empty() {
            let mut out = String::new();
            collect_text(&Value::Object(self.data.clone()), &mut out);
            return out;
        }
        let mut out = String::new();
        for column in columns {
            if let Some(value) = self.column_value(column) {
                collect_text(&value, &mut out);
            }
        }
        out
    }
}

/// Grouped aggregate output row, addressed by output name
impl RowSource for Map<String, Value> {
    fn value(&self, column: &Column) -> Option<Value> {
        match self.get(&column.name()) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.clone()),
        }
    }

    fn text(&self, _columns: &[Column]) -> String {
        let mut out = String::new();
        for value in self.values() {
            collect_text(value, &mut out);
        }
        out
    }
}

fn collect_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            out.push_str(s);
            out.push(' ');
        }
        Value::Array(items) => items.iter().for_each(|v| collect_text(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_text(v, out)),
        Value::Number(n) => {
            out.push_str(&n.to_string());
            out.push(' ');
        }
        Value::Bool(_) | Value::Null => {}
    }
}

/// A value after casting, ready to compare
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Typed {
    Number(f64),
    Bool(bool),
    Time(DateTime<Utc>),
    Date(NaiveDate),
    Text(String),
}

impl PartialOrd for Typed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Typed::Number(a), Typed::Number(b)) => a.partial_cmp(b),
            (Typed::Bool(a), Typed::Bool(b)) => a.partial_cmp(b),
            (Typed::Time(a), Typed::Time(b)) => a.partial_cmp(b),
            (Typed::Date(a), Typed::Date(b)) => a.partial_cmp(b),
            (Typed::Text(a), Typed::Text(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Text rendering of a JSON value, as `->>` would produce it
pub(crate) fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&t));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| Utc.from_utc_datetime(&t))
}

/// Casts a JSON value; `None` is SQL NULL, including failed casts.
pub(crate) fn cast_value(value: &Value, cast: Option<Cast>) -> Option<Typed> {
    if value.is_null() {
        return None;
    }
    match cast {
        None => as_text(value).map(Typed::Text),
        Some(Cast::Numeric) => match value {
            Value::Number(n) => n.as_f64().map(Typed::Number),
            Value::String(s) => s.trim().parse::<f64>().ok().map(Typed::Number),
            _ => None,
        },
        Some(Cast::Integer) => match value {
            Value::Number(n) => n.as_i64().map(|i| Typed::Number(i as f64)),
            Value::String(s) => s.trim().parse::<i64>().ok().map(|i| Typed::Number(i as f64)),
            _ => None,
        },
        Some(Cast::Boolean) => match value {
            Value::Bool(b) => Some(Typed::Bool(*b)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "yes" | "1" => Some(Typed::Bool(true)),
                "false" | "f" | "no" | "0" => Some(Typed::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        Some(Cast::Timestamp) => value.as_str().and_then(parse_timestamp).map(Typed::Time),
        Some(Cast::Date) => value
            .as_str()
            .and_then(parse_timestamp)
            .map(|t| Typed::Date(t.date_naive())),
    }
}

/// Cast used when evaluating a column; aggregate outputs keep their
/// natural type.
fn typed(column: &Column, value: &Value) -> Option<Typed> {
    match column {
        Column::Output { .. } => match value {
            Value::Number(n) => n.as_f64().map(Typed::Number),
            Value::Bool(b) => Some(Typed::Bool(*b)),
            other => cast_value(other, None),
        },
        _ => cast_value(value, column.cast()),
    }
}

/// Ordering of two optional values with NULLs last in either direction
pub(crate) fn compare_nulls_last(a: Option<&Typed>, b: Option<&Typed>, descending: bool) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let ord = a.partial_cmp(b).unwrap_or(Ordering::Equal);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
    }
}

/// Sort key of a row for one column
pub(crate) fn sort_key<R: RowSource>(row: &R, column: &Column) -> Option<Typed> {
    row.value(column).and_then(|v| typed(column, &v))
}

/// Words of a text for full-text matching
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Term-frequency relevance of `query` in `text`; zero unless every term
/// occurs.
pub(crate) fn text_rank(text: &str, query: &str) -> f64 {
    let words = tokenize(text);
    let terms = tokenize(query);
    if words.is_empty() || terms.is_empty() {
        return 0.0;
    }
    let mut hits = 0usize;
    for term in &terms {
        let count = words.iter().filter(|w| *w == term).count();
        if count == 0 {
            return 0.0;
        }
        hits += count;
    }
    hits as f64 / words.len() as f64
}

/// `@>` containment
pub(crate) fn json_contains(container: &Value, contained: &Value) -> bool {
    match (container, contained) {
        (Value::Object(a), Value::Object(b)) => b
            .iter()
            .all(|(k, vb)| a.get(k).map(|va| json_contains(va, vb)).unwrap_or(false)),
        (Value::Array(a), Value::Array(b)) => b.iter().all(|vb| a.iter().any(|va| json_contains(va, vb))),
        (Value::Array(a), b) if !b.is_object() => a.iter().any(|va| scalar_eq(va, b)),
        (a, b) => scalar_eq(a, b),
    }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Translates a LIKE pattern into an anchored regex
pub(crate) fn like_to_regex(pattern: &str, case_insensitive: bool) -> Result<Regex, regex::Error> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push_str(if case_insensitive { "(?is)^" } else { "(?s)^" });
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    re.push_str(&regex::escape(&escaped.to_string()));
                }
            }
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re)
}

/// Evaluates one condition tree; caches compiled patterns across rows.
#[derive(Default)]
pub(crate) struct Evaluator {
    patterns: RefCell<HashMap<(String, bool), Option<Regex>>>,
}

impl Evaluator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// True only when the condition is known to hold
    pub(crate) fn matches<R: RowSource>(&self, condition: Option<&Condition>, row: &R) -> bool {
        match condition {
            None => true,
            Some(condition) => self.eval(condition, row) == Some(true),
        }
    }

    pub(crate) fn eval<R: RowSource>(&self, condition: &Condition, row: &R) -> Option<bool> {
        match condition {
            Condition::Compare { column, op, value } => {
                let lhs = row.value(column).and_then(|v| typed(column, &v))?;
                let rhs = typed(column, value)?;
                let ord = lhs.partial_cmp(&rhs)?;
                Some(match op {
                    CompareOp::Eq => ord == Ordering::Equal,
                    CompareOp::Ne => ord != Ordering::Equal,
                    CompareOp::Gt => ord == Ordering::Greater,
                    CompareOp::Gte => ord != Ordering::Less,
                    CompareOp::Lt => ord == Ordering::Less,
                    CompareOp::Lte => ord != Ordering::Greater,
                })
            }
            Condition::Pattern {
                column,
                pattern,
                case_insensitive,
            } => {
                let text = row.value(column).as_ref().and_then(as_text)?;
                self.pattern_matches(pattern, *case_insensitive, &text)
            }
            Condition::InList { column, values, negated } => {
                if values.is_empty() {
                    return Some(*negated);
                }
                let lhs = row.value(column).and_then(|v| typed(column, &v))?;
                let mut unknown = false;
                for value in values {
                    match typed(column, value) {
                        Some(rhs) if lhs.partial_cmp(&rhs) == Some(Ordering::Equal) => return Some(!negated),
                        Some(_) => {}
                        None => unknown = true,
                    }
                }
                if unknown {
                    None
                } else {
                    Some(*negated)
                }
            }
            Condition::IsNull { column, negated } => {
                let is_null = match row.value(column) {
                    None | Some(Value::Null) => true,
                    Some(Value::String(s)) if column.is_document() => s.is_empty(),
                    Some(_) => false,
                };
                Some(is_null != *negated)
            }
            Condition::Exists { column, negated } => {
                let present = row.value(column).is_some();
                Some(present != *negated)
            }
            Condition::Contains { column, value } => {
                let lhs = row.value(column)?;
                Some(json_contains(&lhs, value))
            }
            Condition::HasKey { column, key } => match row.value(column)? {
                Value::Object(map) => Some(map.contains_key(key)),
                Value::Array(items) => Some(items.iter().any(|v| v.as_str() == Some(key.as_str()))),
                Value::String(s) => Some(&s == key),
                _ => Some(false),
            },
            Condition::Between { column, low, high } => {
                let lhs = row.value(column).and_then(|v| typed(column, &v))?;
                let low = typed(column, low)?;
                let high = typed(column, high)?;
                Some(lhs.partial_cmp(&low)? != Ordering::Less && lhs.partial_cmp(&high)? != Ordering::Greater)
            }
            Condition::FullText { columns, query, .. } => Some(text_rank(&row.text(columns), query) > 0.0),
            Condition::And(items) => {
                let mut result = Some(true);
                for item in items {
                    match self.eval(item, row) {
                        Some(false) => return Some(false),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                result
            }
            Condition::Or(items) => {
                let mut result = Some(false);
                for item in items {
                    match self.eval(item, row) {
                        Some(true) => return Some(true),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                result
            }
            Condition::Not(inner) => self.eval(inner, row).map(|b| !b),
        }
    }

    fn pattern_matches(&self, pattern: &str, case_insensitive: bool, text: &str) -> Option<bool> {
        let mut cache = self.patterns.borrow_mut();
        let compiled = cache
            .entry((pattern.to_string(), case_insensitive))
            .or_insert_with(|| like_to_regex(pattern, case_insensitive).ok());
        compiled.as_ref().map(|re| re.is_match(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SystemField;
    use serde_json::json;

    fn doc(data: Value) -> Document {
        Document::from_json("article", data)
    }

    fn col(path: &str, cast: Option<Cast>) -> Column {
        Column::document(path, cast)
    }

    fn eval(condition: &Condition, row: &Document) -> Option<bool> {
        Evaluator::new().eval(condition, row)
    }

    #[test]
    fn test_numeric_cast_compare() {
        let row = doc(json!({"price": "150"}));
        let gte = Condition::compare(col("price", Some(Cast::Numeric)), CompareOp::Gte, json!(100));
        assert_eq!(eval(&gte, &row), Some(true));

        // Without a cast the comparison is textual: "150" < "9"
        let text = Condition::compare(col("price", None), CompareOp::Gt, json!(9));
        assert_eq!(eval(&text, &row), Some(false));
    }

    #[test]
    fn test_failed_cast_is_unknown() {
        let row = doc(json!({"price": "n/a"}));
        let gt = Condition::compare(col("price", Some(Cast::Numeric)), CompareOp::Gt, json!(1));
        assert_eq!(eval(&gt, &row), None);
        assert_eq!(eval(&Condition::negate(gt), &row), None);
    }

    #[test]
    fn test_missing_field_is_unknown_not_false() {
        let row = doc(json!({}));
        let ne = Condition::compare(col("title", None), CompareOp::Ne, json!("x"));
        assert_eq!(eval(&ne, &row), None);
        assert!(!Evaluator::new().matches(Some(&ne), &row));
    }

    #[test]
    fn test_null_semantics() {
        let is_null = Condition::IsNull {
            column: col("subtitle", None),
            negated: false,
        };
        for data in [json!({}), json!({"subtitle": null}), json!({"subtitle": ""})] {
            assert_eq!(eval(&is_null, &doc(data)), Some(true));
        }
        assert_eq!(eval(&is_null, &doc(json!({"subtitle": "x"}))), Some(false));

        let published = Condition::IsNull {
            column: Column::system(SystemField::PublishedAt),
            negated: true,
        };
        assert_eq!(eval(&published, &doc(json!({}))), Some(false));
    }

    #[test]
    fn test_patterns() {
        let row = doc(json!({"title": "Rust 100% Guide"}));
        let ilike = Condition::Pattern {
            column: col("title", None),
            pattern: "%guide%".into(),
            case_insensitive: true,
        };
        assert_eq!(eval(&ilike, &row), Some(true));

        let like = Condition::Pattern {
            column: col("title", None),
            pattern: "rust%".into(),
            case_insensitive: false,
        };
        assert_eq!(eval(&like, &row), Some(false));

        let escaped = Condition::Pattern {
            column: col("title", None),
            pattern: "%100\\%%".into(),
            case_insensitive: false,
        };
        assert_eq!(eval(&escaped, &row), Some(true));
    }

    #[test]
    fn test_containment() {
        assert!(json_contains(&json!(["a", "b"]), &json!(["a"])));
        assert!(json_contains(&json!(["a", "b"]), &json!("b")));
        assert!(json_contains(&json!({"a": 1, "b": {"c": 2}}), &json!({"b": {"c": 2.0}})));
        assert!(!json_contains(&json!({"a": 1}), &json!({"a": 2})));
        assert!(!json_contains(&json!("a"), &json!(["a"])));
    }

    #[test]
    fn test_in_list_and_between() {
        let row = doc(json!({"views": 5}));
        let in_list = Condition::InList {
            column: col("views", Some(Cast::Integer)),
            values: vec![json!(1), json!("5")],
            negated: false,
        };
        assert_eq!(eval(&in_list, &row), Some(true));

        let empty = Condition::InList {
            column: col("views", None),
            values: vec![],
            negated: true,
        };
        assert_eq!(eval(&empty, &row), Some(true));

        let between = Condition::Between {
            column: col("views", Some(Cast::Integer)),
            low: json!(5),
            high: json!(10),
        };
        assert_eq!(eval(&between, &row), Some(true));
    }

    #[test]
    fn test_dates() {
        let row = doc(json!({"released": "2024-03-10"}));
        let after = Condition::compare(col("released", Some(Cast::Date)), CompareOp::Gt, json!("2024-03-01T12:00:00Z"));
        assert_eq!(eval(&after, &row), Some(true));
        assert!(parse_timestamp("2024-03-10T08:30:00+02:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_kleene_logic() {
        let row = doc(json!({"a": 1}));
        let unknown = Condition::compare(col("missing", None), CompareOp::Eq, json!("x"));
        let yes = Condition::compare(col("a", Some(Cast::Integer)), CompareOp::Eq, json!(1));
        let no = Condition::compare(col("a", Some(Cast::Integer)), CompareOp::Eq, json!(2));

        assert_eq!(eval(&Condition::Or(vec![unknown.clone(), yes.clone()]), &row), Some(true));
        assert_eq!(eval(&Condition::Or(vec![unknown.clone(), no.clone()]), &row), None);
        assert_eq!(eval(&Condition::And(vec![unknown.clone(), no]), &row), Some(false));
        assert_eq!(eval(&Condition::And(vec![unknown, yes]), &row), None);
    }

    #[test]
    fn test_text_rank_requires_every_term() {
        assert!(text_rank("Rust guide for rust users", "rust guide") > text_rank("Rust guide", "guide"));
        assert_eq!(text_rank("Rust guide", "rust python"), 0.0);
    }

    #[test]
    fn test_nulls_last_both_directions() {
        let one = Some(Typed::Number(1.0));
        assert_eq!(compare_nulls_last(None, one.as_ref(), false), Ordering::Greater);
        assert_eq!(compare_nulls_last(None, one.as_ref(), true), Ordering::Greater);
        assert_eq!(
            compare_nulls_last(one.as_ref(), Some(&Typed::Number(2.0)), true),
            Ordering::Greater
        );
    }
}

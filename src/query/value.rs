//! Tagged filter values
//!
//! Filter values arrive from two surface syntaxes (URL strings and JSON
//! bodies). Both are normalized into `FilterValue` so that the builder can
//! match on the variant instead of inspecting untyped JSON.
//!
//! Every conversion here is total: a value that cannot be represented in
//! the requested shape yields `None` (or an empty list), never a panic.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

/// A filter operand
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<FilterValue>),
    Object(Map<String, Value>),
}

impl FilterValue {
    /// Convert a JSON value into a filter value.
    ///
    /// Integers that fit in `i64` stay integral; every other number
    /// becomes a float.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => FilterValue::Null,
            Value::Bool(b) => FilterValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FilterValue::Int(i),
                None => FilterValue::Float(n.as_f64().unwrap_or(0.0)),
            },
            Value::String(s) => FilterValue::String(s.clone()),
            Value::Array(items) => FilterValue::Array(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => FilterValue::Object(map.clone()),
        }
    }

    /// Coerce a raw URL token.
    ///
    /// `"true"`/`"false"` become booleans, `"null"` and the empty string
    /// become `Null`, then integer and float parsing are attempted in that
    /// order. Anything else stays a string.
    pub fn coerce_str(raw: &str) -> Self {
        match raw {
            "true" => return FilterValue::Bool(true),
            "false" => return FilterValue::Bool(false),
            "null" | "" => return FilterValue::Null,
            _ => {}
        }
        if let Ok(i) = raw.parse::<i64>() {
            return FilterValue::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() {
                return FilterValue::Float(f);
            }
        }
        FilterValue::String(raw.to_string())
    }

    /// Convert back into JSON.
    pub fn to_json(&self) -> Value {
        match self {
            FilterValue::Null => Value::Null,
            FilterValue::Bool(b) => Value::Bool(*b),
            FilterValue::Int(i) => Value::Number((*i).into()),
            FilterValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            FilterValue::String(s) => Value::String(s.clone()),
            FilterValue::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            FilterValue::Object(map) => Value::Object(map.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FilterValue::Null)
    }

    /// Text representation, as a relational store would render the value
    /// when it is compared against extracted document text.
    ///
    /// Returns `None` for `Null`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            FilterValue::Null => None,
            FilterValue::Bool(b) => Some(b.to_string()),
            FilterValue::Int(i) => Some(i.to_string()),
            FilterValue::Float(f) => Some(format_float(*f)),
            FilterValue::String(s) => Some(s.clone()),
            FilterValue::Array(_) | FilterValue::Object(_) => Some(self.to_json().to_string()),
        }
    }

    /// Boolean interpretation.
    ///
    /// Accepts booleans, the strings `"true"`/`"false"`/`"1"`/`"0"`, and the
    /// integers 0 and 1.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FilterValue::Bool(b) => Some(*b),
            FilterValue::Int(0) => Some(false),
            FilterValue::Int(1) => Some(true),
            FilterValue::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Numeric interpretation; numeric strings are parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FilterValue::Int(i) => Some(*i as f64),
            FilterValue::Float(f) => Some(*f),
            FilterValue::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    /// Integer interpretation; floats are truncated, numeric strings parsed.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FilterValue::Int(i) => Some(*i),
            FilterValue::Float(f) => Some(f.trunc() as i64),
            FilterValue::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            }
            _ => None,
        }
    }

    /// List interpretation.
    ///
    /// Arrays yield their items, `Null` yields an empty list, and any other
    /// value is treated as a one-element list.
    pub fn to_list(&self) -> Vec<FilterValue> {
        match self {
            FilterValue::Array(items) => items.clone(),
            FilterValue::Null => Vec::new(),
            other => vec![other.clone()],
        }
    }

    /// Short type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FilterValue::Null => "null",
            FilterValue::Bool(_) => "boolean",
            FilterValue::Int(_) => "integer",
            FilterValue::Float(_) => "float",
            FilterValue::String(_) => "string",
            FilterValue::Array(_) => "array",
            FilterValue::Object(_) => "object",
        }
    }
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => write!(f, "{}", text),
            None => write!(f, "null"),
        }
    }
}

impl From<Value> for FilterValue {
    fn from(value: Value) -> Self {
        FilterValue::from_json(&value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::String(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::String(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Int(value)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Float(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl Serialize for FilterValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FilterValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(FilterValue::from_json(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_str() {
        assert_eq!(FilterValue::coerce_str("true"), FilterValue::Bool(true));
        assert_eq!(FilterValue::coerce_str("false"), FilterValue::Bool(false));
        assert_eq!(FilterValue::coerce_str("null"), FilterValue::Null);
        assert_eq!(FilterValue::coerce_str(""), FilterValue::Null);
        assert_eq!(FilterValue::coerce_str("100"), FilterValue::Int(100));
        assert_eq!(FilterValue::coerce_str("-3"), FilterValue::Int(-3));
        assert_eq!(FilterValue::coerce_str("9.5"), FilterValue::Float(9.5));
        assert_eq!(
            FilterValue::coerce_str("published"),
            FilterValue::String("published".into())
        );
        // Non-finite floats are not numbers for filtering purposes
        assert_eq!(FilterValue::coerce_str("inf"), FilterValue::String("inf".into()));
    }

    #[test]
    fn test_json_conversion_keeps_integers() {
        assert_eq!(FilterValue::from_json(&json!(7)), FilterValue::Int(7));
        assert_eq!(FilterValue::from_json(&json!(7.25)), FilterValue::Float(7.25));
        assert_eq!(FilterValue::Int(7).to_json(), json!(7));

        let nested = json!(["a", 1, null, {"k": true}]);
        assert_eq!(FilterValue::from_json(&nested).to_json(), nested);
    }

    #[test]
    fn test_as_text() {
        assert_eq!(FilterValue::Int(10).as_text().as_deref(), Some("10"));
        assert_eq!(FilterValue::Float(10.0).as_text().as_deref(), Some("10"));
        assert_eq!(FilterValue::Float(1.5).as_text().as_deref(), Some("1.5"));
        assert_eq!(FilterValue::Bool(true).as_text().as_deref(), Some("true"));
        assert_eq!(FilterValue::Null.as_text(), None);
    }

    #[test]
    fn test_as_bool_and_numbers() {
        assert_eq!(FilterValue::from("TRUE").as_bool(), Some(true));
        assert_eq!(FilterValue::Int(0).as_bool(), Some(false));
        assert_eq!(FilterValue::from("maybe").as_bool(), None);

        assert_eq!(FilterValue::from("12.5").as_f64(), Some(12.5));
        assert_eq!(FilterValue::from("12.9").as_i64(), Some(12));
        assert_eq!(FilterValue::Bool(true).as_f64(), None);
    }

    #[test]
    fn test_to_list() {
        assert_eq!(FilterValue::Null.to_list(), vec![]);
        assert_eq!(FilterValue::Int(1).to_list(), vec![FilterValue::Int(1)]);
        assert_eq!(
            FilterValue::Array(vec![FilterValue::Int(1), FilterValue::Int(2)]).to_list().len(),
            2
        );
    }

    #[test]
    fn test_serde_roundtrip() {
        let value: FilterValue = serde_json::from_value(json!({"a": [1, 2]})).unwrap();
        assert!(matches!(value, FilterValue::Object(_)));
        assert_eq!(serde_json::to_value(&value).unwrap(), json!({"a": [1, 2]}));
    }
}

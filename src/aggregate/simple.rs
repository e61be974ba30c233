//! Single-operator aggregate requests

use serde::Serialize;
use serde_json::Value;

use crate::parser::{ParseError, ParseResult};
use crate::query::{AggregateOperator, DateTrunc};

/// One aggregate over a content type, optionally grouped by one field.
///
/// ```json
/// { "operator": "count", "groupBy": "createdAt", "dateTrunc": "month" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleAggregate {
    pub operator: AggregateOperator,
    /// Required for every operator except `count`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
    /// Ignored unless the group key is a date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_trunc: Option<DateTrunc>,
}

impl SimpleAggregate {
    pub fn new(operator: AggregateOperator) -> Self {
        Self {
            operator,
            field: None,
            group_by: None,
            date_trunc: None,
        }
    }

    pub fn count() -> Self {
        Self::new(AggregateOperator::Count)
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.group_by = Some(field.into());
        self
    }

    pub fn with_date_trunc(mut self, trunc: DateTrunc) -> Self {
        self.date_trunc = Some(trunc);
        self
    }

    /// Output name of the aggregate value
    pub fn alias(&self) -> &'static str {
        self.operator.as_str()
    }

    /// Parses a request body. Unknown operators and granularities are
    /// parse errors.
    pub fn from_json(value: &Value) -> ParseResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| ParseError::InvalidJson("aggregate must be a JSON object".to_string()))?;

        let text = |keys: &[&str]| -> ParseResult<Option<String>> {
            for key in keys {
                match obj.get(*key) {
                    None | Some(Value::Null) => continue,
                    Some(Value::String(s)) if s.trim().is_empty() => continue,
                    Some(Value::String(s)) => return Ok(Some(s.trim().to_string())),
                    Some(_) => {
                        return Err(ParseError::InvalidPredicate(format!("'{}' must be a string", key)));
                    }
                }
            }
            Ok(None)
        };

        let operator = match text(&["operator", "op", "function"])? {
            Some(name) => AggregateOperator::parse(&name)
                .ok_or_else(|| ParseError::InvalidPredicate(format!("unknown aggregate operator '{}'", name)))?,
            None => AggregateOperator::Count,
        };
        let date_trunc = match text(&["dateTrunc", "date_trunc", "interval"])? {
            Some(name) => Some(
                DateTrunc::parse(&name)
                    .ok_or_else(|| ParseError::InvalidPredicate(format!("unknown date granularity '{}'", name)))?,
            ),
            None => None,
        };

        Ok(Self {
            operator,
            field: text(&["field"])?,
            group_by: text(&["groupBy", "group_by"])?,
            date_trunc,
        })
    }
}

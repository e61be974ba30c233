//! Store-native condition tree
//!
//! Conditions reference columns that are already resolved: either a fixed
//! system column or a path inside the document payload, optionally cast to
//! a declared type. Operands are plain JSON values.

use std::fmt;

use serde_json::Value;

use crate::query::SystemField;
use crate::schema::{FieldType, ResolvedField};

/// Type a document value is cast to before comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cast {
    Numeric,
    Integer,
    Boolean,
    Date,
    Timestamp,
}

impl Cast {
    /// Cast for a declared field type; text-like and structured types
    /// compare as raw text.
    pub fn for_type(field_type: FieldType) -> Option<Cast> {
        match field_type {
            FieldType::Float | FieldType::Decimal => Some(Cast::Numeric),
            FieldType::Integer | FieldType::BigInteger => Some(Cast::Integer),
            FieldType::Boolean => Some(Cast::Boolean),
            FieldType::Date => Some(Cast::Date),
            FieldType::DateTime => Some(Cast::Timestamp),
            _ => None,
        }
    }

    /// Implicit type of a system column
    pub fn for_system(field: SystemField) -> Option<Cast> {
        if field.is_date() {
            Some(Cast::Timestamp)
        } else if field == SystemField::Version {
            Some(Cast::Integer)
        } else {
            None
        }
    }

    pub fn sql_type(&self) -> &'static str {
        match self {
            Cast::Numeric => "numeric",
            Cast::Integer => "bigint",
            Cast::Boolean => "boolean",
            Cast::Date => "date",
            Cast::Timestamp => "timestamptz",
        }
    }
}

/// A resolved column reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Column {
    System { field: SystemField },
    Document { path: Vec<String>, cast: Option<Cast> },
    /// Output name of a grouped aggregate row (group key or alias)
    Output { name: String },
}

impl Column {
    pub fn system(field: SystemField) -> Self {
        Column::System { field }
    }

    /// Document column from a dot path
    pub fn document(path: &str, cast: Option<Cast>) -> Self {
        Column::Document {
            path: path.split('.').map(str::to_string).collect(),
            cast,
        }
    }

    pub fn output(name: impl Into<String>) -> Self {
        Column::Output { name: name.into() }
    }

    pub fn from_resolved(resolved: &ResolvedField) -> Self {
        match resolved {
            ResolvedField::System(field) => Column::system(*field),
            ResolvedField::Document { path, field_type } => {
                Column::document(path, field_type.and_then(Cast::for_type))
            }
        }
    }

    /// Effective cast, including the implicit type of system columns
    pub fn cast(&self) -> Option<Cast> {
        match self {
            Column::System { field } => Cast::for_system(*field),
            Column::Document { cast, .. } => *cast,
            Column::Output { .. } => None,
        }
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Column::Document { .. })
    }

    /// Name as used in query syntax
    pub fn name(&self) -> String {
        match self {
            Column::System { field } => field.name().to_string(),
            Column::Document { path, .. } => path.join("."),
            Column::Output { name } => name.clone(),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    pub fn sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }
}

/// A compiled predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        column: Column,
        op: CompareOp,
        value: Value,
    },
    /// LIKE / ILIKE with `%` and `_` wildcards and `\` escapes
    Pattern {
        column: Column,
        pattern: String,
        case_insensitive: bool,
    },
    InList {
        column: Column,
        values: Vec<Value>,
        negated: bool,
    },
    /// Document columns: missing, JSON null, or empty string.
    /// System columns: SQL NULL.
    IsNull { column: Column, negated: bool },
    /// Document columns: the path is present. System columns: not NULL.
    Exists { column: Column, negated: bool },
    /// JSON containment (`@>`)
    Contains { column: Column, value: Value },
    HasKey { column: Column, key: String },
    /// Inclusive range
    Between { column: Column, low: Value, high: Value },
    /// Every query term occurs in the text of `columns` (whole document when
    /// empty)
    FullText {
        columns: Vec<Column>,
        query: String,
        language: String,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn compare(column: Column, op: CompareOp, value: Value) -> Self {
        Condition::Compare { column, op, value }
    }

    /// Conjunction, collapsing trivial cases
    pub fn all(mut conditions: Vec<Condition>) -> Option<Condition> {
        match conditions.len() {
            0 => None,
            1 => conditions.pop(),
            _ => Some(Condition::And(conditions)),
        }
    }

    /// Disjunction, collapsing trivial cases
    pub fn any(mut conditions: Vec<Condition>) -> Option<Condition> {
        match conditions.len() {
            0 => None,
            1 => conditions.pop(),
            _ => Some(Condition::Or(conditions)),
        }
    }

    pub fn negate(condition: Condition) -> Condition {
        Condition::Not(Box::new(condition))
    }

    /// AND two optional conditions
    pub fn and_opt(left: Option<Condition>, right: Option<Condition>) -> Option<Condition> {
        match (left, right) {
            (Some(Condition::And(mut items)), Some(right)) => {
                items.push(right);
                Some(Condition::And(items))
            }
            (Some(left), Some(right)) => Some(Condition::And(vec![left, right])),
            (left, None) => left,
            (None, right) => right,
        }
    }
}

/// Connective joining one member of a group to what precedes it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Connective {
    And,
    Or,
}

/// Accumulates group members in order.
///
/// The first member is anchored with AND regardless of its connective;
/// later members join with their own.
#[derive(Debug, Default)]
pub(crate) struct ClauseAccumulator {
    clause: Option<Condition>,
}

impl ClauseAccumulator {
    pub(crate) fn push(&mut self, connective: Connective, condition: Condition) {
        self.clause = match (self.clause.take(), connective) {
            (None, _) => Some(condition),
            (Some(Condition::Or(mut items)), Connective::Or) => {
                items.push(condition);
                Some(Condition::Or(items))
            }
            (Some(acc), Connective::Or) => Some(Condition::Or(vec![acc, condition])),
            (Some(acc), Connective::And) => Condition::and_opt(Some(acc), Some(condition)),
        };
    }

    pub(crate) fn finish(self) -> Option<Condition> {
        self.clause
    }
}

/// Escape LIKE metacharacters in a literal
pub fn escape_like(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

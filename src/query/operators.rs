//! Operator catalog
//!
//! The closed set of filter operators, their canonical codes, accepted
//! aliases, expected value shapes, and the field categories they apply to.
//! The alias table is built once and never mutated.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "eq")]
    Eq,
    #[serde(rename = "ne")]
    Ne,
    #[serde(rename = "gt")]
    Gt,
    #[serde(rename = "gte")]
    Gte,
    #[serde(rename = "lt")]
    Lt,
    #[serde(rename = "lte")]
    Lte,
    /// Case-sensitive pattern, caller supplies wildcards
    #[serde(rename = "like")]
    Like,
    /// Case-insensitive pattern, caller supplies wildcards
    #[serde(rename = "ilike")]
    ILike,
    /// Case-insensitive substring
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "startsWith")]
    StartsWith,
    #[serde(rename = "endsWith")]
    EndsWith,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "nin")]
    NotIn,
    /// Array field contains every given value
    #[serde(rename = "all")]
    All,
    /// Array field contains at least one given value
    #[serde(rename = "any")]
    Any,
    #[serde(rename = "null")]
    Null,
    #[serde(rename = "exists")]
    Exists,
    #[serde(rename = "jsonContains")]
    JsonContains,
    #[serde(rename = "jsonHasKey")]
    JsonHasKey,
    /// Inclusive range over a two-element list
    #[serde(rename = "between")]
    Between,
}

/// Shape of the operand an operator expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueShape {
    /// A single scalar
    Scalar,
    /// A pattern string
    Pattern,
    /// A list of scalars
    List,
    /// Exactly two scalars
    Range,
    /// A boolean flag
    Flag,
    /// A JSON object or array
    Json,
    /// A key name
    Key,
}

/// Coarse field categories used for operator applicability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldCategory {
    Text,
    Numeric,
    Boolean,
    Date,
    Selection,
    Relation,
    Nested,
}

const ALL_CATEGORIES: &[FieldCategory] = &[
    FieldCategory::Text,
    FieldCategory::Numeric,
    FieldCategory::Boolean,
    FieldCategory::Date,
    FieldCategory::Selection,
    FieldCategory::Relation,
    FieldCategory::Nested,
];

const ORDERED: &[FieldCategory] = &[FieldCategory::Text, FieldCategory::Numeric, FieldCategory::Date];

const TEXTUAL: &[FieldCategory] = &[FieldCategory::Text, FieldCategory::Selection];

const MEMBERSHIP: &[FieldCategory] = &[
    FieldCategory::Text,
    FieldCategory::Numeric,
    FieldCategory::Date,
    FieldCategory::Selection,
    FieldCategory::Relation,
];

const COLLECTIONS: &[FieldCategory] = &[FieldCategory::Relation, FieldCategory::Nested, FieldCategory::Selection];

const NESTED: &[FieldCategory] = &[FieldCategory::Nested];

/// Canonical operators in declaration order
pub const OPERATORS: &[FilterOperator] = &[
    FilterOperator::Eq,
    FilterOperator::Ne,
    FilterOperator::Gt,
    FilterOperator::Gte,
    FilterOperator::Lt,
    FilterOperator::Lte,
    FilterOperator::Like,
    FilterOperator::ILike,
    FilterOperator::Contains,
    FilterOperator::StartsWith,
    FilterOperator::EndsWith,
    FilterOperator::In,
    FilterOperator::NotIn,
    FilterOperator::All,
    FilterOperator::Any,
    FilterOperator::Null,
    FilterOperator::Exists,
    FilterOperator::JsonContains,
    FilterOperator::JsonHasKey,
    FilterOperator::Between,
];

const ALIASES: &[(&str, FilterOperator)] = &[
    ("=", FilterOperator::Eq),
    ("==", FilterOperator::Eq),
    ("equals", FilterOperator::Eq),
    ("!=", FilterOperator::Ne),
    ("<>", FilterOperator::Ne),
    ("neq", FilterOperator::Ne),
    (">", FilterOperator::Gt),
    (">=", FilterOperator::Gte),
    ("<", FilterOperator::Lt),
    ("<=", FilterOperator::Lte),
    ("iLike", FilterOperator::ILike),
    ("icontains", FilterOperator::Contains),
    ("starts_with", FilterOperator::StartsWith),
    ("startswith", FilterOperator::StartsWith),
    ("ends_with", FilterOperator::EndsWith),
    ("endswith", FilterOperator::EndsWith),
    ("notIn", FilterOperator::NotIn),
    ("not_in", FilterOperator::NotIn),
    ("notin", FilterOperator::NotIn),
    ("containsAll", FilterOperator::All),
    ("containsAny", FilterOperator::Any),
    ("isNull", FilterOperator::Null),
    ("is_null", FilterOperator::Null),
    ("json_contains", FilterOperator::JsonContains),
    ("jsonHas", FilterOperator::JsonHasKey),
    ("json_has_key", FilterOperator::JsonHasKey),
    ("hasKey", FilterOperator::JsonHasKey),
    ("range", FilterOperator::Between),
];

fn registry() -> &'static HashMap<&'static str, FilterOperator> {
    static REGISTRY: OnceLock<HashMap<&'static str, FilterOperator>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map = HashMap::with_capacity(OPERATORS.len() + ALIASES.len());
        for op in OPERATORS {
            map.insert(op.code(), *op);
        }
        for (alias, op) in ALIASES {
            map.entry(*alias).or_insert(*op);
        }
        map
    })
}

/// Resolve an operator spelling.
///
/// The canonical code is tried first, then the alias table.
pub fn resolve_operator(s: &str) -> Option<FilterOperator> {
    registry().get(s).copied()
}

impl FilterOperator {
    /// Canonical code
    pub fn code(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Ne => "ne",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::Like => "like",
            FilterOperator::ILike => "ilike",
            FilterOperator::Contains => "contains",
            FilterOperator::StartsWith => "startsWith",
            FilterOperator::EndsWith => "endsWith",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "nin",
            FilterOperator::All => "all",
            FilterOperator::Any => "any",
            FilterOperator::Null => "null",
            FilterOperator::Exists => "exists",
            FilterOperator::JsonContains => "jsonContains",
            FilterOperator::JsonHasKey => "jsonHasKey",
            FilterOperator::Between => "between",
        }
    }

    /// Aliases that resolve to this operator
    pub fn aliases(&self) -> Vec<&'static str> {
        ALIASES
            .iter()
            .filter(|(_, op)| op == self)
            .map(|(alias, _)| *alias)
            .collect()
    }

    pub fn value_shape(&self) -> ValueShape {
        match self {
            FilterOperator::Eq
            | FilterOperator::Ne
            | FilterOperator::Gt
            | FilterOperator::Gte
            | FilterOperator::Lt
            | FilterOperator::Lte => ValueShape::Scalar,
            FilterOperator::Like
            | FilterOperator::ILike
            | FilterOperator::Contains
            | FilterOperator::StartsWith
            | FilterOperator::EndsWith => ValueShape::Pattern,
            FilterOperator::In | FilterOperator::NotIn | FilterOperator::All | FilterOperator::Any => {
                ValueShape::List
            }
            FilterOperator::Between => ValueShape::Range,
            FilterOperator::Null | FilterOperator::Exists => ValueShape::Flag,
            FilterOperator::JsonContains => ValueShape::Json,
            FilterOperator::JsonHasKey => ValueShape::Key,
        }
    }

    /// Whether URL values for this operator are split into lists
    pub fn takes_list(&self) -> bool {
        matches!(self.value_shape(), ValueShape::List | ValueShape::Range)
    }

    /// Field categories this operator is meaningful for
    pub fn categories(&self) -> &'static [FieldCategory] {
        match self {
            FilterOperator::Eq | FilterOperator::Ne | FilterOperator::Null | FilterOperator::Exists => {
                ALL_CATEGORIES
            }
            FilterOperator::Gt
            | FilterOperator::Gte
            | FilterOperator::Lt
            | FilterOperator::Lte
            | FilterOperator::Between => ORDERED,
            FilterOperator::Like
            | FilterOperator::ILike
            | FilterOperator::Contains
            | FilterOperator::StartsWith
            | FilterOperator::EndsWith => TEXTUAL,
            FilterOperator::In | FilterOperator::NotIn => MEMBERSHIP,
            FilterOperator::All | FilterOperator::Any => COLLECTIONS,
            FilterOperator::JsonContains | FilterOperator::JsonHasKey => NESTED,
        }
    }

    pub fn applies_to(&self, category: FieldCategory) -> bool {
        self.categories().contains(&category)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

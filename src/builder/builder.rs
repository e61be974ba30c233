//! Query builder
//!
//! Compiles a validated `Query` plus the field schema into a `StoreQuery`.
//!
//! Compilation rules:
//! - System fields become system columns; user fields become document
//!   paths with a cast derived from their declared type
//! - AND groups conjoin members; OR groups anchor their first member and
//!   OR the rest onto it; NOT groups negate their AND compilation
//! - An empty group, and `between` with fewer than two values, compile to
//!   no constraint at all
//! - Without an explicit sort, results are newest first by creation time

use serde_json::{json, Value};

use crate::query::{
    AggregateQuery, DateTrunc, FilterCondition, FilterGroup, FilterOperator, FilterValue, LogicalOperator, Query,
    SortField, SystemField, MAX_PAGE_SIZE,
};
use crate::schema::{FieldLocation, FieldSchema, ResolvedField, ValidationError, ValidationResult};
use crate::search::normalize_query;

use super::condition::{escape_like, ClauseAccumulator, Column, CompareOp, Condition, Connective};
use super::plan::{
    AggregateExpr, AggregatePlan, GroupKey, OrderTerm, OutputOrder, Projection, RankSpec, Scope, StoreQuery,
};

/// Default full-text configuration
pub const DEFAULT_SEARCH_LANGUAGE: &str = "english";

/// Compiles queries for one content type.
pub struct QueryBuilder<'a> {
    schema: &'a FieldSchema,
    scope: Scope,
    language: String,
    max_page_size: u64,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(schema: &'a FieldSchema, scope: Scope) -> Self {
        Self {
            schema,
            scope,
            language: DEFAULT_SEARCH_LANGUAGE.to_string(),
            max_page_size: MAX_PAGE_SIZE,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_max_page_size(mut self, max_page_size: u64) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Resolves a field name into a column.
    pub fn column(&self, field: &str, location: FieldLocation) -> ValidationResult<Column> {
        self.schema
            .resolve(field)
            .map(|resolved| Column::from_resolved(&resolved))
            .ok_or_else(|| ValidationError::unknown_field(field, location))
    }

    /// Compiles a filter tree; `None` means no constraint.
    pub fn compile_filters(&self, group: &FilterGroup) -> ValidationResult<Option<Condition>> {
        compile_group(group, &|field: &str| self.column(field, FieldLocation::Filter))
    }

    /// Filters plus the status and search shortcuts.
    pub fn where_clause(&self, query: &Query) -> ValidationResult<Option<Condition>> {
        let mut condition = match &query.filters {
            Some(group) => self.compile_filters(group)?,
            None => None,
        };

        if let Some(status) = query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let status = Condition::compare(Column::system(SystemField::Status), CompareOp::Eq, json!(status));
            condition = Condition::and_opt(condition, Some(status));
        }

        if let Some(text) = query.search.as_deref() {
            let normalized = normalize_query(text);
            if !normalized.is_empty() {
                condition = Condition::and_opt(condition, Some(self.full_text(&[], &normalized)));
            }
        }

        Ok(condition)
    }

    /// Full-text condition over `fields`, or the schema's searchable fields
    /// when none are given, or the whole document when there are none.
    pub fn full_text(&self, fields: &[String], normalized: &str) -> Condition {
        Condition::FullText {
            columns: self.search_columns(fields),
            query: normalized.to_string(),
            language: self.language.clone(),
        }
    }

    pub fn rank(&self, fields: &[String], normalized: &str) -> RankSpec {
        RankSpec {
            columns: self.search_columns(fields),
            query: normalized.to_string(),
            language: self.language.clone(),
        }
    }

    fn search_columns(&self, fields: &[String]) -> Vec<Column> {
        let names = if fields.is_empty() {
            self.schema.searchable_fields()
        } else {
            fields.to_vec()
        };
        names
            .iter()
            .filter_map(|name| match self.schema.resolve(name) {
                Some(ResolvedField::Document { path, .. }) => Some(Column::document(&path, None)),
                _ => None,
            })
            .collect()
    }

    /// Sort terms; newest first by creation time when none are given.
    pub fn order_terms(&self, sort: &[SortField]) -> ValidationResult<Vec<OrderTerm>> {
        if sort.is_empty() {
            return Ok(vec![OrderTerm::new(Column::system(SystemField::CreatedAt), true)]);
        }
        sort.iter()
            .map(|s| Ok(OrderTerm::new(self.column(&s.field, FieldLocation::Sort)?, s.descending)))
            .collect()
    }

    /// Projection for a `select` list.
    ///
    /// System columns are always returned. Document fields are projected by
    /// their top-level key only.
    pub fn projection(&self, select: &[String]) -> ValidationResult<Projection> {
        if select.is_empty() {
            return Ok(Projection::All);
        }
        let mut fields: Vec<String> = Vec::new();
        for name in select {
            if let Column::Document { path, .. } = self.column(name, FieldLocation::Select)? {
                if let Some(root) = path.first() {
                    if !fields.contains(root) {
                        fields.push(root.clone());
                    }
                }
            }
        }
        Ok(Projection::Fields(fields))
    }

    /// List query: condition, order, window, projection.
    pub fn build_list(&self, query: &Query) -> ValidationResult<StoreQuery> {
        let (offset, limit) = query.pagination.window(self.max_page_size);
        Ok(StoreQuery {
            scope: self.scope.clone(),
            condition: self.where_clause(query)?,
            order: self.order_terms(&query.sort)?,
            limit: Some(limit),
            offset,
            projection: self.projection(&query.select)?,
            rank: None,
        })
    }

    /// Count query: the list query's condition only.
    pub fn build_count(&self, query: &Query) -> ValidationResult<StoreQuery> {
        Ok(StoreQuery {
            scope: self.scope.clone(),
            condition: self.where_clause(query)?,
            ..Default::default()
        })
    }

    /// Group key; truncation applies only to date-ish fields.
    pub fn group_key(&self, field: &str, trunc: Option<DateTrunc>) -> ValidationResult<GroupKey> {
        let resolved = self
            .schema
            .resolve(field)
            .ok_or_else(|| ValidationError::unknown_field(field, FieldLocation::GroupBy))?;
        let trunc = trunc.filter(|_| resolved.is_date());
        Ok(GroupKey {
            name: field.to_string(),
            column: Column::from_resolved(&resolved),
            trunc,
        })
    }

    /// Grouped aggregate plan.
    pub fn build_aggregate(&self, query: &AggregateQuery) -> ValidationResult<AggregatePlan> {
        let group_by = query
            .group_by
            .iter()
            .map(|field| self.group_key(field, None))
            .collect::<ValidationResult<Vec<_>>>()?;

        let aggregates = query
            .aggregations
            .iter()
            .map(|agg| {
                let column = match &agg.field {
                    Some(field) => Some(self.column(field, FieldLocation::Aggregation)?),
                    None => None,
                };
                Ok(AggregateExpr {
                    alias: agg.alias.clone(),
                    function: agg.operator,
                    column,
                })
            })
            .collect::<ValidationResult<Vec<_>>>()?;

        let condition = match &query.filters {
            Some(group) => self.compile_filters(group)?,
            None => None,
        };

        let having = match &query.having {
            Some(group) => compile_group(group, &|name: &str| Ok(Column::output(name)))?,
            None => None,
        };

        Ok(AggregatePlan {
            scope: self.scope.clone(),
            condition,
            group_by,
            aggregates,
            having,
            order: query
                .sort
                .iter()
                .map(|s| OutputOrder {
                    name: s.field.clone(),
                    descending: s.descending,
                })
                .collect(),
            limit: query.limit,
        })
    }
}

/// Compiles a group with a caller-supplied field resolver.
pub(crate) fn compile_group<F>(group: &FilterGroup, resolve: &F) -> ValidationResult<Option<Condition>>
where
    F: Fn(&str) -> ValidationResult<Column>,
{
    let mut members = Vec::with_capacity(group.conditions.len() + group.groups.len());
    for condition in &group.conditions {
        if let Some(compiled) = compile_condition(condition, resolve)? {
            members.push(compiled);
        }
    }
    for sub in &group.groups {
        if let Some(compiled) = compile_group(sub, resolve)? {
            members.push(compiled);
        }
    }

    let compiled = match group.operator {
        LogicalOperator::And => Condition::all(members),
        LogicalOperator::Or => {
            let mut acc = ClauseAccumulator::default();
            for (i, member) in members.into_iter().enumerate() {
                let connective = if i == 0 { Connective::And } else { Connective::Or };
                acc.push(connective, member);
            }
            acc.finish()
        }
        LogicalOperator::Not => Condition::all(members).map(Condition::negate),
    };
    Ok(compiled)
}

/// Compiles one condition; `None` means the condition is a no-op.
pub(crate) fn compile_condition<F>(condition: &FilterCondition, resolve: &F) -> ValidationResult<Option<Condition>>
where
    F: Fn(&str) -> ValidationResult<Column>,
{
    let column = resolve(&condition.field)?;
    let value = &condition.value;

    let compiled = match condition.operator {
        FilterOperator::Eq if value.is_null() => Condition::IsNull { column, negated: false },
        FilterOperator::Ne if value.is_null() => Condition::IsNull { column, negated: true },
        FilterOperator::Eq => Condition::compare(column, CompareOp::Eq, value.to_json()),
        FilterOperator::Ne => Condition::compare(column, CompareOp::Ne, value.to_json()),
        FilterOperator::Gt => Condition::compare(column, CompareOp::Gt, value.to_json()),
        FilterOperator::Gte => Condition::compare(column, CompareOp::Gte, value.to_json()),
        FilterOperator::Lt => Condition::compare(column, CompareOp::Lt, value.to_json()),
        FilterOperator::Lte => Condition::compare(column, CompareOp::Lte, value.to_json()),
        FilterOperator::Like => pattern(column, text(value), false),
        FilterOperator::ILike => pattern(column, text(value), true),
        FilterOperator::Contains => pattern(column, format!("%{}%", escape_like(&text(value))), true),
        FilterOperator::StartsWith => pattern(column, format!("{}%", escape_like(&text(value))), false),
        FilterOperator::EndsWith => pattern(column, format!("%{}", escape_like(&text(value))), false),
        FilterOperator::In => Condition::InList {
            column,
            values: list(value),
            negated: false,
        },
        FilterOperator::NotIn => Condition::InList {
            column,
            values: list(value),
            negated: true,
        },
        FilterOperator::All => {
            return Ok(Condition::all(
                list(value)
                    .into_iter()
                    .map(|v| Condition::Contains {
                        column: column.clone(),
                        value: Value::Array(vec![v]),
                    })
                    .collect(),
            ))
        }
        FilterOperator::Any => {
            return Ok(Condition::any(
                list(value)
                    .into_iter()
                    .map(|v| Condition::Contains {
                        column: column.clone(),
                        value: Value::Array(vec![v]),
                    })
                    .collect(),
            ))
        }
        FilterOperator::Null => Condition::IsNull {
            column,
            negated: !value.as_bool().unwrap_or(true),
        },
        FilterOperator::Exists => Condition::Exists {
            column,
            negated: !value.as_bool().unwrap_or(true),
        },
        FilterOperator::JsonContains => Condition::Contains {
            column,
            value: value.to_json(),
        },
        FilterOperator::JsonHasKey => Condition::HasKey { column, key: text(value) },
        FilterOperator::Between => {
            let mut bounds = list(value).into_iter();
            match (bounds.next(), bounds.next()) {
                (Some(low), Some(high)) => Condition::Between { column, low, high },
                _ => return Ok(None),
            }
        }
    };
    Ok(Some(compiled))
}

fn pattern(column: Column, pattern: String, case_insensitive: bool) -> Condition {
    Condition::Pattern {
        column,
        pattern,
        case_insensitive,
    }
}

fn text(value: &FilterValue) -> String {
    value.as_text().unwrap_or_default()
}

fn list(value: &FilterValue) -> Vec<Value> {
    value.to_list().iter().map(FilterValue::to_json).collect()
}

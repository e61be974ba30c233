//! Query validation against a field schema
//!
//! Validation semantics:
//! - Every filter field, including inside nested groups, resolves to a
//!   declared field or a system field
//! - Every sort, select, and populate field resolves the same way
//! - The operand of each condition has the shape its operator expects
//!
//! The filter tree is walked depth-first (own conditions before sub-groups)
//! and the first violation is returned. Validation never mutates the query.

use std::collections::HashSet;

use crate::query::{AggregateQuery, FilterCondition, FilterGroup, FilterOperator, FilterValue, Query, ValueShape};

use super::errors::{FieldLocation, ValidationError, ValidationResult};
use super::types::{FieldSchema, ResolvedField};

/// Validates queries against one content type's field schema.
pub struct QueryValidator<'a> {
    schema: &'a FieldSchema,
}

impl<'a> QueryValidator<'a> {
    pub fn new(schema: &'a FieldSchema) -> Self {
        Self { schema }
    }

    /// Validates a list query.
    ///
    /// # Errors
    ///
    /// - `UnknownField` naming the first unresolvable field and where it was used
    /// - `InvalidOperator` when an operand does not fit its operator
    pub fn validate(&self, query: &Query) -> ValidationResult<()> {
        if let Some(filters) = &query.filters {
            self.validate_group(filters)?;
        }

        for sort in &query.sort {
            self.resolve(&sort.field, FieldLocation::Sort)?;
        }

        for field in &query.select {
            self.resolve(field, FieldLocation::Select)?;
        }

        // Nested populate options address the target type, not this one.
        for option in &query.populate {
            let root = option.path.split('.').next().unwrap_or_default();
            self.resolve(root, FieldLocation::Populate)?;
        }

        Ok(())
    }

    /// Validates a filter tree on its own.
    pub fn validate_group(&self, group: &FilterGroup) -> ValidationResult<()> {
        for condition in &group.conditions {
            self.validate_condition(condition)?;
        }
        for sub in &group.groups {
            self.validate_group(sub)?;
        }
        Ok(())
    }

    /// Validates a grouped aggregate query.
    ///
    /// `having` and `sort` may only reference group keys and aggregate
    /// aliases.
    pub fn validate_aggregate(&self, query: &AggregateQuery) -> ValidationResult<()> {
        for field in &query.group_by {
            self.resolve(field, FieldLocation::GroupBy)?;
        }

        let mut aliases = HashSet::new();
        for agg in &query.aggregations {
            match &agg.field {
                Some(field) => {
                    let resolved = self.resolve(field, FieldLocation::Aggregation)?;
                    if agg.operator.requires_numeric() && !resolved.is_numeric() {
                        return Err(ValidationError::InvalidAggregation {
                            alias: agg.alias.clone(),
                            reason: format!("'{}' requires a numeric field, '{}' is not", agg.operator, field),
                        });
                    }
                }
                None if agg.operator.requires_field() => {
                    return Err(ValidationError::InvalidAggregation {
                        alias: agg.alias.clone(),
                        reason: format!("'{}' requires a field", agg.operator),
                    });
                }
                None => {}
            }
            if !aliases.insert(agg.alias.as_str()) {
                return Err(ValidationError::InvalidAggregation {
                    alias: agg.alias.clone(),
                    reason: "duplicate alias".to_string(),
                });
            }
        }

        if let Some(filters) = &query.filters {
            self.validate_group(filters)?;
        }

        let output_names = |name: &str| aliases.contains(name) || query.group_by.iter().any(|g| g == name);

        if let Some(having) = &query.having {
            for condition in having.conditions_depth_first() {
                if !output_names(&condition.field) {
                    return Err(ValidationError::unknown_field(&condition.field, FieldLocation::Having));
                }
                check_operand(condition)?;
            }
        }

        for sort in &query.sort {
            if !output_names(&sort.field) {
                return Err(ValidationError::unknown_field(&sort.field, FieldLocation::Sort));
            }
        }

        Ok(())
    }

    /// Resolves a field name or fails with `UnknownField`.
    pub fn resolve(&self, field: &str, location: FieldLocation) -> ValidationResult<ResolvedField> {
        self.schema
            .resolve(field)
            .ok_or_else(|| ValidationError::unknown_field(field, location))
    }

    fn validate_condition(&self, condition: &FilterCondition) -> ValidationResult<()> {
        self.resolve(&condition.field, FieldLocation::Filter)?;
        check_operand(condition)
    }
}

/// Checks that a condition's operand has the shape its operator expects.
fn check_operand(condition: &FilterCondition) -> ValidationResult<()> {
    let op = condition.operator;
    let value = &condition.value;
    let reject = |reason: String| Err(ValidationError::invalid_operator(&condition.field, op.code(), reason));

    match op.value_shape() {
        ValueShape::Flag => {
            if value.as_bool().is_none() {
                return reject(format!("expects a boolean, got {}", value.type_name()));
            }
        }
        ValueShape::Json => {
            if !matches!(value, FilterValue::Object(_) | FilterValue::Array(_)) {
                return reject(format!("expects a JSON object or array, got {}", value.type_name()));
            }
        }
        ValueShape::Key => {
            if !matches!(value, FilterValue::String(_)) {
                return reject(format!("expects a key name, got {}", value.type_name()));
            }
        }
        ValueShape::Pattern => {
            if matches!(value, FilterValue::Null | FilterValue::Array(_) | FilterValue::Object(_)) {
                return reject(format!("expects a text pattern, got {}", value.type_name()));
            }
        }
        ValueShape::Scalar => {
            let ordering = matches!(
                op,
                FilterOperator::Gt | FilterOperator::Gte | FilterOperator::Lt | FilterOperator::Lte
            );
            if ordering && matches!(value, FilterValue::Null | FilterValue::Array(_) | FilterValue::Object(_)) {
                return reject(format!("expects a scalar, got {}", value.type_name()));
            }
        }
        // Lists accept a scalar as a one-element list; a short range is a no-op.
        ValueShape::List | ValueShape::Range => {
            if matches!(value, FilterValue::Object(_)) {
                return reject("expects a list of values, got object".to_string());
            }
        }
    }
    Ok(())
}

/// Validates `query` against `schema`.
pub fn validate(query: &Query, schema: &FieldSchema) -> ValidationResult<()> {
    QueryValidator::new(schema).validate(query)
}

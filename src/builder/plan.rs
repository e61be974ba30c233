//! Compiled store operations

use serde::{Deserialize, Serialize};

use crate::query::{AggregateOperator, DateTrunc};

use super::condition::{Column, Condition};

/// Collection a query runs against
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// `None` spans every content type of the tenant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl Scope {
    pub fn content_type(content_type: impl Into<String>) -> Self {
        Self {
            tenant_id: None,
            content_type: Some(content_type.into()),
        }
    }

    pub fn tenant(tenant_id: Option<String>) -> Self {
        Self {
            tenant_id,
            content_type: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: Option<String>) -> Self {
        self.tenant_id = tenant_id;
        self
    }
}

/// One ORDER BY term
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    pub column: Column,
    pub descending: bool,
    pub nulls_last: bool,
}

impl OrderTerm {
    pub fn new(column: Column, descending: bool) -> Self {
        Self {
            column,
            descending,
            nulls_last: true,
        }
    }
}

/// Which parts of a document to return
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Projection {
    #[default]
    All,
    /// System columns plus the named top-level document fields
    Fields(Vec<String>),
    /// System columns only
    SystemOnly,
}

/// Relevance ranking for full-text queries
#[derive(Debug, Clone, PartialEq)]
pub struct RankSpec {
    pub columns: Vec<Column>,
    pub query: String,
    pub language: String,
}

/// A compiled document query
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoreQuery {
    pub scope: Scope,
    pub condition: Option<Condition>,
    pub order: Vec<OrderTerm>,
    pub limit: Option<u64>,
    pub offset: u64,
    pub projection: Projection,
    /// When set, results are ordered by rank descending before `order`
    pub rank: Option<RankSpec>,
}

impl StoreQuery {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            ..Default::default()
        }
    }

    /// Same collection and condition, without ordering or window
    pub fn count_only(&self) -> Self {
        Self {
            scope: self.scope.clone(),
            condition: self.condition.clone(),
            ..Default::default()
        }
    }
}

/// One grouping key of an aggregate plan
#[derive(Debug, Clone, PartialEq)]
pub struct GroupKey {
    /// Output name in result rows
    pub name: String,
    pub column: Column,
    pub trunc: Option<DateTrunc>,
}

/// One aggregate expression of an aggregate plan
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    pub alias: String,
    pub function: AggregateOperator,
    /// `None` only for `count`, which counts rows
    pub column: Option<Column>,
}

/// Ordering over output names of aggregate rows
#[derive(Debug, Clone, PartialEq)]
pub struct OutputOrder {
    pub name: String,
    pub descending: bool,
}

/// A compiled grouped aggregate
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregatePlan {
    pub scope: Scope,
    pub condition: Option<Condition>,
    pub group_by: Vec<GroupKey>,
    pub aggregates: Vec<AggregateExpr>,
    /// Evaluated over result rows; columns are `Column::Output`
    pub having: Option<Condition>,
    pub order: Vec<OutputOrder>,
    pub limit: Option<u64>,
}

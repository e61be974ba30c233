//! Query AST
//!
//! The canonical representation both surface syntaxes parse into. Instances
//! are created per request, mutated only while parsing and validating, and
//! then handed immutably to the builder and executor.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::operators::FilterOperator;
use super::value::FilterValue;

/// First page number
pub const DEFAULT_PAGE: u64 = 1;

/// Page size when none is given
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Upper bound for page size
pub const MAX_PAGE_SIZE: u64 = 100;

/// How the members of a filter group combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
    /// Negation of the conjunction of the group's members
    Not,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOperator::And => write!(f, "AND"),
            LogicalOperator::Or => write!(f, "OR"),
            LogicalOperator::Not => write!(f, "NOT"),
        }
    }
}

/// A single `field <op> value` predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

impl FilterCondition {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<FilterValue>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Equality shorthand
    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::Eq, value)
    }
}

/// A recursive group of conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub operator: LogicalOperator,
    #[serde(default)]
    pub conditions: Vec<FilterCondition>,
    #[serde(default)]
    pub groups: Vec<FilterGroup>,
}

impl FilterGroup {
    pub fn new(operator: LogicalOperator) -> Self {
        Self {
            operator,
            conditions: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub fn and() -> Self {
        Self::new(LogicalOperator::And)
    }

    pub fn or() -> Self {
        Self::new(LogicalOperator::Or)
    }

    pub fn not() -> Self {
        Self::new(LogicalOperator::Not)
    }

    /// Builder-style condition append
    pub fn with_condition(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Builder-style sub-group append
    pub fn with_group(mut self, group: FilterGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn add_condition(&mut self, condition: FilterCondition) {
        self.conditions.push(condition);
    }

    pub fn add_group(&mut self, group: FilterGroup) {
        self.groups.push(group);
    }

    /// A group with no members contributes no constraint.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.groups.iter().all(FilterGroup::is_empty)
    }

    /// Total number of conditions, including nested groups
    pub fn condition_count(&self) -> usize {
        self.conditions.len() + self.groups.iter().map(FilterGroup::condition_count).sum::<usize>()
    }

    /// Conditions in depth-first order (own conditions before sub-groups)
    pub fn conditions_depth_first(&self) -> Vec<&FilterCondition> {
        let mut out = Vec::new();
        self.collect_conditions(&mut out);
        out
    }

    fn collect_conditions<'a>(&'a self, out: &mut Vec<&'a FilterCondition>) {
        out.extend(self.conditions.iter());
        for group in &self.groups {
            group.collect_conditions(out);
        }
    }
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    #[serde(default)]
    pub descending: bool,
}

impl SortField {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    /// Parse `-field`, `+field`, bare `field`, or `field:asc|desc`.
    ///
    /// Returns `None` for an empty token.
    pub fn parse_token(token: &str) -> Option<Self> {
        let token = token.trim();
        if let Some(rest) = token.strip_prefix('-') {
            return non_empty(rest).map(Self::desc);
        }
        if let Some(rest) = token.strip_prefix('+') {
            return non_empty(rest).map(Self::asc);
        }
        if let Some((field, direction)) = token.rsplit_once(':') {
            let descending = direction.trim().eq_ignore_ascii_case("desc");
            return non_empty(field).map(|f| Self {
                field: f.to_string(),
                descending,
            });
        }
        non_empty(token).map(Self::asc)
    }

    /// Render back to the `-field` / `field` token form
    pub fn to_token(&self) -> String {
        if self.descending {
            format!("-{}", self.field)
        } else {
            self.field.clone()
        }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// A relation to resolve on the returned documents
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PopulateOption {
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub select: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub populate: Vec<PopulateOption>,
}

impl PopulateOption {
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Nesting depth of this option (a leaf is depth 1)
    pub fn depth(&self) -> usize {
        1 + self.populate.iter().map(PopulateOption::depth).max().unwrap_or(0)
    }
}

/// Page window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub page_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            offset: None,
            limit: None,
        }
    }
}

impl Pagination {
    /// Set page and page size, applying the default and clamp rules.
    pub fn set_page(&mut self, page: u64, page_size: u64) {
        self.page = page.max(DEFAULT_PAGE);
        self.page_size = clamp_page_size(page_size, MAX_PAGE_SIZE);
    }

    /// True when offset/limit take precedence over page/pageSize
    pub fn uses_offset(&self) -> bool {
        self.offset.is_some() || self.limit.is_some()
    }

    /// Resolve to `(offset, limit)`, clamping the page size to `max_page_size`.
    pub fn window(&self, max_page_size: u64) -> (u64, u64) {
        if self.uses_offset() {
            let limit = clamp_page_size(self.limit.unwrap_or(DEFAULT_PAGE_SIZE), max_page_size);
            return (self.offset.unwrap_or(0), limit);
        }
        let size = clamp_page_size(self.page_size, max_page_size);
        let page = self.page.max(DEFAULT_PAGE);
        ((page - 1).saturating_mul(size), size)
    }

    /// Page number reported back with a result
    pub fn effective_page(&self, max_page_size: u64) -> u64 {
        let (offset, limit) = self.window(max_page_size);
        if self.uses_offset() {
            offset / limit + 1
        } else {
            self.page.max(DEFAULT_PAGE)
        }
    }
}

fn clamp_page_size(size: u64, max: u64) -> u64 {
    if size == 0 {
        DEFAULT_PAGE_SIZE.min(max.max(1))
    } else {
        size.min(max.max(1))
    }
}

/// A parsed list query
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<FilterGroup>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub select: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub populate: Vec<PopulateOption>,
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Query {
    /// Page 1, page size 20, no filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a condition to the root group, creating an AND root if needed.
    pub fn add_filter(&mut self, condition: FilterCondition) {
        self.filters.get_or_insert_with(FilterGroup::and).add_condition(condition);
    }

    /// Append a nested group to the root group.
    pub fn add_filter_group(&mut self, group: FilterGroup) {
        self.filters.get_or_insert_with(FilterGroup::and).add_group(group);
    }

    pub fn add_sort(&mut self, sort: SortField) {
        self.sort.push(sort);
    }

    pub fn set_page(&mut self, page: u64, page_size: u64) {
        self.pagination.set_page(page, page_size);
    }

    pub fn set_offset_limit(&mut self, offset: Option<u64>, limit: Option<u64>) {
        self.pagination.offset = offset;
        self.pagination.limit = limit;
    }

    /// True if the query carries any effective filter
    pub fn has_filters(&self) -> bool {
        self.filters.as_ref().map(|g| !g.is_empty()).unwrap_or(false)
            || self.status.is_some()
            || self.search.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
    }
}

/// Aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOperator {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateOperator::Count => "count",
            AggregateOperator::Sum => "sum",
            AggregateOperator::Avg => "avg",
            AggregateOperator::Min => "min",
            AggregateOperator::Max => "max",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "count" => Some(AggregateOperator::Count),
            "sum" => Some(AggregateOperator::Sum),
            "avg" | "average" => Some(AggregateOperator::Avg),
            "min" => Some(AggregateOperator::Min),
            "max" => Some(AggregateOperator::Max),
            _ => None,
        }
    }

    /// Only `count` may be computed without a field
    pub fn requires_field(&self) -> bool {
        !matches!(self, AggregateOperator::Count)
    }

    /// `sum` and `avg` only make sense over numbers
    pub fn requires_numeric(&self) -> bool {
        matches!(self, AggregateOperator::Sum | AggregateOperator::Avg)
    }
}

impl fmt::Display for AggregateOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Granularity for truncating date group keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateTrunc {
    Hour,
    #[default]
    Day,
    Week,
    Month,
    Year,
}

impl DateTrunc {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateTrunc::Hour => "hour",
            DateTrunc::Day => "day",
            DateTrunc::Week => "week",
            DateTrunc::Month => "month",
            DateTrunc::Year => "year",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hour" => Some(DateTrunc::Hour),
            "day" => Some(DateTrunc::Day),
            "week" => Some(DateTrunc::Week),
            "month" => Some(DateTrunc::Month),
            "year" => Some(DateTrunc::Year),
            _ => None,
        }
    }
}

/// One aggregate expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    pub operator: AggregateOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub alias: String,
}

impl Aggregation {
    pub fn new(operator: AggregateOperator, field: Option<&str>, alias: impl Into<String>) -> Self {
        Self {
            operator,
            field: field.map(str::to_string),
            alias: alias.into(),
        }
    }

    /// `count` with the conventional alias
    pub fn count() -> Self {
        Self::new(AggregateOperator::Count, None, "count")
    }
}

/// A grouped aggregate query
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateQuery {
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub aggregations: Vec<Aggregation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<FilterGroup>,
    /// Applied after grouping; fields name group keys or aggregate aliases
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub having: Option<FilterGroup>,
    #[serde(default)]
    pub sort: Vec<SortField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_query_defaults() {
        let query = Query::new();
        assert_eq!(query.pagination.page, 1);
        assert_eq!(query.pagination.page_size, 20);
        assert!(query.filters.is_none());
        assert!(!query.has_filters());
    }

    #[test]
    fn test_page_size_clamped() {
        let mut query = Query::new();
        query.set_page(0, 500);
        assert_eq!(query.pagination.page, 1);
        assert_eq!(query.pagination.page_size, 100);

        query.set_page(3, 0);
        assert_eq!(query.pagination.page_size, 20);
        assert_eq!(query.pagination.window(MAX_PAGE_SIZE), (40, 20));
    }

    #[test]
    fn test_offset_limit_precedence() {
        let mut query = Query::new();
        query.set_page(5, 10);
        query.set_offset_limit(Some(7), Some(3));
        assert_eq!(query.pagination.window(MAX_PAGE_SIZE), (7, 3));
        assert_eq!(query.pagination.effective_page(MAX_PAGE_SIZE), 3);

        query.set_offset_limit(Some(30), None);
        assert_eq!(query.pagination.window(MAX_PAGE_SIZE), (30, 20));
    }

    #[test]
    fn test_empty_group() {
        let group = FilterGroup::and().with_group(FilterGroup::or());
        assert!(group.is_empty());

        let group = FilterGroup::or().with_condition(FilterCondition::eq("a", 1i64));
        assert!(!group.is_empty());
    }

    #[test]
    fn test_add_filter_creates_and_root() {
        let mut query = Query::new();
        query.add_filter(FilterCondition::eq("status", "published"));
        query.add_filter(FilterCondition::new("price", FilterOperator::Gte, 100i64));

        let root = query.filters.as_ref().unwrap();
        assert_eq!(root.operator, LogicalOperator::And);
        assert_eq!(root.conditions.len(), 2);
    }

    #[test]
    fn test_conditions_depth_first() {
        let group = FilterGroup::and()
            .with_condition(FilterCondition::eq("a", 1i64))
            .with_group(FilterGroup::or().with_condition(FilterCondition::eq("b", 2i64)))
            .with_condition(FilterCondition::eq("c", 3i64));

        let fields: Vec<_> = group
            .conditions_depth_first()
            .into_iter()
            .map(|c| c.field.as_str())
            .collect();
        assert_eq!(fields, vec!["a", "c", "b"]);
        assert_eq!(group.condition_count(), 3);
    }

    #[test]
    fn test_sort_tokens() {
        assert_eq!(SortField::parse_token("-updatedAt"), Some(SortField::desc("updatedAt")));
        assert_eq!(SortField::parse_token("+title"), Some(SortField::asc("title")));
        assert_eq!(SortField::parse_token("title"), Some(SortField::asc("title")));
        assert_eq!(SortField::parse_token("price:desc"), Some(SortField::desc("price")));
        assert_eq!(SortField::parse_token("price:asc"), Some(SortField::asc("price")));
        assert_eq!(SortField::parse_token(" "), None);
        assert_eq!(SortField::parse_token("-"), None);
        assert_eq!(SortField::desc("a").to_token(), "-a");
    }

    #[test]
    fn test_populate_depth() {
        let option = PopulateOption {
            path: "author".into(),
            select: vec![],
            populate: vec![PopulateOption::path("company")],
        };
        assert_eq!(option.depth(), 2);
    }

    #[test]
    fn test_aggregate_operator_parse() {
        assert_eq!(AggregateOperator::parse("COUNT"), Some(AggregateOperator::Count));
        assert_eq!(AggregateOperator::parse("median"), None);
        assert!(!AggregateOperator::Count.requires_field());
        assert!(AggregateOperator::Sum.requires_field());
    }
}

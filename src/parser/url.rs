//! URL query parameter parser
//!
//! Grammar:
//!
//! - `filter[<field>]=<op>.<value>` (absent or unknown `<op>` means the whole
//!   value is compared for equality)
//! - `sort=-updatedAt,title`
//! - `page`, `pageSize` / `per_page`, `offset`, `limit`
//! - `select` / `fields`, `populate` / `include` (comma separated)
//! - `search` / `q`, `status`
//!
//! Unparseable numeric parameters are ignored and the defaults kept.

use std::collections::BTreeMap;

use crate::query::{
    resolve_operator, FilterCondition, FilterOperator, FilterValue, LogicalOperator, PopulateOption,
    Query, SortField, DEFAULT_PAGE, DEFAULT_PAGE_SIZE,
};

use super::errors::{ParseError, ParseResult};

/// Multi-valued query parameters, keyed in sorted order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlValues {
    values: BTreeMap<String, Vec<String>>,
}

impl UrlValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from decoded key/value pairs, keeping repeated keys
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut values = Self::new();
        for (k, v) in pairs {
            values.add(k, v);
        }
        values
    }

    /// Decode a raw `a=1&b=2` query string
    pub fn parse(raw: &str) -> ParseResult<Self> {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_str(raw).map_err(|e| ParseError::InvalidQueryString(e.to_string()))?;
        Ok(Self::from_pairs(pairs))
    }

    /// Encode back to a query string
    pub fn encode(&self) -> String {
        let pairs: Vec<(&str, &str)> = self
            .values
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
            .collect();
        serde_urlencoded::to_string(pairs).unwrap_or_default()
    }

    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.entry(key.into()).or_default().push(value.into());
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), vec![value.into()]);
    }

    /// First value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|vs| vs.first()).map(String::as_str)
    }

    /// All values for `key`
    pub fn get_all(&self, key: &str) -> &[String] {
        self.values.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Parse URL values into a `Query`.
pub fn parse_url_values(values: &UrlValues) -> ParseResult<Query> {
    let mut query = Query::new();

    for (key, raw_values) in values.iter() {
        if let Some(field) = filter_field(key) {
            for raw in raw_values {
                query.add_filter(parse_filter(field, raw));
            }
        }
    }

    for raw in values.get_all("sort") {
        query.sort.extend(raw.split(',').filter_map(SortField::parse_token));
    }

    let page = first_number(values, &["page"]);
    let page_size = first_number(values, &["pageSize", "per_page"]);
    if page.is_some() || page_size.is_some() {
        query.set_page(page.unwrap_or(DEFAULT_PAGE), page_size.unwrap_or(DEFAULT_PAGE_SIZE));
    }
    query.set_offset_limit(first_number(values, &["offset"]), first_number(values, &["limit"]));

    for key in ["select", "fields"] {
        for raw in values.get_all(key) {
            query.select.extend(split_list(raw));
        }
    }

    for key in ["populate", "include"] {
        for raw in values.get_all(key) {
            query.populate.extend(split_list(raw).into_iter().map(PopulateOption::path));
        }
    }

    query.search = ["search", "q"]
        .iter()
        .filter_map(|k| values.get(k))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string);

    query.status = values.get("status").map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

    Ok(query)
}

/// Decode and parse a raw query string.
pub fn parse_query_string(raw: &str) -> ParseResult<Query> {
    parse_url_values(&UrlValues::parse(raw)?)
}

/// Serialize a query back into URL values.
///
/// Conditions of the root group are written as `filter[field]=op.value`.
/// Nested groups and non-AND roots have no URL spelling and are omitted.
pub fn to_url_values(query: &Query) -> UrlValues {
    let mut values = UrlValues::new();

    if let Some(root) = &query.filters {
        if root.operator == LogicalOperator::And {
            for condition in &root.conditions {
                values.add(format!("filter[{}]", condition.field), format_filter(condition));
            }
        }
    }

    if !query.sort.is_empty() {
        let tokens: Vec<String> = query.sort.iter().map(SortField::to_token).collect();
        values.set("sort", tokens.join(","));
    }

    let pagination = &query.pagination;
    if pagination.uses_offset() {
        if let Some(offset) = pagination.offset {
            values.set("offset", offset.to_string());
        }
        if let Some(limit) = pagination.limit {
            values.set("limit", limit.to_string());
        }
    } else {
        values.set("page", pagination.page.to_string());
        values.set("pageSize", pagination.page_size.to_string());
    }

    if !query.select.is_empty() {
        values.set("select", query.select.join(","));
    }
    if !query.populate.is_empty() {
        let mut paths = Vec::new();
        for option in &query.populate {
            flatten_populate("", option, &mut paths);
        }
        values.set("populate", paths.join(","));
    }
    if let Some(search) = &query.search {
        values.set("search", search.clone());
    }
    if let Some(status) = &query.status {
        values.set("status", status.clone());
    }

    values
}

fn filter_field(key: &str) -> Option<&str> {
    key.strip_prefix("filter[")
        .and_then(|rest| rest.strip_suffix(']'))
        .map(str::trim)
        .filter(|f| !f.is_empty())
}

fn parse_filter(field: &str, raw: &str) -> FilterCondition {
    let (operator, operand) = match raw.split_once('.') {
        Some((prefix, rest)) => match resolve_operator(prefix) {
            Some(op) => (op, rest),
            None => (FilterOperator::Eq, raw),
        },
        None => (FilterOperator::Eq, raw),
    };

    let value = if operator.takes_list() {
        FilterValue::Array(parse_list(operand))
    } else {
        FilterValue::coerce_str(operand)
    };

    FilterCondition::new(field, operator, value)
}

fn parse_list(raw: &str) -> Vec<FilterValue> {
    let raw = raw.trim();
    let inner = raw
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .or_else(|| raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')))
        .unwrap_or(raw);
    if inner.trim().is_empty() {
        return Vec::new();
    }
    inner.split(',').map(|item| FilterValue::coerce_str(item.trim())).collect()
}

fn format_filter(condition: &FilterCondition) -> String {
    let operand = match &condition.value {
        FilterValue::Array(items) => {
            let parts: Vec<String> = items.iter().map(FilterValue::to_string).collect();
            format!("({})", parts.join(","))
        }
        other => other.to_string(),
    };
    format!("{}.{}", condition.operator.code(), operand)
}

fn flatten_populate(prefix: &str, option: &PopulateOption, out: &mut Vec<String>) {
    let path = if prefix.is_empty() {
        option.path.clone()
    } else {
        format!("{}.{}", prefix, option.path)
    };
    if option.populate.is_empty() {
        out.push(path);
    } else {
        for child in &option.populate {
            flatten_populate(&path, child, out);
        }
    }
}

fn first_number(values: &UrlValues, keys: &[&str]) -> Option<u64> {
    keys.iter()
        .filter_map(|k| values.get(k))
        .find_map(|raw| raw.trim().parse::<u64>().ok())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> UrlValues {
        UrlValues::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_implicit_equality() {
        let query = parse_url_values(&values(&[("filter[status]", "published")])).unwrap();
        let root = query.filters.unwrap();
        assert_eq!(root.conditions.len(), 1);
        let cond = &root.conditions[0];
        assert_eq!(cond.field, "status");
        assert_eq!(cond.operator, FilterOperator::Eq);
        assert_eq!(cond.value, FilterValue::String("published".into()));
    }

    #[test]
    fn test_operator_prefix() {
        let query = parse_url_values(&values(&[("filter[price]", "gte.100")])).unwrap();
        let cond = &query.filters.unwrap().conditions[0];
        assert_eq!(cond.operator, FilterOperator::Gte);
        assert_eq!(cond.value, FilterValue::Int(100));
    }

    #[test]
    fn test_alias_prefix() {
        let query = parse_url_values(&values(&[("filter[price]", ">=.9.5")])).unwrap();
        let cond = &query.filters.unwrap().conditions[0];
        assert_eq!(cond.operator, FilterOperator::Gte);
        assert_eq!(cond.value, FilterValue::Float(9.5));
    }

    #[test]
    fn test_unknown_prefix_keeps_whole_value() {
        let query = parse_url_values(&values(&[("filter[email]", "john.doe@example.com")])).unwrap();
        let cond = &query.filters.unwrap().conditions[0];
        assert_eq!(cond.operator, FilterOperator::Eq);
        assert_eq!(cond.value, FilterValue::String("john.doe@example.com".into()));

        let query = parse_url_values(&values(&[("filter[ratio]", "3.14")])).unwrap();
        assert_eq!(query.filters.unwrap().conditions[0].value, FilterValue::Float(3.14));
    }

    #[test]
    fn test_list_values() {
        let query = parse_url_values(&values(&[
            ("filter[category]", "in.(news,blog,1)"),
            ("filter[tags]", "all.[a,b]"),
        ]))
        .unwrap();
        let root = query.filters.unwrap();
        let category = root.conditions.iter().find(|c| c.field == "category").unwrap();
        assert_eq!(category.operator, FilterOperator::In);
        assert_eq!(
            category.value,
            FilterValue::Array(vec!["news".into(), "blog".into(), FilterValue::Int(1)])
        );
        let tags = root.conditions.iter().find(|c| c.field == "tags").unwrap();
        assert_eq!(tags.operator, FilterOperator::All);
        assert_eq!(tags.value.to_list().len(), 2);
    }

    #[test]
    fn test_null_and_boolean_coercion() {
        let query = parse_url_values(&values(&[
            ("filter[deletedAt]", "null.true"),
            ("filter[featured]", "true"),
            ("filter[subtitle]", ""),
        ]))
        .unwrap();
        let root = query.filters.unwrap();
        let by_field = |f: &str| root.conditions.iter().find(|c| c.field == f).unwrap().clone();
        assert_eq!(by_field("deletedAt").operator, FilterOperator::Null);
        assert_eq!(by_field("deletedAt").value, FilterValue::Bool(true));
        assert_eq!(by_field("featured").value, FilterValue::Bool(true));
        assert_eq!(by_field("subtitle").value, FilterValue::Null);
    }

    #[test]
    fn test_sort_order_preserved() {
        let query = parse_url_values(&values(&[("sort", "-updatedAt,title")])).unwrap();
        assert_eq!(query.sort, vec![SortField::desc("updatedAt"), SortField::asc("title")]);
    }

    #[test]
    fn test_pagination_aliases() {
        let query = parse_url_values(&values(&[("page", "3"), ("per_page", "500")])).unwrap();
        assert_eq!(query.pagination.page, 3);
        assert_eq!(query.pagination.page_size, 100);

        let query = parse_url_values(&values(&[("page", "abc"), ("pageSize", "x")])).unwrap();
        assert_eq!(query.pagination.page, 1);
        assert_eq!(query.pagination.page_size, 20);

        let query = parse_url_values(&values(&[("offset", "40"), ("limit", "10")])).unwrap();
        assert_eq!(query.pagination.offset, Some(40));
        assert_eq!(query.pagination.limit, Some(10));
    }

    #[test]
    fn test_projection_population_search_status() {
        let query = parse_url_values(&values(&[
            ("fields", "title, slug"),
            ("include", "author,author.company"),
            ("q", "  rust  "),
            ("status", "draft"),
        ]))
        .unwrap();
        assert_eq!(query.select, vec!["title", "slug"]);
        assert_eq!(
            query.populate,
            vec![PopulateOption::path("author"), PopulateOption::path("author.company")]
        );
        assert_eq!(query.search.as_deref(), Some("rust"));
        assert_eq!(query.status.as_deref(), Some("draft"));
    }

    #[test]
    fn test_repeated_filter_key() {
        let query = parse_query_string("filter[price]=gte.10&filter[price]=lte.100").unwrap();
        let root = query.filters.unwrap();
        assert_eq!(root.conditions.len(), 2);
    }

    #[test]
    fn test_query_string_decoding() {
        let query = parse_query_string("?filter%5Btitle%5D=contains.hello%20world&sort=-createdAt").unwrap();
        let cond = &query.filters.unwrap().conditions[0];
        assert_eq!(cond.field, "title");
        assert_eq!(cond.operator, FilterOperator::Contains);
        assert_eq!(cond.value, FilterValue::String("hello world".into()));
    }

    #[test]
    fn test_round_trip_common_subset() {
        let original = values(&[
            ("filter[category]", "in.(news,blog)"),
            ("filter[price]", "gte.100"),
            ("filter[status]", "eq.published"),
            ("page", "2"),
            ("pageSize", "10"),
            ("sort", "-updatedAt,title"),
        ]);
        let query = parse_url_values(&original).unwrap();
        let encoded = to_url_values(&query);
        assert_eq!(encoded, original);
        assert_eq!(parse_url_values(&encoded).unwrap(), query);
    }

    #[test]
    fn test_round_trip_implicit_equality() {
        let query = parse_url_values(&values(&[("filter[status]", "published")])).unwrap();
        let encoded = to_url_values(&query);
        assert_eq!(encoded.get("filter[status]"), Some("eq.published"));
        assert_eq!(parse_url_values(&encoded).unwrap(), query);
    }

    #[test]
    fn test_encode_decode() {
        let mut values = UrlValues::new();
        values.add("filter[title]", "contains.a&b");
        let decoded = UrlValues::parse(&values.encode()).unwrap();
        assert_eq!(decoded, values);
    }
}

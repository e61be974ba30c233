//! JSON query parser
//!
//! Accepts a JSON object with a MongoDB-like predicate syntax:
//!
//! ```text
//! {
//!   "filter": { "price": { "$gte": 10, "$lte": 100 },
//!               "$or": [ { "category": "news" }, { "category": "blog" } ] },
//!   "sort": "-createdAt",
//!   "select": ["title"],
//!   "populate": [{ "path": "author", "select": ["name"] }],
//!   "page": 2, "pageSize": 10
//! }
//! ```
//!
//! The predicate tree is read from the first non-null of `filters`,
//! `filter`, and `where`.

use serde_json::{Map, Value};

use crate::query::{
    resolve_operator, AggregateOperator, AggregateQuery, Aggregation, FilterCondition, FilterGroup, FilterValue,
    LogicalOperator, PopulateOption, Query, SortField, DEFAULT_PAGE, DEFAULT_PAGE_SIZE,
};

use super::errors::{ParseError, ParseResult};

/// Parse a JSON request body.
pub fn parse_json(body: &str) -> ParseResult<Query> {
    let value: Value = serde_json::from_str(body)?;
    parse_json_value(&value)
}

/// Parse an already-decoded JSON document.
pub fn parse_json_value(value: &Value) -> ParseResult<Query> {
    let obj = value
        .as_object()
        .ok_or_else(|| ParseError::InvalidJson("query must be a JSON object".to_string()))?;

    let mut query = Query::new();

    if let Some(filters) = first_present(obj, &["filters", "filter", "where"]) {
        let group = parse_filters(filters)?;
        if !group.is_empty() {
            query.filters = Some(group);
        }
    }

    if let Some(sort) = first_present(obj, &["sort"]) {
        query.sort = parse_sort(sort)?;
    }

    if let Some(select) = first_present(obj, &["select", "fields"]) {
        query.select = parse_string_list(select, "select")?;
    }

    if let Some(populate) = first_present(obj, &["populate", "include"]) {
        query.populate = parse_populate(populate)?;
    }

    let page = first_number(obj, &["page"]);
    let page_size = first_number(obj, &["pageSize", "perPage", "per_page"]);
    if page.is_some() || page_size.is_some() {
        query.set_page(page.unwrap_or(DEFAULT_PAGE), page_size.unwrap_or(DEFAULT_PAGE_SIZE));
    }
    query.set_offset_limit(first_number(obj, &["offset"]), first_number(obj, &["limit"]));

    query.search = first_string(obj, &["search", "q"]);
    query.status = first_string(obj, &["status"]);

    Ok(query)
}

/// Parse a predicate tree (object, or array read as implicit `$and`).
pub fn parse_filters(value: &Value) -> ParseResult<FilterGroup> {
    let mut root = FilterGroup::and();
    match value {
        Value::Object(obj) => parse_predicate(obj, &mut root)?,
        Value::Array(items) => {
            for item in items {
                let obj = item.as_object().ok_or_else(|| {
                    ParseError::InvalidPredicate("filter array elements must be objects".to_string())
                })?;
                parse_predicate(obj, &mut root)?;
            }
        }
        Value::Null => {}
        other => {
            return Err(ParseError::InvalidPredicate(format!(
                "filters must be an object or array, got {}",
                json_type_name(other)
            )))
        }
    }
    Ok(root)
}

/// Parse an aggregate query body.
///
/// `filters` and `having` use the predicate grammar; `aggregations` is a
/// list of `{operator, field, alias}` objects.
pub fn parse_aggregate_json(value: &Value) -> ParseResult<AggregateQuery> {
    let obj = value
        .as_object()
        .ok_or_else(|| ParseError::InvalidJson("aggregate query must be a JSON object".to_string()))?;

    let mut query = AggregateQuery::default();

    if let Some(group_by) = first_present(obj, &["groupBy", "group_by"]) {
        query.group_by = parse_string_list(group_by, "groupBy")?;
    }

    if let Some(aggs) = first_present(obj, &["aggregations", "aggregates"]) {
        let items = aggs
            .as_array()
            .ok_or_else(|| ParseError::InvalidPredicate("aggregations must be an array".to_string()))?;
        for item in items {
            query.aggregations.push(parse_aggregation(item)?);
        }
    }
    if query.aggregations.is_empty() {
        query.aggregations.push(Aggregation::count());
    }

    if let Some(filters) = first_present(obj, &["filters", "filter", "where"]) {
        query.filters = Some(parse_filters(filters)?).filter(|g| !g.is_empty());
    }
    if let Some(having) = first_present(obj, &["having"]) {
        query.having = Some(parse_filters(having)?).filter(|g| !g.is_empty());
    }
    if let Some(sort) = first_present(obj, &["sort"]) {
        query.sort = parse_sort(sort)?;
    }
    query.limit = first_number(obj, &["limit"]);

    Ok(query)
}

fn parse_aggregation(value: &Value) -> ParseResult<Aggregation> {
    let obj = value
        .as_object()
        .ok_or_else(|| ParseError::InvalidPredicate("aggregation must be an object".to_string()))?;
    let op_name = first_string(obj, &["operator", "op", "function"])
        .ok_or_else(|| ParseError::InvalidPredicate("aggregation requires an operator".to_string()))?;
    let operator = AggregateOperator::parse(&op_name)
        .ok_or_else(|| ParseError::InvalidPredicate(format!("unknown aggregate operator '{}'", op_name)))?;
    let field = first_string(obj, &["field"]);
    let alias = first_string(obj, &["alias", "as"]).unwrap_or_else(|| match &field {
        Some(f) => format!("{}_{}", operator.as_str(), f),
        None => operator.as_str().to_string(),
    });
    Ok(Aggregation {
        operator,
        field,
        alias,
    })
}

#[derive(Clone, Copy)]
enum LogicalKey {
    And,
    Or,
    Not,
}

fn logical_key(key: &str) -> Option<LogicalKey> {
    match key {
        "$and" | "and" | "AND" => Some(LogicalKey::And),
        "$or" | "or" | "OR" => Some(LogicalKey::Or),
        "$not" | "not" | "NOT" => Some(LogicalKey::Not),
        _ => None,
    }
}

/// Add the members of one predicate object to `group`.
fn parse_predicate(obj: &Map<String, Value>, group: &mut FilterGroup) -> ParseResult<()> {
    for (key, value) in obj {
        match logical_key(key) {
            Some(LogicalKey::And) => {
                let items = value.as_array().ok_or_else(|| ParseError::group_expects_array(key))?;
                let mut sub = FilterGroup::and();
                for item in items {
                    let item_obj = item.as_object().ok_or_else(|| ParseError::group_expects_array(key))?;
                    parse_predicate(item_obj, &mut sub)?;
                }
                if group.operator == LogicalOperator::And {
                    group.conditions.append(&mut sub.conditions);
                    group.groups.append(&mut sub.groups);
                } else if !sub.is_empty() {
                    group.add_group(sub);
                }
            }
            Some(LogicalKey::Or) => {
                let items = value.as_array().ok_or_else(|| ParseError::group_expects_array(key))?;
                let mut sub = FilterGroup::or();
                for item in items {
                    let item_obj = item.as_object().ok_or_else(|| ParseError::group_expects_array(key))?;
                    let mut member = FilterGroup::and();
                    parse_predicate(item_obj, &mut member)?;
                    push_or_member(&mut sub, member);
                }
                if !sub.is_empty() {
                    group.add_group(sub);
                }
            }
            Some(LogicalKey::Not) => {
                let inner = value.as_object().ok_or_else(|| ParseError::group_expects_object(key))?;
                let mut sub = FilterGroup::not();
                parse_predicate(inner, &mut sub)?;
                if !sub.is_empty() {
                    group.add_group(sub);
                }
            }
            None => parse_field(key, value, group)?,
        }
    }
    Ok(())
}

/// A single-condition member joins the OR group directly; anything larger
/// stays a conjunction nested inside it.
fn push_or_member(or_group: &mut FilterGroup, mut member: FilterGroup) {
    if member.conditions.len() == 1 && member.groups.is_empty() {
        if let Some(condition) = member.conditions.pop() {
            or_group.add_condition(condition);
        }
    } else if member.conditions.is_empty() && member.groups.len() == 1 {
        if let Some(inner) = member.groups.pop() {
            or_group.add_group(inner);
        }
    } else if !member.is_empty() {
        or_group.add_group(member);
    }
}

fn parse_field(field: &str, value: &Value, group: &mut FilterGroup) -> ParseResult<()> {
    if field.starts_with('$') {
        return Err(ParseError::UnknownOperator {
            field: String::new(),
            operator: field.to_string(),
        });
    }

    let ops = match value {
        Value::Object(map) if map.keys().any(|k| k.starts_with('$')) => map,
        _ => {
            group.add_condition(FilterCondition::eq(field, FilterValue::from_json(value)));
            return Ok(());
        }
    };

    for (op_key, operand) in ops {
        let name = op_key.strip_prefix('$').ok_or_else(|| {
            ParseError::InvalidPredicate(format!(
                "field '{}' mixes operator keys with plain key '{}'",
                field, op_key
            ))
        })?;
        let operator = resolve_operator(name).ok_or_else(|| ParseError::UnknownOperator {
            field: field.to_string(),
            operator: op_key.clone(),
        })?;
        group.add_condition(FilterCondition::new(field, operator, FilterValue::from_json(operand)));
    }
    Ok(())
}

/// Parse the `sort` value in any of its accepted shapes.
pub fn parse_sort(value: &Value) -> ParseResult<Vec<SortField>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(s.split(',').filter_map(SortField::parse_token).collect()),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => out.extend(s.split(',').filter_map(SortField::parse_token)),
                    Value::Object(obj) => {
                        let field = first_string(obj, &["field"])
                            .ok_or_else(|| ParseError::InvalidSort("sort object requires 'field'".to_string()))?;
                        let descending = match first_present(obj, &["order", "direction"]) {
                            Some(dir) => direction_is_desc(dir)?,
                            None => false,
                        };
                        out.push(SortField { field, descending });
                    }
                    other => {
                        return Err(ParseError::InvalidSort(format!(
                            "unexpected {} in sort list",
                            json_type_name(other)
                        )))
                    }
                }
            }
            Ok(out)
        }
        Value::Object(obj) => {
            let mut out = Vec::with_capacity(obj.len());
            for (field, dir) in obj {
                out.push(SortField {
                    field: field.clone(),
                    descending: direction_is_desc(dir)?,
                });
            }
            Ok(out)
        }
        other => Err(ParseError::InvalidSort(format!(
            "sort must be a string, array, or object, got {}",
            json_type_name(other)
        ))),
    }
}

fn direction_is_desc(value: &Value) -> ParseResult<bool> {
    match value {
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" | "1" => Ok(false),
            "desc" | "descending" | "-1" => Ok(true),
            other => Err(ParseError::InvalidSort(format!("unknown direction '{}'", other))),
        },
        Value::Number(n) => match n.as_i64() {
            Some(1) => Ok(false),
            Some(-1) => Ok(true),
            _ => Err(ParseError::InvalidSort(format!("direction must be 1 or -1, got {}", n))),
        },
        other => Err(ParseError::InvalidSort(format!(
            "direction must be a string or number, got {}",
            json_type_name(other)
        ))),
    }
}

/// Parse `populate` in any of its accepted shapes.
pub fn parse_populate(value: &Value) -> ParseResult<Vec<PopulateOption>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(split_list(s).into_iter().map(PopulateOption::path).collect()),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => out.extend(split_list(s).into_iter().map(PopulateOption::path)),
                    Value::Object(obj) => out.push(parse_populate_object(obj)?),
                    other => {
                        return Err(ParseError::InvalidPopulate(format!(
                            "unexpected {} in populate list",
                            json_type_name(other)
                        )))
                    }
                }
            }
            Ok(out)
        }
        Value::Object(obj) => Ok(vec![parse_populate_object(obj)?]),
        other => Err(ParseError::InvalidPopulate(format!(
            "populate must be a string, array, or object, got {}",
            json_type_name(other)
        ))),
    }
}

fn parse_populate_object(obj: &Map<String, Value>) -> ParseResult<PopulateOption> {
    let path = first_string(obj, &["path"])
        .ok_or_else(|| ParseError::InvalidPopulate("populate object requires 'path'".to_string()))?;
    let select = match first_present(obj, &["select", "fields"]) {
        Some(v) => parse_string_list(v, "populate.select")?,
        None => Vec::new(),
    };
    let populate = match first_present(obj, &["populate", "include"]) {
        Some(v) => parse_populate(v)?,
        None => Vec::new(),
    };
    Ok(PopulateOption { path, select, populate })
}

fn parse_string_list(value: &Value, what: &str) -> ParseResult<Vec<String>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(split_list(s)),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let s = item.as_str().ok_or_else(|| {
                    ParseError::InvalidPredicate(format!("{} entries must be strings", what))
                })?;
                out.extend(split_list(s));
            }
            Ok(out)
        }
        other => Err(ParseError::InvalidPredicate(format!(
            "{} must be a string or array, got {}",
            what,
            json_type_name(other)
        ))),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| obj.get(*k)).find(|v| !v.is_null())
}

fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Numbers or numeric strings; anything else is ignored.
fn first_number(obj: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(|v| match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

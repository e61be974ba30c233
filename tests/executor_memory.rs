//! Executor Tests over the In-Memory Store
//!
//! End-to-end behaviour of parse -> validate -> compile -> execute:
//! - Filters, status shortcut, sort, projection, and pagination
//! - OR groups and the between no-op
//! - Tenant isolation
//! - Exists, ids, distinct, and fetch by id
//! - Grouped aggregates with having
//! - Cancellation and deadlines reach the store

use std::time::Duration;

use aeroquery::config::EngineConfig;
use aeroquery::executor::{ExecutorError, Operation, QueryExecutor};
use aeroquery::parser::{parse_aggregate_json, parse_json, parse_query_string};
use aeroquery::query::Query;
use aeroquery::schema::SchemaRegistry;
use aeroquery::store::{Fixtures, MemoryStore, QueryContext, StoreError};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

const FIRST_ID: &str = "00000000-0000-4000-8000-000000000001";

fn setup() -> (MemoryStore, SchemaRegistry, EngineConfig) {
    let fixtures = Fixtures::from_json(json!({
        "schemas": {
            "article": {"title": "text", "price": "decimal", "category": "text", "rating": "integer"}
        },
        "documents": [
            {"id": FIRST_ID, "contentType": "article", "status": "published",
             "createdAt": "2024-01-01T00:00:00Z",
             "data": {"title": "Alpha", "price": 10, "category": "news", "rating": 5}},
            {"contentType": "article", "status": "published", "createdAt": "2024-01-02T00:00:00Z",
             "data": {"title": "Bravo", "price": 25, "category": "blog"}},
            {"contentType": "article", "status": "draft", "createdAt": "2024-01-03T00:00:00Z",
             "data": {"title": "Charlie", "price": 40, "category": "news", "rating": 3}},
            {"contentType": "article", "status": "published", "createdAt": "2024-01-04T00:00:00Z",
             "data": {"title": "Delta", "price": 55, "category": "review", "rating": 4}},
            {"contentType": "article", "status": "draft", "tenantId": "acme", "createdAt": "2024-01-05T00:00:00Z",
             "data": {"title": "Echo", "price": 70, "category": "news"}}
        ]
    }))
    .unwrap();
    let schemas = fixtures.registry().unwrap();
    let store = fixtures.into_store().unwrap();
    (store, schemas, EngineConfig::default())
}

fn titles(entries: &[aeroquery::store::Document]) -> Vec<String> {
    entries
        .iter()
        .map(|d| d.data.get("title").and_then(Value::as_str).unwrap_or_default().to_string())
        .collect()
}

// =============================================================================
// List Queries
// =============================================================================

#[test]
fn test_status_filter_sort_and_totals() {
    let (store, schemas, config) = setup();
    let executor = QueryExecutor::new(&store, &schemas, &config);
    let query = parse_query_string("status=published&filter[price]=gte.20&sort=-price").unwrap();

    let result = executor.execute(&QueryContext::new(), "article", &query).unwrap();
    assert_eq!(titles(&result.entries), vec!["Delta", "Bravo"]);
    assert_eq!(result.total_items, 2);
    assert_eq!(result.total_pages, 1);
}

#[test]
fn test_default_order_is_newest_first() {
    let (store, schemas, config) = setup();
    let executor = QueryExecutor::new(&store, &schemas, &config);
    let result = executor
        .execute(&QueryContext::new(), "article", &parse_query_string("pageSize=2").unwrap())
        .unwrap();

    assert_eq!(titles(&result.entries), vec!["Echo", "Delta"]);
    assert_eq!(result.total_items, 5);
    assert_eq!(result.total_pages, 3);
}

#[test]
fn test_missing_values_sort_last() {
    let (store, schemas, config) = setup();
    let executor = QueryExecutor::new(&store, &schemas, &config);
    let result = executor
        .execute(&QueryContext::new(), "article", &parse_query_string("sort=rating").unwrap())
        .unwrap();

    let order = titles(&result.entries);
    assert_eq!(&order[..3], &["Charlie", "Delta", "Alpha"]);
}

#[test]
fn test_select_keeps_named_fields() {
    let (store, schemas, config) = setup();
    let executor = QueryExecutor::new(&store, &schemas, &config);
    let result = executor
        .execute(&QueryContext::new(), "article", &parse_query_string("select=title&pageSize=1").unwrap())
        .unwrap();

    let doc = &result.entries[0];
    assert_eq!(doc.data.len(), 1);
    assert!(doc.data.contains_key("title"));
}

#[test]
fn test_offset_limit_window() {
    let (store, schemas, config) = setup();
    let executor = QueryExecutor::new(&store, &schemas, &config);
    let result = executor
        .execute(&QueryContext::new(), "article", &parse_query_string("sort=price&offset=1&limit=2").unwrap())
        .unwrap();

    assert_eq!(titles(&result.entries), vec!["Bravo", "Charlie"]);
    assert_eq!(result.total_items, 5);
}

#[test]
fn test_or_group() {
    let (store, schemas, config) = setup();
    let executor = QueryExecutor::new(&store, &schemas, &config);
    let query = parse_json(
        r#"{"filter":{"status":"published","$or":[{"category":"news"},{"category":"review"}]},"sort":"title"}"#,
    )
    .unwrap();

    let result = executor.execute(&QueryContext::new(), "article", &query).unwrap();
    assert_eq!(titles(&result.entries), vec!["Alpha", "Delta"]);
}

#[test]
fn test_between_with_one_bound_matches_everything() {
    let (store, schemas, config) = setup();
    let executor = QueryExecutor::new(&store, &schemas, &config);
    let ctx = QueryContext::new();

    let all = executor.execute_count(&ctx, "article", &parse_json("{}").unwrap()).unwrap();
    let one_bound = executor
        .execute_count(&ctx, "article", &parse_json(r#"{"filter":{"price":{"$between":[10]}}}"#).unwrap())
        .unwrap();
    let two_bounds = executor
        .execute_count(&ctx, "article", &parse_json(r#"{"filter":{"price":{"$between":[20,50]}}}"#).unwrap())
        .unwrap();

    assert_eq!(one_bound, all);
    assert_eq!(two_bounds, 2);
}

#[test]
fn test_tenant_isolation() {
    let (store, schemas, config) = setup();
    let acme = QueryExecutor::new(&store, &schemas, &config).with_tenant(Some("acme".into()));
    let result = acme.execute(&QueryContext::new(), "article", &Query::default()).unwrap();
    assert_eq!(titles(&result.entries), vec!["Echo"]);

    let other = QueryExecutor::new(&store, &schemas, &config).with_tenant(Some("globex".into()));
    assert_eq!(other.execute_count(&QueryContext::new(), "article", &Query::default()).unwrap(), 0);
}

// =============================================================================
// Single-Purpose Operations
// =============================================================================

#[test]
fn test_exists_ids_and_distinct() {
    let (store, schemas, config) = setup();
    let executor = QueryExecutor::new(&store, &schemas, &config);
    let ctx = QueryContext::new();

    assert!(executor
        .execute_exists(&ctx, "article", &parse_query_string("filter[category]=news").unwrap())
        .unwrap());
    assert!(!executor
        .execute_exists(&ctx, "article", &parse_query_string("filter[category]=sports").unwrap())
        .unwrap());

    let ids = executor
        .execute_ids(&ctx, "article", &parse_query_string("sort=createdAt&pageSize=1").unwrap())
        .unwrap();
    assert_eq!(ids.len(), 1);
    assert_eq!(ids[0].to_string(), FIRST_ID);

    let categories = executor
        .execute_distinct(&ctx, "article", "category", &Query::default())
        .unwrap();
    assert_eq!(categories, vec![json!("blog"), json!("news"), json!("review")]);
}

#[test]
fn test_fetch_by_id() {
    let (store, schemas, config) = setup();
    let executor = QueryExecutor::new(&store, &schemas, &config);
    let ctx = QueryContext::new();

    let doc = executor
        .execute_by_id(&ctx, "article", FIRST_ID, &parse_query_string("select=price").unwrap())
        .unwrap();
    assert_eq!(doc.data.get("price"), Some(&json!(10)));
    assert!(doc.data.get("title").is_none());

    let missing = executor
        .execute_by_id(&ctx, "article", "00000000-0000-4000-8000-0000000000ff", &Query::default())
        .unwrap_err();
    assert_eq!(missing.code(), "AERO_DOCUMENT_NOT_FOUND");

    let malformed = executor
        .execute_by_id(&ctx, "article", "not-a-uuid", &Query::default())
        .unwrap_err();
    assert!(matches!(malformed, ExecutorError::NotFound { .. }));
}

// =============================================================================
// Grouped Aggregates
// =============================================================================

#[test]
fn test_grouped_aggregate_with_having() {
    let (store, schemas, config) = setup();
    let executor = QueryExecutor::new(&store, &schemas, &config);
    let query = parse_aggregate_json(&json!({
        "groupBy": ["category"],
        "aggregations": [
            {"operator": "count", "alias": "n"},
            {"operator": "sum", "field": "price", "alias": "revenue"}
        ],
        "having": {"n": {"$gte": 2}},
        "sort": "-n"
    }))
    .unwrap();

    let rows = executor.execute_aggregate(&QueryContext::new(), "article", &query).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].key("category"), Some(&json!("news")));
    assert_eq!(rows[0].value("n"), Some(&json!(3)));
    assert_eq!(rows[0].value("revenue"), Some(&json!(120)));
}

#[test]
fn test_aggregate_rejects_unknown_output_name() {
    let (store, schemas, config) = setup();
    let executor = QueryExecutor::new(&store, &schemas, &config);
    let query = parse_aggregate_json(&json!({"groupBy": ["category"], "sort": "-total"})).unwrap();
    let err = executor.execute_aggregate(&QueryContext::new(), "article", &query).unwrap_err();
    assert_eq!(err.code(), "AERO_QUERY_UNKNOWN_FIELD");
}

// =============================================================================
// Interruption
// =============================================================================

#[test]
fn test_deadline_is_forwarded() {
    let (store, schemas, config) = setup();
    let executor = QueryExecutor::new(&store, &schemas, &config);
    let ctx = QueryContext::new().with_timeout(Duration::ZERO);

    let err = executor.execute(&ctx, "article", &Query::default()).unwrap_err();
    assert!(matches!(
        err,
        ExecutorError::Store {
            operation: Operation::List,
            source: StoreError::DeadlineExceeded
        }
    ));
}

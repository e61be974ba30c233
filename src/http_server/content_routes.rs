//! Content query HTTP routes
//!
//! Exposes the URL and JSON query grammars, aggregation, statistics, and
//! search. The tenant is taken from the optional `x-tenant-id` header.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query as QueryParams, RawQuery, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::aggregate::{Aggregator, ContentTypeStats, SimpleAggregate, StoreStats, TimeBucket};
use crate::config::EngineConfig;
use crate::executor::{AggregateResult, QueryExecutor, QueryResult};
use crate::parser::{parse_aggregate_json, parse_json_value, parse_query_string, ParseError};
use crate::observability::{log_event_with_fields, Event};
use crate::query::{DateTrunc, FieldCategory, Query, ValueShape, OPERATORS};
use crate::schema::SchemaRegistry;
use crate::search::{SearchConfig, SearchResult, Searcher};
use crate::store::{Document, DocumentStore, QueryContext};

use super::errors::{ApiError, ApiResult};

pub const TENANT_HEADER: &str = "x-tenant-id";
/// Optional caller-supplied id echoed in query logs
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// State shared by every content handler
pub struct ContentState {
    pub store: Arc<dyn DocumentStore>,
    pub schemas: SchemaRegistry,
    pub config: EngineConfig,
}

impl ContentState {
    pub fn new(store: Arc<dyn DocumentStore>, schemas: SchemaRegistry, config: EngineConfig) -> Self {
        Self { store, schemas, config }
    }

    /// Fresh context per request, bounded by the configured timeout
    fn context(&self, headers: &HeaderMap) -> QueryContext {
        let mut ctx = QueryContext::new();
        if let Some(id) = request_id(headers) {
            ctx = ctx.with_request_id(id);
        }
        match self.config.http.request_timeout() {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx,
        }
    }

    fn executor(&self, headers: &HeaderMap) -> QueryExecutor<'_, dyn DocumentStore> {
        QueryExecutor::new(self.store.as_ref(), &self.schemas, &self.config).with_tenant(tenant(headers))
    }

    fn aggregator(&self, headers: &HeaderMap) -> Aggregator<'_, dyn DocumentStore> {
        Aggregator::new(self.store.as_ref(), &self.schemas, &self.config).with_tenant(tenant(headers))
    }

    fn searcher(&self, headers: &HeaderMap) -> Searcher<'_, dyn DocumentStore> {
        Searcher::new(self.store.as_ref(), &self.schemas, &self.config).with_tenant(tenant(headers))
    }
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct OperatorInfo {
    pub code: &'static str,
    pub aliases: Vec<&'static str>,
    pub value_shape: ValueShape,
    pub categories: Vec<FieldCategory>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub page: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
    pub highlight: Option<String>,
    pub fields: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuggestParams {
    pub field: Option<String>,
    pub q: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TimeSeriesParams {
    pub interval: Option<String>,
    pub limit: Option<String>,
}

// ==================
// Content Routes
// ==================

/// Create content routes
pub fn content_routes(state: Arc<ContentState>) -> Router {
    Router::new()
        .route("/content/:content_type", get(list_handler))
        .route("/content/:content_type/query", post(query_handler))
        .route("/content/:content_type/count", post(count_handler))
        .route("/content/:content_type/aggregate", post(aggregate_handler))
        .route("/content/:content_type/grouped", post(grouped_handler))
        .route("/content/:content_type/stats", get(type_stats_handler))
        .route("/content/:content_type/timeseries", get(time_series_handler))
        .route("/content/:content_type/suggest", get(suggest_handler))
        .route("/content/:content_type/distinct/:field", get(distinct_handler))
        .route("/content/:content_type/:id", get(get_handler))
        .route("/stats", get(store_stats_handler))
        .route("/operators", get(operators_handler))
        .route("/search", get(search_handler))
        .with_state(state)
}

// ==================
// Helper Functions
// ==================

fn tenant(headers: &HeaderMap) -> Option<String> {
    headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Malformed ids are ignored and a fresh one is generated.
fn request_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
}

/// Decodes a JSON body; an empty body is an empty object.
fn json_body(body: &Bytes) -> Result<Value, ParseError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(json!({}));
    }
    Ok(serde_json::from_slice(body)?)
}

fn url_query(raw: Option<String>) -> Result<Query, ParseError> {
    let query = parse_query_string(raw.as_deref().unwrap_or(""))?;
    log_parsed("url", &query);
    Ok(query)
}

fn body_query(body: &Bytes) -> Result<Query, ParseError> {
    let query = parse_json_value(&json_body(body)?)?;
    log_parsed("json", &query);
    Ok(query)
}

fn log_parsed(source: &str, query: &Query) {
    let conditions = query.filters.as_ref().map_or(0, |g| g.condition_count());
    log_event_with_fields(
        Event::QueryParsed,
        &[
            ("source", source),
            ("conditions", &conditions.to_string()),
            ("sort", &query.sort.len().to_string()),
        ],
    );
}

fn number(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|s| s.trim().parse().ok())
}

fn flag(raw: Option<&str>) -> bool {
    matches!(raw.map(str::trim), Some("true" | "1" | "yes"))
}

// ==================
// Query Handlers
// ==================

async fn list_handler(
    State(state): State<Arc<ContentState>>,
    headers: HeaderMap,
    Path(content_type): Path<String>,
    RawQuery(raw): RawQuery,
) -> ApiResult<QueryResult> {
    let query = url_query(raw)?;
    let result = state.executor(&headers).execute(&state.context(&headers), &content_type, &query)?;
    Ok(Json(result))
}

async fn query_handler(
    State(state): State<Arc<ContentState>>,
    headers: HeaderMap,
    Path(content_type): Path<String>,
    body: Bytes,
) -> ApiResult<QueryResult> {
    let query = body_query(&body)?;
    let result = state.executor(&headers).execute(&state.context(&headers), &content_type, &query)?;
    Ok(Json(result))
}

async fn count_handler(
    State(state): State<Arc<ContentState>>,
    headers: HeaderMap,
    Path(content_type): Path<String>,
    body: Bytes,
) -> ApiResult<CountResponse> {
    let query = body_query(&body)?;
    let count = state
        .executor(&headers)
        .execute_count(&state.context(&headers), &content_type, &query)?;
    Ok(Json(CountResponse { count }))
}

async fn get_handler(
    State(state): State<Arc<ContentState>>,
    headers: HeaderMap,
    Path((content_type, id)): Path<(String, String)>,
    RawQuery(raw): RawQuery,
) -> ApiResult<Document> {
    let query = url_query(raw)?;
    let document = state
        .executor(&headers)
        .execute_by_id(&state.context(&headers), &content_type, &id, &query)?;
    Ok(Json(document))
}

async fn distinct_handler(
    State(state): State<Arc<ContentState>>,
    headers: HeaderMap,
    Path((content_type, field)): Path<(String, String)>,
    RawQuery(raw): RawQuery,
) -> ApiResult<Vec<Value>> {
    let query = url_query(raw)?;
    let values = state
        .executor(&headers)
        .execute_distinct(&state.context(&headers), &content_type, &field, &query)?;
    Ok(Json(values))
}

// ==================
// Aggregate Handlers
// ==================

async fn aggregate_handler(
    State(state): State<Arc<ContentState>>,
    headers: HeaderMap,
    Path(content_type): Path<String>,
    body: Bytes,
) -> ApiResult<Vec<AggregateResult>> {
    let request = SimpleAggregate::from_json(&json_body(&body)?)?;
    let rows = state
        .aggregator(&headers)
        .aggregate(&state.context(&headers), &content_type, &request)?;
    Ok(Json(rows))
}

async fn grouped_handler(
    State(state): State<Arc<ContentState>>,
    headers: HeaderMap,
    Path(content_type): Path<String>,
    body: Bytes,
) -> ApiResult<Vec<AggregateResult>> {
    let query = parse_aggregate_json(&json_body(&body)?)?;
    let rows = state
        .executor(&headers)
        .execute_aggregate(&state.context(&headers), &content_type, &query)?;
    Ok(Json(rows))
}

async fn type_stats_handler(
    State(state): State<Arc<ContentState>>,
    headers: HeaderMap,
    Path(content_type): Path<String>,
) -> ApiResult<ContentTypeStats> {
    let stats = state
        .aggregator(&headers)
        .content_type_stats(&state.context(&headers), &content_type)?;
    Ok(Json(stats))
}

async fn store_stats_handler(State(state): State<Arc<ContentState>>, headers: HeaderMap) -> ApiResult<StoreStats> {
    let stats = state.aggregator(&headers).store_stats(&state.context(&headers))?;
    Ok(Json(stats))
}

async fn time_series_handler(
    State(state): State<Arc<ContentState>>,
    headers: HeaderMap,
    Path(content_type): Path<String>,
    QueryParams(params): QueryParams<TimeSeriesParams>,
) -> ApiResult<Vec<TimeBucket>> {
    let trunc = match params.interval.as_deref() {
        Some(name) => Some(
            DateTrunc::parse(name)
                .ok_or_else(|| ParseError::InvalidPredicate(format!("unknown date granularity '{}'", name)))?,
        ),
        None => None,
    };
    let series = state.aggregator(&headers).time_series(
        &state.context(&headers),
        &content_type,
        trunc,
        number(params.limit.as_deref()),
    )?;
    Ok(Json(series))
}

// ==================
// Search Handlers
// ==================

async fn search_handler(
    State(state): State<Arc<ContentState>>,
    headers: HeaderMap,
    QueryParams(params): QueryParams<SearchParams>,
) -> ApiResult<SearchResult> {
    let fields = params
        .fields
        .as_deref()
        .map(|f| f.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();
    let request = SearchConfig::new(params.q.unwrap_or_default(), &state.config)
        .with_fields(fields)
        .with_highlight(flag(params.highlight.as_deref()));
    let page = number(params.page.as_deref()).unwrap_or(crate::query::DEFAULT_PAGE);
    let page_size = number(params.page_size.as_deref()).unwrap_or(crate::query::DEFAULT_PAGE_SIZE);

    let searcher = state.searcher(&headers);
    let ctx = state.context(&headers);
    let result = match params.content_type.as_deref().filter(|t| !t.is_empty()) {
        Some(content_type) => searcher.search(&ctx, content_type, &request, page, page_size)?,
        None => searcher.search_all(&ctx, &request, page, page_size)?,
    };
    Ok(Json(result))
}

async fn suggest_handler(
    State(state): State<Arc<ContentState>>,
    headers: HeaderMap,
    Path(content_type): Path<String>,
    QueryParams(params): QueryParams<SuggestParams>,
) -> ApiResult<Vec<Value>> {
    let field = params
        .field
        .ok_or_else(|| ApiError::from(ParseError::InvalidQueryString("suggest requires 'field'".to_string())))?;
    let values = state.searcher(&headers).suggest(
        &state.context(&headers),
        &content_type,
        &field,
        params.q.as_deref().unwrap_or(""),
        number(params.limit.as_deref()),
    )?;
    Ok(Json(values))
}

// ==================
// Catalog
// ==================

async fn operators_handler() -> Json<Vec<OperatorInfo>> {
    Json(
        OPERATORS
            .iter()
            .map(|op| OperatorInfo {
                code: op.code(),
                aliases: op.aliases(),
                value_shape: op.value_shape(),
                categories: op.categories().to_vec(),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_tenant_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(tenant(&headers), None);
        headers.insert(TENANT_HEADER, HeaderValue::from_static(" acme "));
        assert_eq!(tenant(&headers).as_deref(), Some("acme"));
    }

    #[test]
    fn test_request_id_header() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert_eq!(request_id(&headers), None);

        let id = Uuid::new_v4();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        assert_eq!(request_id(&headers), Some(id));
    }

    #[test]
    fn test_empty_body_is_empty_object() {
        assert_eq!(json_body(&Bytes::from_static(b"  ")).unwrap(), json!({}));
        assert!(json_body(&Bytes::from_static(b"{oops")).is_err());
    }

    #[test]
    fn test_flags_and_numbers() {
        assert!(flag(Some("true")));
        assert!(!flag(Some("no")));
        assert_eq!(number(Some(" 5 ")), Some(5));
        assert_eq!(number(Some("x")), None);
    }
}

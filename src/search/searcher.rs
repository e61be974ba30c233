//! Full-text search
//!
//! Queries are normalized before they reach the store; a query that is
//! empty after normalization returns no results without touching the store.
//! Hits are ordered by relevance descending.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::builder::{escape_like, Column, Condition, QueryBuilder, RankSpec, Scope, StoreQuery};
use crate::config::EngineConfig;
use crate::executor::{total_pages, ExecutorResult, Operation, QueryExecutor, StoreResultExt};
use crate::query::FilterGroup;
use crate::schema::{FieldLocation, FieldSchema, QueryValidator, SchemaRegistry};
use crate::store::{Document, DocumentStore, QueryContext};

use super::highlight::Highlighter;
use super::normalize::{normalize_query, query_terms};

/// One search request
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub query: String,
    /// Fields searched; empty means the schema's searchable fields
    pub fields: Vec<String>,
    pub language: String,
    pub highlight: bool,
    pub pre_tag: String,
    pub post_tag: String,
    pub snippet_length: usize,
    /// Extra filters ANDed with the text match
    pub filters: Option<FilterGroup>,
}

impl SearchConfig {
    /// Request for `query` with the engine's language and highlight tags.
    pub fn new(query: impl Into<String>, config: &EngineConfig) -> Self {
        Self {
            query: query.into(),
            fields: Vec::new(),
            language: config.search_language.clone(),
            highlight: false,
            pre_tag: config.highlight_pre_tag.clone(),
            post_tag: config.highlight_post_tag.clone(),
            snippet_length: config.snippet_length,
            filters: None,
        }
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_highlight(mut self, highlight: bool) -> Self {
        self.highlight = highlight;
        self
    }

    pub fn with_filters(mut self, filters: FilterGroup) -> Self {
        self.filters = Some(filters).filter(|g| !g.is_empty());
        self
    }
}

/// A ranked document with optional highlights
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub document: Document,
    pub rank: f64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub highlights: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub entries: Vec<SearchHit>,
    pub page: u64,
    pub page_size: u64,
    pub total_items: u64,
    pub total_pages: u64,
}

impl SearchResult {
    pub fn empty(page: u64, page_size: u64) -> Self {
        Self {
            entries: Vec::new(),
            page,
            page_size,
            total_items: 0,
            total_pages: 0,
        }
    }
}

pub struct Searcher<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    executor: QueryExecutor<'a, S>,
    config: &'a EngineConfig,
    tenant: Option<String>,
}

impl<'a, S: DocumentStore + ?Sized> Searcher<'a, S> {
    pub fn new(store: &'a S, schemas: &'a SchemaRegistry, config: &'a EngineConfig) -> Self {
        Self {
            store,
            executor: QueryExecutor::new(store, schemas, config),
            config,
            tenant: None,
        }
    }

    pub fn with_tenant(mut self, tenant: Option<String>) -> Self {
        self.executor = self.executor.with_tenant(tenant.clone());
        self.tenant = tenant;
        self
    }

    /// Searches one content type.
    pub fn search(
        &self,
        ctx: &QueryContext,
        content_type: &str,
        request: &SearchConfig,
        page: u64,
        page_size: u64,
    ) -> ExecutorResult<SearchResult> {
        self.executor.observe(ctx, Operation::Search, content_type, || {
            let (page, page_size) = self.window(page, page_size);
            let normalized = normalize_query(&request.query);
            if normalized.is_empty() {
                return Ok(SearchResult::empty(page, page_size));
            }

            let schema = self.executor.schema(content_type)?;
            let builder = self.executor.builder(schema).with_language(request.language.clone());
            let filters = self.compile_filters(schema, &builder, request)?;
            let text = builder.full_text(&request.fields, &normalized);
            let rank = builder.rank(&request.fields, &normalized);
            self.run(ctx, builder.scope().clone(), filters, text, rank, request, &normalized, page, page_size)
        })
    }

    /// Searches every content type of the tenant. Named fields are taken
    /// as document paths; filters may use system fields only.
    pub fn search_all(
        &self,
        ctx: &QueryContext,
        request: &SearchConfig,
        page: u64,
        page_size: u64,
    ) -> ExecutorResult<SearchResult> {
        self.executor.observe(ctx, Operation::Search, "*", || {
            let (page, page_size) = self.window(page, page_size);
            let normalized = normalize_query(&request.query);
            if normalized.is_empty() {
                return Ok(SearchResult::empty(page, page_size));
            }

            let schema = FieldSchema::default();
            let scope = Scope::tenant(self.tenant.clone());
            let builder = QueryBuilder::new(&schema, scope.clone())
                .with_language(request.language.clone())
                .with_max_page_size(self.config.max_page_size);
            let filters = self.compile_filters(&schema, &builder, request)?;

            let columns: Vec<Column> = request.fields.iter().map(|f| Column::document(f, None)).collect();
            let text = Condition::FullText {
                columns: columns.clone(),
                query: normalized.clone(),
                language: request.language.clone(),
            };
            let rank = RankSpec {
                columns,
                query: normalized.clone(),
                language: request.language.clone(),
            };
            self.run(ctx, scope, filters, text, rank, request, &normalized, page, page_size)
        })
    }

    /// Up to `limit` distinct values of `field` starting with `prefix`,
    /// compared case-insensitively after normalization.
    pub fn suggest(
        &self,
        ctx: &QueryContext,
        content_type: &str,
        field: &str,
        prefix: &str,
        limit: Option<u64>,
    ) -> ExecutorResult<Vec<Value>> {
        self.executor.observe(ctx, Operation::Suggest, content_type, || {
            let normalized = normalize_query(prefix);
            if normalized.is_empty() {
                return Ok(Vec::new());
            }
            let schema = self.executor.schema(content_type)?;
            let builder = self.executor.builder(schema);
            let column = builder.column(field, FieldLocation::Select)?;
            let query = StoreQuery {
                condition: Some(Condition::Pattern {
                    column: column.clone(),
                    pattern: format!("{}%", escape_like(&normalized)),
                    case_insensitive: true,
                }),
                limit: Some(limit.unwrap_or(self.config.suggest_limit).clamp(1, self.config.max_page_size)),
                ..StoreQuery::new(builder.scope().clone())
            };
            self.store.distinct(ctx, &query, &column).during(Operation::Suggest)
        })
    }

    fn window(&self, page: u64, page_size: u64) -> (u64, u64) {
        (page.max(1), page_size.clamp(1, self.config.max_page_size))
    }

    fn compile_filters(
        &self,
        schema: &FieldSchema,
        builder: &QueryBuilder<'_>,
        request: &SearchConfig,
    ) -> ExecutorResult<Option<Condition>> {
        match &request.filters {
            Some(group) => {
                QueryValidator::new(schema).validate_group(group)?;
                Ok(builder.compile_filters(group)?)
            }
            None => Ok(None),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run(
        &self,
        ctx: &QueryContext,
        scope: Scope,
        filters: Option<Condition>,
        text: Condition,
        rank: RankSpec,
        request: &SearchConfig,
        normalized: &str,
        page: u64,
        page_size: u64,
    ) -> ExecutorResult<SearchResult> {
        let list = StoreQuery {
            condition: Condition::and_opt(filters, Some(text)),
            rank: Some(rank),
            limit: Some(page_size),
            offset: (page - 1).saturating_mul(page_size),
            ..StoreQuery::new(scope)
        };
        let scored = self.store.search(ctx, &list).during(Operation::Search)?;
        let total_items = self.store.count(ctx, &list.count_only()).during(Operation::Count)?;

        let highlighter = request.highlight.then(|| {
            Highlighter::new(&query_terms(normalized), &request.pre_tag, &request.post_tag, request.snippet_length)
        });
        let entries = scored
            .into_iter()
            .map(|hit| SearchHit {
                highlights: highlighter
                    .as_ref()
                    .map(|h| h.document(&hit.document, &request.fields))
                    .unwrap_or_default(),
                document: hit.document,
                rank: hit.rank,
            })
            .collect();

        Ok(SearchResult {
            entries,
            page,
            page_size,
            total_items,
            total_pages: total_pages(total_items, page_size),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::FilterCondition;
    use crate::schema::FieldType;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn setup() -> (MemoryStore, SchemaRegistry, EngineConfig) {
        let mut schemas = SchemaRegistry::new();
        schemas.register(
            FieldSchema::new("article")
                .with_field("title", FieldType::Text)
                .with_field("body", FieldType::RichText)
                .with_field("category", FieldType::Text),
        );
        let store = MemoryStore::new();
        let docs = [
            ("Rust guide", "Learn rust the rust way", "news"),
            ("Go guide", "Learn go", "blog"),
            ("Rusty tools", "Rust tooling overview", "blog"),
        ];
        for (title, body, category) in docs {
            store
                .insert(Document::from_json(
                    "article",
                    json!({"title": title, "body": body, "category": category}),
                ))
                .unwrap();
        }
        (store, schemas, EngineConfig::default())
    }

    #[test]
    fn test_ranked_by_relevance() {
        let (store, schemas, config) = setup();
        let searcher = Searcher::new(&store, &schemas, &config);
        let result = searcher
            .search(&QueryContext::new(), "article", &SearchConfig::new("rust", &config), 1, 10)
            .unwrap();

        assert_eq!(result.total_items, 2);
        assert_eq!(result.entries[0].document.data["title"], json!("Rust guide"));
        assert!(result.entries[0].rank >= result.entries[1].rank);
        assert!(result.entries[0].highlights.is_empty());
    }

    #[test]
    fn test_empty_after_normalization_skips_store() {
        let (store, schemas, config) = setup();
        let searcher = Searcher::new(&store, &schemas, &config);
        let result = searcher
            .search(&QueryContext::new(), "article", &SearchConfig::new("  !!! ", &config), 1, 10)
            .unwrap();
        assert_eq!(result.total_items, 0);
        assert!(result.entries.is_empty());
        assert_eq!(store.query_calls(), (0, 0));
    }

    #[test]
    fn test_highlight_and_filters() {
        let (store, schemas, config) = setup();
        let searcher = Searcher::new(&store, &schemas, &config);
        let request = SearchConfig::new("rust", &config)
            .with_fields(vec!["title".into()])
            .with_highlight(true)
            .with_filters(FilterGroup::and().with_condition(FilterCondition::eq("category", "news")));

        let result = searcher.search(&QueryContext::new(), "article", &request, 1, 10).unwrap();
        assert_eq!(result.total_items, 1);
        assert_eq!(
            result.entries[0].highlights.get("title").map(String::as_str),
            Some("<mark>Rust</mark> guide")
        );
    }

    #[test]
    fn test_suggest_prefix() {
        let (store, schemas, config) = setup();
        let searcher = Searcher::new(&store, &schemas, &config);
        let values = searcher
            .suggest(&QueryContext::new(), "article", "title", "ru", None)
            .unwrap();
        assert_eq!(values, vec![json!("Rust guide"), json!("Rusty tools")]);
        assert!(searcher
            .suggest(&QueryContext::new(), "article", "title", "%%", None)
            .unwrap()
            .is_empty());
    }
}

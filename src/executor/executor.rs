//! Query executor
//!
//! Execution flow for a list query (strict order):
//! 1. Look up the content type's field schema
//! 2. Validate the query; nothing reaches the store on failure
//! 3. Compile the list and count queries
//! 4. Run the list, then the count, as independent store calls
//! 5. Populate relations on the returned page
//! 6. Assemble the page with its totals
//!
//! Every operation runs inside an `ObservationScope` and logs its outcome.

use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::builder::{Column, CompareOp, Condition, Projection, QueryBuilder, Scope, StoreQuery};
use crate::config::EngineConfig;
use crate::observability::{Event, ObservationScope};
use crate::populate::{PopulateConfig, Populator};
use crate::query::{AggregateQuery, Query, SystemField};
use crate::schema::{FieldLocation, FieldSchema, QueryValidator, SchemaRegistry};
use crate::store::{Document, DocumentStore, QueryContext};

use super::errors::{ExecutorError, ExecutorResult, Operation, StoreResultExt};
use super::result::{AggregateResult, QueryResult};

/// Runs queries for one tenant against a document store.
pub struct QueryExecutor<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    schemas: &'a SchemaRegistry,
    config: &'a EngineConfig,
    tenant: Option<String>,
}

impl<'a, S: DocumentStore + ?Sized> QueryExecutor<'a, S> {
    pub fn new(store: &'a S, schemas: &'a SchemaRegistry, config: &'a EngineConfig) -> Self {
        Self {
            store,
            schemas,
            config,
            tenant: None,
        }
    }

    pub fn with_tenant(mut self, tenant: Option<String>) -> Self {
        self.tenant = tenant;
        self
    }

    pub fn scope(&self, content_type: &str) -> Scope {
        Scope::content_type(content_type).with_tenant(self.tenant.clone())
    }

    pub fn schema(&self, content_type: &str) -> ExecutorResult<&'a FieldSchema> {
        Ok(self.schemas.require(content_type)?)
    }

    /// Builder for one content type, configured from the engine config
    pub fn builder(&self, schema: &'a FieldSchema) -> QueryBuilder<'a> {
        QueryBuilder::new(schema, self.scope(&schema.content_type))
            .with_language(self.config.search_language.clone())
            .with_max_page_size(self.config.max_page_size)
    }

    /// Runs `work` inside an observation scope and logs its outcome.
    pub(crate) fn observe<T>(
        &self,
        ctx: &QueryContext,
        operation: Operation,
        content_type: &str,
        work: impl FnOnce() -> ExecutorResult<T>,
    ) -> ExecutorResult<T> {
        let scope = ObservationScope::new(operation.as_str(), operation.event())
            .with_field("content_type", content_type)
            .with_field("request_id", ctx.request_id().to_string());
        match work() {
            Ok(value) => {
                scope.complete();
                Ok(value)
            }
            Err(err) => {
                let reason = err.to_string();
                if matches!(err, ExecutorError::NotFound { .. }) {
                    scope.finish(Event::QueryExecuted, &[("outcome", "not_found")]);
                } else if err.is_client_error() {
                    scope.finish(Event::QueryValidationFailed, &[("code", err.code()), ("reason", &reason)]);
                } else {
                    scope.fail(err.code(), &reason);
                }
                Err(err)
            }
        }
    }

    /// Validates and runs a list query, returning one page with totals.
    ///
    /// List and count are separate store calls and are not atomic with
    /// respect to concurrent writes.
    pub fn execute(&self, ctx: &QueryContext, content_type: &str, query: &Query) -> ExecutorResult<QueryResult> {
        self.observe(ctx, Operation::List, content_type, || {
            let schema = self.schema(content_type)?;
            QueryValidator::new(schema).validate(query)?;

            let builder = self.builder(schema);
            let list = builder.build_list(query)?;
            let count = builder.build_count(query)?;

            let mut entries = self.store.find(ctx, &list).during(Operation::List)?;
            let total_items = self.store.count(ctx, &count).during(Operation::Count)?;

            self.populate(ctx, &mut entries, query)?;

            let page_size = list.limit.unwrap_or(self.config.max_page_size);
            let page = query.pagination.effective_page(self.config.max_page_size);
            Ok(QueryResult::new(entries, page, page_size, total_items))
        })
    }

    /// Number of documents matching the query's filters.
    pub fn execute_count(&self, ctx: &QueryContext, content_type: &str, query: &Query) -> ExecutorResult<u64> {
        self.observe(ctx, Operation::Count, content_type, || {
            let schema = self.schema(content_type)?;
            QueryValidator::new(schema).validate(query)?;
            let count = self.builder(schema).build_count(query)?;
            self.store.count(ctx, &count).during(Operation::Count)
        })
    }

    /// True when at least one document matches.
    pub fn execute_exists(&self, ctx: &QueryContext, content_type: &str, query: &Query) -> ExecutorResult<bool> {
        self.observe(ctx, Operation::Exists, content_type, || {
            let schema = self.schema(content_type)?;
            QueryValidator::new(schema).validate(query)?;
            let mut probe = self.builder(schema).build_count(query)?;
            probe.limit = Some(1);
            probe.projection = Projection::SystemOnly;
            let found = self.store.find(ctx, &probe).during(Operation::Exists)?;
            Ok(!found.is_empty())
        })
    }

    /// One document by id, with the query's projection and population.
    ///
    /// An id that is not a UUID cannot match any document and yields
    /// `NotFound`.
    pub fn execute_by_id(&self, ctx: &QueryContext, content_type: &str, id: &str, query: &Query) -> ExecutorResult<Document> {
        self.observe(ctx, Operation::Get, content_type, || {
            let schema = self.schema(content_type)?;
            QueryValidator::new(schema).validate(query)?;
            let id = Uuid::parse_str(id).map_err(|_| ExecutorError::not_found(content_type, id))?;

            let builder = self.builder(schema);
            let lookup = StoreQuery {
                scope: self.scope(content_type),
                condition: Some(Condition::compare(
                    Column::system(SystemField::Id),
                    CompareOp::Eq,
                    json!(id.to_string()),
                )),
                limit: Some(1),
                projection: builder.projection(&query.select)?,
                ..Default::default()
            };
            let mut found = self.store.find(ctx, &lookup).during(Operation::Get)?;
            if found.is_empty() {
                return Err(ExecutorError::not_found(content_type, id.to_string()));
            }
            self.populate(ctx, &mut found, query)?;
            Ok(found.remove(0))
        })
    }

    /// Ids of the matching page, in result order.
    pub fn execute_ids(&self, ctx: &QueryContext, content_type: &str, query: &Query) -> ExecutorResult<Vec<Uuid>> {
        self.observe(ctx, Operation::Ids, content_type, || {
            let schema = self.schema(content_type)?;
            QueryValidator::new(schema).validate(query)?;
            let mut list = self.builder(schema).build_list(query)?;
            list.projection = Projection::SystemOnly;
            let docs = self.store.find(ctx, &list).during(Operation::Ids)?;
            Ok(docs.into_iter().map(|d| d.id).collect())
        })
    }

    /// Distinct values of `field` among documents matching the query's
    /// filters, in ascending text order.
    pub fn execute_distinct(
        &self,
        ctx: &QueryContext,
        content_type: &str,
        field: &str,
        query: &Query,
    ) -> ExecutorResult<Vec<Value>> {
        self.observe(ctx, Operation::Distinct, content_type, || {
            let schema = self.schema(content_type)?;
            QueryValidator::new(schema).validate(query)?;

            let builder = self.builder(schema);
            let column = builder.column(field, FieldLocation::Select)?;
            let mut distinct = builder.build_count(query)?;
            if query.pagination.uses_offset() {
                distinct.limit = query.pagination.limit;
            }
            self.store.distinct(ctx, &distinct, &column).during(Operation::Distinct)
        })
    }

    /// Grouped aggregate: rows of `{groupKey, values}`.
    pub fn execute_aggregate(
        &self,
        ctx: &QueryContext,
        content_type: &str,
        query: &AggregateQuery,
    ) -> ExecutorResult<Vec<AggregateResult>> {
        self.observe(ctx, Operation::Aggregate, content_type, || {
            let schema = self.schema(content_type)?;
            QueryValidator::new(schema).validate_aggregate(query)?;
            let plan = self.builder(schema).build_aggregate(query)?;
            let rows = self.store.aggregate(ctx, &plan).during(Operation::Aggregate)?;
            let group_names: Vec<&str> = plan.group_by.iter().map(|k| k.name.as_str()).collect();
            Ok(rows.into_iter().map(|row| reshape(row, &group_names)).collect())
        })
    }

    fn populate(&self, ctx: &QueryContext, entries: &mut [Document], query: &Query) -> ExecutorResult<()> {
        if query.populate.is_empty() {
            return Ok(());
        }
        let config = PopulateConfig::from_options(&query.populate, self.config.max_populate_depth);
        Populator::new(self.store, Scope::tenant(self.tenant.clone())).populate_entries(ctx, entries, &config)
    }
}

/// Splits a flat aggregate row into group key and values.
pub(crate) fn reshape(row: Map<String, Value>, group_names: &[&str]) -> AggregateResult {
    let mut group_key = Map::new();
    let mut values = Map::new();
    for (name, value) in row {
        if group_names.contains(&name.as_str()) {
            group_key.insert(name, value);
        } else {
            values.insert(name, value);
        }
    }
    AggregateResult { group_key, values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FilterCondition, FilterOperator};
    use crate::schema::{FieldType, ValidationError};
    use crate::store::{MemoryStore, StoreError};

    fn fixture() -> (MemoryStore, SchemaRegistry, EngineConfig) {
        let mut schemas = SchemaRegistry::new();
        schemas.register(
            FieldSchema::new("article")
                .with_field("title", FieldType::Text)
                .with_field("price", FieldType::Decimal),
        );
        let store = MemoryStore::new();
        for i in 1..=5i64 {
            store
                .insert(Document::from_json("article", json!({"title": format!("Post {}", i), "price": i * 10})))
                .unwrap();
        }
        (store, schemas, EngineConfig::default())
    }

    #[test]
    fn test_execute_page_and_totals() {
        let (store, schemas, config) = fixture();
        let executor = QueryExecutor::new(&store, &schemas, &config);
        let mut query = Query::new();
        query.add_filter(FilterCondition::new("price", FilterOperator::Gte, 20i64));
        query.set_page(2, 3);

        let result = executor.execute(&QueryContext::new(), "article", &query).unwrap();
        assert_eq!(result.total_items, 4);
        assert_eq!(result.total_pages, 2);
        assert_eq!(result.page, 2);
        assert_eq!(result.page_size, 3);
        assert_eq!(result.entries.len(), 1);
    }

    #[test]
    fn test_validation_failure_never_reaches_store() {
        let (store, schemas, config) = fixture();
        let executor = QueryExecutor::new(&store, &schemas, &config);
        let mut query = Query::new();
        query.add_filter(FilterCondition::eq("colour", "red"));

        let err = executor.execute(&QueryContext::new(), "article", &query).unwrap_err();
        assert!(matches!(err, ExecutorError::Validation(ValidationError::UnknownField { .. })));
        assert_eq!(store.query_calls(), (0, 0));
    }

    #[test]
    fn test_unknown_content_type() {
        let (store, schemas, config) = fixture();
        let executor = QueryExecutor::new(&store, &schemas, &config);
        let err = executor.execute_count(&QueryContext::new(), "page", &Query::new()).unwrap_err();
        assert_eq!(err.code(), "AERO_UNKNOWN_CONTENT_TYPE");
    }

    #[test]
    fn test_cancellation_is_forwarded() {
        let (store, schemas, config) = fixture();
        let executor = QueryExecutor::new(&store, &schemas, &config);
        let ctx = QueryContext::new();
        ctx.cancel_handle().cancel();
        let err = executor.execute(&ctx, "article", &Query::new()).unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::Store {
                operation: Operation::List,
                source: StoreError::Cancelled
            }
        ));
    }

    #[test]
    fn test_reshape_splits_keys() {
        let mut row = Map::new();
        row.insert("status".into(), json!("draft"));
        row.insert("count".into(), json!(3));
        let result = reshape(row, &["status"]);
        assert_eq!(result.key("status"), Some(&json!("draft")));
        assert_eq!(result.value("count"), Some(&json!(3)));
    }
}

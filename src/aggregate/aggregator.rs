//! Aggregator
//!
//! Compiles simple aggregates and the fixed rollups into `AggregatePlan`s
//! and runs them through the store. Rows come back flat and are reshaped
//! into `{groupKey, values}`.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value};

use crate::builder::{AggregateExpr, AggregatePlan, Column, CompareOp, Condition, GroupKey, OutputOrder, Scope, StoreQuery};
use crate::config::EngineConfig;
use crate::executor::{reshape, AggregateResult, ExecutorError, ExecutorResult, Operation, QueryExecutor, StoreResultExt};
use crate::query::{AggregateOperator, DateTrunc, SystemField};
use crate::schema::{FieldLocation, SchemaRegistry};
use crate::store::{DocumentStore, QueryContext};

use super::simple::SimpleAggregate;
use super::stats::{ContentTypeStats, StoreStats, TimeBucket};

const STATUS_KEY: &str = "status";
const COUNT_ALIAS: &str = "count";
const BUCKET_KEY: &str = "bucket";

pub struct Aggregator<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    executor: QueryExecutor<'a, S>,
    config: &'a EngineConfig,
    tenant: Option<String>,
    now: Option<DateTime<Utc>>,
}

impl<'a, S: DocumentStore + ?Sized> Aggregator<'a, S> {
    pub fn new(store: &'a S, schemas: &'a SchemaRegistry, config: &'a EngineConfig) -> Self {
        Self {
            store,
            executor: QueryExecutor::new(store, schemas, config),
            config,
            tenant: None,
            now: None,
        }
    }

    pub fn with_tenant(mut self, tenant: Option<String>) -> Self {
        self.executor = self.executor.with_tenant(tenant.clone());
        self.tenant = tenant;
        self
    }

    /// Fixes the clock used for "recent" and "scheduled" windows.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    /// Runs one aggregate, grouped rows ordered by the aggregate value
    /// descending.
    pub fn aggregate(
        &self,
        ctx: &QueryContext,
        content_type: &str,
        request: &SimpleAggregate,
    ) -> ExecutorResult<Vec<AggregateResult>> {
        self.executor.observe(ctx, Operation::Aggregate, content_type, || {
            let schema = self.executor.schema(content_type)?;
            let builder = self.executor.builder(schema);

            let column = match (&request.field, request.operator.requires_field()) {
                (Some(field), _) => {
                    let column = builder.column(field, FieldLocation::Aggregation)?;
                    let numeric = schema.resolve(field).is_some_and(|r| r.is_numeric());
                    if request.operator.requires_numeric() && !numeric {
                        return Err(ExecutorError::InvalidAggregate(format!(
                            "'{}' requires a numeric field, '{}' is not",
                            request.operator, field
                        )));
                    }
                    Some(column)
                }
                (None, true) => {
                    return Err(ExecutorError::InvalidAggregate(format!(
                        "'{}' requires a field",
                        request.operator
                    )))
                }
                (None, false) => None,
            };

            let mut plan = AggregatePlan {
                scope: builder.scope().clone(),
                aggregates: vec![AggregateExpr {
                    alias: request.alias().to_string(),
                    function: request.operator,
                    column,
                }],
                ..Default::default()
            };
            if let Some(field) = &request.group_by {
                plan.group_by.push(builder.group_key(field, request.date_trunc)?);
                plan.order.push(OutputOrder {
                    name: request.alias().to_string(),
                    descending: true,
                });
            }

            let rows = self.store.aggregate(ctx, &plan).during(Operation::Aggregate)?;
            let group_names: Vec<&str> = plan.group_by.iter().map(|k| k.name.as_str()).collect();
            Ok(rows.into_iter().map(|row| reshape(row, &group_names)).collect())
        })
    }

    /// Totals, status buckets, recent and scheduled counts of one type.
    pub fn content_type_stats(&self, ctx: &QueryContext, content_type: &str) -> ExecutorResult<ContentTypeStats> {
        self.executor.observe(ctx, Operation::Stats, content_type, || {
            self.executor.schema(content_type)?;
            let scope = self.executor.scope(content_type);
            let by_status = self.status_counts(ctx, &scope)?;
            Ok(ContentTypeStats {
                content_type: content_type.to_string(),
                total: by_status.values().sum(),
                by_status,
                recently_updated: self.count_where(ctx, &scope, self.recent_condition())?,
                scheduled: self.count_where(ctx, &scope, self.scheduled_condition())?,
            })
        })
    }

    /// Rollup over every content type of the tenant.
    pub fn store_stats(&self, ctx: &QueryContext) -> ExecutorResult<StoreStats> {
        self.executor.observe(ctx, Operation::Stats, "*", || {
            let scope = Scope::tenant(self.tenant.clone());
            let types = self.store.content_types(ctx, &scope).during(Operation::Stats)?;

            let mut by_type = BTreeMap::new();
            for content_type in &types {
                let typed = Scope::content_type(content_type.as_str()).with_tenant(self.tenant.clone());
                let count = self.count_where(ctx, &typed, None)?;
                by_type.insert(content_type.clone(), count);
            }

            let by_status = self.status_counts(ctx, &scope)?;
            Ok(StoreStats {
                content_types: types.len() as u64,
                total_entries: by_type.values().sum(),
                by_status,
                by_type,
                recently_updated: self.count_where(ctx, &scope, self.recent_condition())?,
                scheduled: self.count_where(ctx, &scope, self.scheduled_condition())?,
                revisions: self.store.count_revisions(ctx, &scope).during(Operation::Stats)?,
            })
        })
    }

    /// Document counts bucketed by truncated creation date, newest first.
    ///
    /// `limit` defaults to, and is capped at, the configured window.
    pub fn time_series(
        &self,
        ctx: &QueryContext,
        content_type: &str,
        trunc: Option<DateTrunc>,
        limit: Option<u64>,
    ) -> ExecutorResult<Vec<TimeBucket>> {
        self.executor.observe(ctx, Operation::Stats, content_type, || {
            self.executor.schema(content_type)?;
            let window = self.config.time_series_days.max(1);
            let plan = AggregatePlan {
                scope: self.executor.scope(content_type),
                group_by: vec![GroupKey {
                    name: BUCKET_KEY.to_string(),
                    column: Column::system(SystemField::CreatedAt),
                    trunc: Some(trunc.unwrap_or_default()),
                }],
                aggregates: vec![count_expr()],
                order: vec![OutputOrder {
                    name: BUCKET_KEY.to_string(),
                    descending: true,
                }],
                limit: Some(limit.unwrap_or(window).clamp(1, window)),
                ..Default::default()
            };
            let rows = self.store.aggregate(ctx, &plan).during(Operation::Stats)?;
            Ok(rows
                .iter()
                .filter_map(|row| {
                    let bucket = row.get(BUCKET_KEY)?.as_str()?.to_string();
                    Some(TimeBucket {
                        bucket,
                        count: row_count(row),
                    })
                })
                .collect())
        })
    }

    fn status_counts(&self, ctx: &QueryContext, scope: &Scope) -> ExecutorResult<BTreeMap<String, u64>> {
        let plan = AggregatePlan {
            scope: scope.clone(),
            group_by: vec![GroupKey {
                name: STATUS_KEY.to_string(),
                column: Column::system(SystemField::Status),
                trunc: None,
            }],
            aggregates: vec![count_expr()],
            ..Default::default()
        };
        let rows = self.store.aggregate(ctx, &plan).during(Operation::Stats)?;
        Ok(rows
            .iter()
            .filter_map(|row| Some((row.get(STATUS_KEY)?.as_str()?.to_string(), row_count(row))))
            .collect())
    }

    fn count_where(&self, ctx: &QueryContext, scope: &Scope, condition: Option<Condition>) -> ExecutorResult<u64> {
        let query = StoreQuery {
            condition,
            ..StoreQuery::new(scope.clone())
        };
        self.store.count(ctx, &query).during(Operation::Stats)
    }

    fn recent_condition(&self) -> Option<Condition> {
        let since = self.now() - Duration::days(self.config.recent_window_days);
        Some(Condition::compare(
            Column::system(SystemField::UpdatedAt),
            CompareOp::Gte,
            json!(since.to_rfc3339()),
        ))
    }

    fn scheduled_condition(&self) -> Option<Condition> {
        Some(Condition::compare(
            Column::system(SystemField::ScheduledAt),
            CompareOp::Gt,
            json!(self.now().to_rfc3339()),
        ))
    }
}

fn count_expr() -> AggregateExpr {
    AggregateExpr {
        alias: COUNT_ALIAS.to_string(),
        function: AggregateOperator::Count,
        column: None,
    }
}

fn row_count(row: &Map<String, Value>) -> u64 {
    row.get(COUNT_ALIAS).and_then(Value::as_u64).unwrap_or(0)
}

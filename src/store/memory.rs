//! In-memory document store
//!
//! Reference `DocumentStore` that evaluates compiled queries directly over
//! documents held in memory. It mirrors the semantics of the PostgreSQL
//! rendering closely enough to test the engine end to end, and counts the
//! calls it receives so batching can be asserted.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::builder::{AggregatePlan, Cast, Column, GroupKey, Scope, StoreQuery};
use crate::query::{AggregateOperator, DateTrunc};

use super::context::QueryContext;
use super::document::{Document, RelationEdge, ScoredDocument};
use super::errors::{StoreError, StoreResult};
use super::eval::{as_text, cast_value, compare_nulls_last, parse_timestamp, sort_key, text_rank, Evaluator, RowSource, Typed};
use super::DocumentStore;

/// A stored revision of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    pub document_id: Uuid,
    pub version: i64,
}

#[derive(Default)]
struct Inner {
    documents: Vec<Document>,
    edges: Vec<RelationEdge>,
    revisions: Vec<Revision>,
}

#[derive(Default)]
struct CallCounts {
    find: AtomicU64,
    count: AtomicU64,
    relation_edges: AtomicU64,
    find_by_ids: AtomicU64,
}

/// Thread-safe in-memory store
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    calls: CallCounts,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| StoreError::backend("store lock poisoned"))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| StoreError::backend("store lock poisoned"))
    }

    /// Inserts a document, replacing any document with the same id.
    pub fn insert(&self, document: Document) -> StoreResult<Uuid> {
        let id = document.id;
        let mut inner = self.write()?;
        match inner.documents.iter_mut().find(|d| d.id == id) {
            Some(existing) => *existing = document,
            None => inner.documents.push(document),
        }
        Ok(id)
    }

    pub fn insert_many(&self, documents: impl IntoIterator<Item = Document>) -> StoreResult<Vec<Uuid>> {
        documents.into_iter().map(|d| self.insert(d)).collect()
    }

    /// Adds a relation edge from `source_id` to `target_id`.
    pub fn link(&self, edge: RelationEdge) -> StoreResult<()> {
        self.write()?.edges.push(edge);
        Ok(())
    }

    pub fn add_revision(&self, document_id: Uuid, version: i64) -> StoreResult<()> {
        self.write()?.revisions.push(Revision { document_id, version });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.read().map(|inner| inner.documents.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `relation_edges` calls received
    pub fn relation_lookups(&self) -> u64 {
        self.calls.relation_edges.load(AtomicOrdering::SeqCst)
    }

    /// Number of `find_by_ids` calls received
    pub fn id_lookups(&self) -> u64 {
        self.calls.find_by_ids.load(AtomicOrdering::SeqCst)
    }

    /// Number of `find` and `count` calls received
    pub fn query_calls(&self) -> (u64, u64) {
        (
            self.calls.find.load(AtomicOrdering::SeqCst),
            self.calls.count.load(AtomicOrdering::SeqCst),
        )
    }

    /// Documents inside the scope satisfying the query, ordered.
    fn select<'a>(inner: &'a Inner, query: &StoreQuery, evaluator: &Evaluator) -> Vec<(&'a Document, f64)> {
        let mut rows: Vec<(&Document, f64)> = inner
            .documents
            .iter()
            .filter(|d| in_scope(d, &query.scope))
            .filter(|d| evaluator.matches(query.condition.as_ref(), *d))
            .map(|d| {
                let rank = match &query.rank {
                    Some(rank) => text_rank(&d.text(&rank.columns), &rank.query),
                    None => 0.0,
                };
                (d, rank)
            })
            .collect();

        rows.sort_by(|(a, rank_a), (b, rank_b)| {
            let by_rank = rank_b.partial_cmp(rank_a).unwrap_or(Ordering::Equal);
            query.order.iter().fold(by_rank, |ord, term| {
                ord.then_with(|| {
                    let ka = sort_key(*a, &term.column);
                    let kb = sort_key(*b, &term.column);
                    if term.nulls_last {
                        compare_nulls_last(ka.as_ref(), kb.as_ref(), term.descending)
                    } else {
                        compare_nulls_last(kb.as_ref(), ka.as_ref(), !term.descending)
                    }
                })
            })
        });

        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        rows.into_iter().skip(offset).take(limit).collect()
    }
}

fn in_scope(document: &Document, scope: &Scope) -> bool {
    let type_ok = scope
        .content_type
        .as_ref()
        .map_or(true, |t| &document.content_type == t);
    let tenant_ok = scope
        .tenant_id
        .as_ref()
        .map_or(true, |t| document.tenant_id.as_ref() == Some(t));
    type_ok && tenant_ok
}

/// Truncates a timestamp the way `date_trunc` does; weeks start on Monday.
pub(crate) fn truncate(at: DateTime<Utc>, trunc: DateTrunc) -> DateTime<Utc> {
    let date = at.date_naive();
    let day_start = |d: NaiveDate| {
        d.and_hms_opt(0, 0, 0)
            .map(|t| Utc.from_utc_datetime(&t))
            .unwrap_or(at)
    };
    match trunc {
        DateTrunc::Hour => date
            .and_hms_opt(at.hour(), 0, 0)
            .map(|t| Utc.from_utc_datetime(&t))
            .unwrap_or(at),
        DateTrunc::Day => day_start(date),
        DateTrunc::Week => day_start(date - Duration::days(i64::from(date.weekday().num_days_from_monday()))),
        DateTrunc::Month => date.with_day(1).map(day_start).unwrap_or(at),
        DateTrunc::Year => date.with_ordinal(1).map(day_start).unwrap_or(at),
    }
}

/// Output value of a group key for one document
fn group_value(document: &Document, key: &GroupKey) -> Value {
    let raw = match document.column_value(&key.column) {
        Some(value) => value,
        None => return Value::Null,
    };
    if let Some(trunc) = key.trunc {
        return raw
            .as_str()
            .and_then(parse_timestamp)
            .map(|t| Value::String(truncate(t, trunc).to_rfc3339()))
            .unwrap_or(Value::Null);
    }
    match key.column {
        Column::Document { .. } => as_text(&raw).map(Value::String).unwrap_or(Value::Null),
        _ => raw,
    }
}

/// Integral results render as integers
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

fn aggregate_value(function: AggregateOperator, column: Option<&Column>, rows: &[&Document]) -> Value {
    let column = match (function, column) {
        (AggregateOperator::Count, None) => return Value::from(rows.len() as u64),
        (_, Some(column)) => column,
        (_, None) => return Value::Null,
    };

    match function {
        AggregateOperator::Count => {
            let present = rows
                .iter()
                .filter(|d| d.column_value(column).is_some_and(|v| !v.is_null()))
                .count();
            Value::from(present as u64)
        }
        AggregateOperator::Min | AggregateOperator::Max => extreme(column, rows, function == AggregateOperator::Max),
        AggregateOperator::Sum | AggregateOperator::Avg => {
            let values: Vec<f64> = rows
                .iter()
                .filter_map(|d| d.column_value(column))
                .filter_map(|v| match cast_value(&v, Some(Cast::Numeric)) {
                    Some(Typed::Number(n)) => Some(n),
                    _ => None,
                })
                .collect();
            if values.is_empty() {
                return Value::Null;
            }
            let total: f64 = values.iter().sum();
            if function == AggregateOperator::Sum {
                number(total)
            } else {
                Value::from(total / values.len() as f64)
            }
        }
    }
}

/// Smallest or largest value in the column's declared type; NULLs and
/// failed casts are skipped.
fn extreme(column: &Column, rows: &[&Document], largest: bool) -> Value {
    rows.iter()
        .filter_map(|d| {
            let key = sort_key(*d, column)?;
            d.column_value(column).map(|raw| (key, raw))
        })
        .min_by(|(a, _), (b, _)| compare_nulls_last(Some(a), Some(b), largest))
        .map(|(key, raw)| match key {
            Typed::Number(n) => number(n),
            Typed::Date(date) => Value::String(date.to_string()),
            Typed::Text(text) => Value::String(text),
            Typed::Bool(_) | Typed::Time(_) => raw,
        })
        .unwrap_or(Value::Null)
}

impl DocumentStore for MemoryStore {
    fn find(&self, ctx: &QueryContext, query: &StoreQuery) -> StoreResult<Vec<Document>> {
        self.calls.find.fetch_add(1, AtomicOrdering::SeqCst);
        ctx.check()?;
        let inner = self.read()?;
        let evaluator = Evaluator::new();
        Ok(Self::select(&inner, query, &evaluator)
            .into_iter()
            .map(|(d, _)| d.clone().project(&query.projection))
            .collect())
    }

    fn count(&self, ctx: &QueryContext, query: &StoreQuery) -> StoreResult<u64> {
        self.calls.count.fetch_add(1, AtomicOrdering::SeqCst);
        ctx.check()?;
        let inner = self.read()?;
        let evaluator = Evaluator::new();
        let count = inner
            .documents
            .iter()
            .filter(|d| in_scope(d, &query.scope))
            .filter(|d| evaluator.matches(query.condition.as_ref(), *d))
            .count();
        Ok(count as u64)
    }

    fn distinct(&self, ctx: &QueryContext, query: &StoreQuery, column: &Column) -> StoreResult<Vec<Value>> {
        ctx.check()?;
        let inner = self.read()?;
        let evaluator = Evaluator::new();
        let values: BTreeSet<String> = inner
            .documents
            .iter()
            .filter(|d| in_scope(d, &query.scope))
            .filter(|d| evaluator.matches(query.condition.as_ref(), *d))
            .filter_map(|d| d.column_value(column))
            .filter_map(|v| as_text(&v))
            .collect();
        let limit = query
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        Ok(values.into_iter().take(limit).map(Value::String).collect())
    }

    fn aggregate(&self, ctx: &QueryContext, plan: &AggregatePlan) -> StoreResult<Vec<Map<String, Value>>> {
        ctx.check()?;
        let inner = self.read()?;
        let evaluator = Evaluator::new();
        let matching: Vec<&Document> = inner
            .documents
            .iter()
            .filter(|d| in_scope(d, &plan.scope))
            .filter(|d| evaluator.matches(plan.condition.as_ref(), *d))
            .collect();

        // Groups in first-seen order
        let mut groups: Vec<(Vec<Value>, Vec<&Document>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        if plan.group_by.is_empty() {
            groups.push((Vec::new(), matching));
        } else {
            for document in matching {
                let key: Vec<Value> = plan.group_by.iter().map(|k| group_value(document, k)).collect();
                let fingerprint = Value::Array(key.clone()).to_string();
                match index.get(&fingerprint) {
                    Some(&i) => groups[i].1.push(document),
                    None => {
                        index.insert(fingerprint, groups.len());
                        groups.push((key, vec![document]));
                    }
                }
            }
        }

        let mut rows: Vec<Map<String, Value>> = groups
            .into_iter()
            .map(|(key, members)| {
                let mut row = Map::new();
                for (group, value) in plan.group_by.iter().zip(key) {
                    row.insert(group.name.clone(), value);
                }
                for agg in &plan.aggregates {
                    row.insert(agg.alias.clone(), aggregate_value(agg.function, agg.column.as_ref(), &members));
                }
                row
            })
            .filter(|row| evaluator.matches(plan.having.as_ref(), row))
            .collect();

        rows.sort_by(|a, b| {
            plan.order.iter().fold(Ordering::Equal, |ord, term| {
                ord.then_with(|| {
                    let column = Column::output(term.name.clone());
                    compare_nulls_last(
                        sort_key(a, &column).as_ref(),
                        sort_key(b, &column).as_ref(),
                        term.descending,
                    )
                })
            })
        });

        if let Some(limit) = plan.limit {
            rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        Ok(rows)
    }

    fn relation_edges(&self, ctx: &QueryContext, source_ids: &[Uuid], field: &str) -> StoreResult<Vec<RelationEdge>> {
        self.calls.relation_edges.fetch_add(1, AtomicOrdering::SeqCst);
        ctx.check()?;
        let inner = self.read()?;
        let wanted: HashSet<&Uuid> = source_ids.iter().collect();
        let mut edges: Vec<RelationEdge> = inner
            .edges
            .iter()
            .filter(|e| e.field == field && wanted.contains(&e.source_id))
            .cloned()
            .collect();
        edges.sort_by(|a, b| a.source_id.cmp(&b.source_id).then(a.order.cmp(&b.order)));
        Ok(edges)
    }

    fn find_by_ids(&self, ctx: &QueryContext, scope: &Scope, ids: &[Uuid]) -> StoreResult<Vec<Document>> {
        self.calls.find_by_ids.fetch_add(1, AtomicOrdering::SeqCst);
        ctx.check()?;
        let inner = self.read()?;
        let wanted: HashSet<&Uuid> = ids.iter().collect();
        Ok(inner
            .documents
            .iter()
            .filter(|d| wanted.contains(&d.id) && in_scope(d, scope))
            .cloned()
            .collect())
    }

    fn search(&self, ctx: &QueryContext, query: &StoreQuery) -> StoreResult<Vec<ScoredDocument>> {
        ctx.check()?;
        if query.rank.is_none() {
            return Err(StoreError::Unsupported("search without a rank expression".to_string()));
        }
        let inner = self.read()?;
        let evaluator = Evaluator::new();
        Ok(Self::select(&inner, query, &evaluator)
            .into_iter()
            .map(|(d, rank)| ScoredDocument {
                document: d.clone().project(&query.projection),
                rank,
            })
            .collect())
    }

    fn count_revisions(&self, ctx: &QueryContext, scope: &Scope) -> StoreResult<u64> {
        ctx.check()?;
        let inner = self.read()?;
        let in_scope_ids: HashSet<Uuid> = inner
            .documents
            .iter()
            .filter(|d| in_scope(d, scope))
            .map(|d| d.id)
            .collect();
        Ok(inner
            .revisions
            .iter()
            .filter(|r| in_scope_ids.contains(&r.document_id))
            .count() as u64)
    }

    fn content_types(&self, ctx: &QueryContext, scope: &Scope) -> StoreResult<Vec<String>> {
        ctx.check()?;
        let inner = self.read()?;
        let types: BTreeSet<String> = inner
            .documents
            .iter()
            .filter(|d| in_scope(d, scope))
            .map(|d| d.content_type.clone())
            .collect();
        Ok(types.into_iter().collect())
    }
}

//! PostgreSQL rendering
//!
//! Renders compiled queries against a `documents` table whose payload lives
//! in a `data jsonb` column next to the system columns, and a
//! `content_relations` edge table. Operands are always bound as positional
//! parameters (`$1`, `$2`, ...); only validated field names are spliced into
//! the SQL text, quoted as literals.

use std::fmt;

use serde::Serialize;
use serde_json::{json, Value};

use crate::query::AggregateOperator;

use super::condition::{Column, Condition};
use super::plan::{AggregatePlan, OrderTerm, Projection, Scope, StoreQuery};

pub const DOCUMENTS_TABLE: &str = "documents";
pub const RELATIONS_TABLE: &str = "content_relations";

const SYSTEM_COLUMNS: &str =
    "id, content_type, tenant_id, status, version, created_at, updated_at, published_at, scheduled_at, created_by, updated_by";

/// Rendered SQL with its bind parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl fmt::Display for SqlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.sql)?;
        for (i, param) in self.params.iter().enumerate() {
            writeln!(f, "  ${} = {}", i + 1, param)?;
        }
        Ok(())
    }
}

/// Output-name lookup used while rendering `HAVING`
type OutputExprs<'a> = &'a [(String, String)];

#[derive(Default)]
struct Renderer {
    params: Vec<Value>,
}

impl Renderer {
    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    fn finish(self, sql: String) -> SqlStatement {
        SqlStatement {
            sql,
            params: self.params,
        }
    }

    fn scope(&mut self, scope: &Scope, condition: Option<&Condition>, outputs: OutputExprs<'_>) -> String {
        let mut clauses = Vec::new();
        if let Some(content_type) = &scope.content_type {
            clauses.push(format!("content_type = {}", self.bind(json!(content_type))));
        }
        if let Some(tenant) = &scope.tenant_id {
            clauses.push(format!("tenant_id = {}", self.bind(json!(tenant))));
        }
        if let Some(condition) = condition {
            clauses.push(self.condition(condition, outputs));
        }
        if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        }
    }

    fn condition(&mut self, condition: &Condition, outputs: OutputExprs<'_>) -> String {
        match condition {
            Condition::Compare { column, op, value } => {
                let lhs = typed_expr(column, outputs);
                format!("{} {} {}", lhs, op.sql(), self.bind(value.clone()))
            }
            Condition::Pattern {
                column,
                pattern,
                case_insensitive,
            } => {
                let op = if *case_insensitive { "ILIKE" } else { "LIKE" };
                format!("{} {} {}", text_expr(column, outputs), op, self.bind(json!(pattern)))
            }
            Condition::InList { column, values, negated } => {
                if values.is_empty() {
                    return if *negated { "TRUE" } else { "FALSE" }.to_string();
                }
                let lhs = typed_expr(column, outputs);
                let binds: Vec<String> = values.iter().map(|v| self.bind(v.clone())).collect();
                let op = if *negated { "NOT IN" } else { "IN" };
                format!("{} {} ({})", lhs, op, binds.join(", "))
            }
            Condition::IsNull { column, negated } => match column {
                Column::Document { .. } => {
                    let text = text_expr(column, outputs);
                    if *negated {
                        format!("({text} IS NOT NULL AND {text} <> '')")
                    } else {
                        format!("({text} IS NULL OR {text} = '')")
                    }
                }
                _ => {
                    let op = if *negated { "IS NOT NULL" } else { "IS NULL" };
                    format!("{} {}", text_expr(column, outputs), op)
                }
            },
            Condition::Exists { column, negated } => {
                let present = match column {
                    Column::Document { path, .. } if path.len() == 1 => {
                        format!("data ? {}", self.bind(json!(path[0])))
                    }
                    Column::Document { .. } => format!("{} IS NOT NULL", json_expr(column, outputs)),
                    _ => format!("{} IS NOT NULL", text_expr(column, outputs)),
                };
                if *negated {
                    format!("NOT ({})", present)
                } else {
                    present
                }
            }
            Condition::Contains { column, value } => {
                format!("{} @> {}::jsonb", json_expr(column, outputs), self.bind(value.clone()))
            }
            Condition::HasKey { column, key } => {
                format!("{} ? {}", json_expr(column, outputs), self.bind(json!(key)))
            }
            Condition::Between { column, low, high } => {
                let lhs = typed_expr(column, outputs);
                let low = self.bind(low.clone());
                let high = self.bind(high.clone());
                format!("{} BETWEEN {} AND {}", lhs, low, high)
            }
            Condition::FullText {
                columns,
                query,
                language,
            } => {
                let document = search_document(columns);
                let lang = self.bind(json!(language));
                let q = self.bind(json!(query));
                format!(
                    "to_tsvector({lang}::regconfig, {document}) @@ plainto_tsquery({lang}::regconfig, {q})"
                )
            }
            Condition::And(items) => self.join(items, " AND ", "TRUE", outputs),
            Condition::Or(items) => self.join(items, " OR ", "FALSE", outputs),
            Condition::Not(inner) => format!("NOT ({})", self.condition(inner, outputs)),
        }
    }

    fn join(&mut self, items: &[Condition], sep: &str, empty: &str, outputs: OutputExprs<'_>) -> String {
        if items.is_empty() {
            return empty.to_string();
        }
        let parts: Vec<String> = items.iter().map(|c| self.condition(c, outputs)).collect();
        format!("({})", parts.join(sep))
    }

    fn order(&mut self, terms: &[OrderTerm]) -> Vec<String> {
        terms
            .iter()
            .map(|t| {
                format!(
                    "{} {}{}",
                    typed_expr(&t.column, &[]),
                    if t.descending { "DESC" } else { "ASC" },
                    if t.nulls_last { " NULLS LAST" } else { "" }
                )
            })
            .collect()
    }
}

/// Quote a string as a SQL literal
fn literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Quote an identifier
fn ident(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn path_literal(path: &[String]) -> String {
    let inner: Vec<String> = path
        .iter()
        .map(|p| format!("\"{}\"", p.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    literal(&format!("{{{}}}", inner.join(",")))
}

fn output_expr(name: &str, outputs: OutputExprs<'_>) -> String {
    outputs
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, expr)| expr.clone())
        .unwrap_or_else(|| ident(name))
}

/// Text-valued expression (`->>`)
fn text_expr(column: &Column, outputs: OutputExprs<'_>) -> String {
    match column {
        Column::System { field } => field.column().to_string(),
        Column::Document { path, .. } if path.len() == 1 => format!("data->>{}", literal(&path[0])),
        Column::Document { path, .. } => format!("data#>>{}", path_literal(path)),
        Column::Output { name } => output_expr(name, outputs),
    }
}

/// JSON-valued expression (`->`)
fn json_expr(column: &Column, outputs: OutputExprs<'_>) -> String {
    match column {
        Column::System { field } => format!("to_jsonb({})", field.column()),
        Column::Document { path, .. } if path.len() == 1 => format!("data->{}", literal(&path[0])),
        Column::Document { path, .. } => format!("data#>{}", path_literal(path)),
        Column::Output { name } => format!("to_jsonb({})", output_expr(name, outputs)),
    }
}

/// Expression cast to the column's declared type
fn typed_expr(column: &Column, outputs: OutputExprs<'_>) -> String {
    match (column, column.cast()) {
        (Column::Document { .. }, Some(cast)) => format!("({})::{}", text_expr(column, outputs), cast.sql_type()),
        _ => text_expr(column, outputs),
    }
}

fn numeric_expr(column: &Column) -> String {
    match column {
        Column::Document { .. } => format!("({})::numeric", text_expr(column, &[])),
        _ => text_expr(column, &[]),
    }
}

fn search_document(columns: &[Column]) -> String {
    if columns.is_empty() {
        return "data::text".to_string();
    }
    let parts: Vec<String> = columns.iter().map(|c| text_expr(c, &[])).collect();
    format!("concat_ws(' ', {})", parts.join(", "))
}

fn projection(projection: &Projection, r: &mut Renderer) -> String {
    match projection {
        Projection::All => format!("{}, data", SYSTEM_COLUMNS),
        Projection::SystemOnly => SYSTEM_COLUMNS.to_string(),
        Projection::Fields(fields) => {
            let pairs: Vec<String> = fields
                .iter()
                .map(|f| {
                    let key = r.bind(json!(f));
                    format!("{}, data->{}", key, literal(f))
                })
                .collect();
            format!("{}, jsonb_build_object({}) AS data", SYSTEM_COLUMNS, pairs.join(", "))
        }
    }
}

/// `SELECT` for a list query
pub fn render_select(query: &StoreQuery) -> SqlStatement {
    let mut r = Renderer::default();
    let mut select = projection(&query.projection, &mut r);

    let mut order = Vec::new();
    if let Some(rank) = &query.rank {
        let document = search_document(&rank.columns);
        let lang = r.bind(json!(rank.language));
        let q = r.bind(json!(rank.query));
        select.push_str(&format!(
            ", ts_rank(to_tsvector({lang}::regconfig, {document}), plainto_tsquery({lang}::regconfig, {q})) AS rank"
        ));
        order.push("rank DESC".to_string());
    }

    let mut sql = format!("SELECT {} FROM {}", select, DOCUMENTS_TABLE);
    sql.push_str(&r.scope(&query.scope, query.condition.as_ref(), &[]));

    order.extend(r.order(&query.order));
    if !order.is_empty() {
        sql.push_str(&format!(" ORDER BY {}", order.join(", ")));
    }
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    if query.offset > 0 {
        sql.push_str(&format!(" OFFSET {}", query.offset));
    }
    r.finish(sql)
}

/// `SELECT count(*)` over the query's collection and condition
pub fn render_count(query: &StoreQuery) -> SqlStatement {
    let mut r = Renderer::default();
    let mut sql = format!("SELECT count(*) FROM {}", DOCUMENTS_TABLE);
    sql.push_str(&r.scope(&query.scope, query.condition.as_ref(), &[]));
    r.finish(sql)
}

/// Distinct non-null values of one column
pub fn render_distinct(query: &StoreQuery, column: &Column) -> SqlStatement {
    let mut r = Renderer::default();
    let expr = text_expr(column, &[]);
    let mut sql = format!("SELECT DISTINCT {} AS value FROM {}", expr, DOCUMENTS_TABLE);
    let scope = r.scope(&query.scope, query.condition.as_ref(), &[]);
    if scope.is_empty() {
        sql.push_str(&format!(" WHERE {} IS NOT NULL", expr));
    } else {
        sql.push_str(&format!("{} AND {} IS NOT NULL", scope, expr));
    }
    sql.push_str(" ORDER BY value");
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    r.finish(sql)
}

/// Grouped aggregate
pub fn render_aggregate(plan: &AggregatePlan) -> SqlStatement {
    let mut r = Renderer::default();
    let mut outputs: Vec<(String, String)> = Vec::new();

    for key in &plan.group_by {
        let expr = match key.trunc {
            Some(trunc) => {
                let typed = match key.column.cast() {
                    Some(_) => typed_expr(&key.column, &[]),
                    None => format!("({})::timestamptz", text_expr(&key.column, &[])),
                };
                format!("date_trunc({}, {})", literal(trunc.as_str()), typed)
            }
            None => text_expr(&key.column, &[]),
        };
        outputs.push((key.name.clone(), expr));
    }
    let group_count = outputs.len();

    for agg in &plan.aggregates {
        let expr = match (agg.function, &agg.column) {
            (AggregateOperator::Count, None) => "count(*)".to_string(),
            (AggregateOperator::Count, Some(column)) => format!("count({})", text_expr(column, &[])),
            (function @ (AggregateOperator::Min | AggregateOperator::Max), Some(column)) => {
                format!("{}({})", function.as_str(), typed_expr(column, &[]))
            }
            (function, Some(column)) => format!("{}({})", function.as_str(), numeric_expr(column)),
            (function, None) => format!("{}(NULL)", function.as_str()),
        };
        outputs.push((agg.alias.clone(), expr));
    }

    let select: Vec<String> = outputs
        .iter()
        .map(|(name, expr)| format!("{} AS {}", expr, ident(name)))
        .collect();
    let mut sql = format!("SELECT {} FROM {}", select.join(", "), DOCUMENTS_TABLE);
    sql.push_str(&r.scope(&plan.scope, plan.condition.as_ref(), &[]));

    if group_count > 0 {
        let positions: Vec<String> = (1..=group_count).map(|i| i.to_string()).collect();
        sql.push_str(&format!(" GROUP BY {}", positions.join(", ")));
    }
    if let Some(having) = &plan.having {
        let rendered = r.condition(having, &outputs);
        sql.push_str(&format!(" HAVING {}", rendered));
    }
    if !plan.order.is_empty() {
        let order: Vec<String> = plan
            .order
            .iter()
            .map(|o| format!("{} {}", ident(&o.name), if o.descending { "DESC" } else { "ASC" }))
            .collect();
        sql.push_str(&format!(" ORDER BY {}", order.join(", ")));
    }
    if let Some(limit) = plan.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    r.finish(sql)
}

/// Relation edges of one field for a batch of sources
pub fn render_relation_edges(source_ids: &[String], field: &str) -> SqlStatement {
    let mut r = Renderer::default();
    let field = r.bind(json!(field));
    let ids = r.bind(json!(source_ids));
    let sql = format!(
        "SELECT source_id, target_id, field, \"order\" FROM {} WHERE field = {} AND source_id = ANY({}::uuid[]) ORDER BY source_id, \"order\"",
        RELATIONS_TABLE, field, ids
    );
    r.finish(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{AggregateExpr, Cast, CompareOp, GroupKey, OutputOrder};
    use crate::query::{DateTrunc, SystemField};
    use pretty_assertions::assert_eq;

    fn price() -> Column {
        Column::document("price", Some(Cast::Numeric))
    }

    #[test]
    fn test_distinct_skips_nulls() {
        let query = StoreQuery {
            limit: Some(5),
            ..StoreQuery::new(Scope::content_type("article"))
        };
        let stmt = render_distinct(&query, &Column::document("category", None));
        assert!(stmt.sql.starts_with("SELECT DISTINCT "));
        assert!(stmt.sql.contains("content_type = $1 AND "));
        assert!(stmt.sql.contains("IS NOT NULL ORDER BY value LIMIT 5"));
        assert_eq!(stmt.params, vec![json!("article")]);
    }

    #[test]
    fn test_select_with_cast_and_default_order() {
        let query = StoreQuery {
            scope: Scope::content_type("article"),
            condition: Some(Condition::compare(price(), CompareOp::Gte, json!(100))),
            order: vec![OrderTerm::new(Column::system(SystemField::CreatedAt), true)],
            limit: Some(20),
            offset: 0,
            ..Default::default()
        };
        let stmt = render_select(&query);
        assert_eq!(
            stmt.sql,
            format!(
                "SELECT {}, data FROM documents WHERE content_type = $1 AND (data->>'price')::numeric >= $2 ORDER BY created_at DESC NULLS LAST LIMIT 20",
                SYSTEM_COLUMNS
            )
        );
        assert_eq!(stmt.params, vec![json!("article"), json!(100)]);
    }

    #[test]
    fn test_or_and_not_rendering() {
        let title = Column::document("title", None);
        let condition = Condition::And(vec![
            Condition::compare(title.clone(), CompareOp::Eq, json!("a")),
            Condition::Or(vec![
                Condition::compare(title.clone(), CompareOp::Eq, json!("b")),
                Condition::negate(Condition::IsNull {
                    column: title,
                    negated: false,
                }),
            ]),
        ]);
        let stmt = render_count(&StoreQuery {
            condition: Some(condition),
            ..Default::default()
        });
        assert_eq!(
            stmt.sql,
            "SELECT count(*) FROM documents WHERE (data->>'title' = $1 AND (data->>'title' = $2 OR NOT ((data->>'title' IS NULL OR data->>'title' = ''))))"
        );
    }

    #[test]
    fn test_containment_and_keys() {
        let tags = Column::document("tags", None);
        let stmt = render_count(&StoreQuery {
            condition: Some(Condition::And(vec![
                Condition::Contains {
                    column: tags.clone(),
                    value: json!(["rust"]),
                },
                Condition::HasKey {
                    column: Column::document("meta", None),
                    key: "lang".into(),
                },
                Condition::Exists {
                    column: Column::document("meta.lang", None),
                    negated: true,
                },
            ])),
            ..Default::default()
        });
        assert_eq!(
            stmt.sql,
            "SELECT count(*) FROM documents WHERE (data->'tags' @> $1::jsonb AND data->'meta' ? $2 AND NOT (data#>'{\"meta\",\"lang\"}' IS NOT NULL))"
        );
        assert_eq!(stmt.params, vec![json!(["rust"]), json!("lang")]);
    }

    #[test]
    fn test_empty_in_list() {
        let stmt = render_count(&StoreQuery {
            condition: Some(Condition::InList {
                column: price(),
                values: vec![],
                negated: false,
            }),
            ..Default::default()
        });
        assert_eq!(stmt.sql, "SELECT count(*) FROM documents WHERE FALSE");
    }

    #[test]
    fn test_field_names_are_quoted() {
        let stmt = render_count(&StoreQuery {
            condition: Some(Condition::compare(
                Column::document("it's", None),
                CompareOp::Eq,
                json!(1),
            )),
            ..Default::default()
        });
        assert!(stmt.sql.contains("data->>'it''s' = $1"));
    }

    #[test]
    fn test_aggregate_having_uses_expressions() {
        let plan = AggregatePlan {
            scope: Scope::content_type("article"),
            group_by: vec![GroupKey {
                name: "createdAt".into(),
                column: Column::system(SystemField::CreatedAt),
                trunc: Some(DateTrunc::Month),
            }],
            aggregates: vec![
                AggregateExpr {
                    alias: "count".into(),
                    function: AggregateOperator::Count,
                    column: None,
                },
                AggregateExpr {
                    alias: "revenue".into(),
                    function: AggregateOperator::Sum,
                    column: Some(price()),
                },
            ],
            having: Some(Condition::compare(Column::output("revenue"), CompareOp::Gt, json!(10))),
            order: vec![OutputOrder {
                name: "revenue".into(),
                descending: true,
            }],
            limit: Some(5),
            ..Default::default()
        };
        let stmt = render_aggregate(&plan);
        assert_eq!(
            stmt.sql,
            "SELECT date_trunc('month', created_at) AS \"createdAt\", count(*) AS \"count\", sum((data->>'price')::numeric) AS \"revenue\" FROM documents WHERE content_type = $1 GROUP BY 1 HAVING sum((data->>'price')::numeric) > $2 ORDER BY \"revenue\" DESC LIMIT 5"
        );
    }

    #[test]
    fn test_min_max_keep_declared_type() {
        let aggregate = |function, column| AggregatePlan {
            scope: Scope::content_type("article"),
            aggregates: vec![AggregateExpr {
                alias: "value".into(),
                function,
                column: Some(column),
            }],
            ..Default::default()
        };

        let stmt = render_aggregate(&aggregate(AggregateOperator::Max, Column::document("title", None)));
        assert!(stmt.sql.starts_with("SELECT max(data->>'title') AS \"value\""));

        let published = Column::document("published", Some(Cast::Date));
        let stmt = render_aggregate(&aggregate(AggregateOperator::Min, published));
        assert!(stmt.sql.starts_with("SELECT min((data->>'published')::date) AS \"value\""));

        let stmt = render_aggregate(&aggregate(AggregateOperator::Max, Column::system(SystemField::CreatedAt)));
        assert!(stmt.sql.starts_with("SELECT max(created_at) AS \"value\""));
    }

    #[test]
    fn test_full_text_and_rank() {
        let columns = vec![Column::document("title", None), Column::document("body", None)];
        let query = StoreQuery {
            scope: Scope::content_type("article"),
            condition: Some(Condition::FullText {
                columns: columns.clone(),
                query: "rust guide".into(),
                language: "english".into(),
            }),
            rank: Some(crate::builder::RankSpec {
                columns,
                query: "rust guide".into(),
                language: "english".into(),
            }),
            projection: Projection::SystemOnly,
            limit: Some(10),
            offset: 10,
            ..Default::default()
        };
        let stmt = render_select(&query);
        assert!(stmt.sql.contains("ts_rank(to_tsvector($1::regconfig, concat_ws(' ', data->>'title', data->>'body'))"));
        assert!(stmt.sql.ends_with("ORDER BY rank DESC LIMIT 10 OFFSET 10"));
        assert_eq!(stmt.params.len(), 5);
    }

    #[test]
    fn test_relation_edges() {
        let stmt = render_relation_edges(&["a".to_string()], "author");
        assert!(stmt.sql.contains("source_id = ANY($2::uuid[])"));
        assert_eq!(stmt.params, vec![json!("author"), json!(["a"])]);
    }
}

//! Relation population
//!
//! Resolves relation edges into attached target documents. For one batch of
//! sources and one relation field this costs one edge lookup and one target
//! fetch, whatever the number of sources. Dot paths (`author.company`)
//! populate the already-resolved targets one level further, batched the
//! same way, up to the configured depth.

use std::collections::{BTreeMap, HashMap, HashSet};

use uuid::Uuid;

use crate::builder::{Projection, Scope};
use crate::executor::{ExecutorResult, Operation, StoreResultExt};
use crate::observability::ObservationScope;
use crate::query::PopulateOption;
use crate::store::{Document, DocumentStore, QueryContext};

/// What to populate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulateConfig {
    /// Dot paths, one relation field per segment
    pub fields: Vec<String>,
    /// Levels resolved; 1 disables recursion
    pub max_depth: usize,
    /// Payload fields kept on targets, keyed by dot path
    pub select_fields: BTreeMap<String, Vec<String>>,
}

impl PopulateConfig {
    pub fn new(fields: Vec<String>, max_depth: usize) -> Self {
        Self {
            fields,
            max_depth: max_depth.max(1),
            select_fields: BTreeMap::new(),
        }
    }

    pub fn with_select(mut self, path: impl Into<String>, fields: Vec<String>) -> Self {
        self.select_fields.insert(path.into(), fields);
        self
    }

    /// Flattens parsed populate options into dot paths.
    pub fn from_options(options: &[PopulateOption], max_depth: usize) -> Self {
        let mut config = Self::new(Vec::new(), max_depth);
        for option in options {
            config.add_option("", option);
        }
        config
    }

    fn add_option(&mut self, prefix: &str, option: &PopulateOption) {
        let path = if prefix.is_empty() {
            option.path.clone()
        } else {
            format!("{}.{}", prefix, option.path)
        };
        if !self.fields.contains(&path) {
            self.fields.push(path.clone());
        }
        if !option.select.is_empty() {
            self.select_fields.insert(path.clone(), option.select.clone());
        }
        for nested in &option.populate {
            self.add_option(&path, nested);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// First path segments in first-seen order, each with its remaining paths
fn split_paths(paths: &[String]) -> Vec<(String, Vec<String>)> {
    let mut out: Vec<(String, Vec<String>)> = Vec::new();
    for path in paths {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path.as_str(), None),
        };
        if head.is_empty() {
            continue;
        }
        let index = match out.iter().position(|(h, _)| h == head) {
            Some(i) => i,
            None => {
                out.push((head.to_string(), Vec::new()));
                out.len() - 1
            }
        };
        if let Some(rest) = rest.filter(|r| !r.is_empty()) {
            if !out[index].1.iter().any(|r| r == rest) {
                out[index].1.push(rest.to_string());
            }
        }
    }
    out
}

/// Attaches related documents to their sources.
pub struct Populator<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    scope: Scope,
}

impl<'a, S: DocumentStore + ?Sized> Populator<'a, S> {
    /// Targets are looked up inside `scope`; only its tenant is applied.
    pub fn new(store: &'a S, scope: Scope) -> Self {
        Self {
            store,
            scope: Scope::tenant(scope.tenant_id),
        }
    }

    /// Populates every configured path on `entries`.
    ///
    /// Every source gets an entry for each populated field, empty when it
    /// has no edges.
    pub fn populate_entries(&self, ctx: &QueryContext, entries: &mut [Document], config: &PopulateConfig) -> ExecutorResult<()> {
        if config.is_empty() || entries.is_empty() {
            return Ok(());
        }
        let scope = ObservationScope::new(Operation::Populate.as_str(), Operation::Populate.event())
            .with_field("request_id", ctx.request_id().to_string())
            .with_field("sources", entries.len().to_string());
        match self.populate_level(ctx, entries, &config.fields, "", 1, config) {
            Ok(()) => {
                scope.complete_with_fields(&[("fields", &config.fields.join(","))]);
                Ok(())
            }
            Err(err) => {
                scope.fail(err.code(), &err.to_string());
                Err(err)
            }
        }
    }

    fn populate_level(
        &self,
        ctx: &QueryContext,
        sources: &mut [Document],
        paths: &[String],
        prefix: &str,
        depth: usize,
        config: &PopulateConfig,
    ) -> ExecutorResult<()> {
        let source_ids: Vec<Uuid> = sources.iter().map(|d| d.id).collect();

        for (field, rest) in split_paths(paths) {
            let path = if prefix.is_empty() {
                field.clone()
            } else {
                format!("{}.{}", prefix, field)
            };

            let edges = self
                .store
                .relation_edges(ctx, &source_ids, &field)
                .during(Operation::Populate)?;

            let mut target_ids: Vec<Uuid> = Vec::new();
            let mut seen = HashSet::new();
            for edge in &edges {
                if seen.insert(edge.target_id) {
                    target_ids.push(edge.target_id);
                }
            }

            let mut targets = if target_ids.is_empty() {
                Vec::new()
            } else {
                self.store
                    .find_by_ids(ctx, &self.scope, &target_ids)
                    .during(Operation::Populate)?
            };

            if let Some(select) = config.select_fields.get(&path) {
                let projection = Projection::Fields(select.clone());
                targets = targets.into_iter().map(|t| t.project(&projection)).collect();
            }

            if !rest.is_empty() && depth < config.max_depth && !targets.is_empty() {
                self.populate_level(ctx, &mut targets, &rest, &path, depth + 1, config)?;
            }

            let by_id: HashMap<Uuid, Document> = targets.into_iter().map(|t| (t.id, t)).collect();
            let mut attached: HashMap<Uuid, Vec<Document>> = HashMap::new();
            for edge in &edges {
                if let Some(target) = by_id.get(&edge.target_id) {
                    attached.entry(edge.source_id).or_default().push(target.clone());
                }
            }
            for source in sources.iter_mut() {
                let related = attached.get(&source.id).cloned().unwrap_or_default();
                source.relations.insert(field.clone(), related);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_options_flattens_nested() {
        let mut author = PopulateOption::path("author");
        author.select = vec!["name".into()];
        author.populate = vec![PopulateOption::path("company")];

        let config = PopulateConfig::from_options(&[author, PopulateOption::path("tags")], 3);
        assert_eq!(config.fields, vec!["author", "author.company", "tags"]);
        assert_eq!(config.select_fields.get("author"), Some(&vec!["name".to_string()]));
    }

    #[test]
    fn test_split_paths_groups_by_head() {
        let paths = vec!["author".to_string(), "author.company".to_string(), "tags".to_string()];
        assert_eq!(
            split_paths(&paths),
            vec![
                ("author".to_string(), vec!["company".to_string()]),
                ("tags".to_string(), vec![])
            ]
        );
    }

    #[test]
    fn test_depth_is_at_least_one() {
        assert_eq!(PopulateConfig::new(vec!["author".into()], 0).max_depth, 1);
    }
}

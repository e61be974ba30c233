//! Relation Population Tests
//!
//! Population cost does not grow with the number of sources:
//! - One edge lookup and one target fetch per relation field per level
//! - Shared targets are fetched once and attached to every source
//! - Sources without edges get an empty list
//! - Nested paths add one level each, bounded by the depth limit

use aeroquery::builder::Scope;
use aeroquery::populate::{PopulateConfig, Populator};
use aeroquery::store::{Document, MemoryStore, QueryContext, RelationEdge};
use serde_json::json;
use uuid::Uuid;

// =============================================================================
// Helper Functions
// =============================================================================

struct Graph {
    store: MemoryStore,
    articles: Vec<Document>,
    shared_author: Uuid,
}

/// Three articles: two share one author, the third has none. The shared
/// author works for one company.
fn graph() -> Graph {
    let store = MemoryStore::new();

    let company = Document::from_json("company", json!({"name": "Initech"}));
    let company_id = store.insert(company).unwrap();

    let ada = Document::from_json("author", json!({"name": "Ada", "email": "ada@example.com"}));
    let ada_id = store.insert(ada).unwrap();
    store.link(RelationEdge::new(ada_id, company_id, "company", 0)).unwrap();

    let articles: Vec<Document> = ["One", "Two", "Three"]
        .iter()
        .map(|title| Document::from_json("article", json!({"title": title})))
        .collect();
    for article in &articles {
        store.insert(article.clone()).unwrap();
    }
    store.link(RelationEdge::new(articles[0].id, ada_id, "author", 0)).unwrap();
    store.link(RelationEdge::new(articles[1].id, ada_id, "author", 0)).unwrap();

    Graph {
        store,
        articles,
        shared_author: ada_id,
    }
}

// =============================================================================
// Batching
// =============================================================================

#[test]
fn test_one_lookup_per_field_regardless_of_sources() {
    let g = graph();
    let mut entries = g.articles.clone();
    let config = PopulateConfig::new(vec!["author".into()], 3);

    Populator::new(&g.store, Scope::tenant(None))
        .populate_entries(&QueryContext::new(), &mut entries, &config)
        .unwrap();

    assert_eq!(g.store.relation_lookups(), 1);
    assert_eq!(g.store.id_lookups(), 1);

    let first = &entries[0].relations["author"];
    let second = &entries[1].relations["author"];
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].id, g.shared_author);
    assert_eq!(first, second);
}

#[test]
fn test_source_without_edges_gets_empty_list() {
    let g = graph();
    let mut entries = g.articles.clone();
    let config = PopulateConfig::new(vec!["author".into()], 3);

    Populator::new(&g.store, Scope::tenant(None))
        .populate_entries(&QueryContext::new(), &mut entries, &config)
        .unwrap();

    assert_eq!(entries[2].relations.get("author"), Some(&Vec::new()));
}

#[test]
fn test_select_trims_targets() {
    let g = graph();
    let mut entries = g.articles.clone();
    let config = PopulateConfig::new(vec!["author".into()], 3).with_select("author", vec!["name".into()]);

    Populator::new(&g.store, Scope::tenant(None))
        .populate_entries(&QueryContext::new(), &mut entries, &config)
        .unwrap();

    let author = &entries[0].relations["author"][0];
    assert_eq!(author.data.get("name"), Some(&json!("Ada")));
    assert!(author.data.get("email").is_none());
}

// =============================================================================
// Nesting
// =============================================================================

#[test]
fn test_nested_path_adds_one_level() {
    let g = graph();
    let mut entries = g.articles.clone();
    let config = PopulateConfig::new(vec!["author".into(), "author.company".into()], 3);

    Populator::new(&g.store, Scope::tenant(None))
        .populate_entries(&QueryContext::new(), &mut entries, &config)
        .unwrap();

    assert_eq!(g.store.relation_lookups(), 2);
    assert_eq!(g.store.id_lookups(), 2);

    let author = &entries[0].relations["author"][0];
    let company = &author.relations["company"];
    assert_eq!(company.len(), 1);
    assert_eq!(company[0].data.get("name"), Some(&json!("Initech")));
}

#[test]
fn test_depth_one_stops_recursion() {
    let g = graph();
    let mut entries = g.articles.clone();
    let config = PopulateConfig::new(vec!["author.company".into()], 1);

    Populator::new(&g.store, Scope::tenant(None))
        .populate_entries(&QueryContext::new(), &mut entries, &config)
        .unwrap();

    assert_eq!(g.store.relation_lookups(), 1);
    let author = &entries[0].relations["author"][0];
    assert!(author.relations.is_empty());
}

// =============================================================================
// Tenant Scope
// =============================================================================

#[test]
fn test_targets_outside_tenant_are_dropped() {
    let store = MemoryStore::new();
    let article = Document::from_json("article", json!({"title": "One"})).with_tenant("acme");
    let foreign = Document::from_json("author", json!({"name": "Eve"})).with_tenant("globex");
    let article_id = store.insert(article.clone()).unwrap();
    let foreign_id = store.insert(foreign).unwrap();
    store.link(RelationEdge::new(article_id, foreign_id, "author", 0)).unwrap();

    let mut entries = vec![article];
    Populator::new(&store, Scope::tenant(Some("acme".into())))
        .populate_entries(&QueryContext::new(), &mut entries, &PopulateConfig::new(vec!["author".into()], 3))
        .unwrap();

    assert_eq!(entries[0].relations.get("author"), Some(&Vec::new()));
}

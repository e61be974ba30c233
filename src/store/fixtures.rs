//! Seed data for the in-memory store
//!
//! ```json
//! {
//!   "schemas":   { "article": { "title": "text", "price": "decimal" } },
//!   "documents": [ { "id": "...", "contentType": "article", "data": { ... } } ],
//!   "edges":     [ { "sourceId": "...", "targetId": "...", "field": "author", "order": 0 } ],
//!   "revisions": [ { "documentId": "...", "version": 1 } ]
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::schema::SchemaRegistry;

use super::document::{Document, RelationEdge};
use super::errors::{StoreError, StoreResult};
use super::memory::{MemoryStore, Revision};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub schemas: Map<String, Value>,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub edges: Vec<RelationEdge>,
    #[serde(default)]
    pub revisions: Vec<Revision>,
}

impl Fixtures {
    /// Reads a fixtures file; a missing or malformed file is an error.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| StoreError::InvalidFixtures(format!("{}: {}", path.display(), e)))?;
        let value: Value =
            serde_json::from_str(&raw).map_err(|e| StoreError::InvalidFixtures(format!("{}: {}", path.display(), e)))?;
        Self::from_json(value)
    }

    pub fn from_json(value: Value) -> StoreResult<Self> {
        serde_json::from_value(value).map_err(|e| StoreError::InvalidFixtures(e.to_string()))
    }

    /// Field schemas declared by the fixtures
    pub fn registry(&self) -> StoreResult<SchemaRegistry> {
        SchemaRegistry::from_json(&Value::Object(self.schemas.clone()))
            .map_err(|e| StoreError::InvalidFixtures(e.to_string()))
    }

    /// Builds a store holding the fixture documents, edges, and revisions.
    pub fn into_store(self) -> StoreResult<MemoryStore> {
        let store = MemoryStore::new();
        store.insert_many(self.documents)?;
        for edge in self.edges {
            store.link(edge)?;
        }
        for revision in self.revisions {
            store.add_revision(revision.document_id, revision.version)?;
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample() -> Value {
        json!({
            "schemas": {"article": {"title": "text", "author": "relation"}, "author": {"name": "text"}},
            "documents": [
                {"id": "6f1c1f8e-3d4a-4a53-9a36-0c6f7c1b2a01", "contentType": "article", "data": {"title": "Hello"}},
                {"id": "6f1c1f8e-3d4a-4a53-9a36-0c6f7c1b2a02", "contentType": "author", "data": {"name": "Ada"}}
            ],
            "edges": [{
                "sourceId": "6f1c1f8e-3d4a-4a53-9a36-0c6f7c1b2a01",
                "targetId": "6f1c1f8e-3d4a-4a53-9a36-0c6f7c1b2a02",
                "field": "author"
            }],
            "revisions": [{"documentId": "6f1c1f8e-3d4a-4a53-9a36-0c6f7c1b2a01", "version": 1}]
        })
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", sample()).unwrap();

        let fixtures = Fixtures::load(file.path()).unwrap();
        assert_eq!(fixtures.documents.len(), 2);
        assert_eq!(fixtures.registry().unwrap().len(), 2);

        let store = fixtures.into_store().unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Fixtures::load(Path::new("/nonexistent/fixtures.json")).unwrap_err();
        assert_eq!(err.code(), "AERO_STORE_FIXTURES_INVALID");
    }

    #[test]
    fn test_bad_document_is_an_error() {
        let err = Fixtures::from_json(json!({"documents": [{"data": {}}]})).unwrap_err();
        assert!(matches!(err, StoreError::InvalidFixtures(_)));
    }
}

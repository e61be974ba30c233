//! Schema registry
//!
//! Holds the field schema of every known content type. Schemas are read
//! from a JSON file of the form `{"<contentType>": {"<field>": "<type>"}}`
//! at startup, or registered programmatically.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::Value;

use super::errors::{ValidationError, ValidationResult};
use super::types::FieldSchema;

/// In-memory registry of field schemas, keyed by content type
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, FieldSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a schema file.
    ///
    /// A missing or malformed file is an error, never an empty registry.
    pub fn load_file(path: &Path) -> ValidationResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ValidationError::malformed_schema(path.display().to_string(), format!("Failed to read file: {}", e))
        })?;
        let value: Value = serde_json::from_str(&content).map_err(|e| {
            ValidationError::malformed_schema(path.display().to_string(), format!("Invalid JSON: {}", e))
        })?;
        Self::from_json(&value).map_err(|e| match e {
            ValidationError::MalformedSchema { reason, .. } => {
                ValidationError::malformed_schema(path.display().to_string(), reason)
            }
            other => other,
        })
    }

    /// Builds a registry from `{contentType: {field: type}}`.
    pub fn from_json(value: &Value) -> ValidationResult<Self> {
        let types = value
            .as_object()
            .ok_or_else(|| ValidationError::malformed_schema("<json>", "expected an object of content types"))?;

        let mut registry = Self::new();
        for (content_type, fields) in types {
            let fields = fields.as_object().ok_or_else(|| {
                ValidationError::malformed_schema(
                    "<json>",
                    format!("content type '{}' must map to an object of fields", content_type),
                )
            })?;
            let schema = FieldSchema::from_type_map(content_type, fields)
                .map_err(|reason| ValidationError::malformed_schema("<json>", reason))?;
            registry.register(schema);
        }
        Ok(registry)
    }

    /// Registers a schema, replacing any previous one for the same type.
    pub fn register(&mut self, schema: FieldSchema) {
        self.schemas.insert(schema.content_type.clone(), schema);
    }

    pub fn get(&self, content_type: &str) -> Option<&FieldSchema> {
        self.schemas.get(content_type)
    }

    /// Like `get`, but an unknown type is an error.
    pub fn require(&self, content_type: &str) -> ValidationResult<&FieldSchema> {
        self.get(content_type)
            .ok_or_else(|| ValidationError::UnknownContentType(content_type.to_string()))
    }

    pub fn content_types(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

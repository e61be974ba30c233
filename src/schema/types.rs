//! Field schema types
//!
//! The field schema is owned by the content-type subsystem; this engine only
//! reads it. Declared types form a closed set, each mapping to one
//! `FieldCategory` used for operator applicability and cast selection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::{FieldCategory, SystemField};

/// Declared type of a content field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    #[serde(alias = "string")]
    Text,
    #[serde(alias = "richtext", alias = "rich_text", alias = "markdown")]
    RichText,
    Email,
    #[serde(alias = "uid")]
    Slug,
    #[serde(alias = "int")]
    Integer,
    #[serde(alias = "biginteger", alias = "big_integer")]
    BigInteger,
    #[serde(alias = "number")]
    Float,
    Decimal,
    #[serde(alias = "bool")]
    Boolean,
    Date,
    #[serde(alias = "datetime", alias = "timestamp")]
    DateTime,
    Time,
    #[serde(alias = "enum", alias = "select")]
    Enumeration,
    Relation,
    Media,
    #[serde(alias = "object")]
    Json,
    Component,
}

impl FieldType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::RichText => "richText",
            FieldType::Email => "email",
            FieldType::Slug => "slug",
            FieldType::Integer => "integer",
            FieldType::BigInteger => "bigInteger",
            FieldType::Float => "float",
            FieldType::Decimal => "decimal",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::DateTime => "dateTime",
            FieldType::Time => "time",
            FieldType::Enumeration => "enumeration",
            FieldType::Relation => "relation",
            FieldType::Media => "media",
            FieldType::Json => "json",
            FieldType::Component => "component",
        }
    }

    /// Parse a type name, accepting the same aliases as deserialization.
    pub fn parse(name: &str) -> Option<Self> {
        serde_json::from_value(Value::String(name.to_string())).ok()
    }

    pub fn category(&self) -> FieldCategory {
        match self {
            FieldType::Text | FieldType::RichText | FieldType::Email | FieldType::Slug | FieldType::Time => {
                FieldCategory::Text
            }
            FieldType::Integer | FieldType::BigInteger | FieldType::Float | FieldType::Decimal => {
                FieldCategory::Numeric
            }
            FieldType::Boolean => FieldCategory::Boolean,
            FieldType::Date | FieldType::DateTime => FieldCategory::Date,
            FieldType::Enumeration => FieldCategory::Selection,
            FieldType::Relation | FieldType::Media => FieldCategory::Relation,
            FieldType::Json | FieldType::Component => FieldCategory::Nested,
        }
    }

    /// Text-like fields are searchable unless declared otherwise
    pub fn default_searchable(&self) -> bool {
        matches!(
            self,
            FieldType::Text | FieldType::RichText | FieldType::Email | FieldType::Slug
        )
    }

    /// Values of nested types may be addressed by dot path (`meta.lang`)
    pub fn allows_sub_paths(&self) -> bool {
        matches!(self.category(), FieldCategory::Nested)
    }
}

/// One declared content field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub indexable: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            searchable: field_type.default_searchable(),
            indexable: false,
        }
    }

    pub fn searchable(mut self, searchable: bool) -> Self {
        self.searchable = searchable;
        self
    }

    pub fn indexable(mut self, indexable: bool) -> Self {
        self.indexable = indexable;
        self
    }
}

/// How a field name in a query resolves against the schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedField {
    /// Fixed system column
    System(SystemField),
    /// Path inside the document payload; `field_type` is the declared type of
    /// the root segment, absent for sub-paths of nested fields
    Document {
        path: String,
        field_type: Option<FieldType>,
    },
}

impl ResolvedField {
    /// Date-ish fields are eligible for date truncation when grouping
    pub fn is_date(&self) -> bool {
        match self {
            ResolvedField::System(field) => field.is_date(),
            ResolvedField::Document { field_type, .. } => {
                matches!(field_type, Some(FieldType::Date) | Some(FieldType::DateTime))
            }
        }
    }

    /// Whether arithmetic aggregates apply. Untyped sub-paths of nested
    /// fields are accepted; their values are cast per row.
    pub fn is_numeric(&self) -> bool {
        match self {
            ResolvedField::System(field) => *field == SystemField::Version,
            ResolvedField::Document { field_type, .. } => {
                field_type.map_or(true, |t| t.category() == FieldCategory::Numeric)
            }
        }
    }
}

/// Field schema of one content type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub content_type: String,
    #[serde(default)]
    fields: BTreeMap<String, FieldDef>,
}

impl FieldSchema {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field declaration
    pub fn with_field(mut self, name: &str, field_type: FieldType) -> Self {
        self.add(FieldDef::new(name, field_type));
        self
    }

    pub fn add(&mut self, def: FieldDef) {
        self.fields.insert(def.name.clone(), def);
    }

    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.values()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Names of fields flagged searchable, in name order
    pub fn searchable_fields(&self) -> Vec<String> {
        self.fields
            .values()
            .filter(|f| f.searchable)
            .map(|f| f.name.clone())
            .collect()
    }

    /// Resolve a query field name.
    ///
    /// A `_`-namespaced system name always resolves to the system column. A
    /// bare name declared in the schema is a user field, even when it
    /// shadows a system field. Otherwise a recognized system name resolves
    /// to its column. Dot paths are accepted below nested (`json` /
    /// `component`) fields.
    pub fn resolve(&self, name: &str) -> Option<ResolvedField> {
        if let Some(system) = SystemField::from_namespaced(name) {
            return Some(ResolvedField::System(system));
        }
        if let Some(def) = self.fields.get(name) {
            return Some(ResolvedField::Document {
                path: name.to_string(),
                field_type: Some(def.field_type),
            });
        }
        if let Some(system) = SystemField::from_name(name) {
            return Some(ResolvedField::System(system));
        }
        let (root, rest) = name.split_once('.')?;
        let def = self.fields.get(root)?;
        if def.field_type.allows_sub_paths() && !rest.is_empty() {
            return Some(ResolvedField::Document {
                path: name.to_string(),
                field_type: None,
            });
        }
        None
    }

    /// Build a schema from a `{field: type}` or `{field: {type, searchable, indexable}}` map.
    pub fn from_type_map(content_type: &str, map: &serde_json::Map<String, Value>) -> Result<Self, String> {
        let mut schema = FieldSchema::new(content_type);
        for (name, spec) in map {
            let def = match spec {
                Value::String(type_name) => {
                    let field_type = FieldType::parse(type_name)
                        .ok_or_else(|| format!("field '{}': unknown type '{}'", name, type_name))?;
                    FieldDef::new(name.clone(), field_type)
                }
                Value::Object(obj) => {
                    let type_name = obj
                        .get("type")
                        .and_then(Value::as_str)
                        .ok_or_else(|| format!("field '{}': missing 'type'", name))?;
                    let field_type = FieldType::parse(type_name)
                        .ok_or_else(|| format!("field '{}': unknown type '{}'", name, type_name))?;
                    let mut def = FieldDef::new(name.clone(), field_type);
                    if let Some(searchable) = obj.get("searchable").and_then(Value::as_bool) {
                        def.searchable = searchable;
                    }
                    if let Some(indexable) = obj.get("indexable").and_then(Value::as_bool) {
                        def.indexable = indexable;
                    }
                    def
                }
                _ => return Err(format!("field '{}': expected a type name or object", name)),
            };
            schema.add(def);
        }
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn articles() -> FieldSchema {
        FieldSchema::new("article")
            .with_field("title", FieldType::Text)
            .with_field("price", FieldType::Decimal)
            .with_field("status", FieldType::Enumeration)
            .with_field("meta", FieldType::Json)
    }

    #[test]
    fn test_type_aliases() {
        assert_eq!(FieldType::parse("string"), Some(FieldType::Text));
        assert_eq!(FieldType::parse("int"), Some(FieldType::Integer));
        assert_eq!(FieldType::parse("dateTime"), Some(FieldType::DateTime));
        assert_eq!(FieldType::parse("datetime"), Some(FieldType::DateTime));
        assert_eq!(FieldType::parse("geo"), None);
    }

    #[test]
    fn test_categories() {
        assert_eq!(FieldType::Decimal.category(), FieldCategory::Numeric);
        assert_eq!(FieldType::DateTime.category(), FieldCategory::Date);
        assert_eq!(FieldType::Component.category(), FieldCategory::Nested);
        assert!(FieldType::RichText.default_searchable());
        assert!(!FieldType::Integer.default_searchable());
    }

    #[test]
    fn test_resolve_prefers_declared_bare_name() {
        let schema = articles();
        assert_eq!(
            schema.resolve("status"),
            Some(ResolvedField::Document {
                path: "status".into(),
                field_type: Some(FieldType::Enumeration)
            })
        );
        assert_eq!(schema.resolve("_status"), Some(ResolvedField::System(SystemField::Status)));
        assert_eq!(schema.resolve("createdAt"), Some(ResolvedField::System(SystemField::CreatedAt)));
        assert_eq!(schema.resolve("created_at"), Some(ResolvedField::System(SystemField::CreatedAt)));
        assert_eq!(schema.resolve("missing"), None);
    }

    #[test]
    fn test_resolve_nested_paths() {
        let schema = articles();
        assert_eq!(
            schema.resolve("meta.lang"),
            Some(ResolvedField::Document {
                path: "meta.lang".into(),
                field_type: None
            })
        );
        assert_eq!(schema.resolve("title.length"), None);
        assert_eq!(schema.resolve("meta."), None);
    }

    #[test]
    fn test_from_type_map() {
        let map = json!({
            "title": "text",
            "views": {"type": "integer", "indexable": true},
            "body": {"type": "richText", "searchable": false}
        });
        let schema = FieldSchema::from_type_map("post", map.as_object().unwrap()).unwrap();
        assert_eq!(schema.len(), 3);
        assert!(schema.get("views").unwrap().indexable);
        assert_eq!(schema.searchable_fields(), vec!["title"]);

        let bad = json!({"x": "geo"});
        assert!(FieldSchema::from_type_map("post", bad.as_object().unwrap()).is_err());
    }
}

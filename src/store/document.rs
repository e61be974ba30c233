//! Documents and relation edges

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::builder::{Column, Projection};
use crate::query::SystemField;

fn default_status() -> String {
    "draft".to_string()
}

fn default_version() -> i64 {
    1
}

/// One content record: fixed system columns plus a JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_version")]
    pub version: i64,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub updated_by: Option<String>,
    /// Populated relation targets keyed by relation field
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relations: BTreeMap<String, Vec<Document>>,
}

impl Document {
    pub fn new(content_type: impl Into<String>, data: Map<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            content_type: content_type.into(),
            tenant_id: None,
            status: default_status(),
            version: default_version(),
            data,
            created_at: now,
            updated_at: now,
            published_at: None,
            scheduled_at: None,
            created_by: None,
            updated_by: None,
            relations: BTreeMap::new(),
        }
    }

    /// Builds a document from a JSON object payload; anything else yields an
    /// empty payload.
    pub fn from_json(content_type: impl Into<String>, data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(content_type, data)
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self.updated_at = self.updated_at.max(at);
        self
    }

    pub fn with_updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = at;
        self
    }

    pub fn with_scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    /// System column value as JSON; timestamps are RFC 3339 strings.
    pub fn system_value(&self, field: SystemField) -> Value {
        fn time(at: Option<&DateTime<Utc>>) -> Value {
            at.map(|t| Value::String(t.to_rfc3339())).unwrap_or(Value::Null)
        }
        fn text(s: Option<&String>) -> Value {
            s.map(|s| Value::String(s.clone())).unwrap_or(Value::Null)
        }
        match field {
            SystemField::Id => Value::String(self.id.to_string()),
            SystemField::Status => Value::String(self.status.clone()),
            SystemField::Version => Value::from(self.version),
            SystemField::CreatedAt => time(Some(&self.created_at)),
            SystemField::UpdatedAt => time(Some(&self.updated_at)),
            SystemField::PublishedAt => time(self.published_at.as_ref()),
            SystemField::ScheduledAt => time(self.scheduled_at.as_ref()),
            SystemField::CreatedBy => text(self.created_by.as_ref()),
            SystemField::UpdatedBy => text(self.updated_by.as_ref()),
        }
    }

    /// Value at a path inside the payload; `None` when any segment is missing.
    pub fn get_path(&self, path: &[String]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.data.get(first)?;
        for segment in rest {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Value of a resolved column; `None` means absent.
    pub fn column_value(&self, column: &Column) -> Option<Value> {
        match column {
            Column::System { field } => match self.system_value(*field) {
                Value::Null => None,
                value => Some(value),
            },
            Column::Document { path, .. } => self.get_path(path).cloned(),
            Column::Output { .. } => None,
        }
    }

    /// Applies a projection; system columns always survive.
    pub fn project(mut self, projection: &Projection) -> Self {
        match projection {
            Projection::All => {}
            Projection::Fields(fields) => self.data.retain(|key, _| fields.iter().any(|f| f == key)),
            Projection::SystemOnly => self.data.clear(),
        }
        self
    }
}

/// Stored link from one document to another under a named field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationEdge {
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub field: String,
    /// Position of the target within the field
    #[serde(default)]
    pub order: i64,
}

impl RelationEdge {
    pub fn new(source_id: Uuid, target_id: Uuid, field: impl Into<String>, order: i64) -> Self {
        Self {
            source_id,
            target_id,
            field: field.into(),
            order,
        }
    }
}

/// A document with its full-text relevance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub rank: f64,
}

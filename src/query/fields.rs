//! System field registry
//!
//! System fields are the fixed columns every document carries next to its
//! JSON payload. They may be referenced by their camelCase name, their
//! column name, or with the `_` namespace prefix (`_status`), which always
//! resolves to the system column even when a content field of the same
//! bare name exists.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Namespace prefix forcing system-field resolution
pub const SYSTEM_FIELD_PREFIX: char = '_';

/// Fixed document columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SystemField {
    Id,
    Status,
    Version,
    CreatedAt,
    UpdatedAt,
    PublishedAt,
    ScheduledAt,
    CreatedBy,
    UpdatedBy,
}

pub const SYSTEM_FIELDS: &[SystemField] = &[
    SystemField::Id,
    SystemField::Status,
    SystemField::Version,
    SystemField::CreatedAt,
    SystemField::UpdatedAt,
    SystemField::PublishedAt,
    SystemField::ScheduledAt,
    SystemField::CreatedBy,
    SystemField::UpdatedBy,
];

impl SystemField {
    /// Name used in query syntax and result documents
    pub fn name(&self) -> &'static str {
        match self {
            SystemField::Id => "id",
            SystemField::Status => "status",
            SystemField::Version => "version",
            SystemField::CreatedAt => "createdAt",
            SystemField::UpdatedAt => "updatedAt",
            SystemField::PublishedAt => "publishedAt",
            SystemField::ScheduledAt => "scheduledAt",
            SystemField::CreatedBy => "createdBy",
            SystemField::UpdatedBy => "updatedBy",
        }
    }

    /// Column name in the relational store
    pub fn column(&self) -> &'static str {
        match self {
            SystemField::Id => "id",
            SystemField::Status => "status",
            SystemField::Version => "version",
            SystemField::CreatedAt => "created_at",
            SystemField::UpdatedAt => "updated_at",
            SystemField::PublishedAt => "published_at",
            SystemField::ScheduledAt => "scheduled_at",
            SystemField::CreatedBy => "created_by",
            SystemField::UpdatedBy => "updated_by",
        }
    }

    /// Timestamp columns (eligible for date truncation)
    pub fn is_date(&self) -> bool {
        matches!(
            self,
            SystemField::CreatedAt | SystemField::UpdatedAt | SystemField::PublishedAt | SystemField::ScheduledAt
        )
    }

    /// Look up a bare (un-prefixed) system field name or column name.
    pub fn from_name(name: &str) -> Option<Self> {
        SYSTEM_FIELDS
            .iter()
            .copied()
            .find(|f| f.name() == name || f.column() == name)
    }

    /// Look up a name carrying the namespace prefix (`_createdAt`).
    pub fn from_namespaced(name: &str) -> Option<Self> {
        name.strip_prefix(SYSTEM_FIELD_PREFIX).and_then(Self::from_name)
    }

    /// Look up either spelling.
    pub fn parse(name: &str) -> Option<Self> {
        Self::from_namespaced(name).or_else(|| Self::from_name(name))
    }
}

impl fmt::Display for SystemField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// True if `name` denotes a system field in any accepted spelling.
pub fn is_system_field(name: &str) -> bool {
    SystemField::parse(name).is_some()
}

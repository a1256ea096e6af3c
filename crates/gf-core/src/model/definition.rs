//! Schema and capability metadata for a datasource

use serde::{Deserialize, Serialize};

/// A single field in a datasource schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(default, rename = "type")]
    pub field_type: Option<String>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: Some(field_type.into()),
        }
    }
}

/// How a backend continues from one page to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationKind {
    /// One-based page numbers
    Page,
    /// Opaque continuation tokens returned by the backend
    Cursor,
}

/// Where pagination parameters are placed in a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationLocation {
    Query,
    Body,
}

/// Pagination declaration of a definition. Every part is optional since
/// definition services often return partial declarations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationDescriptor {
    #[serde(default, rename = "type")]
    pub kind: Option<PaginationKind>,
    #[serde(default)]
    pub location: Option<PaginationLocation>,
    #[serde(default)]
    pub page_param: Option<String>,
    #[serde(default)]
    pub size_param: Option<String>,
    #[serde(default)]
    pub page_size: Option<usize>,
}

impl PaginationDescriptor {
    /// True only when type, location and page parameter are all declared
    pub fn is_complete(&self) -> bool {
        self.kind.is_some()
            && self.location.is_some()
            && self.page_param.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Backend behind a datasource, resolved from the listing service's `source` tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BackendKind {
    Internal,
    Rest,
    Sql,
    Airtable,
    Other(String),
}

impl BackendKind {
    pub fn from_source(source: &str) -> Self {
        match source.to_ascii_uppercase().as_str() {
            "INTERNAL" => BackendKind::Internal,
            "REST" => BackendKind::Rest,
            "POSTGRES" | "MYSQL" | "SQL_SERVER" | "ORACLE" | "SQLITE" => BackendKind::Sql,
            "AIRTABLE" => BackendKind::Airtable,
            _ => BackendKind::Other(source.to_string()),
        }
    }

    pub fn as_source(&self) -> &str {
        match self {
            BackendKind::Internal => "INTERNAL",
            BackendKind::Rest => "REST",
            BackendKind::Sql => "SQL",
            BackendKind::Airtable => "AIRTABLE",
            BackendKind::Other(source) => source,
        }
    }

    /// Backends that paginate but whose definitions never declare it
    pub fn requires_synthesized_pagination(&self) -> bool {
        matches!(self, BackendKind::Airtable)
    }
}

impl From<String> for BackendKind {
    fn from(source: String) -> Self {
        BackendKind::from_source(&source)
    }
}

impl From<BackendKind> for String {
    fn from(kind: BackendKind) -> Self {
        kind.as_source().to_string()
    }
}

/// Schema and capability metadata for one datasource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
    #[serde(default)]
    pub pagination: Option<PaginationDescriptor>,
    #[serde(default)]
    pub backend: Option<BackendKind>,
}

impl Definition {
    pub fn with_pagination(mut self, pagination: PaginationDescriptor) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn pagination_kind(&self) -> Option<PaginationKind> {
        self.pagination.as_ref().and_then(|p| p.kind)
    }
}

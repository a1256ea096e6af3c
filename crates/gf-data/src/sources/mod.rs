//! Adapters for tables living in third-party services

pub mod airtable;
pub mod airtable_transport;

pub use airtable::AirtableAdapter;
pub use airtable_transport::{AirtableTransport, HttpAirtableTransport};

use async_trait::async_trait;
use gf_core::model::{PageResult, Row, SearchFilter};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::DataError;

/// A single sort instruction in an adapter's own vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortDirective {
    pub field: String,
    pub direction: String,
}

/// Offset-style pagination handed to `read`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationParams {
    /// One-based page number
    pub bookmark: Option<u64>,
}

/// Arguments of an adapter `read`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadRequest {
    pub table: String,
    pub view: Option<String>,
    pub limit: Option<usize>,
    pub sort: Vec<SortDirective>,
    pub filter_formula: Option<String>,
    pub pagination: Option<PaginationParams>,
}

impl ReadRequest {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }
}

/// Backend-agnostic description of what to search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub table: String,
    pub view: Option<String>,
    pub filter: SearchFilter,
}

/// Generic sort and paging options of a search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams {
    pub limit: Option<usize>,
    pub sort_column: Option<String>,
    /// Order as the UI names it, e.g. "Ascending" or "descending"
    pub sort_order: Option<String>,
    pub pagination: Option<PaginationParams>,
}

/// Outcome of a connection check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionStatus {
    pub fn connected() -> Self {
        Self {
            connected: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            connected: false,
            error: Some(error.into()),
        }
    }
}

/// CRUD + search contract every backend adapter implements.
///
/// Reads never fail: errors are logged and come back as no rows. Mutations
/// log and return their errors so the caller can show them.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Descriptor a host configuration UI renders
    fn schema(&self) -> AdapterSchema;

    async fn create(&self, table: &str, record: Row) -> Result<Row, DataError>;

    async fn read(&self, request: ReadRequest) -> Vec<Row>;

    async fn update(&self, table: &str, id: &str, record: Row) -> Result<Row, DataError>;

    async fn delete(&self, table: &str, id: &str) -> Result<Row, DataError>;

    async fn search(&self, query: &SearchQuery, params: &SearchParams) -> PageResult;

    async fn test_connection(&self) -> ConnectionStatus;
}

/// Input kinds a configuration UI knows how to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Password,
    Number,
    Fields,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl SchemaField {
    pub fn required(kind: FieldKind) -> Self {
        Self {
            kind,
            required: true,
            default: None,
        }
    }

    pub fn optional(kind: FieldKind) -> Self {
        Self {
            kind,
            required: false,
            default: None,
        }
    }

    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Requirements of one CRUD operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSchema {
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub customisable: bool,
    pub fields: IndexMap<String, SchemaField>,
}

/// Credentials and per-operation fields an adapter needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterSchema {
    pub docs: String,
    pub friendly_name: String,
    pub description: String,
    pub datasource: IndexMap<String, SchemaField>,
    pub query: IndexMap<String, OperationSchema>,
}

//! Contracts of the external services this core consumes.
//!
//! Transport, timeouts and authentication live behind these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Cursor, Datasource, Definition, Metadata, Row, SearchFilter, SortState};

/// Returns schema metadata for a datasource
#[async_trait]
pub trait DefinitionService: Send + Sync {
    async fn fetch_definition(&self, datasource: &Datasource) -> anyhow::Result<Definition>;
}

/// One configured backend connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasourceInfo {
    #[serde(rename = "_id")]
    pub id: String,
    pub source: String,
    #[serde(flatten)]
    pub extra: Metadata,
}

impl DatasourceInfo {
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            extra: Metadata::new(),
        }
    }
}

/// Lists the configured backend connections
#[async_trait]
pub trait DatasourceListing: Send + Sync {
    async fn list_datasources(&self) -> anyhow::Result<Vec<DatasourceInfo>>;
}

/// Pagination attached to a query execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPagination {
    pub page: Option<Cursor>,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query_id: String,
    pub parameters: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<QueryPagination>,
}

/// Pagination returned by a query execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponsePagination {
    #[serde(default)]
    pub cursor: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub data: Option<Vec<Row>>,
    #[serde(default)]
    pub pagination: Option<ResponsePagination>,
    #[serde(flatten)]
    pub rest: Metadata,
}

/// Executes saved queries
#[async_trait]
pub trait QueryService: Send + Sync {
    async fn execute_query(&self, request: QueryRequest) -> anyhow::Result<QueryResponse>;
}

/// Search over a built-in table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSearch {
    pub table_id: String,
    pub limit: Option<usize>,
    pub query: SearchFilter,
    pub paginate: bool,
    #[serde(default)]
    pub bookmark: Option<Cursor>,
    #[serde(default)]
    pub sort: Option<SortState>,
}

impl TableSearch {
    pub fn new(table_id: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            limit: None,
            query: SearchFilter::default(),
            paginate: false,
            bookmark: None,
            sort: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSearchResponse {
    pub rows: Vec<Row>,
    #[serde(default)]
    pub bookmark: Option<Cursor>,
    #[serde(default)]
    pub has_next_page: bool,
}

/// Row CRUD over built-in tables
#[async_trait]
pub trait RowService: Send + Sync {
    /// Insert or update a row. `suppress_errors` asks the service not to raise
    /// its own notifications; failures still come back as `Err`.
    async fn save_row(&self, row: Row, suppress_errors: bool) -> anyhow::Result<Row>;

    async fn delete_rows(&self, table_id: &str, rows: Vec<Row>) -> anyhow::Result<()>;

    async fn search_table(&self, search: TableSearch) -> anyhow::Result<TableSearchResponse>;
}

//! Data model shared by the fetch engine, adapters and controllers

mod datasource;
mod definition;
mod page;
mod query;

pub use datasource::{Datasource, DatasourceKind, QueryParameter};
pub use definition::{
    BackendKind, Definition, FieldSchema, PaginationDescriptor, PaginationKind,
    PaginationLocation,
};
pub use page::PageResult;
pub use query::{
    compare_values, loosely_equal, Cursor, FilterCondition, FilterOperator, QueryState,
    QueryUpdate, SearchFilter, SortOrder, SortState,
};

/// Backend-defined record, opaque apart from its identifier field
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Open mapping for auxiliary response metadata
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Field carrying a row's identifier
pub const ROW_ID_FIELD: &str = "_id";

/// Field stamped onto rows to name their table
pub const TABLE_ID_FIELD: &str = "tableId";

/// Identifier of a row, if it has one
pub fn row_id(row: &Row) -> Option<&str> {
    row.get(ROW_ID_FIELD).and_then(|id| id.as_str())
}

//! Spreadsheet-service adapter for Airtable bases
//!
//! Airtable pages with opaque offsets that cannot be addressed directly, so
//! `read` follows every offset and slices the requested window afterwards.
//! Deep pages therefore cost as much as scanning every matching record.

use std::sync::Arc;

use async_trait::async_trait;
use gf_core::model::{PageResult, Row, SearchFilter};
use indexmap::IndexMap;
use serde_json::{json, Value};
use tracing::{debug, error};

use super::airtable_transport::{AirtableTransport, HttpAirtableTransport, ListRecordsQuery};
use super::{
    Adapter, AdapterSchema, ConnectionStatus, FieldKind, OperationSchema, ReadRequest,
    SchemaField, SearchParams, SearchQuery, SortDirective,
};
use crate::config::AirtableConfig;
use crate::DataError;

/// Table name that never exists; listing it proves the credentials work
pub const SENTINEL_TABLE: &str = "__gridfetch_connection_check__";

/// Message prefix Airtable uses when a table does not exist
const TABLE_NOT_FOUND: &str = "Could not find table";

pub struct AirtableAdapter {
    transport: Arc<dyn AirtableTransport>,
}

impl AirtableAdapter {
    /// Create an adapter talking to the Airtable API over HTTP
    pub fn new(config: &AirtableConfig) -> Result<Self, DataError> {
        let transport = HttpAirtableTransport::new(config)?;
        Ok(Self::with_transport(Arc::new(transport)))
    }

    pub fn with_transport(transport: Arc<dyn AirtableTransport>) -> Self {
        Self { transport }
    }

    /// Follow every continuation offset and collect all matching rows
    async fn fetch_all(
        &self,
        table: &str,
        mut query: ListRecordsQuery,
    ) -> Result<Vec<Row>, DataError> {
        let mut rows = Vec::new();
        loop {
            let page = self.transport.list_records(table, &query).await?;
            rows.extend(page.records.into_iter().map(|record| record.into_row()));
            match page.offset {
                Some(offset) if !offset.is_empty() => query.offset = Some(offset),
                _ => break,
            }
        }
        Ok(rows)
    }
}

/// Reduce a UI sort order to `asc` / `desc`
pub fn normalize_direction(order: &str) -> String {
    let trimmed = order.trim();
    trimmed
        .strip_suffix("ending")
        .unwrap_or(trimmed)
        .to_lowercase()
}

/// Single-element sort directive, when both column and order are given
pub fn sort_directives(column: Option<&str>, order: Option<&str>) -> Vec<SortDirective> {
    match (column, order) {
        (Some(field), Some(order)) if !field.is_empty() && !order.is_empty() => {
            vec![SortDirective {
                field: field.to_string(),
                direction: normalize_direction(order),
            }]
        }
        _ => Vec::new(),
    }
}

/// Translate equality filters into a `filterByFormula` expression.
///
/// A single pair is emitted bare; several are wrapped in `AND(...)`.
pub fn equality_formula(filter: &SearchFilter) -> Option<String> {
    let clauses: Vec<String> = filter
        .equal
        .iter()
        .map(|(field, value)| format!("{}='{}'", field, formula_value(value)))
        .collect();

    match clauses.len() {
        0 => None,
        1 => clauses.into_iter().next(),
        _ => Some(format!("AND({})", clauses.join(","))),
    }
}

fn formula_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Adapter for AirtableAdapter {
    fn schema(&self) -> AdapterSchema {
        let table = || ("table".to_string(), SchemaField::required(FieldKind::String));
        let id = || ("id".to_string(), SchemaField::required(FieldKind::String));

        let mut datasource = IndexMap::new();
        datasource.insert("apiKey".to_string(), SchemaField::required(FieldKind::Password));
        datasource.insert("base".to_string(), SchemaField::required(FieldKind::String));

        let mut query = IndexMap::new();
        query.insert(
            "create".to_string(),
            OperationSchema {
                kind: FieldKind::Json,
                customisable: true,
                fields: IndexMap::from([table()]),
            },
        );
        query.insert(
            "read".to_string(),
            OperationSchema {
                kind: FieldKind::Fields,
                customisable: false,
                fields: IndexMap::from([
                    table(),
                    ("view".to_string(), SchemaField::optional(FieldKind::String)),
                    (
                        "numRecords".to_string(),
                        SchemaField::optional(FieldKind::Number).with_default(json!(10)),
                    ),
                ]),
            },
        );
        query.insert(
            "update".to_string(),
            OperationSchema {
                kind: FieldKind::Fields,
                customisable: true,
                fields: IndexMap::from([id(), table()]),
            },
        );
        query.insert(
            "delete".to_string(),
            OperationSchema {
                kind: FieldKind::Json,
                customisable: false,
                fields: IndexMap::from([id(), table()]),
            },
        );

        AdapterSchema {
            docs: "https://airtable.com/developers/web/api/introduction".to_string(),
            friendly_name: "Airtable".to_string(),
            description: "Airtable is a spreadsheet-database hybrid, with the features of a database but applied to a spreadsheet.".to_string(),
            datasource,
            query,
        }
    }

    async fn create(&self, table: &str, record: Row) -> Result<Row, DataError> {
        self.transport
            .create_record(table, record)
            .await
            .map(|record| record.into_row())
            .map_err(|e| {
                error!("Error writing to airtable table {}: {}", table, e);
                e
            })
    }

    async fn read(&self, request: ReadRequest) -> Vec<Row> {
        let query = ListRecordsQuery {
            view: request.view.clone(),
            filter_by_formula: request.filter_formula.clone(),
            sort: request.sort.clone(),
            ..Default::default()
        };

        let rows = match self.fetch_all(&request.table, query).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("Error querying airtable table {}: {}", request.table, e);
                return Vec::new();
            }
        };

        let Some(limit) = request.limit.filter(|limit| *limit > 0) else {
            return rows;
        };
        let page = request
            .pagination
            .and_then(|p| p.bookmark)
            .unwrap_or(1)
            .max(1);
        let Some(end) = usize::try_from(page)
            .ok()
            .and_then(|page| limit.checked_mul(page))
        else {
            error!(
                "Page {} of airtable table {} is out of range",
                page, request.table
            );
            return Vec::new();
        };
        let offset = end - limit;
        debug!(
            table = %request.table,
            matched = rows.len(),
            offset,
            "Slicing airtable read window"
        );

        rows.into_iter().skip(offset).take(end).collect()
    }

    async fn update(&self, table: &str, id: &str, record: Row) -> Result<Row, DataError> {
        self.transport
            .update_record(table, id, record)
            .await
            .map(|record| record.into_row())
            .map_err(|e| {
                error!("Error updating airtable record {} in {}: {}", id, table, e);
                e
            })
    }

    async fn delete(&self, table: &str, id: &str) -> Result<Row, DataError> {
        match self.transport.delete_record(table, id).await {
            Ok(deleted) => {
                let mut row = Row::new();
                row.insert("id".to_string(), Value::String(deleted.id));
                row.insert("deleted".to_string(), Value::Bool(deleted.deleted));
                Ok(row)
            }
            Err(e) => {
                error!("Error deleting airtable record {} in {}: {}", id, table, e);
                Err(e)
            }
        }
    }

    async fn search(&self, query: &SearchQuery, params: &SearchParams) -> PageResult {
        let request = ReadRequest {
            table: query.table.clone(),
            view: query.view.clone(),
            limit: params.limit,
            sort: sort_directives(params.sort_column.as_deref(), params.sort_order.as_deref()),
            filter_formula: equality_formula(&query.filter),
            pagination: params.pagination,
        };

        PageResult {
            rows: self.read(request).await,
            ..PageResult::default()
        }
    }

    async fn test_connection(&self) -> ConnectionStatus {
        let query = ListRecordsQuery {
            page_size: Some(1),
            ..Default::default()
        };
        match self.transport.list_records(SENTINEL_TABLE, &query).await {
            Ok(_) => ConnectionStatus::connected(),
            Err(e) => {
                let message = e.to_string();
                if message.contains(TABLE_NOT_FOUND) && message.contains(SENTINEL_TABLE) {
                    ConnectionStatus::connected()
                } else {
                    ConnectionStatus::failed(message)
                }
            }
        }
    }
}

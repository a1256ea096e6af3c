//! The seam between the fetch engine and concrete backends

use std::sync::Arc;

use async_trait::async_trait;
use gf_core::model::{
    Cursor, Datasource, DatasourceKind, Definition, Metadata, PaginationKind, Row, SearchFilter,
    SortState,
};

use super::external::ExternalBackend;
use super::query::QueryBackend;
use super::registry::ServiceRegistry;
use super::table::TableBackend;
use crate::features::Features;
use crate::DataError;

/// Pagination attached to a request
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationRequest {
    pub kind: PaginationKind,
    /// Page number for page kind, opaque token (or nothing) for cursor kind
    pub cursor: Option<Cursor>,
    pub limit: usize,
}

/// Backend-agnostic description of one page fetch
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub parameters: Metadata,
    pub pagination: Option<PaginationRequest>,
    pub filter: SearchFilter,
    pub sort: SortState,
    pub limit: usize,
}

/// Backend response before normalization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPage {
    pub rows: Option<Vec<Row>>,
    /// Continuation the backend handed back, if any
    pub cursor: Option<Cursor>,
    pub info: Metadata,
}

/// Executes page requests for one kind of datasource
#[async_trait]
pub trait FetchBackend: Send + Sync {
    fn kind(&self) -> DatasourceKind;

    /// Capabilities for the given (possibly missing) definition
    fn features(&self, definition: Option<&Definition>) -> Features;

    async fn execute(
        &self,
        datasource: &Datasource,
        request: &PageRequest,
    ) -> Result<RawPage, DataError>;
}

/// Pick the backend serving a datasource kind
pub fn resolve_backend(
    datasource: &Datasource,
    registry: &ServiceRegistry,
) -> Result<Arc<dyn FetchBackend>, DataError> {
    match datasource.kind {
        DatasourceKind::Table => Ok(Arc::new(TableBackend::new(registry.rows.clone()))),
        DatasourceKind::Query => Ok(Arc::new(QueryBackend::new(registry.queries.clone()))),
        DatasourceKind::External => {
            let source_id = datasource.source_id.as_deref().ok_or_else(|| {
                DataError::InvalidDatasource("external datasource has no source".to_string())
            })?;
            let adapter = registry
                .adapter(source_id)
                .ok_or_else(|| DataError::MissingAdapter(source_id.to_string()))?;
            Ok(Arc::new(ExternalBackend::new(adapter)))
        }
    }
}

/// Identifier the backends address, or an error naming the datasource kind
pub(crate) fn require_id(datasource: &Datasource) -> Result<&str, DataError> {
    datasource.table_id().ok_or_else(|| {
        DataError::InvalidDatasource(format!("{} datasource has no id", datasource.kind.as_str()))
    })
}

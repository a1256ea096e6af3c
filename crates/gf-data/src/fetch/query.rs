//! Saved-query backend

use std::sync::Arc;

use async_trait::async_trait;
use gf_core::model::{Cursor, Datasource, DatasourceKind, Definition};
use gf_core::services::{QueryPagination, QueryRequest, QueryService};
use tracing::debug;

use super::backend::{require_id, FetchBackend, PageRequest, RawPage};
use crate::features::{negotiate, Features};
use crate::DataError;

/// Executes saved queries. Pagination is whatever the definition declares;
/// filtering and sorting happen client-side.
pub struct QueryBackend {
    queries: Arc<dyn QueryService>,
}

impl QueryBackend {
    pub fn new(queries: Arc<dyn QueryService>) -> Self {
        Self { queries }
    }
}

#[async_trait]
impl FetchBackend for QueryBackend {
    fn kind(&self) -> DatasourceKind {
        DatasourceKind::Query
    }

    fn features(&self, definition: Option<&Definition>) -> Features {
        negotiate(definition)
    }

    async fn execute(
        &self,
        datasource: &Datasource,
        request: &PageRequest,
    ) -> Result<RawPage, DataError> {
        let query_id = require_id(datasource)?.to_string();
        let payload = QueryRequest {
            query_id,
            parameters: request.parameters.clone(),
            pagination: request.pagination.as_ref().map(|p| QueryPagination {
                page: p.cursor.clone(),
                limit: p.limit,
            }),
        };
        debug!(
            query = %payload.query_id,
            paginated = payload.pagination.is_some(),
            "Executing query"
        );

        let response = self.queries.execute_query(payload).await?;
        Ok(RawPage {
            rows: response.data,
            cursor: response
                .pagination
                .and_then(|p| p.cursor)
                .as_ref()
                .and_then(Cursor::from_json),
            info: response.rest,
        })
    }
}

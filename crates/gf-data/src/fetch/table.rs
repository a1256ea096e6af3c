//! Built-in table backend

use std::sync::Arc;

use async_trait::async_trait;
use gf_core::model::{Datasource, DatasourceKind, Definition, Metadata, PaginationKind};
use gf_core::services::{RowService, TableSearch};

use super::backend::{require_id, FetchBackend, PageRequest, RawPage};
use crate::features::Features;
use crate::DataError;

/// Searches tables through the row service, which filters, sorts and pages natively
pub struct TableBackend {
    rows: Arc<dyn RowService>,
}

impl TableBackend {
    pub fn new(rows: Arc<dyn RowService>) -> Self {
        Self { rows }
    }
}

#[async_trait]
impl FetchBackend for TableBackend {
    fn kind(&self) -> DatasourceKind {
        DatasourceKind::Table
    }

    fn features(&self, _definition: Option<&Definition>) -> Features {
        Features {
            supports_pagination: true,
            supports_search: true,
            supports_sort: true,
            pagination_kind: Some(PaginationKind::Cursor),
        }
    }

    async fn execute(
        &self,
        datasource: &Datasource,
        request: &PageRequest,
    ) -> Result<RawPage, DataError> {
        let search = TableSearch {
            table_id: require_id(datasource)?.to_string(),
            limit: (request.limit > 0).then_some(request.limit),
            query: request.filter.clone(),
            paginate: request.pagination.is_some(),
            bookmark: request.pagination.as_ref().and_then(|p| p.cursor.clone()),
            sort: request.sort.is_active().then(|| request.sort.clone()),
        };

        let response = self.rows.search_table(search).await?;
        Ok(RawPage {
            rows: Some(response.rows),
            cursor: if response.has_next_page {
                response.bookmark
            } else {
                None
            },
            info: Metadata::new(),
        })
    }
}

//! Backend for tables living in third-party services

use std::sync::Arc;

use async_trait::async_trait;
use gf_core::model::{Cursor, Datasource, DatasourceKind, Definition};

use super::backend::{require_id, FetchBackend, PageRequest, RawPage};
use crate::features::{negotiate, Features};
use crate::sources::{Adapter, PaginationParams, SearchParams, SearchQuery};
use crate::DataError;

/// Routes page requests through a registered adapter's `search`
pub struct ExternalBackend {
    adapter: Arc<dyn Adapter>,
}

impl ExternalBackend {
    pub fn new(adapter: Arc<dyn Adapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl FetchBackend for ExternalBackend {
    fn kind(&self) -> DatasourceKind {
        DatasourceKind::External
    }

    fn features(&self, definition: Option<&Definition>) -> Features {
        negotiate(definition).with_search(true).with_sort(true)
    }

    async fn execute(
        &self,
        datasource: &Datasource,
        request: &PageRequest,
    ) -> Result<RawPage, DataError> {
        let query = SearchQuery {
            table: require_id(datasource)?.to_string(),
            view: datasource.view.clone(),
            filter: request.filter.clone(),
        };
        let sort_column = request.sort.column.clone().filter(|c| !c.is_empty());
        let params = SearchParams {
            limit: (request.limit > 0).then_some(request.limit),
            sort_order: sort_column
                .as_ref()
                .map(|_| request.sort.order.label().to_string()),
            sort_column,
            pagination: request.pagination.as_ref().map(|p| PaginationParams {
                bookmark: p.cursor.as_ref().and_then(Cursor::page_number),
            }),
        };

        let result = self.adapter.search(&query, &params).await;
        Ok(RawPage {
            rows: Some(result.rows),
            cursor: result.cursor,
            info: result.info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gf_core::model::{PageResult, PaginationKind, Row, SearchFilter, SortOrder, SortState};
    use indexmap::IndexMap;
    use parking_lot::Mutex;

    use crate::fetch::backend::PaginationRequest;
    use crate::sources::{AdapterSchema, ConnectionStatus, ReadRequest};

    #[derive(Default)]
    struct RecordingAdapter {
        searches: Mutex<Vec<(SearchQuery, SearchParams)>>,
    }

    #[async_trait]
    impl Adapter for RecordingAdapter {
        fn schema(&self) -> AdapterSchema {
            AdapterSchema {
                docs: String::new(),
                friendly_name: "Recording".to_string(),
                description: String::new(),
                datasource: IndexMap::new(),
                query: IndexMap::new(),
            }
        }

        async fn create(&self, _table: &str, record: Row) -> Result<Row, DataError> {
            Ok(record)
        }

        async fn read(&self, _request: ReadRequest) -> Vec<Row> {
            Vec::new()
        }

        async fn update(&self, _table: &str, _id: &str, record: Row) -> Result<Row, DataError> {
            Ok(record)
        }

        async fn delete(&self, _table: &str, _id: &str) -> Result<Row, DataError> {
            Ok(Row::new())
        }

        async fn search(&self, query: &SearchQuery, params: &SearchParams) -> PageResult {
            self.searches.lock().push((query.clone(), params.clone()));
            PageResult::empty()
        }

        async fn test_connection(&self) -> ConnectionStatus {
            ConnectionStatus::connected()
        }
    }

    #[tokio::test]
    async fn test_request_maps_onto_search_params() {
        let adapter = Arc::new(RecordingAdapter::default());
        let backend = ExternalBackend::new(adapter.clone());
        let datasource = Datasource::external("ds_air", "Tasks").with_view("Grid view");
        let request = PageRequest {
            parameters: Default::default(),
            pagination: Some(PaginationRequest {
                kind: PaginationKind::Page,
                cursor: Some(Cursor::Page(3)),
                limit: 20,
            }),
            filter: SearchFilter::equal("status", "open"),
            sort: SortState::by("name", SortOrder::Descending),
            limit: 20,
        };

        backend.execute(&datasource, &request).await.unwrap();

        let (query, params) = adapter.searches.lock()[0].clone();
        assert_eq!(query.table, "Tasks");
        assert_eq!(query.view.as_deref(), Some("Grid view"));
        assert_eq!(query.filter, SearchFilter::equal("status", "open"));
        assert_eq!(params.limit, Some(20));
        assert_eq!(params.sort_column.as_deref(), Some("name"));
        assert_eq!(params.sort_order.as_deref(), Some("descending"));
        assert_eq!(params.pagination.unwrap().bookmark, Some(3));
    }

    #[tokio::test]
    async fn test_unsorted_request_sends_no_order() {
        let adapter = Arc::new(RecordingAdapter::default());
        let backend = ExternalBackend::new(adapter.clone());
        let request = PageRequest {
            parameters: Default::default(),
            pagination: None,
            filter: SearchFilter::default(),
            sort: SortState::default(),
            limit: 10,
        };

        backend
            .execute(&Datasource::external("ds_air", "Tasks"), &request)
            .await
            .unwrap();

        let (_, params) = adapter.searches.lock()[0].clone();
        assert_eq!(params.sort_column, None);
        assert_eq!(params.sort_order, None);
        assert!(params.pagination.is_none());
    }

    #[test]
    fn test_search_and_sort_are_native() {
        let backend = ExternalBackend::new(Arc::new(RecordingAdapter::default()));
        let features = backend.features(None);
        assert!(features.supports_search);
        assert!(features.supports_sort);
        assert!(!features.supports_pagination);
    }
}

//! Pagination engine.
//!
//! A [`FetchController`] owns the query state for one datasource, negotiates
//! what its backend can do natively and turns every backend response into a
//! uniform [`PageResult`]. Whatever the backend cannot filter, sort or page
//! is done here on the rows it returned.

pub mod backend;
pub mod external;
pub mod query;
pub mod registry;
pub mod table;

pub use backend::{resolve_backend, FetchBackend, PageRequest, PaginationRequest, RawPage};
pub use external::ExternalBackend;
pub use query::QueryBackend;
pub use registry::ServiceRegistry;
pub use table::TableBackend;

use std::sync::Arc;

use gf_core::model::{
    compare_values, Cursor, Datasource, Definition, PageResult, PaginationKind, QueryState,
    QueryUpdate, Row, SortOrder,
};
use gf_core::services::{DatasourceListing, DefinitionService};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::features::{enrich_definition, resolve_backend_kind, Features};
use crate::DataError;

#[derive(Debug, Clone)]
struct FetchState {
    query: QueryState,
    definition: Option<Definition>,
    definition_loaded: bool,
    features: Features,
    /// Cursor of every page visited since the last reset; the last one is current
    history: Vec<Option<Cursor>>,
    next_cursor: Option<Cursor>,
    has_next_page: bool,
    /// Bumped on every reset so late results don't overwrite fresh state
    generation: u64,
    /// Bumped only when filter, sort, limit or paginate change
    revision: u64,
}

impl FetchState {
    fn new(config: &FetchConfig) -> Self {
        Self {
            query: QueryState::new(config.limit, config.paginate),
            definition: None,
            definition_loaded: false,
            features: Features::default(),
            history: vec![None],
            next_cursor: None,
            has_next_page: false,
            generation: 0,
            revision: 0,
        }
    }

    fn reset_position(&mut self) {
        self.query.cursor = None;
        self.history = vec![None];
        self.next_cursor = None;
        self.has_next_page = false;
        self.generation += 1;
    }
}

/// Fetches pages of one datasource
pub struct FetchController {
    datasource: Datasource,
    backend: Arc<dyn FetchBackend>,
    definitions: Arc<dyn DefinitionService>,
    listing: Arc<dyn DatasourceListing>,
    state: RwLock<FetchState>,
}

impl FetchController {
    /// Create a controller for a datasource, picking its backend from the registry
    pub fn new(
        datasource: Datasource,
        config: FetchConfig,
        registry: &ServiceRegistry,
    ) -> Result<Self, DataError> {
        if !datasource.is_valid() {
            return Err(DataError::InvalidDatasource(format!(
                "{} datasource is missing its identifier or source",
                datasource.kind.as_str()
            )));
        }
        let backend = resolve_backend(&datasource, registry)?;
        Ok(Self::with_backend(
            datasource,
            config,
            backend,
            registry.definitions.clone(),
            registry.datasources.clone(),
        ))
    }

    pub fn with_backend(
        datasource: Datasource,
        config: FetchConfig,
        backend: Arc<dyn FetchBackend>,
        definitions: Arc<dyn DefinitionService>,
        listing: Arc<dyn DatasourceListing>,
    ) -> Self {
        Self {
            datasource,
            backend,
            definitions,
            listing,
            state: RwLock::new(FetchState::new(&config)),
        }
    }

    pub fn datasource(&self) -> &Datasource {
        &self.datasource
    }

    pub fn query(&self) -> QueryState {
        self.state.read().query.clone()
    }

    pub fn features(&self) -> Features {
        self.state.read().features
    }

    pub fn definition(&self) -> Option<Definition> {
        self.state.read().definition.clone()
    }

    /// One-based number of the current page
    pub fn page_number(&self) -> usize {
        self.state.read().history.len()
    }

    pub fn has_next_page(&self) -> bool {
        self.state.read().has_next_page
    }

    pub fn has_prev_page(&self) -> bool {
        self.state.read().history.len() > 1
    }

    /// Number of query changes applied through [`FetchController::update`].
    /// Navigation leaves it alone.
    pub fn revision(&self) -> u64 {
        self.state.read().revision
    }

    /// Fetch and enrich the definition, then negotiate features against it.
    ///
    /// A failed fetch leaves the controller without a definition, which
    /// disables reads until the next successful load.
    pub async fn load_definition(&self) -> Option<Definition> {
        let config = {
            let state = self.state.read();
            FetchConfig::new(state.query.limit, state.query.paginate)
        };

        let definition = match self.definitions.fetch_definition(&self.datasource).await {
            Ok(mut definition) => {
                if definition.fields.is_empty() {
                    definition.fields = self.datasource.fields.clone();
                }
                let backend = match definition.backend.clone() {
                    Some(kind) => Some(kind),
                    None if config.paginate => {
                        resolve_backend_kind(self.listing.as_ref(), &self.datasource).await
                    }
                    None => None,
                };
                Some(enrich_definition(definition, backend.as_ref(), &config))
            }
            Err(e) => {
                warn!(
                    "Failed to fetch definition for {} datasource {:?}: {}",
                    self.datasource.kind.as_str(),
                    self.datasource.id,
                    e
                );
                None
            }
        };

        let features = self.backend.features(definition.as_ref());
        debug!(?features, "Negotiated datasource features");

        let mut state = self.state.write();
        state.definition = definition.clone();
        state.definition_loaded = true;
        state.features = features;
        definition
    }

    /// Fetch the page the current cursor points at.
    ///
    /// Never fails: backend errors and a missing definition come back as an
    /// empty page with no continuation.
    pub async fn get_data(&self) -> PageResult {
        let (query, definition_present, features) = {
            let state = self.state.read();
            (
                state.query.clone(),
                state.definition.is_some(),
                state.features,
            )
        };
        if !definition_present {
            debug!("No definition loaded, skipping fetch");
            return PageResult::empty();
        }

        let kind = features
            .pagination_kind
            .filter(|_| query.paginate && features.supports_pagination);
        let request_page = match kind {
            Some(PaginationKind::Page) => Some(
                query
                    .cursor
                    .as_ref()
                    .and_then(Cursor::page_number)
                    .unwrap_or(1),
            ),
            _ => None,
        };
        let pagination = kind.map(|kind| PaginationRequest {
            kind,
            cursor: match kind {
                PaginationKind::Page => request_page.map(Cursor::Page),
                PaginationKind::Cursor => query.cursor.clone(),
            },
            limit: query.limit,
        });

        let request = PageRequest {
            parameters: self.datasource.resolved_parameters(),
            pagination,
            filter: query.filter.clone(),
            sort: query.sort.clone(),
            limit: query.limit,
        };

        let raw = match self.backend.execute(&self.datasource, &request).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    "Failed to fetch {} datasource {:?}: {}",
                    self.datasource.kind.as_str(),
                    self.datasource.id,
                    e
                );
                return PageResult::empty();
            }
        };

        let mut rows = raw.rows.unwrap_or_default();
        let (cursor, has_next_page) = match (kind, request_page) {
            (Some(PaginationKind::Page), Some(page)) => (
                Some(Cursor::Page(page + 1)),
                query.limit > 0 && rows.len() == query.limit,
            ),
            (Some(PaginationKind::Cursor), _) => {
                let next = raw
                    .cursor
                    .filter(|c| !matches!(c, Cursor::Token(token) if token.is_empty()));
                let has_next = next.is_some();
                (next, has_next)
            }
            _ => (None, false),
        };

        apply_client_fallbacks(&mut rows, &query, &features);

        PageResult {
            rows,
            cursor,
            has_next_page,
            info: raw.info,
        }
    }

    /// Reset to the first page and fetch it, loading the definition if needed
    pub async fn first_page(&self) -> PageResult {
        let needs_definition = !self.state.read().definition_loaded;
        if needs_definition {
            self.load_definition().await;
        }

        let generation = {
            let mut state = self.state.write();
            state.reset_position();
            state.generation
        };
        let result = self.get_data().await;
        self.record(generation, &result);
        result
    }

    /// Advance to the next page. `None` when there is no next page.
    pub async fn next_page(&self) -> Option<PageResult> {
        let generation = {
            let mut state = self.state.write();
            if !state.has_next_page {
                return None;
            }
            let next = state.next_cursor.clone();
            state.query.cursor = next.clone();
            state.history.push(next);
            state.generation
        };
        let result = self.get_data().await;
        self.record(generation, &result);
        Some(result)
    }

    /// Step back one page. `None` when already on the first page.
    pub async fn prev_page(&self) -> Option<PageResult> {
        let generation = {
            let mut state = self.state.write();
            if state.history.len() <= 1 {
                return None;
            }
            state.history.pop();
            state.query.cursor = state.history.last().cloned().flatten();
            state.generation
        };
        let result = self.get_data().await;
        self.record(generation, &result);
        Some(result)
    }

    /// Apply a partial query change. Returns whether anything changed; any
    /// change moves the controller back to the first page.
    pub fn update(&self, update: QueryUpdate) -> bool {
        let mut state = self.state.write();
        let mut changed = false;

        if let Some(filter) = update.filter {
            if state.query.filter != filter {
                state.query.filter = filter;
                changed = true;
            }
        }
        if let Some(sort) = update.sort {
            if state.query.sort != sort {
                state.query.sort = sort;
                changed = true;
            }
        }
        if let Some(limit) = update.limit {
            if state.query.limit != limit {
                state.query.limit = limit;
                changed = true;
            }
        }
        if let Some(paginate) = update.paginate {
            if state.query.paginate != paginate {
                state.query.paginate = paginate;
                // enrichment depends on it
                state.definition_loaded = false;
                changed = true;
            }
        }

        if changed {
            state.revision += 1;
            state.reset_position();
        }
        changed
    }

    fn record(&self, generation: u64, result: &PageResult) {
        let mut state = self.state.write();
        if state.generation != generation {
            debug!("Discarding page result from a superseded query");
            return;
        }
        state.next_cursor = result.cursor.clone();
        state.has_next_page = result.has_next_page;
    }
}

impl std::fmt::Debug for FetchController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchController")
            .field("datasource", &self.datasource)
            .field("backend", &self.backend.kind())
            .field("state", &*self.state.read())
            .finish()
    }
}

/// Filter, sort and truncate rows for whatever the backend doesn't do itself
fn apply_client_fallbacks(rows: &mut Vec<Row>, query: &QueryState, features: &Features) {
    if !features.supports_search && !query.filter.is_empty() {
        rows.retain(|row| query.filter.matches(row));
    }

    if !features.supports_sort {
        if let Some(column) = query.sort.column.as_deref().filter(|c| !c.is_empty()) {
            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(column), b.get(column));
                match query.sort.order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }
    }

    if !features.supports_pagination && query.limit > 0 {
        rows.truncate(query.limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gf_core::model::{
        row_id, BackendKind, DatasourceKind, PaginationDescriptor, PaginationLocation,
        SearchFilter, SortState, TABLE_ID_FIELD,
    };
    use gf_core::services::{
        DatasourceInfo, QueryRequest, QueryResponse, QueryService, ResponsePagination, RowService,
        TableSearch, TableSearchResponse,
    };
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    use crate::features::negotiate;

    struct Definitions(Option<Definition>);

    #[async_trait]
    impl DefinitionService for Definitions {
        async fn fetch_definition(&self, _datasource: &Datasource) -> anyhow::Result<Definition> {
            self.0
                .clone()
                .ok_or_else(|| anyhow::anyhow!("definition unavailable"))
        }
    }

    struct Listing(Vec<DatasourceInfo>);

    #[async_trait]
    impl DatasourceListing for Listing {
        async fn list_datasources(&self) -> anyhow::Result<Vec<DatasourceInfo>> {
            Ok(self.0.clone())
        }
    }

    /// Backend returning canned rows; pagination support comes from the definition
    struct ScriptedBackend {
        rows: Vec<Row>,
        cursor: Option<Cursor>,
        native_search: bool,
        native_sort: bool,
        fail: bool,
        requests: Mutex<Vec<PageRequest>>,
    }

    impl ScriptedBackend {
        fn with_rows(rows: Vec<Row>) -> Self {
            Self {
                rows,
                cursor: None,
                native_search: true,
                native_sort: true,
                fail: false,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn counted(count: usize) -> Self {
            Self::with_rows((0..count).map(|i| numbered(i as i64)).collect())
        }

        fn requests(&self) -> Vec<PageRequest> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl FetchBackend for ScriptedBackend {
        fn kind(&self) -> DatasourceKind {
            DatasourceKind::Query
        }

        fn features(&self, definition: Option<&Definition>) -> Features {
            negotiate(definition)
                .with_search(self.native_search)
                .with_sort(self.native_sort)
        }

        async fn execute(
            &self,
            _datasource: &Datasource,
            request: &PageRequest,
        ) -> Result<RawPage, DataError> {
            self.requests.lock().push(request.clone());
            if self.fail {
                return Err(DataError::Transport("connection refused".to_string()));
            }
            Ok(RawPage {
                rows: Some(self.rows.clone()),
                cursor: self.cursor.clone(),
                info: Default::default(),
            })
        }
    }

    /// Row service over a plain vector, paging by page-number bookmarks
    #[derive(Default)]
    struct MemoryRows {
        rows: Mutex<Vec<Row>>,
    }

    #[async_trait]
    impl RowService for MemoryRows {
        async fn save_row(&self, row: Row, _suppress_errors: bool) -> anyhow::Result<Row> {
            let mut rows = self.rows.lock();
            rows.retain(|existing| row_id(existing) != row_id(&row));
            rows.push(row.clone());
            Ok(row)
        }

        async fn delete_rows(&self, _table_id: &str, rows: Vec<Row>) -> anyhow::Result<()> {
            self.rows
                .lock()
                .retain(|existing| !rows.iter().any(|row| row_id(row) == row_id(existing)));
            Ok(())
        }

        async fn search_table(&self, search: TableSearch) -> anyhow::Result<TableSearchResponse> {
            let mut rows: Vec<Row> = self
                .rows
                .lock()
                .iter()
                .filter(|row| row.get(TABLE_ID_FIELD) == Some(&json!(search.table_id)))
                .filter(|row| search.query.matches(row))
                .cloned()
                .collect();
            if let Some(column) = search.sort.as_ref().and_then(|s| s.column.clone()) {
                rows.sort_by(|a, b| compare_values(a.get(&column), b.get(&column)));
            }

            let page = search.bookmark.as_ref().and_then(Cursor::page_number).unwrap_or(1);
            let limit = search.limit.unwrap_or(rows.len());
            let offset = if search.paginate { (page as usize - 1) * limit } else { 0 };
            let has_next_page = search.paginate && rows.len() > offset + limit;
            Ok(TableSearchResponse {
                rows: rows.into_iter().skip(offset).take(limit).collect(),
                bookmark: has_next_page.then_some(Cursor::Page(page + 1)),
                has_next_page,
            })
        }
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    }

    fn numbered(n: i64) -> Row {
        json!({ "_id": format!("r{n}"), "n": n })
            .as_object()
            .cloned()
            .unwrap()
    }

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn paginated(kind: PaginationKind) -> Definition {
        Definition::default().with_pagination(PaginationDescriptor {
            kind: Some(kind),
            location: Some(PaginationLocation::Query),
            page_param: Some("page".to_string()),
            size_param: Some("limit".to_string()),
            page_size: None,
        })
    }

    fn controller(
        backend: Arc<ScriptedBackend>,
        definition: Option<Definition>,
        config: FetchConfig,
    ) -> FetchController {
        FetchController::with_backend(
            Datasource::query("q1"),
            config,
            backend,
            Arc::new(Definitions(definition)),
            Arc::new(Listing(Vec::new())),
        )
    }

    #[tokio::test]
    async fn test_full_page_means_more_pages() {
        let backend = Arc::new(ScriptedBackend::counted(100));
        let fetch = controller(
            backend.clone(),
            Some(paginated(PaginationKind::Page)),
            FetchConfig::new(100, true),
        );

        let page = fetch.first_page().await;
        assert_eq!(page.len(), 100);
        assert!(page.has_next_page);
        assert_eq!(page.cursor, Some(Cursor::Page(2)));

        let requests = backend.requests();
        let pagination = requests[0].pagination.clone().unwrap();
        assert_eq!(pagination.cursor, Some(Cursor::Page(1)));
        assert_eq!(pagination.limit, 100);
    }

    #[tokio::test]
    async fn test_short_page_is_the_last() {
        let backend = Arc::new(ScriptedBackend::counted(37));
        let fetch = controller(
            backend,
            Some(paginated(PaginationKind::Page)),
            FetchConfig::new(100, true),
        );

        let page = fetch.first_page().await;
        assert_eq!(page.len(), 37);
        assert!(!page.has_next_page);
        assert!(fetch.next_page().await.is_none());
    }

    #[tokio::test]
    async fn test_zero_limit_never_has_next_page() {
        let backend = Arc::new(ScriptedBackend::counted(0));
        let fetch = controller(
            backend,
            Some(paginated(PaginationKind::Page)),
            FetchConfig::new(0, true),
        );

        assert!(!fetch.first_page().await.has_next_page);
    }

    #[tokio::test]
    async fn test_page_cursors_increase_while_navigating() {
        let backend = Arc::new(ScriptedBackend::counted(10));
        let fetch = controller(
            backend.clone(),
            Some(paginated(PaginationKind::Page)),
            FetchConfig::new(10, true),
        );

        let first = fetch.first_page().await;
        let second = fetch.next_page().await.unwrap();
        let third = fetch.next_page().await.unwrap();
        assert_eq!(first.cursor, Some(Cursor::Page(2)));
        assert_eq!(second.cursor, Some(Cursor::Page(3)));
        assert_eq!(third.cursor, Some(Cursor::Page(4)));
        assert_eq!(fetch.page_number(), 3);

        let back = fetch.prev_page().await.unwrap();
        assert_eq!(back.cursor, Some(Cursor::Page(3)));
        assert_eq!(fetch.page_number(), 2);

        let pages: Vec<_> = backend
            .requests()
            .into_iter()
            .map(|r| r.pagination.unwrap().cursor)
            .collect();
        assert_eq!(
            pages,
            vec![
                Some(Cursor::Page(1)),
                Some(Cursor::Page(2)),
                Some(Cursor::Page(3)),
                Some(Cursor::Page(2)),
            ]
        );
    }

    #[tokio::test]
    async fn test_prev_page_on_first_page_is_none() {
        let fetch = controller(
            Arc::new(ScriptedBackend::counted(3)),
            Some(paginated(PaginationKind::Page)),
            FetchConfig::default(),
        );
        fetch.first_page().await;
        assert!(fetch.prev_page().await.is_none());
        assert!(!fetch.has_prev_page());
    }

    #[tokio::test]
    async fn test_cursor_kind_follows_backend_cursor() {
        let mut backend = ScriptedBackend::counted(5);
        backend.cursor = Some(Cursor::Token("abc".to_string()));
        let backend = Arc::new(backend);
        let fetch = controller(
            backend.clone(),
            Some(paginated(PaginationKind::Cursor)),
            FetchConfig::new(5, true),
        );

        let page = fetch.first_page().await;
        assert!(page.has_next_page);
        assert_eq!(page.cursor, Some(Cursor::Token("abc".to_string())));

        fetch.next_page().await.unwrap();
        let requests = backend.requests();
        assert_eq!(requests[0].pagination.clone().unwrap().cursor, None);
        assert_eq!(
            requests[1].pagination.clone().unwrap().cursor,
            Some(Cursor::Token("abc".to_string()))
        );
    }

    #[tokio::test]
    async fn test_cursor_kind_without_cursor_is_last_page() {
        for cursor in [None, Some(Cursor::Token(String::new()))] {
            let mut backend = ScriptedBackend::counted(5);
            backend.cursor = cursor;
            let fetch = controller(
                Arc::new(backend),
                Some(paginated(PaginationKind::Cursor)),
                FetchConfig::new(5, true),
            );

            let page = fetch.first_page().await;
            assert!(!page.has_next_page);
            assert_eq!(page.cursor, None);
        }
    }

    #[tokio::test]
    async fn test_backend_failure_yields_empty_page() {
        init_tracing();
        let mut backend = ScriptedBackend::counted(5);
        backend.fail = true;
        let fetch = controller(
            Arc::new(backend),
            Some(paginated(PaginationKind::Page)),
            FetchConfig::default(),
        );

        let page = fetch.first_page().await;
        assert_eq!(page, PageResult::empty());
    }

    #[tokio::test]
    async fn test_definition_failure_disables_reads() {
        init_tracing();
        let backend = Arc::new(ScriptedBackend::counted(5));
        let fetch = controller(backend.clone(), None, FetchConfig::default());

        assert!(fetch.load_definition().await.is_none());
        let page = fetch.first_page().await;
        assert!(page.is_empty());
        assert!(!page.has_next_page);
        assert!(backend.requests().is_empty());
        assert!(!fetch.features().supports_pagination);
    }

    #[tokio::test]
    async fn test_unpaginated_backend_gets_no_pagination_and_truncates() {
        let backend = Arc::new(ScriptedBackend::counted(25));
        let fetch = controller(
            backend.clone(),
            Some(Definition::default()),
            FetchConfig::new(10, true),
        );

        let page = fetch.first_page().await;
        assert_eq!(page.len(), 10);
        assert!(!page.has_next_page);
        assert_eq!(page.cursor, None);
        assert!(backend.requests()[0].pagination.is_none());
    }

    #[tokio::test]
    async fn test_paginate_off_skips_pagination() {
        let backend = Arc::new(ScriptedBackend::counted(10));
        let fetch = controller(
            backend.clone(),
            Some(paginated(PaginationKind::Page)),
            FetchConfig::new(10, false),
        );

        let page = fetch.first_page().await;
        assert!(!page.has_next_page);
        assert!(backend.requests()[0].pagination.is_none());
    }

    #[tokio::test]
    async fn test_client_side_filter_and_sort() {
        let mut backend = ScriptedBackend::with_rows(vec![
            row(json!({"_id": "a", "status": "open", "rank": 3})),
            row(json!({"_id": "b", "status": "closed", "rank": 1})),
            row(json!({"_id": "c", "status": "open", "rank": 2})),
        ]);
        backend.native_search = false;
        backend.native_sort = false;
        let fetch = controller(
            Arc::new(backend),
            Some(Definition::default()),
            FetchConfig::default(),
        );

        fetch.update(QueryUpdate {
            filter: Some(SearchFilter::equal("status", "open")),
            sort: Some(SortState::by("rank", SortOrder::Descending)),
            ..Default::default()
        });
        let page = fetch.first_page().await;
        let ids: Vec<_> = page.rows.iter().map(|r| r["_id"].clone()).collect();
        assert_eq!(ids, vec![json!("a"), json!("c")]);
    }

    #[tokio::test]
    async fn test_native_search_is_not_repeated_client_side() {
        let backend = ScriptedBackend::with_rows(vec![
            row(json!({"_id": "a", "status": "open"})),
            row(json!({"_id": "b", "status": "closed"})),
        ]);
        let backend = Arc::new(backend);
        let fetch = controller(
            backend.clone(),
            Some(Definition::default()),
            FetchConfig::default(),
        );

        fetch.update(QueryUpdate::filter(SearchFilter::equal("status", "open")));
        let page = fetch.first_page().await;
        assert_eq!(page.len(), 2);
        assert_eq!(
            backend.requests()[0].filter,
            SearchFilter::equal("status", "open")
        );
    }

    #[tokio::test]
    async fn test_update_resets_cursor() {
        let backend = Arc::new(ScriptedBackend::counted(10));
        let fetch = controller(
            backend.clone(),
            Some(paginated(PaginationKind::Page)),
            FetchConfig::new(10, true),
        );
        fetch.first_page().await;
        fetch.next_page().await.unwrap();
        assert_eq!(fetch.query().cursor, Some(Cursor::Page(2)));

        assert!(fetch.update(QueryUpdate::sort(SortState::by("n", SortOrder::Ascending))));
        assert_eq!(fetch.query().cursor, None);
        assert_eq!(fetch.page_number(), 1);
        assert!(!fetch.has_next_page());

        // same value again is not a change
        assert!(!fetch.update(QueryUpdate::sort(SortState::by("n", SortOrder::Ascending))));
    }

    #[tokio::test]
    async fn test_revision_tracks_query_changes_only() {
        let backend = Arc::new(ScriptedBackend::counted(10));
        let fetch = controller(
            backend,
            Some(paginated(PaginationKind::Page)),
            FetchConfig::new(10, true),
        );
        assert_eq!(fetch.revision(), 0);

        fetch.first_page().await;
        fetch.next_page().await.unwrap();
        fetch.prev_page().await.unwrap();
        assert_eq!(fetch.revision(), 0);

        assert!(fetch.update(QueryUpdate::filter(SearchFilter::equal("n", 1))));
        assert_eq!(fetch.revision(), 1);
        assert!(!fetch.update(QueryUpdate::filter(SearchFilter::equal("n", 1))));
        assert_eq!(fetch.revision(), 1);

        fetch.first_page().await;
        assert_eq!(fetch.revision(), 1);
    }

    #[tokio::test]
    async fn test_parameters_overlay_defaults() {
        let backend = Arc::new(ScriptedBackend::counted(1));
        let fetch = FetchController::with_backend(
            Datasource::query("q1")
                .with_parameter("city", Some(json!("Oslo")))
                .with_parameter("year", Some(json!(2020)))
                .with_query_param("year", json!(2024)),
            FetchConfig::default(),
            backend.clone(),
            Arc::new(Definitions(Some(Definition::default()))),
            Arc::new(Listing(Vec::new())),
        );

        fetch.first_page().await;
        let parameters = &backend.requests()[0].parameters;
        assert_eq!(parameters["city"], json!("Oslo"));
        assert_eq!(parameters["year"], json!(2024));
    }

    #[tokio::test]
    async fn test_definition_fields_fall_back_to_datasource() {
        let mut datasource = Datasource::query("q1");
        datasource.fields = vec![gf_core::model::FieldSchema {
            name: "title".to_string(),
            field_type: Some("string".to_string()),
        }];
        let fetch = FetchController::with_backend(
            datasource,
            FetchConfig::default(),
            Arc::new(ScriptedBackend::counted(0)),
            Arc::new(Definitions(Some(Definition::default()))),
            Arc::new(Listing(Vec::new())),
        );

        let definition = fetch.load_definition().await.unwrap();
        assert_eq!(definition.fields.len(), 1);
        assert_eq!(definition.fields[0].name, "title");
    }

    struct RecordingQueries {
        requests: Mutex<Vec<QueryRequest>>,
        rows: usize,
    }

    #[async_trait]
    impl QueryService for RecordingQueries {
        async fn execute_query(&self, request: QueryRequest) -> anyhow::Result<QueryResponse> {
            self.requests.lock().push(request);
            let mut response = QueryResponse {
                data: Some((0..self.rows).map(|i| numbered(i as i64)).collect()),
                pagination: Some(ResponsePagination { cursor: None }),
                ..Default::default()
            };
            response.rest.insert("extra".to_string(), json!(true));
            Ok(response)
        }
    }

    fn registry(
        definition: Option<Definition>,
        listing: Vec<DatasourceInfo>,
        queries: Arc<dyn QueryService>,
        rows: Arc<dyn RowService>,
    ) -> ServiceRegistry {
        ServiceRegistry::new(
            Arc::new(Definitions(definition)),
            Arc::new(Listing(listing)),
            queries,
            rows,
        )
    }

    #[tokio::test]
    async fn test_airtable_query_gets_synthesized_pagination() {
        init_tracing();
        let queries = Arc::new(RecordingQueries {
            requests: Mutex::new(Vec::new()),
            rows: 10,
        });
        let registry = registry(
            Some(Definition::default()),
            vec![
                DatasourceInfo::new("ds_rest", "REST"),
                DatasourceInfo::new("ds_air", "AIRTABLE"),
            ],
            queries.clone(),
            Arc::new(MemoryRows::default()),
        );
        let fetch = FetchController::new(
            Datasource::query("q1").with_source("ds_air"),
            FetchConfig::new(10, true),
            &registry,
        )
        .unwrap();

        let page = fetch.first_page().await;
        let definition = fetch.definition().unwrap();
        assert_eq!(definition.backend, Some(BackendKind::Airtable));
        assert!(fetch.features().supports_pagination);
        assert_eq!(fetch.features().pagination_kind, Some(PaginationKind::Page));
        assert!(page.has_next_page);
        assert_eq!(page.cursor, Some(Cursor::Page(2)));
        assert_eq!(page.info["extra"], json!(true));

        let request = queries.requests.lock()[0].clone();
        let pagination = request.pagination.unwrap();
        assert_eq!(pagination.page, Some(Cursor::Page(1)));
        assert_eq!(pagination.limit, 10);
    }

    #[tokio::test]
    async fn test_rest_query_without_pagination_stays_unpaginated() {
        let queries = Arc::new(RecordingQueries {
            requests: Mutex::new(Vec::new()),
            rows: 15,
        });
        let registry = registry(
            Some(Definition::default()),
            vec![DatasourceInfo::new("ds_rest", "REST")],
            queries.clone(),
            Arc::new(MemoryRows::default()),
        );
        let fetch = FetchController::new(
            Datasource::query("q1").with_source("ds_rest"),
            FetchConfig::new(10, true),
            &registry,
        )
        .unwrap();

        let page = fetch.first_page().await;
        assert_eq!(page.len(), 10);
        assert!(!page.has_next_page);
        assert!(queries.requests.lock()[0].pagination.is_none());
    }

    #[tokio::test]
    async fn test_table_pages_through_row_store() {
        let store = Arc::new(MemoryRows::default());
        for n in 0..5 {
            store
                .save_row(row(json!({"tableId": "people", "_id": format!("p{n}"), "n": n})), false)
                .await
                .unwrap();
        }
        let registry = registry(
            Some(Definition::default()),
            Vec::new(),
            Arc::new(RecordingQueries {
                requests: Mutex::new(Vec::new()),
                rows: 0,
            }),
            store,
        );
        let fetch =
            FetchController::new(Datasource::table("people"), FetchConfig::new(2, true), &registry)
                .unwrap();
        assert_eq!(fetch.features().pagination_kind, None);

        let first = fetch.first_page().await;
        assert_eq!(first.len(), 2);
        assert!(first.has_next_page);
        assert_eq!(fetch.features().pagination_kind, Some(PaginationKind::Cursor));

        let second = fetch.next_page().await.unwrap();
        assert_eq!(second.rows[0]["_id"], json!("p2"));
        let third = fetch.next_page().await.unwrap();
        assert_eq!(third.len(), 1);
        assert!(!third.has_next_page);
        assert!(fetch.next_page().await.is_none());

        let back = fetch.prev_page().await.unwrap();
        assert_eq!(back.rows[0]["_id"], json!("p2"));
    }

    #[test]
    fn test_invalid_datasource_is_rejected() {
        let registry = registry(
            None,
            Vec::new(),
            Arc::new(RecordingQueries {
                requests: Mutex::new(Vec::new()),
                rows: 0,
            }),
            Arc::new(MemoryRows::default()),
        );

        let err = FetchController::new(Datasource::table(""), FetchConfig::default(), &registry)
            .unwrap_err();
        assert!(matches!(err, DataError::InvalidDatasource(_)));

        let err = FetchController::new(
            Datasource::external("missing", "Tasks"),
            FetchConfig::default(),
            &registry,
        )
        .unwrap_err();
        assert!(matches!(err, DataError::MissingAdapter(source) if source == "missing"));
    }
}

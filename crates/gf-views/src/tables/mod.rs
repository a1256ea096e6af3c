//! Table controller
//!
//! Binds the selected datasource, filter and sort stores to a fetch
//! controller and publishes the loaded page for the UI.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use gf_core::model::{
    row_id, FilterCondition, Metadata, QueryUpdate, Row, SearchFilter, SortState, ROW_ID_FIELD,
    TABLE_ID_FIELD,
};
use gf_core::services::TableSearch;
use gf_core::{Datasource, DatasourceKind, Store, SubscriptionSet};
use gf_core::state::Subscription;
use gf_data::{FetchConfig, FetchController, ServiceRegistry};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// What the UI renders for the active datasource
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageState {
    pub rows: Vec<Row>,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    /// One-based; zero until something has been loaded
    pub page_number: usize,
    pub loaded: bool,
    pub loading: bool,
    pub info: Metadata,
}

/// Observable inputs a table controller binds to
#[derive(Clone, Default)]
pub struct TableBindings {
    pub datasource: Store<Option<Datasource>>,
    pub filter: Store<Vec<FilterCondition>>,
    pub sort: Store<SortState>,
}

#[derive(Clone)]
struct ActiveFetch {
    fetch: Arc<FetchController>,
    in_flight: Arc<AtomicBool>,
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    First,
    Next,
    Prev,
}

struct Inner {
    registry: ServiceRegistry,
    config: FetchConfig,
    bindings: TableBindings,
    page: Store<PageState>,
    active: RwLock<Option<ActiveFetch>>,
    /// Filter and sort subscriptions of the active datasource
    query_subscriptions: Mutex<SubscriptionSet>,
    datasource_subscription: Mutex<Option<Subscription>>,
}

/// Reactive controller for one table-like view
#[derive(Clone)]
pub struct TableController {
    inner: Arc<Inner>,
}

impl TableController {
    /// Create a controller and bind it to the given stores.
    ///
    /// The current datasource (if any) is activated immediately.
    pub fn new(registry: ServiceRegistry, config: FetchConfig, bindings: TableBindings) -> Self {
        let inner = Arc::new(Inner {
            registry,
            config,
            bindings,
            page: Store::default(),
            active: RwLock::new(None),
            query_subscriptions: Mutex::new(SubscriptionSet::new()),
            datasource_subscription: Mutex::new(None),
        });

        let weak = Arc::downgrade(&inner);
        let subscription = inner.bindings.datasource.subscribe(move |datasource| {
            if let Some(inner) = weak.upgrade() {
                inner.activate(datasource.clone());
            }
        });
        *inner.datasource_subscription.lock() = Some(subscription);

        let current = inner.bindings.datasource.get();
        inner.activate(current);

        Self { inner }
    }

    pub fn bindings(&self) -> &TableBindings {
        &self.inner.bindings
    }

    pub fn page(&self) -> &Store<PageState> {
        &self.inner.page
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.read().is_some()
    }

    /// Datasource the active fetch was created for
    pub fn active_datasource(&self) -> Option<Datasource> {
        self.inner
            .active
            .read()
            .as_ref()
            .map(|active| active.fetch.datasource().clone())
    }

    pub fn fetch(&self) -> Option<Arc<FetchController>> {
        self.inner
            .active
            .read()
            .as_ref()
            .map(|active| active.fetch.clone())
    }

    /// Load the first page. Returns whether the page state was updated.
    pub async fn refresh(&self) -> bool {
        self.inner.load(Direction::First).await
    }

    pub async fn load_next_page(&self) -> bool {
        self.inner.load(Direction::Next).await
    }

    pub async fn load_prev_page(&self) -> bool {
        self.inner.load(Direction::Prev).await
    }

    /// Insert a row into the active table
    pub async fn add_row(&self, row: Row) -> anyhow::Result<Option<Row>> {
        self.inner.save_row(row).await
    }

    /// Save changes to an existing row of the active table
    pub async fn update_row(&self, row: Row) -> anyhow::Result<Option<Row>> {
        if row_id(&row).is_none() {
            anyhow::bail!("row has no {} to update", ROW_ID_FIELD);
        }
        self.inner.save_row(row).await
    }

    pub async fn delete_rows(&self, rows: Vec<Row>) -> anyhow::Result<()> {
        let Some(table_id) = self.inner.active_table_id() else {
            debug!("No active table, nothing to delete");
            return Ok(());
        };
        self.inner.registry.rows.delete_rows(&table_id, rows).await
    }

    /// Look up a single row of the active table by id
    pub async fn get_row(&self, id: &str) -> anyhow::Result<Option<Row>> {
        let Some(table_id) = self.inner.active_table_id() else {
            return Ok(None);
        };

        let mut search = TableSearch::new(table_id);
        search.limit = Some(1);
        search.query = SearchFilter::equal(ROW_ID_FIELD, id);
        search.paginate = false;

        let response = self.inner.registry.rows.search_table(search).await?;
        Ok(response.rows.into_iter().next())
    }
}

impl Inner {
    fn activate(self: &Arc<Self>, datasource: Option<Datasource>) {
        let datasource = datasource.filter(Datasource::is_valid);

        let unchanged = {
            let active = self.active.read();
            match (active.as_ref(), datasource.as_ref()) {
                (Some(active), Some(next)) => active.fetch.datasource() == next,
                _ => false,
            }
        };
        if unchanged {
            return;
        }

        self.query_subscriptions.lock().clear();

        let Some(datasource) = datasource else {
            if self.active.write().take().is_some() {
                info!("Datasource cleared, table controller inactive");
            }
            self.page.set(PageState::default());
            return;
        };

        self.bindings.filter.set(Vec::new());
        self.bindings.sort.set(SortState::default());

        let fetch = match FetchController::new(
            datasource.clone(),
            self.config.clone(),
            &self.registry,
        ) {
            Ok(fetch) => Arc::new(fetch),
            Err(e) => {
                warn!("Cannot activate datasource {:?}: {}", datasource.id, e);
                *self.active.write() = None;
                self.page.set(PageState::default());
                return;
            }
        };

        info!(
            "Activating {} datasource {}",
            datasource.kind.as_str(),
            datasource.table_id().unwrap_or_default()
        );
        *self.active.write() = Some(ActiveFetch {
            fetch: fetch.clone(),
            in_flight: Arc::new(AtomicBool::new(false)),
        });
        self.page.set(PageState::default());

        // Pushes carry the fetch they were subscribed for
        let weak = Arc::downgrade(self);
        let bound = fetch.clone();
        let filter_subscription = self.bindings.filter.subscribe(move |conditions| {
            if let Some(inner) = Weak::upgrade(&weak) {
                inner.push_filter(&bound, conditions);
            }
        });

        let weak = Arc::downgrade(self);
        let bound = fetch;
        let sort_subscription = self.bindings.sort.subscribe(move |sort| {
            if let Some(inner) = Weak::upgrade(&weak) {
                inner.push_sort(&bound, sort);
            }
        });

        let mut subscriptions = self.query_subscriptions.lock();
        subscriptions.push(filter_subscription);
        subscriptions.push(sort_subscription);
    }

    /// Active fetch, but only if it is still `bound`
    fn active_for(&self, bound: &Arc<FetchController>) -> Option<ActiveFetch> {
        let active = self.active.read();
        match active.as_ref() {
            Some(active) if Arc::ptr_eq(&active.fetch, bound) => Some(active.clone()),
            _ => None,
        }
    }

    fn push_filter(&self, bound: &Arc<FetchController>, conditions: &[FilterCondition]) {
        let Some(active) = self.active_for(bound) else {
            debug!(
                "Ignoring filter change for superseded datasource {:?}",
                bound.datasource().id
            );
            return;
        };
        let filter = SearchFilter::from_conditions(conditions);
        if active.fetch.update(QueryUpdate::filter(filter)) {
            self.mark_stale();
        }
    }

    fn push_sort(&self, bound: &Arc<FetchController>, sort: &SortState) {
        let Some(active) = self.active_for(bound) else {
            debug!(
                "Ignoring sort change for superseded datasource {:?}",
                bound.datasource().id
            );
            return;
        };
        if active.fetch.update(QueryUpdate::sort(sort.clone())) {
            self.mark_stale();
        }
    }

    fn mark_stale(&self) {
        self.page.update(|page| page.loaded = false);
    }

    fn is_current(&self, fetch: &Arc<FetchController>) -> bool {
        self.active
            .read()
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(&active.fetch, fetch))
    }

    async fn load(&self, direction: Direction) -> bool {
        let active = self.active.read().clone();
        let Some(active) = active else {
            debug!("No active datasource, nothing to load");
            return false;
        };
        if active.in_flight.swap(true, Ordering::SeqCst) {
            debug!(?direction, "Fetch already in flight, skipping");
            return false;
        }
        self.page.update(|page| page.loading = true);
        let revision = active.fetch.revision();

        let result = match direction {
            Direction::First => Some(active.fetch.first_page().await),
            Direction::Next => active.fetch.next_page().await,
            Direction::Prev => active.fetch.prev_page().await,
        };
        active.in_flight.store(false, Ordering::SeqCst);

        if !self.is_current(&active.fetch) {
            warn!(
                "Discarding page for superseded datasource {:?}",
                active.fetch.datasource().id
            );
            return false;
        }
        if active.fetch.revision() != revision {
            debug!(?direction, "Filter or sort changed during load, discarding page");
            self.page.update(|page| {
                page.loading = false;
                page.loaded = false;
            });
            return false;
        }

        match result {
            Some(page) => {
                self.page.set(PageState {
                    rows: page.rows,
                    has_next_page: page.has_next_page,
                    has_prev_page: active.fetch.has_prev_page(),
                    page_number: active.fetch.page_number(),
                    loaded: true,
                    loading: false,
                    info: page.info,
                });
                true
            }
            None => {
                self.page.update(|page| page.loading = false);
                false
            }
        }
    }

    /// Table id of the active datasource when it is served by the row service
    fn active_table_id(&self) -> Option<String> {
        let active = self.active.read();
        let datasource = active.as_ref()?.fetch.datasource();
        if datasource.kind != DatasourceKind::Table {
            return None;
        }
        datasource.table_id().map(str::to_string)
    }

    async fn save_row(&self, mut row: Row) -> anyhow::Result<Option<Row>> {
        let Some(table_id) = self.active_table_id() else {
            debug!("No active table, nothing to save");
            return Ok(None);
        };
        row.insert(TABLE_ID_FIELD.to_string(), Value::String(table_id));
        let saved = self.registry.rows.save_row(row, true).await?;
        Ok(Some(saved))
    }
}

//! Capability negotiation between the fetch engine and a backend

use gf_core::model::{BackendKind, Datasource, Definition, PaginationKind, PaginationLocation};
use gf_core::services::DatasourceListing;
use tracing::{debug, warn};

use crate::config::FetchConfig;

/// Page parameter name used when pagination has to be synthesized
pub const SYNTHESIZED_PAGE_PARAM: &str = "page";
/// Page size parameter name used when pagination has to be synthesized
pub const SYNTHESIZED_SIZE_PARAM: &str = "pageSize";

/// What a backend can do natively for the active datasource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Features {
    pub supports_pagination: bool,
    pub supports_search: bool,
    pub supports_sort: bool,
    /// Set only when pagination is supported
    pub pagination_kind: Option<PaginationKind>,
}

impl Features {
    pub fn with_search(mut self, supported: bool) -> Self {
        self.supports_search = supported;
        self
    }

    pub fn with_sort(mut self, supported: bool) -> Self {
        self.supports_sort = supported;
        self
    }
}

/// Pagination support as declared by a definition.
///
/// Type, location and page parameter must all be present; anything less is
/// treated as unsupported. Search and sort are left for the backend to add.
pub fn negotiate(definition: Option<&Definition>) -> Features {
    let pagination = definition.and_then(|d| d.pagination.as_ref());
    match pagination {
        Some(descriptor) if descriptor.is_complete() => Features {
            supports_pagination: true,
            pagination_kind: descriptor.kind,
            ..Features::default()
        },
        _ => Features::default(),
    }
}

/// Fill in the pagination a backend uses but never declares.
///
/// Only missing parts are added, so applying this twice changes nothing.
/// Skipped entirely when the caller did not ask for pagination.
pub fn enrich_definition(
    mut definition: Definition,
    backend: Option<&BackendKind>,
    config: &FetchConfig,
) -> Definition {
    if !config.paginate {
        return definition;
    }
    let Some(backend) = backend else {
        return definition;
    };
    if !backend.requires_synthesized_pagination() {
        return definition;
    }

    debug!(backend = backend.as_source(), "Synthesizing pagination descriptor");
    definition.backend.get_or_insert_with(|| backend.clone());

    let pagination = definition.pagination.get_or_insert_with(Default::default);
    pagination.kind.get_or_insert(PaginationKind::Page);
    pagination.location.get_or_insert(PaginationLocation::Query);
    pagination
        .page_param
        .get_or_insert_with(|| SYNTHESIZED_PAGE_PARAM.to_string());
    pagination
        .size_param
        .get_or_insert_with(|| SYNTHESIZED_SIZE_PARAM.to_string());
    pagination.page_size.get_or_insert(config.limit);

    definition
}

/// Look up the backend kind behind a datasource through the listing service
pub async fn resolve_backend_kind(
    listing: &dyn DatasourceListing,
    datasource: &Datasource,
) -> Option<BackendKind> {
    let source_id = datasource.source_id.as_deref()?;
    match listing.list_datasources().await {
        Ok(infos) => infos
            .into_iter()
            .find(|info| info.id == source_id)
            .map(|info| BackendKind::from_source(&info.source)),
        Err(e) => {
            warn!("Failed to list datasources for {}: {}", source_id, e);
            None
        }
    }
}

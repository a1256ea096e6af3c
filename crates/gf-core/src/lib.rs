//! Core abstractions for paginated table data access
//!
//! This crate provides the data model, the contracts of the external services
//! the fetch engine talks to, and the observable stores controllers bind to.

pub mod model;
pub mod services;
pub mod state;

// Re-export commonly used types
pub use model::{
    Cursor, Datasource, DatasourceKind, Definition, FilterCondition, Metadata, PageResult,
    QueryState, QueryUpdate, Row, SearchFilter, SortOrder, SortState,
};
pub use services::{
    DatasourceInfo, DatasourceListing, DefinitionService, QueryService, RowService,
};
pub use state::{Store, Subscription, SubscriptionSet};

//! Fetch engine, backends and adapters for paginated table data

pub mod config;
pub mod features;
pub mod fetch;
pub mod sources;

use tokio::task::JoinError;
use thiserror::Error;

// Re-exports
pub use config::{AirtableConfig, FetchConfig};
pub use features::{enrich_definition, negotiate, Features};
pub use fetch::{FetchBackend, FetchController, ServiceRegistry};
pub use sources::{Adapter, AirtableAdapter, ConnectionStatus};

/// Errors that can occur in data operations
#[derive(Error, Debug)]
pub enum DataError {
    /// Backend rejected the request; the message is shown to users verbatim
    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Join error: {0}")]
    Join(#[from] JoinError),

    #[error("Invalid datasource: {0}")]
    InvalidDatasource(String),

    #[error("No adapter registered for source '{0}'")]
    MissingAdapter(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Service error: {0}")]
    Service(#[from] anyhow::Error),
}

//! Datasource references

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{definition::FieldSchema, Metadata};

/// Kind of entity a datasource points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasourceKind {
    /// A table served by the built-in row service
    Table,
    /// A saved query executed by the query service
    Query,
    /// A table in a third-party service reached through a registered adapter
    External,
}

impl DatasourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasourceKind::Table => "table",
            DatasourceKind::Query => "query",
            DatasourceKind::External => "external",
        }
    }
}

/// A declared query parameter and its default value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParameter {
    pub name: String,
    #[serde(default)]
    pub default: Option<Value>,
}

/// A configured reference to a queryable entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datasource {
    #[serde(rename = "type")]
    pub kind: DatasourceKind,

    /// Table id, query id, or external table name depending on `kind`
    #[serde(default, rename = "_id")]
    pub id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    /// Backing connection, used for enrichment and adapter lookup
    #[serde(default)]
    pub source_id: Option<String>,

    /// View inside an external table
    #[serde(default)]
    pub view: Option<String>,

    #[serde(default)]
    pub parameters: Vec<QueryParameter>,

    /// Static parameter values supplied by the caller
    #[serde(default)]
    pub query_params: Metadata,

    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

impl Datasource {
    /// Create a bare datasource of the given kind
    pub fn new(kind: DatasourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: Some(id.into()),
            name: None,
            source_id: None,
            view: None,
            parameters: Vec::new(),
            query_params: Metadata::new(),
            fields: Vec::new(),
        }
    }

    pub fn table(table_id: impl Into<String>) -> Self {
        Self::new(DatasourceKind::Table, table_id)
    }

    pub fn query(query_id: impl Into<String>) -> Self {
        Self::new(DatasourceKind::Query, query_id)
    }

    pub fn external(source_id: impl Into<String>, table: impl Into<String>) -> Self {
        Self::new(DatasourceKind::External, table).with_source(source_id)
    }

    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, default: Option<Value>) -> Self {
        self.parameters.push(QueryParameter {
            name: name.into(),
            default,
        });
        self
    }

    pub fn with_query_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.query_params.insert(name.into(), value);
        self
    }

    /// Identifier, if present and non-empty
    pub fn table_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Whether this datasource carries everything its kind needs to be fetched
    pub fn is_valid(&self) -> bool {
        match self.kind {
            DatasourceKind::Table | DatasourceKind::Query => self.table_id().is_some(),
            DatasourceKind::External => {
                self.table_id().is_some()
                    && self.source_id.as_deref().is_some_and(|s| !s.is_empty())
            }
        }
    }

    /// Static parameters overlaid with declared defaults.
    ///
    /// A default only applies when the caller's value is absent or null.
    pub fn resolved_parameters(&self) -> Metadata {
        let mut parameters = self.query_params.clone();
        for param in &self.parameters {
            let missing = parameters.get(&param.name).map_or(true, Value::is_null);
            if missing {
                if let Some(default) = &param.default {
                    parameters.insert(param.name.clone(), default.clone());
                }
            }
        }
        parameters
    }
}

use serde::{Deserialize, Serialize};

use super::{Cursor, Metadata, Row};

/// Normalized result of one page fetch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub rows: Vec<Row>,
    pub cursor: Option<Cursor>,
    pub has_next_page: bool,
    /// Everything the backend returned besides rows and pagination
    #[serde(default)]
    pub info: Metadata,
}

impl PageResult {
    /// "No data, no more pages"
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

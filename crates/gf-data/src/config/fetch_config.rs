//! Fetch configuration

use serde::{Deserialize, Serialize};

use crate::DataError;

/// Default number of rows per page
pub const DEFAULT_LIMIT: usize = 10;

/// Options a fetch controller is created with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Rows per page; zero means "no limit"
    pub limit: usize,

    /// Whether to request server-side pagination when it is supported
    pub paginate: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            paginate: true,
        }
    }
}

impl FetchConfig {
    pub fn new(limit: usize, paginate: bool) -> Self {
        Self { limit, paginate }
    }

    /// Parse from JSON; missing keys take their defaults
    pub fn from_json(json: &str) -> Result<Self, DataError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FetchConfig::default();
        assert_eq!(config.limit, DEFAULT_LIMIT);
        assert!(config.paginate);
    }

    #[test]
    fn test_partial_json() {
        let config = FetchConfig::from_json(r#"{ "limit": 100 }"#).unwrap();
        assert_eq!(config, FetchConfig::new(100, true));

        assert!(FetchConfig::from_json("not json").is_err());
    }
}

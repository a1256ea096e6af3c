//! Credentials for the spreadsheet adapter

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::DataError;

/// Connection settings for an Airtable base
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirtableConfig {
    pub api_key: String,
    pub base: String,
}

impl AirtableConfig {
    pub fn new(api_key: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base: base.into(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, DataError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Both credentials are required
    pub fn validate(&self) -> Result<(), DataError> {
        if self.api_key.trim().is_empty() {
            return Err(DataError::Config("apiKey is required".to_string()));
        }
        if self.base.trim().is_empty() {
            return Err(DataError::Config("base is required".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for AirtableConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AirtableConfig")
            .field("api_key", &"<redacted>")
            .field("base", &self.base)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        assert!(AirtableConfig::new("key", "app123").validate().is_ok());
        assert!(AirtableConfig::new(" ", "app123").validate().is_err());
        assert!(AirtableConfig::from_json(r#"{ "apiKey": "key", "base": "" }"#).is_err());
        assert!(AirtableConfig::from_json(r#"{ "apiKey": "key" }"#).is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", AirtableConfig::new("secret-key", "app123"));
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("app123"));
    }
}

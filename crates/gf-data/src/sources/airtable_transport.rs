//! HTTP transport for the Airtable REST API

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gf_core::model::Row;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use super::SortDirective;
use crate::config::AirtableConfig;
use crate::DataError;

pub const DEFAULT_API_URL: &str = "https://api.airtable.com/v0/";

/// A record as Airtable returns it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirtableRecord {
    pub id: String,
    #[serde(default)]
    pub fields: Row,
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
}

impl AirtableRecord {
    /// Flatten into a row: the record id followed by its fields
    pub fn into_row(self) -> Row {
        let mut row = Row::new();
        row.insert("id".to_string(), Value::String(self.id));
        row.extend(self.fields);
        if let Some(created) = self.created_time {
            row.entry("createdTime")
                .or_insert_with(|| Value::String(created.to_rfc3339()));
        }
        row
    }
}

/// One page of a list call; `offset` continues to the next page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPage {
    #[serde(default)]
    pub records: Vec<AirtableRecord>,
    #[serde(default)]
    pub offset: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedRecord {
    pub id: String,
    pub deleted: bool,
}

/// Query string options of a list call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListRecordsQuery {
    pub view: Option<String>,
    pub page_size: Option<usize>,
    pub filter_by_formula: Option<String>,
    pub sort: Vec<SortDirective>,
    pub offset: Option<String>,
}

/// Requests the spreadsheet adapter issues
#[async_trait]
pub trait AirtableTransport: Send + Sync {
    async fn list_records(
        &self,
        table: &str,
        query: &ListRecordsQuery,
    ) -> Result<RecordPage, DataError>;

    async fn create_record(&self, table: &str, fields: Row) -> Result<AirtableRecord, DataError>;

    async fn update_record(
        &self,
        table: &str,
        id: &str,
        fields: Row,
    ) -> Result<AirtableRecord, DataError>;

    async fn delete_record(&self, table: &str, id: &str) -> Result<DeletedRecord, DataError>;
}

/// `ureq` transport; blocking calls run on the tokio blocking pool
#[derive(Clone)]
pub struct HttpAirtableTransport {
    api_url: Url,
    base: String,
    api_key: String,
    agent: ureq::Agent,
}

impl HttpAirtableTransport {
    pub fn new(config: &AirtableConfig) -> Result<Self, DataError> {
        config.validate()?;
        let api_url = Url::parse(DEFAULT_API_URL)
            .map_err(|e| DataError::Config(format!("invalid api url: {}", e)))?;
        Ok(Self {
            api_url,
            base: config.base.clone(),
            api_key: config.api_key.clone(),
            agent: ureq::AgentBuilder::new().build(),
        })
    }

    /// Point at a different API root, e.g. a proxy
    pub fn with_api_url(mut self, api_url: &str) -> Result<Self, DataError> {
        let url = Url::parse(api_url)
            .map_err(|e| DataError::Config(format!("invalid api url: {}", e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(DataError::Config(
                "api url must use http or https scheme".to_string(),
            ));
        }
        self.api_url = url;
        Ok(self)
    }

    fn table_url(&self, segments: &[&str]) -> Result<Url, DataError> {
        let mut url = self.api_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| DataError::Config("api url cannot be a base".to_string()))?;
            path.pop_if_empty();
            path.push(&self.base);
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn send<T>(
        &self,
        method: &'static str,
        url: Url,
        body: Option<Value>,
    ) -> Result<T, DataError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        debug!("{} {}", method, url.path());
        let agent = self.agent.clone();
        let auth = format!("Bearer {}", self.api_key);

        let text = tokio::task::spawn_blocking(move || -> Result<String, DataError> {
            let request = agent
                .request(method, url.as_str())
                .set("Authorization", &auth)
                .set("Accept", "application/json");
            let response = match body {
                Some(body) => request
                    .set("Content-Type", "application/json")
                    .send_string(&body.to_string()),
                None => request.call(),
            };
            match response {
                Ok(resp) => resp
                    .into_string()
                    .map_err(|e| DataError::Transport(e.to_string())),
                Err(ureq::Error::Status(code, resp)) => Err(parse_error_response(code, resp)),
                Err(ureq::Error::Transport(err)) => Err(DataError::Transport(err.to_string())),
            }
        })
        .await??;

        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl AirtableTransport for HttpAirtableTransport {
    async fn list_records(
        &self,
        table: &str,
        query: &ListRecordsQuery,
    ) -> Result<RecordPage, DataError> {
        let mut url = self.table_url(&[table])?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(view) = &query.view {
                pairs.append_pair("view", view);
            }
            if let Some(page_size) = query.page_size {
                pairs.append_pair("pageSize", &page_size.to_string());
            }
            if let Some(formula) = &query.filter_by_formula {
                pairs.append_pair("filterByFormula", formula);
            }
            for (idx, directive) in query.sort.iter().enumerate() {
                pairs.append_pair(&format!("sort[{}][field]", idx), &directive.field);
                pairs.append_pair(&format!("sort[{}][direction]", idx), &directive.direction);
            }
            if let Some(offset) = &query.offset {
                pairs.append_pair("offset", offset);
            }
        }
        self.send("GET", url, None).await
    }

    async fn create_record(&self, table: &str, fields: Row) -> Result<AirtableRecord, DataError> {
        let url = self.table_url(&[table])?;
        self.send("POST", url, Some(json!({ "fields": fields }))).await
    }

    async fn update_record(
        &self,
        table: &str,
        id: &str,
        fields: Row,
    ) -> Result<AirtableRecord, DataError> {
        let url = self.table_url(&[table, id])?;
        self.send("PATCH", url, Some(json!({ "fields": fields }))).await
    }

    async fn delete_record(&self, table: &str, id: &str) -> Result<DeletedRecord, DataError> {
        let url = self.table_url(&[table, id])?;
        self.send("DELETE", url, None).await
    }
}

fn parse_error_response(status: u16, response: ureq::Response) -> DataError {
    let body = response.into_string().unwrap_or_default();
    DataError::Http {
        status,
        message: error_message(status, &body),
    }
}

/// Pull the human-readable message out of an Airtable error envelope
fn error_message(status: u16, body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|value| match &value["error"] {
        Value::Object(error) => error
            .get("message")
            .or_else(|| error.get("type"))
            .and_then(Value::as_str)
            .map(str::to_string),
        Value::String(kind) => Some(kind.clone()),
        _ => None,
    });

    match message {
        Some(message) => message,
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => format!("HTTP {}", status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> HttpAirtableTransport {
        HttpAirtableTransport::new(&AirtableConfig::new("key", "appBase")).unwrap()
    }

    #[test]
    fn test_table_url() {
        let url = transport().table_url(&["My Table", "rec1"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.airtable.com/v0/appBase/My%20Table/rec1"
        );

        let proxied = transport()
            .with_api_url("http://localhost:8080/airtable/")
            .unwrap()
            .table_url(&["Tasks"])
            .unwrap();
        assert_eq!(proxied.as_str(), "http://localhost:8080/airtable/appBase/Tasks");

        assert!(transport().with_api_url("ftp://example.com").is_err());
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(
                404,
                r#"{"error":{"type":"TABLE_NOT_FOUND","message":"Could not find table X in application Y"}}"#
            ),
            "Could not find table X in application Y"
        );
        assert_eq!(error_message(404, r#"{"error":"NOT_FOUND"}"#), "NOT_FOUND");
        assert_eq!(error_message(502, "Bad gateway"), "Bad gateway");
        assert_eq!(error_message(500, ""), "HTTP 500");
    }

    #[test]
    fn test_record_into_row() {
        let record: AirtableRecord = serde_json::from_value(serde_json::json!({
            "id": "rec1",
            "createdTime": "2024-01-02T03:04:05.000Z",
            "fields": { "Name": "Ada" }
        }))
        .unwrap();

        let row = record.into_row();
        let keys: Vec<_> = row.keys().cloned().collect();
        assert_eq!(keys, vec!["id", "Name", "createdTime"]);
        assert_eq!(row["createdTime"], Value::String("2024-01-02T03:04:05+00:00".into()));
    }
}

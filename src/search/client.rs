//! HTTP client for the search engine.
//!
//! The engine is an external Elasticsearch-compatible collaborator; this
//! client covers the narrow contract the pipeline needs: record upsert and
//! delete, index lifecycle, and query execution.

use crate::config::ElasticsearchConfig;
use crate::error::{AppError, Result};
use crate::models::SearchRecord;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Client for the search engine's HTTP API
#[derive(Debug, Clone)]
pub struct ElasticClient {
    client: Client,
    base_url: String,
    index: String,
    timeout_secs: u64,
}

impl ElasticClient {
    /// Create a client from configuration
    pub fn new(config: &ElasticsearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            index: config.index.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    /// The index this client writes to
    pub fn index(&self) -> &str {
        &self.index
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.base_url, self.index)
    }

    fn doc_url(&self, id: &str) -> String {
        format!("{}/{}/_doc/{}", self.base_url, self.index, id)
    }

    /// Insert or replace the record stored under `id`
    pub async fn upsert(&self, id: &str, record: &SearchRecord) -> Result<()> {
        let response = self
            .client
            .put(self.doc_url(id))
            .json(record)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        Self::expect_success(response).await?;
        debug!(document_id = id, "Indexed record");
        Ok(())
    }

    /// Delete the record stored under `id`.
    ///
    /// Deleting a record that was never indexed is a no-op.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.doc_url(id))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(document_id = id, "Record already absent");
            return Ok(());
        }

        Self::expect_success(response).await?;
        debug!(document_id = id, "Deleted record");
        Ok(())
    }

    /// Execute a query body and return the engine's raw response
    pub async fn search(&self, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(format!("{}/_search", self.index_url()))
            .json(body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let response = Self::expect_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| AppError::Serialization(format!("Invalid search response: {}", e)))
    }

    /// Delete the whole index.
    ///
    /// Dropping an index that does not exist is a no-op.
    pub async fn drop_index(&self) -> Result<()> {
        let response = self
            .client
            .delete(self.index_url())
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(index = %self.index, "Index already absent");
            return Ok(());
        }

        Self::expect_success(response).await?;
        info!(index = %self.index, "Dropped index");
        Ok(())
    }

    /// Create the index with its mapping
    pub async fn create_index(&self) -> Result<()> {
        let response = self
            .client
            .put(self.index_url())
            .json(&index_mapping())
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        Self::expect_success(response).await?;
        info!(index = %self.index, "Created index");
        Ok(())
    }

    fn request_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(format!(
                "Search engine request timed out after {} seconds",
                self.timeout_secs
            ))
        } else if e.is_connect() {
            AppError::Network(format!("Failed to connect to search engine: {}", e))
        } else {
            AppError::Network(format!("Search engine request failed: {}", e))
        }
    }

    async fn expect_success(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_else(|_| String::new());
        Err(AppError::Index {
            status: status.as_u16(),
            message: if body.is_empty() {
                "No response body".to_string()
            } else {
                body
            },
        })
    }
}

/// Index mapping: analyzed text for `title`/`body`, epoch-millisecond dates
/// for `ctime`/`mtime`
pub fn index_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "body": {
                    "type": "text",
                    "analyzer": "english"
                },
                "title": {
                    "type": "text",
                    "analyzer": "english"
                },
                "ctime": {
                    "type": "date",
                    "format": "epoch_millis"
                },
                "mtime": {
                    "type": "date",
                    "format": "epoch_millis"
                }
            }
        }
    })
}

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use sync_core::{Document, Origin, SyncError};
use tracing::{debug, info};

use crate::bulk::{parse_response, upsert_body};
use crate::error::{classify_request, classify_status, IndexError};
use crate::traits::{BulkSummary, IndexSink, IndexStatus};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Elasticsearch REST client.
#[derive(Clone)]
pub struct ElasticsearchSink {
    client: Client,
    base_url: String,
}

impl ElasticsearchSink {
    /// `base_url` is the node address, e.g. `http://elasticsearch:9200`.
    pub fn new(base_url: &str) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::unclassified(Origin::Index, e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn index_url(&self, index: &str) -> String {
        format!("{}/{index}", self.base_url)
    }
}

#[async_trait::async_trait]
impl IndexSink for ElasticsearchSink {
    async fn ensure_index(&self, index: &str, body: &Value) -> Result<IndexStatus, SyncError> {
        let url = self.index_url(index);

        let response = self
            .client
            .head(&url)
            .send()
            .await
            .map_err(classify_request)?;
        match response.status() {
            StatusCode::OK => {
                debug!("Index '{index}' already exists");
                return Ok(IndexStatus::AlreadyExists);
            }
            StatusCode::NOT_FOUND => {}
            status => {
                return Err(classify_status(IndexError::Status {
                    method: "HEAD",
                    url,
                    status: status.as_u16(),
                    body: String::new(),
                }))
            }
        }

        let response = self
            .client
            .put(&url)
            .json(body)
            .send()
            .await
            .map_err(classify_request)?;
        let status = response.status();
        if status.is_success() {
            info!("Created index '{index}'");
            return Ok(IndexStatus::Created);
        }

        let text = response.text().await.map_err(classify_request)?;
        // Lost a creation race with another process.
        if status == StatusCode::BAD_REQUEST && text.contains("resource_already_exists_exception") {
            debug!("Index '{index}' was created concurrently");
            return Ok(IndexStatus::AlreadyExists);
        }

        Err(classify_status(IndexError::Status {
            method: "PUT",
            url,
            status: status.as_u16(),
            body: text,
        }))
    }

    async fn bulk_upsert(
        &self,
        index: &str,
        documents: &[Document],
    ) -> Result<BulkSummary, SyncError> {
        if documents.is_empty() {
            return Ok(BulkSummary::default());
        }

        let url = format!("{}/_bulk", self.base_url);
        let body = upsert_body(index, documents)?;

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(classify_request)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(IndexError::Status {
                method: "POST",
                url,
                status: status.as_u16(),
                body: text,
            }));
        }

        let json: Value = response.json().await.map_err(classify_request)?;
        let summary = parse_response(&json, documents.len())?;

        debug!(
            "Bulk upsert into '{index}': {} created, {} updated, {} unchanged",
            summary.created, summary.updated, summary.noop
        );
        Ok(summary)
    }
}

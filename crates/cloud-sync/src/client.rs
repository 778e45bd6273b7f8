//! REST client for the cloud document store.
//!
//! Documents are grouped into collections and scoped by a partition tag; the
//! store owns document identity and creation instants.

use log::{debug, error};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::{Map, Value};
use std::time::Duration;

use duofolio_core::sync::{DocumentRef, RemoteDocument};

use crate::error::{CloudSyncError, Result};
use crate::settings::CloudSyncSettings;
use crate::types::{AddDocumentRequest, ApiErrorResponse, ListDocumentsResponse};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

#[derive(Debug, Clone)]
pub struct DocumentStoreClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl DocumentStoreClient {
    fn log_response(status: StatusCode, body: &str) {
        if status.is_success() {
            debug!("[CloudSync] API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("[CloudSync] API response error ({}): {}", status, preview);
    }

    /// Create a client for `base_url` (e.g. "https://api.duofolio.app").
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_settings(settings: &CloudSyncSettings) -> Result<Self> {
        Self::new(&settings.api_url, settings.api_token.clone())
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.token {
            let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| CloudSyncError::auth("Invalid access token format"))?;
            headers.insert(AUTHORIZATION, auth_value);
        }

        Ok(headers)
    }

    fn documents_url(&self, collection: &str) -> String {
        format!(
            "{}/api/v1/collections/{}/documents",
            self.base_url,
            urlencoding::encode(collection)
        )
    }

    fn config_url(&self, partition: &str) -> String {
        format!(
            "{}/api/v1/config/{}",
            self.base_url,
            urlencoding::encode(partition)
        )
    }

    fn error_from_body(status: StatusCode, body: &str) -> CloudSyncError {
        if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(body) {
            return CloudSyncError::api(
                status.as_u16(),
                format!("{}: {}", error.code, error.message),
            );
        }
        CloudSyncError::api(status.as_u16(), format!("Request failed: {}", body))
    }

    /// Parse a JSON response body.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(Self::error_from_body(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            error!(
                "[CloudSync] Failed to deserialize response. Body: {}, Error: {}",
                body, e
            );
            CloudSyncError::api(status.as_u16(), format!("Failed to parse response: {}", e))
        })
    }

    /// Check the status of a response whose body is not needed.
    async fn expect_success(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if status.is_success() {
            Ok(())
        } else {
            Err(Self::error_from_body(status, &body))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Documents
    // ─────────────────────────────────────────────────────────────────────────

    /// List a partition's documents, newest first.
    ///
    /// GET /api/v1/collections/{collection}/documents?partition=..&orderBy=createdAt&direction=desc
    pub async fn list_documents(
        &self,
        collection: &str,
        partition: &str,
    ) -> Result<Vec<RemoteDocument>> {
        let url = format!(
            "{}?partition={}&orderBy=createdAt&direction=desc",
            self.documents_url(collection),
            urlencoding::encode(partition)
        );

        let response = self
            .client
            .get(&url)
            .headers(self.headers()?)
            .send()
            .await?;

        let listed: ListDocumentsResponse = Self::parse_response(response).await?;
        Ok(listed.documents)
    }

    /// Add a document; the store assigns its id and creation instant.
    ///
    /// POST /api/v1/collections/{collection}/documents
    pub async fn add_document(
        &self,
        collection: &str,
        partition: &str,
        data: &Map<String, Value>,
    ) -> Result<DocumentRef> {
        let url = self.documents_url(collection);
        debug!("[CloudSync] Adding document to {}/{}", collection, partition);

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&AddDocumentRequest { partition, data })
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// DELETE /api/v1/collections/{collection}/documents/{id}
    pub async fn delete_document(&self, collection: &str, id: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(CloudSyncError::invalid_request("Document id is empty"));
        }
        let url = format!("{}/{}", self.documents_url(collection), urlencoding::encode(id));

        let response = self
            .client
            .delete(&url)
            .headers(self.headers()?)
            .send()
            .await?;

        Self::expect_success(response).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Shared configuration
    // ─────────────────────────────────────────────────────────────────────────

    /// GET /api/v1/config/{partition}; 404 means the document does not exist yet.
    pub async fn get_config(&self, partition: &str) -> Result<Option<Map<String, Value>>> {
        let response = self
            .client
            .get(self.config_url(partition))
            .headers(self.headers()?)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("[CloudSync] No config document for {}", partition);
            return Ok(None);
        }
        Self::parse_response(response).await.map(Some)
    }

    /// PATCH /api/v1/config/{partition} with a merge patch.
    pub async fn merge_config(&self, partition: &str, patch: &Map<String, Value>) -> Result<()> {
        let response = self
            .client
            .patch(self.config_url(partition))
            .headers(self.headers()?)
            .json(patch)
            .send()
            .await?;

        Self::expect_success(response).await
    }
}

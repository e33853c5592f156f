use async_trait::async_trait;
use reqwest::Client as HttpClient;
use segdav_core::{BlobStore, StoreError};
use tracing::{debug, instrument};

/// REST key/value blob store client.
///
/// Speaks a plain `GET/PUT {base_url}/values/{key}` protocol with an
/// optional bearer token, the shape exposed by hosted KV namespaces. A
/// 404 on read maps to `None`; any other non-success status surfaces as
/// `StoreError::Remote` for the caller to report as 5xx.
pub struct RemoteKvStore {
    http_client: HttpClient,
    base_url: String,
    api_token: Option<String>,
}

impl RemoteKvStore {
    pub fn new(base_url: String, api_token: Option<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        }
    }

    fn value_url(&self, key: &str) -> String {
        format!("{}/values/{}", self.base_url, urlencoding::encode(key))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }
}

#[async_trait]
impl BlobStore for RemoteKvStore {
    fn store_name(&self) -> &'static str {
        "remote"
    }

    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let response = self
            .authorize(self.http_client.get(self.value_url(key)))
            .send()
            .await
            .map_err(|e| StoreError::Remote(format!("KV GET request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!("KV key not found: {}", key);
            return Ok(None);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::Remote(format!(
                "KV GET failed with status {}: {}",
                status, text
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StoreError::Remote(format!("Failed to read KV response: {}", e)))?;

        debug!("KV GET {} ({} bytes)", key, bytes.len());
        Ok(Some(bytes.to_vec()))
    }

    #[instrument(skip(self, bytes), level = "debug", fields(bytes_len = bytes.len()))]
    async fn set(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let response = self
            .authorize(self.http_client.put(self.value_url(key)))
            .header("Content-Type", "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| StoreError::Remote(format!("KV PUT request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::Remote(format!(
                "KV PUT failed with status {}: {}",
                status, text
            )));
        }

        debug!("KV PUT {} ({} bytes)", key, bytes.len());
        Ok(())
    }
}

//! HTTP store client
//!
//! Talks to an Imbo-style media store over its REST API:
//!
//! - `HEAD /users/{user}/images/{id}` — existence check
//! - `GET  /users/{user}/images/{id}.{ext}` — image bytes with format applied
//! - `POST /users/{user}/images` — ingest image bytes
//! - `GET/PUT /users/{user}/images/{id}/meta` — metadata read/replace
//! - `GET  /users/{user}/images?page&limit[&from]` — paginated listing
//!
//! Endpoint credentials ride as HTTP basic auth; request signing is out of
//! scope here.

use crate::config::StoreEndpoint;
use crate::error::{FerryError, Result};
use crate::store::{RemoteImage, StoreClient};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Request timeout for store calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Response body of a successful image ingestion
#[derive(Debug, Deserialize)]
struct IngestResponse {
    #[serde(rename = "imageIdentifier")]
    identifier: String,
}

/// Response body of a listing request
#[derive(Debug, Deserialize)]
struct ImageCollection {
    images: Vec<RemoteImage>,
}

/// HTTP client for one media store endpoint
pub struct HttpStoreClient {
    http: reqwest::Client,
    host: String,
    user: String,
    public_key: String,
    private_key: String,
}

impl HttpStoreClient {
    /// Create a client for the given endpoint
    pub fn new(endpoint: &StoreEndpoint) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FerryError::store_unavailable(&endpoint.host, e.to_string()))?;

        Ok(Self {
            http,
            host: endpoint.host.trim_end_matches('/').to_string(),
            user: endpoint.user().to_string(),
            public_key: endpoint.public_key.clone(),
            private_key: endpoint.private_key.clone(),
        })
    }

    fn images_url(&self) -> String {
        format!("{}/users/{}/images", self.host, self.user)
    }

    fn image_endpoint(&self, identifier: &str) -> String {
        format!("{}/{}", self.images_url(), identifier)
    }

    fn metadata_url(&self, identifier: &str) -> String {
        format!("{}/meta", self.image_endpoint(identifier))
    }

    fn transport_error(&self, err: reqwest::Error) -> FerryError {
        FerryError::store_unavailable(&self.host, err.to_string())
    }

    fn status_error(&self, status: StatusCode) -> FerryError {
        FerryError::UnexpectedStatus {
            host: self.host.clone(),
            status: status.as_u16(),
        }
    }

    fn decode_error(&self, err: reqwest::Error) -> FerryError {
        FerryError::MalformedResponse {
            host: self.host.clone(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl StoreClient for HttpStoreClient {
    fn host(&self) -> &str {
        &self.host
    }

    async fn image_exists(&self, identifier: &str) -> Result<bool> {
        let response = self
            .http
            .head(self.image_endpoint(identifier))
            .basic_auth(&self.public_key, Some(&self.private_key))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(self.status_error(status)),
        }
    }

    fn image_url(&self, identifier: &str, extension: &str) -> String {
        format!("{}.{}", self.image_endpoint(identifier), extension)
    }

    async fn add_image_from_url(&self, url: &str) -> Result<String> {
        // Fetch the source bytes, then push them at the ingestion endpoint
        let source = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !source.status().is_success() {
            return Err(self.status_error(source.status()));
        }

        let bytes = source.bytes().await.map_err(|e| self.transport_error(e))?;

        let response = self
            .http
            .post(self.images_url())
            .basic_auth(&self.public_key, Some(&self.private_key))
            .body(bytes)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(self.status_error(response.status()));
        }

        let ingested: IngestResponse = response.json().await.map_err(|e| self.decode_error(e))?;
        Ok(ingested.identifier)
    }

    async fn image_metadata(&self, identifier: &str) -> Result<serde_json::Value> {
        let response = self
            .http
            .get(self.metadata_url(identifier))
            .basic_auth(&self.public_key, Some(&self.private_key))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(self.status_error(response.status()));
        }

        response.json().await.map_err(|e| self.decode_error(e))
    }

    async fn replace_metadata(&self, identifier: &str, metadata: &serde_json::Value) -> Result<()> {
        let response = self
            .http
            .put(self.metadata_url(identifier))
            .basic_auth(&self.public_key, Some(&self.private_key))
            .json(metadata)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(self.status_error(response.status()));
        }

        Ok(())
    }

    async fn list_images(
        &self,
        page: u32,
        limit: usize,
        since: Option<i64>,
    ) -> Result<Vec<RemoteImage>> {
        let mut request = self
            .http
            .get(self.images_url())
            .basic_auth(&self.public_key, Some(&self.private_key))
            .query(&[("page", page.to_string()), ("limit", limit.to_string())]);

        if let Some(since) = since {
            request = request.query(&[("from", since.to_string())]);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(self.status_error(response.status()));
        }

        let collection: ImageCollection = response.json().await.map_err(|e| self.decode_error(e))?;
        Ok(collection.images)
    }
}

//! Store client interface
//!
//! The seam between the migration core and the remote media stores. One
//! client instance exists per side (source and destination); everything the
//! core knows about a store goes through this trait.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One item of a paginated source listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteImage {
    /// Store-assigned identifier of the image
    #[serde(rename = "imageIdentifier")]
    pub identifier: String,
    /// Original format extension (jpg, png, gif, ...)
    pub extension: String,
}

impl RemoteImage {
    /// Create a listing entry
    pub fn new(identifier: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            extension: extension.into(),
        }
    }
}

/// Client interface to a media store
///
/// All calls are non-blocking; transport failures surface as
/// [`FerryError::StoreUnavailable`](crate::error::FerryError::StoreUnavailable).
/// Retry, backoff and rate limiting are properties of the implementation,
/// not of this interface.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Host this client talks to, for logging and error reporting
    fn host(&self) -> &str;

    /// Check whether an image with this identifier exists on the store
    async fn image_exists(&self, identifier: &str) -> Result<bool>;

    /// Public URL of an image with the given format extension applied
    fn image_url(&self, identifier: &str, extension: &str) -> String;

    /// Ingest an image into the store by fetching it from `url`
    ///
    /// Returns the identifier the store assigned to the ingested image.
    async fn add_image_from_url(&self, url: &str) -> Result<String>;

    /// Read the metadata attached to an image
    async fn image_metadata(&self, identifier: &str) -> Result<serde_json::Value>;

    /// Replace the metadata attached to an image
    async fn replace_metadata(&self, identifier: &str, metadata: &serde_json::Value) -> Result<()>;

    /// List images, `limit` per page, pages counted from zero
    ///
    /// `since` restricts the listing to images added at or after the given
    /// unix timestamp. A page shorter than `limit` is the last page.
    async fn list_images(
        &self,
        page: u32,
        limit: usize,
        since: Option<i64>,
    ) -> Result<Vec<RemoteImage>>;
}

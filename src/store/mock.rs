//! Scriptable in-memory store client for tests

use crate::error::{FerryError, Result};
use crate::store::{RemoteImage, StoreClient};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// In-memory store with scriptable failures
///
/// Identifiers listed in the `fail_*` sets make the corresponding call
/// return a transport error. Listing pages are served from a fixed script.
pub(crate) struct MockStore {
    host: String,
    list_calls: AtomicU32,
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    existing: HashSet<String>,
    metadata: HashMap<String, Value>,
    fail_exists: HashSet<String>,
    fail_copy: HashSet<String>,
    fail_metadata: HashSet<String>,
    fail_replace: HashSet<String>,
    fail_list_page: Option<u32>,
    pages: Vec<Vec<RemoteImage>>,
    added: Vec<String>,
    replaced: Vec<(String, Value)>,
}

impl MockStore {
    pub(crate) fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            list_calls: AtomicU32::new(0),
            state: Mutex::new(MockState::default()),
        }
    }

    pub(crate) fn with_existing(self, identifier: &str) -> Self {
        self.state.lock().unwrap().existing.insert(identifier.to_string());
        self
    }

    pub(crate) fn with_metadata(self, identifier: &str, metadata: Value) -> Self {
        self.state
            .lock()
            .unwrap()
            .metadata
            .insert(identifier.to_string(), metadata);
        self
    }

    pub(crate) fn with_failing_exists(self, identifier: &str) -> Self {
        self.state.lock().unwrap().fail_exists.insert(identifier.to_string());
        self
    }

    pub(crate) fn with_failing_copy(self, identifier: &str) -> Self {
        self.state.lock().unwrap().fail_copy.insert(identifier.to_string());
        self
    }

    pub(crate) fn with_failing_metadata(self, identifier: &str) -> Self {
        self.state.lock().unwrap().fail_metadata.insert(identifier.to_string());
        self
    }

    pub(crate) fn with_failing_replace(self, identifier: &str) -> Self {
        self.state.lock().unwrap().fail_replace.insert(identifier.to_string());
        self
    }

    pub(crate) fn with_pages(self, pages: Vec<Vec<RemoteImage>>) -> Self {
        self.state.lock().unwrap().pages = pages;
        self
    }

    pub(crate) fn with_failing_list_page(self, page: u32) -> Self {
        self.state.lock().unwrap().fail_list_page = Some(page);
        self
    }

    /// Identifiers ingested into this store, in ingestion order
    pub(crate) fn added(&self) -> Vec<String> {
        self.state.lock().unwrap().added.clone()
    }

    /// Metadata replacements performed on this store
    pub(crate) fn replaced(&self) -> Vec<(String, Value)> {
        self.state.lock().unwrap().replaced.clone()
    }

    /// Number of listing requests served (or failed)
    pub(crate) fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn unavailable(&self, message: &str) -> FerryError {
        FerryError::store_unavailable(&self.host, message)
    }

    /// Identifier encoded in a mock image URL (`mock://host/{id}.{ext}`)
    fn identifier_from_url(url: &str) -> String {
        let name = url.rsplit('/').next().unwrap_or(url);
        name.split('.').next().unwrap_or(name).to_string()
    }
}

#[async_trait]
impl StoreClient for MockStore {
    fn host(&self) -> &str {
        &self.host
    }

    async fn image_exists(&self, identifier: &str) -> Result<bool> {
        let state = self.state.lock().unwrap();
        if state.fail_exists.contains(identifier) {
            return Err(self.unavailable("existence check failed"));
        }
        Ok(state.existing.contains(identifier))
    }

    fn image_url(&self, identifier: &str, extension: &str) -> String {
        format!("mock://{}/{}.{}", self.host, identifier, extension)
    }

    async fn add_image_from_url(&self, url: &str) -> Result<String> {
        let identifier = Self::identifier_from_url(url);
        let mut state = self.state.lock().unwrap();
        if state.fail_copy.contains(&identifier) {
            return Err(self.unavailable("ingestion failed"));
        }
        state.existing.insert(identifier.clone());
        state.added.push(identifier.clone());
        Ok(identifier)
    }

    async fn image_metadata(&self, identifier: &str) -> Result<Value> {
        let state = self.state.lock().unwrap();
        if state.fail_metadata.contains(identifier) {
            return Err(self.unavailable("metadata read failed"));
        }
        Ok(state
            .metadata
            .get(identifier)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({})))
    }

    async fn replace_metadata(&self, identifier: &str, metadata: &Value) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_replace.contains(identifier) {
            return Err(self.unavailable("metadata write failed"));
        }
        state
            .replaced
            .push((identifier.to_string(), metadata.clone()));
        Ok(())
    }

    async fn list_images(
        &self,
        page: u32,
        _limit: usize,
        _since: Option<i64>,
    ) -> Result<Vec<RemoteImage>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if state.fail_list_page == Some(page) {
            return Err(self.unavailable("listing failed"));
        }
        Ok(state.pages.get(page as usize).cloned().unwrap_or_default())
    }
}

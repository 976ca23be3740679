//! Blob service boundary

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stowage_core::{BackendResult, StorageHandle};

/// Blob metadata as the service stores it
pub type Metadata = BTreeMap<String, String>;

/// HTTP content properties stored with a blob
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSettings {
    /// MIME type
    pub content_type: Option<String>,

    pub content_encoding: Option<String>,

    pub content_language: Option<String>,

    /// Content disposition
    pub content_disposition: Option<String>,

    /// Cache control headers
    pub cache_control: Option<String>,
}

impl ContentSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_cache_control(mut self, cache_control: impl Into<String>) -> Self {
        self.cache_control = Some(cache_control.into());
        self
    }

    pub fn with_content_disposition(mut self, disposition: impl Into<String>) -> Self {
        self.content_disposition = Some(disposition.into());
        self
    }
}

/// A downloaded blob
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub content: Bytes,
    pub metadata: Metadata,
    pub settings: ContentSettings,
}

/// Blob service operations used by [`BlobContext`](crate::BlobContext).
///
/// A missing container or blob is reported as `BackendError::NotFound`.
/// When the container handle carries an encryption binding the backend
/// encrypts the whole content on upload and decrypts it on download.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Create the container if it does not exist
    async fn create_container(&self, container: &StorageHandle) -> BackendResult<()>;

    async fn delete_container(&self, container: &StorageHandle) -> BackendResult<()>;

    /// Create or overwrite a blob
    async fn upload(
        &self,
        container: &StorageHandle,
        blob_name: &str,
        content: Bytes,
        metadata: Metadata,
        settings: ContentSettings,
    ) -> BackendResult<()>;

    async fn download(&self, container: &StorageHandle, blob_name: &str) -> BackendResult<StoredBlob>;

    /// Whether a blob exists in an existing container
    async fn exists(&self, container: &StorageHandle, blob_name: &str) -> BackendResult<bool>;

    /// Names of all blobs in the container
    async fn list_blobs(&self, container: &StorageHandle) -> BackendResult<Vec<String>>;

    async fn delete_blob(&self, container: &StorageHandle, blob_name: &str) -> BackendResult<()>;
}

//! In-memory blob backend for development and testing

use crate::backend::{BlobBackend, ContentSettings, Metadata, StoredBlob};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use stowage_core::{BackendError, BackendResult, StorageHandle};

#[derive(Debug, Clone)]
struct Entry {
    content: Bytes,
    metadata: Metadata,
    settings: ContentSettings,
    encrypted: bool,
}

type Container = BTreeMap<String, Entry>;

/// In-memory blob backend.
///
/// Containers with an encryption binding store the content as a sealed
/// envelope; metadata and content settings stay in clear text.
#[derive(Default)]
pub struct MemoryBlobBackend {
    containers: RwLock<HashMap<String, Container>>,
}

impl MemoryBlobBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_container(&self, name: &str) -> bool {
        self.containers.read().contains_key(name)
    }

    /// Stored content exactly as persisted
    pub fn raw_blob(&self, container: &str, blob_name: &str) -> Option<Bytes> {
        self.containers
            .read()
            .get(container)
            .and_then(|c| c.get(blob_name))
            .map(|entry| entry.content.clone())
    }

    fn missing_container(container: &StorageHandle) -> BackendError {
        BackendError::NotFound(format!("container {}", container.name()))
    }

    fn missing_blob(container: &StorageHandle, blob_name: &str) -> BackendError {
        BackendError::NotFound(format!("blob {} in container {}", blob_name, container.name()))
    }
}

#[async_trait]
impl BlobBackend for MemoryBlobBackend {
    async fn create_container(&self, container: &StorageHandle) -> BackendResult<()> {
        self.containers
            .write()
            .entry(container.name().to_string())
            .or_default();
        Ok(())
    }

    async fn delete_container(&self, container: &StorageHandle) -> BackendResult<()> {
        self.containers
            .write()
            .remove(container.name())
            .map(|_| ())
            .ok_or_else(|| Self::missing_container(container))
    }

    async fn upload(
        &self,
        container: &StorageHandle,
        blob_name: &str,
        content: Bytes,
        metadata: Metadata,
        settings: ContentSettings,
    ) -> BackendResult<()> {
        let (content, encrypted) = match container.encryption() {
            Some(binding) => {
                let envelope = binding
                    .seal(&content)
                    .map_err(|e| BackendError::Encryption(e.to_string()))?;
                (Bytes::from(envelope), true)
            }
            None => (content, false),
        };

        let mut containers = self.containers.write();
        let blobs = containers
            .get_mut(container.name())
            .ok_or_else(|| Self::missing_container(container))?;
        blobs.insert(
            blob_name.to_string(),
            Entry {
                content,
                metadata,
                settings,
                encrypted,
            },
        );
        Ok(())
    }

    async fn download(&self, container: &StorageHandle, blob_name: &str) -> BackendResult<StoredBlob> {
        let entry = {
            let containers = self.containers.read();
            containers
                .get(container.name())
                .ok_or_else(|| Self::missing_container(container))?
                .get(blob_name)
                .cloned()
                .ok_or_else(|| Self::missing_blob(container, blob_name))?
        };

        let content = if entry.encrypted {
            let binding = container.encryption().ok_or_else(|| {
                BackendError::Encryption(format!(
                    "blob {} is encrypted but container {} has no key",
                    blob_name,
                    container.name()
                ))
            })?;
            let envelope = std::str::from_utf8(&entry.content)
                .map_err(|e| BackendError::Encryption(format!("malformed envelope: {}", e)))?;
            Bytes::from(
                binding
                    .open(envelope)
                    .map_err(|e| BackendError::Encryption(e.to_string()))?,
            )
        } else {
            entry.content
        };

        Ok(StoredBlob {
            content,
            metadata: entry.metadata,
            settings: entry.settings,
        })
    }

    async fn exists(&self, container: &StorageHandle, blob_name: &str) -> BackendResult<bool> {
        self.containers
            .read()
            .get(container.name())
            .map(|blobs| blobs.contains_key(blob_name))
            .ok_or_else(|| Self::missing_container(container))
    }

    async fn list_blobs(&self, container: &StorageHandle) -> BackendResult<Vec<String>> {
        self.containers
            .read()
            .get(container.name())
            .map(|blobs| blobs.keys().cloned().collect())
            .ok_or_else(|| Self::missing_container(container))
    }

    async fn delete_blob(&self, container: &StorageHandle, blob_name: &str) -> BackendResult<()> {
        let mut containers = self.containers.write();
        containers
            .get_mut(container.name())
            .ok_or_else(|| Self::missing_container(container))?
            .remove(blob_name)
            .map(|_| ())
            .ok_or_else(|| Self::missing_blob(container, blob_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use stowage_core::EncryptionBinding;

    fn metadata() -> Metadata {
        [("User".to_string(), "ada".to_string())].into()
    }

    #[tokio::test]
    async fn test_upload_download_list_delete() {
        let backend = MemoryBlobBackend::new();
        let handle = StorageHandle::new("photos");
        backend.create_container(&handle).await.unwrap();

        backend
            .upload(&handle, "b", Bytes::from_static(b"two"), metadata(), ContentSettings::default())
            .await
            .unwrap();
        backend
            .upload(&handle, "a", Bytes::from_static(b"one"), Metadata::new(), ContentSettings::default())
            .await
            .unwrap();

        assert_eq!(backend.list_blobs(&handle).await.unwrap(), vec!["a", "b"]);
        let stored = backend.download(&handle, "b").await.unwrap();
        assert_eq!(stored.content.as_ref(), b"two");
        assert_eq!(stored.metadata, metadata());

        backend.delete_blob(&handle, "b").await.unwrap();
        assert!(!backend.exists(&handle, "b").await.unwrap());
        assert!(backend.download(&handle, "b").await.unwrap_err().is_not_found());
        assert!(backend.delete_blob(&handle, "b").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_missing_container_is_not_found() {
        let backend = MemoryBlobBackend::new();
        let handle = StorageHandle::new("nowhere");

        assert!(backend.exists(&handle, "x").await.unwrap_err().is_not_found());
        assert!(backend.list_blobs(&handle).await.unwrap_err().is_not_found());
        assert!(backend.delete_container(&handle).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_encrypted_container() {
        let backend = MemoryBlobBackend::new();
        let binding = EncryptionBinding::bind("key1", "secret", Default::default()).unwrap();
        let handle = StorageHandle::new("vault").with_encryption(Arc::new(binding));
        backend.create_container(&handle).await.unwrap();

        backend
            .upload(&handle, "doc", Bytes::from_static(b"classified"), metadata(), ContentSettings::default())
            .await
            .unwrap();

        let raw = backend.raw_blob("vault", "doc").unwrap();
        assert_ne!(raw.as_ref(), b"classified");

        let stored = backend.download(&handle, "doc").await.unwrap();
        assert_eq!(stored.content.as_ref(), b"classified");
        assert_eq!(stored.metadata, metadata());

        let unkeyed = StorageHandle::new("vault");
        assert!(matches!(
            backend.download(&unkeyed, "doc").await.unwrap_err(),
            BackendError::Encryption(_)
        ));
    }
}

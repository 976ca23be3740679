//! Blob context: registration and blob operations for blob models

use crate::backend::BlobBackend;
use crate::blob::Blob;
use stowage_core::{
    BackendError, Model, Properties, Registry, StorageAccount, StorageConfig, StorageKind,
    StowageError, StowageResult, Value,
};

/// Maps blob models onto blob containers, one container per model.
///
/// Model fields are stored as blob metadata and coerced back to their
/// declared types on download. A missing container or blob on a read
/// resolves to `exists = false` or an empty result.
pub struct BlobContext<B: BlobBackend> {
    config: StorageConfig,
    account: StorageAccount,
    backend: B,
    registry: Registry,
}

impl<B: BlobBackend> BlobContext<B> {
    /// Create a context, failing immediately on invalid credentials
    pub fn new(config: StorageConfig, backend: B) -> StowageResult<Self> {
        let account = config.storage_account()?;
        Ok(Self {
            config,
            account,
            backend,
            registry: Registry::new(StorageKind::Blob),
        })
    }

    pub fn account(&self) -> &StorageAccount {
        &self.account
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn is_registered<M: Model>(&self) -> bool {
        self.registry.get::<M>().is_ok()
    }

    /// Register `M` and create its container. Idempotent.
    pub async fn register<M: Model>(&mut self) -> StowageResult<()> {
        let Some(registration) = self.registry.plan::<M>(&self.config)? else {
            tracing::info!(
                "model {} already registered. Models are {:?}",
                M::NAME,
                self.registry.model_names()
            );
            return Ok(());
        };

        if let Err(e) = self.backend.create_container(registration.handle()).await {
            tracing::error!(
                "failed to create container {}: {}",
                registration.storage_name(),
                e
            );
            return Err(e.into());
        }

        self.registry.insert::<M>(registration)?;
        tracing::info!(
            "model {} registered successfully. Models are {:?}",
            M::NAME,
            self.registry.model_names()
        );
        Ok(())
    }

    /// Unregister `M`, optionally deleting its container and every blob in it
    pub async fn unregister<M: Model>(&mut self, delete_container: bool) -> StowageResult<()> {
        let registration = self.registry.remove::<M>()?;
        tracing::info!(
            "model {} unregistered. Models are {:?}",
            M::NAME,
            self.registry.model_names()
        );

        if delete_container {
            match self.backend.delete_container(registration.handle()).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    tracing::debug!(
                        "container {} was already gone: {}",
                        registration.storage_name(),
                        e
                    );
                }
                Err(e) => {
                    tracing::error!(
                        "failed to delete container {}: {}",
                        registration.storage_name(),
                        e
                    );
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    /// Upload the blob's content with its fields as metadata.
    ///
    /// Fails with `MissingContent` when the blob has no source and with an
    /// I/O error when a file source cannot be read.
    pub async fn upload<M: Model>(&self, blob: &mut Blob<M>) -> StowageResult<()> {
        let registration = self.registry.get::<M>()?;
        let (content, settings) = blob.prepare_upload().await?;

        match self
            .backend
            .upload(
                registration.handle(),
                blob.name(),
                content.clone(),
                blob.to_metadata(),
                settings.clone(),
            )
            .await
        {
            Ok(()) => {
                blob.uploaded(content, settings);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    "can not save blob {} in container {} because {}",
                    blob.name(),
                    registration.storage_name(),
                    e
                );
                blob.mark_exists(false);
                Ok(())
            }
            Err(e) => {
                blob.mark_exists(false);
                Err(surface(e, "save", registration.storage_name(), blob.name()))
            }
        }
    }

    /// Download content, metadata and settings into the blob.
    ///
    /// Returns whether the blob was found.
    pub async fn download<M: Model>(&self, blob: &mut Blob<M>) -> StowageResult<bool> {
        let registration = self.registry.get::<M>()?;

        match self.backend.download(registration.handle(), blob.name()).await {
            Ok(stored) => {
                let metadata: Properties = stored
                    .metadata
                    .into_iter()
                    .map(|(name, text)| (name, Value::Text(text)))
                    .collect();
                blob.merge_fill(&metadata);
                blob.downloaded(stored.content, stored.settings);
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    "can not download blob {} from container {} because {}",
                    blob.name(),
                    registration.storage_name(),
                    e
                );
                blob.mark_exists(false);
                Ok(false)
            }
            Err(e) => Err(surface(e, "download", registration.storage_name(), blob.name())),
        }
    }

    /// Download the blob named `blob_name`, if stored
    pub async fn find<M: Model>(&self, blob_name: &str) -> StowageResult<Option<Blob<M>>> {
        let mut blob = Blob::<M>::named(blob_name)?;
        if self.download(&mut blob).await? {
            Ok(Some(blob))
        } else {
            Ok(None)
        }
    }

    /// Whether the blob is stored
    pub async fn exists<M: Model>(&self, blob: &mut Blob<M>) -> StowageResult<bool> {
        let registration = self.registry.get::<M>()?;

        let exists = match self.backend.exists(registration.handle(), blob.name()).await {
            Ok(exists) => exists,
            Err(e) if e.is_not_found() => false,
            Err(e) => return Err(surface(e, "test", registration.storage_name(), blob.name())),
        };
        blob.mark_exists(exists);
        Ok(exists)
    }

    /// Names of every blob in `M`'s container
    pub async fn list<M: Model>(&self) -> StowageResult<Vec<String>> {
        let registration = self.registry.get::<M>()?;

        match self.backend.list_blobs(registration.handle()).await {
            Ok(names) => Ok(names),
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    "can not list blobs in container {} because {}",
                    registration.storage_name(),
                    e
                );
                Ok(Vec::new())
            }
            Err(e) => {
                tracing::error!(
                    "can not list blobs in container {} because {}",
                    registration.storage_name(),
                    e
                );
                Err(e.into())
            }
        }
    }

    pub async fn delete<M: Model>(&self, blob: &mut Blob<M>) -> StowageResult<()> {
        let registration = self.registry.get::<M>()?;

        match self
            .backend
            .delete_blob(registration.handle(), blob.name())
            .await
        {
            Ok(()) => {
                blob.mark_exists(false);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    "can not delete blob {} from container {} because {}",
                    blob.name(),
                    registration.storage_name(),
                    e
                );
                blob.mark_exists(false);
                Ok(())
            }
            Err(e) => Err(surface(e, "delete", registration.storage_name(), blob.name())),
        }
    }
}

fn surface(
    error: BackendError,
    action: &str,
    container: &str,
    blob_name: &str,
) -> StowageError {
    tracing::error!(
        "can not {} blob {} in container {} because {}",
        action,
        blob_name,
        container,
        error
    );
    error.into()
}

//! Per-context model registry
//!
//! Each context owns one [`Registry`] mapping model types to their
//! [`Registration`]. The map key is the model's type identity, so a model
//! can never hold two registrations in the same context.
//!
//! The registry performs no locking. A context shared between tasks must be
//! guarded by the host, e.g. with a `tokio::sync::Mutex`.

use crate::backend::StorageHandle;
use crate::config::StorageConfig;
use crate::encryption::EncryptionBinding;
use crate::error::{StowageError, StowageResult};
use crate::model::Model;
use crate::naming::validate_storage_name;
use crate::schema::{schema_of, ModelRef, ModelSchema, StorageKind};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// A registered model and the storage it maps onto
#[derive(Debug, Clone)]
pub struct Registration {
    model_name: &'static str,
    schema: Arc<ModelSchema>,
    handle: StorageHandle,
}

impl Registration {
    pub fn model_name(&self) -> &'static str {
        self.model_name
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    pub fn storage_name(&self) -> &str {
        self.handle.name()
    }

    /// Handle passed to every backend call made for this model
    pub fn handle(&self) -> &StorageHandle {
        &self.handle
    }
}

/// Registrations of one context, keyed by model type
#[derive(Debug)]
pub struct Registry {
    kind: StorageKind,
    entries: HashMap<TypeId, Registration>,
}

impl Registry {
    pub fn new(kind: StorageKind) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    pub fn contains(&self, model: &ModelRef) -> bool {
        self.entries.contains_key(&model.type_id())
    }

    /// The registration of `model`, failing when it was never registered
    pub fn lookup(&self, model: &ModelRef) -> StowageResult<&Registration> {
        self.entries
            .get(&model.type_id())
            .ok_or_else(|| StowageError::not_registered(model.name()))
    }

    pub fn get<M: Model>(&self) -> StowageResult<&Registration> {
        self.lookup(&ModelRef::of::<M>())
    }

    /// Prepare the registration of `M` without storing it.
    ///
    /// Returns `None` when `M` is already registered. Otherwise the storage
    /// kind, naming convention and storage name uniqueness are checked and
    /// the encryption binding is built from `config`.
    pub fn plan<M: Model>(&self, config: &StorageConfig) -> StowageResult<Option<Registration>> {
        let model = ModelRef::of::<M>();
        if self.contains(&model) {
            return Ok(None);
        }

        let schema = schema_of::<M>()?;
        if schema.kind() != self.kind {
            return Err(StowageError::schema(
                M::NAME,
                format!(
                    "a {} model cannot be registered with a {} context",
                    schema.kind(),
                    self.kind
                ),
            ));
        }

        let storage_name = schema.storage_name();
        if let Some(owner) = self.owner_of(storage_name) {
            return Err(StowageError::StorageNameTaken {
                name: storage_name.to_string(),
                owner: owner.to_string(),
            });
        }
        validate_storage_name(storage_name, self.kind)?;

        let mut handle = StorageHandle::new(storage_name);
        if let Some(binding) = Self::encryption_for(&schema, config)? {
            handle = handle.with_encryption(Arc::new(binding));
        }

        Ok(Some(Registration {
            model_name: M::NAME,
            schema,
            handle,
        }))
    }

    fn encryption_for(
        schema: &ModelSchema,
        config: &StorageConfig,
    ) -> StowageResult<Option<EncryptionBinding>> {
        let encrypted = match schema.kind() {
            StorageKind::Table => !schema.encrypted_fields().is_empty(),
            StorageKind::Blob | StorageKind::Queue => {
                schema.encrypts_payload() || config.require_encryption
            }
        };
        if !encrypted {
            return Ok(None);
        }
        EncryptionBinding::bind(
            &config.key_identifier,
            &config.secret_key,
            schema.encrypted_fields(),
        )
        .map(Some)
    }

    /// Store a planned registration
    pub fn insert<M: Model>(&mut self, registration: Registration) -> StowageResult<()> {
        let type_id = TypeId::of::<M>();
        if self.entries.contains_key(&type_id) {
            return Err(StowageError::DuplicateRegistration {
                model: M::NAME.to_string(),
            });
        }
        self.entries.insert(type_id, registration);
        Ok(())
    }

    /// Remove the registration of `M`
    pub fn remove<M: Model>(&mut self) -> StowageResult<Registration> {
        self.entries
            .remove(&TypeId::of::<M>())
            .ok_or_else(|| StowageError::not_registered(M::NAME))
    }

    /// Model that registered `storage_name`, if any
    pub fn owner_of(&self, storage_name: &str) -> Option<&'static str> {
        self.entries
            .values()
            .find(|r| r.storage_name() == storage_name)
            .map(|r| r.model_name)
    }

    /// Registered model names, sorted
    pub fn model_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.values().map(|r| r.model_name).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

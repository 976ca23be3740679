//! Backend-facing types shared by the blob, queue and table backends

use crate::encryption::EncryptionBinding;
use std::sync::Arc;
use thiserror::Error;

/// Failures reported by a storage backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource conflict: {0}")]
    Conflict(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Encryption error: {0}")]
    Encryption(String),
}

impl BackendError {
    /// True for the "resource not found" condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for backend calls
pub type BackendResult<T> = Result<T, BackendError>;

/// Per-registration handle passed to every backend call.
///
/// The handle is created once when a model is registered; the encryption
/// binding it carries applies to every operation made through it.
#[derive(Debug, Clone)]
pub struct StorageHandle {
    name: String,
    encryption: Option<Arc<EncryptionBinding>>,
}

impl StorageHandle {
    /// Create a plaintext handle for a container, queue or table
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            encryption: None,
        }
    }

    /// Attach client-side encryption to the handle
    pub fn with_encryption(mut self, binding: Arc<EncryptionBinding>) -> Self {
        self.encryption = Some(binding);
        self
    }

    /// Container, queue or table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Encryption binding, if the registration encrypts
    pub fn encryption(&self) -> Option<&EncryptionBinding> {
        self.encryption.as_deref()
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_some()
    }
}

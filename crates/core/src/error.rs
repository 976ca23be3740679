//! Error types shared by every storage context
//!
//! Registration and schema problems abort the calling operation. Backend
//! failures are wrapped in [`BackendError`]; contexts translate the
//! not-found case into `exists = false` or empty results before it ever
//! reaches the caller.

use crate::backend::BackendError;
use crate::config::ConfigError;
use crate::schema::StorageKind;
use thiserror::Error;

/// Errors raised by the mapping layer
#[derive(Error, Debug)]
pub enum StowageError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("'{name}' does not fit the {kind} naming convention")]
    NameConvention { name: String, kind: StorageKind },

    #[error("Storage name '{name}' is already registered by model {owner}")]
    StorageNameTaken { name: String, owner: String },

    #[error("Model {model} is registered more than once")]
    DuplicateRegistration { model: String },

    #[error("Model {model} is not registered, please register it first")]
    ModelNotRegistered { model: String },

    #[error("Schema error in model {model}: {message}")]
    Schema { model: String, message: String },

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Blob {blob} of model {model} has no content")]
    MissingContent { model: String, blob: String },
}

impl StowageError {
    /// Create a schema error for a model
    pub fn schema(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Create a not-registered error for a model
    pub fn not_registered(model: impl Into<String>) -> Self {
        Self::ModelNotRegistered {
            model: model.into(),
        }
    }

    /// True when the error wraps a backend not-found condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Backend(e) if e.is_not_found())
    }
}

/// Result type for mapping-layer operations
pub type StowageResult<T> = Result<T, StowageError>;

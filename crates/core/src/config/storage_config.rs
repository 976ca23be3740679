use crate::config::{
    ConfigError, ConfigSource, ConfigValidator, FlagValidator, NonEmptyValidator,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

pub const ENV_ACCOUNT_NAME: &str = "STORAGE_ACCOUNT_NAME";
pub const ENV_ACCOUNT_KEY: &str = "STORAGE_ACCOUNT_KEY";
pub const ENV_IS_EMULATED: &str = "STORAGE_IS_EMULATED";
pub const ENV_REQUIRE_ENCRYPTION: &str = "STORAGE_REQUIRE_ENCRYPTION";
pub const ENV_KEY_IDENTIFIER: &str = "STORAGE_KEY_IDENTIFIER";
pub const ENV_SECRET_KEY: &str = "STORAGE_SECRET_KEY";

/// Configuration loaded from the process environment
pub trait EnvConfig: Sized {
    /// Read the configuration from `STORAGE_*` variables and validate it
    fn from_env() -> Result<Self, ConfigError>;

    /// Check credential and encryption key invariants
    fn validate(&self) -> Result<(), ConfigError>;

    /// Where each field's value came from
    fn config_sources(&self) -> HashMap<String, ConfigSource>;
}

/// Storage account credentials and client-side encryption keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage account name
    pub account_name: String,

    /// Shared account key
    #[serde(skip_serializing)]
    pub account_key: String,

    /// Talk to the local storage emulator instead of an account
    pub is_emulated: bool,

    /// Encrypt every blob and queue payload regardless of the model flag
    pub require_encryption: bool,

    /// Identifier of the key-encryption key
    pub key_identifier: String,

    /// Secret the key-encryption key is derived from
    #[serde(skip_serializing)]
    pub secret_key: String,
}

/// The account a context talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageAccount {
    Emulated,
    SharedKey { name: String, key: String },
}

impl StorageAccount {
    pub fn name(&self) -> &str {
        match self {
            StorageAccount::Emulated => "devstoreaccount1",
            StorageAccount::SharedKey { name, .. } => name,
        }
    }
}

impl StorageConfig {
    /// Configuration for the local storage emulator
    pub fn emulated() -> Self {
        Self {
            is_emulated: true,
            ..Self::default()
        }
    }

    /// Configuration for a storage account with a shared key
    pub fn account(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            account_name: name.into(),
            account_key: key.into(),
            ..Self::default()
        }
    }

    /// Set the key-encryption key identifier and secret
    pub fn with_encryption_key(
        mut self,
        key_identifier: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.key_identifier = key_identifier.into();
        self.secret_key = secret_key.into();
        self
    }

    /// Encrypt all blob and queue payloads
    pub fn require_encryption(mut self, require: bool) -> Self {
        self.require_encryption = require;
        self
    }

    pub fn has_encryption_key(&self) -> bool {
        !self.key_identifier.is_empty() && !self.secret_key.is_empty()
    }

    /// Resolve the account, validating the configuration first
    pub fn storage_account(&self) -> Result<StorageAccount, ConfigError> {
        self.validate()?;
        if self.is_emulated {
            Ok(StorageAccount::Emulated)
        } else {
            Ok(StorageAccount::SharedKey {
                name: self.account_name.clone(),
                key: self.account_key.clone(),
            })
        }
    }
}

impl EnvConfig for StorageConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        config.account_name = env::var(ENV_ACCOUNT_NAME).unwrap_or_default();
        config.account_key = env::var(ENV_ACCOUNT_KEY).unwrap_or_default();

        // Without credentials the emulator is the only usable account
        config.is_emulated = match env::var(ENV_IS_EMULATED) {
            Ok(flag) => FlagValidator { field: "is_emulated" }.parse(&flag)?,
            Err(_) => config.account_name.is_empty() && config.account_key.is_empty(),
        };

        if let Ok(flag) = env::var(ENV_REQUIRE_ENCRYPTION) {
            config.require_encryption = FlagValidator {
                field: "require_encryption",
            }
            .parse(&flag)?;
        }

        config.key_identifier = env::var(ENV_KEY_IDENTIFIER).unwrap_or_default();
        config.secret_key = env::var(ENV_SECRET_KEY).unwrap_or_default();

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.is_emulated {
            if !self.account_name.is_empty() || !self.account_key.is_empty() {
                return Err(ConfigError::validation_failed(
                    "is_emulated cannot be combined with account_name or account_key",
                ));
            }
        } else {
            if self.account_name.is_empty() && self.account_key.is_empty() {
                return Err(ConfigError::validation_failed(
                    "either is_emulated or account_name and account_key must be set",
                ));
            }
            NonEmptyValidator {
                field: "account_name",
                hint: "STORAGE_ACCOUNT_NAME is required unless the emulator is used",
            }
            .validate(self.account_name.as_str())?;
            NonEmptyValidator {
                field: "account_key",
                hint: "STORAGE_ACCOUNT_KEY is required unless the emulator is used",
            }
            .validate(self.account_key.as_str())?;
        }

        if self.require_encryption {
            NonEmptyValidator {
                field: "key_identifier",
                hint: "STORAGE_KEY_IDENTIFIER is required when encryption is required",
            }
            .validate(self.key_identifier.as_str())?;
            NonEmptyValidator {
                field: "secret_key",
                hint: "STORAGE_SECRET_KEY is required when encryption is required",
            }
            .validate(self.secret_key.as_str())?;
        }

        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let defaults = Self::default();
        let source = ConfigSource::resolve;

        let mut sources = HashMap::new();
        sources.insert(
            "account_name".to_string(),
            source(ENV_ACCOUNT_NAME, self.account_name == defaults.account_name, "empty"),
        );
        sources.insert(
            "account_key".to_string(),
            source(ENV_ACCOUNT_KEY, self.account_key == defaults.account_key, "empty"),
        );
        sources.insert(
            "is_emulated".to_string(),
            source(ENV_IS_EMULATED, self.is_emulated == defaults.is_emulated, "false"),
        );
        sources.insert(
            "require_encryption".to_string(),
            source(
                ENV_REQUIRE_ENCRYPTION,
                self.require_encryption == defaults.require_encryption,
                "false",
            ),
        );
        sources.insert(
            "key_identifier".to_string(),
            source(ENV_KEY_IDENTIFIER, self.key_identifier == defaults.key_identifier, "empty"),
        );
        sources.insert(
            "secret_key".to_string(),
            source(ENV_SECRET_KEY, self.secret_key == defaults.secret_key, "empty"),
        );
        sources
    }
}

//! Context construction from configuration

use serial_test::serial;
use std::env;
use stowage::core::config::{
    ENV_ACCOUNT_KEY, ENV_ACCOUNT_NAME, ENV_IS_EMULATED, ENV_KEY_IDENTIFIER,
    ENV_REQUIRE_ENCRYPTION, ENV_SECRET_KEY,
};
use stowage::prelude::*;

fn clear_env() {
    for var in [
        ENV_ACCOUNT_NAME,
        ENV_ACCOUNT_KEY,
        ENV_IS_EMULATED,
        ENV_REQUIRE_ENCRYPTION,
        ENV_KEY_IDENTIFIER,
        ENV_SECRET_KEY,
    ] {
        env::remove_var(var);
    }
}

#[test]
fn test_contexts_reject_missing_credentials() {
    let config = StorageConfig {
        account_name: "account".to_string(),
        ..StorageConfig::default()
    };

    assert!(matches!(
        TableContext::new(config.clone(), MemoryTableBackend::new()),
        Err(StowageError::Configuration(ConfigError::MissingRequired { .. }))
    ));
    assert!(BlobContext::new(config.clone(), MemoryBlobBackend::new()).is_err());
    assert!(QueueContext::new(StorageConfig::default(), MemoryQueueBackend::new()).is_err());
}

#[test]
fn test_shared_key_account() {
    let context = TableContext::new(StorageConfig::account("devstore", "a2V5"), MemoryTableBackend::new()).unwrap();
    assert_eq!(context.account().name(), "devstore");
    assert!(matches!(context.account(), StorageAccount::SharedKey { .. }));
}

#[test]
#[serial]
fn test_contexts_from_env() {
    clear_env();
    let config = StorageConfig::from_env().unwrap();
    let context = QueueContext::new(config, MemoryQueueBackend::new()).unwrap();
    assert!(matches!(context.account(), StorageAccount::Emulated));

    env::set_var(ENV_REQUIRE_ENCRYPTION, "true");
    assert!(StorageConfig::from_env().is_err());

    env::set_var(ENV_KEY_IDENTIFIER, "stowage_test");
    env::set_var(ENV_SECRET_KEY, "supa-dupa-secret-special-key2901");
    let config = StorageConfig::from_env().unwrap();
    assert!(config.require_encryption && config.has_encryption_key());
    clear_env();
}

//! Storage naming conventions

use crate::error::{StowageError, StowageResult};
use crate::schema::StorageKind;
use once_cell::sync::Lazy;
use regex::Regex;

/// Letters and digits, starting with a letter, 3 to 63 characters
static TABLE_NAME: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]{2,62}$").ok());

/// Lowercase letters, digits and hyphens, 3 to 63 characters
static LOWERCASE_NAME: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]{2,62}$").ok());

/// Whether `name` is a valid container, queue or table name
pub fn fits_convention(name: &str, kind: StorageKind) -> bool {
    let pattern = match kind {
        StorageKind::Table => &*TABLE_NAME,
        StorageKind::Blob | StorageKind::Queue => &*LOWERCASE_NAME,
    };
    pattern.as_ref().is_some_and(|re| re.is_match(name))
}

/// Validate a storage name, failing with the offending name
pub fn validate_storage_name(name: &str, kind: StorageKind) -> StowageResult<()> {
    if fits_convention(name, kind) {
        Ok(())
    } else {
        Err(StowageError::NameConvention {
            name: name.to_string(),
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names() {
        assert!(fits_convention("TableOne", StorageKind::Table));
        assert!(fits_convention("abc", StorageKind::Table));
        assert!(fits_convention(&format!("T{}", "a".repeat(62)), StorageKind::Table));

        assert!(!fits_convention("ab", StorageKind::Table));
        assert!(!fits_convention("1Table", StorageKind::Table));
        assert!(!fits_convention("table-one", StorageKind::Table));
        assert!(!fits_convention(&format!("T{}", "a".repeat(63)), StorageKind::Table));
    }

    #[test]
    fn test_queue_and_container_names() {
        assert!(fits_convention("queueone", StorageKind::Queue));
        assert!(fits_convention("1-queue", StorageKind::Queue));
        assert!(fits_convention("blob-one", StorageKind::Blob));

        assert!(!fits_convention("QueueOne", StorageKind::Queue));
        assert!(!fits_convention("-queue", StorageKind::Queue));
        assert!(!fits_convention("q", StorageKind::Blob));
        assert!(!fits_convention("queue_one", StorageKind::Queue));
    }

    #[test]
    fn test_validation_error_carries_name() {
        let err = validate_storage_name("QueueOne", StorageKind::Queue).unwrap_err();
        match err {
            StowageError::NameConvention { name, kind } => {
                assert_eq!(name, "QueueOne");
                assert_eq!(kind, StorageKind::Queue);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

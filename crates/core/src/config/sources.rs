use std::env;
use std::fmt;

/// Where a storage setting came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from the named environment variable
    EnvVar(String),
    /// Left at its default
    Default(String),
    /// Set through a constructor or builder method
    Programmatic,
}

impl ConfigSource {
    /// Classify a setting: the environment wins, then an untouched default
    pub fn resolve(var: &str, is_default: bool, default: &str) -> Self {
        if env::var_os(var).is_some() {
            ConfigSource::EnvVar(var.to_string())
        } else if is_default {
            ConfigSource::Default(default.to_string())
        } else {
            ConfigSource::Programmatic
        }
    }

    pub fn is_env_var(&self) -> bool {
        matches!(self, ConfigSource::EnvVar(_))
    }

    pub fn is_default(&self) -> bool {
        matches!(self, ConfigSource::Default(_))
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::EnvVar(var) => write!(f, "environment variable {}", var),
            ConfigSource::Default(value) => write!(f, "default ({})", value),
            ConfigSource::Programmatic => f.write_str("set in code"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_without_env() {
        let source = ConfigSource::resolve("STOWAGE_SOURCES_TEST_UNSET", true, "false");
        assert!(source.is_default());
        assert_eq!(source.to_string(), "default (false)");

        let source = ConfigSource::resolve("STOWAGE_SOURCES_TEST_UNSET", false, "false");
        assert_eq!(source, ConfigSource::Programmatic);
    }
}

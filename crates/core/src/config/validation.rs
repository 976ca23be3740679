use thiserror::Error;

/// Invalid or incomplete storage configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {field}. {hint}")]
    MissingRequired { field: String, hint: String },

    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Configuration validation failed: {message}")]
    ValidationFailed { message: String },
}

impl ConfigError {
    pub fn missing_required(field: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::MissingRequired {
            field: field.into(),
            hint: hint.into(),
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// A rule spanning several fields was violated
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }
}

/// Checks a single configuration value
pub trait ConfigValidator<T: ?Sized> {
    fn validate(&self, value: &T) -> Result<(), ConfigError>;
}

/// Rejects empty strings for a named field
pub struct NonEmptyValidator {
    pub field: &'static str,
    pub hint: &'static str,
}

impl ConfigValidator<str> for NonEmptyValidator {
    fn validate(&self, value: &str) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::missing_required(self.field, self.hint));
        }
        Ok(())
    }
}

/// Parses boolean flags the way the storage environment variables spell them
pub struct FlagValidator {
    pub field: &'static str,
}

impl FlagValidator {
    pub fn parse(&self, value: &str) -> Result<bool, ConfigError> {
        match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(ConfigError::invalid_value(
                self.field,
                value,
                "one of: true, false, yes, no, 1, 0",
            )),
        }
    }
}

impl ConfigValidator<str> for FlagValidator {
    fn validate(&self, value: &str) -> Result<(), ConfigError> {
        self.parse(value).map(|_| ())
    }
}

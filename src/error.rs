//! Domain-specific error types for nlp-suite

use thiserror::Error;

use crate::app::NotificationLevel;

/// Main error type for the nlp-suite application
#[derive(Error, Debug)]
pub enum SuiteError {
    /// Missing or malformed user input; raised before any model is called
    #[error("{message}")]
    Validation { message: String },

    #[error("{message}")]
    Pipeline { message: String },

    #[error("Failed to load {component}: {message}")]
    Initialization { component: String, message: String },

    #[error("{component} is disabled: {message}")]
    FeatureDisabled { component: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Model error: {message}")]
    Model { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SuiteError {
    pub fn validation(message: impl Into<String>) -> Self {
        SuiteError::Validation {
            message: message.into(),
        }
    }

    pub fn pipeline(message: impl Into<String>) -> Self {
        SuiteError::Pipeline {
            message: message.into(),
        }
    }

    /// How the error is surfaced to the user.
    pub fn level(&self) -> NotificationLevel {
        match self {
            SuiteError::Validation { .. } => NotificationLevel::Warning,
            _ => NotificationLevel::Error,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, SuiteError::Validation { .. })
    }
}

impl From<anyhow::Error> for SuiteError {
    fn from(err: anyhow::Error) -> Self {
        SuiteError::Internal {
            message: format!("{err:#}"),
        }
    }
}

impl From<serde_json::Error> for SuiteError {
    fn from(err: serde_json::Error) -> Self {
        SuiteError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for SuiteError {
    fn from(err: toml::de::Error) -> Self {
        SuiteError::Config {
            message: err.to_string(),
        }
    }
}

impl From<candle_core::Error> for SuiteError {
    fn from(err: candle_core::Error) -> Self {
        SuiteError::Model {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for SuiteError {
    fn from(err: std::io::Error) -> Self {
        SuiteError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type alias for nlp-suite operations
pub type Result<T> = std::result::Result<T, SuiteError>;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type WidgetResult<T> = Result<T, WidgetError>;

#[derive(Error, Debug)]
pub enum WidgetError {
    /// Missing or invalid `apiKey`. Fatal for construction.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A `Ready`-only operation was called on an instance that is not ready.
    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Widget not initialized. Call FluentWidget::init() first")]
    NotInitialized,

    #[error("Host page error: {0}")]
    Host(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("UI error: {0}")]
    Ui(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl WidgetError {
    /// Stable code reported to the host page's error hook.
    pub fn code(&self) -> &'static str {
        match self {
            WidgetError::Configuration(_) => "CONFIGURATION_ERROR",
            WidgetError::Initialization(_) => "INITIALIZATION_ERROR",
            WidgetError::NotInitialized => "NOT_INITIALIZED",
            WidgetError::Host(_) => "HOST_ERROR",
            WidgetError::Storage(_) => "STORAGE_ERROR",
            WidgetError::Ui(_) => "UI_ERROR",
            WidgetError::Serialization(_) => "SERIALIZATION_ERROR",
            WidgetError::Io(_) => "IO_ERROR",
            WidgetError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Serializable error payload handed to the `onError` hook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WidgetErrorInfo {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl From<&WidgetError> for WidgetErrorInfo {
    fn from(error: &WidgetError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
            details: None,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(
            WidgetError::Configuration("x".into()).code(),
            "CONFIGURATION_ERROR"
        );
        assert_eq!(WidgetError::NotInitialized.code(), "NOT_INITIALIZED");
    }

    #[test]
    fn test_error_info_carries_message() {
        let err = WidgetError::Initialization("not ready".into());
        let info = WidgetErrorInfo::from(&err);
        assert_eq!(info.code, "INITIALIZATION_ERROR");
        assert_eq!(info.message, "Initialization error: not ready");
        assert!(info.details.is_none());
    }
}

use serde::Serialize;
use thiserror::Error;

/// Application-wide error types for Gleaner.
///
/// The first three variants are template-level: they are captured in the
/// [`TemplateResult`](crate::models::TemplateResult) of the template that
/// produced them and never abort a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AppError {
    /// Template is malformed: missing URL, missing item selector, bad selector.
    #[error("Invalid template: {reason}")]
    InvalidTemplate { reason: String },

    /// Page could not be fetched (network failure, timeout, non-success status).
    #[error("{}", fetch_failed_message(.message, .status))]
    FetchFailed {
        message: String,
        status: Option<u16>,
    },

    /// Response body could not be parsed as an HTML document.
    #[error("Parse error: {reason}")]
    ParseFailed { reason: String },

    /// Template source or environment configuration is malformed.
    #[error("Configuration error: {reason}")]
    ConfigError { reason: String },

    /// A template task died before reporting a result.
    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

fn fetch_failed_message(message: &str, status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("Fetch failed (HTTP {code}): {message}"),
        None => format!("Fetch failed: {message}"),
    }
}

impl AppError {
    pub fn invalid_template(reason: impl Into<String>) -> Self {
        AppError::InvalidTemplate {
            reason: reason.into(),
        }
    }

    /// Network-level fetch failure with no HTTP status.
    pub fn fetch_failed(message: impl Into<String>) -> Self {
        AppError::FetchFailed {
            message: message.into(),
            status: None,
        }
    }

    /// Fetch failure for a response that came back with a non-success status.
    pub fn http_status(status: u16, url: &str) -> Self {
        AppError::FetchFailed {
            message: format!("non-success status for {url}"),
            status: Some(status),
        }
    }

    pub fn parse_failed(reason: impl Into<String>) -> Self {
        AppError::ParseFailed {
            reason: reason.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        AppError::ConfigError {
            reason: reason.into(),
        }
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidTemplate { .. } => "invalid_template",
            AppError::FetchFailed { .. } => "fetch_failed",
            AppError::ParseFailed { .. } => "parse_failed",
            AppError::ConfigError { .. } => "config_error",
            AppError::Internal { .. } => "internal",
        }
    }

    /// Returns true if this error is transient and worth retrying.
    ///
    /// Network failures and timeouts (no status), rate limiting (429) and
    /// server errors (5xx) are retryable; everything else is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::FetchFailed { status: None, .. } => true,
            AppError::FetchFailed {
                status: Some(code), ..
            } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

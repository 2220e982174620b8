//! Collection error taxonomy
//!
//! Only `Configuration` stops a whole run. Page-level failures are logged and
//! skipped unless the page type is configured to fail fast; record-level
//! persistence failures never stop the session.

use thiserror::Error;

use super::services::PageDiagnostics;

#[derive(Error, Debug, Clone)]
pub enum CollectionError {
    #[error("Configuration error: {message}")]
    Configuration { message: String, field: String },

    #[error("Render failed for page {page_number} ({url}): {reason}")]
    RenderFailure {
        page_number: u32,
        url: String,
        reason: String,
    },

    #[error("Page {page_number} never became ready: {reason}")]
    ReadinessTimeout {
        page_number: u32,
        reason: String,
        diagnostics: PageDiagnostics,
    },

    #[error("Persist failed on page {page_number} position {position}: {source}")]
    Persist {
        page_number: u32,
        position: u32,
        #[source]
        source: PersistError,
    },
}

impl CollectionError {
    pub fn configuration(field: &str, message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.to_string(),
        }
    }

    pub fn render_failure(page_number: u32, url: &str, reason: impl Into<String>) -> Self {
        Self::RenderFailure {
            page_number,
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error aborts the session regardless of page-type policy
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Whether this is a page-level failure subject to the fail-fast policy
    pub fn is_page_failure(&self) -> bool {
        matches!(
            self,
            Self::RenderFailure { .. } | Self::ReadinessTimeout { .. }
        )
    }
}

/// Failure to persist a single record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("sink '{sink}' failed: {message}")]
    Sink { sink: String, message: String },
}

impl From<sqlx::Error> for PersistError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type CollectionResult<T> = Result<T, CollectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_configuration_errors_are_fatal() {
        assert!(CollectionError::configuration("pages", "empty page list").is_fatal());
        assert!(!CollectionError::render_failure(2, "https://x.test", "timeout").is_fatal());

        let persist = CollectionError::Persist {
            page_number: 1,
            position: 1,
            source: PersistError::Database("locked".into()),
        };
        assert!(!persist.is_fatal());
        assert!(!persist.is_page_failure());
    }
}

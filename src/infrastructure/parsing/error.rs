//! Parsing error types
//!
//! These never escape the Safe Field Extractor: callers of extraction see
//! "absent" instead. They surface in logs and in profile compilation.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Empty selector expression")]
    EmptySelector,

    #[error("Profile error for field '{field}': {reason}")]
    InvalidProfile { field: String, reason: String },
}

impl ParsingError {
    pub fn invalid_selector(selector: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;

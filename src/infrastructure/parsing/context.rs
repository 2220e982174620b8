//! Parsing context for one page
//!
//! Carries the identity of the page being parsed so records and rejections
//! can be attributed without threading extra arguments through the builder.

use crate::domain::ScopeKey;

/// Context information for parsing one listing page
#[derive(Debug, Clone)]
pub struct ParseContext {
    pub scope: ScopeKey,

    /// Page number from the session's page list
    pub page_number: u32,

    /// URL the page was rendered from
    pub url: String,
}

impl ParseContext {
    pub fn new(scope: ScopeKey, page_number: u32, url: impl Into<String>) -> Self {
        Self {
            scope,
            page_number,
            url: url.into(),
        }
    }
}

//! Selector data model
//!
//! A `FieldSelector` names one extractable attribute of a product listing and
//! carries its primary selector plus ordered fallbacks. Selector sets are
//! scoped per (retailer, page type) and are immutable once loaded.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved field name for the selector that locates product containers.
pub const BASE_CONTAINER_FIELD: &str = "base_container";

/// Category of rendered page, e.g. `main_page` or `bsr_page`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageType(String);

impl PageType {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Selector scope: one retailer and one page type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeKey {
    pub retailer: String,
    pub page_type: PageType,
}

impl ScopeKey {
    pub fn new(retailer: impl Into<String>, page_type: impl Into<String>) -> Self {
        Self {
            retailer: retailer.into(),
            page_type: PageType::new(page_type),
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.retailer, self.page_type)
    }
}

/// One extractable attribute with its fallback chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSelector {
    pub field_name: String,
    pub primary_selector: String,
    #[serde(default)]
    pub fallback_selectors: Vec<String>,
}

impl FieldSelector {
    pub fn new(field_name: impl Into<String>, primary_selector: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            primary_selector: primary_selector.into(),
            fallback_selectors: Vec::new(),
        }
    }

    /// Append fallback selectors, tried in order after the primary one
    pub fn with_fallbacks<I, S>(mut self, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_selectors
            .extend(fallbacks.into_iter().map(Into::into));
        self
    }

    /// Primary selector followed by fallbacks
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_selector.as_str())
            .chain(self.fallback_selectors.iter().map(String::as_str))
    }
}

/// Resolved selectors for one scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorSet {
    pub scope: ScopeKey,
    /// Locates the product containers on the page
    pub base_container: FieldSelector,
    /// Per-field selectors, in registration order
    pub fields: Vec<FieldSelector>,
}

impl SelectorSet {
    pub fn field(&self, name: &str) -> Option<&FieldSelector> {
        self.fields.iter().find(|f| f.field_name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_yield_primary_then_fallbacks_in_order() {
        let selector = FieldSelector::new("product_name", "h2 span")
            .with_fallbacks(["h2 a span", "h2"]);

        let all: Vec<&str> = selector.candidates().collect();
        assert_eq!(all, vec!["h2 span", "h2 a span", "h2"]);
    }

    #[test]
    fn scope_key_displays_as_retailer_slash_page_type() {
        let scope = ScopeKey::new("Amazon", "main_page");
        assert_eq!(scope.to_string(), "Amazon/main_page");
    }
}

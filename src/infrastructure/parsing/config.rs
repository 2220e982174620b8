//! Page profile configuration
//!
//! Everything that differs between retailers and page types is data here:
//! exclusion signatures, positional ordering, page size, required fields and
//! per-field normalization. No retailer markup is embedded in defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::{ParsingError, ParsingResult};
use crate::domain::ScopeKey;

/// How an exclusion pattern is compared with an attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    Exact,
    Substring,
}

/// Marks a container as non-product (ads, widgets, carousels, brand shelves)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionSignature {
    pub attribute: String,
    pub mode: MatchMode,
    pub pattern: String,
    #[serde(default)]
    pub ignore_case: bool,
}

impl ExclusionSignature {
    pub fn new(attribute: &str, mode: MatchMode, pattern: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            mode,
            pattern: pattern.to_string(),
            ignore_case: false,
        }
    }

    pub fn ignoring_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    /// Whether the container's attributes carry this signature.
    /// A missing attribute never matches.
    pub fn matches(&self, attrs: &HashMap<String, String>) -> bool {
        let Some(value) = attrs.get(&self.attribute) else {
            return false;
        };

        let (value, pattern) = if self.ignore_case {
            (value.to_lowercase(), self.pattern.to_lowercase())
        } else {
            (value.clone(), self.pattern.clone())
        };

        match self.mode {
            MatchMode::Exact => value == pattern,
            MatchMode::Substring => value.contains(&pattern),
        }
    }
}

/// Field-specific normalization applied after extraction
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// Trimmed pass-through; empty collapses to absent
    #[default]
    Text,
    /// Leading markers such as `#` stripped, parsed as an integer
    Rank,
    /// Made absolute against the retailer origin when no scheme is present
    Url,
    /// Internal whitespace collapsed; absent unless it contains a digit
    Price,
    /// Kept only when it matches one of the allowed labels
    Badge { allowed: Vec<String> },
    /// Selector presence mapped to one of two labels
    Presence { present: String, absent: String },
}

/// Extraction parameters for one (retailer, page type)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageProfile {
    pub retailer: String,
    pub page_type: String,

    /// Fixed origin used to make relative URLs absolute
    pub origin: String,

    #[serde(default)]
    pub exclusion_signatures: Vec<ExclusionSignature>,

    /// Attribute holding the intended visual position (e.g. `data-index`)
    #[serde(default)]
    pub position_attribute: Option<String>,

    /// Page size: containers beyond this count are ignored
    pub max_containers_per_page: usize,

    #[serde(default)]
    pub required_fields: Vec<String>,

    #[serde(default)]
    pub field_kinds: HashMap<String, FieldKind>,

    /// Fields whose first present value identifies a record for de-duplication
    #[serde(default)]
    pub identity_fields: Vec<String>,

    /// Warn when fewer containers than this survive filtering
    #[serde(default)]
    pub warn_below_containers: Option<usize>,
}

impl PageProfile {
    pub fn new(retailer: &str, page_type: &str, origin: &str, max_containers_per_page: usize) -> Self {
        Self {
            retailer: retailer.to_string(),
            page_type: page_type.to_string(),
            origin: origin.to_string(),
            exclusion_signatures: Vec::new(),
            position_attribute: None,
            max_containers_per_page,
            required_fields: Vec::new(),
            field_kinds: HashMap::new(),
            identity_fields: Vec::new(),
            warn_below_containers: None,
        }
    }

    pub fn scope(&self) -> ScopeKey {
        ScopeKey::new(&self.retailer, &self.page_type)
    }

    pub fn kind_of(&self, field: &str) -> &FieldKind {
        static TEXT: FieldKind = FieldKind::Text;
        self.field_kinds.get(field).unwrap_or(&TEXT)
    }

    pub fn with_exclusion(mut self, signature: ExclusionSignature) -> Self {
        self.exclusion_signatures.push(signature);
        self
    }

    pub fn with_position_attribute(mut self, attribute: &str) -> Self {
        self.position_attribute = Some(attribute.to_string());
        self
    }

    pub fn with_required(mut self, field: &str) -> Self {
        self.required_fields.push(field.to_string());
        self
    }

    pub fn with_kind(mut self, field: &str, kind: FieldKind) -> Self {
        self.field_kinds.insert(field.to_string(), kind);
        self
    }

    pub fn with_identity(mut self, field: &str) -> Self {
        self.identity_fields.push(field.to_string());
        self
    }

    /// Sanity checks that do not depend on the selector registry
    pub fn validate(&self) -> ParsingResult<()> {
        if self.max_containers_per_page == 0 {
            return Err(ParsingError::InvalidProfile {
                field: "max_containers_per_page".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        url::Url::parse(&self.origin).map_err(|e| ParsingError::InvalidProfile {
            field: "origin".to_string(),
            reason: e.to_string(),
        })?;

        for (field, kind) in &self.field_kinds {
            if let FieldKind::Badge { allowed } = kind {
                if allowed.is_empty() {
                    return Err(ParsingError::InvalidProfile {
                        field: field.clone(),
                        reason: "badge allow-list is empty".to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

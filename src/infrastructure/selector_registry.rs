//! Selector Registry
//!
//! Maps (retailer, page type) to field selectors. Entries come from the
//! configuration file and/or the `field_selectors` table; a scope without
//! active selectors is a configuration error for the session.

use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::domain::{
    CollectionError, CollectionResult, FieldSelector, ScopeKey, SelectorSet, BASE_CONTAINER_FIELD,
};

/// One registry row as stored in configuration or the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorEntry {
    pub retailer: String,
    pub page_type: String,
    #[serde(flatten)]
    pub selector: FieldSelector,
}

#[derive(Debug, Clone, Default)]
pub struct SelectorRegistry {
    scopes: HashMap<ScopeKey, Vec<FieldSelector>>,
}

impl SelectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I>(entries: I) -> CollectionResult<Self>
    where
        I: IntoIterator<Item = SelectorEntry>,
    {
        let mut registry = Self::new();
        registry.extend(entries)?;
        Ok(registry)
    }

    pub fn extend<I>(&mut self, entries: I) -> CollectionResult<()>
    where
        I: IntoIterator<Item = SelectorEntry>,
    {
        for entry in entries {
            self.register(ScopeKey::new(entry.retailer, entry.page_type), entry.selector)?;
        }
        Ok(())
    }

    /// Add one selector; field names are unique within a scope
    pub fn register(&mut self, scope: ScopeKey, selector: FieldSelector) -> CollectionResult<()> {
        let fields = self.scopes.entry(scope.clone()).or_default();
        if fields.iter().any(|f| f.field_name == selector.field_name) {
            return Err(CollectionError::configuration(
                &selector.field_name,
                format!("duplicate selector for field '{}' in {}", selector.field_name, scope),
            ));
        }
        fields.push(selector);
        Ok(())
    }

    /// Resolve the selector set for a scope.
    ///
    /// The reserved `base_container` entry becomes the container selector;
    /// every other entry is a field selector.
    pub fn resolve(&self, retailer: &str, page_type: &str) -> CollectionResult<SelectorSet> {
        let scope = ScopeKey::new(retailer, page_type);
        let entries = self
            .scopes
            .get(&scope)
            .filter(|fields| !fields.is_empty())
            .ok_or_else(|| {
                CollectionError::configuration("selectors", format!("no active selectors for {scope}"))
            })?;

        let base_container = entries
            .iter()
            .find(|f| f.field_name == BASE_CONTAINER_FIELD)
            .cloned()
            .ok_or_else(|| {
                CollectionError::configuration(
                    BASE_CONTAINER_FIELD,
                    format!("no '{BASE_CONTAINER_FIELD}' selector for {scope}"),
                )
            })?;

        let fields: Vec<FieldSelector> = entries
            .iter()
            .filter(|f| f.field_name != BASE_CONTAINER_FIELD)
            .cloned()
            .collect();

        debug!("Resolved {} field selectors for {}", fields.len(), scope);

        Ok(SelectorSet {
            scope,
            base_container,
            fields,
        })
    }

    pub fn len(&self) -> usize {
        self.scopes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load active rows from the `field_selectors` table.
    ///
    /// `fallback_selectors` is stored as a JSON array of strings; a malformed
    /// array is treated as empty rather than failing the load.
    pub async fn load_active_entries(pool: &SqlitePool) -> anyhow::Result<Vec<SelectorEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT retailer, page_type, field_name, primary_selector, fallback_selectors
            FROM field_selectors
            WHERE is_active = 1
            ORDER BY id
            "#,
        )
        .fetch_all(pool)
        .await?;

        let entries: Vec<SelectorEntry> = rows
            .iter()
            .map(|row| {
                let fallbacks: Option<String> = row.get("fallback_selectors");
                let fallback_selectors = fallbacks
                    .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok())
                    .unwrap_or_default();

                SelectorEntry {
                    retailer: row.get("retailer"),
                    page_type: row.get("page_type"),
                    selector: FieldSelector {
                        field_name: row.get("field_name"),
                        primary_selector: row.get("primary_selector"),
                        fallback_selectors,
                    },
                }
            })
            .collect();

        info!("Loaded {} active selectors from database", entries.len());
        Ok(entries)
    }
}

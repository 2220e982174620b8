//! Collaborator interfaces used by the collection session
//!
//! The session never manages a browser or a database directly: it talks to a
//! `PageRenderer` for rendered pages and to a `RecordSink` for persistence.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::errors::PersistError;
use super::record::ValidRecord;
use super::selector::ScopeKey;

/// Snapshot captured when a page is not usable
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDiagnostics {
    pub url: String,
    pub title: Option<String>,
    /// Reference to a visual or textual capture (e.g. a file path)
    pub snapshot: Option<String>,
}

/// A rendered page.
///
/// The page source is handed out as a string; callers parse it into a
/// document synchronously so parsed trees never cross an await point.
#[async_trait]
pub trait PageHandle: Send + Sync {
    fn url(&self) -> &str;

    /// Current serialized document
    async fn page_source(&self) -> Result<String>;

    /// Current rendered content height in pixels (or an equivalent size measure)
    async fn scroll_height(&self) -> Result<u64>;

    async fn scroll_to_bottom(&self) -> Result<()>;

    async fn scroll_to_top(&self) -> Result<()>;

    /// Whether at least one element matches the CSS selector
    async fn has_element(&self, selector: &str) -> Result<bool>;

    async fn diagnostics(&self) -> PageDiagnostics;
}

/// Produces rendered pages; owns the browser or HTTP client lifecycle
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<Box<dyn PageHandle>>;
}

/// How a sink treats records it has seen before
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceMode {
    /// Skip records whose key already exists in the scope
    #[default]
    UniqueUpsert,
    /// Always insert, keeping duplicates for historical datasets
    AppendOnly,
}

/// Result of persisting one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Inserted,
    /// Stored by the authoritative sink, but a mirror rejected the copy
    InsertedMirrorFailed(PersistError),
    SkippedDuplicate,
}

impl PersistOutcome {
    /// Whether the authoritative store now holds the record
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted | Self::InsertedMirrorFailed(_))
    }
}

/// Persistence collaborator; persistence is treated as at-least-once
#[async_trait]
pub trait RecordSink: Send + Sync {
    fn name(&self) -> &str;

    async fn persist(
        &self,
        record: &ValidRecord,
        scope: &ScopeKey,
    ) -> Result<PersistOutcome, PersistError>;
}

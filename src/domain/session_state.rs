//! In-memory collection session state
//!
//! One `CollectionState` per session; counters only ever grow during a run
//! and are read once at the end to build the `SessionSummary`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::errors::CollectionError;
use super::selector::ScopeKey;

/// One entry of the ordered page list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTarget {
    pub page_number: u32,
    pub url: String,
}

impl PageTarget {
    pub fn new(page_number: u32, url: impl Into<String>) -> Self {
        Self {
            page_number,
            url: url.into(),
        }
    }
}

/// What happened to one page of the run
#[derive(Debug, Clone)]
pub enum PageOutcome {
    Completed {
        page_number: u32,
        collected: u32,
        rejected: u32,
    },
    Failed(CollectionError),
    /// Cancelled while rendering or waiting for readiness; nothing persisted
    Abandoned { page_number: u32 },
}

/// Why the session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    CapReached,
    PagesExhausted,
    FatalPageFailure,
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CapReached => "record cap reached",
            Self::PagesExhausted => "page list exhausted",
            Self::FatalPageFailure => "fatal page failure",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Mutable counters for a running session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionState {
    pub session_id: String,
    pub scope: ScopeKey,
    pub record_cap: u32,
    pub total_collected: u32,
    /// (page_number, records persisted) in processing order
    pub per_page_collected: Vec<(u32, u32)>,
    pub duplicates_skipped: u32,
    pub rejections: u32,
    pub error_log: Vec<String>,
    pub started_at: DateTime<Utc>,
}

impl CollectionState {
    pub fn new(scope: ScopeKey, record_cap: u32) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            scope,
            record_cap,
            total_collected: 0,
            per_page_collected: Vec::new(),
            duplicates_skipped: 0,
            rejections: 0,
            error_log: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn cap_reached(&self) -> bool {
        self.total_collected >= self.record_cap
    }

    pub fn remaining_capacity(&self) -> u32 {
        self.record_cap.saturating_sub(self.total_collected)
    }

    pub fn record_collected(&mut self) {
        self.total_collected += 1;
    }

    pub fn record_page(&mut self, page_number: u32, collected: u32) {
        self.per_page_collected.push((page_number, collected));
    }

    pub fn log_error(&mut self, message: impl Into<String>) {
        self.error_log.push(message.into());
    }

    pub fn finish(self, stop_reason: StopReason) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id,
            scope: self.scope,
            total_collected: self.total_collected,
            record_cap: self.record_cap,
            per_page_counts: self.per_page_collected,
            duplicates_skipped: self.duplicates_skipped,
            rejections: self.rejections,
            error_log: self.error_log,
            stop_reason,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// End-of-session report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub scope: ScopeKey,
    pub total_collected: u32,
    pub record_cap: u32,
    pub per_page_counts: Vec<(u32, u32)>,
    pub duplicates_skipped: u32,
    pub rejections: u32,
    pub error_log: Vec<String>,
    pub stop_reason: StopReason,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionSummary {
    /// Collected fewer records than the cap; a warning, not a failure
    pub fn is_partial(&self) -> bool {
        self.total_collected < self.record_cap
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Session {} ({})", self.session_id, self.scope)?;
        writeln!(
            f,
            "Collected {}/{} records ({})",
            self.total_collected, self.record_cap, self.stop_reason
        )?;
        if self.is_partial() {
            writeln!(
                f,
                "WARNING: missing {} records",
                self.record_cap - self.total_collected
            )?;
        }
        for (page, count) in &self.per_page_counts {
            writeln!(f, "  page {page}: {count}")?;
        }
        writeln!(
            f,
            "Duplicates skipped: {}, rejected containers: {}",
            self.duplicates_skipped, self.rejections
        )?;
        if self.error_log.is_empty() {
            write!(f, "No errors")
        } else {
            write!(f, "Errors encountered:")?;
            for error in &self.error_log {
                write!(f, "\n  - {error}")?;
            }
            Ok(())
        }
    }
}

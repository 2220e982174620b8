//! Record persistence
//!
//! `SqliteRecordSink` writes validated records in either unique-upsert or
//! append-only mode. `TeeSink` fans one record out to several sinks and
//! `MemoryRecordSink` keeps records in memory for tests and dry runs.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{
    PageTarget, PersistError, PersistOutcome, PersistenceMode, RecordSink, ScopeKey, SessionSummary,
    ValidRecord,
};

/// SQLite-backed record sink
pub struct SqliteRecordSink {
    pool: SqlitePool,
    mode: PersistenceMode,
}

impl SqliteRecordSink {
    pub fn new(pool: SqlitePool, mode: PersistenceMode) -> Self {
        Self { pool, mode }
    }

    pub fn mode(&self) -> PersistenceMode {
        self.mode
    }

    pub async fn count(&self, scope: &ScopeKey) -> Result<i64, PersistError> {
        let sql = match self.mode {
            PersistenceMode::UniqueUpsert => {
                "SELECT COUNT(*) AS n FROM listing_records WHERE retailer = ? AND page_type = ?"
            }
            PersistenceMode::AppendOnly => {
                "SELECT COUNT(*) AS n FROM listing_records_history WHERE retailer = ? AND page_type = ?"
            }
        };

        let row = sqlx::query(sql)
            .bind(&scope.retailer)
            .bind(scope.page_type.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}

#[async_trait]
impl RecordSink for SqliteRecordSink {
    fn name(&self) -> &str {
        match self.mode {
            PersistenceMode::UniqueUpsert => "sqlite:listing_records",
            PersistenceMode::AppendOnly => "sqlite:listing_records_history",
        }
    }

    async fn persist(&self, record: &ValidRecord, scope: &ScopeKey) -> Result<PersistOutcome, PersistError> {
        let fields = serde_json::to_string(&record.fields)?;

        let sql = match self.mode {
            PersistenceMode::UniqueUpsert => {
                r#"
                INSERT INTO listing_records
                    (retailer, page_type, record_key, page_number, position, rank, fields, collected_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (retailer, page_type, record_key) DO NOTHING
                "#
            }
            PersistenceMode::AppendOnly => {
                r#"
                INSERT INTO listing_records_history
                    (retailer, page_type, record_key, page_number, position, rank, fields, collected_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#
            }
        };

        let result = sqlx::query(sql)
            .bind(&scope.retailer)
            .bind(scope.page_type.as_str())
            .bind(&record.record_key)
            .bind(i64::from(record.page_number))
            .bind(i64::from(record.position))
            .bind(record.rank())
            .bind(fields)
            .bind(record.collected_at)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            debug!("Duplicate record '{}' skipped in {}", record.record_key, scope);
            Ok(PersistOutcome::SkippedDuplicate)
        } else {
            Ok(PersistOutcome::Inserted)
        }
    }
}

/// Writes a record to a primary sink, then mirrors inserted records to the
/// secondary sinks. The primary outcome is authoritative: once the primary
/// has inserted, a mirror failure is reported in the outcome, never as `Err`.
pub struct TeeSink {
    name: String,
    sinks: Vec<Arc<dyn RecordSink>>,
}

impl TeeSink {
    pub fn new(primary: Arc<dyn RecordSink>) -> Self {
        Self {
            name: format!("tee({})", primary.name()),
            sinks: vec![primary],
        }
    }

    pub fn with_mirror(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.name = format!("{}+{}", self.name.trim_end_matches(')'), sink.name()) + ")";
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl RecordSink for TeeSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn persist(&self, record: &ValidRecord, scope: &ScopeKey) -> Result<PersistOutcome, PersistError> {
        let Some((primary, mirrors)) = self.sinks.split_first() else {
            return Err(PersistError::Sink {
                sink: self.name.clone(),
                message: "no sinks configured".to_string(),
            });
        };

        let outcome = primary.persist(record, scope).await?;
        if outcome != PersistOutcome::Inserted {
            return Ok(outcome);
        }

        let mut mirror_failure = None;
        for mirror in mirrors {
            if let Err(e) = mirror.persist(record, scope).await {
                let error = PersistError::Sink {
                    sink: mirror.name().to_string(),
                    message: e.to_string(),
                };
                warn!(
                    "Record '{}' stored in {} but not mirrored: {}",
                    record.record_key,
                    primary.name(),
                    error
                );
                mirror_failure.get_or_insert(error);
            }
        }
        Ok(mirror_failure.map_or(PersistOutcome::Inserted, PersistOutcome::InsertedMirrorFailed))
    }
}

/// In-memory sink honoring the same persistence modes
#[derive(Default)]
pub struct MemoryRecordSink {
    mode: PersistenceMode,
    records: Mutex<Vec<ValidRecord>>,
    seen: Mutex<HashSet<(ScopeKey, String)>>,
    failing_keys: HashSet<String>,
}

impl MemoryRecordSink {
    pub fn new(mode: PersistenceMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Make persisting the given record key fail, for exercising error paths
    pub fn failing_on(mut self, record_key: &str) -> Self {
        self.failing_keys.insert(record_key.to_string());
        self
    }

    pub async fn records(&self) -> Vec<ValidRecord> {
        self.records.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

#[async_trait]
impl RecordSink for MemoryRecordSink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn persist(&self, record: &ValidRecord, scope: &ScopeKey) -> Result<PersistOutcome, PersistError> {
        if self.failing_keys.contains(&record.record_key) {
            return Err(PersistError::Database(format!(
                "simulated failure for '{}'",
                record.record_key
            )));
        }

        if self.mode == PersistenceMode::UniqueUpsert {
            let mut seen = self.seen.lock().await;
            if !seen.insert((scope.clone(), record.record_key.clone())) {
                return Ok(PersistOutcome::SkippedDuplicate);
            }
        }

        self.records.lock().await.push(record.clone());
        Ok(PersistOutcome::Inserted)
    }
}

/// Page list source backed by the `page_urls` table
pub struct PageUrlRepository {
    pool: SqlitePool,
}

impl PageUrlRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Active pages for a scope, ordered by page number
    pub async fn active_pages(&self, scope: &ScopeKey) -> anyhow::Result<Vec<PageTarget>> {
        let rows = sqlx::query(
            r#"
            SELECT page_number, url
            FROM page_urls
            WHERE retailer = ? AND page_type = ? AND is_active = 1
            ORDER BY page_number
            "#,
        )
        .bind(&scope.retailer)
        .bind(scope.page_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        let pages = rows
            .iter()
            .map(|row| {
                let page_number: i64 = row.get("page_number");
                Ok(PageTarget::new(u32::try_from(page_number)?, row.get::<String, _>("url")))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        info!("Loaded {} page URLs for {}", pages.len(), scope);
        Ok(pages)
    }
}

/// Stores end-of-session summaries in `collection_runs`
pub struct CollectionRunRepository {
    pool: SqlitePool,
}

impl CollectionRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn save(&self, summary: &SessionSummary) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO collection_runs
                (session_id, retailer, page_type, total_collected, record_cap,
                 stop_reason, summary, started_at, finished_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&summary.session_id)
        .bind(&summary.scope.retailer)
        .bind(summary.scope.page_type.as_str())
        .bind(i64::from(summary.total_collected))
        .bind(i64::from(summary.record_cap))
        .bind(summary.stop_reason.to_string())
        .bind(serde_json::to_string(summary)?)
        .bind(summary.started_at)
        .bind(summary.finished_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

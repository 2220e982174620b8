//! Shelfwatch - selector-driven e-commerce listing collector
//!
//! Collects ranked product listings (search grids, best-seller lists) from
//! rendered retailer pages using declarative selectors, and stores normalized
//! records in SQLite keyed by retailer and page type.

pub mod application;
pub mod domain;
pub mod infrastructure;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use application::{CollectionSession, Pacer, SessionOptions};
use domain::{PersistenceMode, RecordSink, ScopeKey, SessionSummary};
use infrastructure::{
    AppConfig, CollectionRunRepository, DatabaseConnection, HttpPageRenderer, PageUrlRepository,
    SelectorRegistry, SqliteRecordSink, TeeSink,
};

/// Sink for the configured persistence mode, optionally mirrored into the
/// append-only history table
pub fn build_sink(pool: &sqlx::SqlitePool, mode: PersistenceMode, mirror_to_history: bool) -> Arc<dyn RecordSink> {
    let primary: Arc<dyn RecordSink> = Arc::new(SqliteRecordSink::new(pool.clone(), mode));
    if mirror_to_history && mode == PersistenceMode::UniqueUpsert {
        let history = Arc::new(SqliteRecordSink::new(pool.clone(), PersistenceMode::AppendOnly));
        Arc::new(TeeSink::new(primary).with_mirror(history))
    } else {
        primary
    }
}

/// Run one collection session described by `config`
pub async fn run(config: AppConfig, cancellation_token: CancellationToken) -> Result<SessionSummary> {
    config.validate()?;
    let session_config = &config.session;
    let scope = ScopeKey::new(&session_config.retailer, &session_config.page_type);
    let page_type = config
        .page_type(&session_config.retailer, &session_config.page_type)
        .context("page type profile disappeared after validation")?;

    let db = DatabaseConnection::new(&config.database.url).await?;
    db.migrate().await?;
    let pool = db.pool().clone();

    let mut registry = SelectorRegistry::from_entries(config.selectors.iter().cloned())?;
    if config.database.load_selectors_from_db {
        registry.extend(SelectorRegistry::load_active_entries(&pool).await?)?;
    }

    let pages = if config.database.load_pages_from_db {
        PageUrlRepository::new(pool.clone()).active_pages(&scope).await?
    } else {
        session_config.pages.clone()
    };

    let renderer = HttpPageRenderer::new(config.renderer.clone())?
        .with_snapshot_dir(page_type.readiness.snapshot_dir.clone());
    let sink = build_sink(&pool, session_config.persistence_mode, session_config.mirror_to_history);

    let session = CollectionSession::new(
        &registry,
        page_type,
        pages,
        SessionOptions {
            record_cap: session_config.record_cap,
            pacer: Pacer::new(session_config.pacing),
        },
        Arc::new(renderer),
        sink,
    )?;

    let summary = session.run(cancellation_token).await;
    CollectionRunRepository::new(pool).save(&summary).await?;
    info!("Session {} saved", summary.session_id);
    Ok(summary)
}
